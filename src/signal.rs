use intmap::IntMap;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::codec::mask;
use crate::error::SimError;
use crate::sim::{Phase, SimInner};

struct SignalState {
    name: String,
    width: u32,
    // None while the signal is undefined ('x')
    value: Option<u64>,
}

pub(crate) struct SignalStore {
    by_handle: IntMap<SignalState>,
    by_name: HashMap<String, u64>,
}

impl SignalStore {
    pub fn new() -> Self {
        Self {
            by_handle: IntMap::new(),
            by_name: HashMap::new(),
        }
    }

    pub fn declare(&mut self, name: &str, width: u32) -> Result<u64, SimError> {
        if self.by_name.contains_key(name) {
            return Err(SimError::DuplicateSignal(name.to_string()));
        }
        if !(1..=64).contains(&width) {
            return Err(SimError::InvalidWidth {
                signal: name.to_string(),
                width,
            });
        }
        let handle = self.by_name.len() as u64;
        self.by_name.insert(name.to_string(), handle);
        self.by_handle.insert(
            handle,
            SignalState {
                name: name.to_string(),
                width,
                value: None,
            },
        );
        Ok(handle)
    }

    pub fn lookup(&self, name: &str) -> Result<(u64, u32), SimError> {
        let handle = *self
            .by_name
            .get(name)
            .ok_or_else(|| SimError::UnknownSignal(name.to_string()))?;
        let width = self.state(handle)?.width;
        Ok((handle, width))
    }

    fn state(&self, handle: u64) -> Result<&SignalState, SimError> {
        self.by_handle
            .get(handle)
            .ok_or_else(|| SimError::UnknownSignal(format!("#{}", handle)))
    }

    pub fn read(&self, handle: u64) -> Result<u64, SimError> {
        let state = self.state(handle)?;
        state.value.ok_or_else(|| SimError::Unresolved {
            signal: state.name.clone(),
        })
    }

    pub fn is_defined(&self, handle: u64) -> bool {
        self.state(handle).map_or(false, |s| s.value.is_some())
    }

    pub fn write(&mut self, handle: u64, value: Option<u64>, phase: Phase) -> Result<(), SimError> {
        let state = self
            .by_handle
            .get_mut(handle)
            .ok_or_else(|| SimError::UnknownSignal(format!("#{}", handle)))?;
        if phase == Phase::ReadOnly {
            return Err(SimError::WriteInReadOnly {
                signal: state.name.clone(),
            });
        }
        if let Some(v) = value {
            if v & !mask(state.width) != 0 {
                return Err(SimError::ValueTooWide {
                    signal: state.name.clone(),
                    value: v,
                    width: state.width,
                });
            }
        }
        state.value = value;
        Ok(())
    }
}

/// Handle to a named signal of the simulated design.
///
/// Handles only hold a weak reference to the kernel, so designs and tasks can keep
/// them around without keeping a finished simulation alive.
#[derive(Clone)]
pub struct Signal {
    sim: Weak<SimInner>,
    handle: u64,
    width: u32,
    name: Rc<str>,
}

impl Signal {
    pub(crate) fn new(sim: Weak<SimInner>, handle: u64, width: u32, name: &str) -> Self {
        Self {
            sim,
            handle,
            width,
            name: Rc::from(name),
        }
    }

    fn inner(&self) -> Result<Rc<SimInner>, SimError> {
        self.sim.upgrade().ok_or(SimError::Closed)
    }

    pub fn handle(&self) -> u64 {
        self.handle
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn u64(&self) -> Result<u64, SimError> {
        self.inner()?.signals.borrow().read(self.handle)
    }

    pub fn is_high(&self) -> Result<bool, SimError> {
        Ok(self.u64()? != 0)
    }

    pub fn is_defined(&self) -> bool {
        self.inner()
            .map_or(false, |sim| sim.signals.borrow().is_defined(self.handle))
    }

    pub fn set(&self, value: u64) -> Result<(), SimError> {
        self.write(Some(value))
    }

    pub fn set_bool(&self, value: bool) -> Result<(), SimError> {
        self.write(Some(value as u64))
    }

    /// Drives the signal back to undefined.
    pub fn set_x(&self) -> Result<(), SimError> {
        self.write(None)
    }

    #[inline]
    fn write(&self, value: Option<u64>) -> Result<(), SimError> {
        let sim = self.inner()?;
        let phase = sim.phase.get();
        let mut signals = sim.signals.borrow_mut();
        signals.write(self.handle, value, phase)
    }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Signal({}[{}])", self.name, self.width)
    }
}
