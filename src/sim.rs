//! In-process clock and phase kernel.
//!
//! Every cycle runs three phases in order:
//!
//! 1. **rising edge** – the [`Design`] updates its registers from the values the
//!    signals held before the edge, then every task awaiting
//!    [`Sim::rising_edge`] runs until it suspends again. This is where
//!    testbench components drive signals.
//! 2. **settle** – the design recomputes its combinational outputs.
//! 3. **read-only** – tasks awaiting [`Sim::read_only`] sample the bus. All writes
//!    for the cycle have settled; driving a signal now is an error.

use log::{debug, error, info};
use num_format::{Locale, ToFormattedString};
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::Rc;

use crate::error::{SimError, TbError};
use crate::executor::{Executor, JoinHandle};
use crate::signal::{Signal, SignalStore};
use crate::trigger::{self, TrigKind, Trigger, TriggerLists};
use crate::TbResult;

#[derive(PartialEq, Clone, Copy, Debug)]
pub enum Phase {
    /// Before the first edge and between cycles.
    Idle,
    RisingEdge,
    Settle,
    ReadOnly,
}

/// The hardware under test, evaluated by the kernel once per cycle.
pub trait Design {
    /// Register update. Signals still hold their pre-edge values.
    fn clock_edge(&mut self, sim: &Sim) -> Result<(), SimError>;

    /// Combinational update after the testbench drove its inputs.
    fn settle(&mut self, _sim: &Sim) -> Result<(), SimError> {
        Ok(())
    }
}

pub(crate) struct SimInner {
    pub(crate) signals: RefCell<SignalStore>,
    pub(crate) phase: Cell<Phase>,
    triggers: TriggerLists,
    executor: Executor,
    design: RefCell<Option<Box<dyn Design>>>,
    cycle: Cell<u64>,
    fatal: RefCell<Option<TbError>>,
}

#[derive(Clone)]
pub struct Sim(Rc<SimInner>);

impl Sim {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Sim(Rc::new(SimInner {
            signals: RefCell::new(SignalStore::new()),
            phase: Cell::new(Phase::Idle),
            triggers: TriggerLists::new(),
            executor: Executor::new(),
            design: RefCell::new(None),
            cycle: Cell::new(0),
            fatal: RefCell::new(None),
        }))
    }

    pub fn add_signal(&self, name: &str, width: u32) -> Result<Signal, SimError> {
        let handle = self.0.signals.borrow_mut().declare(name, width)?;
        Ok(Signal::new(Rc::downgrade(&self.0), handle, width, name))
    }

    pub fn signal(&self, name: &str) -> Result<Signal, SimError> {
        let (handle, width) = self.0.signals.borrow().lookup(name)?;
        Ok(Signal::new(Rc::downgrade(&self.0), handle, width, name))
    }

    pub fn set_design(&self, design: impl Design + 'static) {
        self.0.design.borrow_mut().replace(Box::new(design));
    }

    pub fn cycle(&self) -> u64 {
        self.0.cycle.get()
    }

    pub fn phase(&self) -> Phase {
        self.0.phase.get()
    }

    pub(crate) fn triggers(&self) -> &TriggerLists {
        &self.0.triggers
    }

    pub fn rising_edge(&self) -> Trigger {
        Trigger::rising_edge(self)
    }

    pub fn read_only(&self) -> Trigger {
        Trigger::read_only(self)
    }

    /// Next rising edge, then its read-only phase.
    pub async fn rising_edge_ro(&self) {
        self.rising_edge().await;
        self.read_only().await;
    }

    pub fn spawn<T: 'static>(
        &self,
        name: &str,
        future: impl Future<Output = T> + 'static,
    ) -> JoinHandle<T> {
        self.0.executor.spawn(name, future)
    }

    /// Runs a background task. An error it returns ends the current run.
    pub fn fork(
        &self,
        name: &str,
        future: impl Future<Output = TbResult> + 'static,
    ) -> JoinHandle<()> {
        let sim = self.clone();
        let task_name = name.to_string();
        self.spawn(name, async move {
            if let Err(e) = future.await {
                error!("task '{}' failed: {}", task_name, e);
                sim.fail(e);
            }
        })
    }

    /// Records a fatal error. Only the first one is kept.
    pub fn fail(&self, err: TbError) {
        let mut fatal = self.0.fatal.borrow_mut();
        if fatal.is_none() {
            fatal.replace(err);
        }
    }

    fn with_design(
        &self,
        f: impl FnOnce(&mut dyn Design, &Sim) -> Result<(), SimError>,
    ) -> Result<(), SimError> {
        match self.0.design.borrow_mut().as_mut() {
            Some(design) => f(design.as_mut(), self),
            None => Ok(()),
        }
    }

    /// Advances the simulation by one clock cycle.
    pub fn step(&self) -> Result<(), SimError> {
        let inner = &self.0;
        inner.cycle.set(inner.cycle.get() + 1);

        inner.phase.set(Phase::RisingEdge);
        self.with_design(|design, sim| design.clock_edge(sim))?;
        trigger::react(&inner.triggers, TrigKind::RisingEdge);
        inner.executor.run_once();

        inner.phase.set(Phase::Settle);
        self.with_design(|design, sim| design.settle(sim))?;

        inner.phase.set(Phase::ReadOnly);
        trigger::react(&inner.triggers, TrigKind::ReadOnly);
        inner.executor.run_once();

        inner.phase.set(Phase::Idle);
        Ok(())
    }

    /// Runs `test` until it returns, a forked task fails, or `max_cycles` cycles have
    /// passed. All tasks are torn down afterwards.
    pub fn run<T: 'static>(
        &self,
        max_cycles: u64,
        test: impl Future<Output = TbResult<T>> + 'static,
    ) -> TbResult<T> {
        let start = self.cycle();
        let mut handle = self.spawn("test", test);
        self.0.executor.run_once();

        let result = loop {
            let fatal = self.0.fatal.borrow_mut().take();
            if let Some(err) = fatal {
                break Err(err);
            }
            match handle.try_take() {
                Some(Some(result)) => break result,
                Some(None) => break Err(TbError::Test("test task was cancelled".to_string())),
                None => {}
            }
            if self.cycle() - start >= max_cycles {
                break Err(SimError::Timeout { cycles: max_cycles }.into());
            }
            if let Err(e) = self.step() {
                break Err(e.into());
            }
        };

        let cycles = self.cycle() - start;
        match &result {
            Ok(_) => info!(
                "test passed after {} cycles",
                cycles.to_formatted_string(&Locale::en)
            ),
            Err(e) => error!(
                "test failed after {} cycles: {}",
                cycles.to_formatted_string(&Locale::en),
                e
            ),
        }
        self.tear_down();
        result
    }

    fn tear_down(&self) {
        debug!("tearing down {} remaining tasks", self.0.executor.len());
        self.0.triggers.clear();
        self.0.executor.clear();
        self.0.fatal.borrow_mut().take();
    }
}
