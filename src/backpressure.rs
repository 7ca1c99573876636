use log::debug;

use crate::executor::JoinHandle;
use crate::pattern::Pattern;
use crate::signal::Signal;
use crate::sim::{Phase, Sim};
use crate::TbResult;

/// Drives a single bit, typically a consumer's `tready`, from a [`Pattern`].
pub struct BitDriver {
    sim: Sim,
    signal: Signal,
    handle: Option<JoinHandle<()>>,
}

impl BitDriver {
    /// The signal keeps its current value until [`BitDriver::start`] is called.
    pub fn new(sim: &Sim, signal: Signal) -> Self {
        Self {
            sim: sim.clone(),
            signal,
            handle: None,
        }
    }

    pub fn signal(&self) -> &Signal {
        &self.signal
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().map_or(false, |h| !h.is_finished())
    }

    /// Drives one pattern bit per cycle from the next rising edge on,
    /// replacing any pattern already running. Running out of a finite pattern
    /// ends the simulation run with an error.
    pub fn start(&mut self, pattern: Pattern) {
        self.stop();
        debug!("{}: backpressure started", self.signal.name());
        let name = format!("bitdriver {}", self.signal.name());
        let handle = self
            .sim
            .fork(&name, drive(self.sim.clone(), self.signal.clone(), pattern));
        self.handle = Some(handle);
    }

    /// Stops driving. The signal keeps its last value.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            debug!("{}: backpressure stopped", self.signal.name());
            handle.cancel();
        }
    }
}

async fn drive(sim: Sim, signal: Signal, mut pattern: Pattern) -> TbResult {
    if sim.phase() != Phase::RisingEdge {
        sim.rising_edge().await;
    }
    loop {
        signal.set_bool(pattern.next()?)?;
        sim.rising_edge().await;
    }
}
