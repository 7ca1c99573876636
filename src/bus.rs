use crate::error::SimError;
use crate::signal::Signal;
use crate::sim::Sim;

/// The signals of one AXI4-Stream style interface.
///
/// `tready` and `tlast` are optional: without `tready` every valid word is a
/// transfer, without `tlast` packets have a fixed size.
#[derive(Clone, Debug)]
pub struct AxisBus {
    pub name: String,
    pub tvalid: Signal,
    pub tdata: Signal,
    pub tready: Option<Signal>,
    pub tlast: Option<Signal>,
}

impl AxisBus {
    /// Binds to `{prefix}_tvalid`, `{prefix}_tdata` and, if the design has them,
    /// `{prefix}_tready` and `{prefix}_tlast`.
    pub fn new(sim: &Sim, prefix: &str) -> Result<Self, SimError> {
        let name = |suffix: &str| format!("{}_{}", prefix, suffix);
        Ok(Self {
            name: prefix.to_string(),
            tvalid: sim.signal(&name("tvalid"))?,
            tdata: sim.signal(&name("tdata"))?,
            tready: optional(sim.signal(&name("tready")))?,
            tlast: optional(sim.signal(&name("tlast")))?,
        })
    }

    /// Declares the signals of a new interface and binds to them.
    pub fn declare(
        sim: &Sim,
        prefix: &str,
        data_width: u32,
        with_ready: bool,
        with_last: bool,
    ) -> Result<Self, SimError> {
        let name = |suffix: &str| format!("{}_{}", prefix, suffix);
        sim.add_signal(&name("tvalid"), 1)?;
        sim.add_signal(&name("tdata"), data_width)?;
        if with_ready {
            sim.add_signal(&name("tready"), 1)?;
        }
        if with_last {
            sim.add_signal(&name("tlast"), 1)?;
        }
        AxisBus::new(sim, prefix)
    }

    pub fn data_width(&self) -> u32 {
        self.tdata.width()
    }

    /// True if a word is transferred this cycle. Only meaningful in the read-only phase.
    pub fn handshake(&self) -> Result<bool, SimError> {
        if !self.tvalid.is_high()? {
            return Ok(false);
        }
        match &self.tready {
            Some(ready) => ready.is_high(),
            None => Ok(true),
        }
    }
}

fn optional(signal: Result<Signal, SimError>) -> Result<Option<Signal>, SimError> {
    match signal {
        Ok(signal) => Ok(Some(signal)),
        Err(SimError::UnknownSignal(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_signals() {
        let sim = Sim::new();
        let full = AxisBus::declare(&sim, "s_axis", 16, true, true).unwrap();
        assert!(full.tready.is_some());
        assert!(full.tlast.is_some());
        assert_eq!(full.data_width(), 16);

        let bare = AxisBus::declare(&sim, "m_axis", 8, false, false).unwrap();
        assert!(bare.tready.is_none());
        assert!(bare.tlast.is_none());

        assert!(matches!(
            AxisBus::new(&sim, "x_axis"),
            Err(SimError::UnknownSignal(_))
        ));
    }

    #[test]
    fn handshake_needs_ready_if_present() {
        let sim = Sim::new();
        let bus = AxisBus::declare(&sim, "s_axis", 8, true, false).unwrap();
        bus.tvalid.set(1).unwrap();
        bus.tready.as_ref().unwrap().set(0).unwrap();
        assert!(!bus.handshake().unwrap());
        bus.tready.as_ref().unwrap().set(1).unwrap();
        assert!(bus.handshake().unwrap());

        let bare = AxisBus::declare(&sim, "m_axis", 8, false, false).unwrap();
        bare.tvalid.set(1).unwrap();
        assert!(bare.handshake().unwrap());
    }
}
