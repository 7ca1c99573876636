use log::{debug, error, info};

use crate::bus::AxisBus;
use crate::codec::{self, Datatype};
use crate::error::CodecError;
use crate::packet::Packet;
use crate::pattern::Pattern;
use crate::sim::{Phase, Sim};
use crate::TbResult;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DriverStats {
    pub packets_sent: u64,
    pub words_sent: u64,
}

/// Drives packets onto the producer side of an [`AxisBus`].
pub struct AxisMaster {
    sim: Sim,
    bus: AxisBus,
    datatype: Datatype,
    valid_gen: Option<Pattern>,
    // words left in the current on-run and idle cycles to insert once it ends
    on_left: u32,
    off_pending: u32,
    stats: DriverStats,
}

impl AxisMaster {
    /// De-asserts `tvalid` and `tlast` and zeroes `tdata`.
    pub fn new(sim: &Sim, bus: AxisBus, datatype: Datatype) -> TbResult<Self> {
        datatype.validate()?;
        if datatype.width() > bus.data_width() {
            return Err(CodecError::UnsupportedWidth { datatype }.into());
        }
        bus.tvalid.set(0)?;
        bus.tdata.set(0)?;
        if let Some(last) = &bus.tlast {
            last.set(0)?;
        }
        Ok(Self {
            sim: sim.clone(),
            bus,
            datatype,
            valid_gen: None,
            on_left: 0,
            off_pending: 0,
            stats: DriverStats::default(),
        })
    }

    pub fn bus(&self) -> &AxisBus {
        &self.bus
    }

    pub fn datatype(&self) -> Datatype {
        self.datatype
    }

    pub fn stats(&self) -> DriverStats {
        self.stats
    }

    /// Installs an idle insertion pattern, or removes it with `None`.
    pub fn set_valid_generator(&mut self, pattern: Option<Pattern>) {
        self.valid_gen = pattern;
        self.on_left = 0;
        self.off_pending = 0;
    }

    /// Sends `packet` one word per accepted transfer.
    ///
    /// Words are driven in the rising-edge phase; called from anywhere else,
    /// `send` first waits for the next edge. Returns once the last word has
    /// been transferred, on the rising edge following that transfer. `tvalid`
    /// and `tlast` keep their last driven values.
    pub async fn send(&mut self, packet: &Packet) -> TbResult {
        if self.sim.phase() != Phase::RisingEdge {
            self.sim.rising_edge().await;
        }
        let n = packet.len();
        for (i, value) in packet.iter().enumerate() {
            let word = match codec::encode(value, self.datatype) {
                Ok(word) => word,
                Err(e) => {
                    error!("{}: word {} of packet: {}", self.bus.name, i, e);
                    return Err(e.into());
                }
            };

            self.idle().await?;

            self.bus.tvalid.set(1)?;
            if let Some(last) = &self.bus.tlast {
                last.set_bool(i + 1 == n)?;
            }
            self.bus.tdata.set(word.bits)?;

            self.wait_ready().await?;
            self.sim.rising_edge().await;
            self.stats.words_sent += 1;
        }
        self.stats.packets_sent += 1;
        info!(
            "{}: sent packet #{} ({} words)",
            self.bus.name, self.stats.packets_sent, n
        );
        Ok(())
    }

    /// Inserts the idle cycles owed by the finished on-run and fetches the next run.
    async fn idle(&mut self) -> TbResult {
        let gen = match self.valid_gen.as_mut() {
            Some(gen) => gen,
            None => return Ok(()),
        };
        if self.on_left == 0 {
            if self.off_pending > 0 {
                debug!("{}: idle for {} cycles", self.bus.name, self.off_pending);
                self.bus.tvalid.set(0)?;
                for _ in 0..self.off_pending {
                    self.sim.rising_edge().await;
                }
            }
            let run = gen.next_asserted_run()?;
            self.on_left = run.on;
            self.off_pending = run.off;
        }
        self.on_left -= 1;
        Ok(())
    }

    async fn wait_ready(&self) -> TbResult {
        let ready = match &self.bus.tready {
            Some(ready) => ready,
            None => return Ok(()),
        };
        self.sim.read_only().await;
        while !ready.is_high()? {
            self.sim.rising_edge().await;
            self.sim.read_only().await;
        }
        Ok(())
    }
}
