//! Packet reconstruction from an observed [`AxisBus`].
//!
//! The monitor samples the bus once per cycle in the read-only phase. Every
//! handshaked word is decoded and appended to the packet in progress; the
//! packet is finalized when `tlast` is seen or, on buses without `tlast`,
//! once it holds `packet_size` words. Finalized packets are handed out
//! through a bounded channel.

use futures::SinkExt;
use futures_channel::mpsc;
use log::{debug, info};

use crate::bus::AxisBus;
use crate::codec::{self, BusWord, Datatype};
use crate::error::{CodecError, ConfigError};
use crate::event::Event;
use crate::packet::Packet;
use crate::shared::Shared;
use crate::signal::Signal;
use crate::sim::Sim;
use crate::TbResult;

const DEFAULT_PACKET_SIZE: usize = 16;

#[derive(Clone)]
struct Reset {
    signal: Signal,
    active_low: bool,
}

#[derive(Clone)]
pub struct AxisMonitor {
    sim: Sim,
    name: String,
    bus: AxisBus,
    datatype: Datatype,
    packet_size: usize,
    reset: Option<Reset>,
    gate: Option<Event>,
    received: Shared<u64>,
}

impl AxisMonitor {
    pub fn new(sim: &Sim, bus: AxisBus, datatype: Datatype) -> TbResult<Self> {
        datatype.validate()?;
        if datatype.width() > bus.data_width() {
            return Err(CodecError::UnsupportedWidth { datatype }.into());
        }
        Ok(Self {
            sim: sim.clone(),
            name: bus.name.clone(),
            bus,
            datatype,
            packet_size: DEFAULT_PACKET_SIZE,
            reset: None,
            gate: None,
            received: Shared::new(0),
        })
    }

    /// Name used in log messages, defaults to the bus prefix.
    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Packet length on buses without `tlast`.
    pub fn packet_size(mut self, packet_size: usize) -> Result<Self, ConfigError> {
        if packet_size == 0 {
            return Err(ConfigError::Invalid("packet_size must not be 0".to_string()));
        }
        self.packet_size = packet_size;
        Ok(self)
    }

    /// Cycles in which `signal` is asserted are skipped, and a partial packet is dropped.
    pub fn reset(mut self, signal: Signal, active_low: bool) -> Self {
        self.reset = Some(Reset { signal, active_low });
        self
    }

    /// Holds back every finalized packet until `gate` is set.
    pub fn release_gate(mut self, gate: Event) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn datatype(&self) -> Datatype {
        self.datatype
    }

    /// Number of packets emitted so far.
    pub fn packets(&self) -> u64 {
        *self.received.get()
    }

    /// Starts observing the bus. At most `capacity` packets are buffered
    /// before the monitor waits for the receiver.
    pub fn start(&self, capacity: usize) -> mpsc::Receiver<Packet> {
        let (tx, rx) = mpsc::channel(capacity);
        let name = format!("monitor {}", self.name);
        self.sim.fork(&name, self.clone().run(tx));
        rx
    }

    fn in_reset(&self) -> TbResult<bool> {
        match &self.reset {
            Some(reset) => {
                // an undefined reset is treated as asserted
                if !reset.signal.is_defined() {
                    return Ok(true);
                }
                Ok(reset.signal.is_high()? != reset.active_low)
            }
            None => Ok(false),
        }
    }

    fn finished(&self, packet: &Packet) -> TbResult<bool> {
        match &self.bus.tlast {
            Some(last) => Ok(last.is_high()?),
            None => Ok(packet.len() == self.packet_size),
        }
    }

    async fn run(self, mut tx: mpsc::Sender<Packet>) -> TbResult {
        let mut packet = Packet::new();
        loop {
            self.sim.rising_edge_ro().await;
            if self.in_reset()? {
                if !packet.is_empty() {
                    debug!(
                        "{}: dropping partial packet of {} words on reset",
                        self.name,
                        packet.len()
                    );
                    packet.clear();
                }
                continue;
            }
            if !self.bus.handshake()? {
                continue;
            }

            let word = BusWord::new(self.bus.tdata.u64()?, self.bus.data_width());
            packet.push(codec::decode(word, self.datatype));
            if !self.finished(&packet)? {
                continue;
            }

            let done = std::mem::take(&mut packet);
            info!("{}: received a packet of {} words", self.name, done.len());
            if let Some(gate) = &self.gate {
                gate.wait().await;
            }
            *self.received.get_mut() += 1;
            if tx.send(done).await.is_err() {
                debug!("{}: receiver dropped, stopping", self.name);
                return Ok(());
            }
        }
    }
}
