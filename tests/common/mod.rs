#![allow(dead_code)]

use axistb::prelude::*;
use log::info;

pub const TDATA_WIDTH: u32 = 16;
pub const INTEGER_BITS: u32 = 1;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn bit(signal: &Signal) -> bool {
    signal.is_high().unwrap_or(false)
}

fn copy(from: &Signal, to: &Signal) -> Result<(), SimError> {
    match from.is_defined() {
        true => to.set(from.u64()?),
        false => to.set_x(),
    }
}

#[derive(Clone)]
pub struct Ports {
    pub aresetn: Signal,
    pub s_axis: AxisBus,
    pub m_axis: AxisBus,
}

impl Ports {
    pub fn declare(sim: &Sim, width: u32) -> Result<Self, SimError> {
        Ok(Self {
            aresetn: sim.add_signal("aresetn", 1)?,
            s_axis: AxisBus::declare(sim, "s_axis", width, true, true)?,
            m_axis: AxisBus::declare(sim, "m_axis", width, true, true)?,
        })
    }

    fn s_tready(&self) -> &Signal {
        self.s_axis.tready.as_ref().unwrap()
    }

    fn m_tready(&self) -> &Signal {
        self.m_axis.tready.as_ref().unwrap()
    }

    fn s_tlast(&self) -> &Signal {
        self.s_axis.tlast.as_ref().unwrap()
    }

    fn m_tlast(&self) -> &Signal {
        self.m_axis.tlast.as_ref().unwrap()
    }
}

/// Zero latency stream: every output is a function of the inputs in the same cycle.
/// `flip_lsb` models a broken datapath.
pub struct PassThrough {
    pub ports: Ports,
    pub flip_lsb: bool,
}

impl Design for PassThrough {
    fn clock_edge(&mut self, _sim: &Sim) -> Result<(), SimError> {
        Ok(())
    }

    fn settle(&mut self, _sim: &Sim) -> Result<(), SimError> {
        let p = &self.ports;
        let running = bit(&p.aresetn);
        p.m_axis.tvalid.set_bool(running && bit(&p.s_axis.tvalid))?;
        p.s_tready().set_bool(running && bit(p.m_tready()))?;
        copy(p.s_tlast(), p.m_tlast())?;
        match (self.flip_lsb, p.s_axis.tdata.is_defined()) {
            (true, true) => p.m_axis.tdata.set(p.s_axis.tdata.u64()? ^ 1),
            _ => copy(&p.s_axis.tdata, &p.m_axis.tdata),
        }
    }
}

/// One register stage with full throughput: `s_tready = !m_tvalid || m_tready`.
pub struct RegisterSlice {
    pub ports: Ports,
    valid: bool,
    data: u64,
    last: bool,
}

impl RegisterSlice {
    pub fn new(ports: Ports) -> Self {
        Self {
            ports,
            valid: false,
            data: 0,
            last: false,
        }
    }
}

impl Design for RegisterSlice {
    fn clock_edge(&mut self, _sim: &Sim) -> Result<(), SimError> {
        let p = &self.ports;
        if !bit(&p.aresetn) {
            self.valid = false;
        } else if bit(&p.s_axis.tvalid) && bit(p.s_tready()) {
            self.valid = true;
            self.data = p.s_axis.tdata.u64()?;
            self.last = bit(p.s_tlast());
        } else if bit(p.m_tready()) {
            self.valid = false;
        }
        p.m_axis.tvalid.set_bool(self.valid)?;
        p.m_axis.tdata.set(self.data)?;
        p.m_tlast().set_bool(self.last)
    }

    fn settle(&mut self, _sim: &Sim) -> Result<(), SimError> {
        let p = &self.ports;
        let ready = bit(&p.aresetn) && (!self.valid || bit(p.m_tready()));
        p.s_tready().set_bool(ready)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dut {
    PassThrough,
    RegisterSlice,
    BrokenPassThrough,
}

impl Dut {
    /// A zero latency design emits its output in the same cycle the input is
    /// seen, so the output monitor has to wait for the model.
    fn zero_latency(&self) -> bool {
        !matches!(self, Dut::RegisterSlice)
    }
}

pub struct StreamTb {
    pub sim: Sim,
    pub ports: Ports,
    pub master: AxisMaster,
    pub backpressure: BitDriver,
    pub scoreboard: Scoreboard,
    pub output: AxisMonitor,
    pub input: AxisMonitor,
    modeled: Shared<u64>,
}

impl StreamTb {
    pub fn new(sim: &Sim, dut: Dut, datatype: Datatype) -> TbResult<Self> {
        let ports = Ports::declare(sim, TDATA_WIDTH)?;
        match dut {
            Dut::PassThrough | Dut::BrokenPassThrough => sim.set_design(PassThrough {
                ports: ports.clone(),
                flip_lsb: dut == Dut::BrokenPassThrough,
            }),
            Dut::RegisterSlice => sim.set_design(RegisterSlice::new(ports.clone())),
        }

        let master = AxisMaster::new(sim, ports.s_axis.clone(), datatype)?;
        let backpressure = BitDriver::new(sim, ports.m_tready().clone());

        let gate = match dut.zero_latency() {
            true => Some(Event::new()),
            false => None,
        };
        let mut output = AxisMonitor::new(sim, ports.m_axis.clone(), datatype)?
            .reset(ports.aresetn.clone(), true);
        if let Some(gate) = &gate {
            output = output.release_gate(gate.clone());
        }
        // rebuilds the packets the design accepted and feeds them to the model
        let input = AxisMonitor::new(sim, ports.s_axis.clone(), datatype)?
            .name("s_axis accepted")
            .reset(ports.aresetn.clone(), true);

        let scoreboard = Scoreboard::new();
        scoreboard.register_interface("m_axis")?;
        scoreboard.attach(sim, "m_axis", output.start(4));

        let modeled = Shared::new(0);
        let mut accepted = input.start(4);
        let (sb, count) = (scoreboard.clone(), modeled.clone());
        sim.fork("model", async move {
            while let Some(packet) = accepted.next().await {
                info!("model: DUT accepted a packet of {} words", packet.len());
                sb.expect("m_axis", packet)?;
                *count.get_mut() += 1;
                if let Some(gate) = &gate {
                    gate.set();
                }
            }
            Ok(())
        });

        Ok(Self {
            sim: sim.clone(),
            ports,
            master,
            backpressure,
            scoreboard,
            output,
            input,
            modeled,
        })
    }

    pub async fn reset(&self) -> TbResult {
        let s = &self.ports.s_axis;
        self.ports.aresetn.set(0)?;
        s.tvalid.set(0)?;
        self.ports.s_tlast().set(0)?;
        s.tdata.set(0)?;
        self.ports.m_tready().set(0)?;
        utils::clock_cycles(&self.sim, 3).await;
        self.ports.aresetn.set(1)?;
        self.ports.m_tready().set(1)?;
        Ok(())
    }

    pub fn packets_modeled(&self) -> u64 {
        *self.modeled.get()
    }
}

/// Reset, send everything `config` generates, drain the pipeline and check
/// the results.
pub async fn run_test(
    sim: Sim,
    dut: Dut,
    config: GeneratorConfig,
    idle_inserter: Option<Pattern>,
    backpressure_inserter: Option<Pattern>,
    pipeline: u64,
) -> TbResult<ScoreboardSummary> {
    let datatype = match config.dtype {
        Dtype::Integer => Datatype::integer(TDATA_WIDTH)?,
        Dtype::Float => Datatype::fixed(TDATA_WIDTH, INTEGER_BITS)?,
    };
    let mut tb = StreamTb::new(&sim, dut, datatype)?;
    sim.rising_edge().await;
    tb.reset().await?;

    if idle_inserter.is_some() {
        tb.master.set_valid_generator(idle_inserter);
    }
    if let Some(pattern) = backpressure_inserter {
        tb.backpressure.start(pattern);
    }

    let mut npkts = 0;
    for packet in packet_generator(&config)? {
        tb.master.send(&packet).await?;
        npkts += 1;
    }

    tb.ports.s_axis.tvalid.set(0)?;
    tb.ports.s_tlast().set(0)?;

    utils::clock_cycles(&sim, pipeline).await;

    if npkts != tb.packets_modeled() {
        return Err(TbError::Test(format!(
            "driver queued {} packets to the DUT, but it accepted only {}",
            npkts,
            tb.packets_modeled()
        )));
    }
    info!("DUT correctly counted {} packets", npkts);
    tb.backpressure.stop();
    Ok(tb.scoreboard.finalize()?)
}
