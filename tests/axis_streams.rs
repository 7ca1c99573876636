mod common;

use axistb::prelude::*;
use common::{init_logging, run_test, Dut};
use rstest::rstest;

const MAX_CYCLES: u64 = 500_000;
const PIPELINE: u64 = 32;

#[derive(Debug, Clone, Copy)]
enum Data {
    Ramp,
    Random,
    Sine,
}

impl Data {
    fn config(self) -> GeneratorConfig {
        match self {
            Data::Ramp => GeneratorConfig::new(Dtype::Integer)
                .packet(PacketKind::Ramp)
                .bounds(0.0, 128.0)
                .packets(128, 6),
            Data::Random => GeneratorConfig::new(Dtype::Integer)
                .packet(PacketKind::Packetized)
                .data(DataKind::Uniform)
                .bounds(-128.0, 128.0)
                .packets(256, 4),
            Data::Sine => GeneratorConfig::new(Dtype::Float)
                .packet(PacketKind::Packetized)
                .data(DataKind::Sinusoid)
                .bounds(-1.0, 0.99999)
                .freq(488281.25, 8e-9)
                .packets(256, 4),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Inserter {
    Wave,
    IntermittentSingleCycles,
    Random50Percent,
}

impl Inserter {
    fn pattern(self) -> Pattern {
        match self {
            Inserter::Wave => Pattern::wave(),
            Inserter::IntermittentSingleCycles => {
                Pattern::intermittent_single_cycles(10.0, None).unwrap()
            }
            Inserter::Random50Percent => Pattern::random_50_percent(),
        }
    }
}

fn run(
    dut: Dut,
    config: GeneratorConfig,
    idle: Option<Inserter>,
    backpressure: Option<Inserter>,
) -> TbResult<ScoreboardSummary> {
    init_logging();
    let sim = Sim::new();
    let test = run_test(
        sim.clone(),
        dut,
        config,
        idle.map(Inserter::pattern),
        backpressure.map(Inserter::pattern),
        PIPELINE,
    );
    sim.run(MAX_CYCLES, test)
}

#[rstest]
fn idle_and_backpressure(
    #[values(Dut::PassThrough, Dut::RegisterSlice)] dut: Dut,
    #[values(Data::Ramp, Data::Random, Data::Sine)] data: Data,
    #[values(
        None,
        Some(Inserter::Wave),
        Some(Inserter::IntermittentSingleCycles),
        Some(Inserter::Random50Percent)
    )]
    idle: Option<Inserter>,
    #[values(
        None,
        Some(Inserter::Wave),
        Some(Inserter::IntermittentSingleCycles),
        Some(Inserter::Random50Percent)
    )]
    backpressure: Option<Inserter>,
) {
    let config = data.config();
    let n_packets = config.n_packets.unwrap();
    let summary = match run(dut, config, idle, backpressure) {
        Ok(summary) => summary,
        Err(e) => panic!("{}", e),
    };
    let m_axis = &summary.interfaces[0];
    assert_eq!(m_axis.expected, n_packets);
    assert_eq!(m_axis.matched, n_packets);
}

#[rstest]
#[case(Dut::PassThrough)]
#[case(Dut::RegisterSlice)]
fn signal_plus_noise(#[case] dut: Dut) {
    let config = GeneratorConfig::from_yaml(
        r#"
packet_generator: packetized
data_generator: additive
packet_size: 1024
n_packets: 4
dtype: float
sub_configs:
  - data_generator: uniform
    lower: -0.5
    upper: 0.5
    dtype: float
  - data_generator: sinusoid
    lower: -0.5
    upper: 0.5
    dt: 8.0e-9
    freq: 488281.25
    dtype: float
"#,
    )
    .unwrap();
    let summary = run(dut, config, None, None).unwrap();
    assert_eq!(summary.interfaces[0].matched, 4);
}

#[test]
fn corrupted_data_fails_scoreboard() {
    let config = Data::Ramp.config();
    match run(Dut::BrokenPassThrough, config, None, None) {
        Err(TbError::Failed(failure)) => {
            // every packet differs in its first word
            assert_eq!(failure.mismatches.len(), 6);
            assert!(failure.underflows.is_empty());
            assert!(failure.leftovers.is_empty());
        }
        other => panic!("expected a scoreboard failure, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn overflow_aborts_the_run() {
    let config = GeneratorConfig::new(Dtype::Float)
        .packet(PacketKind::Packetized)
        .data(DataKind::Constant)
        .value(1.5)
        .packets(8, 2);
    match run(Dut::RegisterSlice, config, None, None) {
        Err(TbError::Codec(CodecError::Overflow { value, datatype })) => {
            assert_eq!(value, Value::Float(1.5));
            assert_eq!(datatype, Datatype::fixed(16, 1).unwrap());
        }
        other => panic!("expected an overflow, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn backpressure_gates_first_transfer() {
    init_logging();
    let sim = Sim::new();
    let bus = AxisBus::declare(&sim, "s_axis", 8, true, true).unwrap();
    let ready = bus.tready.clone().unwrap();
    let first = Shared::new(None);
    let seen = first.clone();
    let tb = sim.clone();
    sim.run(100, async move {
        let mut master = AxisMaster::new(&tb, bus.clone(), Datatype::integer(8)?)?;
        let mut bp = BitDriver::new(&tb, ready);
        let mon = AxisMonitor::new(&tb, bus, Datatype::integer(8)?)?;
        let mut rx = mon.start(1);
        let probe = tb.clone();
        tb.spawn("first", async move {
            rx.next().await;
            seen.get_mut().replace(probe.cycle());
        });

        tb.rising_edge().await;
        // low in cycles 1 to 5
        bp.start(Pattern::from_bits(&[false; 5]).then(Pattern::constant()));
        master.send(&Packet::ints([1])).await?;
        tb.rising_edge_ro().await;
        Ok(())
    })
    .unwrap();
    assert_eq!(*first.get(), Some(6));
}

#[test]
fn stalled_consumer_times_out() {
    init_logging();
    let sim = Sim::new();
    let bus = AxisBus::declare(&sim, "s_axis", 8, true, true).unwrap();
    bus.tready.as_ref().unwrap().set(0).unwrap();
    let tb = sim.clone();
    let result = sim.run(50, async move {
        let mut master = AxisMaster::new(&tb, bus, Datatype::integer(8)?)?;
        master.send(&Packet::ints([1, 2, 3])).await
    });
    assert!(matches!(
        result,
        Err(TbError::Sim(SimError::Timeout { cycles: 50 }))
    ));
}
