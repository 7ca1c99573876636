pub use crate::backpressure::BitDriver;
pub use crate::bus::AxisBus;
pub use crate::codec::{decode, encode, BusWord, Datatype, Fixed, Value};
pub use crate::driver::AxisMaster;
pub use crate::error::{
    CodecError, ConfigError, PatternError, ScoreboardError, SimError, TbError,
};
pub use crate::event::Event;
pub use crate::executor::JoinHandle;
pub use crate::monitor::AxisMonitor;
pub use crate::numeric::{
    data_generator, packet_generator, DataKind, Dtype, GeneratorConfig, PacketKind,
};
pub use crate::packet::Packet;
pub use crate::pattern::{Pattern, Run, RunSource};
pub use crate::scoreboard::{Scoreboard, ScoreboardFailure, ScoreboardSummary};
pub use crate::shared::Shared;
pub use crate::signal::Signal;
pub use crate::sim::{Design, Phase, Sim};
pub use crate::utils;
pub use crate::TbResult;
pub use futures::future::FutureExt;
pub use futures::StreamExt;
