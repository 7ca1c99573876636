//! Cycle-based verification of AXI4-Stream style interfaces.
//!
//! Testbench components run as cooperative tasks on an in-process clock
//! kernel ([`sim::Sim`]). An [`driver::AxisMaster`] drives packets,
//! [`monitor::AxisMonitor`]s rebuild them from what the bus actually
//! transferred and a [`scoreboard::Scoreboard`] compares the two streams in
//! order.

pub mod backpressure;
pub mod bus;
pub mod codec;
pub mod driver;
pub mod error;
pub mod event;
mod executor;
pub mod monitor;
pub mod numeric;
pub mod packet;
pub mod pattern;
pub mod prelude;
pub mod scoreboard;
mod shared;
mod signal;
pub mod sim;
mod trigger;
pub mod utils;

pub use error::TbError;
pub use executor::JoinHandle;
pub use shared::Shared;
pub use signal::Signal;
pub use trigger::{TrigKind, Trigger};

pub type TbResult<T = ()> = Result<T, TbError>;
