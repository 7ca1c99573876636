use std::fmt;

use crate::codec::{Datatype, Value};
use crate::scoreboard::ScoreboardFailure;

/// Errors raised by the simulation kernel and signal access.
#[derive(Debug, Clone, PartialEq)]
pub enum SimError {
    UnknownSignal(String),
    DuplicateSignal(String),
    InvalidWidth { signal: String, width: u32 },
    WriteInReadOnly { signal: String },
    Unresolved { signal: String },
    ValueTooWide { signal: String, value: u64, width: u32 },
    Timeout { cycles: u64 },
    Design(String),
    Closed,
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::UnknownSignal(name) => write!(f, "no signal named '{}'", name),
            Self::DuplicateSignal(name) => write!(f, "signal '{}' declared twice", name),
            Self::InvalidWidth { signal, width } => {
                write!(f, "signal '{}' can't be {} bits wide", signal, width)
            }
            Self::WriteInReadOnly { signal } => {
                write!(f, "can't drive '{}' during the read-only phase", signal)
            }
            Self::Unresolved { signal } => write!(f, "signal '{}' is undefined", signal),
            Self::ValueTooWide {
                signal,
                value,
                width,
            } => write!(
                f,
                "value {:#x} does not fit into {} bits of '{}'",
                value, width, signal
            ),
            Self::Timeout { cycles } => write!(f, "test did not finish within {} cycles", cycles),
            Self::Design(msg) => write!(f, "design failure: {}", msg),
            Self::Closed => write!(f, "simulation is gone"),
        }
    }
}

impl std::error::Error for SimError {}

/// Errors raised when converting between values and bus words.
#[derive(Debug, Clone, PartialEq)]
pub enum CodecError {
    Overflow { value: Value, datatype: Datatype },
    TypeMismatch { value: Value, datatype: Datatype },
    UnsupportedWidth { datatype: Datatype },
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Overflow { value, datatype } => {
                write!(f, "overflow error fitting {} into {}", value, datatype)
            }
            Self::TypeMismatch { value, datatype } => {
                write!(f, "can't encode {} as {}", value, datatype)
            }
            Self::UnsupportedWidth { datatype } => {
                write!(f, "{} does not fit into a 64 bit bus word", datatype)
            }
        }
    }
}

impl std::error::Error for CodecError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    /// A finite pattern ran out before the driver or controller was done with it.
    Exhausted,
    /// Too many runs in a row without the cycles asked for.
    Stuck { runs: u32 },
    Invalid(String),
}

impl fmt::Display for PatternError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Exhausted => write!(f, "pattern exhausted"),
            Self::Stuck { runs } => {
                write!(f, "pattern gave {} runs in a row with no asserted cycle", runs)
            }
            Self::Invalid(msg) => write!(f, "invalid pattern: {}", msg),
        }
    }
}

impl std::error::Error for PatternError {}

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(String),
    Yaml(serde_yaml::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Missing(key) => write!(f, "generator config is missing '{}'", key),
            Self::Invalid(msg) => write!(f, "invalid generator config: {}", msg),
            Self::Yaml(e) => write!(f, "can't parse generator config: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Yaml(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Yaml(e)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScoreboardError {
    /// An actual packet arrived while the expected queue was empty.
    Underflow { interface: String, index: usize },
    UnknownInterface(String),
    DuplicateInterface(String),
}

impl fmt::Display for ScoreboardError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Underflow { interface, index } => write!(
                f,
                "{}: received packet #{} but nothing was expected",
                interface, index
            ),
            Self::UnknownInterface(name) => write!(f, "no scoreboard interface '{}'", name),
            Self::DuplicateInterface(name) => {
                write!(f, "scoreboard interface '{}' registered twice", name)
            }
        }
    }
}

impl std::error::Error for ScoreboardError {}

/// Everything that can end a testbench run.
#[derive(Debug)]
pub enum TbError {
    Sim(SimError),
    Codec(CodecError),
    Pattern(PatternError),
    Config(ConfigError),
    Scoreboard(ScoreboardError),
    Failed(ScoreboardFailure),
    Test(String),
}

impl fmt::Display for TbError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Sim(e) => e.fmt(f),
            Self::Codec(e) => e.fmt(f),
            Self::Pattern(e) => e.fmt(f),
            Self::Config(e) => e.fmt(f),
            Self::Scoreboard(e) => e.fmt(f),
            Self::Failed(e) => e.fmt(f),
            Self::Test(msg) => write!(f, "test failed: {}", msg),
        }
    }
}

impl std::error::Error for TbError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Sim(e) => Some(e),
            Self::Codec(e) => Some(e),
            Self::Pattern(e) => Some(e),
            Self::Config(e) => Some(e),
            Self::Scoreboard(e) => Some(e),
            Self::Failed(e) => Some(e),
            Self::Test(_) => None,
        }
    }
}

impl From<SimError> for TbError {
    fn from(e: SimError) -> Self {
        Self::Sim(e)
    }
}

impl From<CodecError> for TbError {
    fn from(e: CodecError) -> Self {
        Self::Codec(e)
    }
}

impl From<PatternError> for TbError {
    fn from(e: PatternError) -> Self {
        Self::Pattern(e)
    }
}

impl From<ConfigError> for TbError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<ScoreboardError> for TbError {
    fn from(e: ScoreboardError) -> Self {
        Self::Scoreboard(e)
    }
}

impl From<ScoreboardFailure> for TbError {
    fn from(e: ScoreboardFailure) -> Self {
        Self::Failed(e)
    }
}
