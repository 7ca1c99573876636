//! Numeric data and packet generators.
//!
//! Every generator is a lazy iterator built from a [`GeneratorConfig`]. Data
//! generators yield one [`Value`] per call and never end; packet generators
//! yield `n_packets` packets and then stop.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use std::f64::consts::TAU;

use crate::codec::Value;
use crate::error::ConfigError;
use crate::packet::Packet;

/// Element type a generator produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dtype {
    #[serde(alias = "int")]
    Integer,
    Float,
}

impl Dtype {
    /// Integers are truncated towards zero, floats pass through.
    pub fn cast(&self, v: f64) -> Value {
        match self {
            Dtype::Integer => Value::Int(v.trunc() as i64),
            Dtype::Float => Value::Float(v),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    Uniform,
    Sinusoid,
    Additive,
    Constant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PacketKind {
    Ramp,
    Packetized,
}

fn default_dt() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneratorConfig {
    pub dtype: Dtype,
    #[serde(default)]
    pub lower: Option<f64>,
    #[serde(default)]
    pub upper: Option<f64>,
    #[serde(default)]
    pub packet_size: Option<usize>,
    #[serde(default)]
    pub n_packets: Option<usize>,
    #[serde(default)]
    pub freq: Option<f64>,
    #[serde(default = "default_dt")]
    pub dt: f64,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub data_generator: Option<DataKind>,
    #[serde(default)]
    pub packet_generator: Option<PacketKind>,
    #[serde(default)]
    pub sub_configs: Vec<GeneratorConfig>,
}

impl GeneratorConfig {
    pub fn new(dtype: Dtype) -> Self {
        Self {
            dtype,
            lower: None,
            upper: None,
            packet_size: None,
            n_packets: None,
            freq: None,
            dt: default_dt(),
            value: None,
            seed: None,
            data_generator: None,
            packet_generator: None,
            sub_configs: Vec::new(),
        }
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn bounds(mut self, lower: f64, upper: f64) -> Self {
        self.lower = Some(lower);
        self.upper = Some(upper);
        self
    }

    pub fn packets(mut self, packet_size: usize, n_packets: usize) -> Self {
        self.packet_size = Some(packet_size);
        self.n_packets = Some(n_packets);
        self
    }

    pub fn freq(mut self, freq: f64, dt: f64) -> Self {
        self.freq = Some(freq);
        self.dt = dt;
        self
    }

    pub fn value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn data(mut self, kind: DataKind) -> Self {
        self.data_generator = Some(kind);
        self
    }

    pub fn packet(mut self, kind: PacketKind) -> Self {
        self.packet_generator = Some(kind);
        self
    }

    pub fn sub(mut self, config: GeneratorConfig) -> Self {
        self.sub_configs.push(config);
        self
    }

    fn bounds_checked(&self) -> Result<(f64, f64), ConfigError> {
        let lower = self.lower.ok_or(ConfigError::Missing("lower"))?;
        let upper = self.upper.ok_or(ConfigError::Missing("upper"))?;
        if !(lower < upper) {
            return Err(ConfigError::Invalid(format!(
                "lower bound {} is not below upper bound {}",
                lower, upper
            )));
        }
        Ok((lower, upper))
    }

    fn packet_shape(&self) -> Result<(usize, usize), ConfigError> {
        let size = self.packet_size.ok_or(ConfigError::Missing("packet_size"))?;
        let count = self.n_packets.ok_or(ConfigError::Missing("n_packets"))?;
        if size == 0 {
            return Err(ConfigError::Invalid("packet_size must not be 0".to_string()));
        }
        Ok((size, count))
    }
}

pub type DataGenerator = Box<dyn Iterator<Item = Value>>;
pub type PacketGenerator = Box<dyn Iterator<Item = Packet>>;

/// Builds the value generator selected by `data_generator`.
pub fn data_generator(config: &GeneratorConfig) -> Result<DataGenerator, ConfigError> {
    let kind = config
        .data_generator
        .ok_or(ConfigError::Missing("data_generator"))?;
    Ok(match kind {
        DataKind::Uniform => Box::new(uniform(config)?),
        DataKind::Sinusoid => Box::new(sinusoid(config)?),
        DataKind::Additive => Box::new(additive(config)?),
        DataKind::Constant => Box::new(constant(config)?),
    })
}

/// Builds the packet generator selected by `packet_generator`.
pub fn packet_generator(config: &GeneratorConfig) -> Result<PacketGenerator, ConfigError> {
    let kind = config
        .packet_generator
        .ok_or(ConfigError::Missing("packet_generator"))?;
    Ok(match kind {
        PacketKind::Ramp => Box::new(ramp_packets(config)?),
        PacketKind::Packetized => Box::new(packetized(config)?),
    })
}

/// `amplitude * sin(2 * pi * i / w) + offset` for `i` in `0..int(w)`, repeated.
#[derive(Debug, Clone)]
pub struct SineWave {
    amplitude: f64,
    w: f64,
    offset: f64,
    idx: u64,
}

impl SineWave {
    pub fn new(amplitude: f64, w: f64, offset: f64) -> Self {
        Self {
            amplitude,
            w,
            offset,
            idx: 0,
        }
    }

    pub fn reset(&mut self) {
        self.idx = 0;
    }
}

impl Iterator for SineWave {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        let period = (self.w as u64).max(1);
        let sample = self.amplitude * (TAU * self.idx as f64 / self.w).sin() + self.offset;
        self.idx = (self.idx + 1) % period;
        Some(sample)
    }
}

pub struct Uniform {
    rng: StdRng,
    lower: f64,
    upper: f64,
    dtype: Dtype,
}

/// Uniformly distributed values in `[lower, upper)`.
pub fn uniform(config: &GeneratorConfig) -> Result<Uniform, ConfigError> {
    let (lower, upper) = config.bounds_checked()?;
    if config.dtype == Dtype::Integer && (lower.fract() != 0.0 || upper.fract() != 0.0) {
        return Err(ConfigError::Invalid(format!(
            "integer bounds must be whole numbers, got [{}, {})",
            lower, upper
        )));
    }
    let rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    Ok(Uniform {
        rng,
        lower,
        upper,
        dtype: config.dtype,
    })
}

impl Iterator for Uniform {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        Some(match self.dtype {
            Dtype::Integer => Value::Int(self.rng.gen_range(self.lower as i64..self.upper as i64)),
            Dtype::Float => Value::Float(self.rng.gen_range(self.lower..self.upper)),
        })
    }
}

pub struct Sinusoid {
    wave: SineWave,
    dtype: Dtype,
}

/// A sine swinging between `lower` and `upper` with `1 / freq / dt` samples per period.
pub fn sinusoid(config: &GeneratorConfig) -> Result<Sinusoid, ConfigError> {
    let (lower, upper) = config.bounds_checked()?;
    let freq = config.freq.ok_or(ConfigError::Missing("freq"))?;
    let w = 1.0 / freq / config.dt;
    if !w.is_finite() || w < 1.0 {
        return Err(ConfigError::Invalid(format!(
            "freq {} and dt {} give less than one sample per period",
            freq, config.dt
        )));
    }
    let amplitude = (upper - lower) / 2.0;
    let offset = (upper + lower) / 2.0;
    Ok(Sinusoid {
        wave: SineWave::new(amplitude, w, offset),
        dtype: config.dtype,
    })
}

impl Iterator for Sinusoid {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        self.wave.next().map(|v| self.dtype.cast(v))
    }
}

pub struct Constant(Value);

pub fn constant(config: &GeneratorConfig) -> Result<Constant, ConfigError> {
    let value = config.value.ok_or(ConfigError::Missing("value"))?;
    Ok(Constant(config.dtype.cast(value)))
}

impl Iterator for Constant {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        Some(self.0)
    }
}

pub struct Additive {
    generators: Vec<DataGenerator>,
    dtype: Dtype,
}

/// Sum of one value from each sub-generator per call.
pub fn additive(config: &GeneratorConfig) -> Result<Additive, ConfigError> {
    if config.sub_configs.is_empty() {
        return Err(ConfigError::Missing("sub_configs"));
    }
    let generators = config
        .sub_configs
        .iter()
        .map(data_generator)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Additive {
        generators,
        dtype: config.dtype,
    })
}

impl Iterator for Additive {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        let mut total = 0.0;
        for gen in self.generators.iter_mut() {
            total += gen.next()?.as_f64();
        }
        Some(self.dtype.cast(total))
    }
}

pub struct RampPackets {
    lower: f64,
    step: f64,
    packet_size: usize,
    remaining: usize,
    dtype: Dtype,
}

/// `n_packets` ramps of `packet_size` evenly spaced samples from `lower` up to,
/// but not including, `upper`.
pub fn ramp_packets(config: &GeneratorConfig) -> Result<RampPackets, ConfigError> {
    let (lower, upper) = config.bounds_checked()?;
    let (packet_size, n_packets) = config.packet_shape()?;
    Ok(RampPackets {
        lower,
        step: (upper - lower) / packet_size as f64,
        packet_size,
        remaining: n_packets,
        dtype: config.dtype,
    })
}

impl Iterator for RampPackets {
    type Item = Packet;

    fn next(&mut self) -> Option<Packet> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        Some(
            (0..self.packet_size)
                .map(|i| self.dtype.cast(self.lower + i as f64 * self.step))
                .collect(),
        )
    }
}

pub struct Packetized {
    data: DataGenerator,
    packet_size: usize,
    remaining: usize,
}

/// `n_packets` packets of `packet_size` values drawn from the `data_generator`.
pub fn packetized(config: &GeneratorConfig) -> Result<Packetized, ConfigError> {
    let (packet_size, n_packets) = config.packet_shape()?;
    Ok(Packetized {
        data: data_generator(config)?,
        packet_size,
        remaining: n_packets,
    })
}

impl Iterator for Packetized {
    type Item = Packet;

    fn next(&mut self) -> Option<Packet> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let packet: Packet = self.data.by_ref().take(self.packet_size).collect();
        if packet.len() < self.packet_size {
            return None;
        }
        Some(packet)
    }
}
