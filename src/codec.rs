//! Conversion between application values and fixed-width bus words.
//!
//! A bus word is always a two's-complement bit pattern. How it is read back
//! depends on the [`Datatype`] the driver or monitor was built with.

use std::fmt;

use crate::error::CodecError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Datatype {
    /// Two's-complement integer of the given width.
    Integer(u32),
    /// Two's-complement fixed point number. `integer_bits` includes the sign
    /// bit, the remaining bits are fractional.
    FixedPoint { total_bits: u32, integer_bits: u32 },
}

impl Datatype {
    pub fn integer(width: u32) -> Result<Self, CodecError> {
        let dt = Datatype::Integer(width);
        dt.validate()?;
        Ok(dt)
    }

    pub fn fixed(total_bits: u32, integer_bits: u32) -> Result<Self, CodecError> {
        let dt = Datatype::FixedPoint {
            total_bits,
            integer_bits,
        };
        dt.validate()?;
        Ok(dt)
    }

    pub fn width(&self) -> u32 {
        match *self {
            Datatype::Integer(width) => width,
            Datatype::FixedPoint { total_bits, .. } => total_bits,
        }
    }

    pub fn fraction_bits(&self) -> u32 {
        match *self {
            Datatype::Integer(_) => 0,
            Datatype::FixedPoint {
                total_bits,
                integer_bits,
            } => total_bits - integer_bits,
        }
    }

    pub fn validate(&self) -> Result<(), CodecError> {
        let ok = match *self {
            Datatype::Integer(width) => (1..=64).contains(&width),
            Datatype::FixedPoint {
                total_bits,
                integer_bits,
            } => (1..=64).contains(&total_bits) && integer_bits >= 1 && integer_bits <= total_bits,
        };
        match ok {
            true => Ok(()),
            false => Err(CodecError::UnsupportedWidth { datatype: *self }),
        }
    }

    /// Smallest and largest raw (scaled) value a word of this type can hold.
    pub fn raw_range(&self) -> (i64, i64) {
        let width = self.width();
        if width >= 64 {
            (i64::MIN, i64::MAX)
        } else {
            (-(1i64 << (width - 1)), (1i64 << (width - 1)) - 1)
        }
    }
}

impl fmt::Display for Datatype {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Datatype::Integer(width) => write!(f, "int{}", width),
            Datatype::FixedPoint {
                total_bits,
                integer_bits,
            } => write!(f, "fixed<{},{}>", total_bits, integer_bits),
        }
    }
}

/// A fixed point number, stored as its scaled two's-complement integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fixed {
    pub raw: i64,
    pub total_bits: u32,
    pub integer_bits: u32,
}

impl Fixed {
    pub fn datatype(&self) -> Datatype {
        Datatype::FixedPoint {
            total_bits: self.total_bits,
            integer_bits: self.integer_bits,
        }
    }

    pub fn to_f64(&self) -> f64 {
        self.raw as f64 / 2f64.powi(self.datatype().fraction_bits() as i32)
    }
}

impl fmt::Display for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_f64())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Fixed(Fixed),
}

impl Value {
    pub fn as_f64(&self) -> f64 {
        match *self {
            Value::Int(v) => v as f64,
            Value::Float(v) => v,
            Value::Fixed(v) => v.to_f64(),
        }
    }

    /// True if both values carry the same element type. Fixed point values
    /// only agree if their formats do.
    pub fn same_type(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(_), Value::Int(_)) | (Value::Float(_), Value::Float(_)) => true,
            (Value::Fixed(a), Value::Fixed(b)) => a.datatype() == b.datatype(),
            _ => false,
        }
    }

    pub fn type_name(&self) -> String {
        match self {
            Value::Int(_) => "int".to_string(),
            Value::Float(_) => "float".to_string(),
            Value::Fixed(v) => v.datatype().to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Fixed(v) => write!(f, "{}", v),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<Fixed> for Value {
    fn from(v: Fixed) -> Self {
        Value::Fixed(v)
    }
}

/// Raw bits as they appear on a data signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusWord {
    pub bits: u64,
    pub width: u32,
}

impl BusWord {
    pub fn new(bits: u64, width: u32) -> Self {
        Self {
            bits: bits & mask(width),
            width,
        }
    }

    pub fn signed(&self) -> i64 {
        sign_extend(self.bits, self.width)
    }
}

pub fn encode(value: &Value, datatype: Datatype) -> Result<BusWord, CodecError> {
    datatype.validate()?;
    let (min, max) = datatype.raw_range();
    let overflow = || CodecError::Overflow {
        value: *value,
        datatype,
    };

    let raw = match (datatype, value) {
        (Datatype::Integer(_), Value::Int(v)) => *v,
        (Datatype::Integer(_), _) => {
            return Err(CodecError::TypeMismatch {
                value: *value,
                datatype,
            })
        }
        (Datatype::FixedPoint { .. }, Value::Fixed(v)) if v.datatype() == datatype => v.raw,
        (Datatype::FixedPoint { .. }, v) => {
            // Surplus fractional bits are truncated towards -inf, like dropping LSBs.
            let scaled = (v.as_f64() * 2f64.powi(datatype.fraction_bits() as i32)).floor();
            // i64::MAX is not representable as f64, compare against 2^(width-1) instead
            let limit = 2f64.powi(datatype.width() as i32 - 1);
            if !scaled.is_finite() || scaled < -limit || scaled >= limit {
                return Err(overflow());
            }
            scaled as i64
        }
    };

    if raw < min || raw > max {
        return Err(overflow());
    }
    Ok(BusWord::new(raw as u64, datatype.width()))
}

pub fn decode(word: BusWord, datatype: Datatype) -> Value {
    let width = datatype.width();
    let raw = sign_extend(word.bits & mask(width), width);
    match datatype {
        Datatype::Integer(_) => Value::Int(raw),
        Datatype::FixedPoint {
            total_bits,
            integer_bits,
        } => Value::Fixed(Fixed {
            raw,
            total_bits,
            integer_bits,
        }),
    }
}

pub(crate) fn mask(width: u32) -> u64 {
    match width {
        0 => 0,
        w if w >= 64 => u64::MAX,
        w => (1u64 << w) - 1,
    }
}

fn sign_extend(bits: u64, width: u32) -> i64 {
    match width {
        0 => 0,
        w if w >= 64 => bits as i64,
        w => {
            let shift = 64 - w;
            ((bits << shift) as i64) >> shift
        }
    }
}
