use std::fmt;
use std::ops::Deref;

use crate::codec::Value;

/// An ordered list of decoded values, one per transfer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Packet(Vec<Value>);

impl Packet {
    pub fn new() -> Self {
        Packet(Vec::new())
    }

    pub fn push(&mut self, value: Value) {
        self.0.push(value);
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn into_values(self) -> Vec<Value> {
        self.0
    }

    /// A packet of plain integers.
    pub fn ints(values: impl IntoIterator<Item = i64>) -> Self {
        values.into_iter().map(Value::Int).collect()
    }

    /// A packet of floating point values.
    pub fn floats(values: impl IntoIterator<Item = f64>) -> Self {
        values.into_iter().map(Value::Float).collect()
    }
}

impl Deref for Packet {
    type Target = [Value];

    fn deref(&self) -> &[Value] {
        &self.0
    }
}

impl From<Vec<Value>> for Packet {
    fn from(values: Vec<Value>) -> Self {
        Packet(values)
    }
}

impl FromIterator<Value> for Packet {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Packet(iter.into_iter().collect())
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // long packets are cut down to their head and tail
        const SHOWN: usize = 4;
        write!(f, "[")?;
        if self.0.len() <= 2 * SHOWN {
            for (i, v) in self.0.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", v)?;
            }
        } else {
            for v in &self.0[..SHOWN] {
                write!(f, "{}, ", v)?;
            }
            write!(f, "..")?;
            for v in &self.0[self.0.len() - SHOWN..] {
                write!(f, ", {}", v)?;
            }
        }
        write!(f, "] ({} words)", self.0.len())
    }
}
