use std::fmt;

use serde::{Deserialize, Serialize};

/// Session identifier handed out by the sensor manager.
pub type SessionId = i32;

/// Measurement envelope of a sensor: `[min, max]` at `resolution`.
///
/// Carried on the bus as `(ddd)`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "system-bus", derive(zbus::zvariant::Type))]
pub struct DataRange {
    pub min: f64,
    pub max: f64,
    pub resolution: f64,
}

impl DataRange {
    pub fn new(min: f64, max: f64, resolution: f64) -> Self {
        Self {
            min,
            max,
            resolution,
        }
    }
}

impl fmt::Display for DataRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}] @ {}", self.min, self.max, self.resolution)
    }
}

/// Inclusive unsigned range, carried on the bus as `(uu)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "system-bus", derive(zbus::zvariant::Type))]
pub struct IntegerRange {
    pub min: u32,
    pub max: u32,
}

impl IntegerRange {
    pub fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: u32) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

impl fmt::Display for IntegerRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}

/// Positional call argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Int(i32),
    UInt(u32),
    Long(i64),
    Bool(bool),
    Str(String),
    Range(DataRange),
}

impl From<i32> for Arg {
    fn from(value: i32) -> Self {
        Arg::Int(value)
    }
}

impl From<u32> for Arg {
    fn from(value: u32) -> Self {
        Arg::UInt(value)
    }
}

impl From<i64> for Arg {
    fn from(value: i64) -> Self {
        Arg::Long(value)
    }
}

impl From<bool> for Arg {
    fn from(value: bool) -> Self {
        Arg::Bool(value)
    }
}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Arg::Str(value.to_string())
    }
}

impl From<DataRange> for Arg {
    fn from(value: DataRange) -> Self {
        Arg::Range(value)
    }
}

/// Dynamically typed reply or property value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Unit,
    Int(i32),
    UInt(u32),
    Long(i64),
    Bool(bool),
    Str(String),
    Range(DataRange),
    Ranges(Vec<DataRange>),
    IntegerRanges(Vec<IntegerRange>),
}

/// Shape of a [`Value`], used to tell the bus how to decode a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Unit,
    Int,
    UInt,
    Long,
    Bool,
    Str,
    Range,
    Ranges,
    IntegerRanges,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Unit => "unit",
            ValueKind::Int => "int32",
            ValueKind::UInt => "uint32",
            ValueKind::Long => "int64",
            ValueKind::Bool => "bool",
            ValueKind::Str => "string",
            ValueKind::Range => "data range",
            ValueKind::Ranges => "data range list",
            ValueKind::IntegerRanges => "integer range list",
        };
        f.write_str(name)
    }
}

/// Narrowing from a dynamically typed [`Value`].
pub trait FromValue: Sized {
    /// Kind the bus should decode the reply as.
    const KIND: ValueKind;

    /// Narrow `value`, or `None` if it has an incompatible shape.
    fn from_value(value: Value) -> Option<Self>;
}

impl FromValue for () {
    const KIND: ValueKind = ValueKind::Unit;

    fn from_value(_value: Value) -> Option<Self> {
        Some(())
    }
}

impl FromValue for i32 {
    const KIND: ValueKind = ValueKind::Int;

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Int(v) => Some(v),
            Value::UInt(v) => i32::try_from(v).ok(),
            Value::Long(v) => i32::try_from(v).ok(),
            _ => None,
        }
    }
}

impl FromValue for u32 {
    const KIND: ValueKind = ValueKind::UInt;

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::UInt(v) => Some(v),
            Value::Int(v) => u32::try_from(v).ok(),
            Value::Long(v) => u32::try_from(v).ok(),
            _ => None,
        }
    }
}

impl FromValue for i64 {
    const KIND: ValueKind = ValueKind::Long;

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Long(v) => Some(v),
            Value::Int(v) => Some(i64::from(v)),
            Value::UInt(v) => Some(i64::from(v)),
            _ => None,
        }
    }
}

impl FromValue for bool {
    const KIND: ValueKind = ValueKind::Bool;

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Bool(v) => Some(v),
            _ => None,
        }
    }
}

impl FromValue for String {
    const KIND: ValueKind = ValueKind::Str;

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Str(v) => Some(v),
            _ => None,
        }
    }
}

impl FromValue for DataRange {
    const KIND: ValueKind = ValueKind::Range;

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Range(v) => Some(v),
            _ => None,
        }
    }
}

impl FromValue for Vec<DataRange> {
    const KIND: ValueKind = ValueKind::Ranges;

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Ranges(v) => Some(v),
            _ => None,
        }
    }
}

impl FromValue for Vec<IntegerRange> {
    const KIND: ValueKind = ValueKind::IntegerRanges;

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::IntegerRanges(v) => Some(v),
            _ => None,
        }
    }
}
