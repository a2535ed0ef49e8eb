//! Logical scalar values and their storage conversions.
//!
//! The schema distinguishes integer and float widths and describes
//! timestamps, durations, dates and decimals as structured values. A
//! [`ScalarValue`] carries exactly that logical shape; converting it to
//! storage fails when the shape does not match the schema, it is never
//! coerced.

use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, TimeDelta, Utc};
use msgshape_core::{FloatSchema, IntegerSchema, ScalarSchema};
use rust_decimal::Decimal;

use crate::error::BindErrorKind;
use crate::message::{DynamicMessage, Value};

type Result<T> = std::result::Result<T, BindErrorKind>;

/// A scalar in the schema's logical value space.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Bool(bool),
    String(String),
    Bytes(Vec<u8>),
    Int32(i32),
    Int64(i64),
    Uint32(u32),
    Uint64(u64),
    Float32(f32),
    Float64(f64),
    Timestamp(DateTime<Utc>),
    Duration(TimeDelta),
    Date(NaiveDate),
    Decimal(Decimal),
}

impl ScalarValue {
    /// Logical shape name, aligned with [`ScalarSchema::format_name`].
    pub fn shape(&self) -> &'static str {
        match self {
            ScalarValue::Bool(_) => "boolean",
            ScalarValue::String(_) => "string",
            ScalarValue::Bytes(_) => "byte",
            ScalarValue::Int32(_) => "int32",
            ScalarValue::Int64(_) => "int64",
            ScalarValue::Uint32(_) => "uint32",
            ScalarValue::Uint64(_) => "uint64",
            ScalarValue::Float32(_) => "float32",
            ScalarValue::Float64(_) => "float64",
            ScalarValue::Timestamp(_) => "date-time",
            ScalarValue::Duration(_) => "duration",
            ScalarValue::Date(_) => "date",
            ScalarValue::Decimal(_) => "decimal",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScalarValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Converts to the storage representation of `schema`.
    ///
    /// # Errors
    ///
    /// [`BindErrorKind::WrongShape`] when the value does not have the
    /// schema's logical shape. Every string format accepts a string.
    pub fn to_storage(self, schema: &ScalarSchema) -> Result<Value> {
        let value = match (schema, self) {
            (ScalarSchema::Bool, ScalarValue::Bool(b)) => Value::Bool(b),
            (ScalarSchema::String { .. }, ScalarValue::String(s)) => Value::String(s),
            (ScalarSchema::Bytes { .. }, ScalarValue::Bytes(b)) => Value::Bytes(b),
            (ScalarSchema::Integer(IntegerSchema::Int32(_)), ScalarValue::Int32(n)) => {
                Value::I32(n)
            }
            (ScalarSchema::Integer(IntegerSchema::Int64(_)), ScalarValue::Int64(n)) => {
                Value::I64(n)
            }
            (ScalarSchema::Integer(IntegerSchema::Uint32(_)), ScalarValue::Uint32(n)) => {
                Value::U32(n)
            }
            (ScalarSchema::Integer(IntegerSchema::Uint64(_)), ScalarValue::Uint64(n)) => {
                Value::U64(n)
            }
            (ScalarSchema::Float(FloatSchema::Float32(_)), ScalarValue::Float32(n)) => {
                Value::F32(n)
            }
            (ScalarSchema::Float(FloatSchema::Float64(_)), ScalarValue::Float64(n)) => {
                Value::F64(n)
            }
            (ScalarSchema::Timestamp, ScalarValue::Timestamp(t)) => {
                seconds_nanos(t.timestamp(), t.timestamp_subsec_nanos() as i32)
            }
            (ScalarSchema::Duration, ScalarValue::Duration(d)) => {
                seconds_nanos(d.num_seconds(), d.subsec_nanos())
            }
            (ScalarSchema::Date, ScalarValue::Date(d)) => {
                let mut msg = DynamicMessage::new();
                msg.set_field(1, Value::I32(d.year()));
                msg.set_field(2, Value::I32(d.month() as i32));
                msg.set_field(3, Value::I32(d.day() as i32));
                Value::Message(msg)
            }
            (ScalarSchema::Decimal, ScalarValue::Decimal(d)) => {
                let mut msg = DynamicMessage::new();
                msg.set_field(1, Value::String(d.to_string()));
                Value::Message(msg)
            }
            (schema, value) => {
                return Err(BindErrorKind::WrongShape {
                    expected: schema.format_name(),
                    found: value.shape(),
                });
            }
        };
        Ok(value)
    }

    /// Reads a stored value as `schema` describes it.
    ///
    /// Missing fields of structured values read as zero.
    ///
    /// # Errors
    ///
    /// [`BindErrorKind::StorageMismatch`] when the stored value has the
    /// wrong representation, [`BindErrorKind::InvalidValue`] when it is out
    /// of range for the logical type.
    pub fn from_storage(schema: &ScalarSchema, value: &Value) -> Result<Self> {
        let scalar = match (schema, value) {
            (ScalarSchema::Bool, Value::Bool(b)) => ScalarValue::Bool(*b),
            (ScalarSchema::String { .. }, Value::String(s)) => ScalarValue::String(s.clone()),
            (ScalarSchema::Bytes { .. }, Value::Bytes(b)) => ScalarValue::Bytes(b.clone()),
            (ScalarSchema::Integer(IntegerSchema::Int32(_)), Value::I32(n)) => {
                ScalarValue::Int32(*n)
            }
            (ScalarSchema::Integer(IntegerSchema::Int64(_)), Value::I64(n)) => {
                ScalarValue::Int64(*n)
            }
            (ScalarSchema::Integer(IntegerSchema::Uint32(_)), Value::U32(n)) => {
                ScalarValue::Uint32(*n)
            }
            (ScalarSchema::Integer(IntegerSchema::Uint64(_)), Value::U64(n)) => {
                ScalarValue::Uint64(*n)
            }
            (ScalarSchema::Float(FloatSchema::Float32(_)), Value::F32(n)) => {
                ScalarValue::Float32(*n)
            }
            (ScalarSchema::Float(FloatSchema::Float64(_)), Value::F64(n)) => {
                ScalarValue::Float64(*n)
            }
            (ScalarSchema::Timestamp, Value::Message(msg)) => {
                let (seconds, nanos) = read_seconds_nanos(msg)?;
                let nanos = u32::try_from(nanos).map_err(|_| {
                    BindErrorKind::InvalidValue(format!("negative timestamp nanos {nanos}"))
                })?;
                let timestamp = DateTime::from_timestamp(seconds, nanos).ok_or_else(|| {
                    BindErrorKind::InvalidValue(format!("timestamp {seconds}s {nanos}ns"))
                })?;
                ScalarValue::Timestamp(timestamp)
            }
            (ScalarSchema::Duration, Value::Message(msg)) => {
                let (seconds, nanos) = read_seconds_nanos(msg)?;
                let duration = TimeDelta::try_seconds(seconds)
                    .and_then(|d| d.checked_add(&TimeDelta::nanoseconds(i64::from(nanos))))
                    .ok_or_else(|| {
                        BindErrorKind::InvalidValue(format!("duration {seconds}s {nanos}ns"))
                    })?;
                ScalarValue::Duration(duration)
            }
            (ScalarSchema::Date, Value::Message(msg)) => {
                let year = read_i32(msg, 1)?;
                let month = read_i32(msg, 2)?;
                let day = read_i32(msg, 3)?;
                let date = u32::try_from(month)
                    .ok()
                    .zip(u32::try_from(day).ok())
                    .and_then(|(m, d)| NaiveDate::from_ymd_opt(year, m, d))
                    .ok_or_else(|| {
                        BindErrorKind::InvalidValue(format!("date {year}-{month}-{day}"))
                    })?;
                ScalarValue::Date(date)
            }
            (ScalarSchema::Decimal, Value::Message(msg)) => {
                let text = match msg.get_field(1) {
                    None => "0",
                    Some(Value::String(s)) => s.as_str(),
                    Some(other) => {
                        return Err(BindErrorKind::StorageMismatch {
                            expected: "string",
                            found: other.kind_name(),
                        });
                    }
                };
                let decimal = Decimal::from_str(text)
                    .map_err(|e| BindErrorKind::InvalidValue(format!("decimal {text:?}: {e}")))?;
                ScalarValue::Decimal(decimal)
            }
            (schema, value) => {
                return Err(BindErrorKind::StorageMismatch {
                    expected: storage_name(schema),
                    found: value.kind_name(),
                });
            }
        };
        Ok(scalar)
    }
}

fn storage_name(schema: &ScalarSchema) -> &'static str {
    match schema {
        ScalarSchema::Bool => "bool",
        ScalarSchema::String { .. } => "string",
        ScalarSchema::Bytes { .. } => "bytes",
        ScalarSchema::Integer(IntegerSchema::Int32(_)) => "i32",
        ScalarSchema::Integer(IntegerSchema::Int64(_)) => "i64",
        ScalarSchema::Integer(IntegerSchema::Uint32(_)) => "u32",
        ScalarSchema::Integer(IntegerSchema::Uint64(_)) => "u64",
        ScalarSchema::Float(FloatSchema::Float32(_)) => "f32",
        ScalarSchema::Float(FloatSchema::Float64(_)) => "f64",
        ScalarSchema::Timestamp
        | ScalarSchema::Duration
        | ScalarSchema::Date
        | ScalarSchema::Decimal => "message",
    }
}

fn seconds_nanos(seconds: i64, nanos: i32) -> Value {
    let mut msg = DynamicMessage::new();
    msg.set_field(1, Value::I64(seconds));
    msg.set_field(2, Value::I32(nanos));
    Value::Message(msg)
}

fn read_seconds_nanos(msg: &DynamicMessage) -> Result<(i64, i32)> {
    let seconds = match msg.get_field(1) {
        None => 0,
        Some(Value::I64(n)) => *n,
        Some(other) => {
            return Err(BindErrorKind::StorageMismatch {
                expected: "i64",
                found: other.kind_name(),
            });
        }
    };
    Ok((seconds, read_i32(msg, 2)?))
}

fn read_i32(msg: &DynamicMessage, number: u32) -> Result<i32> {
    match msg.get_field(number) {
        None => Ok(0),
        Some(Value::I32(n)) => Ok(*n),
        Some(other) => Err(BindErrorKind::StorageMismatch {
            expected: "i32",
            found: other.kind_name(),
        }),
    }
}

macro_rules! scalar_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for ScalarValue {
                fn from(value: $ty) -> Self {
                    ScalarValue::$variant(value)
                }
            }
        )*
    };
}

scalar_from! {
    bool => Bool,
    String => String,
    Vec<u8> => Bytes,
    i32 => Int32,
    i64 => Int64,
    u32 => Uint32,
    u64 => Uint64,
    f32 => Float32,
    f64 => Float64,
    DateTime<Utc> => Timestamp,
    TimeDelta => Duration,
    NaiveDate => Date,
    Decimal => Decimal,
}

impl From<&str> for ScalarValue {
    fn from(value: &str) -> Self {
        ScalarValue::String(value.to_string())
    }
}
