//! In-memory message substrate.
//!
//! A [`DynamicMessage`] is a tree of typed values addressed by field
//! number. It knows nothing about schemas or unions: any combination of
//! fields may be present, and exclusivity is checked by the binding layer.
//!
//! Well-known scalars are stored as nested messages:
//!
//! | Scalar    | Storage                                  |
//! |-----------|------------------------------------------|
//! | Timestamp | `{1: seconds (i64), 2: nanos (i32)}`     |
//! | Duration  | `{1: seconds (i64), 2: nanos (i32)}`     |
//! | Date      | `{1: year, 2: month, 3: day}` (all i32)  |
//! | Decimal   | `{1: value (string)}`                    |

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single stored value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Bool(bool),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    String(String),
    Bytes(Vec<u8>),
    EnumNumber(i32),
    Message(DynamicMessage),
    List(Vec<Value>),
    /// String-keyed map, iterated in key order.
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Variant name used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::I32(_) => "i32",
            Value::I64(_) => "i64",
            Value::U32(_) => "u32",
            Value::U64(_) => "u64",
            Value::F32(_) => "f32",
            Value::F64(_) => "f64",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::EnumNumber(_) => "enum",
            Value::Message(_) => "message",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    pub fn as_message(&self) -> Option<&DynamicMessage> {
        match self {
            Value::Message(m) => Some(m),
            _ => None,
        }
    }
}

/// A message instance: present fields keyed by number.
///
/// # Examples
///
/// ```
/// use msgshape_reflect::{DynamicMessage, Value};
///
/// let mut msg = DynamicMessage::new();
/// assert!(!msg.has_field(1));
/// msg.set_field(1, Value::String("x".into()));
/// assert_eq!(msg.get_field(1), Some(&Value::String("x".into())));
/// msg.clear_field(1);
/// assert!(msg.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DynamicMessage {
    #[serde(default)]
    fields: BTreeMap<u32, Value>,
}

impl DynamicMessage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_field(&self, number: u32) -> bool {
        self.fields.contains_key(&number)
    }

    pub fn get_field(&self, number: u32) -> Option<&Value> {
        self.fields.get(&number)
    }

    pub fn get_field_mut(&mut self, number: u32) -> Option<&mut Value> {
        self.fields.get_mut(&number)
    }

    /// Sets a field, returning the previous value.
    pub fn set_field(&mut self, number: u32, value: Value) -> Option<Value> {
        self.fields.insert(number, value)
    }

    /// Removes a field, returning its value.
    pub fn clear_field(&mut self, number: u32) -> Option<Value> {
        self.fields.remove(&number)
    }

    /// Present fields in number order.
    pub fn fields(&self) -> impl Iterator<Item = (u32, &Value)> {
        self.fields.iter().map(|(number, value)| (*number, value))
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub(crate) fn field_or_insert_with(
        &mut self,
        number: u32,
        default: impl FnOnce() -> Value,
    ) -> &mut Value {
        self.fields.entry(number).or_insert_with(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_iterate_in_number_order() {
        let mut msg = DynamicMessage::new();
        msg.set_field(3, Value::Bool(true));
        msg.set_field(1, Value::I32(7));
        let numbers: Vec<u32> = msg.fields().map(|(n, _)| n).collect();
        assert_eq!(numbers, [1, 3]);
    }

    #[test]
    fn test_field_or_insert_keeps_existing() {
        let mut msg = DynamicMessage::new();
        msg.set_field(1, Value::I64(5));
        let value = msg.field_or_insert_with(1, || Value::I64(0));
        assert_eq!(value, &Value::I64(5));
    }

    #[test]
    fn test_message_serializes_to_json() {
        let mut inner = DynamicMessage::new();
        inner.set_field(1, Value::String("a".into()));
        let mut msg = DynamicMessage::new();
        msg.set_field(2, Value::Message(inner));

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["fields"]["2"]["message"]["fields"]["1"]["string"], "a");
        let back: DynamicMessage = serde_json::from_value(json).unwrap();
        assert_eq!(back, msg);
    }
}
