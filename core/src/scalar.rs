//! Leaf type mapping.
//!
//! Maps wire-level primitive kinds and a small registry of well-known
//! messages onto schema scalars. The mapping is pure and total over the
//! supported kinds; anything else is a build error.

use crate::descriptor::FieldKind;
use crate::error::{Result, SchemaErrorKind};
use crate::schema::{
    BytesRules, FieldSchema, FloatSchema, IntegerSchema, ListRules, NumberRules, ScalarField,
    ScalarSchema,
};

/// Well-known message types with a dedicated schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WellKnown {
    Timestamp,
    Duration,
    Date,
    Decimal,
    Any,
}

impl WellKnown {
    /// Looks up a message full name in the registry.
    ///
    /// Returns `Ok(None)` for ordinary messages.
    ///
    /// # Errors
    ///
    /// Any other `google.*` message is reported as
    /// [`SchemaErrorKind::UnknownWellKnownType`].
    ///
    /// # Examples
    ///
    /// ```
    /// use msgshape_core::WellKnown;
    ///
    /// assert_eq!(
    ///     WellKnown::lookup("google.protobuf.Timestamp").unwrap(),
    ///     Some(WellKnown::Timestamp)
    /// );
    /// assert_eq!(WellKnown::lookup("test.v1.Task").unwrap(), None);
    /// assert!(WellKnown::lookup("google.protobuf.FieldMask").is_err());
    /// ```
    pub fn lookup(full_name: &str) -> Result<Option<Self>> {
        let found = match full_name {
            "google.protobuf.Timestamp" => WellKnown::Timestamp,
            "google.protobuf.Duration" => WellKnown::Duration,
            "google.type.Date" => WellKnown::Date,
            "google.type.Decimal" => WellKnown::Decimal,
            "google.protobuf.Any" | "google.protobuf.Struct" => WellKnown::Any,
            other if other.starts_with("google.") => {
                return Err(SchemaErrorKind::UnknownWellKnownType(other.to_string()).into());
            }
            _ => return Ok(None),
        };
        Ok(Some(found))
    }

    /// The field schema this well-known type maps to.
    pub fn field_schema(self, list_rules: Option<ListRules>) -> FieldSchema {
        let scalar = match self {
            WellKnown::Timestamp => ScalarSchema::Timestamp,
            WellKnown::Duration => ScalarSchema::Duration,
            WellKnown::Date => ScalarSchema::Date,
            WellKnown::Decimal => ScalarSchema::Decimal,
            WellKnown::Any => return FieldSchema::Any,
        };
        FieldSchema::Scalar(ScalarField { scalar, list_rules })
    }
}

/// Maps a primitive field kind to its scalar schema, without rules.
///
/// # Errors
///
/// Enum, message and group kinds are not scalars and yield
/// [`SchemaErrorKind::UnsupportedKind`].
///
/// # Examples
///
/// ```
/// use msgshape_core::{FieldKind, scalar_for_kind};
///
/// let scalar = scalar_for_kind(&FieldKind::Sfixed64).unwrap();
/// assert_eq!(scalar.format_name(), "int64");
/// assert_eq!(scalar_for_kind(&FieldKind::Bytes).unwrap().format_name(), "byte");
/// ```
pub fn scalar_for_kind(kind: &FieldKind) -> Result<ScalarSchema> {
    let scalar = match kind {
        FieldKind::Bool => ScalarSchema::Bool,
        FieldKind::String => ScalarSchema::string(),
        FieldKind::Bytes => ScalarSchema::Bytes {
            rules: BytesRules::default(),
        },
        FieldKind::Int32 | FieldKind::Sint32 | FieldKind::Sfixed32 => {
            ScalarSchema::Integer(IntegerSchema::Int32(NumberRules::default()))
        }
        FieldKind::Int64 | FieldKind::Sint64 | FieldKind::Sfixed64 => {
            ScalarSchema::Integer(IntegerSchema::Int64(NumberRules::default()))
        }
        FieldKind::Uint32 | FieldKind::Fixed32 => {
            ScalarSchema::Integer(IntegerSchema::Uint32(NumberRules::default()))
        }
        FieldKind::Uint64 | FieldKind::Fixed64 => {
            ScalarSchema::Integer(IntegerSchema::Uint64(NumberRules::default()))
        }
        FieldKind::Float => ScalarSchema::Float(FloatSchema::Float32(NumberRules::default())),
        FieldKind::Double => ScalarSchema::Float(FloatSchema::Float64(NumberRules::default())),
        FieldKind::Enum(_) | FieldKind::Message(_) | FieldKind::Group(_) => {
            return Err(SchemaErrorKind::UnsupportedKind(kind.label()).into());
        }
    };
    Ok(scalar)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_kinds_fold_into_formats() {
        let cases = [
            (FieldKind::Int32, "int32"),
            (FieldKind::Sint32, "int32"),
            (FieldKind::Sfixed32, "int32"),
            (FieldKind::Int64, "int64"),
            (FieldKind::Sint64, "int64"),
            (FieldKind::Uint32, "uint32"),
            (FieldKind::Fixed32, "uint32"),
            (FieldKind::Uint64, "uint64"),
            (FieldKind::Fixed64, "uint64"),
            (FieldKind::Float, "float32"),
            (FieldKind::Double, "float64"),
        ];
        for (kind, format) in cases {
            assert_eq!(scalar_for_kind(&kind).unwrap().format_name(), format);
        }
    }

    #[test]
    fn test_group_is_unsupported() {
        let err = scalar_for_kind(&FieldKind::Group("test.v1.Legacy".into())).unwrap_err();
        assert!(matches!(err.kind, SchemaErrorKind::UnsupportedKind(_)));
    }

    #[test]
    fn test_well_known_registry() {
        assert_eq!(
            WellKnown::lookup("google.type.Date").unwrap(),
            Some(WellKnown::Date)
        );
        assert_eq!(
            WellKnown::lookup("google.protobuf.Struct").unwrap(),
            Some(WellKnown::Any)
        );
        assert_eq!(
            WellKnown::Any.field_schema(None),
            FieldSchema::Any
        );
        let err = WellKnown::lookup("google.type.Money").unwrap_err();
        assert_eq!(
            err.kind,
            SchemaErrorKind::UnknownWellKnownType("google.type.Money".into())
        );
    }
}
