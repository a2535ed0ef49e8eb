//! Validation-rule annotations and their translation into schema rules.
//!
//! [`FieldConstraints`] is the annotation shape found on descriptor fields
//! (modelled after protovalidate). The builder translates it into the rules
//! carried by [`ScalarSchema`], [`EnumRules`], [`ArrayRules`] and
//! [`MapRules`]. Shapes the schema cannot express exactly (`const`, `in`,
//! `not_in` on numbers and strings) are rejected instead of approximated.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SchemaError, SchemaErrorKind};
use crate::schema::{
    ArrayRules, BytesRules, EnumRules, EnumSchema, FloatSchema, IntegerSchema, MapRules,
    NumberRules, ScalarSchema, StringFormat, StringRules,
};

/// Validation rules attached to a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldConstraints {
    String(StringConstraints),
    Bytes(BytesConstraints),
    Bool(BoolConstraints),
    Int32(NumericConstraints<i32>),
    Int64(NumericConstraints<i64>),
    Uint32(NumericConstraints<u32>),
    Uint64(NumericConstraints<u64>),
    Float(NumericConstraints<f32>),
    Double(NumericConstraints<f64>),
    Enum(EnumConstraints),
    Repeated(RepeatedConstraints),
    Map(MapConstraints),
}

impl FieldConstraints {
    /// Rule family name used in error messages.
    pub fn family(&self) -> &'static str {
        match self {
            FieldConstraints::String(_) => "string",
            FieldConstraints::Bytes(_) => "bytes",
            FieldConstraints::Bool(_) => "bool",
            FieldConstraints::Int32(_) => "int32",
            FieldConstraints::Int64(_) => "int64",
            FieldConstraints::Uint32(_) => "uint32",
            FieldConstraints::Uint64(_) => "uint64",
            FieldConstraints::Float(_) => "float",
            FieldConstraints::Double(_) => "double",
            FieldConstraints::Enum(_) => "enum",
            FieldConstraints::Repeated(_) => "repeated",
            FieldConstraints::Map(_) => "map",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StringConstraints {
    #[serde(rename = "const")]
    pub const_value: Option<String>,
    pub min_len: Option<u64>,
    pub max_len: Option<u64>,
    pub pattern: Option<String>,
    pub well_known: Option<StringFormat>,
    #[serde(rename = "in")]
    pub in_values: Vec<String>,
    pub not_in: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BytesConstraints {
    pub min_len: Option<u64>,
    pub max_len: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoolConstraints {
    #[serde(rename = "const")]
    pub const_value: Option<bool>,
}

/// Numeric constraints for every integer and float width.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NumericConstraints<T> {
    #[serde(default, rename = "const")]
    pub const_value: Option<T>,
    #[serde(default)]
    pub gt: Option<T>,
    #[serde(default)]
    pub gte: Option<T>,
    #[serde(default)]
    pub lt: Option<T>,
    #[serde(default)]
    pub lte: Option<T>,
    #[serde(default, rename = "in")]
    pub in_values: Vec<T>,
    #[serde(default)]
    pub not_in: Vec<T>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnumConstraints {
    #[serde(rename = "const")]
    pub const_value: Option<i32>,
    pub defined_only: bool,
    #[serde(rename = "in")]
    pub in_values: Vec<i32>,
    pub not_in: Vec<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepeatedConstraints {
    pub min_items: Option<u64>,
    pub max_items: Option<u64>,
    pub unique: bool,
    pub items: Option<Box<FieldConstraints>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConstraints {
    pub min_pairs: Option<u64>,
    pub max_pairs: Option<u64>,
    pub values: Option<Box<FieldConstraints>>,
}

/// Applies scalar rule annotations to the scalar mapped from a field kind.
///
/// # Errors
///
/// Fails when the rule family does not match the scalar, or when the rule
/// uses a shape the schema cannot represent.
pub(crate) fn apply_scalar_rules(
    scalar: ScalarSchema,
    constraints: Option<&FieldConstraints>,
) -> Result<ScalarSchema> {
    let Some(constraints) = constraints else {
        return Ok(scalar);
    };

    match (scalar, constraints) {
        (ScalarSchema::String { .. }, FieldConstraints::String(c)) => {
            let (format, rules) = string_rules(c)?;
            Ok(ScalarSchema::String { format, rules })
        }
        (ScalarSchema::Bytes { .. }, FieldConstraints::Bytes(c)) => {
            check_length_bounds(c.min_len, c.max_len)?;
            Ok(ScalarSchema::Bytes {
                rules: BytesRules {
                    min_length: c.min_len,
                    max_length: c.max_len,
                },
            })
        }
        (ScalarSchema::Bool, FieldConstraints::Bool(c)) => {
            if c.const_value.is_some() {
                return Err(SchemaErrorKind::UnsupportedRule("const on bool".into()).into());
            }
            Ok(ScalarSchema::Bool)
        }
        (ScalarSchema::Integer(IntegerSchema::Int32(_)), FieldConstraints::Int32(c)) => Ok(
            ScalarSchema::Integer(IntegerSchema::Int32(number_rules(c, "int32")?)),
        ),
        (ScalarSchema::Integer(IntegerSchema::Int64(_)), FieldConstraints::Int64(c)) => Ok(
            ScalarSchema::Integer(IntegerSchema::Int64(number_rules(c, "int64")?)),
        ),
        (ScalarSchema::Integer(IntegerSchema::Uint32(_)), FieldConstraints::Uint32(c)) => Ok(
            ScalarSchema::Integer(IntegerSchema::Uint32(number_rules(c, "uint32")?)),
        ),
        (ScalarSchema::Integer(IntegerSchema::Uint64(_)), FieldConstraints::Uint64(c)) => Ok(
            ScalarSchema::Integer(IntegerSchema::Uint64(number_rules(c, "uint64")?)),
        ),
        (ScalarSchema::Float(FloatSchema::Float32(_)), FieldConstraints::Float(c)) => Ok(
            ScalarSchema::Float(FloatSchema::Float32(number_rules(c, "float")?)),
        ),
        (ScalarSchema::Float(FloatSchema::Float64(_)), FieldConstraints::Double(c)) => Ok(
            ScalarSchema::Float(FloatSchema::Float64(number_rules(c, "double")?)),
        ),
        (scalar, other) => Err(SchemaErrorKind::ConflictingRules(format!(
            "{} rules on a {} field",
            other.family(),
            scalar.format_name()
        ))
        .into()),
    }
}

fn number_rules<T: Copy>(c: &NumericConstraints<T>, kind: &str) -> Result<NumberRules<T>> {
    if c.const_value.is_some() {
        return Err(SchemaErrorKind::UnsupportedRule(format!("const on {kind}")).into());
    }
    if !c.in_values.is_empty() {
        return Err(SchemaErrorKind::UnsupportedRule(format!("in on {kind}")).into());
    }
    if !c.not_in.is_empty() {
        return Err(SchemaErrorKind::UnsupportedRule(format!("not_in on {kind}")).into());
    }
    if c.gt.is_some() && c.gte.is_some() {
        return Err(SchemaErrorKind::ConflictingRules(format!("gt and gte on {kind}")).into());
    }
    if c.lt.is_some() && c.lte.is_some() {
        return Err(SchemaErrorKind::ConflictingRules(format!("lt and lte on {kind}")).into());
    }

    Ok(NumberRules {
        minimum: c.gt.or(c.gte),
        maximum: c.lt.or(c.lte),
        exclusive_minimum: c.gt.is_some(),
        exclusive_maximum: c.lt.is_some(),
    })
}

fn string_rules(c: &StringConstraints) -> Result<(Option<StringFormat>, StringRules)> {
    if c.const_value.is_some() {
        return Err(SchemaErrorKind::UnsupportedRule("const on string".into()).into());
    }
    if !c.in_values.is_empty() || !c.not_in.is_empty() {
        return Err(SchemaErrorKind::UnsupportedRule("in/not_in on string".into()).into());
    }
    check_length_bounds(c.min_len, c.max_len)?;
    if let Some(pattern) = &c.pattern {
        Regex::new(pattern).map_err(|e| SchemaErrorKind::InvalidPattern {
            pattern: pattern.clone(),
            reason: e.to_string(),
        })?;
    }

    Ok((
        c.well_known,
        StringRules {
            min_length: c.min_len,
            max_length: c.max_len,
            pattern: c.pattern.clone(),
        },
    ))
}

fn check_length_bounds(min: Option<u64>, max: Option<u64>) -> Result<()> {
    match (min, max) {
        (Some(min), Some(max)) if min > max => Err(SchemaErrorKind::ConflictingRules(format!(
            "min length {min} exceeds max length {max}"
        ))
        .into()),
        _ => Ok(()),
    }
}

/// Translates enum constraints into stripped option names.
pub(crate) fn enum_rules(c: &EnumConstraints, schema: &EnumSchema) -> Result<EnumRules> {
    if c.const_value.is_some() {
        return Err(SchemaErrorKind::UnsupportedRule("const on enum".into()).into());
    }
    let names = |numbers: &[i32]| -> Result<Vec<String>> {
        numbers
            .iter()
            .map(|n| {
                schema
                    .option_by_number(*n)
                    .map(|o| o.name.clone())
                    .ok_or_else(|| {
                        SchemaError::from(SchemaErrorKind::ConflictingRules(format!(
                            "enum {} has no option {n}",
                            schema.name
                        )))
                    })
            })
            .collect()
    };

    Ok(EnumRules {
        in_names: names(&c.in_values)?,
        not_in: names(&c.not_in)?,
        defined_only: c.defined_only,
    })
}

pub(crate) fn array_rules(c: &RepeatedConstraints) -> Result<ArrayRules> {
    if let (Some(min), Some(max)) = (c.min_items, c.max_items) {
        if min > max {
            return Err(SchemaErrorKind::ConflictingRules(format!(
                "min_items {min} exceeds max_items {max}"
            ))
            .into());
        }
    }
    Ok(ArrayRules {
        min_items: c.min_items,
        max_items: c.max_items,
        unique_items: c.unique,
    })
}

pub(crate) fn map_rules(c: &MapConstraints) -> Result<MapRules> {
    if let (Some(min), Some(max)) = (c.min_pairs, c.max_pairs) {
        if min > max {
            return Err(SchemaErrorKind::ConflictingRules(format!(
                "min_pairs {min} exceeds max_pairs {max}"
            ))
            .into());
        }
    }
    Ok(MapRules {
        min_pairs: c.min_pairs,
        max_pairs: c.max_pairs,
    })
}
