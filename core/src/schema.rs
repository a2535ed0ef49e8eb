//! Schema model.
//!
//! Root schemas ([`RootSchema`]: objects, oneofs and enums) are named and
//! live in a [`SchemaSet`](crate::SchemaSet). Properties describe their
//! values with a [`FieldSchema`], which either holds a leaf description
//! (scalar, any) or points at another root through a [`RefId`].
//!
//! Nothing in this module has behavior beyond construction and simple
//! queries; the builder and linker do the work.

use serde::{Deserialize, Serialize};

use crate::descriptor::{EntityObject, full_name};

/// Stable handle of a root schema inside its [`SchemaSet`](crate::SchemaSet).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaId(pub(crate) usize);

/// Stable handle of a [`RefSchema`] inside its [`SchemaSet`](crate::SchemaSet).
///
/// Every use of the same `(package, name)` pair shares one handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RefId(pub(crate) usize);

/// Forward reference to a root schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefSchema {
    pub package: String,
    pub name: String,
    pub(crate) target: Option<SchemaId>,
}

impl RefSchema {
    /// Creates an unresolved reference.
    pub fn new(package: &str, name: &str) -> Self {
        Self {
            package: package.to_string(),
            name: name.to_string(),
            target: None,
        }
    }

    /// Returns `package.Name`.
    pub fn full_name(&self) -> String {
        full_name(&self.package, &self.name)
    }

    /// The resolved target, once defined or linked.
    pub fn target(&self) -> Option<SchemaId> {
        self.target
    }
}

/// A named, top-level schema.
#[derive(Debug, Clone, PartialEq)]
pub enum RootSchema {
    Object(ObjectSchema),
    Oneof(OneofSchema),
    Enum(EnumSchema),
}

impl RootSchema {
    pub fn package(&self) -> &str {
        match self {
            RootSchema::Object(o) => &o.package,
            RootSchema::Oneof(o) => &o.package,
            RootSchema::Enum(e) => &e.package,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            RootSchema::Object(o) => &o.name,
            RootSchema::Oneof(o) => &o.name,
            RootSchema::Enum(e) => &e.name,
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            RootSchema::Object(o) => o.description.as_deref(),
            RootSchema::Oneof(o) => o.description.as_deref(),
            RootSchema::Enum(e) => e.description.as_deref(),
        }
    }

    /// Returns `package.Name`.
    pub fn full_name(&self) -> String {
        full_name(self.package(), self.name())
    }

    /// Produces an unresolved reference pointing at this schema.
    pub fn as_ref(&self) -> RefSchema {
        RefSchema::new(self.package(), self.name())
    }

    /// Properties of objects and oneofs; `None` for enums.
    pub fn properties(&self) -> Option<&[ObjectProperty]> {
        match self {
            RootSchema::Object(o) => Some(&o.properties),
            RootSchema::Oneof(o) => Some(&o.properties),
            RootSchema::Enum(_) => None,
        }
    }

    /// Variant name used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            RootSchema::Object(_) => "object",
            RootSchema::Oneof(_) => "oneof",
            RootSchema::Enum(_) => "enum",
        }
    }
}

/// An object: an ordered list of properties.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectSchema {
    pub package: String,
    pub name: String,
    pub description: Option<String>,
    pub properties: Vec<ObjectProperty>,
    /// Opaque state-machine metadata.
    pub entity: Option<EntityObject>,
}

/// A tagged union: at most one property may be set on an instance.
#[derive(Debug, Clone, PartialEq)]
pub struct OneofSchema {
    pub package: String,
    pub name: String,
    pub description: Option<String>,
    pub properties: Vec<ObjectProperty>,
}

/// One option of an [`EnumSchema`], with the shared prefix stripped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumOption {
    pub name: String,
    pub number: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// An enum with name/number mapping.
///
/// Option names are exposed without the shared `prefix`; the option with
/// number 0 is the unspecified option.
///
/// # Examples
///
/// ```
/// use msgshape_core::{EnumOption, EnumSchema};
///
/// let status = EnumSchema {
///     package: "test.v1".into(),
///     name: "Status".into(),
///     description: None,
///     prefix: "STATUS_".into(),
///     options: vec![
///         EnumOption { name: "UNSPECIFIED".into(), number: 0, description: None },
///         EnumOption { name: "ACTIVE".into(), number: 1, description: None },
///     ],
/// };
/// assert_eq!(status.option_by_name("ACTIVE").unwrap().number, 1);
/// assert_eq!(status.proto_name(&status.options[1]), "STATUS_ACTIVE");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct EnumSchema {
    pub package: String,
    pub name: String,
    pub description: Option<String>,
    pub prefix: String,
    pub options: Vec<EnumOption>,
}

impl EnumSchema {
    /// Finds an option by its stripped name (case-sensitive).
    pub fn option_by_name(&self, name: &str) -> Option<&EnumOption> {
        self.options.iter().find(|o| o.name == name)
    }

    /// Finds an option by number.
    pub fn option_by_number(&self, number: i32) -> Option<&EnumOption> {
        self.options.iter().find(|o| o.number == number)
    }

    /// Re-attaches the prefix to an option name.
    pub fn proto_name(&self, option: &EnumOption) -> String {
        format!("{}{}", self.prefix, option.name)
    }
}

/// A property of an object or oneof.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectProperty {
    /// JSON-visible name.
    pub name: String,
    pub schema: FieldSchema,
    pub required: bool,
    pub read_only: bool,
    pub write_only: bool,
    pub explicitly_optional: bool,
    pub description: Option<String>,
    /// Field numbers locating the value inside the message, outermost
    /// first. Empty for virtual properties.
    pub field_path: Vec<u32>,
}

impl ObjectProperty {
    /// Creates a property stored at `field_path`.
    pub fn new(name: &str, schema: FieldSchema, field_path: Vec<u32>) -> Self {
        Self {
            name: name.to_string(),
            schema,
            required: false,
            read_only: false,
            write_only: false,
            explicitly_optional: false,
            description: None,
            field_path,
        }
    }

    /// A virtual property has no storage of its own.
    pub fn is_virtual(&self) -> bool {
        self.field_path.is_empty()
    }
}

/// Shape of a property value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldSchema {
    Scalar(ScalarField),
    ObjectRef(RefField),
    OneofRef(RefField),
    EnumRef(EnumField),
    Array(ArrayField),
    Map(MapField),
    /// Open, untyped value.
    Any,
}

impl FieldSchema {
    /// Variant name used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            FieldSchema::Scalar(_) => "scalar",
            FieldSchema::ObjectRef(_) => "object",
            FieldSchema::OneofRef(_) => "oneof",
            FieldSchema::EnumRef(_) => "enum",
            FieldSchema::Array(_) => "array",
            FieldSchema::Map(_) => "map",
            FieldSchema::Any => "any",
        }
    }

    /// The reference held by object, oneof and enum fields.
    pub fn reference(&self) -> Option<RefId> {
        match self {
            FieldSchema::ObjectRef(r) | FieldSchema::OneofRef(r) => Some(r.reference),
            FieldSchema::EnumRef(e) => Some(e.reference),
            _ => None,
        }
    }

    /// List rules of scalar and enum fields.
    pub fn list_rules(&self) -> Option<&ListRules> {
        match self {
            FieldSchema::Scalar(s) => s.list_rules.as_ref(),
            FieldSchema::EnumRef(e) => e.list_rules.as_ref(),
            _ => None,
        }
    }
}

/// Filter, sort and search capabilities exposed to list endpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListRules {
    pub filtering: bool,
    pub sorting: bool,
    pub searching: bool,
}

/// A scalar leaf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarField {
    pub scalar: ScalarSchema,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_rules: Option<ListRules>,
}

/// Reference to an object or oneof root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefField {
    pub reference: RefId,
}

/// Reference to an enum root plus field-local rules.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumField {
    pub reference: RefId,
    pub rules: EnumRules,
    pub list_rules: Option<ListRules>,
}

/// Allowed or forbidden enum options, by stripped name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnumRules {
    #[serde(rename = "in", skip_serializing_if = "Vec::is_empty")]
    pub in_names: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub not_in: Vec<String>,
    /// Only declared option numbers are accepted.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub defined_only: bool,
}

/// A list of values.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayField {
    pub items: Box<FieldSchema>,
    pub rules: ArrayRules,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArrayRules {
    pub min_items: Option<u64>,
    pub max_items: Option<u64>,
    pub unique_items: bool,
}

/// A string-keyed map of values.
#[derive(Debug, Clone, PartialEq)]
pub struct MapField {
    pub values: Box<FieldSchema>,
    pub rules: MapRules,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapRules {
    pub min_pairs: Option<u64>,
    pub max_pairs: Option<u64>,
}

/// Closed set of scalar descriptions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarSchema {
    Bool,
    String {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        format: Option<StringFormat>,
        #[serde(default)]
        rules: StringRules,
    },
    /// Bytes, exposed as a string with the `byte` encoding format.
    Bytes {
        #[serde(default)]
        rules: BytesRules,
    },
    Integer(IntegerSchema),
    Float(FloatSchema),
    Timestamp,
    Duration,
    Date,
    Decimal,
}

impl ScalarSchema {
    /// Plain string with no format or rules.
    pub fn string() -> Self {
        ScalarSchema::String {
            format: None,
            rules: StringRules::default(),
        }
    }

    /// Format name as exported to downstream tooling.
    pub fn format_name(&self) -> &'static str {
        match self {
            ScalarSchema::Bool => "boolean",
            ScalarSchema::String { format: None, .. } => "string",
            ScalarSchema::String {
                format: Some(format),
                ..
            } => format.name(),
            ScalarSchema::Bytes { .. } => "byte",
            ScalarSchema::Integer(IntegerSchema::Int32(_)) => "int32",
            ScalarSchema::Integer(IntegerSchema::Int64(_)) => "int64",
            ScalarSchema::Integer(IntegerSchema::Uint32(_)) => "uint32",
            ScalarSchema::Integer(IntegerSchema::Uint64(_)) => "uint64",
            ScalarSchema::Float(FloatSchema::Float32(_)) => "float32",
            ScalarSchema::Float(FloatSchema::Float64(_)) => "float64",
            ScalarSchema::Timestamp => "date-time",
            ScalarSchema::Duration => "duration",
            ScalarSchema::Date => "date",
            ScalarSchema::Decimal => "decimal",
        }
    }
}

/// Well-known string formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StringFormat {
    Uuid,
    Email,
    Hostname,
    Ip,
    Ipv4,
    Ipv6,
    Uri,
}

impl StringFormat {
    pub fn name(self) -> &'static str {
        match self {
            StringFormat::Uuid => "uuid",
            StringFormat::Email => "email",
            StringFormat::Hostname => "hostname",
            StringFormat::Ip => "ip",
            StringFormat::Ipv4 => "ipv4",
            StringFormat::Ipv6 => "ipv6",
            StringFormat::Uri => "uri",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StringRules {
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub pattern: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BytesRules {
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
}

/// Integer formats, each with width-appropriate bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegerSchema {
    Int32(NumberRules<i32>),
    Int64(NumberRules<i64>),
    Uint32(NumberRules<u32>),
    Uint64(NumberRules<u64>),
}

/// Floating point formats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FloatSchema {
    Float32(NumberRules<f32>),
    Float64(NumberRules<f64>),
}

/// Inclusive or exclusive bounds on a number.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberRules<T> {
    #[serde(default)]
    pub minimum: Option<T>,
    #[serde(default)]
    pub maximum: Option<T>,
    #[serde(default)]
    pub exclusive_minimum: bool,
    #[serde(default)]
    pub exclusive_maximum: bool,
}
