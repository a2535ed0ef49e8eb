//! Message descriptor input model.
//!
//! These types describe the messages, fields, unions and enums the
//! [`SchemaBuilder`](crate::SchemaBuilder) consumes. They mirror what a
//! protobuf compiler reports (field numbers, kinds, labels, containing
//! unions, comments) together with the schema annotations the builder
//! understands: flattening, union exposure, validation rules and list rules.
//!
//! Descriptors are plain data and round-trip through JSON, so a descriptor
//! set produced by an external tool can be loaded with
//! [`DescriptorPool::from_json_str`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::rules::FieldConstraints;
use crate::schema::ListRules;

/// Wire-level kind of a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Double,
    Float,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Sint32,
    Sint64,
    Fixed32,
    Fixed64,
    Sfixed32,
    Sfixed64,
    Bool,
    String,
    Bytes,
    /// Enum type, by full name.
    Enum(String),
    /// Message type, by full name.
    Message(String),
    /// Proto2 group. Never supported by the schema model.
    Group(String),
}

impl FieldKind {
    /// Short name used in error messages.
    pub fn label(&self) -> String {
        match self {
            FieldKind::Enum(name) => format!("enum {name}"),
            FieldKind::Message(name) => format!("message {name}"),
            FieldKind::Group(name) => format!("group {name}"),
            other => format!("{other:?}").to_lowercase(),
        }
    }
}

/// Field cardinality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    #[default]
    Optional,
    Required,
    Repeated,
}

/// Key and value kinds of a map field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapEntryKinds {
    pub key: FieldKind,
    pub value: FieldKind,
}

/// Schema annotations on a field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldOptions {
    /// Splice the sub-message's fields into the parent.
    pub flatten: bool,
    /// The field must be set.
    pub required: bool,
    /// Output only.
    pub read_only: bool,
    /// Input only.
    pub write_only: bool,
    /// Validation rules.
    pub rules: Option<FieldConstraints>,
    /// Filter/sort/search capabilities for list endpoints.
    pub list_rules: Option<ListRules>,
}

/// A single field of a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub number: u32,
    pub name: String,
    /// Explicit JSON name; defaults to the lowerCamelCase field name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_name: Option<String>,
    pub kind: FieldKind,
    #[serde(default)]
    pub label: Label,
    /// Present for map fields, where `kind` is ignored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<MapEntryKinds>,
    /// Index into the owning message's `oneofs`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oneof_index: Option<usize>,
    /// Field declared with proto3 `optional`.
    #[serde(default)]
    pub proto3_optional: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    #[serde(default)]
    pub options: FieldOptions,
}

impl FieldDescriptor {
    /// Creates a singular field.
    ///
    /// # Examples
    ///
    /// ```
    /// use msgshape_core::{FieldDescriptor, FieldKind};
    ///
    /// let field = FieldDescriptor::new(1, "task_id", FieldKind::String);
    /// assert_eq!(field.json_name(), "taskId");
    /// assert!(!field.is_repeated());
    /// ```
    pub fn new(number: u32, name: &str, kind: FieldKind) -> Self {
        Self {
            number,
            name: name.to_string(),
            json_name: None,
            kind,
            label: Label::Optional,
            map: None,
            oneof_index: None,
            proto3_optional: false,
            comments: None,
            options: FieldOptions::default(),
        }
    }

    /// Creates a repeated field.
    pub fn repeated(number: u32, name: &str, kind: FieldKind) -> Self {
        let mut field = Self::new(number, name, kind);
        field.label = Label::Repeated;
        field
    }

    /// Creates a map field with the given key and value kinds.
    pub fn map(number: u32, name: &str, key: FieldKind, value: FieldKind) -> Self {
        let mut field = Self::new(number, name, value.clone());
        field.label = Label::Repeated;
        field.map = Some(MapEntryKinds { key, value });
        field
    }

    /// Places the field in the union at `index`.
    pub fn in_oneof(mut self, index: usize) -> Self {
        self.oneof_index = Some(index);
        self
    }

    /// Sets the source comments.
    pub fn with_comments(mut self, comments: &str) -> Self {
        self.comments = Some(comments.to_string());
        self
    }

    /// Attaches validation rules.
    pub fn with_rules(mut self, rules: FieldConstraints) -> Self {
        self.options.rules = Some(rules);
        self
    }

    /// Marks the field as required.
    pub fn required(mut self) -> Self {
        self.options.required = true;
        self
    }

    /// Marks the field for flattening into its parent.
    pub fn flattened(mut self) -> Self {
        self.options.flatten = true;
        self
    }

    /// Returns the JSON-visible property name.
    pub fn json_name(&self) -> String {
        self.json_name
            .clone()
            .unwrap_or_else(|| lower_camel(&self.name))
    }

    /// Returns `true` for repeated (list or map) fields.
    pub fn is_repeated(&self) -> bool {
        self.label == Label::Repeated
    }
}

/// Schema annotations on a union.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OneofOptions {
    /// Promote the union to a named Oneof schema.
    pub expose: bool,
}

/// A union (protobuf `oneof`) declared in a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneofDescriptor {
    pub name: String,
    /// Compiler-generated union wrapping a proto3 `optional` field.
    #[serde(default)]
    pub synthetic: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    #[serde(default)]
    pub options: OneofOptions,
}

impl OneofDescriptor {
    /// Creates a regular, non-exposed union.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            synthetic: false,
            comments: None,
            options: OneofOptions::default(),
        }
    }

    /// Creates a union annotated for promotion.
    pub fn exposed(name: &str) -> Self {
        let mut oneof = Self::new(name);
        oneof.options.expose = true;
        oneof
    }
}

/// Which part of a state-machine entity a message describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityPart {
    Keys,
    State,
    Event,
    Data,
}

/// Entity annotation carried through to the object schema unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityObject {
    pub entity: String,
    pub part: EntityPart,
}

/// Schema annotations on a message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageOptions {
    /// Force (`Some(true)`) or forbid (`Some(false)`) oneof promotion.
    pub oneof: Option<bool>,
    pub entity: Option<EntityObject>,
}

/// A message type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageDescriptor {
    pub package: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
    #[serde(default)]
    pub oneofs: Vec<OneofDescriptor>,
    #[serde(default)]
    pub options: MessageOptions,
}

impl MessageDescriptor {
    /// Creates an empty message in `package`.
    pub fn new(package: &str, name: &str) -> Self {
        Self {
            package: package.to_string(),
            name: name.to_string(),
            comments: None,
            fields: Vec::new(),
            oneofs: Vec::new(),
            options: MessageOptions::default(),
        }
    }

    /// Adds a field.
    pub fn with_field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// Adds a union. Fields join it through [`FieldDescriptor::in_oneof`].
    pub fn with_oneof(mut self, oneof: OneofDescriptor) -> Self {
        self.oneofs.push(oneof);
        self
    }

    /// Sets the source comments.
    pub fn with_comments(mut self, comments: &str) -> Self {
        self.comments = Some(comments.to_string());
        self
    }

    /// Returns `package.Name`.
    pub fn full_name(&self) -> String {
        full_name(&self.package, &self.name)
    }

    /// Fields belonging to the union at `index`, in declaration order.
    pub fn oneof_fields(&self, index: usize) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields
            .iter()
            .filter(move |f| f.oneof_index == Some(index))
    }
}

/// A single enum option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumValueDescriptor {
    pub name: String,
    pub number: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
}

/// An enum type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumDescriptor {
    pub package: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    pub values: Vec<EnumValueDescriptor>,
}

impl EnumDescriptor {
    /// Creates an enum from `(name, number)` pairs.
    pub fn new(package: &str, name: &str, values: &[(&str, i32)]) -> Self {
        Self {
            package: package.to_string(),
            name: name.to_string(),
            comments: None,
            values: values
                .iter()
                .map(|(name, number)| EnumValueDescriptor {
                    name: name.to_string(),
                    number: *number,
                    comments: None,
                })
                .collect(),
        }
    }

    /// Returns `package.Name`.
    pub fn full_name(&self) -> String {
        full_name(&self.package, &self.name)
    }
}

/// Looks up descriptors by full name.
///
/// The builder calls this whenever a field refers to a message or enum it
/// has not built yet, including types that live in other packages.
pub trait DescriptorResolver {
    /// Finds a message by full name.
    fn message(&self, full_name: &str) -> Option<&MessageDescriptor>;

    /// Finds an enum by full name.
    fn enumeration(&self, full_name: &str) -> Option<&EnumDescriptor>;
}

/// In-memory descriptor set keyed by full name.
///
/// # Examples
///
/// ```
/// use msgshape_core::{DescriptorPool, DescriptorResolver, FieldDescriptor, FieldKind, MessageDescriptor};
///
/// let mut pool = DescriptorPool::new();
/// pool.add_message(
///     MessageDescriptor::new("test.v1", "Ping")
///         .with_field(FieldDescriptor::new(1, "id", FieldKind::String)),
/// );
/// assert!(pool.message("test.v1.Ping").is_some());
/// assert!(pool.message("test.v1.Pong").is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DescriptorPool {
    #[serde(default)]
    messages: BTreeMap<String, MessageDescriptor>,
    #[serde(default)]
    enums: BTreeMap<String, EnumDescriptor>,
}

impl DescriptorPool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a pool from its JSON form.
    ///
    /// # Errors
    ///
    /// Returns the [`serde_json::Error`] if the text is not a valid pool.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Adds (or replaces) a message.
    pub fn add_message(&mut self, message: MessageDescriptor) {
        self.messages.insert(message.full_name(), message);
    }

    /// Adds (or replaces) an enum.
    pub fn add_enum(&mut self, enumeration: EnumDescriptor) {
        self.enums.insert(enumeration.full_name(), enumeration);
    }

    /// Iterates over all messages, ordered by full name.
    pub fn messages(&self) -> impl Iterator<Item = &MessageDescriptor> {
        self.messages.values()
    }

    /// Iterates over all enums, ordered by full name.
    pub fn enums(&self) -> impl Iterator<Item = &EnumDescriptor> {
        self.enums.values()
    }
}

impl DescriptorResolver for DescriptorPool {
    fn message(&self, full_name: &str) -> Option<&MessageDescriptor> {
        self.messages.get(full_name)
    }

    fn enumeration(&self, full_name: &str) -> Option<&EnumDescriptor> {
        self.enums.get(full_name)
    }
}

/// Joins a package and a local name.
pub fn full_name(package: &str, name: &str) -> String {
    if package.is_empty() {
        name.to_string()
    } else {
        format!("{package}.{name}")
    }
}

/// Splits `package.Name` at the last dot.
pub fn split_full_name(full_name: &str) -> (&str, &str) {
    match full_name.rsplit_once('.') {
        Some((package, name)) => (package, name),
        None => ("", full_name),
    }
}

/// Converts `snake_case` to `lowerCamelCase`.
pub(crate) fn lower_camel(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for c in name.chars() {
        if c == '_' {
            upper = !out.is_empty();
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Converts `snake_case` to `PascalCase`.
pub(crate) fn pascal(name: &str) -> String {
    let camel = lower_camel(name);
    let mut chars = camel.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
