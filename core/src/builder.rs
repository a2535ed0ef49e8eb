//! Descriptor-to-schema builder.
//!
//! [`SchemaBuilder`] walks message descriptors and produces root schemas in
//! a [`SchemaSet`]. Every message and enum is built at most once per set,
//! keyed by full name; recursive references short-circuit to the shared
//! [`RefId`] of the message still being built and are resolved when that
//! message is defined.
//!
//! Per message the builder decides Object vs. Oneof, then walks fields in
//! declaration order:
//!
//! - repeated fields become arrays, map fields become maps
//! - `flatten` fields splice the sub-message's properties into the parent,
//!   with field paths prefixed by the flattening field's number
//! - members of an exposed union move into a promoted Oneof schema, which
//!   takes the union's position in the parent through a virtual property
//! - everything else becomes a scalar, enum, object or oneof reference
//!
//! A failed [`build_message`](SchemaBuilder::build_message) leaves the set
//! exactly as it was before the call.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::config::BuildConfig;
use crate::descriptor::{
    DescriptorResolver, EnumDescriptor, FieldDescriptor, FieldKind, Label, MessageDescriptor,
    lower_camel, pascal,
};
use crate::error::{Result, SchemaError, SchemaErrorKind};
use crate::rules::{FieldConstraints, apply_scalar_rules, array_rules, enum_rules, map_rules};
use crate::scalar::{WellKnown, scalar_for_kind};
use crate::schema::{
    ArrayField, ArrayRules, EnumField, EnumOption, EnumRules, EnumSchema, FieldSchema, ListRules,
    MapField, MapRules, ObjectProperty, ObjectSchema, OneofSchema, RefField, RefId, RootSchema,
    ScalarField, SchemaId,
};
use crate::set::SchemaSet;

/// Builds schemas from descriptors supplied by a [`DescriptorResolver`].
///
/// # Examples
///
/// ```
/// use msgshape_core::{DescriptorPool, FieldDescriptor, FieldKind, MessageDescriptor, SchemaBuilder};
///
/// let mut pool = DescriptorPool::new();
/// pool.add_message(
///     MessageDescriptor::new("test.v1", "Task")
///         .with_field(FieldDescriptor::new(1, "id", FieldKind::String).required())
///         .with_field(FieldDescriptor::repeated(2, "tags", FieldKind::String)),
/// );
///
/// let mut builder = SchemaBuilder::new(&pool);
/// let task = builder.build_message("test.v1.Task").unwrap();
/// let set = builder.finish().unwrap();
///
/// let object = set.object(task).unwrap();
/// assert_eq!(object.properties[0].name, "id");
/// assert!(object.properties[0].required);
/// assert_eq!(object.properties[1].schema.kind_name(), "array");
/// ```
pub struct SchemaBuilder<'r> {
    resolver: &'r dyn DescriptorResolver,
    config: BuildConfig,
    set: SchemaSet,
    /// Messages whose schema is being built; references to them
    /// short-circuit to their shared `RefId`.
    in_progress: HashSet<String>,
    /// Messages currently being spliced into the message being built.
    flatten_chain: Vec<String>,
    /// Memoized Object (false) vs. Oneof (true) decision per message.
    wrappers: HashMap<String, bool>,
}

impl<'r> SchemaBuilder<'r> {
    /// Creates a builder with the default [`BuildConfig`].
    pub fn new(resolver: &'r dyn DescriptorResolver) -> Self {
        Self::with_config(resolver, BuildConfig::default())
    }

    /// Creates a builder with an explicit configuration.
    pub fn with_config(resolver: &'r dyn DescriptorResolver, config: BuildConfig) -> Self {
        Self {
            resolver,
            config,
            set: SchemaSet::new(),
            in_progress: HashSet::new(),
            flatten_chain: Vec::new(),
            wrappers: HashMap::new(),
        }
    }

    /// The configuration in effect.
    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// The schemas built so far. Not linked until [`finish`](Self::finish).
    pub fn set(&self) -> &SchemaSet {
        &self.set
    }

    /// Builds a message and everything it references.
    ///
    /// Returns the id of the message's Object or Oneof schema. Building the
    /// same message again returns the same id.
    ///
    /// # Errors
    ///
    /// Any build error, located by schema and property path. On error no
    /// schema from this call is kept.
    pub fn build_message(&mut self, full_name: &str) -> Result<SchemaId> {
        let snapshot = self.set.clone();
        let wrappers = self.wrappers.clone();

        match self.define_message(full_name) {
            Ok(id) => Ok(id),
            Err(err) => {
                self.set = snapshot;
                self.wrappers = wrappers;
                self.in_progress.clear();
                self.flatten_chain.clear();
                Err(err)
            }
        }
    }

    /// Builds an enum. Building the same enum again returns the same id.
    ///
    /// # Errors
    ///
    /// [`SchemaErrorKind::DescriptorNotFound`], or a malformed enum.
    pub fn build_enum(&mut self, full_name: &str) -> Result<SchemaId> {
        self.define_enum(full_name)
    }

    /// Links the built schemas and hands them over.
    ///
    /// # Errors
    ///
    /// Returns the first link error.
    pub fn finish(mut self) -> Result<SchemaSet> {
        self.set.link()?;
        Ok(self.set)
    }

    fn message_descriptor(&self, full_name: &str) -> Result<&'r MessageDescriptor> {
        self.resolver
            .message(full_name)
            .ok_or_else(|| SchemaErrorKind::DescriptorNotFound(full_name.to_string()).into())
    }

    fn define_message(&mut self, full_name: &str) -> Result<SchemaId> {
        let message = self.message_descriptor(full_name)?;
        if let Some(id) = self.set.lookup_in(&message.package, &message.name) {
            return Ok(id);
        }

        self.in_progress.insert(full_name.to_string());
        let chain = std::mem::replace(&mut self.flatten_chain, vec![full_name.to_string()]);
        let root = self.message_schema(message);
        self.flatten_chain = chain;
        self.in_progress.remove(full_name);

        let root = root.map_err(|e| e.at(full_name))?;
        let properties = root.properties().map_or(0, <[ObjectProperty]>::len);
        let kind = root.kind_name();
        let id = self.set.define(root).map_err(|e| e.at(full_name))?;
        debug!(message = full_name, kind, properties, "Built message schema");
        Ok(id)
    }

    fn message_schema(&mut self, message: &'r MessageDescriptor) -> Result<RootSchema> {
        if self.is_oneof_wrapper(message)? {
            let mut properties = Vec::new();
            for field in &message.fields {
                properties.push(
                    self.field_property(field, &[])
                        .map_err(|e| e.at(field.json_name()))?,
                );
            }
            return Ok(RootSchema::Oneof(OneofSchema {
                package: message.package.clone(),
                name: message.name.clone(),
                description: message.comments.clone(),
                properties,
            }));
        }

        Ok(RootSchema::Object(ObjectSchema {
            package: message.package.clone(),
            name: message.name.clone(),
            description: message.comments.clone(),
            properties: self.object_properties(message, &[])?,
            entity: message.options.entity.clone(),
        }))
    }

    /// Decides whether a whole message is exposed as a Oneof.
    fn is_oneof_wrapper(&mut self, message: &MessageDescriptor) -> Result<bool> {
        let full_name = message.full_name();
        if let Some(wrapper) = self.wrappers.get(&full_name) {
            return Ok(*wrapper);
        }

        let unions: Vec<usize> = message
            .oneofs
            .iter()
            .enumerate()
            .filter(|(_, oneof)| !oneof.synthetic)
            .map(|(index, _)| index)
            .collect();

        let wrapper = match message.options.oneof {
            Some(false) => false,
            Some(true) => {
                let [index] = unions[..] else {
                    return Err(SchemaErrorKind::InvalidOneofWrapper(format!(
                        "{full_name} declares {} unions, expected exactly one",
                        unions.len()
                    ))
                    .into());
                };
                if message.fields.iter().any(|f| f.oneof_index != Some(index)) {
                    return Err(SchemaErrorKind::InvalidOneofWrapper(format!(
                        "{full_name} has fields outside its union"
                    ))
                    .into());
                }
                if message.oneof_fields(index).next().is_none() {
                    return Err(
                        SchemaErrorKind::EmptyOneof(message.oneofs[index].name.clone()).into(),
                    );
                }
                true
            }
            None => self.matches_promotion_policy(message, &unions),
        };

        self.wrappers.insert(full_name, wrapper);
        Ok(wrapper)
    }

    fn matches_promotion_policy(&self, message: &MessageDescriptor, unions: &[usize]) -> bool {
        let policy = &self.config.oneof_promotion;
        if !policy.auto_promote {
            return false;
        }
        let [index] = unions[..] else {
            return false;
        };
        if message.oneofs[index].name != policy.union_name {
            return false;
        }
        if message.fields.iter().any(|f| f.oneof_index != Some(index)) {
            return false;
        }
        let mut members = message.oneof_fields(index).peekable();
        members.peek().is_some()
            && members.all(|f| !f.is_repeated() && matches!(f.kind, FieldKind::Message(_)))
    }

    /// Properties of an Object, with field paths prefixed by `prefix`.
    fn object_properties(
        &mut self,
        message: &'r MessageDescriptor,
        prefix: &[u32],
    ) -> Result<Vec<ObjectProperty>> {
        let mut properties: Vec<ObjectProperty> = Vec::new();
        let mut names = HashSet::new();
        let mut promoted = HashSet::new();

        for field in &message.fields {
            let emitted = properties.len();
            let exposed = field
                .oneof_index
                .and_then(|index| message.oneofs.get(index).map(|oneof| (index, oneof)))
                .filter(|(_, oneof)| !oneof.synthetic && oneof.options.expose);

            if let Some((index, oneof)) = exposed {
                if promoted.insert(index) {
                    let property = self
                        .promote_union(message, index)
                        .map_err(|e| e.at(lower_camel(&oneof.name)))?;
                    properties.push(property);
                }
            } else if field.options.flatten {
                let spliced = self
                    .flatten_field(field, prefix)
                    .map_err(|e| e.at(field.json_name()))?;
                properties.extend(spliced);
            } else {
                properties.push(
                    self.field_property(field, prefix)
                        .map_err(|e| e.at(field.json_name()))?,
                );
            }

            for property in &properties[emitted..] {
                if !names.insert(property.name.clone()) {
                    return Err(SchemaError::from(SchemaErrorKind::DuplicateProperty(
                        property.name.clone(),
                    ))
                    .at(property.name.as_str()));
                }
            }
        }

        Ok(properties)
    }

    /// Defines the Oneof for an exposed union and returns the virtual
    /// property standing in for it.
    fn promote_union(
        &mut self,
        message: &'r MessageDescriptor,
        index: usize,
    ) -> Result<ObjectProperty> {
        let oneof = &message.oneofs[index];
        let name = format!("{}{}", message.name, pascal(&oneof.name));

        let mut properties = Vec::new();
        for field in message.oneof_fields(index) {
            if field.options.flatten {
                return Err(SchemaErrorKind::InvalidFlatten(format!(
                    "union member {} cannot be flattened",
                    field.name
                ))
                .into());
            }
            properties.push(
                self.field_property(field, &[])
                    .map_err(|e| e.at(field.json_name()))?,
            );
        }
        if properties.is_empty() {
            return Err(SchemaErrorKind::EmptyOneof(oneof.name.clone()).into());
        }

        let members = properties.len();
        self.set.define(RootSchema::Oneof(OneofSchema {
            package: message.package.clone(),
            name: name.clone(),
            description: oneof.comments.clone(),
            properties,
        }))?;
        debug!(
            message = %message.full_name(),
            union = %oneof.name,
            oneof = %name,
            members,
            "Promoted union"
        );

        let reference = self.set.reference_to(&message.package, &name);
        let mut property = ObjectProperty::new(
            &lower_camel(&oneof.name),
            FieldSchema::OneofRef(RefField { reference }),
            Vec::new(),
        );
        property.description = oneof.comments.clone();
        Ok(property)
    }

    /// Splices a sub-message's properties into the parent.
    fn flatten_field(
        &mut self,
        field: &FieldDescriptor,
        prefix: &[u32],
    ) -> Result<Vec<ObjectProperty>> {
        let FieldKind::Message(name) = &field.kind else {
            return Err(SchemaErrorKind::InvalidFlatten(format!(
                "{} is a {} field",
                field.name,
                field.kind.label()
            ))
            .into());
        };
        if field.is_repeated() || field.map.is_some() {
            return Err(SchemaErrorKind::InvalidFlatten(format!(
                "{} is repeated",
                field.name
            ))
            .into());
        }
        if WellKnown::lookup(name)?.is_some() {
            return Err(SchemaErrorKind::InvalidFlatten(format!(
                "{name} is a well-known type"
            ))
            .into());
        }
        if self.flatten_chain.iter().any(|n| n == name) {
            return Err(SchemaErrorKind::FlattenCycle(name.clone()).into());
        }

        let message = self.message_descriptor(name)?;
        if self.is_oneof_wrapper(message)? {
            return Err(
                SchemaErrorKind::InvalidFlatten(format!("{name} is a oneof message")).into(),
            );
        }
        if message
            .oneofs
            .iter()
            .any(|oneof| !oneof.synthetic && oneof.options.expose)
        {
            return Err(
                SchemaErrorKind::InvalidFlatten(format!("{name} exposes a union")).into(),
            );
        }

        let mut path = prefix.to_vec();
        path.push(field.number);

        self.flatten_chain.push(name.clone());
        let spliced = self.object_properties(message, &path);
        self.flatten_chain.pop();
        spliced
    }

    fn field_property(&mut self, field: &FieldDescriptor, prefix: &[u32]) -> Result<ObjectProperty> {
        let mut path = prefix.to_vec();
        path.push(field.number);

        let mut property = ObjectProperty::new(&field.json_name(), self.field_schema(field)?, path);
        property.required = field.options.required || field.label == Label::Required;
        property.read_only = field.options.read_only;
        property.write_only = field.options.write_only;
        property.explicitly_optional = field.proto3_optional;
        property.description = field.comments.clone();
        Ok(property)
    }

    fn field_schema(&mut self, field: &FieldDescriptor) -> Result<FieldSchema> {
        let rules = field.options.rules.as_ref();
        let list_rules = field.options.list_rules;

        if let Some(map) = &field.map {
            if map.key != FieldKind::String {
                return Err(SchemaErrorKind::NonStringMapKey(map.key.label()).into());
            }
            let (value_rules, map_rules) = match rules {
                Some(FieldConstraints::Map(c)) => (c.values.as_deref(), map_rules(c)?),
                Some(other) => return Err(mismatched_rules(other, "map")),
                None => (None, MapRules::default()),
            };
            let values = self.single_schema(&map.value, value_rules, list_rules)?;
            return Ok(FieldSchema::Map(MapField {
                values: Box::new(values),
                rules: map_rules,
            }));
        }

        if field.is_repeated() {
            let (item_rules, array_rules) = match rules {
                Some(FieldConstraints::Repeated(c)) => (c.items.as_deref(), array_rules(c)?),
                Some(other) => return Err(mismatched_rules(other, "repeated")),
                None => (None, ArrayRules::default()),
            };
            let items = self.single_schema(&field.kind, item_rules, list_rules)?;
            return Ok(FieldSchema::Array(ArrayField {
                items: Box::new(items),
                rules: array_rules,
            }));
        }

        self.single_schema(&field.kind, rules, list_rules)
    }

    /// Schema of one (non-repeated) value of `kind`.
    fn single_schema(
        &mut self,
        kind: &FieldKind,
        rules: Option<&FieldConstraints>,
        list_rules: Option<ListRules>,
    ) -> Result<FieldSchema> {
        match kind {
            FieldKind::Message(name) => {
                if let Some(rules) = rules {
                    return Err(mismatched_rules(rules, "message"));
                }
                if let Some(well_known) = WellKnown::lookup(name)? {
                    return Ok(well_known.field_schema(list_rules));
                }
                if list_rules.is_some() {
                    return Err(SchemaErrorKind::UnsupportedRule(format!(
                        "list rules on message {name}"
                    ))
                    .into());
                }
                let (reference, wrapper) = self.message_ref(name)?;
                let field = RefField { reference };
                Ok(if wrapper {
                    FieldSchema::OneofRef(field)
                } else {
                    FieldSchema::ObjectRef(field)
                })
            }
            FieldKind::Enum(name) => {
                let id = self.define_enum(name)?;
                let Some(schema) = self.set.enumeration(id) else {
                    return Err(SchemaErrorKind::DescriptorNotFound(name.clone()).into());
                };
                let enum_rules = match rules {
                    Some(FieldConstraints::Enum(c)) => enum_rules(c, schema)?,
                    Some(other) => return Err(mismatched_rules(other, "enum")),
                    None => EnumRules::default(),
                };
                let (package, local) = (schema.package.clone(), schema.name.clone());
                Ok(FieldSchema::EnumRef(EnumField {
                    reference: self.set.reference_to(&package, &local),
                    rules: enum_rules,
                    list_rules,
                }))
            }
            scalar => {
                let scalar = apply_scalar_rules(scalar_for_kind(scalar)?, rules)?;
                Ok(FieldSchema::Scalar(ScalarField { scalar, list_rules }))
            }
        }
    }

    /// Returns the shared reference to a message, building it on first use.
    fn message_ref(&mut self, full_name: &str) -> Result<(RefId, bool)> {
        let message = self.message_descriptor(full_name)?;
        let wrapper = self.is_oneof_wrapper(message)?;
        if !self.in_progress.contains(full_name) {
            self.define_message(full_name)?;
        }
        Ok((self.set.reference_to(&message.package, &message.name), wrapper))
    }

    fn define_enum(&mut self, full_name: &str) -> Result<SchemaId> {
        let Some(descriptor) = self.resolver.enumeration(full_name) else {
            return Err(SchemaErrorKind::DescriptorNotFound(full_name.to_string()).into());
        };
        if let Some(id) = self.set.lookup_in(&descriptor.package, &descriptor.name) {
            return Ok(id);
        }

        let schema = self
            .enum_schema(descriptor)
            .map_err(|e| e.at(full_name))?;
        let options = schema.options.len();
        let id = self
            .set
            .define(RootSchema::Enum(schema))
            .map_err(|e| e.at(full_name))?;
        debug!(enumeration = full_name, options, "Built enum schema");
        Ok(id)
    }

    fn enum_schema(&self, descriptor: &EnumDescriptor) -> Result<EnumSchema> {
        let suffix = self.config.enum_unspecified_suffix.as_str();
        let Some(zero) = descriptor
            .values
            .first()
            .filter(|v| v.number == 0 && v.name.ends_with(suffix))
        else {
            return Err(SchemaErrorKind::MissingUnspecified {
                enum_name: descriptor.full_name(),
                suffix: suffix.to_string(),
            }
            .into());
        };
        let prefix = &zero.name[..zero.name.len() - suffix.len()];

        let options = descriptor
            .values
            .iter()
            .map(|value| {
                let name = value.name.strip_prefix(prefix).ok_or_else(|| {
                    SchemaError::from(SchemaErrorKind::PrefixMismatch {
                        option: value.name.clone(),
                        prefix: prefix.to_string(),
                    })
                })?;
                Ok(EnumOption {
                    name: name.to_string(),
                    number: value.number,
                    description: value.comments.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(EnumSchema {
            package: descriptor.package.clone(),
            name: descriptor.name.clone(),
            description: descriptor.comments.clone(),
            prefix: prefix.to_string(),
            options,
        })
    }
}

fn mismatched_rules(rules: &FieldConstraints, field: &str) -> SchemaError {
    SchemaErrorKind::ConflictingRules(format!("{} rules on a {field} field", rules.family())).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{DescriptorPool, OneofDescriptor};

    fn status_pool() -> DescriptorPool {
        let mut pool = DescriptorPool::new();
        pool.add_enum(EnumDescriptor::new(
            "test.v1",
            "Status",
            &[("STATUS_UNSPECIFIED", 0), ("STATUS_ACTIVE", 1)],
        ));
        pool
    }

    #[test]
    fn test_enum_prefix_is_stripped() {
        let pool = status_pool();
        let mut builder = SchemaBuilder::new(&pool);
        let id = builder.build_enum("test.v1.Status").unwrap();
        let schema = builder.set().enumeration(id).unwrap();
        assert_eq!(schema.prefix, "STATUS_");
        assert_eq!(schema.options[1].name, "ACTIVE");
        assert_eq!(builder.build_enum("test.v1.Status").unwrap(), id);
    }

    #[test]
    fn test_enum_without_unspecified_zero() {
        let mut pool = DescriptorPool::new();
        pool.add_enum(EnumDescriptor::new("test.v1", "Color", &[("COLOR_RED", 0)]));
        let err = SchemaBuilder::new(&pool)
            .build_enum("test.v1.Color")
            .unwrap_err();
        assert!(matches!(err.kind, SchemaErrorKind::MissingUnspecified { .. }));
        assert_eq!(err.path.to_string(), "test.v1.Color");
    }

    #[test]
    fn test_enum_option_without_prefix() {
        let mut pool = DescriptorPool::new();
        pool.add_enum(EnumDescriptor::new(
            "test.v1",
            "Color",
            &[("COLOR_UNSPECIFIED", 0), ("RED", 1)],
        ));
        let err = SchemaBuilder::new(&pool)
            .build_enum("test.v1.Color")
            .unwrap_err();
        assert_eq!(
            err.kind,
            SchemaErrorKind::PrefixMismatch {
                option: "RED".into(),
                prefix: "COLOR_".into()
            }
        );
    }

    #[test]
    fn test_configured_unspecified_suffix() {
        let mut pool = DescriptorPool::new();
        pool.add_enum(EnumDescriptor::new(
            "test.v1",
            "Color",
            &[("COLOR_UNKNOWN", 0), ("COLOR_RED", 1)],
        ));
        let config = BuildConfig {
            enum_unspecified_suffix: "UNKNOWN".into(),
            ..BuildConfig::default()
        };
        let mut builder = SchemaBuilder::with_config(&pool, config);
        let id = builder.build_enum("test.v1.Color").unwrap();
        assert_eq!(builder.set().enumeration(id).unwrap().options[1].name, "RED");
    }

    #[test]
    fn test_failed_build_leaves_set_untouched() {
        let mut pool = status_pool();
        pool.add_message(
            MessageDescriptor::new("test.v1", "Good")
                .with_field(FieldDescriptor::new(1, "id", FieldKind::String)),
        );
        pool.add_message(
            MessageDescriptor::new("test.v1", "Bad")
                .with_field(FieldDescriptor::new(
                    1,
                    "status",
                    FieldKind::Enum("test.v1.Status".into()),
                ))
                .with_field(FieldDescriptor::new(
                    2,
                    "legacy",
                    FieldKind::Group("test.v1.Legacy".into()),
                )),
        );

        let mut builder = SchemaBuilder::new(&pool);
        builder.build_message("test.v1.Good").unwrap();
        let err = builder.build_message("test.v1.Bad").unwrap_err();
        assert_eq!(err.path.to_string(), "test.v1.Bad.legacy");
        assert_eq!(builder.set().len(), 1);
        assert!(builder.set().lookup("test.v1.Status").is_none());
    }

    #[test]
    fn test_wrapper_annotation_with_extra_fields() {
        let mut pool = DescriptorPool::new();
        let mut message = MessageDescriptor::new("test.v1", "Payment")
            .with_oneof(OneofDescriptor::new("type"))
            .with_field(FieldDescriptor::new(1, "card", FieldKind::String).in_oneof(0))
            .with_field(FieldDescriptor::new(2, "note", FieldKind::String));
        message.options.oneof = Some(true);
        pool.add_message(message);

        let err = SchemaBuilder::new(&pool)
            .build_message("test.v1.Payment")
            .unwrap_err();
        assert!(matches!(err.kind, SchemaErrorKind::InvalidOneofWrapper(_)));
    }
}
