//! Plain, serializable schema form.
//!
//! The plain form is what exporters and downstream tooling consume: every
//! reference is written out as a `package.Name` string instead of a
//! [`RefId`], so a package can be dumped to JSON or YAML and loaded back
//! into an equivalent [`SchemaSet`] with [`SchemaSet::from_plain`].

use serde::{Deserialize, Serialize};

use crate::config::BuildConfig;
use crate::descriptor::{EntityObject, full_name, split_full_name};
use crate::error::{Result, SchemaError, SchemaErrorKind};
use crate::schema::{
    ArrayField, ArrayRules, EnumField, EnumOption, EnumRules, EnumSchema, FieldSchema, ListRules,
    MapField, MapRules, ObjectProperty, ObjectSchema, OneofSchema, RefField, RefId, RootSchema,
    ScalarField, SchemaId,
};
use crate::set::SchemaSet;

/// All schemas of one package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlainPackage {
    pub name: String,
    #[serde(default)]
    pub schemas: Vec<PlainRootSchema>,
}

impl PlainPackage {
    /// Parses a package from JSON.
    ///
    /// # Errors
    ///
    /// Returns the [`serde_json::Error`] for malformed input.
    pub fn from_json_str(json: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serializes the package to pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns the [`serde_json::Error`] if serialization fails.
    pub fn to_json_string(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// A root schema with package-relative name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlainRootSchema {
    Object {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(default)]
        properties: Vec<PlainProperty>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        entity: Option<EntityObject>,
    },
    Oneof {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(default)]
        properties: Vec<PlainProperty>,
    },
    Enum {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(default)]
        prefix: String,
        options: Vec<EnumOption>,
    },
}

impl PlainRootSchema {
    pub fn name(&self) -> &str {
        match self {
            PlainRootSchema::Object { name, .. }
            | PlainRootSchema::Oneof { name, .. }
            | PlainRootSchema::Enum { name, .. } => name,
        }
    }
}

/// A property with its references spelled out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlainProperty {
    pub name: String,
    pub field: PlainField,
    #[serde(default, skip_serializing_if = "is_false")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub read_only: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub write_only: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub explicitly_optional: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub field_path: Vec<u32>,
}

/// A field schema with its references spelled out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlainField {
    Scalar(ScalarField),
    Object {
        reference: String,
    },
    Oneof {
        reference: String,
    },
    Enum {
        reference: String,
        #[serde(default)]
        rules: EnumRules,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        list_rules: Option<ListRules>,
    },
    Array {
        items: Box<PlainField>,
        #[serde(default)]
        rules: ArrayRules,
    },
    Map {
        values: Box<PlainField>,
        #[serde(default)]
        rules: MapRules,
    },
    Any,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl ObjectProperty {
    /// Re-externalizes the property, naming references by `package.Name`.
    pub fn to_plain(&self, set: &SchemaSet) -> PlainProperty {
        PlainProperty {
            name: self.name.clone(),
            field: plain_field(&self.schema, set),
            required: self.required,
            read_only: self.read_only,
            write_only: self.write_only,
            explicitly_optional: self.explicitly_optional,
            description: self.description.clone(),
            field_path: self.field_path.clone(),
        }
    }
}

fn plain_field(schema: &FieldSchema, set: &SchemaSet) -> PlainField {
    match schema {
        FieldSchema::Scalar(scalar) => PlainField::Scalar(scalar.clone()),
        FieldSchema::ObjectRef(r) => PlainField::Object {
            reference: set.reference_name(r.reference),
        },
        FieldSchema::OneofRef(r) => PlainField::Oneof {
            reference: set.reference_name(r.reference),
        },
        FieldSchema::EnumRef(e) => PlainField::Enum {
            reference: set.reference_name(e.reference),
            rules: e.rules.clone(),
            list_rules: e.list_rules,
        },
        FieldSchema::Array(array) => PlainField::Array {
            items: Box::new(plain_field(&array.items, set)),
            rules: array.rules.clone(),
        },
        FieldSchema::Map(map) => PlainField::Map {
            values: Box::new(plain_field(&map.values, set)),
            rules: map.rules.clone(),
        },
        FieldSchema::Any => PlainField::Any,
    }
}

fn plain_properties(properties: &[ObjectProperty], set: &SchemaSet) -> Vec<PlainProperty> {
    properties.iter().map(|p| p.to_plain(set)).collect()
}

impl SchemaSet {
    /// Re-externalizes one root schema.
    pub fn to_plain(&self, id: SchemaId) -> Option<PlainRootSchema> {
        let plain = match self.get(id)? {
            RootSchema::Object(o) => PlainRootSchema::Object {
                name: o.name.clone(),
                description: o.description.clone(),
                properties: plain_properties(&o.properties, self),
                entity: o.entity.clone(),
            },
            RootSchema::Oneof(o) => PlainRootSchema::Oneof {
                name: o.name.clone(),
                description: o.description.clone(),
                properties: plain_properties(&o.properties, self),
            },
            RootSchema::Enum(e) => PlainRootSchema::Enum {
                name: e.name.clone(),
                description: e.description.clone(),
                prefix: e.prefix.clone(),
                options: e.options.clone(),
            },
        };
        Some(plain)
    }

    /// Re-externalizes every schema defined in a package, sorted by name.
    ///
    /// Returns `None` for a package with no defined schema.
    pub fn export_package(&self, name: &str) -> Option<PlainPackage> {
        let package = self.package(name)?;
        let schemas: Vec<PlainRootSchema> = package
            .names()
            .filter_map(|local| self.lookup_in(name, local))
            .filter_map(|id| self.to_plain(id))
            .collect();
        if schemas.is_empty() {
            return None;
        }
        Some(PlainPackage {
            name: name.to_string(),
            schemas,
        })
    }

    /// Re-externalizes every package that defines at least one schema.
    pub fn export(&self) -> Vec<PlainPackage> {
        self.packages()
            .filter_map(|package| self.export_package(&package.name))
            .collect()
    }

    /// Loads plain packages into a new, linked set.
    ///
    /// # Examples
    ///
    /// ```
    /// use msgshape_core::{PlainPackage, SchemaSet};
    ///
    /// let package = PlainPackage::from_json_str(r#"{
    ///     "name": "test.v1",
    ///     "schemas": [{ "enum": {
    ///         "name": "Status",
    ///         "prefix": "STATUS_",
    ///         "options": [{ "name": "UNSPECIFIED", "number": 0 }]
    ///     } }]
    /// }"#)
    /// .unwrap();
    /// let set = SchemaSet::from_plain(&[package]).unwrap();
    /// assert!(set.is_linked());
    /// assert!(set.lookup("test.v1.Status").is_some());
    /// ```
    ///
    /// # Errors
    ///
    /// Malformed references, duplicate names and any link error.
    pub fn from_plain(packages: &[PlainPackage]) -> Result<SchemaSet> {
        let mut set = SchemaSet::new();
        for package in packages {
            for schema in &package.schemas {
                let schema_name = full_name(&package.name, schema.name());
                let root = root_from_plain(&mut set, &package.name, schema)
                    .map_err(|e| e.at(schema_name.as_str()))?;
                set.define(root).map_err(|e| e.at(schema_name.as_str()))?;
            }
        }
        set.link()?;
        Ok(set)
    }
}

fn root_from_plain(set: &mut SchemaSet, package: &str, schema: &PlainRootSchema) -> Result<RootSchema> {
    let root = match schema {
        PlainRootSchema::Object {
            name,
            description,
            properties,
            entity,
        } => RootSchema::Object(ObjectSchema {
            package: package.to_string(),
            name: name.clone(),
            description: description.clone(),
            properties: properties_from_plain(set, properties)?,
            entity: entity.clone(),
        }),
        PlainRootSchema::Oneof {
            name,
            description,
            properties,
        } => RootSchema::Oneof(OneofSchema {
            package: package.to_string(),
            name: name.clone(),
            description: description.clone(),
            properties: properties_from_plain(set, properties)?,
        }),
        PlainRootSchema::Enum {
            name,
            description,
            prefix,
            options,
        } => {
            if !options.iter().any(|option| option.number == 0) {
                return Err(SchemaErrorKind::MissingUnspecified {
                    enum_name: full_name(package, name),
                    suffix: BuildConfig::default().enum_unspecified_suffix,
                }
                .into());
            }
            RootSchema::Enum(EnumSchema {
                package: package.to_string(),
                name: name.clone(),
                description: description.clone(),
                prefix: prefix.clone(),
                options: options.clone(),
            })
        }
    };
    Ok(root)
}

fn properties_from_plain(
    set: &mut SchemaSet,
    properties: &[PlainProperty],
) -> Result<Vec<ObjectProperty>> {
    properties
        .iter()
        .map(|plain| {
            let schema = field_from_plain(set, &plain.field).map_err(|e| e.at(plain.name.as_str()))?;
            Ok(ObjectProperty {
                name: plain.name.clone(),
                schema,
                required: plain.required,
                read_only: plain.read_only,
                write_only: plain.write_only,
                explicitly_optional: plain.explicitly_optional,
                description: plain.description.clone(),
                field_path: plain.field_path.clone(),
            })
        })
        .collect()
}

fn field_from_plain(set: &mut SchemaSet, field: &PlainField) -> Result<FieldSchema> {
    let schema = match field {
        PlainField::Scalar(scalar) => FieldSchema::Scalar(scalar.clone()),
        PlainField::Object { reference } => FieldSchema::ObjectRef(RefField {
            reference: parse_reference(set, reference)?,
        }),
        PlainField::Oneof { reference } => FieldSchema::OneofRef(RefField {
            reference: parse_reference(set, reference)?,
        }),
        PlainField::Enum {
            reference,
            rules,
            list_rules,
        } => FieldSchema::EnumRef(EnumField {
            reference: parse_reference(set, reference)?,
            rules: rules.clone(),
            list_rules: *list_rules,
        }),
        PlainField::Array { items, rules } => FieldSchema::Array(ArrayField {
            items: Box::new(field_from_plain(set, items)?),
            rules: rules.clone(),
        }),
        PlainField::Map { values, rules } => FieldSchema::Map(MapField {
            values: Box::new(field_from_plain(set, values)?),
            rules: rules.clone(),
        }),
        PlainField::Any => FieldSchema::Any,
    };
    Ok(schema)
}

fn parse_reference(set: &mut SchemaSet, reference: &str) -> Result<RefId> {
    let (package, name) = split_full_name(reference);
    if name.is_empty() || reference.starts_with('.') {
        return Err(SchemaError::from(SchemaErrorKind::MalformedReference(
            reference.to_string(),
        )));
    }
    Ok(set.reference_to(package, name))
}
