//! Schema arena.
//!
//! A [`SchemaSet`] owns every root schema and every reference of one build.
//! Schemas are addressed by [`SchemaId`], references by [`RefId`], and each
//! `(package, name)` pair maps to exactly one reference so that resolution
//! happens once and every use sees the same target.
//!
//! Only the builder, the plain loader and the linker mutate a set; consumers
//! receive it fully linked and read it through shared references.

use std::collections::BTreeMap;

use crate::descriptor::{full_name, split_full_name};
use crate::error::{Result, SchemaErrorKind};
use crate::schema::{EnumSchema, ObjectSchema, OneofSchema, RefId, RefSchema, RootSchema, SchemaId};

/// A named grouping of schemas.
///
/// Maps each local schema name to the shared reference for that name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Package {
    pub name: String,
    schemas: BTreeMap<String, RefId>,
}

impl Package {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            schemas: BTreeMap::new(),
        }
    }

    /// Local schema names known to this package, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    /// The shared reference for a local name, if the name was ever used.
    pub fn reference(&self, name: &str) -> Option<RefId> {
        self.schemas.get(name).copied()
    }
}

/// Arena of root schemas and their cross references.
#[derive(Debug, Clone, Default)]
pub struct SchemaSet {
    schemas: Vec<RootSchema>,
    refs: Vec<RefSchema>,
    packages: BTreeMap<String, Package>,
    linked: bool,
}

impl SchemaSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Number of defined root schemas.
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// `true` once [`link`](Self::link) has succeeded and nothing was added since.
    pub fn is_linked(&self) -> bool {
        self.linked
    }

    /// Returns a root schema by id.
    pub fn get(&self, id: SchemaId) -> Option<&RootSchema> {
        self.schemas.get(id.0)
    }

    /// Returns the object schema for `id`, if it is one.
    pub fn object(&self, id: SchemaId) -> Option<&ObjectSchema> {
        match self.get(id)? {
            RootSchema::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Returns the oneof schema for `id`, if it is one.
    pub fn oneof(&self, id: SchemaId) -> Option<&OneofSchema> {
        match self.get(id)? {
            RootSchema::Oneof(o) => Some(o),
            _ => None,
        }
    }

    /// Returns the enum schema for `id`, if it is one.
    pub fn enumeration(&self, id: SchemaId) -> Option<&EnumSchema> {
        match self.get(id)? {
            RootSchema::Enum(e) => Some(e),
            _ => None,
        }
    }

    /// Iterates over all roots in definition order.
    pub fn iter(&self) -> impl Iterator<Item = (SchemaId, &RootSchema)> {
        self.schemas
            .iter()
            .enumerate()
            .map(|(i, schema)| (SchemaId(i), schema))
    }

    /// Returns a reference by id.
    pub fn reference(&self, id: RefId) -> Option<&RefSchema> {
        self.refs.get(id.0)
    }

    /// Follows a reference to its target id.
    pub fn resolve(&self, id: RefId) -> Option<SchemaId> {
        self.reference(id)?.target
    }

    /// Follows a reference to its target schema.
    pub fn resolve_schema(&self, id: RefId) -> Option<&RootSchema> {
        self.get(self.resolve(id)?)
    }

    /// Finds a defined schema by `package.Name`.
    pub fn lookup(&self, full_name: &str) -> Option<SchemaId> {
        let (package, name) = split_full_name(full_name);
        self.lookup_in(package, name)
    }

    /// Finds a defined schema by package and local name.
    pub fn lookup_in(&self, package: &str, name: &str) -> Option<SchemaId> {
        let reference = self.packages.get(package)?.reference(name)?;
        self.resolve(reference)
    }

    /// Iterates over packages, sorted by name.
    pub fn packages(&self) -> impl Iterator<Item = &Package> {
        self.packages.values()
    }

    /// Returns a package by name.
    pub fn package(&self, name: &str) -> Option<&Package> {
        self.packages.get(name)
    }

    /// Returns the shared reference for `(package, name)`, creating the
    /// package and the reference on first use.
    pub(crate) fn reference_to(&mut self, package: &str, name: &str) -> RefId {
        let next = RefId(self.refs.len());
        let entry = self
            .packages
            .entry(package.to_string())
            .or_insert_with(|| Package::new(package));
        if let Some(existing) = entry.schemas.get(name) {
            return *existing;
        }
        entry.schemas.insert(name.to_string(), next);
        self.refs.push(RefSchema::new(package, name));
        next
    }

    /// Adds a root schema and points its shared reference at it.
    ///
    /// # Errors
    ///
    /// [`SchemaErrorKind::DuplicateSchema`] if the name is already defined.
    pub(crate) fn define(&mut self, schema: RootSchema) -> Result<SchemaId> {
        let reference = self.reference_to(schema.package(), schema.name());
        if self.refs[reference.0].target.is_some() {
            return Err(SchemaErrorKind::DuplicateSchema(schema.full_name()).into());
        }
        let id = SchemaId(self.schemas.len());
        self.schemas.push(schema);
        self.refs[reference.0].target = Some(id);
        self.linked = false;
        Ok(id)
    }

    pub(crate) fn set_linked(&mut self, linked: bool) {
        self.linked = linked;
    }

    /// Renders a reference for error messages.
    pub(crate) fn reference_name(&self, id: RefId) -> String {
        self.reference(id)
            .map(RefSchema::full_name)
            .unwrap_or_else(|| full_name("<unknown>", &id.0.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::EnumOption;

    fn status_enum() -> RootSchema {
        RootSchema::Enum(EnumSchema {
            package: "test.v1".into(),
            name: "Status".into(),
            description: None,
            prefix: "STATUS_".into(),
            options: vec![EnumOption {
                name: "UNSPECIFIED".into(),
                number: 0,
                description: None,
            }],
        })
    }

    #[test]
    fn test_reference_is_memoized_by_package_and_name() {
        let mut set = SchemaSet::new();
        let a = set.reference_to("test.v1", "Task");
        let b = set.reference_to("test.v1", "Task");
        let c = set.reference_to("other.v1", "Task");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(set.packages().count(), 2);
    }

    #[test]
    fn test_define_resolves_existing_reference() {
        let mut set = SchemaSet::new();
        let reference = set.reference_to("test.v1", "Status");
        assert!(set.resolve(reference).is_none());

        let id = set.define(status_enum()).unwrap();
        assert_eq!(set.resolve(reference), Some(id));
        assert_eq!(set.lookup("test.v1.Status"), Some(id));
        assert!(set.enumeration(id).is_some());
        assert!(set.object(id).is_none());
    }

    #[test]
    fn test_define_twice_is_duplicate() {
        let mut set = SchemaSet::new();
        set.define(status_enum()).unwrap();
        let err = set.define(status_enum()).unwrap_err();
        assert_eq!(
            err.kind,
            SchemaErrorKind::DuplicateSchema("test.v1.Status".into())
        );
    }
}
