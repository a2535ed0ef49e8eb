//! Reference linking.
//!
//! Walks every property of every object and oneof, confirms that each
//! object, oneof and enum reference points at a defined schema of the right
//! kind, and recurses into the targets. A broken reference is reported with
//! the dotted property path that reached it from the first root that saw
//! it. The pass does not change any schema, so it can be re-run freely.

use std::collections::HashSet;

use tracing::debug;

use crate::error::{ErrorPath, Result, SchemaError, SchemaErrorKind};
use crate::schema::{FieldSchema, RefId, SchemaId};
use crate::set::SchemaSet;

impl SchemaSet {
    /// Links the set, marking it ready for binding.
    ///
    /// # Errors
    ///
    /// Returns the first unresolved or mismatched reference, located by the
    /// property path from its root.
    pub fn link(&mut self) -> Result<()> {
        let mut linker = Linker {
            set: self,
            visited: HashSet::new(),
            references: 0,
        };
        let ids: Vec<SchemaId> = linker.set.iter().map(|(id, _)| id).collect();
        for id in ids {
            let root = linker.set.get(id).map(|r| r.full_name()).unwrap_or_default();
            linker.link_root(id, &ErrorPath::default().child_name(root))?;
        }
        let references = linker.references;

        debug!(schemas = self.len(), references, "Linked schema set");
        self.set_linked(true);
        Ok(())
    }
}

struct Linker<'a> {
    set: &'a SchemaSet,
    visited: HashSet<SchemaId>,
    references: usize,
}

impl Linker<'_> {
    fn link_root(&mut self, id: SchemaId, path: &ErrorPath) -> Result<()> {
        if !self.visited.insert(id) {
            return Ok(());
        }
        let set = self.set;
        let Some(properties) = set.get(id).and_then(|root| root.properties()) else {
            return Ok(());
        };
        for property in properties {
            self.link_field(&property.schema, &path.child_name(&property.name))?;
        }
        Ok(())
    }

    fn link_field(&mut self, schema: &FieldSchema, path: &ErrorPath) -> Result<()> {
        match schema {
            FieldSchema::ObjectRef(r) => self.link_ref(r.reference, "object", path),
            FieldSchema::OneofRef(r) => self.link_ref(r.reference, "oneof", path),
            FieldSchema::EnumRef(e) => self.link_ref(e.reference, "enum", path),
            FieldSchema::Array(array) => self.link_field(&array.items, path),
            FieldSchema::Map(map) => self.link_field(&map.values, path),
            FieldSchema::Scalar(_) | FieldSchema::Any => Ok(()),
        }
    }

    fn link_ref(&mut self, reference: RefId, expected: &'static str, path: &ErrorPath) -> Result<()> {
        self.references += 1;
        let set = self.set;
        let fail = |kind: SchemaErrorKind| SchemaError {
            path: path.clone(),
            kind,
        };

        let Some(info) = set.reference(reference) else {
            return Err(fail(SchemaErrorKind::UnknownSchema {
                reference: set.reference_name(reference),
            }));
        };
        let Some(target) = info.target() else {
            let package_defined = set.package(&info.package).is_some_and(|package| {
                package
                    .names()
                    .any(|name| set.lookup_in(&info.package, name).is_some())
            });
            let kind = if package_defined {
                SchemaErrorKind::UnknownSchema {
                    reference: info.full_name(),
                }
            } else {
                SchemaErrorKind::UnknownPackage {
                    package: info.package.clone(),
                    reference: info.full_name(),
                }
            };
            return Err(fail(kind));
        };

        let found = set.get(target).map(|r| r.kind_name()).unwrap_or("nothing");
        if found != expected {
            return Err(fail(SchemaErrorKind::RefKindMismatch {
                reference: info.full_name(),
                expected,
                found,
            }));
        }

        self.link_root(target, path)
    }
}
