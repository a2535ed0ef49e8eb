//! Depth-first traversal of a linked schema tree.
//!
//! Consumers such as list/filter tooling need every leaf reachable from a
//! root together with its dotted JSON path. Object and oneof references
//! are entered; arrays, maps, enums, scalars and `Any` are leaves. A schema
//! that is already on the walk stack is not re-entered, so recursive
//! schemas terminate.

use std::collections::HashSet;

use crate::error::{ErrorPath, Result, SchemaError, SchemaErrorKind};
use crate::schema::{FieldSchema, ObjectProperty, RefId, SchemaId};
use crate::set::SchemaSet;

/// A leaf reached by [`walk_leaves`].
#[derive(Debug, Clone, Copy)]
pub struct LeafField<'s, 'p> {
    /// Dotted JSON path from the walked root, e.g. `owner.address.city`.
    pub path: &'p str,
    pub property: &'s ObjectProperty,
    pub schema: &'s FieldSchema,
}

/// Visits every leaf under the root `id`, in property order.
///
/// # Errors
///
/// Fails on a reference without a target, which only happens on an
/// unlinked set.
///
/// # Examples
///
/// ```
/// use msgshape_core::{DescriptorPool, FieldDescriptor, FieldKind, MessageDescriptor, SchemaBuilder, walk_leaves};
///
/// let mut pool = DescriptorPool::new();
/// pool.add_message(
///     MessageDescriptor::new("test.v1", "Address")
///         .with_field(FieldDescriptor::new(1, "city", FieldKind::String)),
/// );
/// pool.add_message(
///     MessageDescriptor::new("test.v1", "Person")
///         .with_field(FieldDescriptor::new(1, "name", FieldKind::String))
///         .with_field(FieldDescriptor::new(2, "home", FieldKind::Message("test.v1.Address".into()))),
/// );
/// let mut builder = SchemaBuilder::new(&pool);
/// let person = builder.build_message("test.v1.Person").unwrap();
/// let set = builder.finish().unwrap();
///
/// let mut paths = Vec::new();
/// walk_leaves(&set, person, |leaf| paths.push(leaf.path.to_string())).unwrap();
/// assert_eq!(paths, ["name", "home.city"]);
/// ```
pub fn walk_leaves<'s, F>(set: &'s SchemaSet, id: SchemaId, mut visitor: F) -> Result<()>
where
    F: FnMut(&LeafField<'s, '_>),
{
    let mut stack = vec![id];
    walk_root(set, id, "", &mut stack, &mut visitor)
}

fn walk_root<'s, F>(
    set: &'s SchemaSet,
    id: SchemaId,
    prefix: &str,
    stack: &mut Vec<SchemaId>,
    visitor: &mut F,
) -> Result<()>
where
    F: FnMut(&LeafField<'s, '_>),
{
    let Some(properties) = set.get(id).and_then(|root| root.properties()) else {
        return Ok(());
    };

    for property in properties {
        let path = if prefix.is_empty() {
            property.name.clone()
        } else {
            format!("{prefix}.{}", property.name)
        };

        let reference = match &property.schema {
            FieldSchema::ObjectRef(r) | FieldSchema::OneofRef(r) => r.reference,
            schema => {
                visitor(&LeafField {
                    path: &path,
                    property,
                    schema,
                });
                continue;
            }
        };

        let target = resolve(set, reference, &path)?;
        if stack.contains(&target) {
            continue;
        }
        stack.push(target);
        walk_root(set, target, &path, stack, visitor)?;
        stack.pop();
    }
    Ok(())
}

/// Every root transitively referenced from `id`, in discovery order.
///
/// The root itself is included only when it is reachable from one of its
/// own properties.
///
/// # Errors
///
/// Fails on a reference without a target.
pub fn referenced_schemas(set: &SchemaSet, id: SchemaId) -> Result<Vec<SchemaId>> {
    let mut found = Vec::new();
    let mut seen = HashSet::new();
    collect_root(set, id, "", &mut seen, &mut found)?;
    Ok(found)
}

fn collect_root(
    set: &SchemaSet,
    id: SchemaId,
    prefix: &str,
    seen: &mut HashSet<SchemaId>,
    found: &mut Vec<SchemaId>,
) -> Result<()> {
    let Some(properties) = set.get(id).and_then(|root| root.properties()) else {
        return Ok(());
    };
    for property in properties {
        let path = if prefix.is_empty() {
            property.name.clone()
        } else {
            format!("{prefix}.{}", property.name)
        };
        collect_field(set, &property.schema, &path, seen, found)?;
    }
    Ok(())
}

fn collect_field(
    set: &SchemaSet,
    schema: &FieldSchema,
    path: &str,
    seen: &mut HashSet<SchemaId>,
    found: &mut Vec<SchemaId>,
) -> Result<()> {
    match schema {
        FieldSchema::Array(array) => collect_field(set, &array.items, path, seen, found),
        FieldSchema::Map(map) => collect_field(set, &map.values, path, seen, found),
        FieldSchema::Scalar(_) | FieldSchema::Any => Ok(()),
        other => {
            let Some(reference) = other.reference() else {
                return Ok(());
            };
            let target = resolve(set, reference, path)?;
            if !seen.insert(target) {
                return Ok(());
            }
            found.push(target);
            collect_root(set, target, path, seen, found)
        }
    }
}

fn resolve(set: &SchemaSet, reference: RefId, path: &str) -> Result<SchemaId> {
    set.resolve(reference).ok_or_else(|| SchemaError {
        path: path
            .split('.')
            .fold(ErrorPath::default(), |p, segment| p.child_name(segment)),
        kind: SchemaErrorKind::UnknownSchema {
            reference: set.reference_name(reference),
        },
    })
}
