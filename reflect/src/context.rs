//! Value contexts: where a bound property lives inside a message.
//!
//! A [`ValueContext`] never holds a borrow of the message. It records a
//! [`Location`] relative to the root message and is applied to whichever
//! root the caller passes in, which keeps the bound property tree free of
//! lifetimes tied to the message.
//!
//! Writes through a field context materialize every missing ancestor
//! message first. List-element and map-entry contexts address slots that
//! already exist, so they never create ancestors.

use tracing::trace;

use crate::error::BindErrorKind;
use crate::message::{DynamicMessage, Value};

type Result<T> = std::result::Result<T, BindErrorKind>;

/// One step from a message or value to a nested value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Field of a message.
    Field(u32),
    /// Element of a list.
    Index(usize),
    /// Entry of a map.
    Key(String),
}

/// Path from the root message to a value. Empty means the root itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Location(Vec<Segment>);

impl Location {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Extends the location by a chain of field numbers.
    pub fn with_fields(&self, numbers: &[u32]) -> Self {
        let mut location = self.clone();
        location.0.extend(numbers.iter().map(|n| Segment::Field(*n)));
        location
    }

    pub fn with_index(&self, index: usize) -> Self {
        let mut location = self.clone();
        location.0.push(Segment::Index(index));
        location
    }

    pub fn with_key(&self, key: &str) -> Self {
        let mut location = self.clone();
        location.0.push(Segment::Key(key.to_string()));
        location
    }
}

/// Storage binding of one property, list element or map entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueContext {
    /// A real field, `path` field numbers below the `container` message.
    Field { container: Location, path: Vec<u32> },
    /// No storage of its own; its children live in `container`.
    Virtual { container: Location },
    /// An existing slot of the list at `list`.
    ListElement { list: Location, index: usize },
    /// An entry of the map at `map`.
    MapEntry { map: Location, key: String },
}

impl ValueContext {
    /// Context of a property declared on the message at `container`.
    pub fn for_property(container: &Location, field_path: &[u32]) -> Self {
        if field_path.is_empty() {
            ValueContext::Virtual {
                container: container.clone(),
            }
        } else {
            ValueContext::Field {
                container: container.clone(),
                path: field_path.to_vec(),
            }
        }
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self, ValueContext::Virtual { .. })
    }

    /// Location of the value itself; `None` for virtual contexts.
    pub fn location(&self) -> Option<Location> {
        match self {
            ValueContext::Field { container, path } => Some(container.with_fields(path)),
            ValueContext::Virtual { .. } => None,
            ValueContext::ListElement { list, index } => Some(list.with_index(*index)),
            ValueContext::MapEntry { map, key } => Some(map.with_key(key)),
        }
    }

    /// Location of the message a nested object or oneof binds to.
    ///
    /// A virtual context shares its owner's message.
    pub fn object_container(&self) -> Location {
        match self {
            ValueContext::Virtual { container } => container.clone(),
            other => other.location().unwrap_or_default(),
        }
    }

    /// Reads the stored value, if present.
    pub fn read<'a>(&self, root: &'a DynamicMessage) -> Option<&'a Value> {
        value_at(root, self.location()?.segments())
    }

    /// Stores `value`, materializing ancestors of field contexts.
    /// Writing to a virtual context does nothing.
    pub fn write(&self, root: &mut DynamicMessage, value: Value) -> Result<()> {
        match self {
            ValueContext::Field { container, path } => {
                let Some((last, parents)) = path.split_last() else {
                    return Ok(());
                };
                let parent = ensure_message(root, container.with_fields(parents).segments())?;
                parent.set_field(*last, value);
                Ok(())
            }
            ValueContext::Virtual { .. } => Ok(()),
            ValueContext::ListElement { list, index } => {
                let slot = value_mut(root, list.with_index(*index).segments())
                    .ok_or(BindErrorKind::MissingSlot)?;
                *slot = value;
                Ok(())
            }
            ValueContext::MapEntry { map, key } => {
                let entries = existing_map(root, map)?;
                entries.insert(key.clone(), value);
                Ok(())
            }
        }
    }

    /// Removes the stored value. Clearing never materializes anything.
    pub fn clear(&self, root: &mut DynamicMessage) -> Result<()> {
        match self {
            ValueContext::Field { container, path } => {
                let Some((last, parents)) = path.split_last() else {
                    return Ok(());
                };
                if let Some(parent) = message_mut(root, container.with_fields(parents).segments())
                {
                    parent.clear_field(*last);
                }
                Ok(())
            }
            ValueContext::Virtual { .. } => Ok(()),
            ValueContext::ListElement { .. } => Err(BindErrorKind::UnsupportedOperation(
                "list elements cannot be cleared",
            )),
            ValueContext::MapEntry { map, key } => {
                if let Some(Value::Map(entries)) = value_mut(root, map.segments()) {
                    entries.remove(key);
                }
                Ok(())
            }
        }
    }

    /// Returns the stored value, inserting `default` when absent.
    pub fn ensure_value<'a>(
        &self,
        root: &'a mut DynamicMessage,
        default: impl FnOnce() -> Value,
    ) -> Result<&'a mut Value> {
        match self {
            ValueContext::Field { container, path } => {
                let Some((last, parents)) = path.split_last() else {
                    return Err(BindErrorKind::UnsupportedOperation(
                        "virtual properties have no storage",
                    ));
                };
                let parent = ensure_message(root, container.with_fields(parents).segments())?;
                Ok(parent.field_or_insert_with(*last, default))
            }
            ValueContext::Virtual { .. } => Err(BindErrorKind::UnsupportedOperation(
                "virtual properties have no storage",
            )),
            ValueContext::ListElement { list, index } => {
                value_mut(root, list.with_index(*index).segments()).ok_or(BindErrorKind::MissingSlot)
            }
            ValueContext::MapEntry { map, key } => {
                let entries = existing_map(root, map)?;
                Ok(entries.entry(key.clone()).or_insert_with(default))
            }
        }
    }
}

fn existing_map<'a>(
    root: &'a mut DynamicMessage,
    map: &Location,
) -> Result<&'a mut std::collections::BTreeMap<String, Value>> {
    match value_mut(root, map.segments()) {
        Some(Value::Map(entries)) => Ok(entries),
        Some(other) => Err(BindErrorKind::StorageMismatch {
            expected: "map",
            found: other.kind_name(),
        }),
        None => Err(BindErrorKind::MissingSlot),
    }
}

/// Follows `location` from `root` without modifying anything.
pub(crate) fn value_at<'a>(root: &'a DynamicMessage, location: &[Segment]) -> Option<&'a Value> {
    let (Segment::Field(first), rest) = location.split_first()? else {
        return None;
    };
    let mut value = root.get_field(*first)?;
    for segment in rest {
        value = match (segment, value) {
            (Segment::Field(number), Value::Message(m)) => m.get_field(*number)?,
            (Segment::Index(index), Value::List(items)) => items.get(*index)?,
            (Segment::Key(key), Value::Map(entries)) => entries.get(key)?,
            _ => return None,
        };
    }
    Some(value)
}

/// The message at `location`; the root for an empty location.
pub(crate) fn message_at<'a>(
    root: &'a DynamicMessage,
    location: &[Segment],
) -> Option<&'a DynamicMessage> {
    if location.is_empty() {
        return Some(root);
    }
    value_at(root, location)?.as_message()
}

pub(crate) fn value_mut<'a>(
    root: &'a mut DynamicMessage,
    location: &[Segment],
) -> Option<&'a mut Value> {
    let (Segment::Field(first), rest) = location.split_first()? else {
        return None;
    };
    let mut value = root.get_field_mut(*first)?;
    for segment in rest {
        value = match (segment, value) {
            (Segment::Field(number), Value::Message(m)) => m.get_field_mut(*number)?,
            (Segment::Index(index), Value::List(items)) => items.get_mut(*index)?,
            (Segment::Key(key), Value::Map(entries)) => entries.get_mut(key)?,
            _ => return None,
        };
    }
    Some(value)
}

fn message_mut<'a>(
    root: &'a mut DynamicMessage,
    location: &[Segment],
) -> Option<&'a mut DynamicMessage> {
    if location.is_empty() {
        return Some(root);
    }
    match value_mut(root, location)? {
        Value::Message(m) => Some(m),
        _ => None,
    }
}

/// Returns the message at `location`, creating every missing message on
/// the way. List and map slots are never created.
pub(crate) fn ensure_message<'a>(
    message: &'a mut DynamicMessage,
    location: &[Segment],
) -> Result<&'a mut DynamicMessage> {
    let Some((first, rest)) = location.split_first() else {
        return Ok(message);
    };
    let Segment::Field(number) = first else {
        return Err(BindErrorKind::MissingSlot);
    };

    let value = match rest.first() {
        Some(Segment::Index(_) | Segment::Key(_)) => message
            .get_field_mut(*number)
            .ok_or(BindErrorKind::MissingSlot)?,
        _ => {
            let created = !message.has_field(*number);
            if created {
                trace!(field = number, "Materialized container");
            }
            message.field_or_insert_with(*number, || Value::Message(DynamicMessage::new()))
        }
    };
    descend(value, rest)
}

fn descend<'a>(value: &'a mut Value, location: &[Segment]) -> Result<&'a mut DynamicMessage> {
    match location.split_first() {
        None => match value {
            Value::Message(m) => Ok(m),
            other => Err(BindErrorKind::StorageMismatch {
                expected: "message",
                found: other.kind_name(),
            }),
        },
        Some((Segment::Field(_), _)) => match value {
            Value::Message(m) => ensure_message(m, location),
            other => Err(BindErrorKind::StorageMismatch {
                expected: "message",
                found: other.kind_name(),
            }),
        },
        Some((Segment::Index(index), rest)) => match value {
            Value::List(items) => {
                let len = items.len();
                let item = items
                    .get_mut(*index)
                    .ok_or(BindErrorKind::IndexOutOfBounds { index: *index, len })?;
                descend(item, rest)
            }
            other => Err(BindErrorKind::StorageMismatch {
                expected: "list",
                found: other.kind_name(),
            }),
        },
        Some((Segment::Key(key), rest)) => match value {
            Value::Map(entries) => {
                let entry = entries.get_mut(key).ok_or(BindErrorKind::MissingSlot)?;
                descend(entry, rest)
            }
            other => Err(BindErrorKind::StorageMismatch {
                expected: "map",
                found: other.kind_name(),
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_write_materializes_ancestors() {
        let mut root = DynamicMessage::new();
        let ctx = ValueContext::for_property(&Location::root(), &[4, 2, 1]);
        assert!(ctx.read(&root).is_none());

        ctx.write(&mut root, Value::String("x".into())).unwrap();
        assert_eq!(ctx.read(&root), Some(&Value::String("x".into())));
        assert!(message_at(&root, Location::root().with_fields(&[4, 2]).segments()).is_some());
    }

    #[test]
    fn test_clear_does_not_materialize() {
        let mut root = DynamicMessage::new();
        let ctx = ValueContext::for_property(&Location::root(), &[4, 1]);
        ctx.clear(&mut root).unwrap();
        assert!(root.is_empty());
    }

    #[test]
    fn test_virtual_write_is_noop() {
        let mut root = DynamicMessage::new();
        let ctx = ValueContext::for_property(&Location::root(), &[]);
        assert!(ctx.is_virtual());
        ctx.write(&mut root, Value::Bool(true)).unwrap();
        assert!(root.is_empty());
        assert_eq!(ctx.object_container(), Location::root());
    }

    #[test]
    fn test_list_element_requires_existing_slot() {
        let mut root = DynamicMessage::new();
        let list = Location::root().with_fields(&[2]);
        let ctx = ValueContext::ListElement {
            list: list.clone(),
            index: 0,
        };
        assert_eq!(
            ctx.write(&mut root, Value::I32(1)),
            Err(BindErrorKind::MissingSlot)
        );

        root.set_field(2, Value::List(vec![Value::I32(0)]));
        ctx.write(&mut root, Value::I32(1)).unwrap();
        assert_eq!(ctx.read(&root), Some(&Value::I32(1)));
    }

    #[test]
    fn test_ensure_message_through_list_element() {
        let mut root = DynamicMessage::new();
        root.set_field(
            2,
            Value::List(vec![Value::Message(DynamicMessage::new())]),
        );
        let location = Location::root().with_fields(&[2]).with_index(0).with_fields(&[1]);
        ensure_message(&mut root, location.segments()).unwrap();
        assert!(message_at(&root, location.segments()).is_some());

        let missing = Location::root().with_fields(&[2]).with_index(3);
        assert_eq!(
            ensure_message(&mut root, missing.segments()).unwrap_err(),
            BindErrorKind::IndexOutOfBounds { index: 3, len: 1 }
        );
    }

    #[test]
    fn test_map_entry_write_and_clear() {
        let mut root = DynamicMessage::new();
        root.set_field(6, Value::Map(Default::default()));
        let ctx = ValueContext::MapEntry {
            map: Location::root().with_fields(&[6]),
            key: "env".into(),
        };
        ctx.write(&mut root, Value::String("prod".into())).unwrap();
        assert_eq!(ctx.read(&root), Some(&Value::String("prod".into())));
        ctx.clear(&mut root).unwrap();
        assert!(ctx.read(&root).is_none());
    }
}
