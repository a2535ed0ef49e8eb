//! Typed accessors for scalar, enum, array, map and any properties.
//!
//! Each accessor owns the mutable borrow of the root message for as long as
//! it lives and locates its errors with the property path it was created
//! from.

use std::collections::BTreeMap;

use msgshape_core::{
    ArrayField, EnumOption, EnumSchema, ErrorPath, FieldSchema, MapField, ScalarSchema, SchemaSet,
};

use crate::context::ValueContext;
use crate::error::{BindError, BindErrorKind, Result};
use crate::message::{DynamicMessage, Value};
use crate::object::{FieldValue, resolve_enum};
use crate::scalar::ScalarValue;

fn stored_number(value: Option<&Value>) -> std::result::Result<Option<i32>, BindErrorKind> {
    match value {
        None => Ok(None),
        Some(Value::EnumNumber(n)) => Ok(Some(*n)),
        Some(other) => Err(BindErrorKind::StorageMismatch {
            expected: "enum",
            found: other.kind_name(),
        }),
    }
}

/// Option for a stored enum value.
///
/// A number the schema does not define means the data and the schema have
/// drifted apart, and is reported as [`BindErrorKind::UnknownEnumNumber`].
pub(crate) fn enum_option<'s>(
    schema: &'s EnumSchema,
    value: Option<&Value>,
) -> std::result::Result<Option<&'s EnumOption>, BindErrorKind> {
    let Some(number) = stored_number(value)? else {
        return Ok(None);
    };
    schema
        .option_by_number(number)
        .map(Some)
        .ok_or(BindErrorKind::UnknownEnumNumber(number))
}

fn enum_number(schema: &EnumSchema, name: &str) -> std::result::Result<i32, BindErrorKind> {
    schema
        .option_by_name(name)
        .map(|option| option.number)
        .ok_or_else(|| BindErrorKind::UnknownEnumName(name.to_string()))
}

/// Accessor for a scalar property.
pub struct ScalarImpl<'s, 'm> {
    schema: &'s ScalarSchema,
    ctx: ValueContext,
    root: &'m mut DynamicMessage,
    path: ErrorPath,
}

impl<'s, 'm> ScalarImpl<'s, 'm> {
    pub(crate) fn new(
        schema: &'s ScalarSchema,
        ctx: ValueContext,
        root: &'m mut DynamicMessage,
        path: ErrorPath,
    ) -> Self {
        Self {
            schema,
            ctx,
            root,
            path,
        }
    }

    pub fn schema(&self) -> &'s ScalarSchema {
        self.schema
    }

    pub fn is_set(&self) -> bool {
        self.ctx.read(&*self.root).is_some()
    }

    pub fn get(&self) -> Result<Option<ScalarValue>> {
        self.ctx
            .read(&*self.root)
            .map(|value| ScalarValue::from_storage(self.schema, value))
            .transpose()
            .map_err(|kind| BindError::new(self.path.clone(), kind))
    }

    /// Stores `value`, materializing every missing ancestor.
    ///
    /// # Errors
    ///
    /// [`BindErrorKind::WrongShape`] if the value's logical shape differs
    /// from the schema's.
    pub fn set(&mut self, value: impl Into<ScalarValue>) -> Result<()> {
        let stored = value
            .into()
            .to_storage(self.schema)
            .map_err(|kind| BindError::new(self.path.clone(), kind))?;
        self.ctx
            .write(&mut *self.root, stored)
            .map_err(|kind| BindError::new(self.path.clone(), kind))
    }

    pub fn clear(&mut self) -> Result<()> {
        self.ctx
            .clear(&mut *self.root)
            .map_err(|kind| BindError::new(self.path.clone(), kind))
    }
}

/// Accessor for an enum property.
///
/// Options are addressed by their stripped names, e.g. `ACTIVE` for
/// `STATUS_ACTIVE`; storage holds the declared number.
pub struct EnumImpl<'s, 'm> {
    schema: &'s EnumSchema,
    ctx: ValueContext,
    root: &'m mut DynamicMessage,
    path: ErrorPath,
}

impl<'s, 'm> EnumImpl<'s, 'm> {
    pub(crate) fn new(
        schema: &'s EnumSchema,
        ctx: ValueContext,
        root: &'m mut DynamicMessage,
        path: ErrorPath,
    ) -> Self {
        Self {
            schema,
            ctx,
            root,
            path,
        }
    }

    pub fn schema(&self) -> &'s EnumSchema {
        self.schema
    }

    pub fn is_set(&self) -> bool {
        self.ctx.read(&*self.root).is_some()
    }

    /// The raw stored number.
    pub fn number(&self) -> Result<Option<i32>> {
        stored_number(self.ctx.read(&*self.root))
            .map_err(|kind| BindError::new(self.path.clone(), kind))
    }

    pub fn get(&self) -> Result<Option<&'s EnumOption>> {
        enum_option(self.schema, self.ctx.read(&*self.root))
            .map_err(|kind| BindError::new(self.path.clone(), kind))
    }

    /// Sets the option by stripped name, matched case-sensitively.
    pub fn set(&mut self, name: &str) -> Result<()> {
        let number = enum_number(self.schema, name)
            .map_err(|kind| BindError::new(self.path.clone(), kind))?;
        self.store(number)
    }

    /// Sets the option by number; the number must be defined.
    pub fn set_number(&mut self, number: i32) -> Result<()> {
        if self.schema.option_by_number(number).is_none() {
            return Err(BindError::new(
                self.path.clone(),
                BindErrorKind::UnknownEnumNumber(number),
            ));
        }
        self.store(number)
    }

    fn store(&mut self, number: i32) -> Result<()> {
        self.ctx
            .write(&mut *self.root, Value::EnumNumber(number))
            .map_err(|kind| BindError::new(self.path.clone(), kind))
    }

    pub fn clear(&mut self) -> Result<()> {
        self.ctx
            .clear(&mut *self.root)
            .map_err(|kind| BindError::new(self.path.clone(), kind))
    }
}

/// Accessor for an array property.
///
/// Elements are exposed through list-element contexts bound to existing
/// slots. Message-like elements are added with [`append`](Self::append),
/// scalar and enum elements with [`append_scalar`](Self::append_scalar) and
/// [`append_enum`](Self::append_enum).
pub struct ArrayImpl<'s, 'm> {
    set: &'s SchemaSet,
    field: &'s ArrayField,
    ctx: ValueContext,
    root: &'m mut DynamicMessage,
    path: ErrorPath,
}

impl<'s, 'm> ArrayImpl<'s, 'm> {
    pub(crate) fn new(
        set: &'s SchemaSet,
        field: &'s ArrayField,
        ctx: ValueContext,
        root: &'m mut DynamicMessage,
        path: ErrorPath,
    ) -> Self {
        Self {
            set,
            field,
            ctx,
            root,
            path,
        }
    }

    pub fn items(&self) -> &'s FieldSchema {
        &self.field.items
    }

    fn fail(&self, kind: BindErrorKind) -> BindError {
        BindError::new(self.path.clone(), kind)
    }

    fn list(&self) -> Result<&[Value]> {
        match self.ctx.read(&*self.root) {
            None => Ok(&[]),
            Some(Value::List(items)) => Ok(items),
            Some(other) => Err(self.fail(BindErrorKind::StorageMismatch {
                expected: "list",
                found: other.kind_name(),
            })),
        }
    }

    fn push(&mut self, value: Value) -> Result<usize> {
        let stored = self
            .ctx
            .ensure_value(&mut *self.root, || Value::List(Vec::new()))
            .map_err(|kind| BindError::new(self.path.clone(), kind))?;
        match stored {
            Value::List(items) => {
                items.push(value);
                Ok(items.len() - 1)
            }
            other => Err(BindError::new(
                self.path.clone(),
                BindErrorKind::StorageMismatch {
                    expected: "list",
                    found: other.kind_name(),
                },
            )),
        }
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.list()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.list()?.is_empty())
    }

    /// One list-element context per existing element, in index order.
    pub fn contexts(&self) -> Result<Vec<ValueContext>> {
        let len = self.len()?;
        let Some(list) = self.ctx.location() else {
            return Ok(Vec::new());
        };
        Ok((0..len)
            .map(|index| ValueContext::ListElement {
                list: list.clone(),
                index,
            })
            .collect())
    }

    /// Binds an existing element.
    pub fn element(&mut self, index: usize) -> Result<FieldValue<'s, '_>> {
        let len = self.len()?;
        let list = match self.ctx.location() {
            Some(list) if index < len => list,
            _ => {
                return Err(BindError::new(
                    self.path.child_index(index),
                    BindErrorKind::IndexOutOfBounds { index, len },
                ));
            }
        };
        Ok(FieldValue {
            set: self.set,
            schema: &self.field.items,
            ctx: ValueContext::ListElement { list, index },
            root: &mut *self.root,
            path: self.path.child_index(index),
        })
    }

    /// Grows the list by one default element and binds the new slot.
    ///
    /// # Errors
    ///
    /// [`BindErrorKind::UnsupportedOperation`] for scalar and enum items.
    pub fn append(&mut self) -> Result<FieldValue<'s, '_>> {
        let default = match self.field.items.as_ref() {
            FieldSchema::ObjectRef(_) | FieldSchema::OneofRef(_) | FieldSchema::Any => {
                Value::Message(DynamicMessage::new())
            }
            FieldSchema::Map(_) => Value::Map(BTreeMap::new()),
            _ => {
                return Err(self.fail(BindErrorKind::UnsupportedOperation(
                    "scalar and enum elements are appended by value",
                )));
            }
        };
        let index = self.push(default)?;
        self.element(index)
    }

    /// Appends a scalar after checking its shape.
    pub fn append_scalar(&mut self, value: impl Into<ScalarValue>) -> Result<()> {
        let FieldSchema::Scalar(item) = self.field.items.as_ref() else {
            return Err(self.fail(BindErrorKind::WrongKind {
                expected: "scalar",
                found: self.field.items.kind_name(),
            }));
        };
        let len = self.len()?;
        let stored = value
            .into()
            .to_storage(&item.scalar)
            .map_err(|kind| BindError::new(self.path.child_index(len), kind))?;
        self.push(stored).map(|_| ())
    }

    /// Appends an enum option by stripped name.
    pub fn append_enum(&mut self, name: &str) -> Result<()> {
        let schema = resolve_enum(self.set, &self.field.items).map_err(|kind| self.fail(kind))?;
        let len = self.len()?;
        let number = enum_number(schema, name)
            .map_err(|kind| BindError::new(self.path.child_index(len), kind))?;
        self.push(Value::EnumNumber(number)).map(|_| ())
    }

    /// Reads every element of a scalar array.
    pub fn scalars(&self) -> Result<Vec<ScalarValue>> {
        let FieldSchema::Scalar(item) = self.field.items.as_ref() else {
            return Err(self.fail(BindErrorKind::WrongKind {
                expected: "scalar",
                found: self.field.items.kind_name(),
            }));
        };
        self.list()?
            .iter()
            .enumerate()
            .map(|(index, value)| {
                ScalarValue::from_storage(&item.scalar, value)
                    .map_err(|kind| BindError::new(self.path.child_index(index), kind))
            })
            .collect()
    }

    /// Reads every element of an enum array.
    pub fn options(&self) -> Result<Vec<&'s EnumOption>> {
        let schema = resolve_enum(self.set, &self.field.items).map_err(|kind| self.fail(kind))?;
        let mut options = Vec::new();
        for (index, value) in self.list()?.iter().enumerate() {
            match enum_option(schema, Some(value)) {
                Ok(Some(option)) => options.push(option),
                Ok(None) => {}
                Err(kind) => return Err(BindError::new(self.path.child_index(index), kind)),
            }
        }
        Ok(options)
    }

    /// Removes every element.
    pub fn clear(&mut self) -> Result<()> {
        self.ctx
            .clear(&mut *self.root)
            .map_err(|kind| BindError::new(self.path.clone(), kind))
    }
}

/// Accessor for a map property. Entries iterate in key order.
pub struct MapImpl<'s, 'm> {
    set: &'s SchemaSet,
    field: &'s MapField,
    ctx: ValueContext,
    root: &'m mut DynamicMessage,
    path: ErrorPath,
}

impl<'s, 'm> MapImpl<'s, 'm> {
    pub(crate) fn new(
        set: &'s SchemaSet,
        field: &'s MapField,
        ctx: ValueContext,
        root: &'m mut DynamicMessage,
        path: ErrorPath,
    ) -> Self {
        Self {
            set,
            field,
            ctx,
            root,
            path,
        }
    }

    pub fn values(&self) -> &'s FieldSchema {
        &self.field.values
    }

    fn fail(&self, kind: BindErrorKind) -> BindError {
        BindError::new(self.path.clone(), kind)
    }

    fn map(&self) -> Result<Option<&BTreeMap<String, Value>>> {
        match self.ctx.read(&*self.root) {
            None => Ok(None),
            Some(Value::Map(entries)) => Ok(Some(entries)),
            Some(other) => Err(self.fail(BindErrorKind::StorageMismatch {
                expected: "map",
                found: other.kind_name(),
            })),
        }
    }

    fn map_mut(&mut self) -> Result<&mut BTreeMap<String, Value>> {
        let stored = self
            .ctx
            .ensure_value(&mut *self.root, || Value::Map(BTreeMap::new()))
            .map_err(|kind| BindError::new(self.path.clone(), kind))?;
        match stored {
            Value::Map(entries) => Ok(entries),
            other => Err(BindError::new(
                self.path.clone(),
                BindErrorKind::StorageMismatch {
                    expected: "map",
                    found: other.kind_name(),
                },
            )),
        }
    }

    fn entry_context(&self, key: &str) -> Result<ValueContext> {
        let map = self.ctx.location().ok_or_else(|| {
            self.fail(BindErrorKind::UnsupportedOperation(
                "virtual properties have no storage",
            ))
        })?;
        Ok(ValueContext::MapEntry {
            map,
            key: key.to_string(),
        })
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.map()?.map_or(0, BTreeMap::len))
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn keys(&self) -> Result<Vec<String>> {
        Ok(self
            .map()?
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default())
    }

    /// Existing entries as key and map-entry context pairs.
    pub fn entries(&self) -> Result<Vec<(String, ValueContext)>> {
        self.keys()?
            .into_iter()
            .map(|key| {
                let ctx = self.entry_context(&key)?;
                Ok((key, ctx))
            })
            .collect()
    }

    pub fn contains_key(&self, key: &str) -> Result<bool> {
        Ok(self.map()?.is_some_and(|entries| entries.contains_key(key)))
    }

    /// Binds an existing entry.
    pub fn entry(&mut self, key: &str) -> Result<FieldValue<'s, '_>> {
        if !self.contains_key(key)? {
            return Err(BindError::new(
                self.path.child_key(key),
                BindErrorKind::MissingSlot,
            ));
        }
        self.bind_entry(key)
    }

    fn bind_entry(&mut self, key: &str) -> Result<FieldValue<'s, '_>> {
        let ctx = self.entry_context(key)?;
        Ok(FieldValue {
            set: self.set,
            schema: &self.field.values,
            ctx,
            root: &mut *self.root,
            path: self.path.child_key(key),
        })
    }

    /// Binds the entry for `key`, inserting an empty message when absent.
    ///
    /// # Errors
    ///
    /// [`BindErrorKind::UnsupportedOperation`] unless values are objects,
    /// oneofs or any.
    pub fn insert(&mut self, key: &str) -> Result<FieldValue<'s, '_>> {
        match self.field.values.as_ref() {
            FieldSchema::ObjectRef(_) | FieldSchema::OneofRef(_) | FieldSchema::Any => {}
            _ => {
                return Err(self.fail(BindErrorKind::UnsupportedOperation(
                    "scalar and enum values are set by value",
                )));
            }
        }
        self.map_mut()?
            .entry(key.to_string())
            .or_insert_with(|| Value::Message(DynamicMessage::new()));
        self.bind_entry(key)
    }

    pub fn set_scalar(&mut self, key: &str, value: impl Into<ScalarValue>) -> Result<()> {
        let FieldSchema::Scalar(item) = self.field.values.as_ref() else {
            return Err(self.fail(BindErrorKind::WrongKind {
                expected: "scalar",
                found: self.field.values.kind_name(),
            }));
        };
        let stored = value
            .into()
            .to_storage(&item.scalar)
            .map_err(|kind| BindError::new(self.path.child_key(key), kind))?;
        self.map_mut()?.insert(key.to_string(), stored);
        Ok(())
    }

    pub fn set_enum(&mut self, key: &str, name: &str) -> Result<()> {
        let schema = resolve_enum(self.set, &self.field.values).map_err(|kind| self.fail(kind))?;
        let number = enum_number(schema, name)
            .map_err(|kind| BindError::new(self.path.child_key(key), kind))?;
        self.map_mut()?
            .insert(key.to_string(), Value::EnumNumber(number));
        Ok(())
    }

    pub fn get_scalar(&self, key: &str) -> Result<Option<ScalarValue>> {
        let FieldSchema::Scalar(item) = self.field.values.as_ref() else {
            return Err(self.fail(BindErrorKind::WrongKind {
                expected: "scalar",
                found: self.field.values.kind_name(),
            }));
        };
        self.map()?
            .and_then(|entries| entries.get(key))
            .map(|value| ScalarValue::from_storage(&item.scalar, value))
            .transpose()
            .map_err(|kind| BindError::new(self.path.child_key(key), kind))
    }

    /// Removes an entry, returning whether it existed. Never materializes
    /// the map.
    pub fn remove(&mut self, key: &str) -> Result<bool> {
        if !self.contains_key(key)? {
            return Ok(false);
        }
        Ok(self.map_mut()?.remove(key).is_some())
    }

    pub fn clear(&mut self) -> Result<()> {
        self.ctx
            .clear(&mut *self.root)
            .map_err(|kind| BindError::new(self.path.clone(), kind))
    }
}

/// Accessor for an untyped value, held as a nested message.
pub struct AnyImpl<'m> {
    ctx: ValueContext,
    root: &'m mut DynamicMessage,
    path: ErrorPath,
}

impl<'m> AnyImpl<'m> {
    pub(crate) fn new(ctx: ValueContext, root: &'m mut DynamicMessage, path: ErrorPath) -> Self {
        Self { ctx, root, path }
    }

    pub fn is_set(&self) -> bool {
        self.ctx.read(&*self.root).is_some()
    }

    pub fn get(&self) -> Result<Option<&DynamicMessage>> {
        match self.ctx.read(&*self.root) {
            None => Ok(None),
            Some(Value::Message(msg)) => Ok(Some(msg)),
            Some(other) => Err(BindError::new(
                self.path.clone(),
                BindErrorKind::StorageMismatch {
                    expected: "message",
                    found: other.kind_name(),
                },
            )),
        }
    }

    pub fn set(&mut self, message: DynamicMessage) -> Result<()> {
        self.ctx
            .write(&mut *self.root, Value::Message(message))
            .map_err(|kind| BindError::new(self.path.clone(), kind))
    }

    pub fn clear(&mut self) -> Result<()> {
        self.ctx
            .clear(&mut *self.root)
            .map_err(|kind| BindError::new(self.path.clone(), kind))
    }
}
