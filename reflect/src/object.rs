//! Binding of object and oneof schemas to message instances.
//!
//! [`ObjectImpl`] and [`OneofImpl`] pair a root schema with a location in a
//! [`DynamicMessage`]. Properties are exposed through a [`PropertySet`] that
//! is built on first use and cached for the lifetime of the binding.
//! Accessing a property yields a [`FieldValue`], which is narrowed to a
//! typed accessor (`as_scalar`, `as_object`, ...) that checks the
//! property's schema kind.
//!
//! A bound container starts unmaterialized when its message is absent.
//! Reads then report every property as unset without allocating anything.
//! The first write below the container, or an explicit
//! [`materialize`](BoundContainer::materialize), creates it together with
//! any missing ancestors. Containers are never removed by this layer.

use std::cell::OnceCell;
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};

use msgshape_core::{
    EnumOption, EnumSchema, ErrorPath, FieldSchema, ObjectProperty, ObjectSchema, OneofSchema,
    RefId, RootSchema, SchemaId, SchemaSet, full_name,
};
use tracing::trace;

use crate::accessors::{AnyImpl, ArrayImpl, EnumImpl, MapImpl, ScalarImpl, enum_option};
use crate::context::{Location, ValueContext, ensure_message, message_at};
use crate::error::{BindError, BindErrorKind, Result};
use crate::message::{DynamicMessage, Value};
use crate::scalar::ScalarValue;

/// A property of a bound container together with its storage binding.
#[derive(Debug, Clone)]
pub struct Property<'s> {
    decl: &'s ObjectProperty,
    ctx: ValueContext,
}

impl<'s> Property<'s> {
    pub fn name(&self) -> &'s str {
        &self.decl.name
    }

    pub fn declaration(&self) -> &'s ObjectProperty {
        self.decl
    }

    pub fn schema(&self) -> &'s FieldSchema {
        &self.decl.schema
    }

    pub fn context(&self) -> &ValueContext {
        &self.ctx
    }

    /// Whether the property holds a value in `root`.
    pub fn is_set(&self, set: &SchemaSet, root: &DynamicMessage) -> Result<bool> {
        value_is_set(set, root, &self.decl.schema, &self.ctx)
            .map_err(|kind| BindError::new(ErrorPath::default().child_name(self.name()), kind))
    }
}

/// Properties of a bound container, in schema order, indexed by name.
#[derive(Debug, Clone)]
pub struct PropertySet<'s> {
    properties: Vec<Property<'s>>,
    by_name: HashMap<&'s str, usize>,
}

impl<'s> PropertySet<'s> {
    fn new(declared: &'s [ObjectProperty], container: &Location) -> Self {
        let properties: Vec<Property<'s>> = declared
            .iter()
            .map(|decl| Property {
                decl,
                ctx: ValueContext::for_property(container, &decl.field_path),
            })
            .collect();
        let by_name = properties
            .iter()
            .enumerate()
            .map(|(i, p)| (p.name(), i))
            .collect();
        Self {
            properties,
            by_name,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Property<'s>> {
        self.by_name.get(name).map(|i| &self.properties[*i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Property<'s>> {
        self.properties.iter()
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// The single property set in `root`, if any.
    ///
    /// Competing properties are never cleared here; that is up to the
    /// caller.
    ///
    /// # Errors
    ///
    /// [`BindErrorKind::MultipleSet`] naming every set property when more
    /// than one is set.
    pub fn which_one_set(
        &self,
        set: &SchemaSet,
        root: &DynamicMessage,
    ) -> Result<Option<&Property<'s>>> {
        let mut found = Vec::new();
        for property in &self.properties {
            if property.is_set(set, root)? {
                found.push(property);
            }
        }
        match found.as_slice() {
            [] => Ok(None),
            [one] => Ok(Some(*one)),
            many => Err(BindErrorKind::MultipleSet(
                many.iter().map(|p| p.name().to_string()).collect(),
            )
            .into()),
        }
    }
}

/// Target of an object, oneof or enum reference.
pub(crate) fn resolve_root<'s>(
    set: &'s SchemaSet,
    reference: RefId,
) -> std::result::Result<&'s RootSchema, BindErrorKind> {
    set.resolve_schema(reference).ok_or_else(|| {
        BindErrorKind::Unlinked(
            set.reference(reference)
                .map(|r| r.full_name())
                .unwrap_or_default(),
        )
    })
}

pub(crate) fn resolve_enum<'s>(
    set: &'s SchemaSet,
    schema: &FieldSchema,
) -> std::result::Result<&'s EnumSchema, BindErrorKind> {
    let FieldSchema::EnumRef(field) = schema else {
        return Err(BindErrorKind::WrongKind {
            expected: "enum",
            found: schema.kind_name(),
        });
    };
    match resolve_root(set, field.reference)? {
        RootSchema::Enum(e) => Ok(e),
        other => Err(BindErrorKind::WrongKind {
            expected: "enum",
            found: other.kind_name(),
        }),
    }
}

/// Properties nested under a virtual property.
fn virtual_children<'s>(
    set: &'s SchemaSet,
    schema: &FieldSchema,
) -> std::result::Result<&'s [ObjectProperty], BindErrorKind> {
    let Some(reference) = schema.reference() else {
        return Ok(&[]);
    };
    Ok(resolve_root(set, reference)?.properties().unwrap_or(&[]))
}

/// Whether a value is present. Empty lists and maps count as unset, and a
/// virtual property is set when any of its children is.
pub(crate) fn value_is_set(
    set: &SchemaSet,
    root: &DynamicMessage,
    schema: &FieldSchema,
    ctx: &ValueContext,
) -> std::result::Result<bool, BindErrorKind> {
    if let ValueContext::Virtual { container } = ctx {
        for child in virtual_children(set, schema)? {
            let child_ctx = ValueContext::for_property(container, &child.field_path);
            if value_is_set(set, root, &child.schema, &child_ctx)? {
                return Ok(true);
            }
        }
        return Ok(false);
    }
    Ok(match ctx.read(root) {
        None => false,
        Some(Value::List(items)) => !items.is_empty(),
        Some(Value::Map(entries)) => !entries.is_empty(),
        Some(_) => true,
    })
}

fn clear_value(
    set: &SchemaSet,
    root: &mut DynamicMessage,
    schema: &FieldSchema,
    ctx: &ValueContext,
) -> std::result::Result<(), BindErrorKind> {
    if let ValueContext::Virtual { container } = ctx {
        for child in virtual_children(set, schema)? {
            let child_ctx = ValueContext::for_property(container, &child.field_path);
            clear_value(set, root, &child.schema, &child_ctx)?;
        }
        return Ok(());
    }
    ctx.clear(root)
}

/// State shared by [`ObjectImpl`] and [`OneofImpl`].
pub struct BoundContainer<'s, 'm> {
    set: &'s SchemaSet,
    declared: &'s [ObjectProperty],
    container: Location,
    root: &'m mut DynamicMessage,
    path: ErrorPath,
    properties: OnceCell<PropertySet<'s>>,
}

impl<'s, 'm> BoundContainer<'s, 'm> {
    fn new(
        set: &'s SchemaSet,
        declared: &'s [ObjectProperty],
        container: Location,
        root: &'m mut DynamicMessage,
        path: ErrorPath,
    ) -> Self {
        Self {
            set,
            declared,
            container,
            root,
            path,
            properties: OnceCell::new(),
        }
    }

    pub fn schema_set(&self) -> &'s SchemaSet {
        self.set
    }

    /// Path used to locate errors raised below this container.
    pub fn path(&self) -> &ErrorPath {
        &self.path
    }

    /// Location of the bound message relative to the root message.
    pub fn location(&self) -> &Location {
        &self.container
    }

    pub fn properties(&self) -> &PropertySet<'s> {
        self.properties
            .get_or_init(|| PropertySet::new(self.declared, &self.container))
    }

    fn fail(&self, kind: BindErrorKind) -> BindError {
        BindError::new(self.path.clone(), kind)
    }

    fn lookup(&self, name: &str) -> Result<(&'s ObjectProperty, ValueContext)> {
        let property = self
            .properties()
            .get(name)
            .ok_or_else(|| self.fail(BindErrorKind::UnknownProperty(name.to_string())))?;
        Ok((property.decl, property.ctx.clone()))
    }

    /// Binds one property for access.
    pub fn property(&mut self, name: &str) -> Result<FieldValue<'s, '_>> {
        let (decl, ctx) = self.lookup(name)?;
        Ok(FieldValue {
            set: self.set,
            schema: &decl.schema,
            ctx,
            root: &mut *self.root,
            path: self.path.child_name(name),
        })
    }

    pub fn is_set(&self, name: &str) -> Result<bool> {
        let (decl, ctx) = self.lookup(name)?;
        value_is_set(self.set, &*self.root, &decl.schema, &ctx)
            .map_err(|kind| BindError::new(self.path.child_name(name), kind))
    }

    /// Reads a scalar property without binding it mutably.
    pub fn get_scalar(&self, name: &str) -> Result<Option<ScalarValue>> {
        let (decl, ctx) = self.lookup(name)?;
        let path = self.path.child_name(name);
        let FieldSchema::Scalar(field) = &decl.schema else {
            return Err(BindError::new(
                path,
                BindErrorKind::WrongKind {
                    expected: "scalar",
                    found: decl.schema.kind_name(),
                },
            ));
        };
        ctx.read(&*self.root)
            .map(|value| ScalarValue::from_storage(&field.scalar, value))
            .transpose()
            .map_err(|kind| BindError::new(path, kind))
    }

    /// Reads the option of an enum property.
    pub fn get_enum(&self, name: &str) -> Result<Option<&'s EnumOption>> {
        let (decl, ctx) = self.lookup(name)?;
        let path = self.path.child_name(name);
        let schema = resolve_enum(self.set, &decl.schema)
            .map_err(|kind| BindError::new(path.clone(), kind))?;
        enum_option(schema, ctx.read(&*self.root)).map_err(|kind| BindError::new(path, kind))
    }

    pub fn set_scalar(&mut self, name: &str, value: impl Into<ScalarValue>) -> Result<()> {
        self.property(name)?.as_scalar()?.set(value)
    }

    pub fn set_enum(&mut self, name: &str, option: &str) -> Result<()> {
        self.property(name)?.as_enum()?.set(option)
    }

    pub fn clear(&mut self, name: &str) -> Result<()> {
        self.property(name)?.clear()
    }

    pub fn scalar(&mut self, name: &str) -> Result<ScalarImpl<'s, '_>> {
        self.property(name)?.as_scalar()
    }

    pub fn enumeration(&mut self, name: &str) -> Result<EnumImpl<'s, '_>> {
        self.property(name)?.as_enum()
    }

    pub fn object(&mut self, name: &str) -> Result<ObjectImpl<'s, '_>> {
        self.property(name)?.as_object()
    }

    pub fn oneof(&mut self, name: &str) -> Result<OneofImpl<'s, '_>> {
        self.property(name)?.as_oneof()
    }

    pub fn array(&mut self, name: &str) -> Result<ArrayImpl<'s, '_>> {
        self.property(name)?.as_array()
    }

    pub fn map(&mut self, name: &str) -> Result<MapImpl<'s, '_>> {
        self.property(name)?.as_map()
    }

    pub fn any(&mut self, name: &str) -> Result<AnyImpl<'_>> {
        self.property(name)?.as_any()
    }

    /// Creates the bound message, and every missing ancestor, with default
    /// contents.
    pub fn materialize(&mut self) -> Result<()> {
        ensure_message(&mut *self.root, self.container.segments())
            .map(|_| ())
            .map_err(|kind| BindError::new(self.path.clone(), kind))
    }

    pub fn is_materialized(&self) -> bool {
        message_at(&*self.root, self.container.segments()).is_some()
    }

    /// The bound message, once materialized.
    pub fn message(&self) -> Option<&DynamicMessage> {
        message_at(&*self.root, self.container.segments())
    }
}

fn root_schema(set: &SchemaSet, id: SchemaId) -> Result<&RootSchema> {
    if !set.is_linked() {
        let name = set.get(id).map(RootSchema::full_name).unwrap_or_default();
        return Err(BindError::new(
            ErrorPath::default().child_name(name.clone()),
            BindErrorKind::Unlinked(name),
        ));
    }
    set.get(id)
        .ok_or_else(|| BindErrorKind::Unlinked(format!("{id:?}")).into())
}

/// An object schema bound to a message.
///
/// # Examples
///
/// ```
/// use msgshape_core::{DescriptorPool, FieldDescriptor, FieldKind, MessageDescriptor, SchemaBuilder};
/// use msgshape_reflect::{DynamicMessage, ObjectImpl, ScalarValue, Value};
///
/// let mut pool = DescriptorPool::new();
/// pool.add_message(
///     MessageDescriptor::new("test.v1", "Task")
///         .with_field(FieldDescriptor::new(1, "id", FieldKind::String)),
/// );
/// let mut builder = SchemaBuilder::new(&pool);
/// let task = builder.build_message("test.v1.Task").unwrap();
/// let set = builder.finish().unwrap();
///
/// let mut msg = DynamicMessage::new();
/// let mut obj = ObjectImpl::bind(&set, task, &mut msg).unwrap();
/// assert!(!obj.is_set("id").unwrap());
/// obj.set_scalar("id", "x").unwrap();
/// assert_eq!(obj.get_scalar("id").unwrap(), Some(ScalarValue::from("x")));
/// drop(obj);
/// assert_eq!(msg.get_field(1), Some(&Value::String("x".into())));
/// ```
pub struct ObjectImpl<'s, 'm> {
    schema: &'s ObjectSchema,
    inner: BoundContainer<'s, 'm>,
}

impl<'s, 'm> ObjectImpl<'s, 'm> {
    /// Binds the object schema `id` to the root message `root`.
    ///
    /// # Errors
    ///
    /// [`BindErrorKind::Unlinked`] if the set is not linked,
    /// [`BindErrorKind::WrongKind`] if `id` is not an object.
    pub fn bind(set: &'s SchemaSet, id: SchemaId, root: &'m mut DynamicMessage) -> Result<Self> {
        match root_schema(set, id)? {
            RootSchema::Object(schema) => {
                trace!(schema = %schema.name, "Bound object");
                Ok(Self::nested(
                    set,
                    schema,
                    Location::root(),
                    root,
                    ErrorPath::default().child_name(full_name(&schema.package, &schema.name)),
                ))
            }
            other => Err(BindError::new(
                ErrorPath::default().child_name(other.full_name()),
                BindErrorKind::WrongKind {
                    expected: "object",
                    found: other.kind_name(),
                },
            )),
        }
    }

    fn nested(
        set: &'s SchemaSet,
        schema: &'s ObjectSchema,
        container: Location,
        root: &'m mut DynamicMessage,
        path: ErrorPath,
    ) -> Self {
        Self {
            schema,
            inner: BoundContainer::new(set, &schema.properties, container, root, path),
        }
    }

    pub fn schema(&self) -> &'s ObjectSchema {
        self.schema
    }
}

impl<'s, 'm> Deref for ObjectImpl<'s, 'm> {
    type Target = BoundContainer<'s, 'm>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for ObjectImpl<'_, '_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

/// A oneof schema bound to a message: at most one property should be set.
pub struct OneofImpl<'s, 'm> {
    schema: &'s OneofSchema,
    inner: BoundContainer<'s, 'm>,
}

impl<'s, 'm> OneofImpl<'s, 'm> {
    /// Binds the oneof schema `id` to the root message `root`.
    pub fn bind(set: &'s SchemaSet, id: SchemaId, root: &'m mut DynamicMessage) -> Result<Self> {
        match root_schema(set, id)? {
            RootSchema::Oneof(schema) => {
                trace!(schema = %schema.name, "Bound oneof");
                Ok(Self::nested(
                    set,
                    schema,
                    Location::root(),
                    root,
                    ErrorPath::default().child_name(full_name(&schema.package, &schema.name)),
                ))
            }
            other => Err(BindError::new(
                ErrorPath::default().child_name(other.full_name()),
                BindErrorKind::WrongKind {
                    expected: "oneof",
                    found: other.kind_name(),
                },
            )),
        }
    }

    fn nested(
        set: &'s SchemaSet,
        schema: &'s OneofSchema,
        container: Location,
        root: &'m mut DynamicMessage,
        path: ErrorPath,
    ) -> Self {
        Self {
            schema,
            inner: BoundContainer::new(set, &schema.properties, container, root, path),
        }
    }

    pub fn schema(&self) -> &'s OneofSchema {
        self.schema
    }

    /// The set property, if any. See [`PropertySet::which_one_set`].
    pub fn which_one_set(&self) -> Result<Option<&Property<'s>>> {
        self.inner
            .properties()
            .which_one_set(self.inner.set, &*self.inner.root)
            .map_err(|err| BindError::new(self.inner.path.clone(), err.kind))
    }
}

impl<'s, 'm> Deref for OneofImpl<'s, 'm> {
    type Target = BoundContainer<'s, 'm>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for OneofImpl<'_, '_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

/// One bound property, list element or map entry, not yet narrowed to a
/// typed accessor.
pub struct FieldValue<'s, 'm> {
    pub(crate) set: &'s SchemaSet,
    pub(crate) schema: &'s FieldSchema,
    pub(crate) ctx: ValueContext,
    pub(crate) root: &'m mut DynamicMessage,
    pub(crate) path: ErrorPath,
}

impl<'s, 'm> FieldValue<'s, 'm> {
    pub fn schema(&self) -> &'s FieldSchema {
        self.schema
    }

    pub fn context(&self) -> &ValueContext {
        &self.ctx
    }

    pub fn path(&self) -> &ErrorPath {
        &self.path
    }

    fn fail(&self, kind: BindErrorKind) -> BindError {
        BindError::new(self.path.clone(), kind)
    }

    fn wrong_kind(&self, expected: &'static str) -> BindError {
        self.fail(BindErrorKind::WrongKind {
            expected,
            found: self.schema.kind_name(),
        })
    }

    pub fn is_set(&self) -> Result<bool> {
        value_is_set(self.set, &*self.root, self.schema, &self.ctx).map_err(|kind| self.fail(kind))
    }

    /// Removes the value. A virtual property clears all of its children.
    pub fn clear(&mut self) -> Result<()> {
        clear_value(self.set, &mut *self.root, self.schema, &self.ctx).map_err(|kind| self.fail(kind))
    }

    pub fn as_scalar(self) -> Result<ScalarImpl<'s, 'm>> {
        match self.schema {
            FieldSchema::Scalar(field) => Ok(ScalarImpl::new(
                &field.scalar,
                self.ctx,
                self.root,
                self.path,
            )),
            _ => Err(self.wrong_kind("scalar")),
        }
    }

    pub fn as_enum(self) -> Result<EnumImpl<'s, 'm>> {
        let schema = resolve_enum(self.set, self.schema).map_err(|kind| self.fail(kind))?;
        Ok(EnumImpl::new(schema, self.ctx, self.root, self.path))
    }

    pub fn as_object(self) -> Result<ObjectImpl<'s, 'm>> {
        let FieldSchema::ObjectRef(field) = self.schema else {
            return Err(self.wrong_kind("object"));
        };
        match resolve_root(self.set, field.reference).map_err(|kind| self.fail(kind))? {
            RootSchema::Object(schema) => Ok(ObjectImpl::nested(
                self.set,
                schema,
                self.ctx.object_container(),
                self.root,
                self.path,
            )),
            other => Err(self.fail(BindErrorKind::WrongKind {
                expected: "object",
                found: other.kind_name(),
            })),
        }
    }

    pub fn as_oneof(self) -> Result<OneofImpl<'s, 'm>> {
        let FieldSchema::OneofRef(field) = self.schema else {
            return Err(self.wrong_kind("oneof"));
        };
        match resolve_root(self.set, field.reference).map_err(|kind| self.fail(kind))? {
            RootSchema::Oneof(schema) => Ok(OneofImpl::nested(
                self.set,
                schema,
                self.ctx.object_container(),
                self.root,
                self.path,
            )),
            other => Err(self.fail(BindErrorKind::WrongKind {
                expected: "oneof",
                found: other.kind_name(),
            })),
        }
    }

    pub fn as_array(self) -> Result<ArrayImpl<'s, 'm>> {
        match self.schema {
            FieldSchema::Array(field) => {
                Ok(ArrayImpl::new(self.set, field, self.ctx, self.root, self.path))
            }
            _ => Err(self.wrong_kind("array")),
        }
    }

    pub fn as_map(self) -> Result<MapImpl<'s, 'm>> {
        match self.schema {
            FieldSchema::Map(field) => {
                Ok(MapImpl::new(self.set, field, self.ctx, self.root, self.path))
            }
            _ => Err(self.wrong_kind("map")),
        }
    }

    pub fn as_any(self) -> Result<AnyImpl<'m>> {
        match self.schema {
            FieldSchema::Any => Ok(AnyImpl::new(self.ctx, self.root, self.path)),
            _ => Err(self.wrong_kind("any")),
        }
    }
}
