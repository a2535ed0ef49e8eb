//! Schema model, descriptor-to-schema builder and reference linker.
//!
//! This crate describes data shapes richer than a tagged message format
//! expresses natively:
//!
//! - [`RootSchema`]: named objects, oneofs (tagged unions) and enums,
//!   stored in a [`SchemaSet`] arena and addressed by [`SchemaId`].
//! - [`FieldSchema`]: the shape of one property value (scalar, object,
//!   oneof or enum reference, array, map, any).
//! - [`SchemaBuilder`]: derives schemas from message descriptors,
//!   flattening sub-messages and promoting exposed unions on the way.
//! - [`SchemaSet::link`]: resolves every cross reference, across packages.
//! - [`walk_leaves`] and the plain form ([`PlainPackage`]) for read-only
//!   consumers such as exporters.
//!
//! Binding schemas to live message instances lives in `msgshape-reflect`.
//!
//! # Example
//!
//! ```
//! use msgshape_core::*;
//!
//! let mut pool = DescriptorPool::new();
//! pool.add_enum(EnumDescriptor::new(
//!     "test.v1",
//!     "Status",
//!     &[("STATUS_UNSPECIFIED", 0), ("STATUS_ACTIVE", 1), ("STATUS_DONE", 2)],
//! ));
//! pool.add_message(
//!     MessageDescriptor::new("test.v1", "Task")
//!         .with_field(FieldDescriptor::new(1, "id", FieldKind::String).required())
//!         .with_field(FieldDescriptor::repeated(2, "tags", FieldKind::String))
//!         .with_field(FieldDescriptor::new(3, "status", FieldKind::Enum("test.v1.Status".into()))),
//! );
//!
//! let mut builder = SchemaBuilder::new(&pool);
//! let task = builder.build_message("test.v1.Task").unwrap();
//! let set = builder.finish().unwrap();
//!
//! let status = set.lookup("test.v1.Status").and_then(|id| set.enumeration(id)).unwrap();
//! assert_eq!(status.options[1].name, "ACTIVE");
//! assert_eq!(set.object(task).unwrap().properties.len(), 3);
//! ```

mod builder;
mod config;
mod descriptor;
mod error;
mod link;
mod plain;
mod rules;
mod scalar;
mod schema;
mod set;
mod walk;

pub use builder::SchemaBuilder;
pub use config::{BuildConfig, OneofPromotion};
pub use descriptor::{
    DescriptorPool, DescriptorResolver, EntityObject, EntityPart, EnumDescriptor,
    EnumValueDescriptor, FieldDescriptor, FieldKind, FieldOptions, Label, MapEntryKinds,
    MessageDescriptor, MessageOptions, OneofDescriptor, OneofOptions, full_name, split_full_name,
};
pub use error::{ErrorPath, PathSegment, Result, SchemaError, SchemaErrorKind};
pub use plain::{PlainField, PlainPackage, PlainProperty, PlainRootSchema};
pub use rules::{
    BoolConstraints, BytesConstraints, EnumConstraints, FieldConstraints, MapConstraints,
    NumericConstraints, RepeatedConstraints, StringConstraints,
};
pub use scalar::{WellKnown, scalar_for_kind};
pub use schema::*;
pub use set::{Package, SchemaSet};
pub use walk::{LeafField, referenced_schemas, walk_leaves};
