//! Dynamic value binding between msgshape schemas and live messages.
//!
//! A linked [`SchemaSet`](msgshape_core::SchemaSet) describes shapes; a
//! [`DynamicMessage`] holds data keyed by field number. This crate binds
//! the two:
//!
//! - [`ObjectImpl`] / [`OneofImpl`]: a root schema bound to a message, with
//!   properties reachable by JSON name through a [`PropertySet`].
//! - [`ValueContext`]: where a property's value lives. Flattened and
//!   promoted properties resolve to nested field paths or to virtual
//!   contexts, so callers never see the message layout.
//! - Typed accessors ([`ScalarImpl`], [`EnumImpl`], [`ArrayImpl`],
//!   [`MapImpl`], [`AnyImpl`]) converting between [`ScalarValue`] and
//!   storage without coercion.
//!
//! Bindings assume a single writer per message. A linked schema set can be
//! shared freely.
//!
//! # Example
//!
//! ```
//! use msgshape_core::*;
//! use msgshape_reflect::{DynamicMessage, ObjectImpl, ScalarValue};
//!
//! let mut pool = DescriptorPool::new();
//! pool.add_enum(EnumDescriptor::new(
//!     "test.v1",
//!     "Status",
//!     &[("STATUS_UNSPECIFIED", 0), ("STATUS_ACTIVE", 1)],
//! ));
//! pool.add_message(
//!     MessageDescriptor::new("test.v1", "Task")
//!         .with_field(FieldDescriptor::new(1, "id", FieldKind::String))
//!         .with_field(FieldDescriptor::repeated(2, "tags", FieldKind::String))
//!         .with_field(FieldDescriptor::new(3, "status", FieldKind::Enum("test.v1.Status".into()))),
//! );
//! let mut builder = SchemaBuilder::new(&pool);
//! let task = builder.build_message("test.v1.Task").unwrap();
//! let set = builder.finish().unwrap();
//!
//! let mut msg = DynamicMessage::new();
//! let mut obj = ObjectImpl::bind(&set, task, &mut msg).unwrap();
//! obj.set_scalar("id", "x").unwrap();
//! obj.array("tags").unwrap().append_scalar("a").unwrap();
//! obj.set_enum("status", "ACTIVE").unwrap();
//!
//! assert_eq!(obj.get_scalar("id").unwrap(), Some(ScalarValue::from("x")));
//! assert_eq!(obj.get_enum("status").unwrap().unwrap().number, 1);
//! ```

mod accessors;
mod context;
mod error;
mod message;
mod object;
mod scalar;

pub use accessors::{AnyImpl, ArrayImpl, EnumImpl, MapImpl, ScalarImpl};
pub use context::{Location, Segment, ValueContext};
pub use error::{BindError, BindErrorKind, Result};
pub use message::{DynamicMessage, Value};
pub use object::{BoundContainer, FieldValue, ObjectImpl, OneofImpl, Property, PropertySet};
pub use scalar::ScalarValue;
