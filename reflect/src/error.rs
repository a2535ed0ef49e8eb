//! Error types for the binding layer.

use msgshape_core::ErrorPath;
use thiserror::Error;

/// The cause of a [`BindError`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindErrorKind {
    /// No property with this name on the bound schema.
    #[error("unknown property {0}")]
    UnknownProperty(String),

    /// The accessor requested does not match the property's schema.
    #[error("expected {expected} property, found {found}")]
    WrongKind {
        expected: &'static str,
        found: &'static str,
    },

    /// Stored enum number missing from the enum schema.
    #[error("enum number {0} is not defined by the schema")]
    UnknownEnumNumber(i32),

    #[error("unknown enum option {0:?}")]
    UnknownEnumName(String),

    /// More than one property of an exclusive schema is set.
    #[error("multiple properties set: {}", .0.join(", "))]
    MultipleSet(Vec<String>),

    /// A scalar of the wrong logical shape was passed to a setter.
    #[error("expected {expected} value, found {found}")]
    WrongShape {
        expected: &'static str,
        found: &'static str,
    },

    /// The message holds a value whose storage does not fit the schema.
    #[error("expected {expected} storage, found {found}")]
    StorageMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// A list element or map entry that does not exist.
    #[error("no value at this location")]
    MissingSlot,

    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    /// A reference without a target; the schema set was not linked.
    #[error("unresolved reference {0}")]
    Unlinked(String),

    /// A value that cannot be represented, e.g. an out of range timestamp.
    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(&'static str),
}

/// Error raised by a bound accessor, located by property path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{path}: {kind}")]
pub struct BindError {
    pub path: ErrorPath,
    pub kind: BindErrorKind,
}

impl BindError {
    pub fn new(path: ErrorPath, kind: BindErrorKind) -> Self {
        Self { path, kind }
    }

    /// Prefixes the error path with a property or schema name.
    pub fn at(mut self, name: impl Into<String>) -> Self {
        self.path = self.path.prepend_name(name);
        self
    }

    /// Prefixes the error path with a list index.
    pub fn at_index(mut self, index: usize) -> Self {
        self.path = self.path.prepend_index(index);
        self
    }

    /// Prefixes the error path with a map key.
    pub fn at_key(mut self, key: impl Into<String>) -> Self {
        self.path = self.path.prepend_key(key);
        self
    }
}

impl From<BindErrorKind> for BindError {
    fn from(kind: BindErrorKind) -> Self {
        Self::new(ErrorPath::default(), kind)
    }
}

pub type Result<T> = std::result::Result<T, BindError>;
