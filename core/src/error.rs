//! Error types for schema construction and linking.
//!
//! Every error carries an [`ErrorPath`] that is extended while the error
//! unwinds, so the caller sees exactly which schema, property, list element,
//! or map entry triggered the failure.

use std::fmt;

use thiserror::Error;

/// One segment of an [`ErrorPath`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// A schema or property name.
    Name(String),
    /// A list index.
    Index(usize),
    /// A map key.
    Key(String),
}

/// Segmented location of an error, rendered as a dotted path.
///
/// # Examples
///
/// ```
/// use msgshape_core::ErrorPath;
///
/// let path = ErrorPath::default()
///     .prepend_key("env")
///     .prepend_name("labels")
///     .prepend_name("Task");
/// assert_eq!(path.to_string(), "Task.labels[\"env\"]");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorPath(Vec<PathSegment>);

impl ErrorPath {
    /// Returns the path segments, outermost first.
    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    /// Returns `true` if no segment has been recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Adds a name segment in front of the path.
    pub fn prepend_name(mut self, name: impl Into<String>) -> Self {
        self.0.insert(0, PathSegment::Name(name.into()));
        self
    }

    /// Adds an index segment in front of the path.
    pub fn prepend_index(mut self, index: usize) -> Self {
        self.0.insert(0, PathSegment::Index(index));
        self
    }

    /// Adds a key segment in front of the path.
    pub fn prepend_key(mut self, key: impl Into<String>) -> Self {
        self.0.insert(0, PathSegment::Key(key.into()));
        self
    }

    /// Returns a copy of the path extended by a name.
    pub fn child_name(&self, name: impl Into<String>) -> Self {
        let mut path = self.clone();
        path.0.push(PathSegment::Name(name.into()));
        path
    }

    /// Returns a copy of the path extended by an index.
    pub fn child_index(&self, index: usize) -> Self {
        let mut path = self.clone();
        path.0.push(PathSegment::Index(index));
        path
    }

    /// Returns a copy of the path extended by a key.
    pub fn child_key(&self, key: impl Into<String>) -> Self {
        let mut path = self.clone();
        path.0.push(PathSegment::Key(key.into()));
        path
    }
}

impl fmt::Display for ErrorPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("<root>");
        }
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Name(name) if i == 0 => write!(f, "{name}")?,
                PathSegment::Name(name) => write!(f, ".{name}")?,
                PathSegment::Index(index) => write!(f, "[{index}]")?,
                PathSegment::Key(key) => write!(f, "[{key:?}]")?,
            }
        }
        Ok(())
    }
}

/// The cause of a [`SchemaError`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaErrorKind {
    /// A field kind that has no schema mapping (e.g. proto2 groups).
    #[error("unsupported field kind: {0}")]
    UnsupportedKind(String),

    /// A `google.*` message with no registered schema mapping.
    #[error("unknown well-known type: {0}")]
    UnknownWellKnownType(String),

    /// The descriptor resolver has no message or enum with this name.
    #[error("descriptor not found: {0}")]
    DescriptorNotFound(String),

    /// Map fields must use string keys.
    #[error("map key must be a string, found {0}")]
    NonStringMapKey(String),

    /// The zero enum option is missing or lacks the unspecified suffix.
    #[error("enum {enum_name} must start with a zero option ending in {suffix}")]
    MissingUnspecified { enum_name: String, suffix: String },

    /// An enum option does not carry the shared prefix.
    #[error("enum option {option} does not start with prefix {prefix}")]
    PrefixMismatch { option: String, prefix: String },

    /// A rule that is recognized but cannot be expressed in the schema.
    #[error("unsupported rule: {0}")]
    UnsupportedRule(String),

    /// Rule shapes that contradict each other or the field kind.
    #[error("conflicting rules: {0}")]
    ConflictingRules(String),

    /// A `pattern` rule that does not compile.
    #[error("invalid pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// A promoted union ended up with no member fields.
    #[error("promoted union {0} has no fields")]
    EmptyOneof(String),

    /// A message requested as a oneof that cannot be one.
    #[error("invalid oneof wrapper: {0}")]
    InvalidOneofWrapper(String),

    /// Flattening a field that cannot be spliced.
    #[error("cannot flatten: {0}")]
    InvalidFlatten(String),

    /// Flattening re-entered a message that is still being built.
    #[error("flatten cycle through {0}")]
    FlattenCycle(String),

    /// Two properties of one schema share a JSON name.
    #[error("duplicate property: {0}")]
    DuplicateProperty(String),

    /// A schema name defined twice in the same package.
    #[error("duplicate schema: {0}")]
    DuplicateSchema(String),

    /// A reference into a package that was never defined.
    #[error("unknown package {package} referenced by {reference}")]
    UnknownPackage { package: String, reference: String },

    /// A reference to a name missing from its package.
    #[error("unknown schema {reference}")]
    UnknownSchema { reference: String },

    /// A reference resolved to a schema of a different root kind.
    #[error("reference {reference} expected {expected}, found {found}")]
    RefKindMismatch {
        reference: String,
        expected: &'static str,
        found: &'static str,
    },

    /// A reference string that is not `package.Name`.
    #[error("malformed reference {0:?}")]
    MalformedReference(String),
}

/// Error raised while building, loading, or linking schemas.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{path}: {kind}")]
pub struct SchemaError {
    /// Where the error occurred.
    pub path: ErrorPath,
    /// What went wrong.
    pub kind: SchemaErrorKind,
}

impl SchemaError {
    /// Prefixes the error path with a schema or property name.
    pub fn at(mut self, name: impl Into<String>) -> Self {
        self.path = self.path.prepend_name(name);
        self
    }
}

impl From<SchemaErrorKind> for SchemaError {
    fn from(kind: SchemaErrorKind) -> Self {
        Self {
            path: ErrorPath::default(),
            kind,
        }
    }
}

/// Convenience alias for results with [`SchemaError`].
pub type Result<T> = std::result::Result<T, SchemaError>;
