//! Error types for treesync-core.
//!
//! Two families live here:
//! - typed `thiserror` enums for failures of a single operation
//!   ([`FsError`], [`NamingError`], [`CoreError`]);
//! - [`MultiError`], the aggregate that collects per-object problems and
//!   prints them as an indented bullet tree.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

// ---------------------------------------------------------------------------
// 1. Filesystem errors
// ---------------------------------------------------------------------------

/// Errors raised by a [`crate::fs::Filesystem`] implementation.
#[derive(Debug, Error)]
pub enum FsError {
    /// Underlying I/O failure, annotated with the absolute path.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A file the caller described does not exist.
    #[error("missing {description} \"{path}\"")]
    NotFound { description: String, path: String },

    /// A JSON file could not be decoded.
    #[error("{description} \"{path}\" is not valid JSON: {source}")]
    Json {
        description: String,
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// A YAML file could not be decoded.
    #[error("{description} \"{path}\" is not valid YAML: {source}")]
    Yaml {
        description: String,
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// Serialization of an in-memory value failed (write path).
    #[error("cannot encode \"{path}\": {source}")]
    Encode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Convenience constructor for [`FsError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> FsError {
    FsError::Io {
        path: path.into(),
        source,
    }
}

// ---------------------------------------------------------------------------
// 2. Naming errors
// ---------------------------------------------------------------------------

/// Errors raised by the naming registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NamingError {
    /// A different key already owns the path.
    #[error("naming error: path \"{path}\" is attached to {owner}, but new {key} has same path")]
    PathCollision {
        path: String,
        owner: String,
        key: String,
    },
}

// ---------------------------------------------------------------------------
// 3. Core errors
// ---------------------------------------------------------------------------

/// Errors from manifest and state operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Fs(#[from] FsError),

    #[error(transparent)]
    Naming(#[from] NamingError),

    /// The manifest was written by an incompatible version.
    #[error("unsupported manifest version {found}, expected {expected}")]
    ManifestVersion { found: u32, expected: u32 },

    /// A manifest record points at a parent that has no record.
    #[error("manifest record {key} references missing parent {parent}")]
    MissingParent { key: String, parent: String },

    /// The parent chain of a record loops back on itself.
    #[error("manifest record {key} has a cyclic parent chain")]
    CyclicParent { key: String },
}

// ---------------------------------------------------------------------------
// 4. MultiError
// ---------------------------------------------------------------------------

/// One entry of a [`MultiError`]: a message with optional nested causes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorItem {
    pub message: String,
    pub causes: MultiError,
}

impl ErrorItem {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            causes: MultiError::new(),
        }
    }

    pub fn with_causes(message: impl Into<String>, causes: MultiError) -> Self {
        Self {
            message: message.into(),
            causes,
        }
    }
}

/// Ordered collection of errors, printed as a bullet tree:
///
/// ```text
/// invalid orchestrator config "main/other/orchestrator":
/// - invalid phase "001-phase":
///   - missing "name" key
/// - missing phase "x", referenced from "001-phase"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultiError {
    items: Vec<ErrorItem>,
}

impl MultiError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn items(&self) -> &[ErrorItem] {
        &self.items
    }

    /// Appends a leaf error.
    pub fn push(&mut self, err: impl fmt::Display) {
        self.items.push(ErrorItem::new(err.to_string()));
    }

    pub fn push_item(&mut self, item: ErrorItem) {
        self.items.push(item);
    }

    /// Appends `causes` nested under `message`. Empty causes are ignored.
    pub fn push_prefixed(&mut self, message: impl Into<String>, causes: MultiError) {
        if !causes.is_empty() {
            self.items.push(ErrorItem::with_causes(message, causes));
        }
    }

    pub fn extend(&mut self, other: MultiError) {
        self.items.extend(other.items);
    }

    /// Wraps the whole collection as the causes of a single new item.
    pub fn prefixed(self, message: impl Into<String>) -> MultiError {
        let mut out = MultiError::new();
        out.push_prefixed(message, self);
        out
    }

    pub fn into_result(self) -> Result<(), MultiError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

fn write_item(f: &mut fmt::Formatter<'_>, item: &ErrorItem, level: usize) -> fmt::Result {
    f.write_str(&item.message)?;
    if item.causes.is_empty() {
        return Ok(());
    }
    f.write_str(":")?;
    for cause in &item.causes.items {
        write!(f, "\n{}- ", "  ".repeat(level))?;
        write_item(f, cause, level + 1)?;
    }
    Ok(())
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.items.as_slice() {
            [] => Ok(()),
            [single] => write_item(f, single, 0),
            items => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str("\n")?;
                    }
                    f.write_str("- ")?;
                    write_item(f, item, 1)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for MultiError {}
