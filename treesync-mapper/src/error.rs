//! Error types for treesync-mapper.

use thiserror::Error;

use treesync_core::{CoreError, FsError, MultiError, NamingError};

/// All errors that can arise from a mapper hook or a manager operation.
#[derive(Debug, Error)]
pub enum MapperError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Fs(#[from] FsError),

    #[error(transparent)]
    Naming(#[from] NamingError),

    /// Invalid local or remote data, with a user-facing message.
    #[error("{0}")]
    Invalid(String),

    /// Several problems of one object, printed as a bullet tree.
    #[error("{0}")]
    Multi(MultiError),

    /// Failure reported by the remote API client.
    #[error("remote API error: {0}")]
    Api(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MapperError {
    pub fn invalid(message: impl Into<String>) -> Self {
        MapperError::Invalid(message.into())
    }

    /// Flattens the error into a [`MultiError`], keeping nested causes.
    pub fn into_multi(self) -> MultiError {
        match self {
            MapperError::Multi(errors) => errors,
            other => {
                let mut errors = MultiError::new();
                errors.push(other);
                errors
            }
        }
    }

    pub fn append_to(self, errors: &mut MultiError) {
        errors.extend(self.into_multi());
    }
}

impl From<MultiError> for MapperError {
    fn from(errors: MultiError) -> Self {
        MapperError::Multi(errors)
    }
}
