//! Built-in mappers, one per feature. See [`crate::Pipeline::standard`] for
//! the registration order.

pub mod corefiles;
pub mod orchestrator;
pub mod relations;
pub mod scheduler;
pub mod scripts;
pub mod sharedcode;
pub mod transformation;
pub mod variables;

use treesync_core::{Content, FsError};
use serde_json::Value;

/// Removes `key` from `content` and returns it as a string.
pub(crate) fn take_string(content: &mut Content, key: &str) -> Option<String> {
    match content.remove(key) {
        Some(Value::String(s)) => Some(s),
        Some(other) => {
            content.insert(key.to_string(), other);
            None
        }
        None => None,
    }
}

/// Strips the object directory from messages of files inside it.
pub(crate) fn relative_error(err: FsError, dir: &str) -> String {
    err.to_string().replace(&format!("{dir}/"), "")
}
