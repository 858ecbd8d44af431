//! treesync core library: the object model shared by the mappers and the CLI.
//!
//! - [`key`] : typed object keys and kinds
//! - [`object`], [`orchestration`], [`relation`] : business objects
//! - [`record`], [`manifest`] : persisted metadata
//! - [`naming`] : path templates, generator and registry
//! - [`state`], [`paths`] : per-run object registry and path tracking
//! - [`fs`], [`error`] : filesystem abstraction and error types

pub mod component;
pub mod error;
pub mod fs;
pub mod key;
pub mod manifest;
pub mod naming;
pub mod object;
pub mod orchestration;
pub mod paths;
pub mod record;
pub mod relation;
pub mod state;

pub use component::{Component, ComponentsMap};
pub use error::{CoreError, ErrorItem, FsError, MultiError, NamingError};
pub use fs::{DirFs, Filesystem, MemoryFs};
pub use key::{
    BlockKey, BranchId, BranchKey, CodeKey, ComponentId, ConfigId, ConfigKey, ConfigRowKey, Key,
    Kind, PhaseKey, RowId, TaskKey,
};
pub use manifest::Manifest;
pub use object::{Branch, Config, ConfigRow, Content, Object};
pub use record::{AbsPath, Record};
pub use relation::{Relation, RelationType, Relations};
pub use state::{ObjectState, Side, SortBy, State};
