//! Orchestration and transformation sub-objects of a config.
//!
//! These are not stored in the state registry on their own: they live inside
//! their config and are regenerated wholesale on every save.

use crate::key::{BlockKey, CodeKey, ComponentId, ConfigId, PhaseKey, TaskKey};
use crate::object::Content;
use crate::record::AbsPath;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Orchestration {
    pub phases: Vec<Phase>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Phase {
    pub key: PhaseKey,
    pub path: AbsPath,
    /// Keys of dependency phases, ordered by their index.
    pub depends_on: Vec<PhaseKey>,
    pub tasks: Vec<Task>,
    pub name: String,
    /// Unrecognised fields, kept in source order.
    pub content: Content,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Task {
    pub key: TaskKey,
    pub path: AbsPath,
    pub name: String,
    pub enabled: bool,
    pub component_id: ComponentId,
    pub config_id: Option<ConfigId>,
    /// Full path of the target config, when the task references one.
    pub config_path: Option<String>,
    /// Inline configuration, when the task has no target config.
    pub config_data: Option<Content>,
    pub content: Content,
}

// ---------------------------------------------------------------------------
// Transformation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transformation {
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Block {
    pub key: BlockKey,
    pub path: AbsPath,
    pub name: String,
    pub codes: Vec<Code>,
    /// Unrecognised fields, kept in source order.
    pub content: Content,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Code {
    pub key: CodeKey,
    pub path: AbsPath,
    pub name: String,
    pub scripts: Vec<String>,
    pub content: Content,
}
