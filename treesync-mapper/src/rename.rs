//! Rename planning: objects whose generated path no longer matches their
//! current path are moved.
//!
//! Planning runs parents first. A child of a moved parent is found at
//! `rename_from`, its old relative path under the parent's new path, since
//! the parent's move already carried it along.

use std::collections::HashMap;
use std::fmt;

use treesync_core::naming::Generator;
use treesync_core::paths::join_path;
use treesync_core::{AbsPath, Key, Object, State};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameAction {
    pub key: Key,
    pub old_path: String,
    /// Where the object is right before its own move.
    pub rename_from: String,
    pub new_path: AbsPath,
    pub description: String,
}

impl RenameAction {
    /// Whether the directory itself must be moved. False for children that
    /// only followed their parent.
    pub fn needs_move(&self) -> bool {
        self.rename_from != self.new_path.path()
    }
}

impl fmt::Display for RenameAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}

/// Computes the moves needed for every local object to sit at its
/// generated path. Generated paths are bound in the naming registry.
pub fn plan_renames(state: &State, naming: &Generator) -> Vec<RenameAction> {
    let mut new_paths: HashMap<Key, String> = HashMap::new();
    let mut actions = Vec::new();

    for key in state.keys_parents_first() {
        let Some(object_state) = state.get(&key) else {
            continue;
        };
        let Some(object) = object_state.local.as_ref() else {
            continue;
        };
        if object_state.record.state.invalid || object_state.record.path.is_empty() {
            continue;
        }

        let parent_key = state.parent_key(&key);
        let old_parent_path = object_state.record.path.parent_path().to_string();
        let parent_path = parent_key
            .as_ref()
            .and_then(|k| new_paths.get(k).cloned())
            .unwrap_or_else(|| old_parent_path.clone());

        let components = state.components();
        let new_path = match object {
            Object::Branch(branch) => naming.branch_path(branch),
            Object::Config(config) => {
                let component = components.get_or_infer(&config.key.component_id);
                naming.config_path(&parent_path, &component, config)
            }
            Object::ConfigRow(row) => {
                let component = components.get_or_infer(&row.key.component_id);
                naming.config_row_path(&parent_path, &component, row)
            }
        };

        let old_path = object_state.path();
        let rename_from = join_path(&parent_path, object_state.record.path.relative_path());
        new_paths.insert(key.clone(), new_path.path());
        if new_path.path() != old_path {
            actions.push(RenameAction {
                description: format!("{} -> {}", old_path, new_path.path()),
                key,
                old_path,
                rename_from,
                new_path,
            });
        }
    }
    actions
}
