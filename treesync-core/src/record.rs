//! Manifest records: persisted metadata kept apart from object content.

use crate::key::Key;
use crate::paths::join_path;
use crate::relation::Relations;
use crate::state::SortBy;

/// Path of an object, split into the parent's path and its own relative part.
///
/// The parent part is resolved at runtime (manifest load, path generation),
/// only the relative part is persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct AbsPath {
    parent_path: String,
    relative_path: String,
    parent_path_set: bool,
}

impl AbsPath {
    pub fn new(parent_path: impl Into<String>, relative_path: impl Into<String>) -> Self {
        Self {
            parent_path: parent_path.into(),
            relative_path: relative_path.into(),
            parent_path_set: true,
        }
    }

    /// Relative path whose parent is not known yet.
    pub fn relative_only(relative_path: impl Into<String>) -> Self {
        Self {
            parent_path: String::new(),
            relative_path: relative_path.into(),
            parent_path_set: false,
        }
    }

    pub fn path(&self) -> String {
        join_path(&self.parent_path, &self.relative_path)
    }

    pub fn parent_path(&self) -> &str {
        &self.parent_path
    }

    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    pub fn is_parent_path_set(&self) -> bool {
        self.parent_path_set
    }

    pub fn set_parent_path(&mut self, parent_path: impl Into<String>) {
        self.parent_path = parent_path.into();
        self.parent_path_set = true;
    }

    pub fn set_relative_path(&mut self, relative_path: impl Into<String>) {
        self.relative_path = relative_path.into();
    }

    pub fn is_empty(&self) -> bool {
        self.relative_path.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordState {
    pub not_found: bool,
    pub invalid: bool,
    pub persisted: bool,
    pub deleted: bool,
    pub parent_changed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub key: Key,
    pub path: AbsPath,
    /// Files and dirs owned by the object, relative to its own path.
    pub related_paths: Vec<String>,
    /// Relations defined in the manifest.
    pub relations: Relations,
    pub state: RecordState,
}

impl Record {
    pub fn new(key: Key, path: AbsPath) -> Self {
        Self {
            key,
            path,
            related_paths: Vec::new(),
            relations: Relations::new(),
            state: RecordState::default(),
        }
    }

    pub fn path(&self) -> String {
        self.path.path()
    }

    /// Relation-defined parent first, structural parent otherwise.
    pub fn parent_key(&self) -> Option<Key> {
        self.relations
            .parent_key(&self.key)
            .or_else(|| self.key.parent_key())
    }

    pub fn add_related_path(&mut self, relative: impl Into<String>) {
        let relative = relative.into();
        if !self.related_paths.contains(&relative) {
            self.related_paths.push(relative);
        }
    }

    pub fn remove_related_path(&mut self, relative: &str) {
        self.related_paths.retain(|p| p != relative);
    }

    /// Related paths joined with the current object path.
    pub fn related_paths_abs(&self) -> Vec<String> {
        let base = self.path();
        self.related_paths
            .iter()
            .map(|p| join_path(&base, p))
            .collect()
    }

    pub fn sort_key(&self, sort_by: SortBy) -> String {
        match sort_by {
            SortBy::Id => self.key.to_string(),
            SortBy::Path => format!("{}_{}", self.path(), self.key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{BranchKey, ConfigKey};

    #[test]
    fn related_paths_follow_object_path() {
        let key = Key::Config(ConfigKey::new(1, "x", "2"));
        let mut record = Record::new(key, AbsPath::new("main", "extractor/x/old"));
        record.add_related_path("meta.json");
        record.add_related_path("meta.json");
        assert_eq!(record.related_paths_abs(), vec!["main/extractor/x/old/meta.json"]);

        record.path.set_relative_path("extractor/x/new");
        assert_eq!(record.related_paths_abs(), vec!["main/extractor/x/new/meta.json"]);
    }

    #[test]
    fn branch_path_has_no_parent() {
        let record = Record::new(
            Key::Branch(BranchKey { id: 1.into() }),
            AbsPath::new("", "main"),
        );
        assert_eq!(record.path(), "main");
        assert_eq!(record.parent_key(), None);
    }
}
