//! State registry: every known object with its local and remote form.
//!
//! The state is owned by one sync run and mutated through `&mut` only; the
//! naming registry inside is shared with the path generator.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::component::ComponentsMap;
use crate::error::NamingError;
use crate::key::{BranchKey, ConfigKey, Key};
use crate::naming::Registry;
use crate::object::Object;
use crate::paths::{join_path, KnownPaths};
use crate::record::{AbsPath, Record};

/// Order in which objects are processed and listed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    #[default]
    Id,
    Path,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Local,
    Remote,
}

impl Side {
    pub fn name(self) -> &'static str {
        match self {
            Side::Local => "local",
            Side::Remote => "remote",
        }
    }
}

// ---------------------------------------------------------------------------
// ObjectState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ObjectState {
    pub record: Record,
    pub local: Option<Object>,
    pub remote: Option<Object>,
}

impl ObjectState {
    pub fn new(record: Record) -> Self {
        Self {
            record,
            local: None,
            remote: None,
        }
    }

    pub fn key(&self) -> &Key {
        &self.record.key
    }

    pub fn path(&self) -> String {
        self.record.path()
    }

    pub fn has_local_state(&self) -> bool {
        self.local.is_some()
    }

    pub fn has_remote_state(&self) -> bool {
        self.remote.is_some()
    }

    pub fn get(&self, side: Side) -> Option<&Object> {
        match side {
            Side::Local => self.local.as_ref(),
            Side::Remote => self.remote.as_ref(),
        }
    }

    pub fn get_mut(&mut self, side: Side) -> Option<&mut Object> {
        match side {
            Side::Local => self.local.as_mut(),
            Side::Remote => self.remote.as_mut(),
        }
    }

    pub fn set(&mut self, side: Side, object: Option<Object>) {
        match side {
            Side::Local => self.local = object,
            Side::Remote => self.remote = object,
        }
    }

    /// # Panics
    ///
    /// When the object has neither state: callers must only ask for objects
    /// that were loaded from at least one side.
    pub fn local_or_remote_state(&self) -> &Object {
        self.local
            .as_ref()
            .or(self.remote.as_ref())
            .unwrap_or_else(|| panic!("{} has no local or remote state", self.record.key.desc()))
    }

    /// # Panics
    ///
    /// Same contract as [`ObjectState::local_or_remote_state`].
    pub fn remote_or_local_state(&self) -> &Object {
        self.remote
            .as_ref()
            .or(self.local.as_ref())
            .unwrap_or_else(|| panic!("{} has no remote or local state", self.record.key.desc()))
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct State {
    objects: HashMap<Key, ObjectState>,
    naming: Arc<Registry>,
    components: ComponentsMap,
    known_paths: KnownPaths,
    sort_by: SortBy,
}

impl State {
    pub fn new(naming: Arc<Registry>, components: ComponentsMap, sort_by: SortBy) -> Self {
        Self {
            objects: HashMap::new(),
            naming,
            components,
            known_paths: KnownPaths::default(),
            sort_by,
        }
    }

    pub fn naming_registry(&self) -> &Arc<Registry> {
        &self.naming
    }

    pub fn components(&self) -> &ComponentsMap {
        &self.components
    }

    pub fn components_mut(&mut self) -> &mut ComponentsMap {
        &mut self.components
    }

    pub fn known_paths(&self) -> &KnownPaths {
        &self.known_paths
    }

    pub fn set_known_paths(&mut self, known_paths: KnownPaths) {
        self.known_paths = known_paths;
    }

    pub fn sort_by(&self) -> SortBy {
        self.sort_by
    }

    /// Keys of all not-deleted objects, in processing order.
    pub fn keys(&self) -> Vec<Key> {
        let mut states: Vec<&ObjectState> = self
            .objects
            .values()
            .filter(|s| !s.record.state.deleted)
            .collect();
        states.sort_by_cached_key(|s| s.record.sort_key(self.sort_by));
        states.into_iter().map(|s| s.key().clone()).collect()
    }

    /// Keys ordered so every object comes after its parent.
    pub fn keys_parents_first(&self) -> Vec<Key> {
        let mut keyed: Vec<(usize, Key)> = self
            .keys()
            .into_iter()
            .map(|key| (self.depth(&key), key))
            .collect();
        // Stable sort keeps the processing order within one depth.
        keyed.sort_by_key(|(depth, _)| *depth);
        keyed.into_iter().map(|(_, key)| key).collect()
    }

    fn depth(&self, key: &Key) -> usize {
        let mut depth = 0;
        let mut current = self.parent_key(key);
        while let Some(parent) = current {
            depth += 1;
            if depth > 16 {
                break;
            }
            current = self.parent_key(&parent);
        }
        depth
    }

    /// Parent as seen by the object itself, falling back to its record.
    pub fn parent_key(&self, key: &Key) -> Option<Key> {
        match self.objects.get(key) {
            Some(state) => match state.local.as_ref().or(state.remote.as_ref()) {
                Some(object) => object.parent_key(),
                None => state.record.parent_key(),
            },
            None => key.parent_key(),
        }
    }

    pub fn all(&self) -> Vec<&ObjectState> {
        self.keys()
            .iter()
            .filter_map(|key| self.objects.get(key))
            .collect()
    }

    pub fn get(&self, key: &Key) -> Option<&ObjectState> {
        self.objects.get(key)
    }

    pub fn get_mut(&mut self, key: &Key) -> Option<&mut ObjectState> {
        self.objects.get_mut(key)
    }

    /// # Panics
    ///
    /// When the key is unknown.
    pub fn must_get(&self, key: &Key) -> &ObjectState {
        self.objects
            .get(key)
            .unwrap_or_else(|| panic!("{} not found in state", key.desc()))
    }

    pub fn get_by_path(&self, path: &str) -> Option<&ObjectState> {
        let key = self.naming.key_by_path(path)?;
        self.objects.get(&key)
    }

    /// Inserts or replaces an object state and binds its path.
    pub fn set(&mut self, state: ObjectState) -> Result<(), NamingError> {
        if !state.record.path.is_empty() {
            self.naming.attach(state.key(), &state.path())?;
        }
        self.objects.insert(state.key().clone(), state);
        Ok(())
    }

    /// Moves an object to a new path.
    pub fn set_path(&mut self, key: &Key, path: AbsPath) -> Result<(), NamingError> {
        self.naming.attach(key, &path.path())?;
        if let Some(state) = self.objects.get_mut(key) {
            state.record.path = path;
        }
        Ok(())
    }

    pub fn remove(&mut self, key: &Key) -> Option<ObjectState> {
        self.naming.detach(key);
        self.objects.remove(key)
    }

    pub fn objects(&self, side: Side) -> Objects<'_> {
        Objects { state: self, side }
    }

    pub fn configs_from(&self, branch: &BranchKey) -> Vec<&ObjectState> {
        self.all()
            .into_iter()
            .filter(|s| matches!(s.key(), Key::Config(k) if k.branch_id == branch.id))
            .collect()
    }

    pub fn config_rows_from(&self, config: &ConfigKey) -> Vec<&ObjectState> {
        self.all()
            .into_iter()
            .filter(|s| matches!(s.key(), Key::ConfigRow(k) if k.config_key() == *config))
            .collect()
    }

    /// Marks the object's path and its related files as tracked.
    /// Everything below an invalid object counts as tracked.
    pub fn track_record(&mut self, key: &Key) {
        let Some(state) = self.objects.get(key) else {
            return;
        };
        let path = state.path();
        let invalid = state.record.state.invalid;
        let related = state.record.related_paths_abs();
        if invalid {
            self.known_paths.mark_sub_paths_tracked(&path);
        } else {
            self.known_paths.mark_tracked(&path);
        }
        for related_path in related {
            self.known_paths.mark_tracked(&related_path);
        }
    }

    pub fn track_path(&mut self, path: &str) {
        self.known_paths.mark_tracked(path);
    }

    pub fn untracked_paths(&self) -> Vec<String> {
        self.known_paths.untracked_paths()
    }

    /// Full path of a file relative to the object's directory.
    pub fn object_file_path(&self, key: &Key, relative: &str) -> Option<String> {
        self.objects
            .get(key)
            .map(|s| join_path(&s.path(), relative))
    }
}

/// Read-only view of one side of the state.
#[derive(Clone, Copy)]
pub struct Objects<'a> {
    state: &'a State,
    side: Side,
}

impl<'a> Objects<'a> {
    pub fn side(&self) -> Side {
        self.side
    }

    pub fn get(&self, key: &Key) -> Option<&'a Object> {
        self.state.get(key).and_then(|s| s.get(self.side))
    }

    /// Objects of this side, in processing order.
    pub fn all(&self) -> Vec<&'a Object> {
        self.state
            .all()
            .into_iter()
            .filter_map(|s| s.get(self.side))
            .collect()
    }
}
