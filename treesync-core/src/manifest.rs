//! Project manifest: `.treesync/manifest.json`.
//!
//! # Layout
//!
//! ```text
//! {
//!   "version": 2,
//!   "sortBy": "id",
//!   "naming": { ...templates... },
//!   "branches": [ { "id": 123, "path": "main" } ],
//!   "configurations": [
//!     { "branchId": 123, "componentId": "...", "id": "...", "path": "...",
//!       "relations": [...], "rows": [ { "id": "...", "path": "..." } ] }
//!   ]
//! }
//! ```
//!
//! Only relative paths are stored. Parent paths are resolved on load by
//! walking the parent chain, which may go through a relation (a variables
//! config lives inside the config it belongs to).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::fs::{read_json, write_json, Filesystem};
use crate::key::{BranchId, BranchKey, ComponentId, ConfigId, ConfigKey, ConfigRowKey, Key, RowId};
use crate::naming::Template;
use crate::paths::join_path;
use crate::record::{AbsPath, Record};
use crate::relation::{ManifestRelation, Relations};
use crate::state::{SortBy, State};

pub const METADATA_DIR: &str = ".treesync";
pub const MANIFEST_FILE: &str = ".treesync/manifest.json";
pub const MANIFEST_VERSION: u32 = 2;

/// Longest parent chain accepted before the chain is considered cyclic.
const MAX_PARENT_DEPTH: usize = 16;

// ---------------------------------------------------------------------------
// 1. File format
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestFile {
    version: u32,
    #[serde(default)]
    sort_by: SortBy,
    #[serde(default)]
    naming: Template,
    #[serde(default)]
    branches: Vec<BranchEntry>,
    #[serde(default)]
    configurations: Vec<ConfigEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct BranchEntry {
    id: BranchId,
    path: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigEntry {
    branch_id: BranchId,
    component_id: ComponentId,
    id: ConfigId,
    path: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    relations: Vec<ManifestRelation>,
    #[serde(default)]
    rows: Vec<RowEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RowEntry {
    id: RowId,
    path: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    relations: Vec<ManifestRelation>,
}

fn relations_from(entries: Vec<ManifestRelation>) -> Relations {
    entries.into_iter().map(Into::into).collect()
}

// ---------------------------------------------------------------------------
// 2. Manifest
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct Manifest {
    pub sort_by: SortBy,
    pub naming: Template,
    records: BTreeMap<Key, Record>,
}

impl Manifest {
    pub fn new(sort_by: SortBy, naming: Template) -> Self {
        Self {
            sort_by,
            naming,
            records: BTreeMap::new(),
        }
    }

    pub fn exists(fs: &dyn Filesystem) -> bool {
        fs.is_file(MANIFEST_FILE)
    }

    /// Reads the manifest and resolves every record's parent path.
    /// Loaded records are marked persisted.
    pub fn load(fs: &dyn Filesystem) -> Result<Self, CoreError> {
        let file: ManifestFile = read_json(fs, MANIFEST_FILE, "manifest")?;
        if file.version != MANIFEST_VERSION {
            return Err(CoreError::ManifestVersion {
                found: file.version,
                expected: MANIFEST_VERSION,
            });
        }

        let mut manifest = Manifest::new(file.sort_by, file.naming);
        for branch in file.branches {
            let key = Key::Branch(BranchKey { id: branch.id });
            manifest.insert_loaded(Record::new(key, AbsPath::new("", branch.path)), Relations::new());
        }
        for config in file.configurations {
            let config_key = ConfigKey {
                branch_id: config.branch_id,
                component_id: config.component_id,
                id: config.id,
            };
            for row in config.rows {
                let key = Key::ConfigRow(ConfigRowKey::new(&config_key, row.id));
                manifest.insert_loaded(
                    Record::new(key, AbsPath::relative_only(row.path)),
                    relations_from(row.relations),
                );
            }
            manifest.insert_loaded(
                Record::new(Key::Config(config_key), AbsPath::relative_only(config.path)),
                relations_from(config.relations),
            );
        }

        manifest.resolve_parent_paths()?;
        tracing::debug!("manifest loaded: {} records", manifest.records.len());
        Ok(manifest)
    }

    fn insert_loaded(&mut self, mut record: Record, relations: Relations) {
        record.relations = relations;
        record.state.persisted = true;
        self.records.insert(record.key.clone(), record);
    }

    fn resolve_parent_paths(&mut self) -> Result<(), CoreError> {
        let mut resolved = Vec::with_capacity(self.records.len());
        for (key, record) in &self.records {
            if record.path.is_parent_path_set() {
                continue;
            }
            let parent_path = match record.parent_key() {
                Some(parent) => self.full_path(key, &parent, 0)?,
                None => String::new(),
            };
            resolved.push((key.clone(), parent_path));
        }
        for (key, parent_path) in resolved {
            if let Some(record) = self.records.get_mut(&key) {
                record.path.set_parent_path(parent_path);
            }
        }
        Ok(())
    }

    /// Full path of `key`, resolved through its parents. `origin` names the
    /// record being resolved for error messages.
    fn full_path(&self, origin: &Key, key: &Key, depth: usize) -> Result<String, CoreError> {
        if depth > MAX_PARENT_DEPTH {
            return Err(CoreError::CyclicParent { key: origin.desc() });
        }
        let record = self.records.get(key).ok_or_else(|| CoreError::MissingParent {
            key: origin.desc(),
            parent: key.desc(),
        })?;
        if record.path.is_parent_path_set() {
            return Ok(record.path());
        }
        match record.parent_key() {
            Some(parent) => {
                let parent_path = self.full_path(origin, &parent, depth + 1)?;
                Ok(join_path(&parent_path, record.path.relative_path()))
            }
            None => Ok(record.path.relative_path().to_string()),
        }
    }

    /// Writes persisted, not-deleted records. Rows are nested under their config.
    pub fn save(&self, fs: &dyn Filesystem) -> Result<(), CoreError> {
        let mut file = ManifestFile {
            version: MANIFEST_VERSION,
            sort_by: self.sort_by,
            naming: self.naming.clone(),
            branches: Vec::new(),
            configurations: Vec::new(),
        };

        let records = self.sorted_records();
        let mut rows: BTreeMap<ConfigKey, Vec<RowEntry>> = BTreeMap::new();
        for record in &records {
            if let Key::ConfigRow(k) = &record.key {
                rows.entry(k.config_key()).or_default().push(RowEntry {
                    id: k.id.clone(),
                    path: record.path.relative_path().to_string(),
                    relations: record.relations.to_manifest(),
                });
            }
        }
        for record in &records {
            match &record.key {
                Key::Branch(k) => file.branches.push(BranchEntry {
                    id: k.id,
                    path: record.path.relative_path().to_string(),
                }),
                Key::Config(k) => file.configurations.push(ConfigEntry {
                    branch_id: k.branch_id,
                    component_id: k.component_id.clone(),
                    id: k.id.clone(),
                    path: record.path.relative_path().to_string(),
                    relations: record.relations.to_manifest(),
                    rows: rows.remove(k).unwrap_or_default(),
                }),
                _ => {}
            }
        }
        for config in rows.keys() {
            tracing::warn!("manifest: rows of unknown {} skipped", Key::Config(config.clone()).desc());
        }

        write_json(fs, MANIFEST_FILE, &file)?;
        tracing::debug!("manifest saved: {} records", records.len());
        Ok(())
    }

    fn sorted_records(&self) -> Vec<&Record> {
        let mut records: Vec<&Record> = self
            .records
            .values()
            .filter(|r| r.state.persisted && !r.state.deleted)
            .collect();
        records.sort_by_cached_key(|r| r.sort_key(self.sort_by));
        records
    }

    /// All records ordered so that parents precede their children.
    pub fn records_parents_first(&self) -> Vec<&Record> {
        let mut records: Vec<(usize, &Record)> = self
            .records
            .values()
            .map(|r| (self.depth(r), r))
            .collect();
        records.sort_by_cached_key(|(depth, r)| (*depth, r.sort_key(self.sort_by)));
        records.into_iter().map(|(_, r)| r).collect()
    }

    fn depth(&self, record: &Record) -> usize {
        let mut depth = 0;
        let mut current = record.parent_key();
        while let Some(parent) = current {
            depth += 1;
            if depth > MAX_PARENT_DEPTH {
                break;
            }
            current = self.records.get(&parent).and_then(Record::parent_key);
        }
        depth
    }

    pub fn get(&self, key: &Key) -> Option<&Record> {
        self.records.get(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn set_record(&mut self, record: Record) {
        self.records.insert(record.key.clone(), record);
    }

    pub fn remove(&mut self, key: &Key) -> Option<Record> {
        self.records.remove(key)
    }

    /// Replaces all records with the records of the state's live objects.
    pub fn set_records_from(&mut self, state: &State) {
        self.records = state
            .all()
            .into_iter()
            .map(|s| (s.key().clone(), s.record.clone()))
            .collect();
    }
}
