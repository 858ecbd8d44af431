#![allow(dead_code)]

use std::sync::Arc;

use serde_json::{json, Value};
use treesync_core::fs::write_json;
use treesync_core::naming::{Generator, Registry, Template};
use treesync_core::{
    AbsPath, BranchKey, ComponentsMap, ConfigKey, Filesystem, Key, Manifest, MemoryFs, Record,
    SortBy, State,
};
use treesync_mapper::local::RenameOutcome;
use treesync_mapper::{IdSource, LocalManager, Pipeline, Report, SaveOutcome};

/// A project directory in memory, with its manifest and a fresh state.
pub struct Project {
    pub fs: MemoryFs,
    pub manifest: Manifest,
    pub pipeline: Pipeline,
    pub naming: Generator,
    pub state: State,
}

impl Project {
    pub fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let registry = Arc::new(Registry::new());
        Self {
            fs: MemoryFs::new(),
            manifest: Manifest::new(SortBy::Path, Template::default()),
            pipeline: Pipeline::standard(),
            naming: Generator::new(Template::default(), registry.clone()),
            state: State::new(registry, ComponentsMap::new(), SortBy::Path),
        }
    }

    pub fn write_json(&self, path: &str, value: Value) {
        write_json(&self.fs, path, &value).unwrap();
    }

    pub fn branch(&mut self, id: u64, path: &str, name: &str) -> BranchKey {
        let key = BranchKey { id: id.into() };
        self.write_json(&format!("{path}/meta.json"), json!({"name": name, "isDefault": false}));
        self.fs.write_file(&format!("{path}/description.md"), "\n").unwrap();
        self.record(Key::Branch(key.clone()), AbsPath::new("", path));
        key
    }

    pub fn config(&mut self, key: &ConfigKey, parent: &str, relative: &str, name: &str, content: Value) {
        let dir = format!("{parent}/{relative}");
        self.write_json(&format!("{dir}/meta.json"), json!({"name": name, "isDisabled": false}));
        self.write_json(&format!("{dir}/config.json"), content);
        self.fs.write_file(&format!("{dir}/description.md"), "\n").unwrap();
        self.record(Key::Config(key.clone()), AbsPath::new(parent, relative));
    }

    pub fn record(&mut self, key: Key, path: AbsPath) {
        self.manifest.set_record(persisted(key, path));
    }

    pub fn load(&mut self) -> Report {
        let manager = LocalManager::new(&self.fs, &self.pipeline, &self.naming);
        manager.load(&mut self.state, &self.manifest)
    }

    /// Saves every object of the state.
    pub fn save_all(&mut self, dry_run: bool) -> SaveOutcome {
        let keys = self.state.keys();
        let manager = LocalManager::new(&self.fs, &self.pipeline, &self.naming);
        manager.save(&mut self.state, &keys, dry_run)
    }

    pub fn save_manifest(&mut self) {
        let manager = LocalManager::new(&self.fs, &self.pipeline, &self.naming);
        manager
            .save_manifest(&self.state, &mut self.manifest, false)
            .unwrap();
    }

    /// Same files and manifest with a fresh state, as a new run sees them.
    pub fn reopen(self) -> Self {
        let registry = Arc::new(Registry::new());
        Self {
            naming: Generator::new(Template::default(), registry.clone()),
            state: State::new(registry, ComponentsMap::new(), SortBy::Path),
            ..self
        }
    }

    pub fn rename(&mut self, dry_run: bool) -> RenameOutcome {
        let manager = LocalManager::new(&self.fs, &self.pipeline, &self.naming);
        manager
            .rename(&mut self.state, &mut self.manifest, dry_run)
            .unwrap()
    }

    pub fn persist(&mut self, ids: &mut dyn IdSource) -> Report {
        let manager = LocalManager::new(&self.fs, &self.pipeline, &self.naming);
        manager.persist(&mut self.state, ids)
    }

    pub fn read(&self, path: &str) -> String {
        self.fs.read_file(path, "file").unwrap()
    }
}

/// Hands out `1001`, `1002`, ...
#[derive(Debug, Default)]
pub struct Counter(u64);

impl IdSource for Counter {
    fn next_id(&mut self) -> Result<String, treesync_mapper::MapperError> {
        self.0 += 1;
        Ok((1000 + self.0).to_string())
    }
}

/// A manifest record of an object already known to the API.
pub fn persisted(key: Key, path: AbsPath) -> Record {
    let mut record = Record::new(key, path);
    record.state.persisted = true;
    record
}
