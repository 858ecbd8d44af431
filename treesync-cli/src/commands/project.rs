//! Opening a project directory: manifest, naming, pipeline and the loaded
//! local state.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use treesync_core::manifest::MANIFEST_FILE;
use treesync_core::naming::{Generator, Registry};
use treesync_core::{ComponentsMap, DirFs, Key, Manifest, State};
use treesync_mapper::{LocalManager, Pipeline, Report};

pub struct Project {
    pub fs: DirFs,
    pub manifest: Manifest,
    pub pipeline: Pipeline,
    pub naming: Generator,
    pub state: State,
}

impl Project {
    /// Reads the manifest and loads every local object.
    pub fn load(dir: &Path) -> Result<(Self, Report)> {
        let fs = DirFs::new(dir);
        if !Manifest::exists(&fs) {
            bail!(
                "\"{}\" is not a treesync project: {MANIFEST_FILE} not found",
                dir.display()
            );
        }
        let manifest =
            Manifest::load(&fs).with_context(|| format!("failed to read {MANIFEST_FILE}"))?;

        let registry = Arc::new(Registry::new());
        let naming = Generator::new(manifest.naming.clone(), registry.clone());
        let state = State::new(registry, ComponentsMap::new(), manifest.sort_by);
        let mut project = Self {
            fs,
            manifest,
            pipeline: Pipeline::standard(),
            naming,
            state,
        };

        let manager = LocalManager::new(&project.fs, &project.pipeline, &project.naming);
        let report = manager.load(&mut project.state, &project.manifest);
        tracing::debug!(
            "loaded {} objects from \"{}\"",
            project.state.keys().len(),
            dir.display()
        );
        Ok((project, report))
    }

    /// Keys of objects loaded from disk.
    pub fn local_keys(&self) -> Vec<Key> {
        self.state
            .keys()
            .into_iter()
            .filter(|key| {
                self.state
                    .get(key)
                    .map(|s| s.has_local_state())
                    .unwrap_or(false)
            })
            .collect()
    }
}
