//! Local manager: loads the project directory into the state and writes it
//! back.
//!
//! ## Save protocol
//!
//! 1. Run the save hooks of every object of the batch.
//! 2. Compare each rendered file with the one on disk; identical files are
//!    left alone.
//! 3. Write changed files.
//! 4. Delete related paths the object no longer owns.
//! 5. Move the saved records and objects back into the state.
//!
//! Nothing is written until step 1 succeeded for the object.

use std::collections::BTreeSet;

use treesync_core::component::{
    SCHEDULER_COMPONENT_ID, SHARED_CODE_COMPONENT_ID, VARIABLES_COMPONENT_ID,
};
use treesync_core::naming::generator::meta_file_path;
use treesync_core::naming::Generator;
use treesync_core::paths::{file_name, is_within, parent_dir, relative_to, KnownPaths};
use treesync_core::{
    AbsPath, BranchId, ComponentId, ConfigKey, ConfigRowKey, Content, Filesystem, Key, Manifest,
    Object, ObjectState, Record, Side, State,
};

use crate::error::MapperError;
use crate::pipeline::Pipeline;
use crate::recipe::{
    Changes, LocalLoadRecipe, LocalSaveRecipe, OperationContext, PersistRecipe, SavedObject,
};
use crate::rename::{plan_renames, RenameAction};
use crate::report::Report;

// ---------------------------------------------------------------------------
// Write result
// ---------------------------------------------------------------------------

/// Outcome of one file operation of a save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteResult {
    Written { path: String },
    /// On-disk content already matches.
    Unchanged { path: String },
    /// Dry run: the file would have been written.
    WouldWrite { path: String },
    /// A stale related path was removed.
    Deleted { path: String },
    WouldDelete { path: String },
}

impl WriteResult {
    pub fn path(&self) -> &str {
        match self {
            WriteResult::Written { path }
            | WriteResult::Unchanged { path }
            | WriteResult::WouldWrite { path }
            | WriteResult::Deleted { path }
            | WriteResult::WouldDelete { path } => path,
        }
    }

    pub fn is_change(&self) -> bool {
        !matches!(self, WriteResult::Unchanged { .. })
    }
}

/// A rendered object plus the paths it stopped owning.
#[derive(Debug, Clone)]
pub struct PlannedSave {
    pub saved: SavedObject,
    pub stale: Vec<String>,
}

#[derive(Debug, Default)]
pub struct SaveOutcome {
    pub writes: Vec<WriteResult>,
    pub report: Report,
}

#[derive(Debug, Default)]
pub struct RenameOutcome {
    pub actions: Vec<RenameAction>,
    pub writes: Vec<WriteResult>,
    pub report: Report,
}

/// Hands out ids for objects created locally.
pub trait IdSource {
    fn next_id(&mut self) -> Result<String, MapperError>;
}

/// Where a new object directory sits relative to its nearest known parent.
#[derive(Debug, Clone, PartialEq, Eq)]
enum NewObject {
    Config {
        branch_id: BranchId,
        component_id: ComponentId,
    },
    Row {
        config: ConfigKey,
    },
}

// ---------------------------------------------------------------------------
// LocalManager
// ---------------------------------------------------------------------------

pub struct LocalManager<'a> {
    fs: &'a dyn Filesystem,
    pipeline: &'a Pipeline,
    naming: &'a Generator,
}

impl<'a> LocalManager<'a> {
    pub fn new(fs: &'a dyn Filesystem, pipeline: &'a Pipeline, naming: &'a Generator) -> Self {
        Self {
            fs,
            pipeline,
            naming,
        }
    }

    // -- load ---------------------------------------------------------------

    /// Loads every manifest record, parents first, then runs the listeners
    /// and marks the loaded files as tracked.
    pub fn load(&self, state: &mut State, manifest: &Manifest) -> Report {
        let mut report = Report::new();
        match KnownPaths::new(self.fs) {
            Ok(known_paths) => state.set_known_paths(known_paths),
            Err(err) => report.error(err.into()),
        }

        let mut changes = Changes::default();
        for record in manifest.records_parents_first() {
            if let Some(key) = self.load_object(state, record.clone(), &mut report) {
                changes.loaded.push(key);
            }
        }
        tracing::debug!("loaded {} local objects", changes.loaded.len());

        self.notify(state, &changes, &mut report);
        for key in state.keys() {
            state.track_record(&key);
        }
        report
    }

    /// Runs the load hooks of one object and stores the result. Returns the
    /// key when the object was loaded.
    fn load_object(&self, state: &mut State, mut record: Record, report: &mut Report) -> Option<Key> {
        let key = record.key.clone();
        let object = Object::empty(&key)?;
        let path = record.path();
        let mut object_state = state
            .get(&key)
            .cloned()
            .unwrap_or_else(|| ObjectState::new(record.clone()));

        if !self.fs.is_dir(&path) {
            record.state.not_found = true;
            report
                .errors
                .push(format!("{} \"{}\" not found", key.kind(), path));
            object_state.record = record;
            object_state.set(Side::Local, None);
            if let Err(err) = state.set(object_state) {
                report.error(err.into());
            }
            return None;
        }

        let mut recipe = LocalLoadRecipe {
            fs: self.fs,
            components: state.components(),
            naming: self.naming,
            record,
            object,
            warnings: Vec::new(),
        };
        let result = self.pipeline.after_local_load(&mut recipe);
        let LocalLoadRecipe {
            mut record,
            object,
            warnings,
            ..
        } = recipe;
        report.warn_all(warnings);

        let loaded = match result {
            Ok(()) => {
                record.state.invalid = false;
                object_state.set(Side::Local, Some(object));
                true
            }
            Err(err) => {
                record.state.invalid = true;
                report.error_prefixed(format!("invalid {} \"{}\"", key.kind(), path), err);
                object_state.set(Side::Local, None);
                false
            }
        };
        record.state.not_found = false;
        object_state.record = record;
        if let Err(err) = state.set(object_state) {
            report.error(err.into());
            return None;
        }
        loaded.then_some(key)
    }

    fn notify(&self, state: &mut State, changes: &Changes, report: &mut Report) {
        if changes.is_empty() {
            return;
        }
        let mut ctx = OperationContext {
            state,
            fs: self.fs,
            naming: self.naming,
            report,
        };
        self.pipeline.after_local_changes(&mut ctx, changes);
    }

    // -- save ---------------------------------------------------------------

    /// Runs the save hooks of `keys` without touching the disk. The local
    /// form is saved; objects known only remotely are saved from the remote
    /// form.
    pub fn plan_save(&self, state: &State, keys: &[Key], report: &mut Report) -> Vec<PlannedSave> {
        let mut planned = Vec::new();
        for key in keys {
            let Some(object_state) = state.get(key) else {
                continue;
            };
            let Some(object) = object_state.local.as_ref().or(object_state.remote.as_ref()) else {
                continue;
            };
            let path = object_state.path();

            let mut record = object_state.record.clone();
            record.related_paths.clear();
            let mut recipe = LocalSaveRecipe {
                fs: self.fs,
                state,
                naming: self.naming,
                record,
                object: object.clone(),
                meta: Content::new(),
                config: None,
                description: None,
                files: Vec::new(),
                warnings: Vec::new(),
            };
            if let Err(err) = self.pipeline.before_local_save(&mut recipe) {
                report.error_prefixed(format!("cannot save {} \"{}\"", key.kind(), path), err);
                continue;
            }
            let saved = match recipe.into_files() {
                Ok(saved) => saved,
                Err(err) => {
                    report.error(err.into());
                    continue;
                }
            };

            let stale = self.stale_paths(&object_state.record, &saved);
            planned.push(PlannedSave { saved, stale });
        }
        planned
    }

    /// Paths owned before and not anymore, skipping ancestors of new files.
    fn stale_paths(&self, old: &Record, saved: &SavedObject) -> Vec<String> {
        let current: BTreeSet<String> = saved.record.related_paths_abs().into_iter().collect();
        old.related_paths_abs()
            .into_iter()
            .filter(|path| !current.contains(path))
            .filter(|path| !saved.files.iter().any(|file| is_within(&file.path, path)))
            .filter(|path| self.fs.exists(path))
            .collect()
    }

    /// Saves `keys`; with `dry_run` only reports what would change.
    pub fn save(&self, state: &mut State, keys: &[Key], dry_run: bool) -> SaveOutcome {
        let mut outcome = SaveOutcome::default();
        let planned = self.plan_save(state, keys, &mut outcome.report);

        for plan in planned {
            let key = plan.saved.record.key.clone();
            if let Err(err) = self.write_object(&plan, dry_run, &mut outcome.writes) {
                outcome.report.error_prefixed(
                    format!("cannot save {} \"{}\"", key.kind(), plan.saved.record.path()),
                    err,
                );
                continue;
            }
            outcome.report.warn_all(plan.saved.warnings);
            if dry_run {
                continue;
            }

            let Some(object_state) = state.get_mut(&key) else {
                continue;
            };
            let mut record = plan.saved.record;
            record.state.persisted = true;
            record.state.invalid = false;
            record.state.not_found = false;
            object_state.record = record;
            object_state.set(Side::Local, Some(plan.saved.object));
            state.track_record(&key);
        }
        outcome
    }

    fn write_object(
        &self,
        plan: &PlannedSave,
        dry_run: bool,
        writes: &mut Vec<WriteResult>,
    ) -> Result<(), MapperError> {
        for file in &plan.saved.files {
            let unchanged = self.fs.is_file(&file.path)
                && self.fs.read_file(&file.path, "file")? == file.content;
            let path = file.path.clone();
            if unchanged {
                tracing::debug!("unchanged: {path}");
                writes.push(WriteResult::Unchanged { path });
            } else if dry_run {
                tracing::info!("[dry-run] would write: {path}");
                writes.push(WriteResult::WouldWrite { path });
            } else {
                self.fs.write_file(&file.path, &file.content)?;
                tracing::info!("wrote: {path}");
                writes.push(WriteResult::Written { path });
            }
        }
        for path in &plan.stale {
            let path = path.clone();
            if dry_run {
                tracing::info!("[dry-run] would delete: {path}");
                writes.push(WriteResult::WouldDelete { path });
            } else {
                self.fs.remove(&path)?;
                tracing::info!("deleted: {path}");
                writes.push(WriteResult::Deleted { path });
            }
        }
        Ok(())
    }

    /// Replaces the manifest records with the state and writes it.
    pub fn save_manifest(
        &self,
        state: &State,
        manifest: &mut Manifest,
        dry_run: bool,
    ) -> Result<(), MapperError> {
        manifest.set_records_from(state);
        if !dry_run {
            manifest.save(self.fs)?;
        }
        Ok(())
    }

    // -- persist ------------------------------------------------------------

    /// Untracked directories with a `meta.json`, parents before children.
    pub fn find_new_objects(&self, state: &State) -> Vec<String> {
        state
            .untracked_paths()
            .into_iter()
            .filter(|path| self.fs.is_file(&meta_file_path(path)))
            .collect()
    }

    /// Adds objects created by hand on disk: each gets a fresh id, runs the
    /// persist hooks and is loaded like any other object.
    pub fn persist(&self, state: &mut State, ids: &mut dyn IdSource) -> Report {
        let mut report = Report::new();
        let mut changes = Changes::default();

        for dir in self.find_new_objects(state) {
            let Some((parent_key, parent_path)) = nearest_object(state, &dir) else {
                report.warn(format!("cannot persist \"{dir}\": no parent object found"));
                continue;
            };
            let Some(relative) = relative_to(&dir, &parent_path).map(str::to_string) else {
                continue;
            };
            let Some(new_object) = classify(&parent_key, &relative) else {
                report.warn(format!("cannot persist \"{dir}\": unexpected location"));
                continue;
            };
            let id = match ids.next_id() {
                Ok(id) => id,
                Err(err) => {
                    report.error_prefixed(format!("cannot persist \"{dir}\""), err);
                    continue;
                }
            };
            let key = match new_object {
                NewObject::Config {
                    branch_id,
                    component_id,
                } => Key::Config(ConfigKey::new(branch_id, component_id, id)),
                NewObject::Row { config } => Key::ConfigRow(ConfigRowKey::new(&config, id)),
            };

            let mut record = Record::new(key.clone(), AbsPath::new(parent_path, relative));
            let mut recipe = PersistRecipe {
                state: &*state,
                parent_key: Some(parent_key),
                record: &mut record,
            };
            if let Err(err) = self.pipeline.before_persist(&mut recipe) {
                report.error_prefixed(format!("cannot persist \"{dir}\""), err);
                continue;
            }
            record.state.persisted = true;
            tracing::info!("persisted {} at \"{dir}\"", key.desc());
            if let Some(key) = self.load_object(state, record, &mut report) {
                changes.persisted.push(key);
            }
        }

        self.notify(state, &changes, &mut report);
        for key in &changes.persisted {
            state.track_record(key);
        }
        report
    }

    // -- rename -------------------------------------------------------------

    /// Moves every object to its generated path, saves objects whose files
    /// reference moved paths and writes the manifest.
    pub fn rename(
        &self,
        state: &mut State,
        manifest: &mut Manifest,
        dry_run: bool,
    ) -> Result<RenameOutcome, MapperError> {
        let mut outcome = RenameOutcome {
            actions: plan_renames(state, self.naming),
            ..RenameOutcome::default()
        };

        if dry_run {
            let registry = state.naming_registry();
            for action in &outcome.actions {
                registry.detach(&action.key);
            }
            for action in &outcome.actions {
                if let Err(err) = registry.attach(&action.key, &action.old_path) {
                    outcome.report.warn(err);
                }
            }
            return Ok(outcome);
        }

        for action in &outcome.actions {
            if action.needs_move() {
                self.fs
                    .move_path(&action.rename_from, &action.new_path.path())?;
                tracing::info!("renamed {action}");
            }
            state.set_path(&action.key, action.new_path.clone())?;
        }
        if outcome.actions.is_empty() {
            return Ok(outcome);
        }

        let resave: Vec<Key> = self
            .pipeline
            .after_rename(state, &outcome.actions)?
            .into_iter()
            .collect();
        let saved = self.save(state, &resave, false);
        outcome.writes = saved.writes;
        outcome.report.merge(saved.report);
        self.save_manifest(state, manifest, false)?;
        Ok(outcome)
    }
}

/// Closest ancestor directory bound to an object.
fn nearest_object(state: &State, dir: &str) -> Option<(Key, String)> {
    let mut current = parent_dir(dir);
    while !current.is_empty() {
        if let Some(object_state) = state.get_by_path(current) {
            return Some((object_state.key().clone(), current.to_string()));
        }
        current = parent_dir(current);
    }
    None
}

/// Kind of object a new directory holds, from where it sits under its parent.
fn classify(parent: &Key, relative: &str) -> Option<NewObject> {
    let first = relative.split('/').next().unwrap_or_default();
    match parent {
        Key::Branch(branch) if first == "_shared" => Some(NewObject::Config {
            branch_id: branch.id,
            component_id: SHARED_CODE_COMPONENT_ID.into(),
        }),
        Key::Branch(branch) => {
            let component_dir = parent_dir(relative);
            if component_dir.is_empty() {
                return None;
            }
            Some(NewObject::Config {
                branch_id: branch.id,
                component_id: file_name(component_dir).into(),
            })
        }
        Key::Config(config) => match first {
            "rows" | "codes" | "values" => Some(NewObject::Row {
                config: config.clone(),
            }),
            "variables" => Some(NewObject::Config {
                branch_id: config.branch_id,
                component_id: VARIABLES_COMPONENT_ID.into(),
            }),
            "schedules" => Some(NewObject::Config {
                branch_id: config.branch_id,
                component_id: SCHEDULER_COMPONENT_ID.into(),
            }),
            _ => None,
        },
        Key::ConfigRow(row) if first == "variables" => Some(NewObject::Config {
            branch_id: row.branch_id,
            component_id: VARIABLES_COMPONENT_ID.into(),
        }),
        _ => None,
    }
}
