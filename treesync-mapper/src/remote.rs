//! Remote manager: pulls objects from the API into the state and pushes
//! local changes back.
//!
//! The HTTP client itself lives outside this crate; the manager talks to it
//! through [`ApiClient`].

use std::collections::HashSet;

use treesync_core::naming::Generator;
use treesync_core::{
    AbsPath, Branch, BranchKey, Component, Config, ConfigRow, Filesystem, Key, Object,
    ObjectState, Record, Side, State,
};

use crate::error::MapperError;
use crate::pipeline::Pipeline;
use crate::recipe::{Changes, OperationContext, RemoteLoadRecipe, RemoteSaveRecipe};
use crate::report::Report;

/// A config as listed by the API, with its rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigWithRows {
    pub config: Config,
    pub rows: Vec<ConfigRow>,
}

/// Remote API operations the managers rely on. Objects are exchanged in
/// their API form.
pub trait ApiClient {
    fn list_components(&self) -> Result<Vec<Component>, MapperError>;

    fn list_branches(&self) -> Result<Vec<Branch>, MapperError>;

    fn list_configs(&self, branch: &BranchKey) -> Result<Vec<ConfigWithRows>, MapperError>;

    fn create(&self, object: &Object) -> Result<(), MapperError>;

    fn update(&self, object: &Object) -> Result<(), MapperError>;

    fn delete(&self, key: &Key) -> Result<(), MapperError>;
}

/// One API call of a push.
#[derive(Debug, Clone, PartialEq)]
pub enum PushAction {
    Create(Object),
    Update(Object),
    Delete(Key),
}

impl PushAction {
    pub fn key(&self) -> Key {
        match self {
            PushAction::Create(object) | PushAction::Update(object) => object.key(),
            PushAction::Delete(key) => key.clone(),
        }
    }
}

#[derive(Debug, Default)]
pub struct PushOutcome {
    pub actions: Vec<PushAction>,
    pub report: Report,
}

pub struct RemoteManager<'a> {
    client: &'a dyn ApiClient,
    fs: &'a dyn Filesystem,
    pipeline: &'a Pipeline,
    naming: &'a Generator,
}

impl<'a> RemoteManager<'a> {
    pub fn new(
        client: &'a dyn ApiClient,
        fs: &'a dyn Filesystem,
        pipeline: &'a Pipeline,
        naming: &'a Generator,
    ) -> Self {
        Self {
            client,
            fs,
            pipeline,
            naming,
        }
    }

    // -- pull ---------------------------------------------------------------

    /// Replaces the remote side of the state with the objects the API lists.
    pub fn pull(&self, state: &mut State) -> Result<Report, MapperError> {
        let mut report = Report::new();
        for component in self.client.list_components()? {
            state.components_mut().insert(component);
        }

        let mut objects = Vec::new();
        for branch in self.client.list_branches()? {
            let configs = self.client.list_configs(&branch.key)?;
            objects.push(Object::Branch(branch));
            for ConfigWithRows { config, rows } in configs {
                objects.push(Object::Config(config));
                objects.extend(rows.into_iter().map(Object::ConfigRow));
            }
        }
        tracing::debug!("pulled {} remote objects", objects.len());

        let mut changes = Changes::default();
        let mut seen = HashSet::new();
        for object in objects {
            let key = object.key();
            seen.insert(key.clone());
            let mut recipe = RemoteLoadRecipe {
                components: state.components(),
                object,
                warnings: Vec::new(),
            };
            let result = self.pipeline.after_remote_load(&mut recipe);
            let RemoteLoadRecipe {
                object, warnings, ..
            } = recipe;
            report.warn_all(warnings);
            if let Err(err) = result {
                report.error_prefixed(format!("invalid remote {}", key.desc()), err);
                continue;
            }

            match state.get_mut(&key) {
                Some(object_state) => object_state.set(Side::Remote, Some(object)),
                None => {
                    let mut object_state =
                        ObjectState::new(Record::new(key.clone(), AbsPath::default()));
                    object_state.set(Side::Remote, Some(object));
                    state.set(object_state)?;
                }
            }
            changes.loaded.push(key);
        }

        for key in state.keys() {
            if seen.contains(&key) {
                continue;
            }
            let Some(object_state) = state.get_mut(&key) else {
                continue;
            };
            if object_state.remote.take().is_some() {
                changes.deleted.push(key.clone());
            }
            if !object_state.has_local_state() {
                object_state.record.state.deleted = true;
            }
        }

        {
            let mut ctx = OperationContext {
                state: &mut *state,
                fs: self.fs,
                naming: self.naming,
                report: &mut report,
            };
            self.pipeline.on_remote_change(&mut ctx, &changes);
        }
        self.generate_paths(state, &mut report);
        let mut ctx = OperationContext {
            state,
            fs: self.fs,
            naming: self.naming,
            report: &mut report,
        };
        self.pipeline.after_remote_operation(&mut ctx, &changes);
        Ok(report)
    }

    /// Gives a path to every object without one, parents first.
    fn generate_paths(&self, state: &mut State, report: &mut Report) {
        for key in state.keys_parents_first() {
            let Some(object_state) = state.get(&key) else {
                continue;
            };
            if !object_state.record.path.is_empty() {
                continue;
            }
            let Some(object) = object_state.remote.as_ref().or(object_state.local.as_ref()) else {
                continue;
            };
            let parent_path = state
                .parent_key(&key)
                .and_then(|parent| state.get(&parent))
                .map(ObjectState::path)
                .unwrap_or_default();

            let components = state.components();
            let path = match object {
                Object::Branch(branch) => self.naming.branch_path(branch),
                Object::Config(config) => {
                    let component = components.get_or_infer(&config.key.component_id);
                    self.naming.config_path(&parent_path, &component, config)
                }
                Object::ConfigRow(row) => {
                    let component = components.get_or_infer(&row.key.component_id);
                    self.naming.config_row_path(&parent_path, &component, row)
                }
            };
            tracing::debug!("new path of {}: {}", key.desc(), path.path());
            if let Err(err) = state.set_path(&key, path) {
                report.error(err.into());
            }
        }
    }

    // -- push ---------------------------------------------------------------

    /// Maps every local object to its API form, then sends the batch.
    /// Objects whose API form matches the remote one are skipped. Objects
    /// present only remotely are deleted, children first.
    pub fn push(&self, state: &mut State, dry_run: bool) -> PushOutcome {
        let mut outcome = PushOutcome::default();

        for key in state.keys_parents_first() {
            let object_state = state.must_get(&key);
            let Some(local) = object_state.local.as_ref() else {
                continue;
            };
            let local = match self.api_form(state, &object_state.record, local) {
                Ok((object, warnings)) => {
                    outcome.report.warn_all(warnings);
                    object
                }
                Err(err) => {
                    outcome
                        .report
                        .error_prefixed(format!("cannot push {}", key.desc()), err);
                    continue;
                }
            };

            let Some(remote) = object_state.remote.as_ref() else {
                outcome.actions.push(PushAction::Create(local));
                continue;
            };
            // a remote object the hooks cannot map is pushed over
            let unchanged = self
                .api_form(state, &object_state.record, remote)
                .map(|(remote, _)| same_on_api(&local, &remote))
                .unwrap_or(false);
            if !unchanged {
                outcome.actions.push(PushAction::Update(local));
            }
        }

        let mut deletes: Vec<PushAction> = state
            .all()
            .into_iter()
            .filter(|s| s.has_remote_state() && !s.has_local_state())
            .map(|s| PushAction::Delete(s.key().clone()))
            .collect();
        deletes.sort_by_key(|action| std::cmp::Reverse(action.key().level()));
        outcome.actions.extend(deletes);

        if dry_run || outcome.report.has_errors() {
            return outcome;
        }

        for action in &outcome.actions {
            let result = match action {
                PushAction::Create(object) => self.client.create(object),
                PushAction::Update(object) => self.client.update(object),
                PushAction::Delete(key) => self.client.delete(key),
            };
            let key = action.key();
            if let Err(err) = result {
                outcome
                    .report
                    .error_prefixed(format!("cannot push {}", key.desc()), err);
                continue;
            }
            tracing::info!("pushed {}", key.desc());

            let Some(object_state) = state.get_mut(&key) else {
                continue;
            };
            match action {
                PushAction::Delete(_) => {
                    object_state.remote = None;
                    object_state.record.state.deleted = true;
                }
                _ => object_state.remote = object_state.local.clone(),
            }
        }
        outcome
    }

    /// Runs the remote save hooks over a copy of `object`.
    fn api_form(
        &self,
        state: &State,
        record: &Record,
        object: &Object,
    ) -> Result<(Object, Vec<String>), MapperError> {
        let mut recipe = RemoteSaveRecipe {
            state,
            record,
            object: object.clone(),
            warnings: Vec::new(),
        };
        self.pipeline.before_remote_save(&mut recipe)?;
        Ok((recipe.object, recipe.warnings))
    }
}

/// Compares the fields an API call sends. Structures kept only in memory,
/// such as block paths, are already folded into the content.
fn same_on_api(a: &Object, b: &Object) -> bool {
    match (a, b) {
        (Object::Branch(a), Object::Branch(b)) => {
            a.key == b.key
                && a.name == b.name
                && a.description == b.description
                && a.is_default == b.is_default
        }
        (Object::Config(a), Object::Config(b)) => {
            a.key == b.key
                && a.name == b.name
                && a.description == b.description
                && a.is_disabled == b.is_disabled
                && a.content == b.content
        }
        (Object::ConfigRow(a), Object::ConfigRow(b)) => {
            a.key == b.key
                && a.name == b.name
                && a.description == b.description
                && a.is_disabled == b.is_disabled
                && a.content == b.content
        }
        _ => false,
    }
}
