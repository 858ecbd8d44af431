//! Orchestrator: phases and tasks of `keboola.orchestrator` configs.
//!
//! Remotely the orchestration is stored as flat `phases` and `tasks` arrays
//! in the config content. Locally it is a `phases/` directory tree, with
//! tasks referencing their target configs by path. Both forms are parsed in
//! operation listeners, once every config of the operation is in the state,
//! so targets can be resolved. Referenced configs get a `usedInOrchestrator`
//! relation.

mod local_load;
mod local_save;
mod pipeline_file;
mod remote_load;
mod remote_save;
pub mod sorter;

use std::collections::BTreeSet;
use std::sync::Arc;

use treesync_core::component::ORCHESTRATOR_COMPONENT_ID;
use treesync_core::{ConfigId, ConfigKey, Key, Object, Relation, Side, State};

use crate::error::MapperError;
use crate::pipeline::{LocalSaver, Mapper, OperationListener, RemoteSaver, Renamer};
use crate::recipe::{Changes, LocalSaveRecipe, OperationContext, RemoteSaveRecipe};
use crate::rename::RenameAction;

use local_load::PhasesReader;
use local_save::PhasesWriter;

const ID_KEY: &str = "id";
const NAME_KEY: &str = "name";
const ENABLED_KEY: &str = "enabled";
const PHASES_KEY: &str = "phases";
const TASKS_KEY: &str = "tasks";
const PHASE_KEY: &str = "phase";
const TASK_KEY: &str = "task";
const DEPENDS_ON_KEY: &str = "dependsOn";
const COMPONENT_ID_KEY: &str = "componentId";
const CONFIG_ID_KEY: &str = "configId";
const CONFIG_PATH_KEY: &str = "configPath";
const CONFIG_DATA_KEY: &str = "configData";

/// `dependsOn` entry pointing at the phase directory sorted just before.
const PREVIOUS_PHASE_LINK: &str = "<previous>";

pub struct OrchestratorMapper;

impl Mapper for OrchestratorMapper {
    fn name(&self) -> &'static str {
        "orchestrator"
    }

    fn local_saver(self: Arc<Self>) -> Option<Arc<dyn LocalSaver>> {
        Some(self)
    }

    fn remote_saver(self: Arc<Self>) -> Option<Arc<dyn RemoteSaver>> {
        Some(self)
    }

    fn renamer(self: Arc<Self>) -> Option<Arc<dyn Renamer>> {
        Some(self)
    }

    fn operation_listener(self: Arc<Self>) -> Option<Arc<dyn OperationListener>> {
        Some(self)
    }
}

fn is_orchestrator(key: &Key) -> Option<&ConfigKey> {
    match key {
        Key::Config(config) if config.component_id.as_str() == ORCHESTRATOR_COMPONENT_ID => {
            Some(config)
        }
        _ => None,
    }
}

fn mark_used_in_orchestrator(state: &mut State, side: Side, targets: &[ConfigKey], id: &ConfigId) {
    for target in targets {
        let relations = state
            .get_mut(&Key::Config(target.clone()))
            .and_then(|s| s.get_mut(side))
            .and_then(Object::relations_mut);
        if let Some(relations) = relations {
            relations.add(Relation::UsedInOrchestrator {
                config_id: id.clone(),
            });
        }
    }
}

// ---------------------------------------------------------------------------
// Local
// ---------------------------------------------------------------------------

impl LocalSaver for OrchestratorMapper {
    fn before_local_save(&self, recipe: &mut LocalSaveRecipe<'_>) -> Result<(), MapperError> {
        let Object::Config(config) = &mut recipe.object else {
            return Ok(());
        };
        let Some(orchestration) = config.orchestration.as_mut() else {
            return Ok(());
        };
        if let Some(content) = recipe.config.as_mut() {
            content.remove(PHASES_KEY);
            content.remove(TASKS_KEY);
        }

        let config_dir = recipe.record.path();
        let writer = PhasesWriter {
            state: recipe.state,
            naming: recipe.naming,
            config: &config.key,
            config_dir: &config_dir,
        };
        let tree = writer.write(orchestration);

        for dir in tree.dirs {
            recipe.record.add_related_path(dir);
        }
        for (path, content) in &tree.files {
            recipe.add_json_file(path, content)?;
        }
        recipe.warnings.extend(tree.warnings);
        Ok(())
    }
}

impl OperationListener for OrchestratorMapper {
    /// Reads the phases of loaded orchestrators and links their targets.
    fn after_local_operation(
        &self,
        ctx: &mut OperationContext<'_>,
        changes: &Changes,
    ) -> Result<(), MapperError> {
        for key in changes.loaded.iter().chain(&changes.persisted) {
            let Some(config_key) = is_orchestrator(key) else {
                continue;
            };
            let Some(object_state) = ctx.state.get(key).filter(|s| s.has_local_state()) else {
                continue;
            };
            let config_dir = object_state.path();
            let loaded =
                PhasesReader::new(ctx.fs, ctx.state, config_key.clone(), config_dir.clone()).read();
            tracing::debug!(
                "loaded {} phases of {}",
                loaded.orchestration.phases.len(),
                key.desc()
            );

            if let Some(object_state) = ctx.state.get_mut(key) {
                for path in &loaded.related {
                    object_state.record.add_related_path(path.as_str());
                }
                if !loaded.errors.is_empty() {
                    object_state.record.state.invalid = true;
                }
                if let Some(config) = object_state
                    .get_mut(Side::Local)
                    .and_then(Object::as_config_mut)
                {
                    config.orchestration = Some(loaded.orchestration);
                    if let Some(metadata) = loaded.metadata {
                        if let Some(name) = metadata.name {
                            config.name = name;
                        }
                        if let Some(description) = metadata.description {
                            config.description = description;
                        }
                        config.is_disabled = metadata.disabled;
                    }
                }
            }
            mark_used_in_orchestrator(ctx.state, Side::Local, &loaded.targets, &config_key.id);
            ctx.report.errors.push_prefixed(
                format!("invalid orchestrator config \"{config_dir}\""),
                loaded.errors,
            );
        }
        Ok(())
    }

    /// Parses `phases` and `tasks` of loaded orchestrators. Problems are
    /// warnings: the remote side is not ours to reject.
    fn after_remote_operation(
        &self,
        ctx: &mut OperationContext<'_>,
        changes: &Changes,
    ) -> Result<(), MapperError> {
        for key in &changes.loaded {
            let Some(config_key) = is_orchestrator(key) else {
                continue;
            };
            let Some(object_state) = ctx.state.get_mut(key) else {
                continue;
            };
            let config_dir = object_state.path();
            let Some(config) = object_state
                .get_mut(Side::Remote)
                .and_then(Object::as_config_mut)
            else {
                continue;
            };
            let mut content = std::mem::take(&mut config.content);

            let mut parsed = remote_load::parse(ctx.state, config_key, &mut content);
            if !config_dir.is_empty() {
                for phase in &mut parsed.orchestration.phases {
                    phase.path = ctx.naming.phase_path(&config_dir, phase);
                    let phase_dir = phase.path.path();
                    for task in &mut phase.tasks {
                        task.path = ctx.naming.task_path(&phase_dir, task);
                    }
                }
            }

            if let Some(config) = ctx
                .state
                .get_mut(key)
                .and_then(|s| s.get_mut(Side::Remote))
                .and_then(Object::as_config_mut)
            {
                config.content = content;
                config.orchestration = Some(parsed.orchestration);
            }
            mark_used_in_orchestrator(ctx.state, Side::Remote, &parsed.targets, &config_key.id);
            if !parsed.errors.is_empty() {
                ctx.report.warn(
                    parsed
                        .errors
                        .prefixed(format!("invalid orchestrator {}", key.desc())),
                );
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Remote
// ---------------------------------------------------------------------------

impl RemoteSaver for OrchestratorMapper {
    fn before_remote_save(&self, recipe: &mut RemoteSaveRecipe<'_>) -> Result<(), MapperError> {
        if let Object::Config(config) = &mut recipe.object {
            if let Some(orchestration) = &config.orchestration {
                remote_save::write(orchestration, &mut config.content);
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Rename
// ---------------------------------------------------------------------------

impl Renamer for OrchestratorMapper {
    /// Task files store target paths, so orchestrators pointing at a moved
    /// config are saved again.
    fn after_rename(
        &self,
        state: &State,
        renamed: &[RenameAction],
        resave: &mut BTreeSet<Key>,
    ) -> Result<(), MapperError> {
        let moved: BTreeSet<&Key> = renamed.iter().map(|action| &action.key).collect();
        for object_state in state.all() {
            if is_orchestrator(object_state.key()).is_none() {
                continue;
            }
            let Some(orchestration) = object_state
                .local
                .as_ref()
                .and_then(Object::as_config)
                .and_then(|c| c.orchestration.as_ref())
            else {
                continue;
            };
            let branch_id = match object_state.key() {
                Key::Config(k) => k.branch_id,
                _ => continue,
            };
            let uses_moved = orchestration
                .phases
                .iter()
                .flat_map(|p| &p.tasks)
                .filter_map(|task| {
                    let config_id = task.config_id.clone()?;
                    Some(Key::Config(ConfigKey::new(
                        branch_id,
                        task.component_id.clone(),
                        config_id,
                    )))
                })
                .any(|target| moved.contains(&target));
            if uses_moved {
                resave.insert(object_state.key().clone());
            }
        }
        Ok(())
    }
}
