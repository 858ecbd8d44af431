//! Reads the `phases/` tree of an orchestrator config.
//!
//! ```text
//! phases/001-extract/phase.json
//! phases/001-extract/001-ex-db/task.json
//! phases/002-transform/phase.json
//! ```
//!
//! Errors of one phase or task do not stop the others; everything found is
//! collected and reported as one tree under the config.

use serde_json::Value;
use treesync_core::fs::read_json_map;
use treesync_core::naming::generator::{
    phase_file_path, task_file_path, PHASES_DIR, PIPELINE_FILE,
};
use treesync_core::orchestration::{Orchestration, Phase, Task};
use treesync_core::paths::{join_path, relative_to};
use treesync_core::{
    AbsPath, ConfigKey, Content, Filesystem, FsError, Key, MultiError, PhaseKey, State, TaskKey,
};

use super::pipeline_file::PipelineMetadata;
use super::sorter::PhasesSorter;
use super::{
    COMPONENT_ID_KEY, CONFIG_DATA_KEY, CONFIG_PATH_KEY, DEPENDS_ON_KEY, ENABLED_KEY, NAME_KEY,
    PREVIOUS_PHASE_LINK, TASK_KEY,
};
use crate::mappers::{relative_error, take_string};

/// Everything read for one orchestrator config.
#[derive(Debug, Default)]
pub(super) struct LocalOrchestration {
    pub orchestration: Orchestration,
    /// Paths relative to the config directory.
    pub related: Vec<String>,
    /// Configs referenced by tasks.
    pub targets: Vec<ConfigKey>,
    /// Set when the orchestration came from `pipeline.yml`.
    pub metadata: Option<PipelineMetadata>,
    pub errors: MultiError,
}

pub(super) struct PhasesReader<'a> {
    pub fs: &'a dyn Filesystem,
    pub state: &'a State,
    pub config: ConfigKey,
    pub config_dir: String,
    pub branch_dir: String,
    pub out: LocalOrchestration,
}

impl<'a> PhasesReader<'a> {
    pub fn new(fs: &'a dyn Filesystem, state: &'a State, config: ConfigKey, config_dir: String) -> Self {
        let branch_dir = state
            .get(&Key::Branch(config.branch_key()))
            .map(|s| s.path())
            .unwrap_or_default();
        Self {
            fs,
            state,
            config,
            config_dir,
            branch_dir,
            out: LocalOrchestration::default(),
        }
    }

    pub fn read(mut self) -> LocalOrchestration {
        let pipeline_file = join_path(&self.config_dir, PIPELINE_FILE);
        if self.fs.is_file(&pipeline_file) {
            self.read_pipeline_file(&pipeline_file);
        } else {
            self.read_phases_dir();
        }
        self.out
    }

    fn read_phases_dir(&mut self) {
        let phases_dir = join_path(&self.config_dir, PHASES_DIR);
        self.track(&phases_dir);
        if !self.fs.is_dir(&phases_dir) {
            self.out
                .errors
                .push(format!("missing phases dir \"{PHASES_DIR}\""));
            return;
        }
        let dirs = match self.fs.read_sub_dirs(&phases_dir) {
            Ok(dirs) => dirs,
            Err(err) => {
                let err = self.fs_error(err);
                self.out.errors.push(format!(
                    "cannot read orchestrator phases from \"{PHASES_DIR}\": {err}"
                ));
                return;
            }
        };

        let mut sorter = PhasesSorter::new(self.config.clone());
        for (index, dir) in dirs.into_iter().enumerate() {
            let key = PhaseKey::new(&self.config, index);
            let path = AbsPath::new(phases_dir.clone(), dir.clone());
            let previous = sorter.last_key().map(str::to_string);

            let mut errors = MultiError::new();
            match self.read_phase(key, path, previous) {
                Ok((mut phase, depends_on)) => {
                    self.read_tasks(&mut phase, &mut errors);
                    sorter.add(dir.clone(), phase, depends_on);
                }
                Err(causes) => errors.extend(causes),
            }
            self.out
                .errors
                .push_prefixed(format!("invalid phase \"{dir}\""), errors);
        }

        let sorted = sorter.sort();
        self.out.errors.extend(sorted.errors);
        self.out.orchestration = Orchestration {
            phases: sorted.phases,
        };
    }

    fn read_phase(
        &mut self,
        key: PhaseKey,
        path: AbsPath,
        previous: Option<String>,
    ) -> Result<(Phase, Vec<String>), MultiError> {
        let dir = path.path();
        self.track(&dir);
        let file = phase_file_path(&dir);
        let mut content = read_json_map(self.fs, &file, "phase config file")
            .map_err(|err| single(self.fs_error(err)))?;
        self.track(&file);

        let mut errors = MultiError::new();
        let name = required_string(&mut content, NAME_KEY, &mut errors);

        let mut depends_on = Vec::new();
        match content.remove(DEPENDS_ON_KEY) {
            None | Some(Value::Null) => {}
            Some(Value::Array(items)) => {
                for item in items {
                    match item {
                        Value::String(dep) if dep.trim() == PREVIOUS_PHASE_LINK => {
                            if let Some(previous) = &previous {
                                depends_on.push(previous.clone());
                            }
                        }
                        Value::String(dep) => depends_on.push(dep),
                        _ => {
                            errors.push(format!("\"{DEPENDS_ON_KEY}\" must be array of strings"));
                            break;
                        }
                    }
                }
            }
            Some(_) => errors.push(format!("\"{DEPENDS_ON_KEY}\" must be array of strings")),
        }

        errors.into_result()?;
        let phase = Phase {
            key,
            path,
            name,
            content,
            ..Phase::default()
        };
        Ok((phase, depends_on))
    }

    fn read_tasks(&mut self, phase: &mut Phase, errors: &mut MultiError) {
        let phase_dir = phase.path.path();
        let dirs = match self.fs.read_sub_dirs(&phase_dir) {
            Ok(dirs) => dirs,
            Err(err) => {
                let err = self.fs_error(err);
                errors.push(format!(
                    "cannot read orchestrator tasks from \"{}\": {err}",
                    self.relative(&phase_dir)
                ));
                return;
            }
        };
        for (index, dir) in dirs.into_iter().enumerate() {
            let key = TaskKey {
                phase: phase.key.clone(),
                index,
            };
            let path = AbsPath::new(phase_dir.clone(), dir.clone());
            match self.read_task(key, path) {
                Ok(task) => phase.tasks.push(task),
                Err(causes) => errors.push_prefixed(format!("invalid task \"{dir}\""), causes),
            }
        }
    }

    fn read_task(&mut self, key: TaskKey, path: AbsPath) -> Result<Task, MultiError> {
        let dir = path.path();
        self.track(&dir);
        let file = task_file_path(&dir);
        let mut content = read_json_map(self.fs, &file, "task config file")
            .map_err(|err| single(self.fs_error(err)))?;
        self.track(&file);

        let mut errors = MultiError::new();
        let mut task = Task {
            key,
            path,
            name: required_string(&mut content, NAME_KEY, &mut errors),
            enabled: true,
            ..Task::default()
        };
        match content.remove(ENABLED_KEY) {
            None => {}
            Some(Value::Bool(enabled)) => task.enabled = enabled,
            Some(_) => errors.push(format!("\"{ENABLED_KEY}\" must be boolean")),
        }

        match content.get_mut(TASK_KEY) {
            Some(Value::Object(inner)) => self.read_task_target(&mut task, inner, &mut errors),
            Some(_) => errors.push(format!("\"{TASK_KEY}\" must be object")),
            None => errors.push(format!("missing \"{TASK_KEY}\" key")),
        }

        task.content = content;
        errors.into_result()?;
        Ok(task)
    }

    /// `configPath`, or `configData` with `componentId`. A disabled task may
    /// carry just `componentId`.
    fn read_task_target(&mut self, task: &mut Task, inner: &mut Content, errors: &mut MultiError) {
        if inner.contains_key(CONFIG_PATH_KEY) {
            match take_string(inner, CONFIG_PATH_KEY) {
                Some(path) if path.is_empty() => {}
                Some(path) => {
                    if let Err(err) = self.link_target(task, &path) {
                        errors.push(err);
                    }
                }
                None => errors.push(format!("\"{TASK_KEY}.{CONFIG_PATH_KEY}\" must be string")),
            }
        } else if inner.contains_key(CONFIG_DATA_KEY) {
            match inner.remove(CONFIG_DATA_KEY) {
                Some(Value::Object(data)) => task.config_data = Some(data),
                _ => errors.push(format!("\"{TASK_KEY}.{CONFIG_DATA_KEY}\" must be object")),
            }
            self.read_component_id(task, inner, errors);
        } else if task.enabled {
            errors.push("task.configPath, or task.configData and task.componentId must be specified");
        } else {
            self.read_component_id(task, inner, errors);
        }
    }

    fn read_component_id(&self, task: &mut Task, inner: &mut Content, errors: &mut MultiError) {
        match take_string(inner, COMPONENT_ID_KEY) {
            Some(id) => task.component_id = id.into(),
            None => errors.push(format!("missing \"{TASK_KEY}.{COMPONENT_ID_KEY}\" key")),
        }
    }

    /// Points the task at the config found at `path`, relative to the branch.
    pub(super) fn link_target(&mut self, task: &mut Task, path: &str) -> Result<(), String> {
        let relative = path.trim_start_matches("./");
        let full = join_path(&self.branch_dir, relative);
        let Some(target) = self
            .state
            .get_by_path(&full)
            .filter(|s| s.has_local_state())
        else {
            return Err(format!("target config \"{full}\" not found"));
        };
        let Key::Config(key) = target.key() else {
            return Err(format!(
                "path \"{full}\" must be config, found \"{}\"",
                target.key().kind().name()
            ));
        };
        task.component_id = key.component_id.clone();
        task.config_id = Some(key.id.clone());
        task.config_path = Some(target.path());
        self.out.targets.push(key.clone());
        Ok(())
    }

    /// Registers a path below the config directory as related.
    pub(super) fn track(&mut self, path: &str) {
        if let Some(relative) = relative_to(path, &self.config_dir) {
            if !self.out.related.iter().any(|p| p == relative) {
                self.out.related.push(relative.to_string());
            }
        }
    }

    pub(super) fn relative<'p>(&self, path: &'p str) -> &'p str {
        relative_to(path, &self.config_dir).unwrap_or(path)
    }

    pub(super) fn fs_error(&self, err: FsError) -> String {
        relative_error(err, &self.config_dir)
    }
}

fn single(message: String) -> MultiError {
    let mut errors = MultiError::new();
    errors.push(message);
    errors
}

fn required_string(content: &mut Content, key: &str, errors: &mut MultiError) -> String {
    match content.remove(key) {
        Some(Value::String(value)) => value,
        Some(_) => {
            errors.push(format!("\"{key}\" must be string"));
            String::new()
        }
        None => {
            errors.push(format!("missing \"{key}\" key"));
            String::new()
        }
    }
}
