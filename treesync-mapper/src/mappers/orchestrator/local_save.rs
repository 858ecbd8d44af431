//! Writes an orchestration as the `phases/` tree.

use serde_json::Value;
use treesync_core::naming::generator::{phase_file_path, task_file_path, PHASES_DIR};
use treesync_core::naming::Generator;
use treesync_core::orchestration::{Orchestration, Phase, Task};
use treesync_core::paths::relative_to;
use treesync_core::{ConfigKey, Content, Key, State};

use super::{
    COMPONENT_ID_KEY, CONFIG_DATA_KEY, CONFIG_ID_KEY, CONFIG_PATH_KEY, DEPENDS_ON_KEY,
    ENABLED_KEY, NAME_KEY, TASK_KEY,
};

/// Files and directories of one orchestration, relative to the config
/// directory.
#[derive(Debug, Default)]
pub(super) struct PhasesTree {
    pub dirs: Vec<String>,
    pub files: Vec<(String, Content)>,
    pub warnings: Vec<String>,
}

pub(super) struct PhasesWriter<'a> {
    pub state: &'a State,
    pub naming: &'a Generator,
    pub config: &'a ConfigKey,
    pub config_dir: &'a str,
}

impl PhasesWriter<'_> {
    /// Generates phase and task paths, then renders the files.
    pub fn write(&self, orchestration: &mut Orchestration) -> PhasesTree {
        for phase in &mut orchestration.phases {
            phase.path = self.naming.phase_path(self.config_dir, phase);
            let phase_dir = phase.path.path();
            for task in &mut phase.tasks {
                task.path = self.naming.task_path(&phase_dir, task);
            }
        }

        let dir_names: Vec<&str> = orchestration
            .phases
            .iter()
            .map(|p| p.path.relative_path())
            .collect();
        let branch_dir = self
            .state
            .get(&Key::Branch(self.config.branch_key()))
            .map(|s| s.path())
            .unwrap_or_default();

        let mut tree = PhasesTree {
            dirs: vec![PHASES_DIR.to_string()],
            ..PhasesTree::default()
        };
        for phase in &orchestration.phases {
            let phase_dir = phase.path.path();
            tree.dirs.push(self.relative(&phase_dir));
            tree.files.push((
                self.relative(&phase_file_path(&phase_dir)),
                phase_json(phase, &dir_names),
            ));
            for task in &phase.tasks {
                let task_dir = task.path.path();
                tree.dirs.push(self.relative(&task_dir));
                let content = self.task_json(task, &branch_dir, &mut tree.warnings);
                tree.files
                    .push((self.relative(&task_file_path(&task_dir)), content));
            }
        }
        tree
    }

    fn relative(&self, path: &str) -> String {
        relative_to(path, self.config_dir)
            .unwrap_or(path)
            .to_string()
    }

    fn task_json(&self, task: &Task, branch_dir: &str, warnings: &mut Vec<String>) -> Content {
        let mut inner = Content::new();
        if let Some(config_id) = &task.config_id {
            let target = Key::Config(ConfigKey::new(
                self.config.branch_id,
                task.component_id.clone(),
                config_id.clone(),
            ));
            let target_path = self
                .state
                .get(&target)
                .map(|s| s.path())
                .or_else(|| task.config_path.clone());
            match target_path.as_deref().and_then(|p| relative_to(p, branch_dir)) {
                Some(relative) => {
                    inner.insert(CONFIG_PATH_KEY.to_string(), Value::String(relative.to_string()));
                }
                None => {
                    warnings.push(format!(
                        "{} not found, referenced from task \"{}\"",
                        target.desc(),
                        task.path.path()
                    ));
                    inner.insert(
                        COMPONENT_ID_KEY.to_string(),
                        Value::String(task.component_id.to_string()),
                    );
                    inner.insert(CONFIG_ID_KEY.to_string(), Value::String(config_id.to_string()));
                }
            }
        } else {
            inner.insert(
                COMPONENT_ID_KEY.to_string(),
                Value::String(task.component_id.to_string()),
            );
            if let Some(data) = &task.config_data {
                inner.insert(CONFIG_DATA_KEY.to_string(), Value::Object(data.clone()));
            }
        }
        if let Some(Value::Object(rest)) = task.content.get(TASK_KEY) {
            for (key, value) in rest {
                if !inner.contains_key(key) {
                    inner.insert(key.clone(), value.clone());
                }
            }
        }

        let mut out = Content::new();
        out.insert(NAME_KEY.to_string(), Value::String(task.name.clone()));
        out.insert(ENABLED_KEY.to_string(), Value::Bool(task.enabled));
        out.insert(TASK_KEY.to_string(), Value::Object(inner));
        for (key, value) in &task.content {
            if !out.contains_key(key) {
                out.insert(key.clone(), value.clone());
            }
        }
        out
    }
}

fn phase_json(phase: &Phase, dir_names: &[&str]) -> Content {
    let mut out = Content::new();
    out.insert(NAME_KEY.to_string(), Value::String(phase.name.clone()));
    out.insert(
        DEPENDS_ON_KEY.to_string(),
        phase
            .depends_on
            .iter()
            .filter_map(|dep| dir_names.get(dep.index))
            .map(|name| Value::String(name.to_string()))
            .collect(),
    );
    for (key, value) in &phase.content {
        if !out.contains_key(key) {
            out.insert(key.clone(), value.clone());
        }
    }
    out
}
