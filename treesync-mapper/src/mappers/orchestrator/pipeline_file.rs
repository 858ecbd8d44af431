//! `pipeline.yml`: a single-file form of an orchestration.
//!
//! ```yaml
//! version: 2
//! name: Daily load
//! phases:
//!   - name: Extract
//!     tasks:
//!       - name: Orders
//!         component: keboola.ex-db-mysql
//!         config: extractor/keboola.ex-db-mysql/orders
//!   - name: Transform
//!     dependsOn: [Extract]
//!     tasks:
//!       - name: Clean
//!         component: keboola.snowflake-transformation
//!         config: transformation/keboola.snowflake-transformation/clean
//!         continueOnFailure: true
//! ```
//!
//! The file is read only. On the next save the orchestration is written as
//! the `phases/` tree and `pipeline.yml` is removed as a stale file.

use serde::Deserialize;
use serde_json::Value;
use treesync_core::fs::read_yaml;
use treesync_core::orchestration::{Orchestration, Phase, Task};
use treesync_core::{Content, MultiError, PhaseKey, TaskKey};

use super::local_load::PhasesReader;
use super::sorter::PhasesSorter;

const DESCRIPTION_KEY: &str = "description";
const CONTINUE_ON_FAILURE_KEY: &str = "continueOnFailure";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PipelineFile {
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    disabled: bool,
    #[serde(default)]
    phases: Vec<PhaseEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PhaseEntry {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    depends_on: Vec<String>,
    #[serde(default)]
    tasks: Vec<TaskEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskEntry {
    name: String,
    #[serde(default)]
    component: String,
    #[serde(default)]
    config: String,
    enabled: Option<bool>,
    #[serde(default)]
    continue_on_failure: bool,
    parameters: Option<Content>,
}

/// Config metadata carried by `pipeline.yml`; it overrides `meta.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(super) struct PipelineMetadata {
    pub name: Option<String>,
    pub description: Option<String>,
    pub disabled: bool,
}

impl PhasesReader<'_> {
    pub(super) fn read_pipeline_file(&mut self, path: &str) {
        self.track(path);
        let file: PipelineFile = match read_yaml(self.fs, path, "orchestration pipeline") {
            Ok(file) => file,
            Err(err) => {
                let err = self.fs_error(err);
                self.out.errors.push(err);
                return;
            }
        };

        self.out.metadata = Some(PipelineMetadata {
            name: Some(file.name).filter(|n| !n.is_empty()),
            description: Some(file.description).filter(|d| !d.is_empty()),
            disabled: file.disabled,
        });

        let mut sorter = PhasesSorter::new(self.config.clone());
        for (index, entry) in file.phases.into_iter().enumerate() {
            let key = PhaseKey::new(&self.config, index);
            let mut phase = Phase {
                key: key.clone(),
                name: entry.name.clone(),
                ..Phase::default()
            };
            if !entry.description.is_empty() {
                phase
                    .content
                    .insert(DESCRIPTION_KEY.to_string(), Value::String(entry.description));
            }

            let mut errors = MultiError::new();
            for (index, task_entry) in entry.tasks.into_iter().enumerate() {
                let key = TaskKey {
                    phase: key.clone(),
                    index,
                };
                let task_name = task_entry.name.clone();
                match self.pipeline_task(key, task_entry) {
                    Ok(task) => phase.tasks.push(task),
                    Err(err) => {
                        let mut causes = MultiError::new();
                        causes.push(err);
                        errors.push_prefixed(format!("invalid task \"{task_name}\""), causes);
                    }
                }
            }
            self.out
                .errors
                .push_prefixed(format!("invalid phase \"{}\"", entry.name), errors);
            sorter.add(entry.name, phase, entry.depends_on);
        }

        let sorted = sorter.sort();
        self.out.errors.extend(sorted.errors);
        self.out.orchestration = Orchestration {
            phases: sorted.phases,
        };
    }

    fn pipeline_task(&mut self, key: TaskKey, entry: TaskEntry) -> Result<Task, String> {
        let mut task = Task {
            key,
            name: entry.name,
            enabled: entry.enabled.unwrap_or(true),
            component_id: entry.component.into(),
            config_data: entry.parameters,
            ..Task::default()
        };
        task.content.insert(
            CONTINUE_ON_FAILURE_KEY.to_string(),
            Value::Bool(entry.continue_on_failure),
        );
        if !entry.config.is_empty() {
            self.link_target(&mut task, &entry.config)?;
        }
        Ok(task)
    }
}
