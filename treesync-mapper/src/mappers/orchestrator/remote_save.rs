//! Writes an orchestration back into the flat API form.
//!
//! Ids are positional: phase `n` gets id `n`, task `m` of phase `n` gets
//! `n * 1000 + m` (both 1-based), so unchanged orchestrations produce
//! unchanged content.

use serde_json::{json, Value};
use treesync_core::orchestration::{Orchestration, Phase, Task};
use treesync_core::Content;

use super::{
    COMPONENT_ID_KEY, CONFIG_DATA_KEY, CONFIG_ID_KEY, DEPENDS_ON_KEY, ENABLED_KEY, ID_KEY,
    NAME_KEY, PHASES_KEY, PHASE_KEY, TASKS_KEY, TASK_KEY,
};

pub(super) fn write(orchestration: &Orchestration, content: &mut Content) {
    let phases = orchestration.phases.iter().map(phase_json).collect();
    let tasks = orchestration
        .phases
        .iter()
        .flat_map(|phase| {
            phase
                .tasks
                .iter()
                .enumerate()
                .map(move |(index, task)| task_json(phase, index, task))
        })
        .collect();
    content.insert(PHASES_KEY.to_string(), Value::Array(phases));
    content.insert(TASKS_KEY.to_string(), Value::Array(tasks));
}

fn phase_id(phase_index: usize) -> u64 {
    phase_index as u64 + 1
}

fn phase_json(phase: &Phase) -> Value {
    let mut out = Content::new();
    out.insert(ID_KEY.to_string(), json!(phase_id(phase.key.index)));
    out.insert(NAME_KEY.to_string(), Value::String(phase.name.clone()));
    out.insert(
        DEPENDS_ON_KEY.to_string(),
        phase
            .depends_on
            .iter()
            .map(|dep| json!(phase_id(dep.index)))
            .collect(),
    );
    extend_missing(&mut out, &phase.content);
    Value::Object(out)
}

fn task_json(phase: &Phase, index: usize, task: &Task) -> Value {
    let id = phase_id(phase.key.index) * 1000 + index as u64 + 1;

    let mut inner = Content::new();
    inner.insert(
        COMPONENT_ID_KEY.to_string(),
        Value::String(task.component_id.to_string()),
    );
    if let Some(config_id) = &task.config_id {
        inner.insert(CONFIG_ID_KEY.to_string(), Value::String(config_id.to_string()));
    } else if let Some(data) = &task.config_data {
        inner.insert(CONFIG_DATA_KEY.to_string(), Value::Object(data.clone()));
    }
    if let Some(Value::Object(rest)) = task.content.get(TASK_KEY) {
        extend_missing(&mut inner, rest);
    }

    let mut out = Content::new();
    out.insert(ID_KEY.to_string(), json!(id));
    out.insert(NAME_KEY.to_string(), Value::String(task.name.clone()));
    out.insert(PHASE_KEY.to_string(), json!(phase_id(phase.key.index)));
    out.insert(TASK_KEY.to_string(), Value::Object(inner));
    out.insert(ENABLED_KEY.to_string(), Value::Bool(task.enabled));
    extend_missing(&mut out, &task.content);
    Value::Object(out)
}

fn extend_missing(out: &mut Content, rest: &Content) {
    for (key, value) in rest {
        if !out.contains_key(key) {
            out.insert(key.clone(), value.clone());
        }
    }
}
