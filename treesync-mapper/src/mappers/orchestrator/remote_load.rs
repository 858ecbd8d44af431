//! Parses the API form of an orchestration: flat `phases` and `tasks`
//! arrays in the config content, tasks pointing at phases by id.

use serde_json::Value;
use treesync_core::orchestration::{Orchestration, Phase, Task};
use treesync_core::relation::scalar_id;
use treesync_core::{ConfigKey, Content, Key, MultiError, PhaseKey, State};

use super::sorter::PhasesSorter;
use super::{
    COMPONENT_ID_KEY, CONFIG_DATA_KEY, CONFIG_ID_KEY, DEPENDS_ON_KEY, ENABLED_KEY, ID_KEY,
    NAME_KEY, PHASES_KEY, PHASE_KEY, TASKS_KEY, TASK_KEY,
};

#[derive(Debug, Default)]
pub(super) struct RemoteOrchestration {
    pub orchestration: Orchestration,
    /// Configs referenced by tasks.
    pub targets: Vec<ConfigKey>,
    pub errors: MultiError,
}

/// Moves `phases` and `tasks` out of `content`. Invalid items are skipped
/// and reported.
pub(super) fn parse(state: &State, config: &ConfigKey, content: &mut Content) -> RemoteOrchestration {
    let mut out = RemoteOrchestration::default();
    let phases = array(content.remove(PHASES_KEY));
    let tasks = array(content.remove(TASKS_KEY));

    let mut sorter = PhasesSorter::new(config.clone());
    for (index, raw) in phases.into_iter().enumerate() {
        match parse_phase(config, index, raw) {
            Ok((id, phase, depends_on)) => sorter.add(id, phase, depends_on),
            Err(causes) => out
                .errors
                .push_prefixed(format!("invalid phase[{index}]"), causes),
        }
    }

    for (index, raw) in tasks.into_iter().enumerate() {
        let result = parse_task(state, config, raw).and_then(|(phase_id, task, target)| {
            if !sorter.contains(&phase_id) {
                let mut errors = MultiError::new();
                errors.push(format!("phase \"{phase_id}\" not found"));
                return Err(errors);
            }
            sorter.add_task(&phase_id, task);
            Ok(target)
        });
        match result {
            Ok(target) => out.targets.extend(target),
            Err(causes) => out
                .errors
                .push_prefixed(format!("invalid task[{index}]"), causes),
        }
    }

    let sorted = sorter.sort();
    out.errors.extend(sorted.errors);
    out.orchestration = Orchestration {
        phases: sorted.phases,
    };
    out
}

fn array(value: Option<Value>) -> Vec<Value> {
    match value {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

fn object(raw: Value) -> Content {
    match raw {
        Value::Object(map) => map,
        _ => Content::new(),
    }
}

fn parse_phase(
    config: &ConfigKey,
    index: usize,
    raw: Value,
) -> Result<(String, Phase, Vec<String>), MultiError> {
    let mut content = object(raw);
    let mut errors = MultiError::new();

    let id = content.remove(ID_KEY).as_ref().and_then(scalar_id);
    if id.is_none() {
        errors.push(format!("missing \"{ID_KEY}\" key"));
    }
    let name = match content.remove(NAME_KEY) {
        Some(Value::String(name)) => Some(name),
        _ => {
            errors.push(format!("missing \"{NAME_KEY}\" key"));
            None
        }
    };
    let mut depends_on = Vec::new();
    for dep in array(content.remove(DEPENDS_ON_KEY)) {
        match scalar_id(&dep) {
            Some(id) => depends_on.push(id),
            None => {
                errors.push(format!("\"{DEPENDS_ON_KEY}\" must be array of ids, found {dep}"));
                break;
            }
        }
    }

    let (Some(id), Some(name)) = (id, name) else {
        return Err(errors);
    };
    errors.into_result()?;
    let phase = Phase {
        key: PhaseKey::new(config, index),
        name,
        content,
        ..Phase::default()
    };
    Ok((id, phase, depends_on))
}

/// Returns the phase id, the task and its target config.
fn parse_task(
    state: &State,
    config: &ConfigKey,
    raw: Value,
) -> Result<(String, Task, Option<ConfigKey>), MultiError> {
    let mut content = object(raw);
    let mut errors = MultiError::new();

    if content.remove(ID_KEY).is_none() {
        errors.push(format!("missing \"{ID_KEY}\" key"));
    }
    let name = match content.remove(NAME_KEY) {
        Some(Value::String(name)) => name,
        _ => {
            errors.push(format!("missing \"{NAME_KEY}\" key"));
            String::new()
        }
    };
    let phase_id = content.remove(PHASE_KEY).as_ref().and_then(scalar_id);
    if phase_id.is_none() {
        errors.push(format!("missing \"{PHASE_KEY}\" key"));
    }
    let enabled = match content.remove(ENABLED_KEY) {
        Some(Value::Bool(enabled)) => enabled,
        _ => true,
    };

    let mut task = Task {
        name,
        enabled,
        ..Task::default()
    };
    let mut target = None;
    match content.get_mut(TASK_KEY) {
        Some(Value::Object(inner)) => {
            match inner.remove(COMPONENT_ID_KEY).as_ref().and_then(scalar_id) {
                Some(id) => task.component_id = id.into(),
                None => errors.push(format!("missing \"{TASK_KEY}.{COMPONENT_ID_KEY}\" key")),
            }
            if let Some(config_id) = inner.remove(CONFIG_ID_KEY).as_ref().and_then(scalar_id) {
                let key = ConfigKey::new(
                    config.branch_id,
                    task.component_id.clone(),
                    config_id.clone(),
                );
                match state.get(&Key::Config(key.clone())) {
                    Some(object_state) => {
                        task.config_path =
                            Some(object_state.path()).filter(|p| !p.is_empty());
                        target = Some(key);
                    }
                    None => errors.push(format!(
                        "{} not found",
                        Key::Config(key).desc()
                    )),
                }
                task.config_id = Some(config_id.into());
            }
            if let Some(Value::Object(data)) = inner.remove(CONFIG_DATA_KEY) {
                task.config_data = Some(data);
            }
        }
        _ => errors.push(format!("missing \"{TASK_KEY}\" key")),
    }
    task.content = content;

    errors.into_result()?;
    Ok((phase_id.unwrap_or_default(), task, target))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use treesync_core::component::ORCHESTRATOR_COMPONENT_ID;
    use treesync_core::naming::Registry;
    use treesync_core::{AbsPath, ComponentsMap, Config, ObjectState, Record, Side, SortBy};

    use super::*;

    fn orchestrator() -> ConfigKey {
        ConfigKey::new(123, ORCHESTRATOR_COMPONENT_ID, "456")
    }

    fn state_with_targets() -> State {
        let mut state = State::new(Arc::new(Registry::new()), ComponentsMap::new(), SortBy::Id);
        for (id, path) in [("123", "extractor/target-config-1"), ("789", "extractor/target-config-2")] {
            let key = ConfigKey::new(123, "foo.bar1", id);
            let mut object_state =
                ObjectState::new(Record::new(Key::Config(key.clone()), AbsPath::new("branch", path)));
            object_state.set(Side::Remote, Some(Config::new(key, "Target").into()));
            state.set(object_state).unwrap();
        }
        state
    }

    fn content(value: serde_json::Value) -> Content {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn phases_and_tasks_are_moved_out_of_content() {
        let state = state_with_targets();
        let mut content = content(json!({
            "phases": [
                {"id": 2, "name": "Phase 2", "dependsOn": [1], "foo": "bar"},
                {"id": 1, "name": "Phase 1", "dependsOn": []}
            ],
            "tasks": [
                {"id": 1001, "name": "Task 1", "phase": 1, "enabled": false,
                 "task": {"componentId": "foo.bar1", "configId": "123", "mode": "run"},
                 "continueOnFailure": false},
                {"id": 2001, "name": "Task 2", "phase": 2,
                 "task": {"componentId": "foo.bar3", "configData": {"params": "value"}, "mode": "run"}}
            ],
            "other": 1
        }));
        let out = parse(&state, &orchestrator(), &mut content);
        assert!(out.errors.is_empty(), "{}", out.errors);
        assert_eq!(serde_json::Value::Object(content), json!({"other": 1}));

        let phases = &out.orchestration.phases;
        assert_eq!(phases[0].name, "Phase 1");
        assert_eq!(phases[1].name, "Phase 2");
        assert_eq!(phases[1].depends_on, vec![PhaseKey::new(&orchestrator(), 0)]);
        assert_eq!(serde_json::Value::Object(phases[1].content.clone()), json!({"foo": "bar"}));

        let task = &phases[0].tasks[0];
        assert!(!task.enabled);
        assert_eq!(task.key.phase.index, 0);
        assert_eq!(task.config_path.as_deref(), Some("branch/extractor/target-config-1"));
        assert_eq!(
            serde_json::Value::Object(task.content.clone()),
            json!({"task": {"mode": "run"}, "continueOnFailure": false})
        );
        let data_task = &phases[1].tasks[0];
        assert_eq!(data_task.config_id, None);
        assert_eq!(data_task.config_path, None);
        assert_eq!(
            serde_json::Value::Object(data_task.config_data.clone().unwrap()),
            json!({"params": "value"})
        );
        assert_eq!(out.targets, vec![ConfigKey::new(123, "foo.bar1", "123")]);
    }

    #[test]
    fn invalid_items_are_skipped_and_reported() {
        let state = state_with_targets();
        let mut content = content(json!({
            "phases": [
                {"id": 123, "name": "Phase", "dependsOn": []},
                {"id": 456},
                {}
            ],
            "tasks": [
                {"id": 1001, "name": "Task 1", "phase": 123,
                 "task": {"componentId": "foo.bar1", "configId": "123", "mode": "run"}},
                {"id": 1002, "name": "Task 2", "phase": 789,
                 "task": {"componentId": "foo.bar1", "configId": "789", "mode": "run"}},
                {}
            ]
        }));
        let out = parse(&state, &orchestrator(), &mut content);
        assert_eq!(
            out.errors.to_string(),
            "- invalid phase[1]:\n  \
             - missing \"name\" key\n\
             - invalid phase[2]:\n  \
             - missing \"id\" key\n  \
             - missing \"name\" key\n\
             - invalid task[1]:\n  \
             - phase \"789\" not found\n\
             - invalid task[2]:\n  \
             - missing \"id\" key\n  \
             - missing \"name\" key\n  \
             - missing \"phase\" key\n  \
             - missing \"task\" key"
        );
        assert!(content.is_empty());
        assert_eq!(out.orchestration.phases.len(), 1);
        assert_eq!(out.orchestration.phases[0].tasks.len(), 1);
    }

    #[test]
    fn non_scalar_dependency_is_reported() {
        let state = state_with_targets();
        let mut content = content(json!({
            "phases": [
                {"id": 1, "name": "Phase 1", "dependsOn": []},
                {"id": 2, "name": "Phase 2", "dependsOn": [1, {"id": 1}]},
                {"id": 1, "name": "Phase 1 again", "dependsOn": []}
            ]
        }));
        let out = parse(&state, &orchestrator(), &mut content);
        assert_eq!(
            out.errors.to_string(),
            "- invalid phase[1]:\n  \
             - \"dependsOn\" must be array of ids, found {\"id\":1}\n\
             - duplicate phase \"1\", \"Phase 1 again\" ignored"
        );
        let names: Vec<&str> = out.orchestration.phases.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["Phase 1"]);
    }
}
