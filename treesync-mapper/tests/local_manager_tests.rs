mod common;

use serde_json::json;
use treesync_core::component::{ORCHESTRATOR_COMPONENT_ID, VARIABLES_COMPONENT_ID};
use treesync_core::manifest::MANIFEST_FILE;
use treesync_core::{AbsPath, ConfigKey, Filesystem, Key, Manifest, Relation, RelationType, Side};
use treesync_mapper::WriteResult;

use common::{persisted, Counter, Project};

const TARGET_DIR: &str = "main/extractor/keboola.ex-generic/target";

fn target() -> ConfigKey {
    ConfigKey::new(123, "keboola.ex-generic", "456")
}

fn project() -> Project {
    let mut project = Project::new();
    project.branch(123, "main", "Main");
    project.config(
        &target(),
        "main",
        "extractor/keboola.ex-generic/target",
        "Target",
        json!({"parameters": {"id": 1}}),
    );
    project
}

fn local_name(project: &Project, key: &ConfigKey) -> Option<String> {
    project
        .state
        .get(&Key::Config(key.clone()))
        .and_then(|s| s.get(Side::Local))
        .map(|o| o.name().to_string())
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

#[test]
fn missing_directory_is_reported() {
    let mut project = project();
    let ghost = ConfigKey::new(123, "keboola.ex-generic", "404");
    project.record(Key::Config(ghost.clone()), AbsPath::new("main", "extractor/keboola.ex-generic/ghost"));

    let report = project.load();
    assert_eq!(
        report.errors.to_string(),
        r#"config "main/extractor/keboola.ex-generic/ghost" not found"#
    );
    let state = project.state.get(&Key::Config(ghost)).unwrap();
    assert!(state.record.state.not_found);
    assert!(!state.has_local_state());
    assert_eq!(local_name(&project, &target()).as_deref(), Some("Target"));
}

#[test]
fn broken_meta_file_marks_object_invalid() {
    let mut project = project();
    project
        .fs
        .write_file(&format!("{TARGET_DIR}/meta.json"), r#"{"name": 5}"#)
        .unwrap();

    let report = project.load();
    let errors = report.errors.to_string();
    assert!(
        errors.starts_with(&format!("invalid config \"{TARGET_DIR}\":")),
        "{errors}"
    );
    let state = project.state.get(&Key::Config(target())).unwrap();
    assert!(state.record.state.invalid);
    assert!(!state.has_local_state());
}

#[test]
fn manifest_relations_are_mirrored_on_load() {
    let mut project = project();
    let variables = ConfigKey::new(123, VARIABLES_COMPONENT_ID, "900");
    project.config(&variables, TARGET_DIR, "variables", "Variables", json!({}));
    let mut record = persisted(Key::Config(variables), AbsPath::new(TARGET_DIR, "variables"));
    record.relations.add(Relation::VariablesFor {
        component_id: "keboola.ex-generic".into(),
        config_id: "456".into(),
    });
    project.manifest.set_record(record);

    let orphan = ConfigKey::new(123, VARIABLES_COMPONENT_ID, "901");
    project.config(&orphan, "main", "orphan-variables", "Orphan", json!({}));
    let mut record = persisted(Key::Config(orphan), AbsPath::new("main", "orphan-variables"));
    record.relations.add(Relation::VariablesFor {
        component_id: "keboola.ex-generic".into(),
        config_id: "999".into(),
    });
    project.manifest.set_record(record);

    let report = project.load();
    assert!(report.errors.is_empty(), "{}", report.errors);

    let relations = project
        .state
        .get(&Key::Config(target()))
        .and_then(|s| s.get(Side::Local))
        .and_then(|o| o.relations())
        .unwrap();
    assert_eq!(
        relations.of_type(RelationType::VariablesFrom),
        vec![&Relation::VariablesFrom {
            variables_id: "900".into()
        }]
    );
    assert_eq!(
        report.warnings,
        vec![
            "config \"branch:123/component:keboola.ex-generic/config:999\" not found, \
             referenced from config \"branch:123/component:keboola.variables/config:901\", \
             by relation \"variablesFor\""
        ]
    );
}

// ---------------------------------------------------------------------------
// Save
// ---------------------------------------------------------------------------

#[test]
fn dry_run_save_writes_nothing() {
    let mut project = project();
    project.load();
    let key = Key::Config(target());
    if let Some(config) = project
        .state
        .get_mut(&key)
        .and_then(|s| s.get_mut(Side::Local))
        .and_then(|o| o.as_config_mut())
    {
        config.description = "Loads the orders.".into();
    }
    let before = project.read(&format!("{TARGET_DIR}/description.md"));

    let outcome = project.save_all(true);
    assert_eq!(
        outcome
            .writes
            .iter()
            .filter(|w| w.is_change())
            .cloned()
            .collect::<Vec<_>>(),
        vec![WriteResult::WouldWrite {
            path: format!("{TARGET_DIR}/description.md")
        }]
    );
    assert_eq!(project.read(&format!("{TARGET_DIR}/description.md")), before);

    let outcome = project.save_all(false);
    assert!(outcome.writes.contains(&WriteResult::Written {
        path: format!("{TARGET_DIR}/description.md")
    }));
    assert_eq!(
        project.read(&format!("{TARGET_DIR}/description.md")),
        "Loads the orders.\n"
    );
}

#[test]
fn save_manifest_round_trips_records() {
    let mut project = project();
    project.load();
    let manager = treesync_mapper::LocalManager::new(&project.fs, &project.pipeline, &project.naming);
    manager
        .save_manifest(&project.state, &mut project.manifest, false)
        .unwrap();
    assert!(project.fs.is_file(MANIFEST_FILE));

    let loaded = Manifest::load(&project.fs).unwrap();
    assert_eq!(loaded.len(), 2);
    let record = loaded.get(&Key::Config(target())).unwrap();
    assert_eq!(record.path(), TARGET_DIR);
    assert!(record.state.persisted);
}

// ---------------------------------------------------------------------------
// Persist
// ---------------------------------------------------------------------------

#[test]
fn new_config_directory_is_persisted() {
    let mut project = project();
    let dir = "main/extractor/keboola.ex-generic/new-config";
    project.write_json(&format!("{dir}/meta.json"), json!({"name": "New Config"}));
    project.write_json(&format!("{dir}/config.json"), json!({"parameters": {}}));
    // not an object: no meta.json
    project.fs.create_dir("main/extractor/keboola.ex-generic/notes");
    project.load();

    let manager = treesync_mapper::LocalManager::new(&project.fs, &project.pipeline, &project.naming);
    assert_eq!(manager.find_new_objects(&project.state), vec![dir.to_string()]);

    let report = project.persist(&mut Counter::default());
    assert!(report.errors.is_empty(), "{}", report.errors);

    let key = ConfigKey::new(123, "keboola.ex-generic", "1001");
    let state = project.state.get(&Key::Config(key.clone())).unwrap();
    assert!(state.record.state.persisted);
    assert_eq!(state.path(), dir);
    assert_eq!(local_name(&project, &key).as_deref(), Some("New Config"));
    assert_eq!(
        project.state.untracked_paths(),
        vec!["main/extractor/keboola.ex-generic/notes".to_string()]
    );
}

#[test]
fn new_variables_directory_gets_relation_to_parent() {
    let mut project = project();
    let dir = format!("{TARGET_DIR}/variables");
    project.write_json(&format!("{dir}/meta.json"), json!({"name": "Variables"}));
    project.write_json(&format!("{dir}/config.json"), json!({}));
    project.load();

    let report = project.persist(&mut Counter::default());
    assert!(report.errors.is_empty(), "{}", report.errors);

    let variables = Key::Config(ConfigKey::new(123, VARIABLES_COMPONENT_ID, "1001"));
    let record = &project.state.get(&variables).unwrap().record;
    assert_eq!(
        record.relations.iter().collect::<Vec<_>>(),
        vec![&Relation::VariablesFor {
            component_id: "keboola.ex-generic".into(),
            config_id: "456".into(),
        }]
    );
    let target_relations = project
        .state
        .get(&Key::Config(target()))
        .and_then(|s| s.get(Side::Local))
        .and_then(|o| o.relations())
        .unwrap();
    assert!(target_relations.has_type(RelationType::VariablesFrom));
}

// ---------------------------------------------------------------------------
// Rename
// ---------------------------------------------------------------------------

fn project_with_orchestrator() -> Project {
    let mut project = project();
    let orchestrator = ConfigKey::new(123, ORCHESTRATOR_COMPONENT_ID, "1");
    project.config(
        &orchestrator,
        "main",
        "other/keboola.orchestrator/orchestrator",
        "Orchestrator",
        json!({}),
    );
    let phase = "main/other/keboola.orchestrator/orchestrator/phases/001-phase";
    project.write_json(&format!("{phase}/phase.json"), json!({"name": "Phase", "dependsOn": []}));
    project.write_json(
        &format!("{phase}/001-task/task.json"),
        json!({
            "name": "Task",
            "enabled": true,
            "task": {"configPath": "extractor/keboola.ex-generic/target", "mode": "run"}
        }),
    );
    project
}

#[test]
fn rename_moves_directory_and_updates_references() {
    let mut project = project_with_orchestrator();
    project.write_json(
        &format!("{TARGET_DIR}/meta.json"),
        json!({"name": "Orders Source", "isDisabled": false}),
    );
    let report = project.load();
    assert!(report.errors.is_empty(), "{}", report.errors);

    let outcome = project.rename(false);
    assert!(outcome.report.errors.is_empty(), "{}", outcome.report.errors);
    let new_dir = "main/extractor/keboola.ex-generic/orders-source";
    assert_eq!(
        outcome.actions.iter().map(|a| a.to_string()).collect::<Vec<_>>(),
        vec![format!("{TARGET_DIR} -> {new_dir}")]
    );

    assert!(!project.fs.exists(TARGET_DIR));
    assert!(project.fs.is_file(&format!("{new_dir}/config.json")));
    assert_eq!(project.state.get(&Key::Config(target())).unwrap().path(), new_dir);

    let task_file = "main/other/keboola.orchestrator/orchestrator/phases/001-phase/001-task/task.json";
    assert!(outcome.writes.contains(&WriteResult::Written {
        path: task_file.to_string()
    }));
    assert!(project
        .read(task_file)
        .contains(r#""configPath": "extractor/keboola.ex-generic/orders-source""#));

    let manifest = Manifest::load(&project.fs).unwrap();
    assert_eq!(manifest.get(&Key::Config(target())).unwrap().path(), new_dir);
}

#[test]
fn dry_run_rename_keeps_everything_in_place() {
    let mut project = project_with_orchestrator();
    project.write_json(
        &format!("{TARGET_DIR}/meta.json"),
        json!({"name": "Orders Source", "isDisabled": false}),
    );
    project.load();

    let outcome = project.rename(true);
    assert_eq!(outcome.actions.len(), 1);
    assert!(outcome.writes.is_empty());
    assert!(project.fs.is_dir(TARGET_DIR));
    assert!(!project.fs.is_file(MANIFEST_FILE));
    assert_eq!(
        project.naming.registry().key_by_path(TARGET_DIR),
        Some(Key::Config(target()))
    );
}

#[test]
fn rename_without_changes_is_a_no_op() {
    let mut project = project_with_orchestrator();
    project.load();
    let outcome = project.rename(false);
    assert!(outcome.actions.is_empty());
    assert!(outcome.writes.is_empty());
    assert!(!project.fs.is_file(MANIFEST_FILE));
}
