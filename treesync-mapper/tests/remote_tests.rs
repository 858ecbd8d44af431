mod common;

use std::cell::RefCell;

use serde_json::json;
use treesync_core::{
    AbsPath, Branch, BranchKey, Component, Config, ConfigKey, ConfigRow, ConfigRowKey, Content,
    Filesystem, Key, Object, ObjectState, Record, Side,
};
use treesync_mapper::{ApiClient, ConfigWithRows, MapperError, PushAction, RemoteManager};

use common::Project;

/// In-memory API: lists fixed objects and records every write call.
#[derive(Default)]
struct FakeApi {
    branches: Vec<Branch>,
    configs: Vec<ConfigWithRows>,
    fail_on: Option<Key>,
    calls: RefCell<Vec<String>>,
}

impl FakeApi {
    fn record(&self, call: &str, key: Key) -> Result<(), MapperError> {
        if self.fail_on.as_ref() == Some(&key) {
            return Err(MapperError::Api(format!("{call} refused")));
        }
        self.calls.borrow_mut().push(format!("{call} {}", key.desc()));
        Ok(())
    }
}

impl ApiClient for FakeApi {
    fn list_components(&self) -> Result<Vec<treesync_core::Component>, MapperError> {
        Ok(vec![Component::new("keboola.ex-generic", "extractor", "Generic")])
    }

    fn list_branches(&self) -> Result<Vec<Branch>, MapperError> {
        Ok(self.branches.clone())
    }

    fn list_configs(&self, branch: &BranchKey) -> Result<Vec<ConfigWithRows>, MapperError> {
        Ok(self
            .configs
            .iter()
            .filter(|c| c.config.key.branch_id == branch.id)
            .cloned()
            .collect())
    }

    fn create(&self, object: &Object) -> Result<(), MapperError> {
        self.record("create", object.key())
    }

    fn update(&self, object: &Object) -> Result<(), MapperError> {
        self.record("update", object.key())
    }

    fn delete(&self, key: &Key) -> Result<(), MapperError> {
        self.record("delete", key.clone())
    }
}

fn content(value: serde_json::Value) -> Content {
    serde_json::from_value(value).unwrap()
}

fn main_branch() -> Branch {
    Branch {
        key: BranchKey { id: 123.into() },
        name: "Main".into(),
        is_default: true,
        ..Branch::default()
    }
}

fn target_key() -> ConfigKey {
    ConfigKey::new(123, "keboola.ex-generic", "456")
}

fn api() -> FakeApi {
    let mut config = Config::new(target_key(), "Target");
    config.content = content(json!({"parameters": {"id": 1}}));
    let mut row = ConfigRow::new(ConfigRowKey::new(&target_key(), "7"), "Row One");
    row.content = content(json!({"parameters": {"table": "orders"}}));
    FakeApi {
        branches: vec![main_branch()],
        configs: vec![ConfigWithRows {
            config,
            rows: vec![row],
        }],
        ..FakeApi::default()
    }
}

// ---------------------------------------------------------------------------
// Pull
// ---------------------------------------------------------------------------

#[test]
fn pull_generates_paths_for_new_objects() {
    let mut project = Project::new();
    let api = api();
    let manager = RemoteManager::new(&api, &project.fs, &project.pipeline, &project.naming);
    let report = manager.pull(&mut project.state).unwrap();
    assert!(report.errors.is_empty(), "{}", report.errors);

    let path_of = |key: Key| project.state.get(&key).map(ObjectState::path);
    assert_eq!(path_of(Key::Branch(main_branch().key)).as_deref(), Some("main"));
    assert_eq!(
        path_of(Key::Config(target_key())).as_deref(),
        Some("main/extractor/keboola.ex-generic/target")
    );
    assert_eq!(
        path_of(Key::ConfigRow(ConfigRowKey::new(&target_key(), "7"))).as_deref(),
        Some("main/extractor/keboola.ex-generic/target/rows/row-one")
    );
    assert_eq!(project.state.components().len(), 1);
}

#[test]
fn pulled_objects_can_be_saved_locally() {
    let mut project = Project::new();
    let api = api();
    let manager = RemoteManager::new(&api, &project.fs, &project.pipeline, &project.naming);
    manager.pull(&mut project.state).unwrap();

    let outcome = project.save_all(false);
    assert!(outcome.report.errors.is_empty(), "{}", outcome.report.errors);
    assert_eq!(
        project.read("main/extractor/keboola.ex-generic/target/rows/row-one/config.json"),
        "{\n  \"parameters\": {\n    \"table\": \"orders\"\n  }\n}\n"
    );
    assert!(project.fs.is_file("main/meta.json"));
}

#[test]
fn objects_gone_from_the_api_are_marked_deleted() {
    let mut project = Project::new();
    let api = api();
    RemoteManager::new(&api, &project.fs, &project.pipeline, &project.naming)
        .pull(&mut project.state)
        .unwrap();

    let emptied = FakeApi {
        branches: vec![main_branch()],
        ..FakeApi::default()
    };
    RemoteManager::new(&emptied, &project.fs, &project.pipeline, &project.naming)
        .pull(&mut project.state)
        .unwrap();

    let config = project.state.get(&Key::Config(target_key())).unwrap();
    assert!(!config.has_remote_state());
    assert!(config.record.state.deleted);
    let branch = project.state.get(&Key::Branch(main_branch().key)).unwrap();
    assert!(branch.has_remote_state());
    assert!(!branch.record.state.deleted);
}

// ---------------------------------------------------------------------------
// Push
// ---------------------------------------------------------------------------

/// Pulls, saves the project, loads it again in a fresh run, pulls again and
/// returns what a dry-run push would send.
fn push_after_round_trip(api: &FakeApi) -> Vec<String> {
    let mut project = Project::new();
    let report = RemoteManager::new(api, &project.fs, &project.pipeline, &project.naming)
        .pull(&mut project.state)
        .unwrap();
    assert!(report.errors.is_empty(), "{}", report.errors);
    let saved = project.save_all(false);
    assert!(saved.report.errors.is_empty(), "{}", saved.report.errors);
    project.save_manifest();

    let mut project = project.reopen();
    let report = project.load();
    assert!(report.errors.is_empty(), "{}", report.errors);
    let manager = RemoteManager::new(api, &project.fs, &project.pipeline, &project.naming);
    let report = manager.pull(&mut project.state).unwrap();
    assert!(report.errors.is_empty(), "{}", report.errors);
    let outcome = manager.push(&mut project.state, true);
    assert!(outcome.report.errors.is_empty(), "{}", outcome.report.errors);
    action_names(&outcome.actions)
}

fn transformation_key() -> ConfigKey {
    ConfigKey::new(123, "keboola.snowflake-transformation", "7")
}

fn transformation_api() -> FakeApi {
    let mut config = Config::new(transformation_key(), "Transform");
    config.content = content(json!({
        "parameters": {
            "blocks": [
                {"name": "Block 1", "phase": "early", "codes": [
                    {"name": "Code A", "script": ["SELECT 1;", "SELECT 2;"]}
                ]},
                {"name": "Block 2", "codes": []}
            ],
            "other": true
        }
    }));
    FakeApi {
        branches: vec![main_branch()],
        configs: vec![ConfigWithRows {
            config,
            rows: Vec::new(),
        }],
        ..FakeApi::default()
    }
}

#[test]
fn unchanged_transformation_is_not_pushed() {
    assert_eq!(push_after_round_trip(&transformation_api()), Vec::<String>::new());
}

#[test]
fn unchanged_shared_code_and_its_user_are_not_pushed() {
    let shared_key = ConfigKey::new(123, "keboola.shared-code", "900");
    let mut shared = Config::new(shared_key.clone(), "Shared");
    shared.content = content(json!({"componentId": "keboola.snowflake-transformation"}));
    let mut row = ConfigRow::new(ConfigRowKey::new(&shared_key, "901"), "Query");
    row.content = content(json!({"code_content": ["SELECT 1;", "SELECT 2;"]}));

    let mut api = transformation_api();
    let user = &mut api.configs[0].config;
    user.content.insert("shared_code_id".into(), json!("900"));
    user.content.insert("shared_code_row_ids".into(), json!(["901"]));
    api.configs.push(ConfigWithRows {
        config: shared,
        rows: vec![row],
    });

    assert_eq!(push_after_round_trip(&api), Vec::<String>::new());
}

#[test]
fn edited_transformation_code_is_pushed() {
    let api = transformation_api();
    let mut project = Project::new();
    RemoteManager::new(&api, &project.fs, &project.pipeline, &project.naming)
        .pull(&mut project.state)
        .unwrap();
    project.save_all(false);
    project.save_manifest();

    let mut project = project.reopen();
    project
        .fs
        .write_file(
            "main/transformation/keboola.snowflake-transformation/transform/blocks/001-block-1/001-code-a/code.sql",
            "SELECT 3;\n",
        )
        .unwrap();
    project.load();
    let manager = RemoteManager::new(&api, &project.fs, &project.pipeline, &project.naming);
    manager.pull(&mut project.state).unwrap();
    let outcome = manager.push(&mut project.state, true);

    assert_eq!(
        action_names(&outcome.actions),
        vec!["update config \"branch:123/component:keboola.snowflake-transformation/config:7\""]
    );
    let PushAction::Update(Object::Config(config)) = &outcome.actions[0] else {
        panic!("expected a config update");
    };
    assert_eq!(
        config.content["parameters"]["blocks"][0]["codes"][0]["script"],
        json!(["SELECT 3;"])
    );
    assert_eq!(config.content["parameters"]["blocks"][0]["phase"], json!("early"));
}

fn put(project: &mut Project, local: Option<Object>, remote: Option<Object>, path: AbsPath) {
    let key = local.as_ref().or(remote.as_ref()).unwrap().key();
    let mut state = ObjectState::new(Record::new(key, path));
    state.set(Side::Local, local);
    state.set(Side::Remote, remote);
    project.state.set(state).unwrap();
}

/// Branch in sync, one changed config, one new config and one config with
/// a row that only exist remotely.
fn push_project() -> Project {
    let mut project = Project::new();
    put(
        &mut project,
        Some(main_branch().into()),
        Some(main_branch().into()),
        AbsPath::new("", "main"),
    );

    let changed = Config::new(target_key(), "Target");
    let mut edited = changed.clone();
    edited.description = "edited".into();
    put(
        &mut project,
        Some(edited.into()),
        Some(changed.into()),
        AbsPath::new("main", "extractor/keboola.ex-generic/target"),
    );

    let created = Config::new(ConfigKey::new(123, "keboola.ex-generic", "500"), "Created");
    put(
        &mut project,
        Some(created.into()),
        None,
        AbsPath::new("main", "extractor/keboola.ex-generic/created"),
    );

    let gone_key = ConfigKey::new(123, "keboola.ex-generic", "600");
    put(
        &mut project,
        None,
        Some(Config::new(gone_key.clone(), "Gone").into()),
        AbsPath::new("main", "extractor/keboola.ex-generic/gone"),
    );
    put(
        &mut project,
        None,
        Some(ConfigRow::new(ConfigRowKey::new(&gone_key, "1"), "Row").into()),
        AbsPath::new("main/extractor/keboola.ex-generic/gone", "rows/row"),
    );
    project
}

fn action_names(actions: &[PushAction]) -> Vec<String> {
    actions
        .iter()
        .map(|action| {
            let verb = match action {
                PushAction::Create(_) => "create",
                PushAction::Update(_) => "update",
                PushAction::Delete(_) => "delete",
            };
            format!("{verb} {}", action.key().desc())
        })
        .collect()
}

#[test]
fn dry_run_push_lists_actions_without_calls() {
    let mut project = push_project();
    let api = FakeApi::default();
    let outcome = RemoteManager::new(&api, &project.fs, &project.pipeline, &project.naming)
        .push(&mut project.state, true);

    assert!(outcome.report.errors.is_empty(), "{}", outcome.report.errors);
    assert_eq!(
        action_names(&outcome.actions),
        vec![
            "create config \"branch:123/component:keboola.ex-generic/config:500\"",
            "update config \"branch:123/component:keboola.ex-generic/config:456\"",
            "delete config row \"branch:123/component:keboola.ex-generic/config:600/row:1\"",
            "delete config \"branch:123/component:keboola.ex-generic/config:600\"",
        ]
    );
    assert!(api.calls.borrow().is_empty());
}

#[test]
fn push_sends_actions_and_syncs_remote_side() {
    let mut project = push_project();
    let api = FakeApi::default();
    let outcome = RemoteManager::new(&api, &project.fs, &project.pipeline, &project.naming)
        .push(&mut project.state, false);

    assert!(outcome.report.errors.is_empty(), "{}", outcome.report.errors);
    assert_eq!(*api.calls.borrow(), action_names(&outcome.actions));

    let created = project
        .state
        .get(&Key::Config(ConfigKey::new(123, "keboola.ex-generic", "500")))
        .unwrap();
    assert_eq!(created.remote, created.local);
    let gone = project
        .state
        .get(&Key::Config(ConfigKey::new(123, "keboola.ex-generic", "600")))
        .unwrap();
    assert!(!gone.has_remote_state());
    assert!(gone.record.state.deleted);
}

#[test]
fn failed_call_is_reported_and_others_continue() {
    let mut project = push_project();
    let api = FakeApi {
        fail_on: Some(Key::Config(target_key())),
        ..FakeApi::default()
    };
    let outcome = RemoteManager::new(&api, &project.fs, &project.pipeline, &project.naming)
        .push(&mut project.state, false);

    assert_eq!(
        outcome.report.errors.to_string(),
        "cannot push config \"branch:123/component:keboola.ex-generic/config:456\":\n\
         - remote API error: update refused"
    );
    assert_eq!(api.calls.borrow().len(), 3);
    let target = project.state.get(&Key::Config(target_key())).unwrap();
    assert_ne!(target.remote, target.local);
}
