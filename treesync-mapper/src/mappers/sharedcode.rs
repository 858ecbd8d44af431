//! Shared code: configs holding reusable code per target component, their
//! code rows, and the link from transformations that use them.
//!
//! Locally a transformation references shared code by path relative to its
//! branch (`shared_code_path`); remotely by id (`shared_code_id`).

use std::sync::Arc;

use serde_json::Value;
use treesync_core::component::SHARED_CODE_COMPONENT_ID;
use treesync_core::naming::generator::{code_file_ext, CODE_FILE_NAME};
use treesync_core::object::{SharedCodeConfig, SharedCodeLink, SharedCodeRow};
use treesync_core::paths::{join_path, relative_to};
use treesync_core::relation::scalar_id;
use treesync_core::{ConfigKey, Content, Key, Object, Side, State};

use crate::error::MapperError;
use crate::mappers::{scripts, take_string};
use crate::pipeline::{
    LocalLoader, LocalSaver, Mapper, OperationListener, RemoteLoader, RemoteSaver,
};
use crate::recipe::{
    Changes, LocalLoadRecipe, LocalSaveRecipe, OperationContext, RemoteLoadRecipe,
    RemoteSaveRecipe,
};

const TARGET_KEY: &str = "componentId";
const CODE_CONTENT_KEY: &str = "code_content";
const SHARED_CODE_ID_KEY: &str = "shared_code_id";
const SHARED_CODE_PATH_KEY: &str = "shared_code_path";
const SHARED_CODE_ROW_IDS_KEY: &str = "shared_code_row_ids";

pub struct SharedCodeMapper;

impl Mapper for SharedCodeMapper {
    fn name(&self) -> &'static str {
        "sharedcode"
    }

    fn local_loader(self: Arc<Self>) -> Option<Arc<dyn LocalLoader>> {
        Some(self)
    }

    fn local_saver(self: Arc<Self>) -> Option<Arc<dyn LocalSaver>> {
        Some(self)
    }

    fn remote_loader(self: Arc<Self>) -> Option<Arc<dyn RemoteLoader>> {
        Some(self)
    }

    fn remote_saver(self: Arc<Self>) -> Option<Arc<dyn RemoteSaver>> {
        Some(self)
    }

    fn operation_listener(self: Arc<Self>) -> Option<Arc<dyn OperationListener>> {
        Some(self)
    }
}

fn is_shared_code(component_id: &str) -> bool {
    component_id == SHARED_CODE_COMPONENT_ID
}

fn take_target(content: &mut Content, owner: &Key) -> Result<SharedCodeConfig, MapperError> {
    take_string(content, TARGET_KEY)
        .filter(|id| !id.is_empty())
        .map(|id| SharedCodeConfig { target: id.into() })
        .ok_or_else(|| {
            MapperError::invalid(format!(
                "missing \"{TARGET_KEY}\" of shared code {}",
                owner.desc()
            ))
        })
}

fn row_ids(value: Option<Value>) -> Vec<treesync_core::RowId> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(scalar_id)
            .map(Into::into)
            .collect(),
        _ => Vec::new(),
    }
}

fn row_ids_value(link: &SharedCodeLink) -> Value {
    Value::Array(
        link.row_ids
            .iter()
            .map(|id| Value::String(id.to_string()))
            .collect(),
    )
}

/// Target component of a shared code config.
fn row_target(state: &State, config: ConfigKey) -> Option<String> {
    let object_state = state.get(&Key::Config(config))?;
    object_state
        .local
        .as_ref()
        .or(object_state.remote.as_ref())?
        .as_config()?
        .shared_code
        .as_ref()
        .map(|s| s.target.to_string())
}

// ---------------------------------------------------------------------------
// Local
// ---------------------------------------------------------------------------

impl LocalLoader for SharedCodeMapper {
    fn after_local_load(&self, recipe: &mut LocalLoadRecipe<'_>) -> Result<(), MapperError> {
        let key = recipe.object.key();
        match &mut recipe.object {
            Object::Config(config) if is_shared_code(config.key.component_id.as_str()) => {
                config.shared_code = Some(take_target(&mut config.content, &key)?);
            }
            Object::ConfigRow(row) if is_shared_code(row.key.component_id.as_str()) => {
                let dir = recipe.record.path();
                let file = recipe
                    .fs
                    .read_files(&dir)?
                    .into_iter()
                    .find(|name| name.starts_with(&format!("{CODE_FILE_NAME}.")))
                    .ok_or_else(|| {
                        MapperError::invalid(format!("missing shared code file in \"{dir}\""))
                    })?;
                recipe.record.add_related_path(file.as_str());
                let code = recipe.fs.read_file(&join_path(&dir, &file), "shared code file")?;
                row.content.remove(CODE_CONTENT_KEY);
                row.shared_code = Some(SharedCodeRow {
                    scripts: scripts::parse(&code, scripts::file_ext(&file)),
                });
            }
            _ => {}
        }
        Ok(())
    }
}

impl LocalSaver for SharedCodeMapper {
    fn before_local_save(&self, recipe: &mut LocalSaveRecipe<'_>) -> Result<(), MapperError> {
        match &recipe.object {
            Object::Config(config) => {
                if let (Some(shared_code), Some(content)) = (&config.shared_code, &mut recipe.config) {
                    content.insert(
                        TARGET_KEY.to_string(),
                        Value::String(shared_code.target.to_string()),
                    );
                }
                if let Some(link) = config.shared_code_link.clone() {
                    let target = ConfigKey {
                        branch_id: config.key.branch_id,
                        component_id: SHARED_CODE_COMPONENT_ID.into(),
                        id: link.config_id.clone(),
                    };
                    let branch_path = recipe
                        .state
                        .get(&Key::Branch(config.key.branch_key()))
                        .map(|s| s.path())
                        .unwrap_or_default();
                    let target_path = recipe
                        .state
                        .get(&Key::Config(target.clone()))
                        .map(|s| s.path())
                        .and_then(|p| relative_to(&p, &branch_path).map(str::to_string));
                    let Some(content) = recipe.config.as_mut() else {
                        return Ok(());
                    };
                    match target_path {
                        Some(path) => {
                            content.insert(SHARED_CODE_PATH_KEY.to_string(), Value::String(path));
                        }
                        None => {
                            recipe.warnings.push(format!(
                                "{} not found, referenced from {}",
                                Key::Config(target).desc(),
                                Key::Config(config.key.clone()).desc()
                            ));
                            content.insert(
                                SHARED_CODE_ID_KEY.to_string(),
                                Value::String(link.config_id.to_string()),
                            );
                        }
                    }
                    content.insert(SHARED_CODE_ROW_IDS_KEY.to_string(), row_ids_value(&link));
                }
            }
            Object::ConfigRow(row) if is_shared_code(row.key.component_id.as_str()) => {
                let target = row_target(recipe.state, row.key.config_key()).unwrap_or_default();
                let file = format!("{CODE_FILE_NAME}.{}", code_file_ext(&target));
                let code = row
                    .shared_code
                    .as_ref()
                    .map(|s| scripts::join(&s.scripts))
                    .unwrap_or_else(|| "\n".to_string());
                if let Some(content) = recipe.config.as_mut() {
                    content.remove(CODE_CONTENT_KEY);
                }
                recipe.add_file(&file, code);
            }
            _ => {}
        }
        Ok(())
    }
}

impl OperationListener for SharedCodeMapper {
    /// Resolves `shared_code_path` of loaded transformations to a link.
    fn after_local_operation(
        &self,
        ctx: &mut OperationContext<'_>,
        changes: &Changes,
    ) -> Result<(), MapperError> {
        for key in changes.loaded.iter().chain(&changes.persisted) {
            let Key::Config(config_key) = key else {
                continue;
            };
            let Some(object_state) = ctx.state.get(key) else {
                continue;
            };
            let Some(config) = object_state.local.as_ref().and_then(Object::as_config) else {
                continue;
            };
            let Some(Value::String(relative)) = config.content.get(SHARED_CODE_PATH_KEY) else {
                continue;
            };

            let branch_path = ctx
                .state
                .get(&Key::Branch(config_key.branch_key()))
                .map(|s| s.path())
                .unwrap_or_default();
            let full_path = join_path(&branch_path, relative);
            let target = ctx
                .state
                .get_by_path(&full_path)
                .filter(|s| matches!(s.key(), Key::Config(k) if is_shared_code(k.component_id.as_str())))
                .map(|s| s.key().clone());
            let Some(Key::Config(target)) = target else {
                ctx.report.error_prefixed(
                    format!("invalid transformation config \"{}\"", object_state.path()),
                    MapperError::invalid(format!("shared code \"{full_path}\" not found")),
                );
                continue;
            };

            let Some(config) = ctx
                .state
                .get_mut(key)
                .and_then(|s| s.get_mut(Side::Local))
                .and_then(Object::as_config_mut)
            else {
                continue;
            };
            config.content.remove(SHARED_CODE_PATH_KEY);
            let row_ids = row_ids(config.content.remove(SHARED_CODE_ROW_IDS_KEY));
            config.shared_code_link = Some(SharedCodeLink {
                config_id: target.id,
                row_ids,
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Remote
// ---------------------------------------------------------------------------

impl RemoteLoader for SharedCodeMapper {
    fn after_remote_load(&self, recipe: &mut RemoteLoadRecipe<'_>) -> Result<(), MapperError> {
        let key = recipe.object.key();
        match &mut recipe.object {
            Object::Config(config) if is_shared_code(config.key.component_id.as_str()) => {
                config.shared_code = Some(take_target(&mut config.content, &key)?);
            }
            Object::Config(config) => {
                if let Some(id) = config.content.remove(SHARED_CODE_ID_KEY).as_ref().and_then(scalar_id) {
                    let row_ids = row_ids(config.content.remove(SHARED_CODE_ROW_IDS_KEY));
                    config.shared_code_link = Some(SharedCodeLink {
                        config_id: id.into(),
                        row_ids,
                    });
                }
            }
            Object::ConfigRow(row) if is_shared_code(row.key.component_id.as_str()) => {
                let scripts = match row.content.remove(CODE_CONTENT_KEY) {
                    Some(Value::Array(items)) => items
                        .into_iter()
                        .filter_map(|v| match v {
                            Value::String(s) => Some(s),
                            _ => None,
                        })
                        .collect(),
                    Some(Value::String(code)) => vec![code],
                    _ => Vec::new(),
                };
                row.shared_code = Some(SharedCodeRow { scripts });
            }
            _ => {}
        }
        Ok(())
    }
}

impl RemoteSaver for SharedCodeMapper {
    fn before_remote_save(&self, recipe: &mut RemoteSaveRecipe<'_>) -> Result<(), MapperError> {
        match &mut recipe.object {
            Object::Config(config) => {
                if let Some(shared_code) = &config.shared_code {
                    config.content.insert(
                        TARGET_KEY.to_string(),
                        Value::String(shared_code.target.to_string()),
                    );
                }
                if let Some(link) = &config.shared_code_link {
                    config.content.insert(
                        SHARED_CODE_ID_KEY.to_string(),
                        Value::String(link.config_id.to_string()),
                    );
                    config
                        .content
                        .insert(SHARED_CODE_ROW_IDS_KEY.to_string(), row_ids_value(link));
                }
            }
            Object::ConfigRow(row) => {
                if let Some(shared_code) = &row.shared_code {
                    let scripts = shared_code
                        .scripts
                        .iter()
                        .map(|s| Value::String(s.clone()))
                        .collect();
                    row.content
                        .insert(CODE_CONTENT_KEY.to_string(), Value::Array(scripts));
                }
            }
            Object::Branch(_) => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use treesync_core::naming::{Generator, Registry};
    use treesync_core::{
        AbsPath, ComponentsMap, Config, ConfigRow, ConfigRowKey, Filesystem, MemoryFs, Record,
    };

    use super::*;

    fn shared_config_key() -> ConfigKey {
        ConfigKey::new(1, SHARED_CODE_COMPONENT_ID, "100")
    }

    #[test]
    fn remote_row_code_content_accepts_string_and_array() {
        let components = ComponentsMap::new();
        let key = ConfigRowKey::new(&shared_config_key(), "1");
        for (content, expected) in [
            (json!({"code_content": ["SELECT 1;", "SELECT 2;"]}), vec!["SELECT 1;", "SELECT 2;"]),
            (json!({"code_content": "SELECT 1;"}), vec!["SELECT 1;"]),
        ] {
            let mut row = ConfigRow::new(key.clone(), "Code");
            row.content = serde_json::from_value(content).unwrap();
            let mut recipe = RemoteLoadRecipe {
                components: &components,
                object: Object::ConfigRow(row),
                warnings: Vec::new(),
            };
            SharedCodeMapper.after_remote_load(&mut recipe).unwrap();
            let row = recipe.object.as_config_row().unwrap();
            assert_eq!(row.shared_code.as_ref().unwrap().scripts, expected);
            assert!(row.content.is_empty());
        }
    }

    #[test]
    fn shared_code_config_requires_target() {
        let components = ComponentsMap::new();
        let mut recipe = RemoteLoadRecipe {
            components: &components,
            object: Object::Config(Config::new(shared_config_key(), "Shared")),
            warnings: Vec::new(),
        };
        let err = SharedCodeMapper.after_remote_load(&mut recipe).unwrap_err();
        assert_eq!(
            err.to_string(),
            "missing \"componentId\" of shared code config \"branch:1/component:keboola.shared-code/config:100\""
        );
    }

    #[test]
    fn local_row_reads_code_file() {
        let fs = MemoryFs::new();
        fs.write_file("main/_shared/x/codes/c/code.sql", "SELECT 1;\nSELECT 2;\n")
            .unwrap();
        let components = ComponentsMap::new();
        let naming = Generator::new(Default::default(), Arc::new(Registry::new()));
        let key = Key::ConfigRow(ConfigRowKey::new(&shared_config_key(), "1"));
        let mut recipe = LocalLoadRecipe {
            fs: &fs,
            components: &components,
            naming: &naming,
            object: Object::empty(&key).unwrap(),
            record: Record::new(key, AbsPath::new("main/_shared/x", "codes/c")),
            warnings: Vec::new(),
        };
        SharedCodeMapper.after_local_load(&mut recipe).unwrap();
        let row = recipe.object.as_config_row().unwrap();
        assert_eq!(row.shared_code.as_ref().unwrap().scripts, vec!["SELECT 1;", "SELECT 2;"]);
        assert_eq!(recipe.record.related_paths, vec!["code.sql"]);
    }
}
