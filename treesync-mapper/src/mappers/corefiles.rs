//! Core files of every object: `meta.json`, `config.json`, `description.md`.

use std::sync::Arc;

use serde_json::Value;
use treesync_core::fs::read_json_map;
use treesync_core::naming::generator::{CONFIG_FILE, DESCRIPTION_FILE, META_FILE};
use treesync_core::{Content, Object};

use crate::error::MapperError;
use crate::pipeline::{LocalLoader, LocalSaver, Mapper};
use crate::recipe::{LocalLoadRecipe, LocalSaveRecipe};

const NAME_KEY: &str = "name";
const IS_DEFAULT_KEY: &str = "isDefault";
const IS_DISABLED_KEY: &str = "isDisabled";

pub struct CoreFilesMapper;

impl Mapper for CoreFilesMapper {
    fn name(&self) -> &'static str {
        "corefiles"
    }

    fn local_loader(self: Arc<Self>) -> Option<Arc<dyn LocalLoader>> {
        Some(self)
    }

    fn local_saver(self: Arc<Self>) -> Option<Arc<dyn LocalSaver>> {
        Some(self)
    }
}

impl LocalLoader for CoreFilesMapper {
    fn after_local_load(&self, recipe: &mut LocalLoadRecipe<'_>) -> Result<(), MapperError> {
        let kind = recipe.object.kind().name();

        let meta_path = recipe.related(META_FILE);
        let meta = read_json_map(recipe.fs, &meta_path, &format!("{kind} metadata file"))?;
        let name = match meta.get(NAME_KEY) {
            Some(Value::String(name)) => name.clone(),
            Some(_) => {
                return Err(MapperError::invalid(format!(
                    "\"{NAME_KEY}\" in \"{meta_path}\" must be a string"
                )))
            }
            None => String::new(),
        };
        let flag = |key: &str| meta.get(key).and_then(Value::as_bool).unwrap_or(false);

        match &mut recipe.object {
            Object::Branch(branch) => {
                branch.name = name;
                branch.is_default = flag(IS_DEFAULT_KEY);
            }
            Object::Config(config) => {
                config.name = name;
                config.is_disabled = flag(IS_DISABLED_KEY);
            }
            Object::ConfigRow(row) => {
                row.name = name;
                row.is_disabled = flag(IS_DISABLED_KEY);
            }
        }

        if let Some(content) = recipe.object.content_mut() {
            let config_path = join_related(&mut recipe.record, CONFIG_FILE);
            *content = read_json_map(recipe.fs, &config_path, "config file")?;
        }

        let description_path = join_related(&mut recipe.record, DESCRIPTION_FILE);
        if recipe.fs.is_file(&description_path) {
            let description = recipe.fs.read_file(&description_path, "description")?;
            recipe
                .object
                .set_description(description.trim_end().to_string());
        }
        Ok(())
    }
}

fn join_related(record: &mut treesync_core::Record, relative: &str) -> String {
    record.add_related_path(relative);
    treesync_core::paths::join_path(&record.path(), relative)
}

impl LocalSaver for CoreFilesMapper {
    fn before_local_save(&self, recipe: &mut LocalSaveRecipe<'_>) -> Result<(), MapperError> {
        let mut meta = Content::new();
        meta.insert(NAME_KEY.to_string(), Value::String(recipe.object.name().to_string()));
        match &recipe.object {
            Object::Branch(branch) => {
                meta.insert(IS_DEFAULT_KEY.to_string(), Value::Bool(branch.is_default));
            }
            Object::Config(config) => {
                meta.insert(IS_DISABLED_KEY.to_string(), Value::Bool(config.is_disabled));
            }
            Object::ConfigRow(row) => {
                meta.insert(IS_DISABLED_KEY.to_string(), Value::Bool(row.is_disabled));
            }
        }
        recipe.meta = meta;
        recipe.record.add_related_path(META_FILE);

        if let Some(content) = recipe.object.content() {
            recipe.config = Some(content.clone());
            recipe.record.add_related_path(CONFIG_FILE);
        }

        recipe.description = Some(recipe.object.description().to_string());
        recipe.record.add_related_path(DESCRIPTION_FILE);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use treesync_core::naming::{Generator, Registry};
    use treesync_core::{
        AbsPath, ComponentsMap, ConfigKey, Filesystem, Key, MemoryFs, Record, SortBy, State,
    };

    use super::*;

    fn load(fs: &MemoryFs, key: Key, path: &str) -> Result<(Record, Object), MapperError> {
        let components = ComponentsMap::new();
        let naming = Generator::new(Default::default(), Arc::new(Registry::new()));
        let mut recipe = LocalLoadRecipe {
            fs,
            components: &components,
            naming: &naming,
            object: Object::empty(&key).unwrap(),
            record: Record::new(key, AbsPath::new("main", path)),
            warnings: Vec::new(),
        };
        CoreFilesMapper.after_local_load(&mut recipe)?;
        Ok((recipe.record, recipe.object))
    }

    #[test]
    fn loads_meta_config_and_description() {
        let fs = MemoryFs::new();
        fs.write_file("main/ex/cfg/meta.json", r#"{"name": "My Config", "isDisabled": true}"#)
            .unwrap();
        fs.write_file("main/ex/cfg/config.json", r#"{"parameters": {"b": 1, "a": 2}}"#)
            .unwrap();
        fs.write_file("main/ex/cfg/description.md", "Hello\n\n").unwrap();

        let key = Key::Config(ConfigKey::new(1, "keboola.ex-db", "1"));
        let (record, object) = load(&fs, key, "ex/cfg").unwrap();
        let config = object.as_config().unwrap();
        assert_eq!(config.name, "My Config");
        assert!(config.is_disabled);
        assert_eq!(config.description, "Hello");
        let keys: Vec<&String> = config.content["parameters"].as_object().unwrap().keys().collect();
        assert_eq!(keys, ["b", "a"]);
        assert_eq!(record.related_paths, vec!["meta.json", "config.json", "description.md"]);
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let fs = MemoryFs::new();
        fs.write_file("main/ex/cfg/meta.json", r#"{"name": "x"}"#).unwrap();
        let key = Key::Config(ConfigKey::new(1, "keboola.ex-db", "1"));
        let err = load(&fs, key, "ex/cfg").unwrap_err();
        assert_eq!(err.to_string(), "missing config file \"main/ex/cfg/config.json\"");
    }

    #[test]
    fn save_writes_meta_before_flags() {
        let fs = MemoryFs::new();
        let state = State::new(Arc::new(Registry::new()), ComponentsMap::new(), SortBy::Id);
        let naming = Generator::new(Default::default(), state.naming_registry().clone());
        let key = ConfigKey::new(1, "keboola.ex-db", "1");
        let mut object = Object::Config(treesync_core::Config::new(key.clone(), "Cfg"));
        object.set_description("About".to_string());
        let mut recipe = LocalSaveRecipe {
            fs: &fs,
            state: &state,
            naming: &naming,
            record: Record::new(Key::Config(key), AbsPath::new("main", "ex/cfg")),
            object,
            meta: Content::new(),
            config: None,
            description: None,
            files: Vec::new(),
            warnings: Vec::new(),
        };
        CoreFilesMapper.before_local_save(&mut recipe).unwrap();
        let files = recipe.into_files().unwrap().files;
        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(
            paths,
            ["main/ex/cfg/meta.json", "main/ex/cfg/config.json", "main/ex/cfg/description.md"]
        );
        assert_eq!(files[0].content, "{\n  \"name\": \"Cfg\",\n  \"isDisabled\": false\n}\n");
        assert_eq!(files[1].content, "{}\n");
        assert_eq!(files[2].content, "About\n");
    }
}
