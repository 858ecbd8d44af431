//! Transformation blocks and codes.
//!
//! Remotely they live in `parameters.blocks`; locally in a `blocks/` tree:
//!
//! ```text
//! blocks/001-block-name/meta.json
//! blocks/001-block-name/001-code-name/meta.json
//! blocks/001-block-name/001-code-name/code.sql
//! ```

use std::sync::Arc;

use serde_json::Value;
use treesync_core::fs::{read_json_map, to_json_string};
use treesync_core::naming::generator::{code_file_name, BLOCKS_DIR, CODE_FILE_NAME, META_FILE};
use treesync_core::orchestration::{Block, Code, Transformation};
use treesync_core::paths::{join_path, relative_to};
use treesync_core::{AbsPath, BlockKey, CodeKey, Config, Content, Filesystem, Object};

use crate::error::MapperError;
use crate::mappers::{scripts, take_string};
use crate::pipeline::{LocalLoader, LocalSaver, Mapper, RemoteLoader, RemoteSaver};
use crate::recipe::{LocalLoadRecipe, LocalSaveRecipe, RemoteLoadRecipe, RemoteSaveRecipe};

const PARAMETERS_KEY: &str = "parameters";
const BLOCKS_KEY: &str = "blocks";
const CODES_KEY: &str = "codes";
const NAME_KEY: &str = "name";
const SCRIPT_KEY: &str = "script";

pub struct TransformationMapper;

impl Mapper for TransformationMapper {
    fn name(&self) -> &'static str {
        "transformation"
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
}

/// Removes `name` and returns it; the rest of the map is extra content.
fn take_name(value: &mut Content) -> String {
    take_string(value, NAME_KEY).unwrap_or_default()
}

/// `meta.json` of a block or code: its name, then the extra content.
fn meta_of(name: &str, content: &Content) -> Content {
    let mut meta = Content::new();
    meta.insert(NAME_KEY.to_string(), Value::String(name.to_string()));
    meta.extend(content.clone());
    meta
}

// ---------------------------------------------------------------------------
// Remote
// ---------------------------------------------------------------------------

fn blocks_from_api(config: &mut Config) -> Transformation {
    let raw = match config.content.get_mut(PARAMETERS_KEY) {
        Some(Value::Object(parameters)) => parameters.remove(BLOCKS_KEY),
        _ => None,
    };
    let Some(Value::Array(raw)) = raw else {
        return Transformation::default();
    };

    let blocks = raw
        .into_iter()
        .filter_map(|value| match value {
            Value::Object(block) => Some(block),
            _ => None,
        })
        .enumerate()
        .map(|(index, mut block)| {
            let key = BlockKey::new(&config.key, index);
            let name = take_name(&mut block);
            let codes = match block.remove(CODES_KEY) {
                Some(Value::Array(codes)) => codes,
                _ => Vec::new(),
            };
            let codes = codes
                .into_iter()
                .filter_map(|value| match value {
                    Value::Object(code) => Some(code),
                    _ => None,
                })
                .enumerate()
                .map(|(index, mut code)| Code {
                    key: CodeKey {
                        block: key.clone(),
                        index,
                    },
                    name: take_name(&mut code),
                    scripts: match code.remove(SCRIPT_KEY) {
                        Some(Value::Array(items)) => items
                            .into_iter()
                            .filter_map(|item| match item {
                                Value::String(script) => Some(script),
                                _ => None,
                            })
                            .collect(),
                        Some(Value::String(script)) => vec![script],
                        _ => Vec::new(),
                    },
                    content: code,
                    ..Code::default()
                })
                .collect();
            Block {
                key,
                name,
                codes,
                content: block,
                ..Block::default()
            }
        })
        .collect();
    Transformation { blocks }
}

fn blocks_to_api(transformation: &Transformation) -> Value {
    let blocks = transformation
        .blocks
        .iter()
        .map(|block| {
            let codes: Vec<Value> = block
                .codes
                .iter()
                .map(|code| {
                    let mut out = Content::new();
                    out.insert(NAME_KEY.to_string(), Value::String(code.name.clone()));
                    out.insert(
                        SCRIPT_KEY.to_string(),
                        Value::Array(code.scripts.iter().cloned().map(Value::String).collect()),
                    );
                    out.extend(code.content.clone());
                    Value::Object(out)
                })
                .collect();
            let mut out = Content::new();
            out.insert(NAME_KEY.to_string(), Value::String(block.name.clone()));
            out.insert(CODES_KEY.to_string(), Value::Array(codes));
            out.extend(block.content.clone());
            Value::Object(out)
        })
        .collect();
    Value::Array(blocks)
}

fn transformation_config<'a>(
    object: &'a mut Object,
    components: &treesync_core::ComponentsMap,
) -> Option<&'a mut Config> {
    match object {
        Object::Config(config)
            if components
                .get_or_infer(&config.key.component_id)
                .is_transformation() =>
        {
            Some(config)
        }
        _ => None,
    }
}

impl RemoteLoader for TransformationMapper {
    fn after_remote_load(&self, recipe: &mut RemoteLoadRecipe<'_>) -> Result<(), MapperError> {
        if let Some(config) = transformation_config(&mut recipe.object, recipe.components) {
            config.transformation = Some(blocks_from_api(config));
        }
        Ok(())
    }
}

impl RemoteSaver for TransformationMapper {
    fn before_remote_save(&self, recipe: &mut RemoteSaveRecipe<'_>) -> Result<(), MapperError> {
        let Object::Config(config) = &mut recipe.object else {
            return Ok(());
        };
        let Some(transformation) = &config.transformation else {
            return Ok(());
        };
        let blocks = blocks_to_api(transformation);
        let parameters = config
            .content
            .entry(PARAMETERS_KEY)
            .or_insert_with(|| Value::Object(Content::new()));
        if !parameters.is_object() {
            *parameters = Value::Object(Content::new());
        }
        if let Value::Object(parameters) = parameters {
            parameters.insert(BLOCKS_KEY.to_string(), blocks);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Local
// ---------------------------------------------------------------------------

impl LocalLoader for TransformationMapper {
    fn after_local_load(&self, recipe: &mut LocalLoadRecipe<'_>) -> Result<(), MapperError> {
        let Some(config) = transformation_config(&mut recipe.object, recipe.components) else {
            return Ok(());
        };
        // blocks in config.json are stale, the tree is the source of truth
        if let Some(Value::Object(parameters)) = config.content.get_mut(PARAMETERS_KEY) {
            parameters.remove(BLOCKS_KEY);
        }

        let config_dir = recipe.record.path();
        let blocks_dir = join_path(&config_dir, BLOCKS_DIR);
        recipe.record.add_related_path(BLOCKS_DIR);
        let mut transformation = Transformation::default();
        if recipe.fs.is_dir(&blocks_dir) {
            for (index, dir) in recipe.fs.read_sub_dirs(&blocks_dir)?.into_iter().enumerate() {
                let key = BlockKey::new(&config.key, index);
                let path = AbsPath::new(blocks_dir.clone(), dir);
                let block = load_block(recipe.fs, key, path, &config_dir, &mut recipe.record)?;
                transformation.blocks.push(block);
            }
        }
        config.transformation = Some(transformation);
        Ok(())
    }
}

fn load_block(
    fs: &dyn Filesystem,
    key: BlockKey,
    path: AbsPath,
    config_dir: &str,
    record: &mut treesync_core::Record,
) -> Result<Block, MapperError> {
    let dir = path.path();
    let meta_path = join_path(&dir, META_FILE);
    let mut meta = read_json_map(fs, &meta_path, "block metadata file")?;
    track(record, config_dir, &meta_path);

    let mut codes = Vec::new();
    for (index, code_dir) in fs.read_sub_dirs(&dir)?.into_iter().enumerate() {
        let code_path = AbsPath::new(dir.clone(), code_dir);
        let code_dir = code_path.path();
        let code_meta_path = join_path(&code_dir, META_FILE);
        let mut code_meta = read_json_map(fs, &code_meta_path, "code metadata file")?;
        track(record, config_dir, &code_meta_path);

        let file = fs
            .read_files(&code_dir)?
            .into_iter()
            .find(|name| name.starts_with(&format!("{CODE_FILE_NAME}.")))
            .ok_or_else(|| MapperError::invalid(format!("missing code file in \"{code_dir}\"")))?;
        let file_path = join_path(&code_dir, &file);
        let content = fs.read_file(&file_path, "code file")?;
        track(record, config_dir, &file_path);

        codes.push(Code {
            key: CodeKey {
                block: key.clone(),
                index,
            },
            path: code_path,
            name: take_name(&mut code_meta),
            scripts: scripts::parse(&content, scripts::file_ext(&file)),
            content: code_meta,
        });
    }

    Ok(Block {
        key,
        path,
        name: take_name(&mut meta),
        codes,
        content: meta,
    })
}

fn track(record: &mut treesync_core::Record, config_dir: &str, path: &str) {
    if let Some(relative) = relative_to(path, config_dir) {
        record.add_related_path(relative);
    }
}

impl LocalSaver for TransformationMapper {
    fn before_local_save(&self, recipe: &mut LocalSaveRecipe<'_>) -> Result<(), MapperError> {
        let Object::Config(config) = &mut recipe.object else {
            return Ok(());
        };
        let Some(transformation) = config.transformation.as_mut() else {
            return Ok(());
        };
        if let Some(Value::Object(parameters)) = recipe
            .config
            .as_mut()
            .and_then(|c| c.get_mut(PARAMETERS_KEY))
        {
            parameters.remove(BLOCKS_KEY);
        }

        let config_dir = recipe.record.path();
        let file_name = code_file_name(config.key.component_id.as_str());
        let mut files: Vec<(String, String)> = Vec::new();
        for block in &mut transformation.blocks {
            block.path = recipe.naming.block_path(&config_dir, block);
            let block_dir = block.path.path();
            let meta = meta_of(&block.name, &block.content);
            let meta_path = join_path(&block_dir, META_FILE);
            files.push((meta_path.clone(), to_json_string(&meta_path, &meta)?));

            for code in &mut block.codes {
                code.path = recipe.naming.code_path(&block_dir, code);
                let code_dir = code.path.path();
                let meta = meta_of(&code.name, &code.content);
                let meta_path = join_path(&code_dir, META_FILE);
                files.push((meta_path.clone(), to_json_string(&meta_path, &meta)?));
                files.push((join_path(&code_dir, &file_name), scripts::join(&code.scripts)));
            }
        }

        recipe.record.add_related_path(BLOCKS_DIR);
        for (path, content) in files {
            if let Some(relative) = relative_to(&path, &config_dir) {
                let relative = relative.to_string();
                recipe.add_file(&relative, content);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use treesync_core::naming::{Generator, Registry};
    use treesync_core::{ComponentsMap, ConfigKey, Key, MemoryFs, Record, SortBy, State};

    use super::*;

    fn key() -> ConfigKey {
        ConfigKey::new(1, "keboola.snowflake-transformation", "7")
    }

    fn remote_config() -> Object {
        let mut config = Config::new(key(), "Transform");
        config.content = serde_json::from_value(json!({
            "parameters": {
                "blocks": [
                    {"name": "Block 1", "codes": [
                        {"name": "Code A", "script": ["SELECT 1;", "SELECT 2;"]}
                    ]},
                    {"name": "Block 2", "codes": []}
                ],
                "other": true
            }
        }))
        .unwrap();
        Object::Config(config)
    }

    #[test]
    fn remote_blocks_are_parsed_and_written_back() {
        let components = ComponentsMap::new();
        let mut recipe = RemoteLoadRecipe {
            components: &components,
            object: remote_config(),
            warnings: Vec::new(),
        };
        TransformationMapper.after_remote_load(&mut recipe).unwrap();
        let config = recipe.object.as_config().unwrap().clone();
        let transformation = config.transformation.as_ref().unwrap();
        assert_eq!(transformation.blocks.len(), 2);
        assert_eq!(transformation.blocks[0].codes[0].scripts, vec!["SELECT 1;", "SELECT 2;"]);
        assert_eq!(config.content["parameters"], json!({"other": true}));

        let state = State::new(Arc::new(Registry::new()), ComponentsMap::new(), SortBy::Id);
        let record = Record::new(Key::Config(key()), AbsPath::new("main", "t"));
        let mut save = RemoteSaveRecipe {
            state: &state,
            record: &record,
            object: Object::Config(config),
            warnings: Vec::new(),
        };
        TransformationMapper.before_remote_save(&mut save).unwrap();
        assert_eq!(
            Value::Object(save.object.content().unwrap().clone()),
            json!({
                "parameters": {
                    "other": true,
                    "blocks": [
                        {"name": "Block 1", "codes": [
                            {"name": "Code A", "script": ["SELECT 1;", "SELECT 2;"]}
                        ]},
                        {"name": "Block 2", "codes": []}
                    ]
                }
            })
        );
    }

    #[test]
    fn local_save_then_load_restores_blocks() {
        let fs = MemoryFs::new();
        let components = ComponentsMap::new();
        let state = State::new(Arc::new(Registry::new()), ComponentsMap::new(), SortBy::Id);
        let naming = Generator::new(Default::default(), state.naming_registry().clone());

        let mut loaded = RemoteLoadRecipe {
            components: &components,
            object: remote_config(),
            warnings: Vec::new(),
        };
        TransformationMapper.after_remote_load(&mut loaded).unwrap();

        let record = Record::new(Key::Config(key()), AbsPath::new("main", "transformation/t"));
        let mut save = LocalSaveRecipe {
            fs: &fs,
            state: &state,
            naming: &naming,
            record: record.clone(),
            object: loaded.object.clone(),
            meta: Content::new(),
            config: None,
            description: None,
            files: Vec::new(),
            warnings: Vec::new(),
        };
        TransformationMapper.before_local_save(&mut save).unwrap();
        let files = save.into_files().unwrap().files;
        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(
            paths,
            [
                "main/transformation/t/blocks/001-block-1/meta.json",
                "main/transformation/t/blocks/001-block-1/001-code-a/meta.json",
                "main/transformation/t/blocks/001-block-1/001-code-a/code.sql",
                "main/transformation/t/blocks/002-block-2/meta.json",
            ]
        );
        for file in &files {
            fs.write_file(&file.path, &file.content).unwrap();
        }

        let mut load = LocalLoadRecipe {
            fs: &fs,
            components: &components,
            naming: &naming,
            object: Object::Config(Config::new(key(), "Transform")),
            record,
            warnings: Vec::new(),
        };
        TransformationMapper.after_local_load(&mut load).unwrap();
        let local = load.object.as_config().unwrap().transformation.clone().unwrap();
        let remote = loaded.object.as_config().unwrap().transformation.clone().unwrap();
        assert_eq!(local.blocks.len(), remote.blocks.len());
        assert_eq!(local.blocks[0].name, "Block 1");
        assert_eq!(local.blocks[0].codes[0].scripts, remote.blocks[0].codes[0].scripts);
        assert!(load
            .record
            .related_paths
            .contains(&"blocks/001-block-1/001-code-a/code.sql".to_string()));
    }

    #[test]
    fn extra_block_and_code_fields_are_kept() {
        let fs = MemoryFs::new();
        let components = ComponentsMap::new();
        let state = State::new(Arc::new(Registry::new()), ComponentsMap::new(), SortBy::Id);
        let naming = Generator::new(Default::default(), state.naming_registry().clone());

        let mut config = Config::new(key(), "Transform");
        config.content = serde_json::from_value(json!({
            "parameters": {
                "blocks": [
                    {"name": "Block", "phase": "early", "codes": [
                        {"name": "Code", "script": ["SELECT 1;"], "description": "first"}
                    ]}
                ]
            }
        }))
        .unwrap();
        let mut loaded = RemoteLoadRecipe {
            components: &components,
            object: Object::Config(config),
            warnings: Vec::new(),
        };
        TransformationMapper.after_remote_load(&mut loaded).unwrap();

        let record = Record::new(Key::Config(key()), AbsPath::new("main", "t"));
        let mut save = LocalSaveRecipe {
            fs: &fs,
            state: &state,
            naming: &naming,
            record: record.clone(),
            object: loaded.object,
            meta: Content::new(),
            config: None,
            description: None,
            files: Vec::new(),
            warnings: Vec::new(),
        };
        TransformationMapper.before_local_save(&mut save).unwrap();
        let files = save.into_files().unwrap().files;
        let json_at = |path: &str| -> Value {
            let file = files.iter().find(|f| f.path == path).unwrap();
            serde_json::from_str(&file.content).unwrap()
        };
        assert_eq!(
            json_at("main/t/blocks/001-block/meta.json"),
            json!({"name": "Block", "phase": "early"})
        );
        assert_eq!(
            json_at("main/t/blocks/001-block/001-code/meta.json"),
            json!({"name": "Code", "description": "first"})
        );
        for file in &files {
            fs.write_file(&file.path, &file.content).unwrap();
        }

        let mut load = LocalLoadRecipe {
            fs: &fs,
            components: &components,
            naming: &naming,
            object: Object::Config(Config::new(key(), "Transform")),
            record: record.clone(),
            warnings: Vec::new(),
        };
        TransformationMapper.after_local_load(&mut load).unwrap();
        let mut push = RemoteSaveRecipe {
            state: &state,
            record: &record,
            object: load.object,
            warnings: Vec::new(),
        };
        TransformationMapper.before_remote_save(&mut push).unwrap();
        assert_eq!(
            Value::Object(push.object.content().unwrap().clone()),
            json!({
                "parameters": {
                    "blocks": [
                        {"name": "Block", "phase": "early", "codes": [
                            {"name": "Code", "script": ["SELECT 1;"], "description": "first"}
                        ]}
                    ]
                }
            })
        );
    }
}
