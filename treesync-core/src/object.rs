//! Business objects: branches, configs and config rows.

use crate::key::{BranchKey, ComponentId, ConfigId, ConfigKey, ConfigRowKey, Key, Kind, RowId};
use crate::orchestration::{Orchestration, Transformation};
use crate::relation::Relations;

/// Free-form JSON content, insertion ordered.
pub type Content = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Branch {
    pub key: BranchKey,
    pub name: String,
    pub description: String,
    pub is_default: bool,
}

/// Target component of a shared code config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedCodeConfig {
    pub target: ComponentId,
}

/// Code stored in a row of a shared code config.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SharedCodeRow {
    pub scripts: Vec<String>,
}

/// Link from a transformation to shared code it uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedCodeLink {
    pub config_id: ConfigId,
    pub row_ids: Vec<RowId>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub key: ConfigKey,
    pub name: String,
    pub description: String,
    pub is_disabled: bool,
    pub content: Content,
    pub relations: Relations,
    pub orchestration: Option<Orchestration>,
    pub shared_code: Option<SharedCodeConfig>,
    pub shared_code_link: Option<SharedCodeLink>,
    pub transformation: Option<Transformation>,
}

impl Config {
    pub fn new(key: ConfigKey, name: impl Into<String>) -> Self {
        Self {
            key,
            name: name.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigRow {
    pub key: ConfigRowKey,
    pub name: String,
    pub description: String,
    pub is_disabled: bool,
    pub content: Content,
    pub relations: Relations,
    pub shared_code: Option<SharedCodeRow>,
}

impl ConfigRow {
    pub fn new(key: ConfigRowKey, name: impl Into<String>) -> Self {
        Self {
            key,
            name: name.into(),
            ..Self::default()
        }
    }
}

/// One materialization of a stored object.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    Branch(Branch),
    Config(Config),
    ConfigRow(ConfigRow),
}

impl Object {
    /// Empty object for a key, `None` for kinds not stored in the state.
    pub fn empty(key: &Key) -> Option<Object> {
        match key {
            Key::Branch(k) => Some(Object::Branch(Branch {
                key: k.clone(),
                ..Branch::default()
            })),
            Key::Config(k) => Some(Object::Config(Config::new(k.clone(), ""))),
            Key::ConfigRow(k) => Some(Object::ConfigRow(ConfigRow::new(k.clone(), ""))),
            _ => None,
        }
    }

    pub fn key(&self) -> Key {
        match self {
            Object::Branch(b) => Key::Branch(b.key.clone()),
            Object::Config(c) => Key::Config(c.key.clone()),
            Object::ConfigRow(r) => Key::ConfigRow(r.key.clone()),
        }
    }

    pub fn kind(&self) -> Kind {
        match self {
            Object::Branch(_) => Kind::Branch,
            Object::Config(_) => Kind::Config,
            Object::ConfigRow(_) => Kind::ConfigRow,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Object::Branch(b) => &b.name,
            Object::Config(c) => &c.name,
            Object::ConfigRow(r) => &r.name,
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Object::Branch(b) => &b.description,
            Object::Config(c) => &c.description,
            Object::ConfigRow(r) => &r.description,
        }
    }

    pub fn set_description(&mut self, description: String) {
        match self {
            Object::Branch(b) => b.description = description,
            Object::Config(c) => c.description = description,
            Object::ConfigRow(r) => r.description = description,
        }
    }

    pub fn content(&self) -> Option<&Content> {
        match self {
            Object::Branch(_) => None,
            Object::Config(c) => Some(&c.content),
            Object::ConfigRow(r) => Some(&r.content),
        }
    }

    pub fn content_mut(&mut self) -> Option<&mut Content> {
        match self {
            Object::Branch(_) => None,
            Object::Config(c) => Some(&mut c.content),
            Object::ConfigRow(r) => Some(&mut r.content),
        }
    }

    /// `None` when the object kind does not support relations.
    pub fn relations(&self) -> Option<&Relations> {
        match self {
            Object::Branch(_) => None,
            Object::Config(c) => Some(&c.relations),
            Object::ConfigRow(r) => Some(&r.relations),
        }
    }

    pub fn relations_mut(&mut self) -> Option<&mut Relations> {
        match self {
            Object::Branch(_) => None,
            Object::Config(c) => Some(&mut c.relations),
            Object::ConfigRow(r) => Some(&mut r.relations),
        }
    }

    /// Relation-defined parent first, structural parent otherwise.
    pub fn parent_key(&self) -> Option<Key> {
        let key = self.key();
        self.relations()
            .and_then(|relations| relations.parent_key(&key))
            .or_else(|| key.parent_key())
    }

    pub fn as_branch(&self) -> Option<&Branch> {
        match self {
            Object::Branch(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_config(&self) -> Option<&Config> {
        match self {
            Object::Config(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_config_mut(&mut self) -> Option<&mut Config> {
        match self {
            Object::Config(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_config_row(&self) -> Option<&ConfigRow> {
        match self {
            Object::ConfigRow(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_config_row_mut(&mut self) -> Option<&mut ConfigRow> {
        match self {
            Object::ConfigRow(r) => Some(r),
            _ => None,
        }
    }
}

impl From<Branch> for Object {
    fn from(b: Branch) -> Self {
        Object::Branch(b)
    }
}

impl From<Config> for Object {
    fn from(c: Config) -> Self {
        Object::Config(c)
    }
}

impl From<ConfigRow> for Object {
    fn from(r: ConfigRow) -> Self {
        Object::ConfigRow(r)
    }
}
