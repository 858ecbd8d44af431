//! Typed, hierarchical object keys.
//!
//! Every object kind has its own key struct; [`Key`] is the closed union used
//! wherever objects of different kinds are stored together. The `Display`
//! form of a key is its stable string encoding (also the `sortBy: id` order):
//! the two-digit level prefix makes parents sort before their children.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Id newtypes
// ---------------------------------------------------------------------------

/// Numeric id of a branch.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct BranchId(pub u64);

impl fmt::Display for BranchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u64> for BranchId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Id of a component, e.g. `keboola.ex-db-mysql`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentId(pub String);

impl ComponentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ComponentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ComponentId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Id of a configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigId(pub String);

impl ConfigId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ConfigId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ConfigId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Id of a configuration row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowId(pub String);

impl RowId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for RowId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RowId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Kind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Kind {
    Branch,
    Component,
    Config,
    ConfigRow,
    Block,
    Code,
    Phase,
    Task,
}

impl Kind {
    /// Human name used in messages and as the naming fallback.
    pub fn name(self) -> &'static str {
        match self {
            Kind::Branch => "branch",
            Kind::Component => "component",
            Kind::Config => "config",
            Kind::ConfigRow => "config row",
            Kind::Block => "block",
            Kind::Code => "code",
            Kind::Phase => "phase",
            Kind::Task => "task",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Key structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BranchKey {
    pub id: BranchId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentKey {
    pub id: ComponentId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConfigKey {
    pub branch_id: BranchId,
    pub component_id: ComponentId,
    pub id: ConfigId,
}

impl ConfigKey {
    pub fn new(
        branch_id: impl Into<BranchId>,
        component_id: impl Into<ComponentId>,
        id: impl Into<ConfigId>,
    ) -> Self {
        Self {
            branch_id: branch_id.into(),
            component_id: component_id.into(),
            id: id.into(),
        }
    }

    pub fn branch_key(&self) -> BranchKey {
        BranchKey { id: self.branch_id }
    }

    fn desc_body(&self) -> String {
        format!(
            "branch:{}/component:{}/config:{}",
            self.branch_id, self.component_id, self.id
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConfigRowKey {
    pub branch_id: BranchId,
    pub component_id: ComponentId,
    pub config_id: ConfigId,
    pub id: RowId,
}

impl ConfigRowKey {
    pub fn new(config: &ConfigKey, id: impl Into<RowId>) -> Self {
        Self {
            branch_id: config.branch_id,
            component_id: config.component_id.clone(),
            config_id: config.id.clone(),
            id: id.into(),
        }
    }

    pub fn config_key(&self) -> ConfigKey {
        ConfigKey {
            branch_id: self.branch_id,
            component_id: self.component_id.clone(),
            id: self.config_id.clone(),
        }
    }
}

/// Transformation block, indexed within its config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockKey {
    pub branch_id: BranchId,
    pub component_id: ComponentId,
    pub config_id: ConfigId,
    pub index: usize,
}

impl BlockKey {
    pub fn new(config: &ConfigKey, index: usize) -> Self {
        Self {
            branch_id: config.branch_id,
            component_id: config.component_id.clone(),
            config_id: config.id.clone(),
            index,
        }
    }

    pub fn config_key(&self) -> ConfigKey {
        ConfigKey {
            branch_id: self.branch_id,
            component_id: self.component_id.clone(),
            id: self.config_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CodeKey {
    pub block: BlockKey,
    pub index: usize,
}

/// Orchestration phase, indexed by its sorted position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PhaseKey {
    pub branch_id: BranchId,
    pub component_id: ComponentId,
    pub config_id: ConfigId,
    pub index: usize,
}

impl PhaseKey {
    pub fn new(config: &ConfigKey, index: usize) -> Self {
        Self {
            branch_id: config.branch_id,
            component_id: config.component_id.clone(),
            config_id: config.id.clone(),
            index,
        }
    }

    pub fn config_key(&self) -> ConfigKey {
        ConfigKey {
            branch_id: self.branch_id,
            component_id: self.component_id.clone(),
            id: self.config_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskKey {
    pub phase: PhaseKey,
    pub index: usize,
}

// ---------------------------------------------------------------------------
// Key
// ---------------------------------------------------------------------------

/// Any object key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Branch(BranchKey),
    Component(ComponentKey),
    Config(ConfigKey),
    ConfigRow(ConfigRowKey),
    Block(BlockKey),
    Code(CodeKey),
    Phase(PhaseKey),
    Task(TaskKey),
}

impl Key {
    pub fn kind(&self) -> Kind {
        match self {
            Key::Branch(_) => Kind::Branch,
            Key::Component(_) => Kind::Component,
            Key::Config(_) => Kind::Config,
            Key::ConfigRow(_) => Kind::ConfigRow,
            Key::Block(_) => Kind::Block,
            Key::Code(_) => Kind::Code,
            Key::Phase(_) => Kind::Phase,
            Key::Task(_) => Kind::Task,
        }
    }

    /// Depth in the object hierarchy, branch = 1 .. code/task = 6.
    pub fn level(&self) -> u8 {
        match self {
            Key::Branch(_) => 1,
            Key::Component(_) => 2,
            Key::Config(_) => 3,
            Key::ConfigRow(_) => 4,
            Key::Block(_) | Key::Phase(_) => 5,
            Key::Code(_) | Key::Task(_) => 6,
        }
    }

    /// Structural parent. Relation-defined parents are resolved by the object.
    pub fn parent_key(&self) -> Option<Key> {
        match self {
            Key::Branch(_) | Key::Component(_) => None,
            Key::Config(k) => {
                if k.branch_id.0 == 0 {
                    None
                } else {
                    Some(Key::Branch(k.branch_key()))
                }
            }
            Key::ConfigRow(k) => Some(Key::Config(k.config_key())),
            Key::Block(k) => Some(Key::Config(k.config_key())),
            Key::Code(k) => Some(Key::Block(k.block.clone())),
            Key::Phase(k) => Some(Key::Config(k.config_key())),
            Key::Task(k) => Some(Key::Phase(k.phase.clone())),
        }
    }

    /// Description for user-facing messages, e.g. `config "branch:1/component:x/config:2"`.
    pub fn desc(&self) -> String {
        match self {
            Key::Branch(k) => format!("branch \"{}\"", k.id),
            Key::Component(k) => format!("component \"{}\"", k.id),
            Key::Config(k) => format!("config \"{}\"", k.desc_body()),
            Key::ConfigRow(k) => {
                format!("config row \"{}/row:{}\"", k.config_key().desc_body(), k.id)
            }
            Key::Block(k) => format!("block \"{}/block:{}\"", k.config_key().desc_body(), k.index),
            Key::Code(k) => format!(
                "code \"{}/block:{}/code:{}\"",
                k.block.config_key().desc_body(),
                k.block.index,
                k.index
            ),
            Key::Phase(k) => format!("phase \"{}/phase:{}\"", k.config_key().desc_body(), k.index),
            Key::Task(k) => format!(
                "task \"{}/phase:{}/task:{}\"",
                k.phase.config_key().desc_body(),
                k.phase.index,
                k.index
            ),
        }
    }

    pub fn as_branch(&self) -> Option<&BranchKey> {
        match self {
            Key::Branch(k) => Some(k),
            _ => None,
        }
    }

    pub fn as_config(&self) -> Option<&ConfigKey> {
        match self {
            Key::Config(k) => Some(k),
            _ => None,
        }
    }

    pub fn as_config_row(&self) -> Option<&ConfigRowKey> {
        match self {
            Key::ConfigRow(k) => Some(k),
            _ => None,
        }
    }

    /// Component the keyed object belongs to, if any.
    pub fn component_id(&self) -> Option<&ComponentId> {
        match self {
            Key::Branch(_) => None,
            Key::Component(k) => Some(&k.id),
            Key::Config(k) => Some(&k.component_id),
            Key::ConfigRow(k) => Some(&k.component_id),
            Key::Block(k) => Some(&k.component_id),
            Key::Code(k) => Some(&k.block.component_id),
            Key::Phase(k) => Some(&k.component_id),
            Key::Task(k) => Some(&k.phase.component_id),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = self.level();
        match self {
            Key::Branch(k) => write!(f, "{level:02}_{}_branch", k.id),
            Key::Component(k) => write!(f, "{level:02}_{}_component", k.id),
            Key::Config(k) => write!(
                f,
                "{level:02}_{}_{}_{}_config",
                k.branch_id, k.component_id, k.id
            ),
            Key::ConfigRow(k) => write!(
                f,
                "{level:02}_{}_{}_{}_{}_config_row",
                k.branch_id, k.component_id, k.config_id, k.id
            ),
            Key::Block(k) => write!(
                f,
                "{level:02}_{}_{}_{}_{:03}_block",
                k.branch_id, k.component_id, k.config_id, k.index
            ),
            Key::Code(k) => write!(
                f,
                "{level:02}_{}_{}_{}_{:03}_{:03}_code",
                k.block.branch_id, k.block.component_id, k.block.config_id, k.block.index, k.index
            ),
            Key::Phase(k) => write!(
                f,
                "{level:02}_{}_{}_{}_{:03}_phase",
                k.branch_id, k.component_id, k.config_id, k.index
            ),
            Key::Task(k) => write!(
                f,
                "{level:02}_{}_{}_{}_{:03}_{:03}_task",
                k.phase.branch_id, k.phase.component_id, k.phase.config_id, k.phase.index, k.index
            ),
        }
    }
}

impl From<BranchKey> for Key {
    fn from(k: BranchKey) -> Self {
        Key::Branch(k)
    }
}

impl From<ConfigKey> for Key {
    fn from(k: ConfigKey) -> Self {
        Key::Config(k)
    }
}

impl From<ConfigRowKey> for Key {
    fn from(k: ConfigRowKey) -> Self {
        Key::ConfigRow(k)
    }
}

impl From<PhaseKey> for Key {
    fn from(k: PhaseKey) -> Self {
        Key::Phase(k)
    }
}

impl From<TaskKey> for Key {
    fn from(k: TaskKey) -> Self {
        Key::Task(k)
    }
}

impl From<BlockKey> for Key {
    fn from(k: BlockKey) -> Self {
        Key::Block(k)
    }
}

impl From<CodeKey> for Key {
    fn from(k: CodeKey) -> Self {
        Key::Code(k)
    }
}
