//! Typed relations between objects.
//!
//! A relation is declared on one object and may imply a mirrored relation on
//! another one (see [`Relation::new_other_side`]). Relations are persisted in
//! two different places depending on their type, so there are two views:
//! - [`ManifestRelation`] is the tagged JSON stored in the manifest;
//! - the wire view ([`Relation::take_from_api_content`] and
//!   [`Relation::write_to_api_content`]) maps relations to scalar fields of
//!   the remote content.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::component::VARIABLES_COMPONENT_ID;
use crate::key::{ComponentId, ConfigId, ConfigKey, ConfigRowKey, Key, RowId};
use crate::object::{Content, Object};
use crate::state::Objects;

pub const VARIABLES_ID_CONTENT_KEY: &str = "variables_id";
pub const VARIABLES_VALUES_ID_CONTENT_KEY: &str = "variables_values_id";

// ---------------------------------------------------------------------------
// Relation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RelationType {
    VariablesFor,
    VariablesFrom,
    VariablesValuesFor,
    VariablesValuesFrom,
    SchedulerFor,
    UsedInOrchestrator,
}

impl RelationType {
    pub fn name(self) -> &'static str {
        match self {
            RelationType::VariablesFor => "variablesFor",
            RelationType::VariablesFrom => "variablesFrom",
            RelationType::VariablesValuesFor => "variablesValuesFor",
            RelationType::VariablesValuesFrom => "variablesValuesFrom",
            RelationType::SchedulerFor => "schedulerFor",
            RelationType::UsedInOrchestrator => "usedInOrchestrator",
        }
    }

    /// At most one relation of a one-to-X type may exist per object.
    pub fn is_one_to_x(self) -> bool {
        !matches!(self, RelationType::UsedInOrchestrator)
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A relation attached to a config or a config row.
///
/// The `Serialize` impl is a diagnostic view carrying every field; persisted
/// forms go through [`ManifestRelation`] or the wire helpers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Relation {
    /// Variables config -> the config it provides variables for.
    #[serde(rename_all = "camelCase")]
    VariablesFor {
        component_id: ComponentId,
        config_id: ConfigId,
    },
    /// Config -> its variables config.
    #[serde(rename_all = "camelCase")]
    VariablesFrom { variables_id: ConfigId },
    /// Values row of a variables config -> default values for the target.
    VariablesValuesFor,
    /// Config -> the values row it uses.
    #[serde(rename_all = "camelCase")]
    VariablesValuesFrom { variables_values_id: RowId },
    /// Scheduler config -> the config it schedules.
    #[serde(rename_all = "camelCase")]
    SchedulerFor {
        component_id: ComponentId,
        config_id: ConfigId,
    },
    /// Config -> orchestrator config referencing it from a task.
    #[serde(rename_all = "camelCase")]
    UsedInOrchestrator { config_id: ConfigId },
}

/// Errors resolving the other side of a relation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelationError {
    #[error("{target} not found, referenced from {referenced_from}, by relation \"{relation}\"")]
    TargetNotFound {
        target: String,
        referenced_from: String,
        relation: RelationType,
    },

    #[error("{owner} has relation \"{relation}\" but {reason}")]
    Incomplete {
        owner: String,
        relation: RelationType,
        reason: String,
    },
}

impl Relation {
    pub fn relation_type(&self) -> RelationType {
        match self {
            Relation::VariablesFor { .. } => RelationType::VariablesFor,
            Relation::VariablesFrom { .. } => RelationType::VariablesFrom,
            Relation::VariablesValuesFor => RelationType::VariablesValuesFor,
            Relation::VariablesValuesFrom { .. } => RelationType::VariablesValuesFrom,
            Relation::SchedulerFor { .. } => RelationType::SchedulerFor,
            Relation::UsedInOrchestrator { .. } => RelationType::UsedInOrchestrator,
        }
    }

    /// Identity used for de-duplication on one object.
    pub fn key(&self) -> String {
        let ty = self.relation_type();
        match self {
            Relation::VariablesFor {
                component_id,
                config_id,
            }
            | Relation::SchedulerFor {
                component_id,
                config_id,
            } => format!("{ty}_{component_id}_{config_id}"),
            Relation::VariablesFrom { variables_id } => format!("{ty}_{variables_id}"),
            Relation::VariablesValuesFor => ty.to_string(),
            Relation::VariablesValuesFrom {
                variables_values_id,
            } => format!("{ty}_{variables_values_id}"),
            Relation::UsedInOrchestrator { config_id } => format!("{ty}_{config_id}"),
        }
    }

    /// Parent implied by the relation, for relations that re-parent the owner.
    pub fn parent_key(&self, owner: &Key) -> Option<Key> {
        let owner = owner.as_config()?;
        match self {
            Relation::VariablesFor {
                component_id,
                config_id,
            }
            | Relation::SchedulerFor {
                component_id,
                config_id,
            } => Some(Key::Config(ConfigKey {
                branch_id: owner.branch_id,
                component_id: component_id.clone(),
                id: config_id.clone(),
            })),
            _ => None,
        }
    }

    /// `schedulerFor` is stored on both sides: the API keeps it in the
    /// content `target`, the manifest needs it to resolve the nested path.
    pub fn is_defined_in_manifest(&self) -> bool {
        matches!(
            self,
            Relation::VariablesFor { .. }
                | Relation::VariablesValuesFor
                | Relation::SchedulerFor { .. }
        )
    }

    pub fn is_defined_in_api(&self) -> bool {
        matches!(
            self,
            Relation::VariablesFrom { .. }
                | Relation::VariablesValuesFrom { .. }
                | Relation::SchedulerFor { .. }
        )
    }

    /// Computes the mirrored relation and the key of the object that should
    /// carry it. `Ok(None)` means the relation has no other side.
    pub fn new_other_side(
        &self,
        owner: &Object,
        objects: &Objects<'_>,
    ) -> Result<Option<(Key, Relation)>, RelationError> {
        let owner_key = owner.key();
        match self {
            Relation::VariablesFor {
                component_id,
                config_id,
            } => {
                let Key::Config(variables) = &owner_key else {
                    return Ok(None);
                };
                let target = ConfigKey {
                    branch_id: variables.branch_id,
                    component_id: component_id.clone(),
                    id: config_id.clone(),
                };
                Ok(Some((
                    Key::Config(target),
                    Relation::VariablesFrom {
                        variables_id: variables.id.clone(),
                    },
                )))
            }
            Relation::VariablesFrom { variables_id } => {
                let Key::Config(config) = &owner_key else {
                    return Ok(None);
                };
                let target = ConfigKey {
                    branch_id: config.branch_id,
                    component_id: VARIABLES_COMPONENT_ID.into(),
                    id: variables_id.clone(),
                };
                Ok(Some((
                    Key::Config(target),
                    Relation::VariablesFor {
                        component_id: config.component_id.clone(),
                        config_id: config.id.clone(),
                    },
                )))
            }
            Relation::VariablesValuesFor => {
                let Key::ConfigRow(row) = &owner_key else {
                    return Ok(None);
                };
                let variables_key = Key::Config(row.config_key());
                let variables = objects.get(&variables_key).ok_or_else(|| {
                    RelationError::TargetNotFound {
                        target: variables_key.desc(),
                        referenced_from: owner_key.desc(),
                        relation: RelationType::VariablesValuesFor,
                    }
                })?;
                let target = variables
                    .relations()
                    .and_then(|relations| relations.parent_key(&variables_key))
                    .ok_or_else(|| RelationError::Incomplete {
                        owner: owner_key.desc(),
                        relation: RelationType::VariablesValuesFor,
                        reason: format!(
                            "{} has no \"{}\" relation",
                            variables_key.desc(),
                            RelationType::VariablesFor
                        ),
                    })?;
                Ok(Some((
                    target,
                    Relation::VariablesValuesFrom {
                        variables_values_id: row.id.clone(),
                    },
                )))
            }
            Relation::VariablesValuesFrom {
                variables_values_id,
            } => {
                let Key::Config(config) = &owner_key else {
                    return Ok(None);
                };
                let variables_id = owner
                    .relations()
                    .and_then(|relations| {
                        relations.iter().find_map(|r| match r {
                            Relation::VariablesFrom { variables_id } => Some(variables_id.clone()),
                            _ => None,
                        })
                    })
                    .ok_or_else(|| RelationError::Incomplete {
                        owner: owner_key.desc(),
                        relation: RelationType::VariablesValuesFrom,
                        reason: format!("\"{}\" relation is missing", RelationType::VariablesFrom),
                    })?;
                let variables = ConfigKey {
                    branch_id: config.branch_id,
                    component_id: VARIABLES_COMPONENT_ID.into(),
                    id: variables_id,
                };
                Ok(Some((
                    Key::ConfigRow(ConfigRowKey::new(&variables, variables_values_id.clone())),
                    Relation::VariablesValuesFor,
                )))
            }
            Relation::SchedulerFor { .. } | Relation::UsedInOrchestrator { .. } => Ok(None),
        }
    }

    /// Full JSON form, used in diagnostics.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.key())
    }

    pub fn to_manifest(&self) -> Option<ManifestRelation> {
        match self {
            Relation::VariablesFor {
                component_id,
                config_id,
            } => Some(ManifestRelation::VariablesFor {
                component_id: component_id.clone(),
                config_id: config_id.clone(),
            }),
            Relation::VariablesValuesFor => Some(ManifestRelation::VariablesValuesFor),
            Relation::SchedulerFor {
                component_id,
                config_id,
            } => Some(ManifestRelation::SchedulerFor {
                component_id: component_id.clone(),
                config_id: config_id.clone(),
            }),
            _ => None,
        }
    }

    // -----------------------------------------------------------------------
    // Wire view
    // -----------------------------------------------------------------------

    /// Removes relation fields from remote content and returns the relations.
    pub fn take_from_api_content(content: &mut Content) -> Vec<Relation> {
        let mut out = Vec::new();
        if let Some(id) = content
            .remove(VARIABLES_ID_CONTENT_KEY)
            .and_then(|v| scalar_id(&v))
        {
            out.push(Relation::VariablesFrom {
                variables_id: ConfigId(id),
            });
        }
        if let Some(id) = content
            .remove(VARIABLES_VALUES_ID_CONTENT_KEY)
            .and_then(|v| scalar_id(&v))
        {
            out.push(Relation::VariablesValuesFrom {
                variables_values_id: RowId(id),
            });
        }
        out
    }

    /// Writes the relation into remote content, if it has a wire form.
    pub fn write_to_api_content(&self, content: &mut Content) {
        match self {
            Relation::VariablesFrom { variables_id } => {
                content.insert(
                    VARIABLES_ID_CONTENT_KEY.to_string(),
                    Value::String(variables_id.0.clone()),
                );
            }
            Relation::VariablesValuesFrom {
                variables_values_id,
            } => {
                content.insert(
                    VARIABLES_VALUES_ID_CONTENT_KEY.to_string(),
                    Value::String(variables_values_id.0.clone()),
                );
            }
            _ => {}
        }
    }
}

/// Ids arrive as strings or numbers depending on the endpoint.
pub fn scalar_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Manifest view
// ---------------------------------------------------------------------------

/// Relations persisted in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ManifestRelation {
    #[serde(rename_all = "camelCase")]
    VariablesFor {
        component_id: ComponentId,
        config_id: ConfigId,
    },
    VariablesValuesFor,
    #[serde(rename_all = "camelCase")]
    SchedulerFor {
        component_id: ComponentId,
        config_id: ConfigId,
    },
}

impl From<ManifestRelation> for Relation {
    fn from(r: ManifestRelation) -> Self {
        match r {
            ManifestRelation::VariablesFor {
                component_id,
                config_id,
            } => Relation::VariablesFor {
                component_id,
                config_id,
            },
            ManifestRelation::VariablesValuesFor => Relation::VariablesValuesFor,
            ManifestRelation::SchedulerFor {
                component_id,
                config_id,
            } => Relation::SchedulerFor {
                component_id,
                config_id,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Relations
// ---------------------------------------------------------------------------

/// Relations of one object, de-duplicated by [`Relation::key`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Relations(Vec<Relation>);

impl Relations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the relation unless an equal one exists. Returns whether it was added.
    pub fn add(&mut self, relation: Relation) -> bool {
        let key = relation.key();
        if self.0.iter().any(|r| r.key() == key) {
            return false;
        }
        self.0.push(relation);
        true
    }

    pub fn remove(&mut self, relation: &Relation) {
        let key = relation.key();
        self.0.retain(|r| r.key() != key);
    }

    pub fn retain(&mut self, f: impl FnMut(&Relation) -> bool) {
        self.0.retain(f);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Relation> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has_type(&self, ty: RelationType) -> bool {
        self.0.iter().any(|r| r.relation_type() == ty)
    }

    pub fn of_type(&self, ty: RelationType) -> Vec<&Relation> {
        self.0.iter().filter(|r| r.relation_type() == ty).collect()
    }

    /// First relation-defined parent of `owner`.
    pub fn parent_key(&self, owner: &Key) -> Option<Key> {
        self.0.iter().find_map(|r| r.parent_key(owner))
    }

    pub fn only_manifest(&self) -> Relations {
        Relations(
            self.0
                .iter()
                .filter(|r| r.is_defined_in_manifest())
                .cloned()
                .collect(),
        )
    }

    pub fn to_manifest(&self) -> Vec<ManifestRelation> {
        self.0.iter().filter_map(Relation::to_manifest).collect()
    }
}

impl FromIterator<Relation> for Relations {
    fn from_iter<I: IntoIterator<Item = Relation>>(iter: I) -> Self {
        let mut relations = Relations::new();
        for r in iter {
            relations.add(r);
        }
        relations
    }
}

impl<'a> IntoIterator for &'a Relations {
    type Item = &'a Relation;
    type IntoIter = std::slice::Iter<'a, Relation>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
