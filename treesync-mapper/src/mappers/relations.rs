//! Relations: manifest relations on local objects and the linker that
//! resolves one-sided declarations into mirrored relations.

use std::collections::BTreeMap;
use std::sync::Arc;

use treesync_core::relation::RelationError;
use treesync_core::{Key, Relation, RelationType, Side, State};

use crate::error::MapperError;
use crate::pipeline::{ChangeListener, LocalLoader, LocalSaver, Mapper};
use crate::recipe::{Changes, LocalLoadRecipe, LocalSaveRecipe, OperationContext};
use crate::report::Report;

pub struct RelationsMapper;

impl Mapper for RelationsMapper {
    fn name(&self) -> &'static str {
        "relations"
    }

    fn local_loader(self: Arc<Self>) -> Option<Arc<dyn LocalLoader>> {
        Some(self)
    }

    fn local_saver(self: Arc<Self>) -> Option<Arc<dyn LocalSaver>> {
        Some(self)
    }

    fn change_listener(self: Arc<Self>) -> Option<Arc<dyn ChangeListener>> {
        Some(self)
    }
}

impl LocalLoader for RelationsMapper {
    fn after_local_load(&self, recipe: &mut LocalLoadRecipe<'_>) -> Result<(), MapperError> {
        let manifest_relations = recipe.record.relations.clone();
        if let Some(relations) = recipe.object.relations_mut() {
            for relation in &manifest_relations {
                relations.add(relation.clone());
            }
        }
        Ok(())
    }
}

impl LocalSaver for RelationsMapper {
    fn before_local_save(&self, recipe: &mut LocalSaveRecipe<'_>) -> Result<(), MapperError> {
        if let Some(relations) = recipe.object.relations() {
            recipe.record.relations = relations.only_manifest();
        }
        Ok(())
    }
}

impl ChangeListener for RelationsMapper {
    fn on_local_change(
        &self,
        ctx: &mut OperationContext<'_>,
        changes: &Changes,
    ) -> Result<(), MapperError> {
        if !changes.loaded.is_empty() || !changes.persisted.is_empty() {
            link_relations(ctx.state, Side::Local, ctx.report);
        }
        Ok(())
    }

    fn on_remote_change(
        &self,
        ctx: &mut OperationContext<'_>,
        changes: &Changes,
    ) -> Result<(), MapperError> {
        if !changes.loaded.is_empty() {
            link_relations(ctx.state, Side::Remote, ctx.report);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Linker
// ---------------------------------------------------------------------------

/// Adds the mirrored side of every relation on `side`, then enforces the
/// one-to-X cardinality. Problems are reported as warnings.
pub fn link_relations(state: &mut State, side: Side, report: &mut Report) {
    let mut additions: Vec<(Key, Relation)> = Vec::new();
    let mut removals: Vec<(Key, Relation)> = Vec::new();

    {
        let objects = state.objects(side);
        for owner in objects.all() {
            let Some(relations) = owner.relations() else {
                continue;
            };
            let owner_key = owner.key();
            for relation in relations {
                match relation.new_other_side(owner, &objects) {
                    Ok(None) => {}
                    Ok(Some((target_key, other))) => match objects.get(&target_key) {
                        None => {
                            report.warn(RelationError::TargetNotFound {
                                target: target_key.desc(),
                                referenced_from: owner_key.desc(),
                                relation: relation.relation_type(),
                            });
                            removals.push((owner_key.clone(), relation.clone()));
                        }
                        Some(target) if target.relations().is_none() => {
                            report.warn(format!(
                                "{} does not support relations, referenced from {}, by relation \"{}\"",
                                target_key.desc(),
                                owner_key.desc(),
                                relation.relation_type()
                            ));
                            removals.push((owner_key.clone(), relation.clone()));
                        }
                        Some(_) => additions.push((target_key, other)),
                    },
                    Err(err) => {
                        report.warn(err);
                        removals.push((owner_key.clone(), relation.clone()));
                    }
                }
            }
        }
    }

    for (key, relation) in removals {
        if let Some(relations) = relations_of(state, &key, side) {
            relations.remove(&relation);
        }
    }
    for (key, relation) in additions {
        if let Some(relations) = relations_of(state, &key, side) {
            relations.add(relation);
        }
    }

    validate_one_to_x(state, side, report);
}

fn relations_of<'a>(
    state: &'a mut State,
    key: &Key,
    side: Side,
) -> Option<&'a mut treesync_core::Relations> {
    state.get_mut(key)?.get_mut(side)?.relations_mut()
}

/// Keeps the first relation of every one-to-X type and drops the rest.
fn validate_one_to_x(state: &mut State, side: Side, report: &mut Report) {
    for key in state.keys() {
        let Some(relations) = relations_of(state, &key, side) else {
            continue;
        };

        let mut by_type: BTreeMap<RelationType, Vec<Relation>> = BTreeMap::new();
        for relation in relations.iter() {
            by_type
                .entry(relation.relation_type())
                .or_default()
                .push(relation.clone());
        }

        for (ty, found) in by_type {
            if !ty.is_one_to_x() || found.len() < 2 {
                continue;
            }
            let removed = &found[1..];
            for relation in removed {
                relations.remove(relation);
            }
            let removed_json: Vec<String> = removed.iter().map(Relation::to_json).collect();
            report.warn(format!(
                "{} has {} relations of one-to-x type \"{ty}\", kept the first, removed: {}",
                key.desc(),
                found.len(),
                removed_json.join(", ")
            ));
        }
    }
}
