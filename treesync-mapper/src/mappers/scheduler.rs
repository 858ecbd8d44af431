//! Scheduler: the content `target` of a scheduler config is the
//! `schedulerFor` relation.

use std::sync::Arc;

use serde_json::Value;
use treesync_core::component::SCHEDULER_COMPONENT_ID;
use treesync_core::relation::scalar_id;
use treesync_core::{Config, Key, Object, Relation, RelationType};

use crate::error::MapperError;
use crate::pipeline::{LocalLoader, Mapper, Persister, RemoteLoader, RemoteSaver};
use crate::recipe::{LocalLoadRecipe, PersistRecipe, RemoteLoadRecipe, RemoteSaveRecipe};

const TARGET_KEY: &str = "target";
const COMPONENT_ID_KEY: &str = "componentId";
const CONFIGURATION_ID_KEY: &str = "configurationId";

pub struct SchedulerMapper;

impl Mapper for SchedulerMapper {
    fn name(&self) -> &'static str {
        "scheduler"
    }

    fn local_loader(self: Arc<Self>) -> Option<Arc<dyn LocalLoader>> {
        Some(self)
    }

    fn remote_loader(self: Arc<Self>) -> Option<Arc<dyn RemoteLoader>> {
        Some(self)
    }

    fn remote_saver(self: Arc<Self>) -> Option<Arc<dyn RemoteSaver>> {
        Some(self)
    }

    fn persister(self: Arc<Self>) -> Option<Arc<dyn Persister>> {
        Some(self)
    }
}

fn scheduler_config(object: &mut Object) -> Option<&mut Config> {
    match object {
        Object::Config(config) if config.key.component_id.as_str() == SCHEDULER_COMPONENT_ID => {
            Some(config)
        }
        _ => None,
    }
}

/// Replaces the `schedulerFor` relation by the one in content, if any.
fn relation_from_content(config: &mut Config) {
    let Some(Value::Object(target)) = config.content.get(TARGET_KEY) else {
        return;
    };
    let component_id = target.get(COMPONENT_ID_KEY).and_then(scalar_id);
    let config_id = target.get(CONFIGURATION_ID_KEY).and_then(scalar_id);
    let (Some(component_id), Some(config_id)) = (component_id, config_id) else {
        return;
    };
    config
        .relations
        .retain(|r| r.relation_type() != RelationType::SchedulerFor);
    config.relations.add(Relation::SchedulerFor {
        component_id: component_id.into(),
        config_id: config_id.into(),
    });
}

impl LocalLoader for SchedulerMapper {
    fn after_local_load(&self, recipe: &mut LocalLoadRecipe<'_>) -> Result<(), MapperError> {
        if let Some(config) = scheduler_config(&mut recipe.object) {
            relation_from_content(config);
        }
        Ok(())
    }
}

impl RemoteLoader for SchedulerMapper {
    fn after_remote_load(&self, recipe: &mut RemoteLoadRecipe<'_>) -> Result<(), MapperError> {
        if let Some(config) = scheduler_config(&mut recipe.object) {
            relation_from_content(config);
        }
        Ok(())
    }
}

impl RemoteSaver for SchedulerMapper {
    fn before_remote_save(&self, recipe: &mut RemoteSaveRecipe<'_>) -> Result<(), MapperError> {
        let Some(config) = scheduler_config(&mut recipe.object) else {
            return Ok(());
        };
        let Some((component_id, config_id)) = config.relations.iter().find_map(|r| match r {
            Relation::SchedulerFor {
                component_id,
                config_id,
            } => Some((component_id.to_string(), config_id.to_string())),
            _ => None,
        }) else {
            return Ok(());
        };

        let target = config
            .content
            .entry(TARGET_KEY)
            .or_insert_with(|| Value::Object(Default::default()));
        if !target.is_object() {
            *target = Value::Object(Default::default());
        }
        if let Value::Object(target) = target {
            target.insert(COMPONENT_ID_KEY.to_string(), Value::String(component_id));
            target.insert(CONFIGURATION_ID_KEY.to_string(), Value::String(config_id));
        }
        Ok(())
    }
}

impl Persister for SchedulerMapper {
    fn before_persist(&self, recipe: &mut PersistRecipe<'_>) -> Result<(), MapperError> {
        if let (Key::Config(config), Some(Key::Config(parent))) =
            (&recipe.record.key, &recipe.parent_key)
        {
            if config.component_id.as_str() == SCHEDULER_COMPONENT_ID {
                recipe.record.relations.add(Relation::SchedulerFor {
                    component_id: parent.component_id.clone(),
                    config_id: parent.id.clone(),
                });
            }
        }
        Ok(())
    }
}
