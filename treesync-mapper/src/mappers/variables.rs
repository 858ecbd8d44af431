//! Variables: wire fields of the variables relations and nesting of new
//! variables configs found on disk.

use std::sync::Arc;

use treesync_core::component::VARIABLES_COMPONENT_ID;
use treesync_core::{Key, Object, Relation, RelationType};

use crate::error::MapperError;
use crate::pipeline::{Mapper, Persister, RemoteLoader, RemoteSaver};
use crate::recipe::{PersistRecipe, RemoteLoadRecipe, RemoteSaveRecipe};

pub struct VariablesMapper;

impl Mapper for VariablesMapper {
    fn name(&self) -> &'static str {
        "variables"
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

impl RemoteLoader for VariablesMapper {
    fn after_remote_load(&self, recipe: &mut RemoteLoadRecipe<'_>) -> Result<(), MapperError> {
        let Object::Config(config) = &mut recipe.object else {
            return Ok(());
        };
        for relation in Relation::take_from_api_content(&mut config.content) {
            config.relations.add(relation);
        }
        Ok(())
    }
}

impl RemoteSaver for VariablesMapper {
    fn before_remote_save(&self, recipe: &mut RemoteSaveRecipe<'_>) -> Result<(), MapperError> {
        let Object::Config(config) = &mut recipe.object else {
            return Ok(());
        };
        let api_relations: Vec<Relation> = config
            .relations
            .iter()
            .filter(|r| r.is_defined_in_api())
            .cloned()
            .collect();
        for relation in api_relations {
            relation.write_to_api_content(&mut config.content);
        }
        Ok(())
    }
}

impl Persister for VariablesMapper {
    fn before_persist(&self, recipe: &mut PersistRecipe<'_>) -> Result<(), MapperError> {
        match (&recipe.record.key, &recipe.parent_key) {
            // variables config nested in the directory of the config it serves
            (Key::Config(config), Some(Key::Config(parent)))
                if config.component_id.as_str() == VARIABLES_COMPONENT_ID =>
            {
                recipe.record.relations.add(Relation::VariablesFor {
                    component_id: parent.component_id.clone(),
                    config_id: parent.id.clone(),
                });
            }
            // values row of such a config; the first one holds the defaults
            (Key::ConfigRow(row), _) if row.component_id.as_str() == VARIABLES_COMPONENT_ID => {
                let config_key = row.config_key();
                let variables_for = recipe
                    .state
                    .get(&Key::Config(config_key.clone()))
                    .and_then(|s| s.local.as_ref())
                    .and_then(Object::relations)
                    .is_some_and(|r| r.has_type(RelationType::VariablesFor));
                let has_default = recipe.state.config_rows_from(&config_key).iter().any(|s| {
                    s.local
                        .as_ref()
                        .and_then(Object::relations)
                        .is_some_and(|r| r.has_type(RelationType::VariablesValuesFor))
                });
                if variables_for && !has_default {
                    recipe.record.relations.add(Relation::VariablesValuesFor);
                }
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use treesync_core::naming::Registry;
    use treesync_core::{
        AbsPath, ComponentsMap, Config, ConfigKey, ConfigRowKey, ObjectState, Record, SortBy,
        State,
    };

    use super::*;

    #[test]
    fn remote_round_trip_of_variables_ids() {
        let components = ComponentsMap::new();
        let key = ConfigKey::new(1, "keboola.ex-db", "1");
        let mut config = Config::new(key.clone(), "Cfg");
        config.content = serde_json::from_value(json!({"variables_id": "5", "parameters": {}}))
            .unwrap();
        let mut recipe = RemoteLoadRecipe {
            components: &components,
            object: Object::Config(config),
            warnings: Vec::new(),
        };
        VariablesMapper.after_remote_load(&mut recipe).unwrap();
        let loaded = recipe.object.as_config().unwrap().clone();
        assert!(!loaded.content.contains_key("variables_id"));
        assert!(loaded.relations.has_type(RelationType::VariablesFrom));

        let state = State::new(Arc::new(Registry::new()), ComponentsMap::new(), SortBy::Id);
        let record = Record::new(Key::Config(key), AbsPath::new("main", "ex/cfg"));
        let mut save = RemoteSaveRecipe {
            state: &state,
            record: &record,
            object: Object::Config(loaded),
            warnings: Vec::new(),
        };
        VariablesMapper.before_remote_save(&mut save).unwrap();
        assert_eq!(save.object.content().unwrap()["variables_id"], json!("5"));
    }

    #[test]
    fn persist_nests_variables_and_marks_first_values_row() {
        let mut state = State::new(Arc::new(Registry::new()), ComponentsMap::new(), SortBy::Id);
        let target = ConfigKey::new(1, "keboola.ex-db", "1");
        let variables = ConfigKey::new(1, VARIABLES_COMPONENT_ID, "2");

        let mut record = Record::new(
            Key::Config(variables.clone()),
            AbsPath::new("main/ex/cfg", "variables"),
        );
        let mut recipe = PersistRecipe {
            state: &state,
            parent_key: Some(Key::Config(target.clone())),
            record: &mut record,
        };
        VariablesMapper.before_persist(&mut recipe).unwrap();
        assert!(record.relations.has_type(RelationType::VariablesFor));

        let mut object_state = ObjectState::new(record.clone());
        let mut config = Config::new(variables.clone(), "Vars");
        config.relations = record.relations.clone();
        object_state.local = Some(Object::Config(config));
        state.set(object_state).unwrap();

        let row_key = ConfigRowKey::new(&variables, "3");
        let mut row_record = Record::new(
            Key::ConfigRow(row_key),
            AbsPath::new("main/ex/cfg/variables", "values/default"),
        );
        let mut recipe = PersistRecipe {
            state: &state,
            parent_key: Some(Key::Config(variables)),
            record: &mut row_record,
        };
        VariablesMapper.before_persist(&mut recipe).unwrap();
        assert!(row_record.relations.has_type(RelationType::VariablesValuesFor));
    }
}
