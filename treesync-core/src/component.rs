//! Components and their capability flags.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::key::ComponentId;

pub const ORCHESTRATOR_COMPONENT_ID: &str = "keboola.orchestrator";
pub const SHARED_CODE_COMPONENT_ID: &str = "keboola.shared-code";
pub const VARIABLES_COMPONENT_ID: &str = "keboola.variables";
pub const SCHEDULER_COMPONENT_ID: &str = "keboola.scheduler";
pub const TRANSFORMATION_TYPE: &str = "transformation";

/// A component as listed by the remote API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    pub id: ComponentId,
    #[serde(rename = "type")]
    pub component_type: String,
    #[serde(default)]
    pub name: String,
}

impl Component {
    pub fn new(
        id: impl Into<ComponentId>,
        component_type: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            component_type: component_type.into(),
            name: name.into(),
        }
    }

    /// Builds a component for an id the API did not list, guessing its type
    /// from common id conventions (`.ex-` extractors, `.wr-` writers, ...).
    pub fn infer(id: &ComponentId) -> Self {
        let raw = id.as_str();
        let component_type = if raw.contains("transformation") {
            TRANSFORMATION_TYPE
        } else if raw.contains(".ex-") || raw.starts_with("ex-") {
            "extractor"
        } else if raw.contains(".wr-") || raw.starts_with("wr-") {
            "writer"
        } else if raw.contains(".app-") || raw.starts_with("app-") {
            "application"
        } else {
            "other"
        };
        Self::new(id.clone(), component_type, raw)
    }

    pub fn is_orchestrator(&self) -> bool {
        self.id.as_str() == ORCHESTRATOR_COMPONENT_ID
    }

    pub fn is_shared_code(&self) -> bool {
        self.id.as_str() == SHARED_CODE_COMPONENT_ID
    }

    pub fn is_variables(&self) -> bool {
        self.id.as_str() == VARIABLES_COMPONENT_ID
    }

    pub fn is_scheduler(&self) -> bool {
        self.id.as_str() == SCHEDULER_COMPONENT_ID
    }

    pub fn is_transformation(&self) -> bool {
        self.component_type == TRANSFORMATION_TYPE
    }
}

/// Known components, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct ComponentsMap {
    components: BTreeMap<ComponentId, Component>,
}

impl ComponentsMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, component: Component) {
        self.components.insert(component.id.clone(), component);
    }

    pub fn get(&self, id: &ComponentId) -> Option<&Component> {
        self.components.get(id)
    }

    /// Listed component, or an inferred one when the id is unknown.
    pub fn get_or_infer(&self, id: &ComponentId) -> Component {
        self.get(id).cloned().unwrap_or_else(|| Component::infer(id))
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl FromIterator<Component> for ComponentsMap {
    fn from_iter<I: IntoIterator<Item = Component>>(iter: I) -> Self {
        let mut map = ComponentsMap::new();
        for component in iter {
            map.insert(component);
        }
        map
    }
}
