//! Path templates, one per object shape. Stored in the manifest.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub branch: String,
    pub config: String,
    pub config_row: String,
    pub scheduler_config: String,
    pub shared_code_config: String,
    pub shared_code_config_row: String,
    pub variables_config: String,
    pub variables_values_row: String,
}

impl Template {
    /// Templates that prefix names with ids, so renames in the UI never move paths.
    pub fn with_ids() -> Self {
        Self {
            branch: "{branch_id}-{branch_name}".to_string(),
            config: "{component_type}/{component_id}/{config_id}-{config_name}".to_string(),
            config_row: "rows/{config_row_id}-{config_row_name}".to_string(),
            ..Self::default()
        }
    }
}

impl Default for Template {
    fn default() -> Self {
        Self {
            branch: "{branch_name}".to_string(),
            config: "{component_type}/{component_id}/{config_name}".to_string(),
            config_row: "rows/{config_row_name}".to_string(),
            scheduler_config: "schedules/{config_name}".to_string(),
            shared_code_config: "_shared/{target_component_id}".to_string(),
            shared_code_config_row: "codes/{config_row_name}".to_string(),
            variables_config: "variables".to_string(),
            variables_values_row: "values/{config_row_name}".to_string(),
        }
    }
}

/// Replaces `{placeholder}` occurrences with their values.
pub fn render(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (name, value) in values {
        out = out.replace(&format!("{{{name}}}"), value);
    }
    out
}
