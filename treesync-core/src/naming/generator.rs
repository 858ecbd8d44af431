//! Path generator: renders templates and makes the result unique.
//!
//! Every generated path is bound in the shared [`Registry`], so generation
//! order decides which object keeps the un-suffixed path. Callers process
//! objects in the sorted state order.

use std::sync::Arc;

use crate::component::{Component, SHARED_CODE_COMPONENT_ID};
use crate::key::{Key, Kind};
use crate::naming::normalize::normalize_name;
use crate::naming::registry::Registry;
use crate::naming::template::{render, Template};
use crate::object::{Branch, Config, ConfigRow};
use crate::orchestration::{Block, Code, Phase, Task};
use crate::paths::join_path;
use crate::record::AbsPath;

pub const META_FILE: &str = "meta.json";
pub const CONFIG_FILE: &str = "config.json";
pub const DESCRIPTION_FILE: &str = "description.md";
pub const PHASES_DIR: &str = "phases";
pub const PHASE_FILE: &str = "phase.json";
pub const TASK_FILE: &str = "task.json";
pub const PIPELINE_FILE: &str = "pipeline.yml";
pub const BLOCKS_DIR: &str = "blocks";
pub const CODE_FILE_NAME: &str = "code";
pub const DEFAULT_BRANCH_PATH: &str = "main";

#[derive(Debug, Clone)]
pub struct Generator {
    template: Template,
    registry: Arc<Registry>,
}

impl Generator {
    pub fn new(template: Template, registry: Arc<Registry>) -> Self {
        Self { template, registry }
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn branch_path(&self, branch: &Branch) -> AbsPath {
        let relative = if branch.is_default {
            DEFAULT_BRANCH_PATH.to_string()
        } else {
            let id = branch.key.id.to_string();
            let name = normalize_name(&branch.name);
            render(
                &self.template.branch,
                &[("branch_id", id.as_str()), ("branch_name", name.as_str())],
            )
        };
        self.unique(Key::Branch(branch.key.clone()), "", relative, Kind::Branch)
    }

    /// Path of a config under `parent_path`.
    ///
    /// # Panics
    ///
    /// When the parent kind and component capabilities match no template:
    /// a config can only be nested in the shapes the relation model allows.
    pub fn config_path(&self, parent_path: &str, component: &Component, config: &Config) -> AbsPath {
        let key = Key::Config(config.key.clone());
        let parent = config
            .relations
            .parent_key(&key)
            .or_else(|| key.parent_key());

        let template = match &parent {
            None | Some(Key::Branch(_)) if component.is_shared_code() => {
                &self.template.shared_code_config
            }
            None | Some(Key::Branch(_)) => &self.template.config,
            Some(Key::Config(_)) if component.is_scheduler() => &self.template.scheduler_config,
            Some(Key::Config(_)) if component.is_variables() => &self.template.variables_config,
            Some(Key::ConfigRow(row))
                if component.is_variables()
                    && row.component_id.as_str() == SHARED_CODE_COMPONENT_ID =>
            {
                &self.template.variables_config
            }
            other => panic!(
                "unexpected parent {} of {} for component \"{}\"",
                other.as_ref().map(Key::desc).unwrap_or_else(|| "none".to_string()),
                key.desc(),
                component.id
            ),
        };

        let target = config
            .shared_code
            .as_ref()
            .map(|s| s.target.to_string())
            .unwrap_or_default();
        let config_id = config.key.id.to_string();
        let name = normalize_name(&config.name);
        let relative = render(
            template,
            &[
                ("component_type", component.component_type.as_str()),
                ("component_id", component.id.as_str()),
                ("config_id", config_id.as_str()),
                ("config_name", name.as_str()),
                ("target_component_id", target.as_str()),
            ],
        );
        self.unique(key, parent_path, relative, Kind::Config)
    }

    pub fn config_row_path(&self, parent_path: &str, component: &Component, row: &ConfigRow) -> AbsPath {
        let template = if component.is_variables() {
            &self.template.variables_values_row
        } else if component.is_shared_code() {
            &self.template.shared_code_config_row
        } else {
            &self.template.config_row
        };

        let mut name = normalize_name(&row.name);
        if name.is_empty() {
            name = row
                .content
                .get("name")
                .and_then(|v| v.as_str())
                .map(normalize_name)
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| "row".to_string());
        }
        let row_id = row.key.id.to_string();
        let relative = render(
            template,
            &[("config_row_id", row_id.as_str()), ("config_row_name", name.as_str())],
        );
        self.unique(Key::ConfigRow(row.key.clone()), parent_path, relative, Kind::ConfigRow)
    }

    /// `<config>/blocks/001-name`
    pub fn block_path(&self, config_path: &str, block: &Block) -> AbsPath {
        self.ordered(
            Key::Block(block.key.clone()),
            &join_path(config_path, BLOCKS_DIR),
            block.key.index,
            &block.name,
            Kind::Block,
        )
    }

    /// `<block>/001-name`
    pub fn code_path(&self, block_path: &str, code: &Code) -> AbsPath {
        self.ordered(
            Key::Code(code.key.clone()),
            block_path,
            code.key.index,
            &code.name,
            Kind::Code,
        )
    }

    /// `<config>/phases/001-name`
    pub fn phase_path(&self, config_path: &str, phase: &Phase) -> AbsPath {
        self.ordered(
            Key::Phase(phase.key.clone()),
            &join_path(config_path, PHASES_DIR),
            phase.key.index,
            &phase.name,
            Kind::Phase,
        )
    }

    /// `<phase>/001-name`
    pub fn task_path(&self, phase_path: &str, task: &Task) -> AbsPath {
        self.ordered(
            Key::Task(task.key.clone()),
            phase_path,
            task.key.index,
            &task.name,
            Kind::Task,
        )
    }

    fn ordered(&self, key: Key, parent_path: &str, index: usize, name: &str, kind: Kind) -> AbsPath {
        let mut name = normalize_name(name);
        if name.is_empty() {
            name = normalize_name(kind.name());
        }
        let relative = format!("{:03}-{}", index + 1, name);
        self.unique(key, parent_path, relative, kind)
    }

    fn unique(&self, key: Key, parent_path: &str, relative: String, kind: Kind) -> AbsPath {
        let relative = if relative.trim_matches('/').is_empty() {
            normalize_name(kind.name())
        } else {
            relative
        };
        self.registry
            .ensure_unique_path(&key, AbsPath::new(parent_path, relative))
    }
}

// ---------------------------------------------------------------------------
// File paths
// ---------------------------------------------------------------------------

pub fn meta_file_path(dir: &str) -> String {
    join_path(dir, META_FILE)
}

pub fn config_file_path(dir: &str) -> String {
    join_path(dir, CONFIG_FILE)
}

pub fn description_file_path(dir: &str) -> String {
    join_path(dir, DESCRIPTION_FILE)
}

pub fn phase_file_path(phase_dir: &str) -> String {
    join_path(phase_dir, PHASE_FILE)
}

pub fn task_file_path(task_dir: &str) -> String {
    join_path(task_dir, TASK_FILE)
}

/// Extension of code files for a component, by runtime.
pub fn code_file_ext(component_id: &str) -> &'static str {
    const SQL_HINTS: [&str; 9] = [
        "snowflake", "redshift", "synapse", "bigquery", "oracle", "mssql", "mysql", "duckdb",
        "sql",
    ];
    if component_id.contains("python") {
        "py"
    } else if component_id.ends_with("r-transformation") {
        "r"
    } else if component_id.contains("julia") {
        "jl"
    } else if SQL_HINTS.iter().any(|hint| component_id.contains(hint)) {
        "sql"
    } else {
        "txt"
    }
}

pub fn code_file_name(component_id: &str) -> String {
    format!("{CODE_FILE_NAME}.{}", code_file_ext(component_id))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::component::{
        SCHEDULER_COMPONENT_ID, SHARED_CODE_COMPONENT_ID, VARIABLES_COMPONENT_ID,
    };
    use crate::key::{BranchKey, ConfigKey, ConfigRowKey, PhaseKey};
    use crate::object::SharedCodeConfig;
    use crate::relation::Relation;

    fn generator() -> Generator {
        Generator::new(Template::default(), Arc::new(Registry::new()))
    }

    fn branch(id: u64, name: &str, is_default: bool) -> Branch {
        Branch {
            key: BranchKey { id: id.into() },
            name: name.to_string(),
            description: String::new(),
            is_default,
        }
    }

    fn extractor() -> Component {
        Component::new("keboola.ex-db", "extractor", "DB")
    }

    #[test]
    fn default_branch_is_main_then_suffixed() {
        let g = generator();
        assert_eq!(g.branch_path(&branch(1, "Main", true)).path(), "main");
        assert_eq!(g.branch_path(&branch(2, "Main", true)).path(), "main-001");
    }

    #[test]
    fn branch_name_is_normalized() {
        let g = generator();
        assert_eq!(g.branch_path(&branch(5, "branchName", false)).path(), "branch-name");
    }

    #[test]
    fn suffixes_apply_across_kinds_under_same_parent() {
        let g = Generator::new(
            Template {
                config: "prefix".to_string(),
                config_row: "prefix".to_string(),
                ..Template::default()
            },
            Arc::new(Registry::new()),
        );
        let mut paths = Vec::new();
        for id in 1..=3 {
            let config = Config::new(ConfigKey::new(1, "keboola.ex-db", id.to_string()), "x");
            paths.push(g.config_path("main", &extractor(), &config).path());
        }
        for id in 1..=3 {
            let parent = ConfigKey::new(1, "keboola.ex-db", "1");
            let row = ConfigRow::new(ConfigRowKey::new(&parent, id.to_string()), "x");
            paths.push(g.config_row_path("main", &extractor(), &row).path());
        }
        assert_eq!(
            paths,
            vec![
                "main/prefix",
                "main/prefix-001",
                "main/prefix-002",
                "main/prefix-003",
                "main/prefix-004",
                "main/prefix-005",
            ]
        );
    }

    #[test]
    fn empty_template_falls_back_to_kind_name() {
        let g = Generator::new(
            Template {
                config: String::new(),
                config_row: String::new(),
                ..Template::default()
            },
            Arc::new(Registry::new()),
        );
        let config = Config::new(ConfigKey::new(1, "keboola.ex-db", "1"), "x");
        assert_eq!(g.config_path("", &extractor(), &config).path(), "config");
        let row = ConfigRow::new(ConfigRowKey::new(&config.key, "2"), "x");
        assert_eq!(g.config_row_path("", &extractor(), &row).path(), "config-row");
    }

    #[test]
    fn row_name_falls_back_to_content_then_row() {
        let g = generator();
        let config = ConfigKey::new(1, "keboola.ex-db", "1");

        let mut row = ConfigRow::new(ConfigRowKey::new(&config, "2"), "");
        row.content.insert("name".to_string(), "From Content".into());
        assert_eq!(g.config_row_path("cfg", &extractor(), &row).path(), "cfg/rows/from-content");

        let row = ConfigRow::new(ConfigRowKey::new(&config, "3"), "");
        assert_eq!(g.config_row_path("cfg", &extractor(), &row).path(), "cfg/rows/row");
    }

    #[rstest]
    #[case(SHARED_CODE_COMPONENT_ID, None, "main/_shared/keboola.python-transformation")]
    #[case(SCHEDULER_COMPONENT_ID, Some("scheduler"), "main/ex/cfg/schedules/my-schedule")]
    #[case(VARIABLES_COMPONENT_ID, Some("variables"), "main/ex/cfg/variables")]
    fn template_depends_on_parent_and_component(
        #[case] component_id: &str,
        #[case] relation: Option<&str>,
        #[case] expected: &str,
    ) {
        let g = generator();
        let component = Component::infer(&component_id.into());
        let mut config = Config::new(ConfigKey::new(1, component_id, "9"), "My Schedule");
        config.shared_code = Some(SharedCodeConfig {
            target: "keboola.python-transformation".into(),
        });
        let parent_path = match relation {
            Some("scheduler") => {
                config.relations.add(Relation::SchedulerFor {
                    component_id: "keboola.ex-db".into(),
                    config_id: "1".into(),
                });
                "main/ex/cfg"
            }
            Some(_) => {
                config.relations.add(Relation::VariablesFor {
                    component_id: "keboola.ex-db".into(),
                    config_id: "1".into(),
                });
                "main/ex/cfg"
            }
            None => "main",
        };
        assert_eq!(g.config_path(parent_path, &component, &config).path(), expected);
    }

    #[test]
    #[should_panic(expected = "unexpected parent")]
    fn unmatched_template_combination_panics() {
        let g = generator();
        let mut config = Config::new(ConfigKey::new(1, "keboola.ex-db", "9"), "x");
        config.relations.add(Relation::VariablesFor {
            component_id: "keboola.ex-other".into(),
            config_id: "1".into(),
        });
        g.config_path("main/x", &extractor(), &config);
    }

    #[test]
    fn phase_paths_use_one_based_order() {
        let g = generator();
        let config = ConfigKey::new(1, "keboola.orchestrator", "9");
        let phase = Phase {
            key: PhaseKey::new(&config, 0),
            name: "Extract Data".to_string(),
            ..Phase::default()
        };
        assert_eq!(
            g.phase_path("main/orch", &phase).path(),
            "main/orch/phases/001-extract-data"
        );
        let unnamed = Phase {
            key: PhaseKey::new(&config, 1),
            ..Phase::default()
        };
        assert_eq!(g.phase_path("main/orch", &unnamed).path(), "main/orch/phases/002-phase");
    }

    #[rstest]
    #[case("keboola.snowflake-transformation", "code.sql")]
    #[case("keboola.python-transformation-v2", "code.py")]
    #[case("keboola.r-transformation", "code.r")]
    #[case("keboola.something-else", "code.txt")]
    fn code_file_names(#[case] component: &str, #[case] expected: &str) {
        assert_eq!(code_file_name(component), expected);
    }
}
