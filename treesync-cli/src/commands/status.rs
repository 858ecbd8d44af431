//! `treesync status`: every object with its path and state.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use treesync_core::ObjectState;

use super::project::Project;
use super::{check_report, print_report};

/// Arguments for `treesync status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self, dir: &Path) -> Result<()> {
        let (project, report) = Project::load(dir)?;
        let rows: Vec<ObjectRow> = project
            .state
            .keys()
            .into_iter()
            .filter_map(|key| project.state.get(&key))
            .map(ObjectRow::from_state)
            .collect();

        if self.json {
            let payload = StatusJson {
                objects: rows,
                errors: report.has_errors().then(|| report.errors.to_string()),
                warnings: report.warnings.clone(),
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).context("failed to serialize status JSON")?
            );
        } else {
            print_table(rows);
            print_report(&report);
        }
        check_report(&report)
    }
}

#[derive(Debug, Serialize, Tabled)]
struct ObjectRow {
    #[tabled(rename = "kind")]
    kind: String,
    #[tabled(rename = "path")]
    path: String,
    #[tabled(rename = "name")]
    name: String,
    #[tabled(rename = "state")]
    state: String,
}

impl ObjectRow {
    fn from_state(object_state: &ObjectState) -> Self {
        let name = object_state
            .local
            .as_ref()
            .or(object_state.remote.as_ref())
            .map(|o| o.name().to_string())
            .unwrap_or_default();
        Self {
            kind: object_state.key().kind().name().to_string(),
            path: object_state.path(),
            name,
            state: state_label(object_state).to_string(),
        }
    }
}

#[derive(Serialize)]
struct StatusJson {
    objects: Vec<ObjectRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<String>,
    warnings: Vec<String>,
}

fn state_label(object_state: &ObjectState) -> &'static str {
    let state = &object_state.record.state;
    if state.not_found {
        "not found"
    } else if state.invalid {
        "invalid"
    } else if !state.persisted {
        "new"
    } else {
        "ok"
    }
}

fn print_table(rows: Vec<ObjectRow>) {
    println!(
        "treesync v{} | {} objects",
        env!("CARGO_PKG_VERSION"),
        rows.len()
    );
    if rows.is_empty() {
        println!("No objects in the manifest.");
        return;
    }
    let problems = rows.iter().filter(|r| r.state != "ok").count();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    if problems > 0 {
        println!("{}", format!("{problems} object(s) need attention").yellow());
    }
}
