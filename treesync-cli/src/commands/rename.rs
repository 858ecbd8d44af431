//! `treesync rename`: move objects to the paths generated from their names.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use treesync_mapper::LocalManager;

use super::project::Project;
use super::{check_report, print_report, print_writes};

/// Arguments for `treesync rename`.
#[derive(Args, Debug)]
pub struct RenameArgs {
    /// List planned moves without touching the disk.
    #[arg(long)]
    pub dry_run: bool,
}

impl RenameArgs {
    pub fn run(self, dir: &Path) -> Result<()> {
        let (mut project, mut report) = Project::load(dir)?;
        let manager = LocalManager::new(&project.fs, &project.pipeline, &project.naming);
        let outcome = manager
            .rename(&mut project.state, &mut project.manifest, self.dry_run)
            .context("rename failed")?;
        report.merge(outcome.report);

        let prefix = if self.dry_run { "[dry-run] " } else { "" };
        if outcome.actions.is_empty() {
            println!("{prefix}✓ nothing to rename");
        } else {
            println!("{prefix}✓ {} rename(s)", outcome.actions.len());
            for action in &outcome.actions {
                println!("  →  {action}");
            }
        }
        if !outcome.writes.is_empty() {
            print_writes(&outcome.writes, self.dry_run);
        }
        print_report(&report);
        check_report(&report)
    }
}
