//! `treesync fix`: rewrite every object's files in canonical form.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use treesync_mapper::LocalManager;

use super::project::Project;
use super::{check_report, print_report, print_writes};

/// Arguments for `treesync fix`.
#[derive(Args, Debug)]
pub struct FixArgs {
    /// Show what would be written without actually writing any files.
    #[arg(long)]
    pub dry_run: bool,
}

impl FixArgs {
    pub fn run(self, dir: &Path) -> Result<()> {
        let (mut project, mut report) = Project::load(dir)?;
        let keys = project.local_keys();
        let manager = LocalManager::new(&project.fs, &project.pipeline, &project.naming);

        let outcome = manager.save(&mut project.state, &keys, self.dry_run);
        report.merge(outcome.report);
        manager
            .save_manifest(&project.state, &mut project.manifest, self.dry_run)
            .context("failed to save manifest")?;

        print_writes(&outcome.writes, self.dry_run);
        print_report(&report);
        check_report(&report)
    }
}
