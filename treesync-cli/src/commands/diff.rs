//! `treesync diff`: unified diffs of what `fix` would write.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use treesync_mapper::diff::diff_local;
use treesync_mapper::LocalManager;

use super::project::Project;
use super::{check_report, print_report};

/// Arguments for `treesync diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {}

impl DiffArgs {
    pub fn run(self, dir: &Path) -> Result<()> {
        let (project, mut report) = Project::load(dir)?;
        let manager = LocalManager::new(&project.fs, &project.pipeline, &project.naming);
        let keys = project.local_keys();
        let diffs = diff_local(&manager, &project.fs, &project.state, &keys, &mut report)
            .context("diff failed")?;

        if diffs.is_empty() {
            println!("No differences.");
        }
        for diff in diffs {
            print!("{}", diff.unified_diff);
            if !diff.unified_diff.ends_with('\n') {
                println!();
            }
        }
        print_report(&report);
        check_report(&report)
    }
}
