//! `treesync paths`: files and directories no object owns.

use std::path::Path;

use anyhow::Result;
use clap::Args;
use treesync_mapper::LocalManager;

use super::print_report;
use super::project::Project;

/// Arguments for `treesync paths`.
#[derive(Args, Debug)]
pub struct PathsArgs {}

impl PathsArgs {
    pub fn run(self, dir: &Path) -> Result<()> {
        let (project, report) = Project::load(dir)?;
        print_report(&report);

        let untracked = project.state.untracked_paths();
        if untracked.is_empty() {
            println!("No untracked paths.");
            return Ok(());
        }

        let manager = LocalManager::new(&project.fs, &project.pipeline, &project.naming);
        let new_objects = manager.find_new_objects(&project.state);
        for path in untracked {
            if new_objects.contains(&path) {
                println!("{path}  (new object)");
            } else {
                println!("{path}");
            }
        }
        Ok(())
    }
}
