pub mod diff;
pub mod fix;
pub mod paths;
pub mod project;
pub mod rename;
pub mod status;

use anyhow::{bail, Result};
use colored::Colorize;
use treesync_mapper::{Report, WriteResult};

/// Prints warnings with a `WARN` prefix, then the error tree, to stderr.
pub fn print_report(report: &Report) {
    for warning in &report.warnings {
        eprintln!("{} {warning}", "WARN".yellow().bold());
    }
    if report.has_errors() {
        eprintln!("{}", report.errors.to_string().red());
    }
}

/// Fails the command when the report carries errors.
pub fn check_report(report: &Report) -> Result<()> {
    if report.has_errors() {
        bail!("found {} error(s)", report.errors.len());
    }
    Ok(())
}

/// Lists changed files; unchanged ones are only counted.
pub fn print_writes(writes: &[WriteResult], dry_run: bool) {
    let prefix = if dry_run { "[dry-run] " } else { "" };
    let changed = writes.iter().filter(|w| w.is_change()).count();
    let unchanged = writes.len() - changed;
    if changed == 0 {
        println!("{prefix}✓ nothing to do ({unchanged} unchanged)");
        return;
    }

    println!("{prefix}✓ {changed} changed, {unchanged} unchanged");
    for write in writes {
        match write {
            WriteResult::Written { path } => println!("  ✎  {path}"),
            WriteResult::WouldWrite { path } => println!("  ~  {path}"),
            WriteResult::Deleted { path } => println!("  ✗  {path}"),
            WriteResult::WouldDelete { path } => println!("  -  {path}"),
            WriteResult::Unchanged { .. } => {}
        }
    }
}
