//! Dry-run unified diff support for `treesync diff`.

use similar::TextDiff;

use treesync_core::{Filesystem, Key, State};

use crate::error::MapperError;
use crate::local::LocalManager;
use crate::report::Report;

/// A single rendered file diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    pub path: String,
    pub unified_diff: String,
}

/// Renders what a save of `keys` would write and compares it to the files
/// on disk. Stale files show up as deletions. No files are written.
pub fn diff_local(
    manager: &LocalManager<'_>,
    fs: &dyn Filesystem,
    state: &State,
    keys: &[Key],
    report: &mut Report,
) -> Result<Vec<FileDiff>, MapperError> {
    let mut diffs = Vec::new();
    for plan in manager.plan_save(state, keys, report) {
        for file in &plan.saved.files {
            let rendered = normalize_line_endings(&file.content);
            let existing = read_existing_or_empty(fs, &file.path)?;
            if existing != rendered {
                diffs.push(file_diff(&file.path, &existing, &rendered));
            }
        }
        for path in &plan.stale {
            if fs.is_file(path) {
                let existing = read_existing_or_empty(fs, path)?;
                diffs.push(file_diff(path, &existing, ""));
            }
        }
    }
    Ok(diffs)
}

fn file_diff(path: &str, old: &str, new: &str) -> FileDiff {
    let old_header = format!("a/{path}");
    let new_header = format!("b/{path}");
    let unified = TextDiff::from_lines(old, new)
        .unified_diff()
        .header(&old_header, &new_header)
        .context_radius(3)
        .to_string();
    FileDiff {
        path: path.to_string(),
        unified_diff: unified,
    }
}

fn read_existing_or_empty(fs: &dyn Filesystem, path: &str) -> Result<String, MapperError> {
    if !fs.is_file(path) {
        return Ok(String::new());
    }
    let content = fs.read_file(path, "file")?;
    Ok(normalize_line_endings(&content))
}

fn normalize_line_endings(content: &str) -> String {
    content.replace("\r\n", "\n")
}
