//! Relative path helpers and tracking of known paths.
//!
//! Paths are `/`-separated and relative to the project directory.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::FsError;
use crate::fs::Filesystem;

// ---------------------------------------------------------------------------
// 1. Path helpers
// ---------------------------------------------------------------------------

pub fn join_path(base: &str, relative: &str) -> String {
    match (base.is_empty(), relative.is_empty()) {
        (true, _) => relative.to_string(),
        (false, true) => base.to_string(),
        (false, false) => format!("{}/{}", base.trim_end_matches('/'), relative),
    }
}

/// `a/b/c` -> `a/b`; top-level paths have the empty parent.
pub fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("")
}

/// `a/b/c` -> `c`.
pub fn file_name(path: &str) -> &str {
    path.rsplit_once('/').map(|(_, name)| name).unwrap_or(path)
}

/// `base/x/y` relative to `base` -> `x/y`.
pub fn relative_to<'a>(path: &'a str, base: &str) -> Option<&'a str> {
    if base.is_empty() {
        return Some(path);
    }
    if path == base {
        return Some("");
    }
    path.strip_prefix(base)?.strip_prefix('/')
}

/// Whether `path` is `base` or lies below it.
pub fn is_within(path: &str, base: &str) -> bool {
    relative_to(path, base).is_some()
}

fn is_hidden(path: &str) -> bool {
    path.split('/').any(|segment| segment.starts_with('.'))
}

// ---------------------------------------------------------------------------
// 2. KnownPaths
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PathKind {
    File,
    Dir,
}

/// Every visible path of the project, split into tracked and untracked.
#[derive(Debug, Clone, Default)]
pub struct KnownPaths {
    all: BTreeMap<String, PathKind>,
    tracked: BTreeSet<String>,
}

impl KnownPaths {
    /// Walks the filesystem; hidden entries are skipped.
    pub fn new(fs: &dyn Filesystem) -> Result<Self, FsError> {
        let entries = fs.walk()?;
        Ok(Self::from_entries(
            entries.into_iter().map(|e| (e.path, e.is_dir)),
        ))
    }

    pub fn from_entries(entries: impl IntoIterator<Item = (String, bool)>) -> Self {
        let all = entries
            .into_iter()
            .filter(|(path, _)| !path.is_empty() && !is_hidden(path))
            .map(|(path, is_dir)| {
                let kind = if is_dir { PathKind::Dir } else { PathKind::File };
                (path, kind)
            })
            .collect();
        Self {
            all,
            tracked: BTreeSet::new(),
        }
    }

    pub fn is_file(&self, path: &str) -> bool {
        self.all.get(path) == Some(&PathKind::File)
    }

    pub fn is_dir(&self, path: &str) -> bool {
        self.all.get(path) == Some(&PathKind::Dir)
    }

    /// Marks the path and all its ancestors. Unknown paths are ignored.
    pub fn mark_tracked(&mut self, path: &str) {
        if !self.all.contains_key(path) {
            return;
        }
        let mut current = path;
        while !current.is_empty() {
            if self.all.contains_key(current) {
                self.tracked.insert(current.to_string());
            }
            current = parent_dir(current);
        }
    }

    /// Marks the path and everything below it.
    pub fn mark_sub_paths_tracked(&mut self, path: &str) {
        self.mark_tracked(path);
        let below: Vec<String> = self
            .all
            .keys()
            .filter(|p| p.as_str() != path && is_within(p, path))
            .cloned()
            .collect();
        self.tracked.extend(below);
    }

    pub fn tracked_paths(&self) -> Vec<String> {
        self.tracked.iter().cloned().collect()
    }

    pub fn untracked_paths(&self) -> Vec<String> {
        self.all
            .keys()
            .filter(|p| !self.tracked.contains(*p))
            .cloned()
            .collect()
    }

    pub fn untracked_dirs_in(&self, dir: &str) -> Vec<String> {
        self.all
            .iter()
            .filter(|(p, kind)| {
                **kind == PathKind::Dir && !self.tracked.contains(*p) && parent_dir(p) == dir
            })
            .map(|(p, _)| p.clone())
            .collect()
    }
}
