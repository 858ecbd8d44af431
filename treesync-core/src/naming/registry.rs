//! Bijective `path <-> key` registry.
//!
//! One registry exists per sync run and is shared by reference (`Arc`) between
//! the state and the path generator. Both maps sit behind one mutex so the
//! boundary layer may call in from other threads.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::NamingError;
use crate::key::Key;
use crate::paths::{join_path, parent_dir};
use crate::record::AbsPath;

/// Longest file name most filesystems accept, in bytes.
pub const MAX_FILENAME_LEN: usize = 255;
/// Room reserved for a `-NNN` suffix.
const SUFFIX_LEN: usize = 5;

#[derive(Debug, Default)]
struct Inner {
    by_path: HashMap<String, Key>,
    by_key: HashMap<Key, String>,
}

impl Inner {
    fn attach(&mut self, key: Key, path: String) {
        if let Some(old) = self.by_key.remove(&key) {
            self.by_path.remove(&old);
        }
        self.by_path.insert(path.clone(), key.clone());
        self.by_key.insert(key, path);
    }

    fn is_free_for(&self, key: &Key, path: &str) -> bool {
        match self.by_path.get(path) {
            None => true,
            Some(owner) => owner == key,
        }
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    inner: Mutex<Inner>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Binds `path` to `key`, releasing any previous path of the key.
    /// Re-attaching the same pair is a no-op.
    pub fn attach(&self, key: &Key, path: &str) -> Result<(), NamingError> {
        let mut inner = self.lock();
        if let Some(owner) = inner.by_path.get(path) {
            if owner == key {
                return Ok(());
            }
            return Err(NamingError::PathCollision {
                path: path.to_string(),
                owner: owner.desc(),
                key: key.desc(),
            });
        }
        inner.attach(key.clone(), path.to_string());
        Ok(())
    }

    /// Releases the key's path. Unknown keys are ignored.
    pub fn detach(&self, key: &Key) {
        let mut inner = self.lock();
        if let Some(path) = inner.by_key.remove(key) {
            inner.by_path.remove(&path);
        }
    }

    pub fn path_by_key(&self, key: &Key) -> Option<String> {
        self.lock().by_key.get(key).cloned()
    }

    pub fn key_by_path(&self, path: &str) -> Option<Key> {
        self.lock().by_path.get(path).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a path owned by no other key and binds it to `key`.
    ///
    /// Every segment of the relative path is truncated to fit a file name;
    /// on collision the last segment gets a `-001`, `-002`, ... suffix.
    pub fn ensure_unique_path(&self, key: &Key, path: AbsPath) -> AbsPath {
        let relative = path
            .relative_path()
            .split('/')
            .map(|segment| truncate(segment, MAX_FILENAME_LEN - SUFFIX_LEN))
            .collect::<Vec<_>>()
            .join("/");
        let dir = parent_dir(&relative).to_string();
        let name = crate::paths::file_name(&relative).to_string();

        let mut inner = self.lock();
        let mut candidate = relative.clone();
        let mut suffix = 0;
        while !inner.is_free_for(key, &join_path(path.parent_path(), &candidate)) {
            suffix += 1;
            candidate = join_path(&dir, &format!("{name}-{suffix:03}"));
        }

        let mut unique = path;
        unique.set_relative_path(candidate);
        inner.attach(key.clone(), unique.path());
        unique
    }
}

/// Cuts `s` to at most `max` bytes on a char boundary.
fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
