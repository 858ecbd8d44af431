//! Filesystem abstraction.
//!
//! All paths are relative to the project root and `/`-separated. [`DirFs`]
//! works on a real directory, [`MemoryFs`] keeps everything in memory.
//!
//! ## Atomic writes
//!
//! `DirFs::write_file` writes `<path>.tmp` next to the target and renames it
//! over the target. On rename failure the temp file is removed and the
//! original stays intact.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{io_err, FsError};
use crate::object::Content;
use crate::paths::{is_within, join_path, parent_dir, relative_to};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    pub path: String,
    pub is_dir: bool,
}

pub trait Filesystem {
    /// Reads a file; `description` names the file in the not-found error.
    fn read_file(&self, path: &str, description: &str) -> Result<String, FsError>;

    /// Writes a file, creating missing parent directories.
    fn write_file(&self, path: &str, content: &str) -> Result<(), FsError>;

    /// Removes a file or a whole directory. Missing paths are fine.
    fn remove(&self, path: &str) -> Result<(), FsError>;

    /// Moves a file or directory, creating missing parents of `to`.
    fn move_path(&self, from: &str, to: &str) -> Result<(), FsError>;

    /// Names of direct sub-directories, sorted.
    fn read_sub_dirs(&self, dir: &str) -> Result<Vec<String>, FsError>;

    /// Names of direct files, sorted.
    fn read_files(&self, dir: &str) -> Result<Vec<String>, FsError>;

    fn exists(&self, path: &str) -> bool;

    fn is_dir(&self, path: &str) -> bool;

    fn is_file(&self, path: &str) -> bool;

    /// Every path below the root, sorted.
    fn walk(&self) -> Result<Vec<WalkEntry>, FsError>;
}

// ---------------------------------------------------------------------------
// 1. Typed helpers
// ---------------------------------------------------------------------------

pub fn read_json<T: DeserializeOwned>(
    fs: &dyn Filesystem,
    path: &str,
    description: &str,
) -> Result<T, FsError> {
    let raw = fs.read_file(path, description)?;
    serde_json::from_str(&raw).map_err(|source| FsError::Json {
        description: description.to_string(),
        path: path.to_string(),
        source,
    })
}

/// Reads a JSON object, keeping key order.
pub fn read_json_map(fs: &dyn Filesystem, path: &str, description: &str) -> Result<Content, FsError> {
    read_json(fs, path, description)
}

pub fn read_yaml<T: DeserializeOwned>(
    fs: &dyn Filesystem,
    path: &str,
    description: &str,
) -> Result<T, FsError> {
    let raw = fs.read_file(path, description)?;
    serde_yaml::from_str(&raw).map_err(|source| FsError::Yaml {
        description: description.to_string(),
        path: path.to_string(),
        source,
    })
}

/// Pretty JSON with a trailing newline, the format of every JSON file we write.
pub fn to_json_string<T: Serialize + ?Sized>(path: &str, value: &T) -> Result<String, FsError> {
    let mut out = serde_json::to_string_pretty(value).map_err(|source| FsError::Encode {
        path: path.to_string(),
        source,
    })?;
    out.push('\n');
    Ok(out)
}

pub fn write_json<T: Serialize + ?Sized>(
    fs: &dyn Filesystem,
    path: &str,
    value: &T,
) -> Result<(), FsError> {
    let content = to_json_string(path, value)?;
    fs.write_file(path, &content)
}

// ---------------------------------------------------------------------------
// 2. DirFs
// ---------------------------------------------------------------------------

/// Filesystem rooted at a real directory.
#[derive(Debug, Clone)]
pub struct DirFs {
    root: PathBuf,
}

impl DirFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn abs(&self, path: &str) -> PathBuf {
        path.split('/')
            .filter(|s| !s.is_empty())
            .fold(self.root.clone(), |acc, segment| acc.join(segment))
    }

    fn read_entries(&self, dir: &str, want_dirs: bool) -> Result<Vec<String>, FsError> {
        let abs = self.abs(dir);
        let entries = match std::fs::read_dir(&abs) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(err) => return Err(io_err(abs, err)),
        };
        let mut names: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_dir() == want_dirs).unwrap_or(false))
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        Ok(names)
    }

    fn walk_dir(&self, dir: &str, out: &mut Vec<WalkEntry>) -> Result<(), FsError> {
        for name in self.read_entries(dir, true)? {
            let path = join_path(dir, &name);
            out.push(WalkEntry {
                path: path.clone(),
                is_dir: true,
            });
            self.walk_dir(&path, out)?;
        }
        for name in self.read_entries(dir, false)? {
            out.push(WalkEntry {
                path: join_path(dir, &name),
                is_dir: false,
            });
        }
        Ok(())
    }
}

impl Filesystem for DirFs {
    fn read_file(&self, path: &str, description: &str) -> Result<String, FsError> {
        let abs = self.abs(path);
        match std::fs::read_to_string(&abs) {
            Ok(content) => Ok(content.replace("\r\n", "\n")),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(FsError::NotFound {
                description: description.to_string(),
                path: path.to_string(),
            }),
            Err(err) => Err(io_err(abs, err)),
        }
    }

    fn write_file(&self, path: &str, content: &str) -> Result<(), FsError> {
        let abs = self.abs(path);
        if let Some(parent) = abs.parent() {
            std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
        let tmp = PathBuf::from(format!("{}.tmp", abs.display()));
        std::fs::write(&tmp, content).map_err(|e| io_err(&tmp, e))?;
        if let Err(e) = std::fs::rename(&tmp, &abs) {
            let _ = std::fs::remove_file(&tmp);
            return Err(io_err(abs, e));
        }
        tracing::debug!("wrote: {path}");
        Ok(())
    }

    fn remove(&self, path: &str) -> Result<(), FsError> {
        let abs = self.abs(path);
        let result = if abs.is_dir() {
            std::fs::remove_dir_all(&abs)
        } else {
            std::fs::remove_file(&abs)
        };
        match result {
            Ok(()) => {
                tracing::debug!("removed: {path}");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_err(abs, err)),
        }
    }

    fn move_path(&self, from: &str, to: &str) -> Result<(), FsError> {
        let src = self.abs(from);
        let dst = self.abs(to);
        if let Some(parent) = dst.parent() {
            std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
        std::fs::rename(&src, &dst).map_err(|e| io_err(src, e))?;
        tracing::debug!("moved: {from} -> {to}");
        Ok(())
    }

    fn read_sub_dirs(&self, dir: &str) -> Result<Vec<String>, FsError> {
        self.read_entries(dir, true)
    }

    fn read_files(&self, dir: &str) -> Result<Vec<String>, FsError> {
        self.read_entries(dir, false)
    }

    fn exists(&self, path: &str) -> bool {
        self.abs(path).exists()
    }

    fn is_dir(&self, path: &str) -> bool {
        self.abs(path).is_dir()
    }

    fn is_file(&self, path: &str) -> bool {
        self.abs(path).is_file()
    }

    fn walk(&self) -> Result<Vec<WalkEntry>, FsError> {
        let mut out = Vec::new();
        self.walk_dir("", &mut out)?;
        out.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// 3. MemoryFs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Dir,
    File(String),
}

/// In-memory filesystem.
#[derive(Debug, Default)]
pub struct MemoryFs {
    nodes: RefCell<BTreeMap<String, Node>>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_dir(&self, path: &str) {
        let mut nodes = self.nodes.borrow_mut();
        let mut current = path;
        while !current.is_empty() {
            nodes.entry(current.to_string()).or_insert(Node::Dir);
            current = parent_dir(current);
        }
    }

    fn children(&self, dir: &str, want_dirs: bool) -> Vec<String> {
        self.nodes
            .borrow()
            .iter()
            .filter(|(path, node)| {
                parent_dir(path) == dir
                    && !path.is_empty()
                    && matches!(node, Node::Dir) == want_dirs
            })
            .map(|(path, _)| crate::paths::file_name(path).to_string())
            .collect()
    }
}

impl Filesystem for MemoryFs {
    fn read_file(&self, path: &str, description: &str) -> Result<String, FsError> {
        match self.nodes.borrow().get(path) {
            Some(Node::File(content)) => Ok(content.clone()),
            _ => Err(FsError::NotFound {
                description: description.to_string(),
                path: path.to_string(),
            }),
        }
    }

    fn write_file(&self, path: &str, content: &str) -> Result<(), FsError> {
        self.create_dir(parent_dir(path));
        self.nodes
            .borrow_mut()
            .insert(path.to_string(), Node::File(content.to_string()));
        Ok(())
    }

    fn remove(&self, path: &str) -> Result<(), FsError> {
        self.nodes.borrow_mut().retain(|p, _| !is_within(p, path));
        Ok(())
    }

    fn move_path(&self, from: &str, to: &str) -> Result<(), FsError> {
        let moved: Vec<(String, Node)> = {
            let nodes = self.nodes.borrow();
            nodes
                .iter()
                .filter_map(|(p, node)| {
                    relative_to(p, from).map(|rel| (join_path(to, rel), node.clone()))
                })
                .collect()
        };
        self.remove(from)?;
        self.create_dir(parent_dir(to));
        self.nodes.borrow_mut().extend(moved);
        Ok(())
    }

    fn read_sub_dirs(&self, dir: &str) -> Result<Vec<String>, FsError> {
        Ok(self.children(dir, true))
    }

    fn read_files(&self, dir: &str) -> Result<Vec<String>, FsError> {
        Ok(self.children(dir, false))
    }

    fn exists(&self, path: &str) -> bool {
        path.is_empty() || self.nodes.borrow().contains_key(path)
    }

    fn is_dir(&self, path: &str) -> bool {
        path.is_empty() || matches!(self.nodes.borrow().get(path), Some(Node::Dir))
    }

    fn is_file(&self, path: &str) -> bool {
        matches!(self.nodes.borrow().get(path), Some(Node::File(_)))
    }

    fn walk(&self) -> Result<Vec<WalkEntry>, FsError> {
        Ok(self
            .nodes
            .borrow()
            .iter()
            .map(|(path, node)| WalkEntry {
                path: path.clone(),
                is_dir: matches!(node, Node::Dir),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn dir_fs_write_creates_parents_and_cleans_tmp() {
        let tmp = TempDir::new().unwrap();
        let dirfs = DirFs::new(tmp.path());
        dirfs.write_file("main/extractor/cfg/meta.json", "{}\n").unwrap();

        let target = tmp.path().join("main/extractor/cfg/meta.json");
        assert_eq!(fs::read_to_string(&target).unwrap(), "{}\n");
        assert!(!tmp.path().join("main/extractor/cfg/meta.json.tmp").exists());
    }

    #[test]
    fn dir_fs_missing_file_uses_description() {
        let tmp = TempDir::new().unwrap();
        let err = DirFs::new(tmp.path())
            .read_file("main/meta.json", "branch metadata file")
            .unwrap_err();
        assert_eq!(err.to_string(), "missing branch metadata file \"main/meta.json\"");
    }

    #[test]
    fn dir_fs_lists_sorted_entries() {
        let tmp = TempDir::new().unwrap();
        let dirfs = DirFs::new(tmp.path());
        dirfs.write_file("b/file.txt", "").unwrap();
        dirfs.write_file("a/file.txt", "").unwrap();
        dirfs.write_file("top.txt", "").unwrap();

        assert_eq!(dirfs.read_sub_dirs("").unwrap(), vec!["a", "b"]);
        assert_eq!(dirfs.read_files("").unwrap(), vec!["top.txt"]);
        let walked: Vec<String> = dirfs.walk().unwrap().into_iter().map(|e| e.path).collect();
        assert_eq!(walked, vec!["a", "a/file.txt", "b", "b/file.txt", "top.txt"]);
    }

    #[test]
    fn dir_fs_move_and_remove() {
        let tmp = TempDir::new().unwrap();
        let dirfs = DirFs::new(tmp.path());
        dirfs.write_file("old/meta.json", "{}").unwrap();
        dirfs.move_path("old", "nested/new").unwrap();
        assert!(dirfs.is_file("nested/new/meta.json"));
        assert!(!dirfs.exists("old"));

        dirfs.remove("nested").unwrap();
        dirfs.remove("nested").unwrap();
        assert!(!dirfs.exists("nested"));
    }

    #[test]
    fn memory_fs_behaves_like_a_tree() {
        let memfs = MemoryFs::new();
        memfs.write_file("main/x/meta.json", "{}").unwrap();
        memfs.write_file("main/y/meta.json", "{}").unwrap();
        assert_eq!(memfs.read_sub_dirs("main").unwrap(), vec!["x", "y"]);
        assert!(memfs.is_dir("main/x"));

        memfs.move_path("main/x", "main/z").unwrap();
        assert_eq!(memfs.read_sub_dirs("main").unwrap(), vec!["y", "z"]);
        assert_eq!(memfs.read_file("main/z/meta.json", "meta").unwrap(), "{}");

        memfs.remove("main/y").unwrap();
        assert_eq!(memfs.read_sub_dirs("main").unwrap(), vec!["z"]);
    }

    #[test]
    fn json_helpers_write_pretty_with_newline() {
        let memfs = MemoryFs::new();
        let value = serde_json::json!({"b": 1, "a": 2});
        write_json(&memfs, "x.json", &value).unwrap();
        assert_eq!(
            memfs.read_file("x.json", "file").unwrap(),
            "{\n  \"b\": 1,\n  \"a\": 2\n}\n"
        );
        let map = read_json_map(&memfs, "x.json", "file").unwrap();
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["b", "a"]);
    }
}
