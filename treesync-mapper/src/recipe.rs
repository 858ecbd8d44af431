//! Recipes: what one pipeline stage gets to read and mutate.
//!
//! Per-object recipes own the record and the object while the hooks run;
//! the manager moves them back into the state afterwards. Save recipes are
//! computed for the whole batch before anything is written.

use treesync_core::fs::{to_json_string, Filesystem};
use treesync_core::naming::generator::{config_file_path, description_file_path, meta_file_path};
use treesync_core::naming::Generator;
use treesync_core::paths::join_path;
use treesync_core::{ComponentsMap, Content, FsError, Key, Object, Record, State};

use crate::report::Report;

/// A file to be written, path relative to the project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutFile {
    pub path: String,
    pub content: String,
}

// ---------------------------------------------------------------------------
// Local
// ---------------------------------------------------------------------------

pub struct LocalLoadRecipe<'a> {
    pub fs: &'a dyn Filesystem,
    pub components: &'a ComponentsMap,
    pub naming: &'a Generator,
    pub record: Record,
    pub object: Object,
    pub warnings: Vec<String>,
}

impl LocalLoadRecipe<'_> {
    /// Object directory.
    pub fn path(&self) -> String {
        self.record.path()
    }

    /// Path of a file in the object directory; registers it as related.
    pub fn related(&mut self, relative: &str) -> String {
        self.record.add_related_path(relative);
        join_path(&self.record.path(), relative)
    }
}

pub struct LocalSaveRecipe<'a> {
    pub fs: &'a dyn Filesystem,
    pub state: &'a State,
    pub naming: &'a Generator,
    pub record: Record,
    pub object: Object,
    /// `meta.json` content.
    pub meta: Content,
    /// `config.json` content; `None` for objects without one.
    pub config: Option<Content>,
    pub description: Option<String>,
    /// Additional files, paths relative to the project root.
    pub files: Vec<OutFile>,
    pub warnings: Vec<String>,
}

impl LocalSaveRecipe<'_> {
    pub fn path(&self) -> String {
        self.record.path()
    }

    /// Queues a file relative to the object directory and marks it related.
    pub fn add_file(&mut self, relative: &str, content: String) {
        self.record.add_related_path(relative);
        self.files.push(OutFile {
            path: join_path(&self.record.path(), relative),
            content,
        });
    }

    pub fn add_json_file(&mut self, relative: &str, value: &Content) -> Result<(), FsError> {
        let path = join_path(&self.record.path(), relative);
        let content = to_json_string(&path, value)?;
        self.add_file(relative, content);
        Ok(())
    }

    /// Serializes the core files and returns every file to write.
    pub fn into_files(mut self) -> Result<SavedObject, FsError> {
        let dir = self.record.path();
        let mut files = Vec::new();
        if !self.meta.is_empty() {
            let path = meta_file_path(&dir);
            files.push(OutFile {
                content: to_json_string(&path, &self.meta)?,
                path,
            });
        }
        if let Some(config) = &self.config {
            let path = config_file_path(&dir);
            files.push(OutFile {
                content: to_json_string(&path, config)?,
                path,
            });
        }
        if let Some(description) = &self.description {
            let mut content = description.trim_end().to_string();
            content.push('\n');
            files.push(OutFile {
                path: description_file_path(&dir),
                content,
            });
        }
        files.append(&mut self.files);
        Ok(SavedObject {
            record: self.record,
            object: self.object,
            files,
            warnings: self.warnings,
        })
    }
}

/// Output of the save hooks of one object.
#[derive(Debug, Clone)]
pub struct SavedObject {
    pub record: Record,
    pub object: Object,
    pub files: Vec<OutFile>,
    pub warnings: Vec<String>,
}

// ---------------------------------------------------------------------------
// Remote
// ---------------------------------------------------------------------------

/// An object received from the API, mapped into its model form.
pub struct RemoteLoadRecipe<'a> {
    pub components: &'a ComponentsMap,
    pub object: Object,
    pub warnings: Vec<String>,
}

/// A local object mapped into the API form before it is sent.
pub struct RemoteSaveRecipe<'a> {
    pub state: &'a State,
    pub record: &'a Record,
    pub object: Object,
    pub warnings: Vec<String>,
}

// ---------------------------------------------------------------------------
// Persist
// ---------------------------------------------------------------------------

/// A new object found on disk, before it is loaded.
pub struct PersistRecipe<'a> {
    pub state: &'a State,
    pub parent_key: Option<Key>,
    pub record: &'a mut Record,
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Keys touched by one operation.
#[derive(Debug, Clone, Default)]
pub struct Changes {
    pub loaded: Vec<Key>,
    pub saved: Vec<Key>,
    pub persisted: Vec<Key>,
    pub deleted: Vec<Key>,
}

impl Changes {
    pub fn is_empty(&self) -> bool {
        self.loaded.is_empty()
            && self.saved.is_empty()
            && self.persisted.is_empty()
            && self.deleted.is_empty()
    }
}

/// Whole-state context of an operation listener.
pub struct OperationContext<'a> {
    pub state: &'a mut State,
    pub fs: &'a dyn Filesystem,
    pub naming: &'a Generator,
    pub report: &'a mut Report,
}
