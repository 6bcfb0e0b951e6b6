//! Backends for the singleton active-session record.
//!
//! The tracker never touches the filesystem directly; it is handed a
//! [`StateBackend`]. Production uses [`FileStateStore`]; tests swap in
//! [`MemoryStateStore`].
//!
//! # Atomic Creation
//!
//! `FileStateStore::create` writes the record to a temp file in the same
//! directory and links it into place with a no-clobber rename. Two concurrent
//! `start` invocations can both get this far, but exactly one rename wins and
//! a reader never sees a half-written record.

use std::cell::RefCell;
use std::io::Write;
use std::path::{Path, PathBuf};

use fs_err as fs;
use tempfile::NamedTempFile;

use crate::artifacts::{create_private_dir_all, harden, FILE_MODE};
use crate::error::{Result, RtlogError};

pub trait StateBackend {
    /// Raw record content, `None` when no record exists.
    fn read(&self) -> Result<Option<String>>;

    /// Creates the record. Returns `false` without touching anything if a
    /// record already exists.
    fn create(&self, contents: &str) -> Result<bool>;

    /// Deletes the record. Absent records are not an error.
    fn remove(&self) -> Result<()>;

    /// Human-readable location for messages.
    fn location(&self) -> String;
}

#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateBackend for FileStateStore {
    fn read(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(RtlogError::io("read state file", e)),
        }
    }

    fn create(&self, contents: &str) -> Result<bool> {
        let parent = self.path.parent().ok_or_else(|| {
            RtlogError::InvalidRecord(format!(
                "state file {} has no parent directory",
                self.path.display()
            ))
        })?;
        create_private_dir_all(parent)?;

        let mut temp_file =
            NamedTempFile::new_in(parent).map_err(|e| RtlogError::io("create temp state file", e))?;
        temp_file
            .write_all(contents.as_bytes())
            .map_err(|e| RtlogError::io("write temp state file", e))?;
        temp_file
            .flush()
            .map_err(|e| RtlogError::io("flush temp state file", e))?;

        match temp_file.persist_noclobber(&self.path) {
            Ok(_) => {}
            Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => return Err(RtlogError::io("install state file", e.error)),
        }

        harden(&self.path, FILE_MODE)?;
        Ok(true)
    }

    fn remove(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(RtlogError::io("remove state file", e)),
        }
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-memory record for tests.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    contents: RefCell<Option<String>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds raw content, e.g. to simulate a corrupt record.
    pub fn with_contents(contents: impl Into<String>) -> Self {
        Self {
            contents: RefCell::new(Some(contents.into())),
        }
    }
}

impl StateBackend for MemoryStateStore {
    fn read(&self) -> Result<Option<String>> {
        Ok(self.contents.borrow().clone())
    }

    fn create(&self, contents: &str) -> Result<bool> {
        let mut slot = self.contents.borrow_mut();
        if slot.is_some() {
            return Ok(false);
        }
        *slot = Some(contents.to_string());
        Ok(true)
    }

    fn remove(&self) -> Result<()> {
        self.contents.borrow_mut().take();
        Ok(())
    }

    fn location(&self) -> String {
        "<memory>".to_string()
    }
}

impl<T: StateBackend + ?Sized> StateBackend for &T {
    fn read(&self) -> Result<Option<String>> {
        (**self).read()
    }

    fn create(&self, contents: &str) -> Result<bool> {
        (**self).create(contents)
    }

    fn remove(&self) -> Result<()> {
        (**self).remove()
    }

    fn location(&self) -> String {
        (**self).location()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_store_missing_file_reads_none() {
        let temp = tempdir().unwrap();
        let store = FileStateStore::new(temp.path().join(".rtlog_state"));
        assert_eq!(store.read().unwrap(), None);
    }

    #[test]
    fn file_store_create_is_exclusive() {
        let temp = tempdir().unwrap();
        let store = FileStateStore::new(temp.path().join("root").join(".rtlog_state"));

        assert!(store.create("first").unwrap());
        assert!(!store.create("second").unwrap());
        assert_eq!(store.read().unwrap().as_deref(), Some("first"));

        let leftovers: Vec<_> = std::fs::read_dir(temp.path().join("root"))
            .unwrap()
            .collect();
        assert_eq!(leftovers.len(), 1, "temp file left behind");
    }

    #[cfg(unix)]
    #[test]
    fn file_store_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempdir().unwrap();
        let root = temp.path().join("root");
        let store = FileStateStore::new(root.join(".rtlog_state"));
        store.create("x").unwrap();

        let file_mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        let dir_mode = std::fs::metadata(&root).unwrap().permissions().mode();
        assert_eq!(file_mode & 0o777, 0o600);
        assert_eq!(dir_mode & 0o777, 0o700);
    }

    #[test]
    fn file_store_remove_is_idempotent() {
        let temp = tempdir().unwrap();
        let store = FileStateStore::new(temp.path().join(".rtlog_state"));
        store.create("x").unwrap();
        store.remove().unwrap();
        store.remove().unwrap();
        assert_eq!(store.read().unwrap(), None);
    }

    #[test]
    fn memory_store_behaves_like_file_store() {
        let store = MemoryStateStore::new();
        assert!(store.create("a").unwrap());
        assert!(!store.create("b").unwrap());
        assert_eq!(store.read().unwrap().as_deref(), Some("a"));
        store.remove().unwrap();
        assert_eq!(store.read().unwrap(), None);
    }
}
