//! A JSON file implementing the core's key-value store contract.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
#[cfg(test)]
use std::path::Path;
use std::path::PathBuf;

use passkit_core::store::{KeyValueStore, StorageResult};
use passkit_core::StorageError;

/// Stores every key in one JSON object on disk.
///
/// Each write rewrites the whole file through a temporary sibling and a
/// rename, so readers never observe a half-written file.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<data dir>/passkit/credential.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join("passkit").join("credential.json"))
    }

    #[cfg(test)]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> StorageResult<BTreeMap<String, String>> {
        match fs::read(&self.path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                StorageError::ReadFailure(format!("{}: {e}", self.path.display()))
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(StorageError::ReadFailure(format!(
                "{}: {e}",
                self.path.display()
            ))),
        }
    }

    fn write_entries(&self, entries: &BTreeMap<String, String>) -> StorageResult<()> {
        let write_failure =
            |e: &dyn std::fmt::Display| StorageError::WriteFailure(format!("{}: {e}", self.path.display()));

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| write_failure(&e))?;
        }
        let bytes = serde_json::to_vec_pretty(entries).map_err(|e| write_failure(&e))?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, bytes).map_err(|e| write_failure(&e))?;
        fs::rename(&tmp, &self.path).map_err(|e| write_failure(&e))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: String) -> StorageResult<Option<String>> {
        Ok(self.read_entries()?.remove(&key))
    }

    fn set(&self, key: String, value: String) -> StorageResult<()> {
        let mut entries = self.read_entries()?;
        entries.insert(key, value);
        self.write_entries(&entries)
    }

    fn remove(&self, key: String) -> StorageResult<()> {
        let mut entries = self.read_entries()?;
        if entries.remove(&key).is_some() {
            self.write_entries(&entries)?;
        }
        Ok(())
    }
}
