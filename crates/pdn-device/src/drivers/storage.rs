//! Flash-backed document store
//!
//! Documents are JSON files under a single root directory, one file per key.
//! Load failures surface as `Error::Storage` so callers can fall back to
//! defaults instead of wedging the boot sequence.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use pdn_core::prelude::*;
use pdn_core::Error;

pub struct StorageDriver {
    root: PathBuf,
}

impl StorageDriver {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn doc_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }

    pub fn exists(&self, key: &str) -> bool {
        self.doc_path(key).is_file()
    }

    pub fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let path = self.doc_path(key);
        let json = serde_json::to_string_pretty(value)?;
        fs::write(&path, json)
            .map_err(|e| Error::storage(format!("write {}: {e}", path.display())))?;
        debug!(key, "document saved");
        Ok(())
    }

    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let path = self.doc_path(key);
        let json = fs::read_to_string(&path)
            .map_err(|e| Error::storage(format!("read {}: {e}", path.display())))?;
        serde_json::from_str(&json)
            .map_err(|e| Error::storage(format!("decode {}: {e}", path.display())))
    }

    /// Load a document, falling back to its default when missing or corrupt
    pub fn load_or_default<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        match self.load(key) {
            Ok(value) => value,
            Err(err) => {
                if self.exists(key) {
                    warn!(key, error = %err, "document unreadable, using defaults");
                } else {
                    debug!(key, "document missing, using defaults");
                }
                T::default()
            }
        }
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        let path = self.doc_path(key);
        if path.is_file() {
            fs::remove_file(&path)
                .map_err(|e| Error::storage(format!("remove {}: {e}", path.display())))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::tempdir;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Doc {
        name: String,
        count: u32,
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let storage = StorageDriver::new(dir.path()).unwrap();

        let doc = Doc {
            name: "v1per".into(),
            count: 3,
        };
        storage.save("player", &doc).unwrap();
        let loaded: Doc = storage.load("player").unwrap();
        assert_eq!(loaded, doc);
    }

    #[test]
    fn test_load_missing_is_storage_error() {
        let dir = tempdir().unwrap();
        let storage = StorageDriver::new(dir.path()).unwrap();
        let result: Result<Doc> = storage.load("nope");
        assert!(matches!(result, Err(Error::Storage { .. })));
    }

    #[test]
    fn test_load_or_default_on_corrupt_file() {
        let dir = tempdir().unwrap();
        let storage = StorageDriver::new(dir.path()).unwrap();
        std::fs::write(storage.root().join("player.json"), "{not json").unwrap();

        let loaded: Doc = storage.load_or_default("player");
        assert_eq!(loaded, Doc::default());
    }

    #[test]
    fn test_remove_then_exists() {
        let dir = tempdir().unwrap();
        let storage = StorageDriver::new(dir.path()).unwrap();
        storage.save("player", &Doc::default()).unwrap();
        assert!(storage.exists("player"));
        storage.remove("player").unwrap();
        assert!(!storage.exists("player"));
    }
}
