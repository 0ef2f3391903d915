use std::{
    collections::{BTreeMap, HashMap},
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};
use tempfile::NamedTempFile;

/// A durable string-keyed store, in the spirit of a browser's
/// `localStorage`.
///
/// Writes go through `&self` so a store can be shared freely.
pub trait Storage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
    /// Removing a missing key is not an error.
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

impl<'a, S: Storage + ?Sized> Storage for &'a S {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set_item(key, value)
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove_item(key)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Unable to access the storage file")]
    Io(#[from] io::Error),
    #[error("The storage file is malformed")]
    Format(#[from] serde_json::Error),
}

/// A [`Storage`] which only lives as long as the process does.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self { MemoryStorage::default() }

    fn items(&self) -> MutexGuard<'_, HashMap<String, String>> {
        // a panic mid-insert can't leave the map half-written
        self.items.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.items().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.items().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.items().remove(key);
        Ok(())
    }
}

/// A [`Storage`] backed by a JSON object on disk.
///
/// The whole file is read on every access and atomically replaced on every
/// change. A missing file is treated as empty.
///
/// There is no locking. Concurrent writers are last-write-wins at the level
/// of the whole file, so two processes setting *different* keys at the same
/// time can lose one of the keys, not just an older value of the same key.
#[derive(Debug, Clone, PartialEq)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileStorage { path: path.into() }
    }

    pub fn path(&self) -> &Path { &self.path }

    fn load(&self) -> Result<BTreeMap<String, String>, StorageError> {
        match fs::read(&self.path) {
            Ok(raw) => serde_json::from_slice(&raw).map_err(Into::into),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Ok(BTreeMap::new())
            },
            Err(e) => Err(e.into()),
        }
    }

    fn save(
        &self,
        items: &BTreeMap<String, String>,
    ) -> Result<(), StorageError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let raw = serde_json::to_vec_pretty(items)?;
        log::trace!("Writing {} bytes to {}", raw.len(), self.path.display());

        // write to a sibling and rename it over the original so readers never
        // see a half-written file
        let mut temp = NamedTempFile::new_in(dir)?;
        temp.write_all(&raw)?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| e.error)?;

        Ok(())
    }
}

impl Storage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.load()?.remove(key))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut items = self.load()?;
        items.insert(key.to_string(), value.to_string());
        self.save(&items)
    }

    /// A malformed file can't be edited, so it is thrown away entirely.
    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let mut items = match self.load() {
            Ok(items) => items,
            Err(StorageError::Format(e)) => {
                log::warn!(
                    "Discarding {} because it is malformed: {}",
                    self.path.display(),
                    e
                );
                return remove_file(&self.path);
            },
            Err(e) => return Err(e),
        };

        if items.remove(key).is_some() {
            self.save(&items)?;
        }

        Ok(())
    }
}

fn remove_file(path: &Path) -> Result<(), StorageError> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}
