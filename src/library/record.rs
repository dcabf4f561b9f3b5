//! Catalog record store: one JSON file per item in the metadata directory.
//!
//! The directory listing is the index; there is no separate catalog file.
//! Writes go to a hidden temporary file first and are renamed into place,
//! so readers never observe a partially written record.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs::{self, ReadDir};
use uuid::Uuid;

use super::item::{ItemId, LibraryItem};
use crate::error::{LibraryError, Result};

const RECORD_EXT: &str = ".json";

/// File-backed record store
#[derive(Debug, Clone)]
pub struct RecordStore {
    root: PathBuf,
}

impl RecordStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether the store directory exists
    pub fn is_ready(&self) -> bool {
        self.root.is_dir()
    }

    fn record_path(&self, id: &ItemId) -> PathBuf {
        self.root.join(format!("{}{}", id.as_str(), RECORD_EXT))
    }

    /// Persist a record, fully replacing any previous record with its id
    pub async fn put(&self, item: &LibraryItem) -> Result<()> {
        let path = self.record_path(&item.id);
        let tmp_path = self
            .root
            .join(format!(".{}.{}.tmp", item.id.as_str(), Uuid::new_v4().simple()));

        let content = serde_json::to_string_pretty(item)?;

        if let Err(e) = fs::write(&tmp_path, content).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(LibraryError::Storage(format!(
                "Failed to write record {}: {}",
                tmp_path.display(),
                e
            )));
        }

        if let Err(e) = fs::rename(&tmp_path, &path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(LibraryError::Storage(format!(
                "Failed to publish record {}: {}",
                path.display(),
                e
            )));
        }

        Ok(())
    }

    /// Load a record; `Ok(None)` when no record exists for `id`
    pub async fn get(&self, id: &ItemId) -> Result<Option<LibraryItem>> {
        read_record(&self.record_path(id)).await
    }

    /// Remove a record; absent records are not an error.
    ///
    /// Returns whether a record was actually removed.
    pub async fn delete(&self, id: &ItemId) -> Result<bool> {
        remove_record(&self.record_path(id)).await
    }

    /// Remove the file a listed record was read from, whatever id it
    /// carries.
    pub async fn delete_stored(&self, stored: &StoredRecord) -> Result<bool> {
        if stored.path.parent() != Some(self.root.as_path()) {
            return Err(LibraryError::Storage(format!(
                "Record {} is outside {}",
                stored.path.display(),
                self.root.display()
            )));
        }
        remove_record(&stored.path).await
    }

    /// Start a pass over every stored record.
    ///
    /// The cursor reads the directory lazily; call again to restart.
    pub async fn list_all(&self) -> Result<RecordCursor> {
        let entries = match fs::read_dir(&self.root).await {
            Ok(entries) => Some(entries),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };
        Ok(RecordCursor { entries })
    }
}

/// A record together with the file it was read from
#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub path: PathBuf,
    pub item: LibraryItem,
}

/// Lazy iterator over the records directory
pub struct RecordCursor {
    entries: Option<ReadDir>,
}

impl RecordCursor {
    /// Next record, or `None` when the directory is exhausted.
    ///
    /// An unreadable record yields `Some(Err(..))` and the pass continues
    /// with the following entry.
    pub async fn next_record(&mut self) -> Option<Result<StoredRecord>> {
        let entries = self.entries.as_mut()?;

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => {
                    self.entries = None;
                    return None;
                }
                Err(e) => {
                    self.entries = None;
                    return Some(Err(e.into()));
                }
            };

            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if name.starts_with('.') || !name.ends_with(RECORD_EXT) {
                continue;
            }

            let path = entry.path();
            match read_record(&path).await {
                Ok(Some(item)) => return Some(Ok(StoredRecord { path, item })),
                // Removed between listing and reading
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

async fn remove_record(path: &Path) -> Result<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(LibraryError::Storage(format!(
            "Failed to delete record {}: {}",
            path.display(),
            e
        ))),
    }
}

async fn read_record(path: &Path) -> Result<Option<LibraryItem>> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    serde_json::from_str(&content).map(Some).map_err(|e| {
        LibraryError::Storage(format!("Failed to parse record {}: {}", path.display(), e))
    })
}
