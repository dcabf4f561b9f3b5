//! Media blob store: the downloads directory.
//!
//! Owns the on-disk media files. Blob names are flat (no subdirectories);
//! hidden entries such as the acquisition staging area are never treated
//! as blobs.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs::{self, File};

use super::item::{ItemId, MediaFormat};
use crate::error::{LibraryError, Result};

/// Name of the hidden directory acquisitions stage their output in
pub const STAGING_DIR: &str = ".staging";

/// File-backed blob store rooted at one directory
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

/// An open blob with its size, ready for ranged reads
#[derive(Debug)]
pub struct BlobHandle {
    pub file: File,
    pub length: u64,
}

impl BlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of the store
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory acquisitions stage their output in
    pub fn staging_root(&self) -> PathBuf {
        self.root.join(STAGING_DIR)
    }

    /// Whether the store directory exists
    pub fn is_ready(&self) -> bool {
        self.root.is_dir()
    }

    /// Canonical blob name for an item: `<id>.<ext>`
    pub fn resolve_path(id: &ItemId, format: MediaFormat) -> String {
        format!("{}.{}", id.as_str(), format.extension())
    }

    /// Map a blob name to its path, rejecting anything that could escape
    /// the store directory.
    pub fn blob_path(&self, filename: &str) -> Result<PathBuf> {
        if !is_plain_filename(filename) {
            return Err(LibraryError::NotFound(format!(
                "No such blob: {}",
                filename
            )));
        }
        Ok(self.root.join(filename))
    }

    /// Check whether a blob exists
    pub async fn exists(&self, filename: &str) -> bool {
        match self.blob_path(filename) {
            Ok(path) => fs::metadata(&path)
                .await
                .map(|m| m.is_file())
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Remove a blob; absent blobs are not an error.
    ///
    /// Returns whether a file was actually removed.
    pub async fn delete(&self, filename: &str) -> Result<bool> {
        let path = match self.blob_path(filename) {
            Ok(path) => path,
            Err(_) => return Ok(false),
        };

        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(LibraryError::Storage(format!(
                "Failed to delete blob {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Open a blob for reading
    pub async fn open_for_read(&self, filename: &str) -> Result<BlobHandle> {
        let path = self.blob_path(filename)?;

        let file = match File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(LibraryError::NotFound(format!("No such blob: {}", filename)));
            }
            Err(e) => return Err(e.into()),
        };

        let metadata = file.metadata().await?;
        if !metadata.is_file() {
            return Err(LibraryError::NotFound(format!("No such blob: {}", filename)));
        }

        Ok(BlobHandle {
            file,
            length: metadata.len(),
        })
    }

    /// Move a finished file into the store under `filename`, replacing any
    /// blob of the same name.
    pub async fn adopt(&self, source: &Path, filename: &str) -> Result<PathBuf> {
        let target = self.blob_path(filename)?;

        fs::rename(source, &target).await.map_err(|e| {
            LibraryError::Storage(format!(
                "Failed to move {} to {}: {}",
                source.display(),
                target.display(),
                e
            ))
        })?;

        Ok(target)
    }
}

/// A single path component that is not hidden
fn is_plain_filename(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains('\0')
}

/// Find files in `dir` that belong to item `id`: either exactly `id` or
/// `id.<anything>`.
pub async fn find_by_stem(dir: &Path, id: &ItemId) -> Result<Vec<PathBuf>> {
    let prefix = format!("{}.", id.as_str());
    let mut matches = Vec::new();

    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(matches),
        Err(e) => return Err(e.into()),
    };

    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if name == id.as_str() || name.starts_with(&prefix) {
                matches.push(entry.path());
            }
        }
    }

    matches.sort();
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_path_is_id_plus_extension() {
        let id = ItemId::parse("abc").unwrap();
        assert_eq!(BlobStore::resolve_path(&id, MediaFormat::Mp4), "abc.mp4");
        assert_eq!(BlobStore::resolve_path(&id, MediaFormat::Mp3), "abc.mp3");
    }

    #[test]
    fn test_blob_path_rejects_traversal() {
        let store = BlobStore::new("/tmp/blobs");
        assert!(store.blob_path("../secret.mp4").is_err());
        assert!(store.blob_path("a/b.mp4").is_err());
        assert!(store.blob_path(".staging").is_err());
        assert!(store.blob_path("").is_err());
        assert!(store.blob_path("ok.mp4").is_ok());
    }

    #[tokio::test]
    async fn test_exists_and_delete() {
        let temp = TempDir::new().unwrap();
        let store = BlobStore::new(temp.path());
        fs::write(temp.path().join("a.mp4"), b"data").await.unwrap();

        assert!(store.exists("a.mp4").await);
        assert!(store.delete("a.mp4").await.unwrap());
        assert!(!store.exists("a.mp4").await);

        // Second delete is a no-op
        assert!(!store.delete("a.mp4").await.unwrap());
    }

    #[tokio::test]
    async fn test_open_missing_blob_is_not_found() {
        let temp = TempDir::new().unwrap();
        let store = BlobStore::new(temp.path());

        let err = store.open_for_read("missing.mp4").await.unwrap_err();
        assert!(matches!(err, LibraryError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_open_reports_length() {
        let temp = TempDir::new().unwrap();
        let store = BlobStore::new(temp.path());
        fs::write(temp.path().join("a.wav"), vec![0u8; 42]).await.unwrap();

        let handle = store.open_for_read("a.wav").await.unwrap();
        assert_eq!(handle.length, 42);
    }

    #[tokio::test]
    async fn test_find_by_stem() {
        let temp = TempDir::new().unwrap();
        let id = ItemId::parse("abc").unwrap();
        fs::write(temp.path().join("abc.m4a"), b"x").await.unwrap();
        fs::write(temp.path().join("abcdef.mp4"), b"x").await.unwrap();
        fs::write(temp.path().join("other.mp3"), b"x").await.unwrap();

        let found = find_by_stem(temp.path(), &id).await.unwrap();
        assert_eq!(found, vec![temp.path().join("abc.m4a")]);
    }
}
