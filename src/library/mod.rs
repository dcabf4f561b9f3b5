//! Local media library: records, blobs and the invariant tying them together.
//!
//! # Storage Layout
//!
//! ```text
//! <home>/
//! ├── metadata/                 # record store
//! │   └── <id>.json             # one LibraryItem per file
//! └── downloads/                # blob store
//!     ├── <id>.<ext>            # one media file per item
//!     └── .staging/             # in-flight acquisitions
//! ```
//!
//! A record is only valid while its blob exists. Records are published
//! after their blob and removed after (or together with) it; a record
//! found without a blob is deleted by the next listing.

pub mod blob;
pub mod item;
pub mod reconcile;
pub mod record;

use tracing::info;

pub use blob::{BlobHandle, BlobStore};
pub use item::{quality_height, ItemId, LibraryItem, MediaFormat, UNKNOWN_TITLE};
pub use reconcile::{Reconciled, Reconciler};
pub use record::{RecordCursor, RecordStore, StoredRecord};

use crate::config::ResolvedConfig;
use crate::error::{LibraryError, Result};

/// Item lifecycle operations over both stores
#[derive(Debug, Clone)]
pub struct Library {
    records: RecordStore,
    blobs: BlobStore,
    reconciler: Reconciler,
}

impl Library {
    pub fn new(records: RecordStore, blobs: BlobStore) -> Self {
        let reconciler = Reconciler::new(records.clone(), blobs.clone());
        Self {
            records,
            blobs,
            reconciler,
        }
    }

    /// Build the library over the configured directories
    pub fn from_config(config: &ResolvedConfig) -> Self {
        Self::new(
            RecordStore::new(&config.metadata_dir),
            BlobStore::new(&config.downloads_dir),
        )
    }

    pub fn records(&self) -> &RecordStore {
        &self.records
    }

    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    /// All valid items, most recent first
    pub async fn list(&self) -> Result<Vec<LibraryItem>> {
        let mut items = self.reconciler.reconcile().await?.items;
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }

    /// Look up a single valid item
    pub async fn get(&self, id: &ItemId) -> Result<LibraryItem> {
        let item = self
            .records
            .get(id)
            .await?
            .ok_or_else(|| LibraryError::NotFound(format!("Item not found: {}", id)))?;

        if !self.blobs.exists(&item.filename).await {
            return Err(LibraryError::NotFound(format!(
                "Media for item {} is missing",
                id
            )));
        }

        Ok(item)
    }

    /// Delete an item: blob first, then record
    pub async fn delete(&self, id: &ItemId) -> Result<LibraryItem> {
        let item = self
            .records
            .get(id)
            .await?
            .ok_or_else(|| LibraryError::NotFound(format!("Item not found: {}", id)))?;

        if self.blobs.delete(&item.filename).await? {
            info!("Deleted media file: {}", item.filename);
        }

        self.records.delete(id).await?;
        info!("Deleted record: {}", id);

        Ok(item)
    }
}
