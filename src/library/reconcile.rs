//! Cross-checks records against blobs on every listing.
//!
//! A record whose blob is missing is orphaned: it is deleted from the
//! record store and never returned. Deletion failures are logged and the
//! record is simply left out; the next listing retries.

use tracing::{info, warn};

use super::blob::BlobStore;
use super::item::LibraryItem;
use super::record::RecordStore;
use crate::error::Result;

/// Outcome of one reconciliation pass
#[derive(Debug, Default)]
pub struct Reconciled {
    /// Records with a backing blob
    pub items: Vec<LibraryItem>,

    /// Orphaned records removed during the pass
    pub removed: usize,
}

#[derive(Debug, Clone)]
pub struct Reconciler {
    records: RecordStore,
    blobs: BlobStore,
}

impl Reconciler {
    pub fn new(records: RecordStore, blobs: BlobStore) -> Self {
        Self { records, blobs }
    }

    /// Return every valid record, deleting orphans along the way
    pub async fn reconcile(&self) -> Result<Reconciled> {
        let mut cursor = self.records.list_all().await?;
        let mut outcome = Reconciled::default();

        while let Some(next) = cursor.next_record().await {
            let stored = match next {
                Ok(stored) => stored,
                Err(e) => {
                    warn!("Skipping unreadable record: {}", e);
                    continue;
                }
            };

            if self.blobs.exists(&stored.item.filename).await {
                outcome.items.push(stored.item);
                continue;
            }

            match self.records.delete_stored(&stored).await {
                Ok(_) => {
                    info!(
                        "Removed orphaned record {} (missing {})",
                        stored.path.display(),
                        stored.item.filename
                    );
                    outcome.removed += 1;
                }
                Err(e) => warn!(
                    "Failed to remove orphaned record {}: {}",
                    stored.path.display(),
                    e
                ),
            }
        }

        Ok(outcome)
    }
}
