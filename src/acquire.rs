//! Acquisition: turn a locator into a published library item.
//!
//! The encoder writes into a private staging directory under the blob
//! store. Once the output file is located it is renamed to its canonical
//! name and only then is the record written. A failed acquisition leaves
//! neither record nor blob behind; the staging directory is removed on
//! every exit path.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tracing::{info, warn};

use crate::adapters::{Encoder, FetchOutput, FetchRequest};
use crate::error::{LibraryError, Result};
use crate::library::blob::find_by_stem;
use crate::library::{BlobStore, ItemId, Library, LibraryItem, MediaFormat, RecordStore};

pub const DEFAULT_QUALITY: &str = "720p";

/// Parameters of one acquisition
#[derive(Debug, Clone)]
pub struct AcquireRequest {
    pub locator: String,
    pub format: MediaFormat,
    pub quality: String,
    /// Caller-chosen id; a fresh one is generated when absent
    pub id: Option<ItemId>,
}

impl AcquireRequest {
    pub fn new(locator: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            format: MediaFormat::default(),
            quality: DEFAULT_QUALITY.to_string(),
            id: None,
        }
    }

    pub fn with_format(mut self, format: MediaFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_quality(mut self, quality: impl Into<String>) -> Self {
        self.quality = quality.into();
        self
    }

    pub fn with_id(mut self, id: ItemId) -> Self {
        self.id = Some(id);
        self
    }
}

/// Drives the encoder and registers its output in both stores
#[derive(Clone)]
pub struct Acquirer {
    records: RecordStore,
    blobs: BlobStore,
    encoder: Arc<dyn Encoder>,
}

impl Acquirer {
    pub fn new(library: &Library, encoder: Arc<dyn Encoder>) -> Self {
        Self {
            records: library.records().clone(),
            blobs: library.blobs().clone(),
            encoder,
        }
    }

    /// Acquire a locator and publish it as a library item
    pub async fn acquire(&self, request: AcquireRequest) -> Result<LibraryItem> {
        if request.locator.trim().is_empty() {
            return Err(LibraryError::InvalidRequest("Missing locator".to_string()));
        }

        let id = request.id.clone().unwrap_or_else(ItemId::generate);
        let filename = BlobStore::resolve_path(&id, request.format);

        info!(
            "Acquiring {} as {} (format: {}, quality: {})",
            request.locator, filename, request.format, request.quality
        );

        let previous = self.records.get(&id).await.unwrap_or_else(|e| {
            warn!("Ignoring unreadable existing record {}: {}", id, e);
            None
        });

        let staging = self.create_staging(&id).await?;
        let fetch = FetchRequest {
            locator: request.locator.clone(),
            format: request.format,
            quality: request.quality.clone(),
            output_dir: staging.path().to_path_buf(),
            stem: id.as_str().to_string(),
        };

        let output = self
            .encoder
            .fetch(&fetch)
            .await
            .map_err(|e| LibraryError::Resolution(format!("{:#}", e)))?;

        let produced = locate_output(&fetch, &output, &id).await?;
        self.blobs.adopt(&produced, &filename).await?;

        // close() reports removal errors; drop would swallow them
        if let Err(e) = staging.close() {
            warn!("Failed to remove staging directory: {}", e);
        }

        let item = build_item(id, request, output);
        if let Err(e) = self.records.put(&item).await {
            // An unpublished blob has no record to reach it
            if let Err(cleanup) = self.blobs.delete(&item.filename).await {
                warn!("Failed to remove unpublished blob {}: {}", item.filename, cleanup);
            }
            return Err(e);
        }

        if let Some(previous) = previous.filter(|p| p.filename != item.filename) {
            if let Err(e) = self.blobs.delete(&previous.filename).await {
                warn!("Failed to remove replaced blob {}: {}", previous.filename, e);
            }
        }

        info!("Acquired: {} ({})", item.title, item.filename);
        Ok(item)
    }

    async fn create_staging(&self, id: &ItemId) -> Result<tempfile::TempDir> {
        let root = self.blobs.staging_root();
        fs::create_dir_all(&root).await.map_err(|e| {
            LibraryError::Storage(format!(
                "Failed to create staging directory {}: {}",
                root.display(),
                e
            ))
        })?;

        tempfile::Builder::new()
            .prefix(&format!("{}-", id.as_str()))
            .tempdir_in(&root)
            .map_err(|e| LibraryError::Storage(format!("Failed to create staging directory: {}", e)))
    }
}

/// Find the file the encoder actually produced.
///
/// Order: the path the encoder reported, the canonical name, then the
/// single staged file named after the id. The encoder may finalize under
/// a different extension than requested.
async fn locate_output(request: &FetchRequest, output: &FetchOutput, id: &ItemId) -> Result<PathBuf> {
    if let Some(reported) = &output.output_path {
        if reported.starts_with(&request.output_dir) && is_file(reported).await {
            return Ok(reported.clone());
        }
    }

    let canonical = request.target_path();
    if is_file(&canonical).await {
        return Ok(canonical);
    }

    let mut candidates = find_by_stem(&request.output_dir, id).await?;
    match candidates.len() {
        1 => Ok(candidates.remove(0)),
        0 => Err(LibraryError::Storage(format!(
            "Encoder produced no file for {}",
            id
        ))),
        n => Err(LibraryError::Storage(format!(
            "Encoder produced {} candidate files for {}; cannot choose",
            n, id
        ))),
    }
}

async fn is_file(path: &Path) -> bool {
    fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

fn build_item(id: ItemId, request: AcquireRequest, output: FetchOutput) -> LibraryItem {
    let mut item = LibraryItem::new(id, request.format, request.quality)
        .with_title(output.title)
        .with_source_url(request.locator);

    item.duration = output.duration;
    item.uploader = output.uploader;
    item.thumbnail = output.thumbnail;
    item.achieved_quality = if request.format.is_audio_only() {
        None
    } else {
        output.height.map(|h| format!("{}p", h))
    };
    item
}
