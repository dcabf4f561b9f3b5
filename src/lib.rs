//! mediastash - personal media acquisition and library service
//!
//! Resolves media locators through an external tool (yt-dlp), saves
//! them as local files and serves the saved catalog with range-capable
//! playback.
//!
//! # Architecture
//!
//! The library keeps two directories in lockstep:
//! - a record store with one JSON record per item
//! - a blob store with one media file per item
//!
//! A record is only surfaced while its blob exists; orphaned records are
//! removed whenever the library is listed.
//!
//! # Modules
//!
//! - `library`: Record store, blob store, reconciliation and item lifecycle
//! - `acquire`: Download orchestration into both stores
//! - `playback`: Content types and byte-range streaming
//! - `adapters`: External resolver/encoder/search integrations (yt-dlp)
//! - `api`: HTTP surface
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Serve the library over HTTP
//! mediastash serve --address 127.0.0.1:5000
//!
//! # Save a source as mp3
//! mediastash acquire https://www.youtube.com/watch?v=... -f mp3
//! ```

pub mod acquire;
pub mod adapters;
pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod library;
pub mod playback;

// Re-export main types at crate root for convenience
pub use acquire::{AcquireRequest, Acquirer};
pub use api::{build_router, ApiState};
pub use config::ResolvedConfig;
pub use error::{LibraryError, Result};
pub use library::{BlobStore, ItemId, Library, LibraryItem, MediaFormat, RecordStore};
pub use playback::PlaybackServer;
