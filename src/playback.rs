//! Playback of stored blobs with byte-range support.
//!
//! Only single ranges are honored. Multi-range or malformed `Range`
//! headers are ignored and the whole blob is served, which RFC 9110
//! permits.

use std::io::SeekFrom;

use tokio::fs::File;
use tokio::io::AsyncSeekExt;

use crate::error::{LibraryError, Result};
use crate::library::BlobStore;

pub const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Content type for a blob name, by extension
pub fn content_type_for(filename: &str) -> &'static str {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "m4a" => "audio/mp4",
        _ => FALLBACK_CONTENT_TYPE,
    }
}

/// Inclusive byte range within a blob
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Number of bytes covered (ranges are never empty)
    pub fn byte_count(&self) -> u64 {
        self.end - self.start + 1
    }

    /// `Content-Range` header value
    pub fn content_range(&self, total: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, total)
    }
}

/// Result of interpreting a `Range` header against a blob length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeRequest {
    /// No usable range; serve everything
    Full,
    Partial(ByteRange),
    /// Syntactically valid but outside the blob
    Unsatisfiable,
}

/// Interpret a `Range` header value for a blob of `length` bytes
pub fn parse_range(header: &str, length: u64) -> RangeRequest {
    let Some(spec) = header.trim().strip_prefix("bytes=") else {
        return RangeRequest::Full;
    };
    if spec.contains(',') {
        return RangeRequest::Full;
    }
    let Some((first, last)) = spec.trim().split_once('-') else {
        return RangeRequest::Full;
    };
    let (first, last) = (first.trim(), last.trim());

    if first.is_empty() {
        // Suffix range: the final N bytes
        let Ok(suffix) = last.parse::<u64>() else {
            return RangeRequest::Full;
        };
        if suffix == 0 || length == 0 {
            return RangeRequest::Unsatisfiable;
        }
        let start = length.saturating_sub(suffix);
        return RangeRequest::Partial(ByteRange {
            start,
            end: length - 1,
        });
    }

    let Ok(start) = first.parse::<u64>() else {
        return RangeRequest::Full;
    };
    let end = if last.is_empty() {
        None
    } else {
        match last.parse::<u64>() {
            Ok(end) if end >= start => Some(end),
            _ => return RangeRequest::Full,
        }
    };

    if start >= length {
        return RangeRequest::Unsatisfiable;
    }

    let end = end.map_or(length - 1, |end| end.min(length - 1));
    RangeRequest::Partial(ByteRange { start, end })
}

/// An open blob positioned at the first byte to send
#[derive(Debug)]
pub struct MediaStream {
    pub content_type: &'static str,
    /// Full blob length
    pub total_length: u64,
    /// Range being served; `None` means the whole blob
    pub range: Option<ByteRange>,
    pub file: File,
}

impl MediaStream {
    /// Number of bytes the response body carries
    pub fn body_length(&self) -> u64 {
        self.range.map_or(self.total_length, |r| r.byte_count())
    }
}

/// Serves blobs from the blob store
#[derive(Debug, Clone)]
pub struct PlaybackServer {
    blobs: BlobStore,
}

impl PlaybackServer {
    pub fn new(blobs: BlobStore) -> Self {
        Self { blobs }
    }

    /// Open `filename` for streaming, honoring an optional `Range` header
    pub async fn stream(&self, filename: &str, range: Option<&str>) -> Result<MediaStream> {
        let handle = self.blobs.open_for_read(filename).await?;
        let total_length = handle.length;
        let mut file = handle.file;

        let range = match range.map(|h| parse_range(h, total_length)) {
            None | Some(RangeRequest::Full) => None,
            Some(RangeRequest::Partial(range)) => Some(range),
            Some(RangeRequest::Unsatisfiable) => {
                return Err(LibraryError::RangeNotSatisfiable {
                    length: total_length,
                });
            }
        };

        if let Some(range) = range {
            file.seek(SeekFrom::Start(range.start)).await?;
        }

        Ok(MediaStream {
            content_type: content_type_for(filename),
            total_length,
            range,
            file,
        })
    }
}
