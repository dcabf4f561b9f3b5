//! Library item types: identity, container format and the catalog record.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{LibraryError, Result};

/// Placeholder title used when the resolver reports none
pub const UNKNOWN_TITLE: &str = "Unknown Title";

const MAX_ID_LEN: usize = 128;

/// Item identifier; doubles as the record key and the blob file stem
///
/// Deserialization runs the same validation as [`ItemId::parse`], so an id
/// read from a record can always be used as a file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ItemId(String);

impl ItemId {
    /// Generate a fresh identifier (UUID v4)
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Validate a caller-supplied identifier.
    ///
    /// Ids become file names in both stores, so only `[A-Za-z0-9_-]` is
    /// accepted.
    pub fn parse(raw: &str) -> Result<Self> {
        let valid = !raw.is_empty()
            && raw.len() <= MAX_ID_LEN
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(LibraryError::InvalidRequest(format!(
                "Invalid item id '{}': expected 1-{} characters of [A-Za-z0-9_-]",
                raw, MAX_ID_LEN
            )))
        }
    }

    /// Get the raw string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ItemId {
    type Error = LibraryError;

    fn try_from(raw: String) -> Result<Self> {
        Self::parse(&raw)
    }
}

impl From<ItemId> for String {
    fn from(id: ItemId) -> Self {
        id.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Supported output containers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaFormat {
    /// Muxed H.264/AAC video
    #[default]
    Mp4,
    /// Muxed VP9/Opus video
    Webm,
    /// Audio only, MPEG layer 3
    Mp3,
    /// Audio only, AAC in MP4
    M4a,
    /// Audio only, PCM
    Wav,
}

impl MediaFormat {
    /// File extension (without the dot)
    pub fn extension(self) -> &'static str {
        match self {
            MediaFormat::Mp4 => "mp4",
            MediaFormat::Webm => "webm",
            MediaFormat::Mp3 => "mp3",
            MediaFormat::M4a => "m4a",
            MediaFormat::Wav => "wav",
        }
    }

    /// Whether the format carries only an audio track
    pub fn is_audio_only(self) -> bool {
        matches!(self, MediaFormat::Mp3 | MediaFormat::M4a | MediaFormat::Wav)
    }
}

impl fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for MediaFormat {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "mp4" => Ok(MediaFormat::Mp4),
            "webm" => Ok(MediaFormat::Webm),
            "mp3" => Ok(MediaFormat::Mp3),
            "m4a" => Ok(MediaFormat::M4a),
            "wav" => Ok(MediaFormat::Wav),
            _ => Err(LibraryError::InvalidRequest(format!(
                "Unsupported format: {}",
                s
            ))),
        }
    }
}

/// Parse the numeric height out of a quality label ("720p" -> 720)
pub fn quality_height(quality: &str) -> Option<u32> {
    quality
        .trim()
        .trim_end_matches(|c| c == 'p' || c == 'P')
        .parse()
        .ok()
}

/// One catalog record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryItem {
    /// Unique identifier (record key)
    pub id: ItemId,

    /// Human-readable title
    pub title: String,

    /// Blob name within the downloads directory
    pub filename: String,

    /// Requested container
    pub format: MediaFormat,

    /// Requested quality label (advisory)
    pub quality: String,

    /// Duration in seconds
    #[serde(default)]
    pub duration: Option<f64>,

    #[serde(default)]
    pub uploader: Option<String>,

    #[serde(default)]
    pub thumbnail: Option<String>,

    /// Locator the item was acquired from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,

    /// Quality the encoder actually produced, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub achieved_quality: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl LibraryItem {
    /// Create a record with the canonical filename for `(id, format)`
    pub fn new(id: ItemId, format: MediaFormat, quality: impl Into<String>) -> Self {
        let filename = super::blob::BlobStore::resolve_path(&id, format);
        Self {
            id,
            title: UNKNOWN_TITLE.to_string(),
            filename,
            format,
            quality: quality.into(),
            duration: None,
            uploader: None,
            thumbnail: None,
            source_url: None,
            achieved_quality: None,
            created_at: Some(Utc::now()),
        }
    }

    /// Set the title; blank titles keep the placeholder
    pub fn with_title(mut self, title: Option<String>) -> Self {
        if let Some(title) = title.filter(|t| !t.trim().is_empty()) {
            self.title = title;
        }
        self
    }

    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }
}
