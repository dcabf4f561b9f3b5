//! Adapter interfaces for external media capabilities.
//!
//! The library never talks to remote sources itself. Resolving a locator,
//! downloading/encoding media and searching are delegated to adapters;
//! the default implementation shells out to `yt-dlp`.

pub mod ytdlp;

use std::path::PathBuf;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::library::MediaFormat;

pub use ytdlp::YtDlpAdapter;

/// One encoding of a source as reported by the resolver
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamFormat {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub ext: Option<String>,
    #[serde(default)]
    pub vcodec: Option<String>,
    #[serde(default)]
    pub acodec: Option<String>,
    #[serde(default)]
    pub height: Option<u32>,
}

impl StreamFormat {
    fn has_video(&self) -> bool {
        codec_present(&self.vcodec)
    }

    fn has_audio(&self) -> bool {
        codec_present(&self.acodec)
    }
}

/// A missing codec field means unknown, which is treated as present
fn codec_present(codec: &Option<String>) -> bool {
    codec.as_deref() != Some("none")
}

/// Resolved description of a remote source
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub uploader: Option<String>,
    /// Direct media url when the source has a single stream
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub formats: Vec<StreamFormat>,
}

impl SourceInfo {
    /// Url suitable for direct playback in a browser.
    ///
    /// Prefers the top-level url, then the most preferred (last listed)
    /// format that carries video.
    pub fn direct_stream_url(&self) -> Option<&str> {
        if let Some(url) = self.url.as_deref() {
            return Some(url);
        }

        self.formats
            .iter()
            .rev()
            .find(|f| f.url.is_some() && f.has_video())
            .and_then(|f| f.url.as_deref())
    }

    /// Url of a stream with both audio and video, falling back to any
    /// stream at all.
    pub fn playable_stream_url(&self) -> Option<&str> {
        self.formats
            .iter()
            .find(|f| f.url.is_some() && f.has_video() && f.has_audio())
            .or_else(|| self.formats.iter().find(|f| f.url.is_some()))
            .and_then(|f| f.url.as_deref())
            .or(self.url.as_deref())
    }
}

/// Request to download and encode one source into `output_dir`
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub locator: String,
    pub format: MediaFormat,
    pub quality: String,
    /// Directory the encoder must write into
    pub output_dir: PathBuf,
    /// File stem of the output (the item id)
    pub stem: String,
}

impl FetchRequest {
    /// Where the finished file is expected to land
    pub fn target_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}.{}", self.stem, self.format.extension()))
    }
}

/// Metadata reported by a finished fetch
#[derive(Debug, Clone, Default)]
pub struct FetchOutput {
    pub title: Option<String>,
    pub thumbnail: Option<String>,
    pub duration: Option<f64>,
    pub uploader: Option<String>,
    /// Video height actually produced
    pub height: Option<u32>,
    /// Final output path, when the encoder reports it
    pub output_path: Option<PathBuf>,
}

/// One search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: Option<String>,
    pub title: String,
    pub thumbnail: Option<String>,
    pub url: String,
    pub duration: Option<f64>,
    pub uploader: Option<String>,
}

/// Resolves a locator into stream metadata
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, locator: &str) -> Result<SourceInfo>;

    /// Check that the backing tool is usable
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

/// Downloads and encodes a locator into a local file
#[async_trait]
pub trait Encoder: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchOutput>;
}

/// Searches the external catalog
#[async_trait]
pub trait Searcher: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(url: &str, vcodec: &str, acodec: &str) -> StreamFormat {
        StreamFormat {
            url: Some(url.to_string()),
            vcodec: Some(vcodec.to_string()),
            acodec: Some(acodec.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_direct_stream_prefers_top_level_url() {
        let info = SourceInfo {
            url: Some("https://cdn/top".to_string()),
            formats: vec![format("https://cdn/a", "avc1", "mp4a")],
            ..Default::default()
        };
        assert_eq!(info.direct_stream_url(), Some("https://cdn/top"));
    }

    #[test]
    fn test_direct_stream_takes_last_video_format() {
        let info = SourceInfo {
            formats: vec![
                format("https://cdn/low", "avc1", "mp4a"),
                format("https://cdn/high", "avc1", "none"),
                format("https://cdn/audio", "none", "opus"),
            ],
            ..Default::default()
        };
        assert_eq!(info.direct_stream_url(), Some("https://cdn/high"));
    }

    #[test]
    fn test_playable_stream_prefers_combined_format() {
        let info = SourceInfo {
            url: Some("https://cdn/top".to_string()),
            formats: vec![
                format("https://cdn/audio", "none", "opus"),
                format("https://cdn/video", "vp9", "none"),
                format("https://cdn/both", "avc1", "mp4a"),
            ],
            ..Default::default()
        };
        assert_eq!(info.playable_stream_url(), Some("https://cdn/both"));
    }

    #[test]
    fn test_playable_stream_fallbacks() {
        let info = SourceInfo {
            url: Some("https://cdn/top".to_string()),
            formats: vec![format("https://cdn/audio", "none", "opus")],
            ..Default::default()
        };
        assert_eq!(info.playable_stream_url(), Some("https://cdn/audio"));

        let bare = SourceInfo {
            url: Some("https://cdn/top".to_string()),
            ..Default::default()
        };
        assert_eq!(bare.playable_stream_url(), Some("https://cdn/top"));
        assert_eq!(SourceInfo::default().playable_stream_url(), None);
    }

    #[test]
    fn test_fetch_request_target_path() {
        let request = FetchRequest {
            locator: "src://abc".to_string(),
            format: MediaFormat::Mp3,
            quality: "720p".to_string(),
            output_dir: PathBuf::from("/stage"),
            stem: "id1".to_string(),
        };
        assert_eq!(request.target_path(), PathBuf::from("/stage/id1.mp3"));
    }
}
