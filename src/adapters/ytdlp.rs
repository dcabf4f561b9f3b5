//! yt-dlp adapter for resolving, downloading and searching media.
//!
//! Runs the `yt-dlp` binary as a subprocess and parses its JSON output.
//! Audio formats are extracted with yt-dlp's ffmpeg post-processor;
//! video formats are merged into the requested container.

use std::path::PathBuf;
use std::process::Stdio;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use super::{Encoder, FetchOutput, FetchRequest, Resolver, SearchResult, Searcher, SourceInfo};
use crate::config::ResolverSettings;
use crate::library::{quality_height, MediaFormat, UNKNOWN_TITLE};

/// yt-dlp adapter using subprocess mode
#[derive(Debug, Clone)]
pub struct YtDlpAdapter {
    settings: ResolverSettings,
}

impl Default for YtDlpAdapter {
    fn default() -> Self {
        Self::new(ResolverSettings::default())
    }
}

/// Subset of the info dict printed after a download
#[derive(Debug, Deserialize)]
struct DownloadInfo {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    thumbnail: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    uploader: Option<String>,
    #[serde(default)]
    height: Option<u32>,
    #[serde(default)]
    filepath: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct SearchPlaylist {
    #[serde(default)]
    entries: Vec<Option<SearchEntry>>,
}

#[derive(Debug, Deserialize)]
struct SearchEntry {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    thumbnail: Option<String>,
    #[serde(default)]
    thumbnails: Vec<Thumbnail>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    webpage_url: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    uploader: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

impl YtDlpAdapter {
    pub fn new(settings: ResolverSettings) -> Self {
        Self { settings }
    }

    /// Create an adapter with a custom binary path and default settings
    pub fn with_binary_path(binary: impl Into<String>) -> Self {
        Self::new(ResolverSettings {
            binary: binary.into(),
            ..ResolverSettings::default()
        })
    }

    pub fn binary_path(&self) -> &str {
        &self.settings.binary
    }

    /// Run yt-dlp with `args` and return stdout
    async fn run(&self, args: &[String]) -> Result<String> {
        debug!("Running {} {}", self.settings.binary, args.join(" "));

        let output = Command::new(&self.settings.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .with_context(|| format!("Failed to spawn {}", self.settings.binary))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let exit_code = output.status.code().unwrap_or(-1);
            anyhow::bail!(
                "yt-dlp failed with exit code {}: {}",
                exit_code,
                stderr.trim()
            );
        }

        String::from_utf8(output.stdout).context("yt-dlp output is not valid UTF-8")
    }

    fn fetch_args(&self, request: &FetchRequest) -> Vec<String> {
        let template = request
            .output_dir
            .join(format!("{}.%(ext)s", request.stem));

        let mut args: Vec<String> = vec![
            "--no-playlist".into(),
            "--no-warnings".into(),
            "--no-progress".into(),
            "--no-simulate".into(),
            "--print".into(),
            "after_move:%()j".into(),
            "-o".into(),
            template.to_string_lossy().into_owned(),
            "-f".into(),
            format_selector(request.format, &request.quality),
        ];

        if request.format.is_audio_only() {
            args.extend([
                "-x".into(),
                "--audio-format".into(),
                request.format.extension().into(),
                "--audio-quality".into(),
                self.settings.audio_quality.clone(),
            ]);
        } else {
            args.extend([
                "--merge-output-format".into(),
                request.format.extension().into(),
            ]);
        }

        args.push("--".into());
        args.push(request.locator.clone());
        args
    }
}

/// yt-dlp format selector for a container and quality label
fn format_selector(format: MediaFormat, quality: &str) -> String {
    if format.is_audio_only() {
        return "bestaudio/best".to_string();
    }

    let ext = format.extension();
    match quality_height(quality) {
        Some(height) => format!(
            "bestvideo[height<={h}][ext={ext}]+bestaudio/best[height<={h}]/best",
            h = height,
            ext = ext
        ),
        None => format!("bestvideo[ext={ext}]+bestaudio/best", ext = ext),
    }
}

/// Last JSON line of stdout; yt-dlp may print progress noise before it
fn last_json_line(stdout: &str) -> Option<&str> {
    stdout
        .lines()
        .map(str::trim)
        .rev()
        .find(|line| line.starts_with('{'))
}

fn parse_download_info(stdout: &str) -> Result<FetchOutput> {
    let line = last_json_line(stdout).context("yt-dlp printed no download info")?;
    let info: DownloadInfo =
        serde_json::from_str(line).context("Failed to parse yt-dlp download info")?;

    Ok(FetchOutput {
        title: info.title,
        thumbnail: info.thumbnail,
        duration: info.duration,
        uploader: info.uploader,
        height: info.height,
        output_path: info.filepath,
    })
}

fn parse_search_results(stdout: &str) -> Result<Vec<SearchResult>> {
    let playlist: SearchPlaylist =
        serde_json::from_str(stdout.trim()).context("Failed to parse yt-dlp search output")?;

    Ok(playlist
        .entries
        .into_iter()
        .flatten()
        .filter_map(|entry| {
            let url = entry.url.or(entry.webpage_url).or_else(|| {
                entry
                    .id
                    .as_ref()
                    .map(|id| format!("https://www.youtube.com/watch?v={}", id))
            });
            let Some(url) = url else {
                debug!(
                    "Dropping search hit without url or id: {}",
                    entry.title.as_deref().unwrap_or(UNKNOWN_TITLE)
                );
                return None;
            };
            let thumbnail = entry
                .thumbnail
                .or_else(|| entry.thumbnails.into_iter().last().map(|t| t.url));

            Some(SearchResult {
                id: entry.id,
                title: entry.title.unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
                thumbnail,
                url,
                duration: entry.duration,
                uploader: entry.uploader,
            })
        })
        .collect())
}

#[async_trait]
impl Resolver for YtDlpAdapter {
    async fn resolve(&self, locator: &str) -> Result<SourceInfo> {
        let args = [
            "--dump-single-json",
            "--no-playlist",
            "--no-warnings",
            "-f",
            "best[ext=mp4]/best",
            "--",
            locator,
        ]
        .map(String::from);

        let stdout = self.run(&args).await?;
        serde_json::from_str(stdout.trim()).context("Failed to parse yt-dlp info JSON")
    }

    async fn health_check(&self) -> Result<()> {
        let output = Command::new(&self.settings.binary)
            .arg("--version")
            .output()
            .await
            .context("Failed to run yt-dlp health check")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("yt-dlp health check failed: {}", stderr.trim());
        }

        Ok(())
    }
}

#[async_trait]
impl Encoder for YtDlpAdapter {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchOutput> {
        let args = self.fetch_args(request);
        let stdout = self
            .run(&args)
            .await
            .with_context(|| format!("Failed to download {}", request.locator))?;
        parse_download_info(&stdout)
    }
}

#[async_trait]
impl Searcher for YtDlpAdapter {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>> {
        let args = [
            "--dump-single-json".to_string(),
            "--flat-playlist".to_string(),
            "--no-warnings".to_string(),
            "--".to_string(),
            format!("{}{}:{}", self.settings.search_prefix, max_results, query),
        ];

        let stdout = self.run(&args).await?;
        parse_search_results(&stdout)
    }
}
