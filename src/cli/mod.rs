//! Command-line interface for mediastash.
//!
//! Runs the HTTP server and exposes the library operations (acquire,
//! list, delete, search, resolve) directly from the shell.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::acquire::{AcquireRequest, Acquirer, DEFAULT_QUALITY};
use crate::adapters::{Resolver, Searcher, YtDlpAdapter};
use crate::config::{load_config, ResolvedConfig};
use crate::library::{ItemId, Library, MediaFormat};

/// mediastash - personal media library server
#[derive(Parser, Debug)]
#[command(name = "mediastash")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Address to bind to (overrides configuration)
        #[arg(short, long)]
        address: Option<String>,
    },

    /// Download a source into the library
    Acquire {
        /// Source URL
        locator: String,

        /// Output container (mp4, webm, mp3, m4a, wav)
        #[arg(short, long, default_value = "mp4")]
        format: String,

        /// Maximum video height, e.g. 720p
        #[arg(short, long, default_value = DEFAULT_QUALITY)]
        quality: String,

        /// Item id (generated if not specified; replaces an existing item)
        #[arg(long)]
        id: Option<String>,
    },

    /// List items in the library
    List,

    /// Delete an item and its media file
    Delete {
        /// Item id
        id: String,
    },

    /// Search for sources
    Search {
        /// Search query
        query: String,

        /// Maximum number of results
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,
    },

    /// Print the direct stream URL of a source
    Resolve {
        /// Source URL
        locator: String,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let config = load_config()?;

        match self.command {
            Commands::Serve { address } => serve(config, address).await,
            Commands::Acquire {
                locator,
                format,
                quality,
                id,
            } => acquire(&config, locator, &format, quality, id).await,
            Commands::List => list(&config).await,
            Commands::Delete { id } => delete(&config, &id).await,
            Commands::Search { query, limit } => search(&config, &query, limit).await,
            Commands::Resolve { locator } => resolve(&config, &locator).await,
            Commands::Config => {
                show_config(&config);
                Ok(())
            }
        }
    }
}

async fn serve(mut config: ResolvedConfig, address: Option<String>) -> Result<()> {
    if let Some(address) = address {
        config.address = address;
    }
    crate::api::serve(&config).await
}

async fn acquire(
    config: &ResolvedConfig,
    locator: String,
    format: &str,
    quality: String,
    id: Option<String>,
) -> Result<()> {
    config.ensure_dirs()?;

    let mut request = AcquireRequest::new(locator)
        .with_format(format.parse::<MediaFormat>()?)
        .with_quality(quality);
    if let Some(id) = id {
        request = request.with_id(ItemId::parse(&id)?);
    }

    let library = Library::from_config(config);
    let adapter = Arc::new(YtDlpAdapter::new(config.resolver.clone()));
    let item = Acquirer::new(&library, adapter).acquire(request).await?;

    println!("Acquired: {}", item.title);
    println!("  ID:   {}", item.id);
    println!("  File: {}", config.downloads_dir.join(&item.filename).display());
    Ok(())
}

async fn list(config: &ResolvedConfig) -> Result<()> {
    let items = Library::from_config(config).list().await?;

    if items.is_empty() {
        println!("Library is empty.");
        return Ok(());
    }

    println!("{:<36}  {:<5}  {:<7}  TITLE", "ID", "FMT", "QUALITY");
    for item in items {
        println!(
            "{:<36}  {:<5}  {:<7}  {}",
            item.id, item.format, item.quality, item.title
        );
    }
    Ok(())
}

async fn delete(config: &ResolvedConfig, id: &str) -> Result<()> {
    let id = ItemId::parse(id)?;
    let item = Library::from_config(config).delete(&id).await?;
    println!("Deleted: {} ({})", item.title, item.filename);
    Ok(())
}

async fn search(config: &ResolvedConfig, query: &str, limit: usize) -> Result<()> {
    let adapter = YtDlpAdapter::new(config.resolver.clone());
    let results = adapter
        .search(query, limit.max(1))
        .await
        .with_context(|| format!("Search failed for '{}'", query))?;

    if results.is_empty() {
        println!("No results for '{}'.", query);
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        println!("{:>2}. {}", i + 1, result.title);
        println!("    {}", result.url);
    }
    Ok(())
}

async fn resolve(config: &ResolvedConfig, locator: &str) -> Result<()> {
    let adapter = YtDlpAdapter::new(config.resolver.clone());
    let source = adapter.resolve(locator).await?;

    let url = source
        .direct_stream_url()
        .context("No stream URL found")?;
    if let Some(title) = &source.title {
        eprintln!("{}", title);
    }
    println!("{}", url);
    Ok(())
}

fn show_config(config: &ResolvedConfig) {
    println!("Home:      {}", config.home.display());
    println!("Downloads: {}", config.downloads_dir.display());
    println!("Metadata:  {}", config.metadata_dir.display());
    println!("Address:   {}", config.address);
    println!("yt-dlp:    {}", config.resolver.binary);
    match &config.config_file {
        Some(path) => println!("Config:    {}", path.display()),
        None => println!("Config:    (none, using defaults)"),
    }
}
