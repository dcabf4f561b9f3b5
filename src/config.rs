//! Configuration for mediastash.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (MEDIASTASH_HOME, MEDIASTASH_DOWNLOADS,
//!    MEDIASTASH_METADATA, MEDIASTASH_ADDRESS, MEDIASTASH_YTDLP)
//! 2. Config file (.mediastash/config.yaml)
//! 3. Defaults (~/.mediastash)
//!
//! Config file discovery:
//! - Searches current directory and parents for .mediastash/config.yaml
//! - Paths in config file are relative to the config file's project root
//!
//! The resolved configuration is passed explicitly to each component;
//! directories are created only by [`ResolvedConfig::ensure_dirs`].

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

pub const DEFAULT_ADDRESS: &str = "0.0.0.0:5000";
pub const DEFAULT_RESOLVER_BINARY: &str = "yt-dlp";
pub const DEFAULT_AUDIO_QUALITY: &str = "192K";
pub const DEFAULT_SEARCH_PREFIX: &str = "ytsearch";

const CONFIG_DIR: &str = ".mediastash";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub server: Option<ServerConfig>,
    #[serde(default)]
    pub resolver: Option<ResolverConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// Base directory for library state (relative to the project root)
    pub home: Option<String>,
    /// Media blob directory (relative to the project root)
    pub downloads: Option<String>,
    /// Record directory (relative to the project root)
    pub metadata: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub address: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResolverConfig {
    pub binary: Option<String>,
    pub audio_quality: Option<String>,
    pub search_prefix: Option<String>,
}

/// Settings for the external resolver binary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverSettings {
    /// Path or name of the yt-dlp binary
    pub binary: String,
    /// Target bitrate for audio extraction
    pub audio_quality: String,
    /// Search scheme understood by the resolver ("ytsearch" -> "ytsearch10:query")
    pub search_prefix: String,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            binary: DEFAULT_RESOLVER_BINARY.to_string(),
            audio_quality: DEFAULT_AUDIO_QUALITY.to_string(),
            search_prefix: DEFAULT_SEARCH_PREFIX.to_string(),
        }
    }
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Base directory
    pub home: PathBuf,
    /// Media blob directory
    pub downloads_dir: PathBuf,
    /// Record directory
    pub metadata_dir: PathBuf,
    /// HTTP bind address
    pub address: String,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    pub resolver: ResolverSettings,
}

impl ResolvedConfig {
    /// Configuration rooted at `home` with default layout
    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        Self {
            downloads_dir: home.join("downloads"),
            metadata_dir: home.join("metadata"),
            home,
            address: DEFAULT_ADDRESS.to_string(),
            config_file: None,
            resolver: ResolverSettings::default(),
        }
    }

    /// Create the library directories
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.downloads_dir, &self.metadata_dir] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }
        Ok(())
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(CONFIG_DIR).join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Environment override for a path, made absolute against `cwd`
fn env_path(env: &dyn EnvSource, key: &str, cwd: &Path) -> Option<PathBuf> {
    env.var(key).map(|value| resolve_path(cwd, &value))
}

/// Resolve a path that may be relative to `base`
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

/// Lookup for environment overrides; injectable for tests
trait EnvSource {
    fn var(&self, key: &str) -> Option<String>;
}

struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.is_empty())
    }
}

/// Combine defaults, an optional config file and environment overrides
fn resolve(
    default_home: PathBuf,
    config_file: Option<(PathBuf, ConfigFile)>,
    env: &dyn EnvSource,
    cwd: &Path,
) -> ResolvedConfig {
    let (base_dir, file) = match config_file {
        Some((path, file)) => {
            // Project root is the parent of .mediastash/
            let base = path
                .parent()
                .and_then(|p| p.parent())
                .unwrap_or(Path::new("."))
                .to_path_buf();
            (Some((base, path)), Some(file))
        }
        None => (None, None),
    };

    let from_file = |pick: fn(&ConfigFile) -> Option<&String>| -> Option<PathBuf> {
        let (base, _) = base_dir.as_ref()?;
        let value = pick(file.as_ref()?)?;
        Some(resolve_path(base, value))
    };

    let home = env_path(env, "MEDIASTASH_HOME", cwd)
        .or_else(|| from_file(|f| f.paths.home.as_ref()))
        .unwrap_or(default_home);

    let downloads_dir = env_path(env, "MEDIASTASH_DOWNLOADS", cwd)
        .or_else(|| from_file(|f| f.paths.downloads.as_ref()))
        .unwrap_or_else(|| home.join("downloads"));

    let metadata_dir = env_path(env, "MEDIASTASH_METADATA", cwd)
        .or_else(|| from_file(|f| f.paths.metadata.as_ref()))
        .unwrap_or_else(|| home.join("metadata"));

    let address = env
        .var("MEDIASTASH_ADDRESS")
        .or_else(|| file.as_ref()?.server.as_ref()?.address.clone())
        .unwrap_or_else(|| DEFAULT_ADDRESS.to_string());

    let resolver_file = file.as_ref().and_then(|f| f.resolver.as_ref());
    let defaults = ResolverSettings::default();
    let resolver = ResolverSettings {
        binary: env
            .var("MEDIASTASH_YTDLP")
            .or_else(|| resolver_file.and_then(|r| r.binary.clone()))
            .unwrap_or(defaults.binary),
        audio_quality: resolver_file
            .and_then(|r| r.audio_quality.clone())
            .unwrap_or(defaults.audio_quality),
        search_prefix: resolver_file
            .and_then(|r| r.search_prefix.clone())
            .unwrap_or(defaults.search_prefix),
    };

    ResolvedConfig {
        home,
        downloads_dir,
        metadata_dir,
        address,
        config_file: base_dir.map(|(_, path)| path),
        resolver,
    }
}

/// Load configuration from all sources
pub fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(CONFIG_DIR);

    let cwd = std::env::current_dir().context("Failed to determine current directory")?;

    let config_file = match find_config_file() {
        Some(path) => {
            let file = load_config_file(&path)?;
            Some((path, file))
        }
        None => None,
    };

    Ok(resolve(default_home, config_file, &ProcessEnv, &cwd))
}
