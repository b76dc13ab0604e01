//! Bootstrap configuration and root folder resolution
//!
//! Settings are resolved in priority order:
//! 1. Command-line argument / environment variable (handled by the binary's clap args)
//! 2. TOML config file
//! 3. Compiled default

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "cantina.db";

/// Asset directory name inside the root folder
pub const ASSET_DIR: &str = "images";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Data root (database + image assets)
    pub root_folder: Option<PathBuf>,
    /// HTTP bind address
    pub bind_address: Option<String>,
    /// HTTP port
    pub port: Option<u16>,
    /// Public URL prefix for served image links
    pub public_address: Option<String>,
    /// Shared key for the admin routes. Admin routes are open when unset.
    pub admin_key: Option<String>,
    /// OpenAI API key for the generation client
    pub openai_api_key: Option<String>,
    /// Dietary content vocabulary used by the content tagger
    pub content_categories: Option<Vec<String>>,
    pub logging: LoggingConfig,
    pub feed: FeedConfig,
    pub generation: GenerationConfig,
    pub schedule: ScheduleConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Upstream weekly menu feed
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FeedConfig {
    pub base_url: String,
    pub restaurant_id: u32,
    pub language_code: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.shop.foodandco.dk/api/WeeklyMenu".to_string(),
            restaurant_id: 1089,
            language_code: "da-DK".to_string(),
        }
    }
}

/// Text/image generation provider
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub base_url: String,
    pub text_model: String,
    pub image_model: String,
    pub image_size: String,
    pub image_quality: String,
    /// Upper bound on provider requests per minute
    pub requests_per_minute: u32,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            text_model: "gpt-4o".to_string(),
            image_model: "dall-e-3".to_string(),
            image_size: "1792x1024".to_string(),
            image_quality: "hd".to_string(),
            requests_per_minute: 60,
            request_timeout_secs: 120,
        }
    }
}

/// Schedule periods in minutes
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub fetch_interval_minutes: u64,
    pub cleanup_interval_minutes: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            fetch_interval_minutes: 1440,
            cleanup_interval_minutes: 1440,
        }
    }
}

/// Default dietary content vocabulary
pub fn default_content_categories() -> Vec<String> {
    ["fisk", "svinekød", "kød", "laktosefri", "fjerkræ", "vegansk"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl TomlConfig {
    /// Configured content categories, falling back to the default vocabulary
    pub fn content_categories(&self) -> Vec<String> {
        match &self.content_categories {
            Some(categories) if !categories.is_empty() => categories.clone(),
            _ => default_content_categories(),
        }
    }
}

/// Default config file location: `<config_dir>/cantina/cantina.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("cantina").join("cantina.toml"))
}

/// Load TOML config from `path`.
///
/// A missing file is not an error and yields the defaults.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        debug!("Config file not found, using defaults: {}", path.display());
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    info!("Loaded config file: {}", path.display());
    Ok(config)
}

/// Resolve the data root folder.
///
/// `cli_arg` already carries the environment variable fallback when the
/// binary declares it with clap's `env`.
pub fn resolve_root_folder(cli_arg: Option<&Path>, toml_config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Some(path) = &toml_config.root_folder {
        return path.clone();
    }

    get_default_root_folder()
}

/// OS-dependent default root folder
fn get_default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("cantina"))
        .unwrap_or_else(|| PathBuf::from("./cantina_data"))
}

/// Filesystem layout under the root folder
#[derive(Debug, Clone)]
pub struct RootLayout {
    pub root: PathBuf,
    pub database_path: PathBuf,
    pub asset_dir: PathBuf,
}

impl RootLayout {
    pub fn new(root: PathBuf) -> Self {
        Self {
            database_path: root.join(DATABASE_FILE),
            asset_dir: root.join(ASSET_DIR),
            root,
        }
    }

    /// Create the root folder and asset directory if missing
    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::create_dir_all(&self.asset_dir)?;
        Ok(())
    }
}
