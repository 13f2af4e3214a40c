use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable holding the Telegram bot token
pub const TELEGRAM_TOKEN_ENV: &str = "TG_BOT_TOKEN";

/// Environment variable holding the Telegram chat id
pub const TELEGRAM_CHAT_ENV: &str = "TG_CHAT_ID";

/// Main configuration structure for pixelstats
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// URL of the JSON device manifest
    #[serde(default = "default_devices_url")]
    pub devices_url: String,

    /// Release hosts queried for every device
    #[serde(default)]
    pub sources: SourcesConfig,

    /// Which release assets count as downloads
    #[serde(default)]
    pub assets: AssetConfig,

    /// Snapshot persistence settings
    #[serde(default)]
    pub snapshot: SnapshotConfig,

    /// HTTP fetch behavior
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Telegram notification settings
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// The two release hosts
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SourcesConfig {
    #[serde(default = "default_primary_source")]
    pub primary: SourceConfig,

    #[serde(default = "default_secondary_source")]
    pub secondary: SourceConfig,
}

/// A single release host
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SourceConfig {
    /// Display name used in logs and skip reasons
    pub name: String,

    /// Releases endpoint; `{codename}` is replaced per device
    pub releases_url: String,

    /// Environment variable holding an optional bearer token
    #[serde(default)]
    pub token_env: Option<String>,
}

/// Asset name filter
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AssetConfig {
    /// Assets whose name starts with this prefix are counted
    #[serde(default = "default_asset_prefix")]
    pub prefix: String,

    /// Assets whose name ends with this suffix are counted
    #[serde(default = "default_asset_suffix")]
    pub suffix: String,
}

/// Snapshot file configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SnapshotConfig {
    /// Location of the downloads snapshot
    #[serde(default = "default_snapshot_path")]
    pub path: String,
}

/// HTTP fetch configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FetchConfig {
    /// Timeout for a single HTTP request in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Maximum devices fetched at the same time
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,

    /// User agent sent to every host (GitHub rejects requests without one)
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Telegram configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TelegramConfig {
    /// Bot token (TG_BOT_TOKEN takes precedence)
    #[serde(default)]
    pub bot_token: Option<String>,

    /// Destination chat (TG_CHAT_ID takes precedence)
    #[serde(default)]
    pub chat_id: Option<String>,

    /// Bot API base URL
    #[serde(default = "default_telegram_api")]
    pub api_base: String,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String, // "info"

    /// Log format
    #[serde(default = "default_log_format")]
    pub format: String, // "compact", "full"

    /// Enable colored output
    #[serde(default = "default_true")]
    pub color: bool,
}

// Default value functions
fn default_devices_url() -> String {
    "https://raw.githubusercontent.com/PixelBuildsROM/pixelbuilds_devices/main/devices.json"
        .to_string()
}
fn default_primary_source() -> SourceConfig {
    SourceConfig {
        name: "GitHub".to_string(),
        releases_url: "https://api.github.com/repos/PixelBuilds-Releases/{codename}/releases"
            .to_string(),
        token_env: Some("GITHUB_TOKEN".to_string()),
    }
}
fn default_secondary_source() -> SourceConfig {
    SourceConfig {
        name: "Gitea".to_string(),
        releases_url: "https://git.pixelbuilds.org/api/v1/repos/releases/{codename}/releases"
            .to_string(),
        token_env: None,
    }
}
fn default_asset_prefix() -> String {
    "PixelBuilds_".to_string()
}
fn default_asset_suffix() -> String {
    ".zip".to_string()
}
fn default_snapshot_path() -> String {
    "downloads.json".to_string()
}
fn default_timeout() -> u64 {
    30
}
fn default_max_parallel() -> usize {
    4
}
fn default_user_agent() -> String {
    format!("pixelstats/{}", env!("CARGO_PKG_VERSION"))
}
fn default_telegram_api() -> String {
    "https://api.telegram.org".to_string()
}
fn default_true() -> bool {
    true
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "compact".to_string()
}

// Default implementations
impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            primary: default_primary_source(),
            secondary: default_secondary_source(),
        }
    }
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            prefix: default_asset_prefix(),
            suffix: default_asset_suffix(),
        }
    }
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            path: default_snapshot_path(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            max_parallel: default_max_parallel(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            chat_id: None,
            api_base: default_telegram_api(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            color: default_true(),
        }
    }
}

impl Config {
    /// Load configuration from the default location or create a default config
    pub fn load_or_default() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load(&config_path)
        } else {
            let mut config = Self::default();

            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
            }

            config.save(&config_path)?;

            tracing::info!("Created default configuration at: {:?}", config_path);

            config.expand_paths()?;
            Ok(config)
        }
    }

    /// Load configuration from a specific file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let mut config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        config.expand_paths()?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self).context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    /// Get the default configuration file path (XDG compliant)
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = config_dir().context("Failed to get user config directory")?;

        Ok(config_dir.join("pixelstats").join("config.yml"))
    }

    /// Expand environment variables in configuration paths
    pub fn expand_paths(&mut self) -> Result<()> {
        self.snapshot.path = shellexpand::full(&self.snapshot.path)
            .context("Failed to expand snapshot path")?
            .into_owned();

        Ok(())
    }

    /// Snapshot file location
    pub fn snapshot_path(&self) -> PathBuf {
        PathBuf::from(&self.snapshot.path)
    }

    /// Per-request HTTP timeout
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch.timeout.max(1))
    }

    /// Devices fetched concurrently, never less than one
    pub fn max_parallel(&self) -> usize {
        self.fetch.max_parallel.max(1)
    }

    /// Resolve Telegram credentials, environment first, then config.
    ///
    /// Returns `None` unless both the token and the chat id are present.
    pub fn telegram_credentials(&self) -> Option<(String, String)> {
        let token = env_or(TELEGRAM_TOKEN_ENV, self.telegram.bot_token.as_deref())?;
        let chat_id = env_or(TELEGRAM_CHAT_ENV, self.telegram.chat_id.as_deref())?;
        Some((token, chat_id))
    }
}

impl SourceConfig {
    /// Bearer token from `token_env`, if that variable is set and non-empty
    pub fn token(&self) -> Option<String> {
        self.token_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|token| !token.is_empty())
    }
}

fn env_or(var: &str, fallback: Option<&str>) -> Option<String> {
    std::env::var(var)
        .ok()
        .or_else(|| fallback.map(str::to_string))
        .filter(|value| !value.trim().is_empty())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            devices_url: default_devices_url(),
            sources: SourcesConfig::default(),
            assets: AssetConfig::default(),
            snapshot: SnapshotConfig::default(),
            fetch: FetchConfig::default(),
            telegram: TelegramConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
