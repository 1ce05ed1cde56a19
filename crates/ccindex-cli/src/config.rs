//! Configuration loading from TOML files

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use ccindex_core::{HttpConfig, RetryPolicy};
use serde::Deserialize;

/// Global configuration for ccindex
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub output: OutputConfig,
    pub retry: RetryConfig,
    pub http: HttpSettings,
    pub workers: WorkersConfig,
    pub toc: TocConfig,
    pub language: LanguageConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub base_url: String,
    /// Serve objects from this directory instead of over HTTP
    pub local_root: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: ccindex_core::stream::DEFAULT_BASE_URL.to_string(),
            local_root: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub default_dir: PathBuf,
    pub compression_level: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            default_dir: PathBuf::from("output"),
            compression_level: 6,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub initial_ms: u64,
    pub increase_ms: u64,
    pub decrease_divisor: u64,
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            initial_ms: policy.initial_ms,
            increase_ms: policy.increase_ms,
            decrease_divisor: policy.decrease_divisor,
            max_attempts: policy.max_attempts,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            initial_ms: self.initial_ms,
            increase_ms: self.increase_ms,
            decrease_divisor: self.decrease_divisor,
            max_attempts: self.max_attempts,
        }
    }
}

/// Timeouts in seconds
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub connect_timeout: u64,
    pub read_timeout: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        let http = HttpConfig::default();
        Self {
            connect_timeout: http.connect_timeout.as_secs(),
            read_timeout: http.read_timeout.as_secs(),
        }
    }
}

impl HttpSettings {
    pub fn http_config(&self) -> HttpConfig {
        HttpConfig {
            connect_timeout: Duration::from_secs(self.connect_timeout),
            read_timeout: Duration::from_secs(self.read_timeout),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct WorkersConfig {
    pub default: usize,
    pub max: usize,
}

impl Default for WorkersConfig {
    fn default() -> Self {
        // Sequential unless asked otherwise; the store throttles aggressive clients
        Self { default: 1, max: 16 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TocConfig {
    pub prefix: String,
    pub first_year: i32,
}

impl Default for TocConfig {
    fn default() -> Self {
        Self {
            prefix: ccindex_warc::manifest::DEFAULT_PREFIX.to_string(),
            first_year: ccindex_warc::manifest::DEFAULT_FIRST_YEAR,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Default)]
#[serde(default)]
pub struct LanguageConfig {
    pub preload_models: bool,
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./ccindex.toml (current directory)
    /// 2. ~/.config/ccindex/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("ccindex.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "ccindex") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }
}
