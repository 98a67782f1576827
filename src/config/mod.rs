use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::{CheckerError, Result};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Internet Archive registry
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Bilibili API (legacy id lookup)
    #[serde(default)]
    pub bilibili: BilibiliConfig,

    /// Archiver service that accepts archive requests
    #[serde(default)]
    pub archiver: ArchiverConfig,

    /// Navigation watcher
    #[serde(default)]
    pub watch: WatchConfig,

    /// Browser to attach to
    #[serde(default)]
    pub browser: BrowserConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Identifier check endpoint
    #[serde(default = "default_check_url")]
    pub check_url: String,

    /// Prefix of an item's detail page
    #[serde(default = "default_details_url")]
    pub details_url: String,

    /// Identifier namespace
    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            check_url: default_check_url(),
            details_url: default_details_url(),
            namespace: default_namespace(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_check_url() -> String {
    "https://archive.org/services/check_identifier.php".to_string()
}

fn default_details_url() -> String {
    "https://archive.org/details/".to_string()
}

fn default_namespace() -> String {
    crate::identifier::NAMESPACE.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BilibiliConfig {
    /// Video info endpoint, queried with `?aid=`
    #[serde(default = "default_view_api_url")]
    pub view_api_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for BilibiliConfig {
    fn default() -> Self {
        Self {
            view_api_url: default_view_api_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_view_api_url() -> String {
    "https://api.bilibili.com/x/web-interface/view".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiverConfig {
    /// Base URL of the archiver API, without the `/archive/` part.
    /// Archive requests are disabled while unset.
    pub base_url: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ArchiverConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl WatchConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

fn default_poll_interval_ms() -> u64 {
    5000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    #[serde(default = "default_cdp_host")]
    pub cdp_host: String,

    #[serde(default = "default_cdp_port")]
    pub cdp_port: u16,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            cdp_host: default_cdp_host(),
            cdp_port: default_cdp_port(),
        }
    }
}

fn default_cdp_host() -> String {
    "127.0.0.1".to_string()
}

fn default_cdp_port() -> u16 {
    9222
}

impl Config {
    /// Load configuration from all sources (file, env, defaults)
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration using `path` as the config file
    pub fn load_from(path: &Path) -> Result<Self> {
        let config: Config = Figment::new()
            // Start with defaults
            .merge(Serialized::defaults(Config::default()))
            // Merge config file if exists
            .merge(Toml::file(path))
            // Merge environment variables (BILI_ARCHIVE_SECTION__KEY)
            .merge(Env::prefixed("BILI_ARCHIVE_").split("__"))
            .extract()
            .map_err(|e| CheckerError::ConfigError(e.to_string()))?;

        Ok(config)
    }

    /// Get the configuration file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("bili-archive-checker")
            .join("config.toml")
    }

    /// Save configuration to the default file
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| CheckerError::ConfigError(e.to_string()))?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Read a single value by its dotted key
    pub fn get_value(&self, key: &str) -> Result<Option<String>> {
        let value = match key {
            "registry.check_url" => Some(self.registry.check_url.clone()),
            "registry.details_url" => Some(self.registry.details_url.clone()),
            "registry.namespace" => Some(self.registry.namespace.clone()),
            "registry.timeout_secs" => Some(self.registry.timeout_secs.to_string()),
            "bilibili.view_api_url" => Some(self.bilibili.view_api_url.clone()),
            "bilibili.timeout_secs" => Some(self.bilibili.timeout_secs.to_string()),
            "archiver.base_url" => self.archiver.base_url.clone(),
            "archiver.timeout_secs" => Some(self.archiver.timeout_secs.to_string()),
            "watch.poll_interval_ms" => Some(self.watch.poll_interval_ms.to_string()),
            "browser.cdp_host" => Some(self.browser.cdp_host.clone()),
            "browser.cdp_port" => Some(self.browser.cdp_port.to_string()),
            _ => return Err(unknown_key(key)),
        };
        Ok(value)
    }

    /// Set a single value by its dotted key
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "registry.check_url" => self.registry.check_url = value.to_string(),
            "registry.details_url" => self.registry.details_url = value.to_string(),
            "registry.namespace" => self.registry.namespace = value.to_string(),
            "registry.timeout_secs" => self.registry.timeout_secs = parse_number(key, value)?,
            "bilibili.view_api_url" => self.bilibili.view_api_url = value.to_string(),
            "bilibili.timeout_secs" => self.bilibili.timeout_secs = parse_number(key, value)?,
            "archiver.base_url" => {
                let trimmed = value.trim();
                self.archiver.base_url = if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                };
            }
            "archiver.timeout_secs" => self.archiver.timeout_secs = parse_number(key, value)?,
            "watch.poll_interval_ms" => {
                self.watch.poll_interval_ms = parse_number(key, value)?
            }
            "browser.cdp_host" => self.browser.cdp_host = value.to_string(),
            "browser.cdp_port" => self.browser.cdp_port = parse_number(key, value)?,
            _ => return Err(unknown_key(key)),
        }
        Ok(())
    }
}

fn unknown_key(key: &str) -> CheckerError {
    CheckerError::ConfigError(format!("Unknown config key: {}", key))
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| CheckerError::ConfigError(format!("{} must be a number", key)))
}
