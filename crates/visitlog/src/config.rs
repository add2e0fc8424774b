//! Configuration management for visitlog.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::signature::{MAX_LAYOUT_DIMENSION, MAX_PIXEL_RATIO};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "visitlog";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "visitors.db";

/// Environment variables read without a prefix, and the config keys they set.
const RAW_ENV_KEYS: &[(&str, &str)] = &[
    ("AZURE_TENANT_ID", "remote.tenant_id"),
    ("AZURE_CLIENT_ID", "remote.client_id"),
    ("AZURE_CLIENT_SECRET", "remote.client_secret"),
    ("SHAREPOINT_SITE_ID", "remote.site_id"),
    ("SHAREPOINT_LIST_ID", "remote.list_id"),
];

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. `AZURE_*` / `SHAREPOINT_*` environment variables
/// 2. Environment variables prefixed with `VISITLOG_` (sections split on `__`)
/// 3. TOML config file at `~/.config/visitlog/config.toml`
/// 4. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote list service configuration.
    pub remote: RemoteConfig,
    /// Local fallback storage configuration.
    pub storage: StorageConfig,
    /// HTTP API configuration.
    pub server: ServerConfig,
    /// Signature surface configuration.
    pub signature: SignatureConfig,
}

/// Remote list service configuration.
///
/// Credentials and identifiers are optional here so that the local-only
/// commands work without them; [`Config::remote_settings`] enforces presence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Azure AD tenant id.
    pub tenant_id: Option<String>,
    /// Application (client) id.
    pub client_id: Option<String>,
    /// Application client secret.
    pub client_secret: Option<String>,
    /// SharePoint site id.
    pub site_id: Option<String>,
    /// SharePoint list id.
    pub list_id: Option<String>,
    /// OAuth authority base URL.
    pub authority_url: String,
    /// Graph API base URL, including the version segment.
    pub graph_url: String,
    /// Timeout for each remote request in seconds.
    pub timeout_secs: u64,
}

/// Local storage configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/visitlog/visitors.db`
    pub database_path: Option<PathBuf>,
}

/// HTTP API configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address the API listens on.
    pub bind_address: String,
}

/// Signature capture surface configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignatureConfig {
    /// Layout width in logical pixels.
    pub width: u32,
    /// Layout height in logical pixels.
    pub height: u32,
    /// Device pixel ratio applied to the backing raster.
    pub pixel_ratio: f32,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            tenant_id: None,
            client_id: None,
            client_secret: None,
            site_id: None,
            list_id: None,
            authority_url: "https://login.microsoftonline.com".to_string(),
            graph_url: "https://graph.microsoft.com/v1.0".to_string(),
            timeout_secs: 20,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:3000".to_string(),
        }
    }
}

impl Default for SignatureConfig {
    fn default() -> Self {
        Self {
            width: 600,
            height: 140,
            pixel_ratio: 1.0,
        }
    }
}

/// Validated settings for the remote list adapter.
///
/// Produced once by [`Config::remote_settings`]; holding one means every
/// credential and identifier is present.
#[derive(Clone, PartialEq)]
pub struct RemoteSettings {
    /// Azure AD tenant id.
    pub tenant_id: String,
    /// Application (client) id.
    pub client_id: String,
    /// Application client secret.
    pub client_secret: String,
    /// SharePoint site id.
    pub site_id: String,
    /// SharePoint list id.
    pub list_id: String,
    /// OAuth authority base URL.
    pub authority_url: String,
    /// Graph API base URL.
    pub graph_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl std::fmt::Debug for RemoteSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteSettings")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"********")
            .field("site_id", &self.site_id)
            .field("list_id", &self.list_id)
            .field("authority_url", &self.authority_url)
            .field("graph_url", &self.graph_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("VISITLOG_").split("__"))
            .merge(raw_env());

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// Remote credentials are not checked here; see [`Config::remote_settings`].
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.remote.timeout_secs == 0 {
            return Err(Error::ConfigValidation {
                message: "remote.timeout_secs must be greater than 0".to_string(),
            });
        }

        for (name, url) in [
            ("remote.authority_url", &self.remote.authority_url),
            ("remote.graph_url", &self.remote.graph_url),
        ] {
            if url.trim().is_empty() {
                return Err(Error::ConfigValidation {
                    message: format!("{name} must not be empty"),
                });
            }
        }

        let (width, height) = (self.signature.width, self.signature.height);
        let in_range = |d: u32| (1..=MAX_LAYOUT_DIMENSION).contains(&d);
        if !in_range(width) || !in_range(height) {
            return Err(Error::ConfigValidation {
                message: format!(
                    "signature size must be between 1 and {MAX_LAYOUT_DIMENSION} (got {width}x{height})"
                ),
            });
        }

        let ratio = self.signature.pixel_ratio;
        if !ratio.is_finite() || ratio <= 0.0 || ratio > MAX_PIXEL_RATIO {
            return Err(Error::ConfigValidation {
                message: format!(
                    "signature.pixel_ratio must be in (0, {MAX_PIXEL_RATIO}] (got {ratio})"
                ),
            });
        }

        if self.server.bind_address.parse::<SocketAddr>().is_err() {
            return Err(Error::ConfigValidation {
                message: format!(
                    "invalid server.bind_address: {}",
                    self.server.bind_address
                ),
            });
        }

        Ok(())
    }

    /// Resolve the remote list settings, failing if any credential or list
    /// identifier is missing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] naming every missing value.
    pub fn remote_settings(&self) -> Result<RemoteSettings> {
        let remote = &self.remote;
        let required = [
            ("AZURE_TENANT_ID", &remote.tenant_id),
            ("AZURE_CLIENT_ID", &remote.client_id),
            ("AZURE_CLIENT_SECRET", &remote.client_secret),
            ("SHAREPOINT_SITE_ID", &remote.site_id),
            ("SHAREPOINT_LIST_ID", &remote.list_id),
        ];

        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.as_deref().map_or(true, |v| v.trim().is_empty()))
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(Error::configuration(format!(
                "missing remote settings: {}",
                missing.join(", ")
            )));
        }

        let value = |v: &Option<String>| v.clone().unwrap_or_default();
        Ok(RemoteSettings {
            tenant_id: value(&remote.tenant_id),
            client_id: value(&remote.client_id),
            client_secret: value(&remote.client_secret),
            site_id: value(&remote.site_id),
            list_id: value(&remote.list_id),
            authority_url: remote.authority_url.trim_end_matches('/').to_string(),
            graph_url: remote.graph_url.trim_end_matches('/').to_string(),
            timeout: self.remote_timeout(),
        })
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the remote request timeout as a Duration.
    #[must_use]
    pub fn remote_timeout(&self) -> Duration {
        Duration::from_secs(self.remote.timeout_secs)
    }

    /// Get the parsed bind address.
    ///
    /// # Errors
    ///
    /// Returns an error if the address does not parse.
    pub fn bind_address(&self) -> Result<SocketAddr> {
        self.server
            .bind_address
            .parse()
            .map_err(|_| Error::ConfigValidation {
                message: format!("invalid server.bind_address: {}", self.server.bind_address),
            })
    }

    /// A copy safe to print: the client secret is masked.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.remote.client_secret.is_some() {
            config.remote.client_secret = Some("********".to_string());
        }
        config
    }
}

/// Provider for the unprefixed Azure and SharePoint variables.
fn raw_env() -> Env {
    Env::raw().filter_map(|key| {
        let upper = key.as_str().to_ascii_uppercase();
        RAW_ENV_KEYS
            .iter()
            .find(|(name, _)| *name == upper)
            .map(|(_, target)| (*target).into())
    })
}
