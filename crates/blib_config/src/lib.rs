//! Configuration management for B-Lib
//!
//! This crate handles loading and defaulting `.blib/config.toml`.
//! Credentials may also come from the environment so they never have to be
//! written to disk.

use blib_common::{BlibError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file location relative to the workspace root
pub const CONFIG_PATH: &str = ".blib/config.toml";

/// Environment overrides
pub const ENV_USER_ID: &str = "BLIB_USER_ID";
pub const ENV_ACCESS_TOKEN: &str = "BLIB_ACCESS_TOKEN";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Directory the config was loaded from (set programmatically, not in TOML)
    #[serde(skip)]
    pub root: PathBuf,

    /// Remote store settings
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Signed-in identity
    #[serde(default)]
    pub auth: AuthConfig,

    /// Live change stream settings
    #[serde(default)]
    pub realtime: RealtimeConfig,

    /// Display settings
    #[serde(default)]
    pub view: ViewConfig,
}

/// Remote store configuration ([remote])
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the hosted project, e.g. `https://abc.supabase.co`
    #[serde(default)]
    pub project_url: String,

    /// Public (anon) API key sent with every request
    #[serde(default)]
    pub anon_key: String,

    #[serde(default = "default_table")]
    pub table: String,
}

fn default_table() -> String {
    "bookmarks".to_string()
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            project_url: String::new(),
            anon_key: String::new(),
            table: default_table(),
        }
    }
}

/// Identity configuration ([auth])
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    #[serde(default)]
    pub user_id: Option<String>,

    #[serde(default)]
    pub access_token: Option<String>,
}

/// Realtime configuration ([realtime])
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_channel")]
    pub channel: String,

    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,

    #[serde(default = "default_reconnect_min_ms")]
    pub reconnect_min_ms: u64,

    #[serde(default = "default_reconnect_max_ms")]
    pub reconnect_max_ms: u64,

    /// Push events buffered between the socket and the engine
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_true() -> bool {
    true
}
fn default_channel() -> String {
    "bookmarks-realtime".to_string()
}
fn default_heartbeat_secs() -> u64 {
    30
}
fn default_reconnect_min_ms() -> u64 {
    500
}
fn default_reconnect_max_ms() -> u64 {
    30_000
}
fn default_event_buffer() -> usize {
    256
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            channel: default_channel(),
            heartbeat_secs: default_heartbeat_secs(),
            reconnect_min_ms: default_reconnect_min_ms(),
            reconnect_max_ms: default_reconnect_max_ms(),
            event_buffer: default_event_buffer(),
        }
    }
}

/// View configuration ([view])
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewConfig {
    /// Search is only offered once the library holds more than this many bookmarks
    #[serde(default = "default_search_threshold")]
    pub search_threshold: usize,

    #[serde(default = "default_favicon_size")]
    pub favicon_size: u32,
}

fn default_search_threshold() -> usize {
    2
}
fn default_favicon_size() -> u32 {
    64
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            search_threshold: default_search_threshold(),
            favicon_size: default_favicon_size(),
        }
    }
}

impl Config {
    /// Load configuration from workspace root
    pub fn load(workspace_root: &Path) -> Result<Self> {
        let config_path = workspace_root.join(CONFIG_PATH);

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| BlibError::ConfigError(format!("Failed to read config: {}", e)))?;
            Self::parse(&content)?
        } else {
            tracing::debug!("No config at {}, using defaults", config_path.display());
            Self::default()
        };

        config.root = workspace_root.to_path_buf();
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse TOML content
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| BlibError::ConfigError(format!("Failed to parse config: {}", e)))
    }

    /// Override credentials from the environment. Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(user_id) = lookup(ENV_USER_ID).filter(|v| !v.trim().is_empty()) {
            self.auth.user_id = Some(user_id);
        }
        if let Some(token) = lookup(ENV_ACCESS_TOKEN).filter(|v| !v.trim().is_empty()) {
            self.auth.access_token = Some(token);
        }
    }

    /// Write a starter config with every section spelled out
    pub fn write_template(workspace_root: &Path) -> Result<PathBuf> {
        let config_path = workspace_root.join(CONFIG_PATH);
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let template = Self::default();
        let content = toml::to_string_pretty(&template)
            .map_err(|e| BlibError::ConfigError(format!("Failed to render config: {}", e)))?;
        std::fs::write(&config_path, content)?;
        Ok(config_path)
    }
}
