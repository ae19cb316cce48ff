//! Configuration for the sync engine and its hosted store

use blib_config::Config;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Realtime protocol version appended to the websocket URL
const REALTIME_VSN: &str = "1.0.0";

/// Configuration for the hosted store and realtime subscription
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Base URL of the hosted project (http or https)
    pub project_url: String,

    /// Public API key sent as `apikey`
    pub api_key: String,

    /// User access token; requests fall back to the API key when absent
    pub access_token: Option<String>,

    /// Table holding bookmark rows
    pub table: String,

    /// Open a live change stream at all
    pub realtime_enabled: bool,

    /// Channel name (topic becomes `realtime:{channel}`)
    pub channel: String,

    pub heartbeat_interval: Duration,

    pub reconnect_min: Duration,

    pub reconnect_max: Duration,

    /// Push events buffered between the socket and the engine
    pub event_buffer: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            project_url: String::new(),
            api_key: String::new(),
            access_token: None,
            table: "bookmarks".to_string(),
            realtime_enabled: true,
            channel: "bookmarks-realtime".to_string(),
            heartbeat_interval: Duration::from_secs(30),
            reconnect_min: Duration::from_millis(500),
            reconnect_max: Duration::from_secs(30),
            event_buffer: 256,
        }
    }
}

impl SyncConfig {
    /// Build from the workspace config file
    pub fn from_config(config: &Config) -> Self {
        Self {
            project_url: config.remote.project_url.clone(),
            api_key: config.remote.anon_key.clone(),
            access_token: config.auth.access_token.clone(),
            table: config.remote.table.clone(),
            realtime_enabled: config.realtime.enabled,
            channel: config.realtime.channel.clone(),
            heartbeat_interval: Duration::from_secs(config.realtime.heartbeat_secs.max(1)),
            reconnect_min: Duration::from_millis(config.realtime.reconnect_min_ms),
            reconnect_max: Duration::from_millis(config.realtime.reconnect_max_ms),
            event_buffer: config.realtime.event_buffer.max(1),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.project_url.is_empty() {
            anyhow::bail!("project_url cannot be empty (set [remote] project_url)");
        }
        if !self.project_url.starts_with("http://") && !self.project_url.starts_with("https://") {
            anyhow::bail!("project_url must start with http:// or https://");
        }
        if self.api_key.is_empty() {
            anyhow::bail!("anon_key cannot be empty (set [remote] anon_key)");
        }
        if self.table.is_empty() {
            anyhow::bail!("table cannot be empty");
        }
        if self.reconnect_min > self.reconnect_max {
            anyhow::bail!("reconnect_min_ms must not exceed reconnect_max_ms");
        }
        Ok(())
    }

    fn base(&self) -> &str {
        self.project_url.trim_end_matches('/')
    }

    /// REST endpoint for the bookmark table
    pub fn rest_endpoint(&self) -> anyhow::Result<Url> {
        Ok(Url::parse(&format!("{}/rest/v1/{}", self.base(), self.table))?)
    }

    /// Websocket endpoint for the realtime service
    pub fn realtime_endpoint(&self) -> anyhow::Result<Url> {
        let base = self.base();
        let ws_base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            anyhow::bail!("project_url must start with http:// or https://");
        };

        Ok(Url::parse_with_params(
            &format!("{}/realtime/v1/websocket", ws_base),
            &[("apikey", self.api_key.as_str()), ("vsn", REALTIME_VSN)],
        )?)
    }

    /// Bearer credential for requests and the channel join
    pub fn bearer(&self) -> &str {
        self.access_token.as_deref().unwrap_or(&self.api_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> SyncConfig {
        SyncConfig {
            project_url: "https://abc.supabase.co/".to_string(),
            api_key: "anon".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_validate() {
        assert!(valid().validate().is_ok());

        let missing = SyncConfig::default();
        assert!(missing.validate().is_err());

        let bad_scheme = SyncConfig {
            project_url: "ftp://abc".to_string(),
            ..valid()
        };
        assert!(bad_scheme.validate().is_err());
    }

    #[test]
    fn test_endpoints() {
        let config = valid();
        assert_eq!(
            config.rest_endpoint().unwrap().as_str(),
            "https://abc.supabase.co/rest/v1/bookmarks"
        );
        assert_eq!(
            config.realtime_endpoint().unwrap().as_str(),
            "wss://abc.supabase.co/realtime/v1/websocket?apikey=anon&vsn=1.0.0"
        );

        let local = SyncConfig {
            project_url: "http://127.0.0.1:54321".to_string(),
            ..valid()
        };
        assert!(local
            .realtime_endpoint()
            .unwrap()
            .as_str()
            .starts_with("ws://127.0.0.1:54321/realtime/v1/websocket"));
    }

    #[test]
    fn test_bearer_prefers_access_token() {
        let mut config = valid();
        assert_eq!(config.bearer(), "anon");
        config.access_token = Some("user-jwt".to_string());
        assert_eq!(config.bearer(), "user-jwt");
    }

    #[test]
    fn test_from_config() {
        let mut file = Config::default();
        file.remote.project_url = "https://abc.supabase.co".to_string();
        file.remote.anon_key = "anon".to_string();
        file.realtime.heartbeat_secs = 0;

        let config = SyncConfig::from_config(&file);
        assert_eq!(config.heartbeat_interval, Duration::from_secs(1));
        assert_eq!(config.channel, "bookmarks-realtime");
        assert!(config.validate().is_ok());
    }
}
