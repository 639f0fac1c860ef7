//! Client configuration
//!
//! The configuration is read-only once a client is built and is shared by
//! every session opened from that client.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ShodanClientError};

/// Default REST API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.shodan.io";
/// Default streaming API base URL
pub const DEFAULT_STREAM_BASE_URL: &str = "https://stream.shodan.io";
/// Environment variable holding the API key
pub const API_KEY_ENV: &str = "SHODAN_KEY";

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// API key, sent as the `key` query parameter
    pub api_key: String,
    /// Base URL for request/response endpoints
    pub base_url: String,
    /// Base URL for the banner stream endpoints
    pub stream_base_url: String,
    /// Total timeout for request/response calls, in seconds
    pub timeout_secs: u64,
    /// Connection timeout for all calls, in seconds
    pub connect_timeout_secs: u64,
    /// Capacity of the per-session output channel
    pub channel_capacity: usize,
    /// Longest frame accepted from a stream before the session is ended
    pub max_frame_bytes: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            stream_base_url: DEFAULT_STREAM_BASE_URL.to_string(),
            timeout_secs: 30,
            connect_timeout_secs: 10,
            channel_capacity: 64,
            max_frame_bytes: 16 * 1024 * 1024,
        }
    }
}

impl ClientConfig {
    /// Create a configuration with default endpoints for the given key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Create a configuration reading the API key from `SHODAN_KEY`
    pub fn from_env() -> Self {
        Self::new(std::env::var(API_KEY_ENV).unwrap_or_default())
    }

    /// Point both the REST and the stream base URLs at one server
    pub fn with_base_urls(mut self, base_url: &str, stream_base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self.stream_base_url = stream_base_url.to_string();
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Check the values that would otherwise fail later at runtime
    pub fn validate(&self) -> Result<()> {
        if self.channel_capacity == 0 {
            return Err(ShodanClientError::Config(
                "channel_capacity must be at least 1".into(),
            ));
        }
        if self.max_frame_bytes == 0 {
            return Err(ShodanClientError::Config(
                "max_frame_bytes must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
