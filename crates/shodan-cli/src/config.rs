//! Configuration file handling for shodan-cli

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use shodan_client::ClientConfig;
use std::path::PathBuf;

/// Configuration for the CLI tool
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// API key used when neither `--key` nor `SHODAN_KEY` is given
    pub api_key: Option<String>,
    /// Default output format
    pub output: Option<String>,
    /// Disable colored output
    pub no_color: Option<bool>,
    /// REST base URL override
    pub base_url: Option<String>,
    /// Stream base URL override
    pub stream_base_url: Option<String>,
    /// Banners buffered per stream session
    pub channel_capacity: Option<usize>,
}

impl Config {
    /// Load configuration from the default config file
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Get the default config file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("shodan-cli");

        Ok(config_dir.join("config.toml"))
    }

    /// Merge CLI arguments over config file values
    pub fn merge_with_args(
        &self,
        api_key: Option<&str>,
        output: Option<&str>,
        no_color: bool,
    ) -> MergedConfig {
        let mut client = ClientConfig::new(
            api_key
                .map(String::from)
                .or_else(|| self.api_key.clone())
                .unwrap_or_default(),
        );
        if let Some(url) = &self.base_url {
            client.base_url = url.clone();
        }
        if let Some(url) = &self.stream_base_url {
            client.stream_base_url = url.clone();
        }
        if let Some(capacity) = self.channel_capacity {
            client.channel_capacity = capacity;
        }

        MergedConfig {
            client,
            output: output
                .map(String::from)
                .or_else(|| self.output.clone())
                .unwrap_or_else(|| "table".to_string()),
            no_color: no_color || self.no_color.unwrap_or(false),
        }
    }
}

/// Fully resolved configuration after merging CLI args
#[derive(Debug, Clone)]
pub struct MergedConfig {
    pub client: ClientConfig,
    pub output: String,
    pub no_color: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_override_file() {
        let config: Config = toml::from_str(
            r#"
            api_key = "from-file"
            output = "json"
            channel_capacity = 8
            "#,
        )
        .unwrap();

        let merged = config.merge_with_args(Some("from-args"), None, false);
        assert_eq!(merged.client.api_key, "from-args");
        assert_eq!(merged.client.channel_capacity, 8);
        assert_eq!(merged.output, "json");
        assert!(!merged.no_color);
    }

    #[test]
    fn test_empty_config_uses_client_defaults() {
        let merged = Config::default().merge_with_args(None, None, true);
        assert_eq!(merged.client.api_key, "");
        assert_eq!(merged.client.stream_base_url, shodan_client::DEFAULT_STREAM_BASE_URL);
        assert_eq!(merged.output, "table");
        assert!(merged.no_color);
    }
}
