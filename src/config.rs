//! Configuration Management
//!
//! Handles persistent configuration storage for xoctl. The token is never
//! written here.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use xoctl::DEFAULT_LIMIT;

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Last used endpoint
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Skip certificate verification (self-signed appliances)
    #[serde(default)]
    pub insecure: bool,
    /// Default result limit for queries without --limit
    #[serde(default)]
    pub default_limit: Option<u32>,
}

impl Config {
    /// Get the config file path
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("xoctl").join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring unreadable config {:?}: {}", path, e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, content).with_context(|| format!("Failed to write {:?}", path))?;

        Ok(())
    }

    /// Effective endpoint (CLI > config)
    pub fn effective_endpoint(&self, cli: Option<&str>) -> Option<String> {
        cli.map(str::to_string).or_else(|| self.endpoint.clone())
    }

    /// Effective default limit (config > library default)
    pub fn effective_limit(&self) -> u32 {
        self.default_limit.unwrap_or(DEFAULT_LIMIT)
    }

    /// Set the default limit and save
    pub fn set_default_limit(&mut self, limit: u32) -> Result<()> {
        self.default_limit = Some(limit);
        self.save()
    }

    /// Set the endpoint and save
    pub fn set_endpoint(&mut self, endpoint: &str) -> Result<()> {
        self.endpoint = Some(endpoint.to_string());
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_endpoint_wins() {
        let config = Config {
            endpoint: Some("https://saved.example".into()),
            ..Config::default()
        };
        assert_eq!(
            config.effective_endpoint(Some("https://cli.example")).as_deref(),
            Some("https://cli.example")
        );
        assert_eq!(
            config.effective_endpoint(None).as_deref(),
            Some("https://saved.example")
        );
    }

    #[test]
    fn test_limit_falls_back_to_library_default() {
        assert_eq!(Config::default().effective_limit(), DEFAULT_LIMIT);
        let config = Config {
            default_limit: Some(0),
            ..Config::default()
        };
        assert_eq!(config.effective_limit(), 0);
    }

    #[test]
    fn test_token_is_not_a_config_field() {
        let json = serde_json::to_string(&Config::default()).unwrap();
        assert!(!json.contains("token"));
    }
}
