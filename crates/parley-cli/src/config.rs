//! Configuration file support

use parley_client::{BackoffPolicy, ChatConfig, DEFAULT_URL};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration for parley
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Conversation endpoint (ws:// or wss://)
    pub url: Option<String>,
    /// Reconnect backoff
    pub reconnect: BackoffPolicy,
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("parley")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("PARLEY_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from the default location
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load config from a file, falling back to defaults on any problem
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to parse config file {}: {}", path.display(), e);
                    eprintln!("Warning: Failed to parse config file: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {}", path.display(), e);
                eprintln!("Warning: Failed to read config file: {}", e);
                Self::default()
            }
        }
    }

    /// Save config to a file
    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let content = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, content)
    }

    /// Create a default config file if it doesn't exist
    pub fn init() -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }

        let default_config = Config {
            url: Some(DEFAULT_URL.to_string()),
            reconnect: BackoffPolicy::default(),
        };
        default_config.save_to(&path)?;
        Ok(path)
    }

    /// Session settings, with a command-line url taking precedence
    pub fn chat_config(&self, url: Option<String>) -> ChatConfig {
        ChatConfig {
            url: url
                .or_else(|| self.url.clone())
                .unwrap_or_else(|| DEFAULT_URL.to_string()),
            reconnect: self.reconnect,
        }
    }
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# parley configuration file
# Place at ~/.config/parley/config.toml (Linux), or point PARLEY_CONFIG_PATH at it

# Conversation endpoint
url = "ws://localhost:8000/messaging/ws"

# Reconnect backoff: delay = min(baseDelayMs * multiplier^attempt, capDelayMs)
[reconnect]
baseDelayMs = 1000
capDelayMs = 30000
multiplier = 2.0
"#
}
