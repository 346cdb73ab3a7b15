//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.formpulse.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE: &str = ".formpulse.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Long-poll client settings.
    #[serde(default)]
    pub client: ClientConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Maximum time a long-poll request is held open.
    #[serde(default = "default_ceiling")]
    pub longpoll_ceiling_secs: u64,

    /// Origins allowed by CORS.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            longpoll_ceiling_secs: default_ceiling(),
            cors_origins: default_cors_origins(),
        }
    }
}

impl ServerConfig {
    pub fn longpoll_ceiling(&self) -> Duration {
        Duration::from_secs(self.longpoll_ceiling_secs)
    }

    /// Reject settings that would turn long-polling into a busy loop.
    pub fn validate(&self) -> Result<()> {
        if self.longpoll_ceiling_secs == 0 {
            anyhow::bail!("longpoll_ceiling_secs must be at least 1");
        }
        if self.bind.trim().is_empty() {
            anyhow::bail!("bind address must not be empty");
        }
        Ok(())
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_ceiling() -> u64 {
    25
}

fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:3000".to_string()]
}

/// Storage settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// JSON file the store is persisted to. In-memory only when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_file: Option<PathBuf>,
}

/// Long-poll client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the formpulse server.
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// HTTP timeout per request; must exceed the server's ceiling.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_server_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_request_timeout() -> u64 {
    35
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given explicitly.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        use crate::cli::Command;

        if args.verbose {
            self.general.verbose = true;
        }

        match &args.command {
            Command::Serve {
                bind,
                data_file,
                ceiling,
            } => {
                if let Some(bind) = bind {
                    self.server.bind = bind.clone();
                }
                if let Some(path) = data_file {
                    self.store.data_file = Some(path.clone());
                }
                if let Some(secs) = ceiling {
                    self.server.longpoll_ceiling_secs = *secs;
                }
            }
            Command::Watch { server, .. } => {
                if let Some(url) = server {
                    self.client.server_url = url.clone();
                }
            }
            Command::Summarize { .. } | Command::InitConfig => {}
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
