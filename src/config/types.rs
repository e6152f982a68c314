//! Core configuration types and loading.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use tracing::warn;

use super::defaults::*;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Bot runtime configuration. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Platform login and presence.
    pub bot: BotConfig,
    /// Trigger phrases and the guild role/channel store.
    pub moderation: ModerationConfig,
    /// Audit log location.
    pub audit: AuditConfig,
    /// Keep-alive HTTP sidecar.
    pub keepalive: KeepaliveConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Like [`Config::load`], but a missing file yields the defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        Self::load(path)
    }
}

/// Platform login and presence.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Name of the environment variable holding the bot token.
    pub token_env: String,
    /// Prefix for `unlock` and `lockconfig` (e.g., "!").
    pub command_prefix: String,
    /// Shown as "Watching <status_text>".
    pub status_text: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            token_env: default_token_env(),
            command_prefix: default_command_prefix(),
            status_text: default_status_text(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModerationConfig {
    /// Whole-message phrases that request a lock, matched case-insensitively.
    pub trigger_phrases: Vec<String>,
    /// JSON file with authorized roles and auto-delete channels.
    pub guild_config_path: String,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            trigger_phrases: default_trigger_phrases(),
            guild_config_path: default_guild_config_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Append-only thread actions log.
    pub path: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            path: default_audit_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KeepaliveConfig {
    /// HTTP port for the status and metrics endpoints. 0 disables the server.
    pub port: u16,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            port: default_keepalive_port(),
        }
    }
}
