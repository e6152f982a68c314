//! Default value functions for configuration.
//!
//! Separated into its own module for clarity and reuse.

use crate::moderation::DEFAULT_TRIGGERS;

// =============================================================================
// Bot Defaults
// =============================================================================

pub fn default_token_env() -> String {
    "DISCORD_TOKEN".to_string()
}

pub fn default_command_prefix() -> String {
    "!".to_string()
}

pub fn default_status_text() -> String {
    "for 'lock' and 'lna' commands".to_string()
}

// =============================================================================
// Moderation Defaults
// =============================================================================

pub fn default_trigger_phrases() -> Vec<String> {
    DEFAULT_TRIGGERS.iter().map(|t| t.to_string()).collect()
}

pub fn default_guild_config_path() -> String {
    "config.json".to_string()
}

// =============================================================================
// Audit Defaults
// =============================================================================

pub fn default_audit_path() -> String {
    "logs/thread_actions.log".to_string()
}

// =============================================================================
// Keep-alive Defaults
// =============================================================================

pub fn default_keepalive_port() -> u16 {
    5000
}
