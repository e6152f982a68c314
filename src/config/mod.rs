//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Config struct definitions (Config, BotConfig, ModerationConfig, ...)
//! - [`defaults`]: serde default value functions
//! - [`validation`]: startup checks that collect every problem at once

mod defaults;
mod types;
mod validation;

pub use types::{AuditConfig, BotConfig, Config, ConfigError, KeepaliveConfig, ModerationConfig};
pub use validation::{ValidationError, validate};
