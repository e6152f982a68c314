//! Shared bot state.
//!
//! - [`guild_config`]: authorized roles and auto-delete channels (JSON store)
//! - [`stats`]: keep-alive counters handed to the HTTP sidecar

pub mod guild_config;
pub mod stats;

pub use guild_config::{GuildConfigData, GuildConfigStore, StoreError};
pub use stats::UptimeStats;
