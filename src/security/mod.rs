//! Security module for threadlock.
//!
//! - **Permissions**: lock/delete authorization and the bot permission preflight

pub mod permissions;

pub use permissions::{AuthorizationResolver, BotCapabilityReport, Capabilities, LockGrant};
