//! Thread lock moderation core.
//!
//! [`Moderator`] drives every workflow:
//!
//! ```text
//! MessageCreated ─► trigger? ─► can_lock? ─► already locked? ─► lock ─► LOCK entry
//!                                                                   │
//!                       parent in auto-delete set ◄─────────────────┤
//!                       │                                           │
//!                       ▼                                           ▼
//!              auto_delete (5 s, unlock, delete)       confirm (Delete / Keep / 60 s)
//! ```
//!
//! Split across submodules the same way the workflows are:
//! - [`processor`]: trigger matching and the lock step
//! - [`confirm`]: Delete/Keep confirmation sessions
//! - [`auto_delete`]: the fixed countdown for auto-delete channels
//! - [`commands`]: `unlock` and `lockconfig`

pub mod auto_delete;
pub mod commands;
pub mod confirm;
pub mod processor;

use crate::audit::AuditLogger;
use crate::gateway::{ChannelId, Gateway, OutgoingMessage};
use crate::security::AuthorizationResolver;
use crate::state::GuildConfigStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub use commands::LockConfigCommand;
pub use confirm::{ButtonOutcome, Resolution, SessionRegistry, SessionState};
pub use processor::LockOutcome;

/// How long transient notices stay visible.
pub const NOTICE_LIFETIME: Duration = Duration::from_secs(5);

/// Delay between the auto-delete notice and the deletion.
pub const AUTO_DELETE_COUNTDOWN: Duration = Duration::from_secs(5);

/// Pause after unlocking so the platform accepts the following delete.
pub const SETTLE_INTERVAL: Duration = Duration::from_millis(500);

/// Idle time after which a confirmation prompt disables itself.
pub const CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Default trigger phrases.
pub const DEFAULT_TRIGGERS: [&str; 2] = ["lock", "lna"];

/// The moderation core. Cheap to share behind an `Arc`; every workflow runs
/// on the calling task or on tasks it spawns.
pub struct Moderator {
    gateway: Arc<dyn Gateway>,
    guild_config: Arc<GuildConfigStore>,
    resolver: AuthorizationResolver,
    audit: Arc<AuditLogger>,
    sessions: Arc<SessionRegistry>,
    triggers: Vec<String>,
}

impl Moderator {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        guild_config: Arc<GuildConfigStore>,
        audit: Arc<AuditLogger>,
        triggers: &[String],
    ) -> Self {
        Self {
            gateway,
            resolver: AuthorizationResolver::new(Arc::clone(&guild_config)),
            guild_config,
            audit,
            sessions: Arc::new(SessionRegistry::new()),
            triggers: triggers.iter().map(|t| t.trim().to_lowercase()).collect(),
        }
    }

    pub fn resolver(&self) -> &AuthorizationResolver {
        &self.resolver
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Case-insensitive exact match after trimming.
    pub fn is_trigger(&self, content: &str) -> bool {
        let content = content.trim().to_lowercase();
        self.triggers.iter().any(|t| *t == content)
    }

    /// Post a notice that deletes itself after [`NOTICE_LIFETIME`].
    async fn notify_transient(&self, channel: ChannelId, text: impl Into<String>) {
        let message = OutgoingMessage::text(text).delete_after(NOTICE_LIFETIME);
        if let Err(e) = self.gateway.send_message(channel, message).await {
            warn!(channel = channel, error = %e, "Failed to send notice");
        }
    }

    /// Post a regular reply.
    async fn reply(&self, channel: ChannelId, message: OutgoingMessage) {
        if let Err(e) = self.gateway.send_message(channel, message).await {
            warn!(channel = channel, error = %e, "Failed to send reply");
        }
    }
}
