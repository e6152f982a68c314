//! Chat platform gateway abstraction.
//!
//! The moderation core performs every platform side effect through the
//! [`Gateway`] trait. [`discord::DiscordGateway`] implements it over the
//! serenity HTTP client; tests use the recording gateway in [`memory`].

use async_trait::async_trait;

pub mod discord;
#[cfg(test)]
pub mod memory;
pub mod types;

pub use crate::error::GatewayError;
pub use types::{
    ActorSnapshot, ButtonKind, ButtonPressed, ChannelId, Embed, GuildId, GuildInfo,
    InteractionRef, MessageCreated, MessageHandle, OutgoingMessage, Permission, RoleId, ThreadId,
    ThreadInfo, ThreadOp, UserId,
};

/// Single-attempt platform operations consumed by the moderation core.
///
/// Implementations must not retry; the caller decides what a failure means.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Re-read a thread's current state from the platform.
    async fn fetch_thread(&self, thread: ThreadId) -> Result<ThreadInfo, GatewayError>;

    async fn lock_thread(&self, thread: ThreadId) -> Result<(), GatewayError>;

    async fn unlock_thread(&self, thread: ThreadId) -> Result<(), GatewayError>;

    /// Remove the thread. The platform refuses this while the thread is locked.
    async fn delete_thread(&self, thread: ThreadId) -> Result<(), GatewayError>;

    /// Post a message, optionally transient or carrying confirmation buttons.
    async fn send_message(
        &self,
        channel: ChannelId,
        message: OutgoingMessage,
    ) -> Result<MessageHandle, GatewayError>;

    /// Disable the Delete/Keep buttons of a previously posted prompt in place.
    async fn disable_prompt(&self, prompt: &MessageHandle) -> Result<(), GatewayError>;

    /// Reply privately to the actor behind an interaction.
    async fn send_ephemeral(
        &self,
        interaction: &InteractionRef,
        text: &str,
    ) -> Result<(), GatewayError>;
}
