//! Discord implementation of [`Gateway`] over the serenity HTTP client.
//!
//! Every call is a single REST request. Failures are classified by HTTP
//! status: 403 is [`GatewayError::Forbidden`], 404 is
//! [`GatewayError::NotFound`], anything else is [`GatewayError::Other`].

use super::{
    ButtonKind, ChannelId, Embed, Gateway, GatewayError, InteractionRef, MessageHandle,
    OutgoingMessage, Permission, ThreadId, ThreadInfo,
};
use async_trait::async_trait;
use dashmap::DashMap;
use serenity::all::{
    ButtonStyle, ChannelType, ComponentInteraction, CreateActionRow, CreateButton, CreateEmbed,
    CreateInteractionResponse, CreateInteractionResponseFollowup,
    CreateInteractionResponseMessage, CreateMessage, EditMessage, EditThread, GuildChannel, Http,
    MessageId, Permissions, ReactionType, Timestamp,
};
use std::sync::Arc;
use tracing::debug;

type DiscordChannelId = serenity::all::ChannelId;

/// Component interactions awaiting replies, keyed by interaction id.
struct TrackedInteraction {
    interaction: ComponentInteraction,
    responded: bool,
}

pub struct DiscordGateway {
    http: Arc<Http>,
    interactions: DashMap<u64, TrackedInteraction>,
}

impl DiscordGateway {
    pub fn new(http: Arc<Http>) -> Self {
        Self {
            http,
            interactions: DashMap::new(),
        }
    }

    /// Make an interaction addressable by [`Gateway::send_ephemeral`].
    pub fn track_interaction(&self, interaction: ComponentInteraction) -> InteractionRef {
        let reference = InteractionRef {
            id: interaction.id.get(),
            actor: interaction.user.id.get(),
        };
        self.interactions.insert(
            reference.id,
            TrackedInteraction {
                interaction,
                responded: false,
            },
        );
        reference
    }

    pub fn forget_interaction(&self, interaction: &InteractionRef) {
        self.interactions.remove(&interaction.id);
    }

    async fn set_locked(&self, thread: ThreadId, locked: bool) -> Result<(), GatewayError> {
        DiscordChannelId::new(thread)
            .edit_thread(&self.http, EditThread::new().locked(locked))
            .await
            .map(|_| ())
            .map_err(classify)
    }

    /// Delete a message after `delay` without blocking the caller.
    fn schedule_delete(&self, channel: DiscordChannelId, message: MessageId, delay: std::time::Duration) {
        let http = Arc::clone(&self.http);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = channel.delete_message(&http, message).await {
                debug!(channel = %channel, error = %e, "Transient notice already gone");
            }
        });
    }
}

#[async_trait]
impl Gateway for DiscordGateway {
    async fn fetch_thread(&self, thread: ThreadId) -> Result<ThreadInfo, GatewayError> {
        let channel = DiscordChannelId::new(thread)
            .to_channel(&self.http)
            .await
            .map_err(classify)?;
        channel
            .guild()
            .as_ref()
            .and_then(thread_info)
            .ok_or_else(|| GatewayError::Other(format!("channel {thread} is not a thread")))
    }

    async fn lock_thread(&self, thread: ThreadId) -> Result<(), GatewayError> {
        self.set_locked(thread, true).await
    }

    async fn unlock_thread(&self, thread: ThreadId) -> Result<(), GatewayError> {
        self.set_locked(thread, false).await
    }

    async fn delete_thread(&self, thread: ThreadId) -> Result<(), GatewayError> {
        DiscordChannelId::new(thread)
            .delete(&self.http)
            .await
            .map(|_| ())
            .map_err(classify)
    }

    async fn send_message(
        &self,
        channel: ChannelId,
        message: OutgoingMessage,
    ) -> Result<MessageHandle, GatewayError> {
        let channel = DiscordChannelId::new(channel);
        let mut builder = CreateMessage::new();
        if let Some(content) = &message.content {
            builder = builder.content(content);
        }
        if let Some(embed) = &message.embed {
            builder = builder.embed(build_embed(embed));
        }
        if let Some(thread) = message.prompt_for {
            builder = builder.components(prompt_buttons(thread, false));
        }

        let sent = channel
            .send_message(&self.http, builder)
            .await
            .map_err(classify)?;

        if let Some(delay) = message.delete_after {
            self.schedule_delete(channel, sent.id, delay);
        }

        Ok(MessageHandle {
            channel_id: sent.channel_id.get(),
            message_id: sent.id.get(),
        })
    }

    async fn disable_prompt(&self, prompt: &MessageHandle) -> Result<(), GatewayError> {
        // Prompts are posted inside the thread they control.
        let edit = EditMessage::new().components(prompt_buttons(prompt.channel_id, true));
        DiscordChannelId::new(prompt.channel_id)
            .edit_message(&self.http, MessageId::new(prompt.message_id), edit)
            .await
            .map(|_| ())
            .map_err(classify)
    }

    async fn send_ephemeral(
        &self,
        interaction: &InteractionRef,
        text: &str,
    ) -> Result<(), GatewayError> {
        let (component, first) = {
            let mut entry = self
                .interactions
                .get_mut(&interaction.id)
                .ok_or(GatewayError::NotFound)?;
            let first = !entry.responded;
            entry.responded = true;
            (entry.interaction.clone(), first)
        };

        if first {
            let reply = CreateInteractionResponseMessage::new()
                .content(text)
                .ephemeral(true);
            component
                .create_response(&self.http, CreateInteractionResponse::Message(reply))
                .await
                .map_err(classify)
        } else {
            let followup = CreateInteractionResponseFollowup::new()
                .content(text)
                .ephemeral(true);
            component
                .create_followup(&self.http, followup)
                .await
                .map(|_| ())
                .map_err(classify)
        }
    }
}

/// Snapshot a guild channel as a thread, or `None` if it is not one.
pub fn thread_info(channel: &GuildChannel) -> Option<ThreadInfo> {
    if !matches!(
        channel.kind,
        ChannelType::PublicThread | ChannelType::PrivateThread | ChannelType::NewsThread
    ) {
        return None;
    }
    Some(ThreadInfo {
        id: channel.id.get(),
        name: channel.name.clone(),
        parent_id: channel.parent_id.map(|p| p.get()),
        guild_id: channel.guild_id.get(),
        locked: channel.thread_metadata.as_ref().is_some_and(|m| m.locked),
    })
}

const PERMISSION_FLAGS: [(Permissions, Permission); 6] = [
    (Permissions::ADMINISTRATOR, Permission::Administrator),
    (Permissions::MANAGE_THREADS, Permission::ManageThreads),
    (Permissions::SEND_MESSAGES, Permission::SendMessages),
    (Permissions::EMBED_LINKS, Permission::EmbedLinks),
    (Permissions::READ_MESSAGE_HISTORY, Permission::ReadMessageHistory),
    (Permissions::USE_EXTERNAL_EMOJIS, Permission::UseExternalEmojis),
];

/// The moderation-relevant subset of a platform permission set.
pub fn permissions_from(flags: Permissions) -> Vec<Permission> {
    PERMISSION_FLAGS
        .iter()
        .filter(|(flag, _)| flags.contains(*flag))
        .map(|(_, permission)| *permission)
        .collect()
}

fn prompt_buttons(thread: ThreadId, disabled: bool) -> Vec<CreateActionRow> {
    let button = |kind: ButtonKind, style: ButtonStyle| {
        CreateButton::new(kind.custom_id(thread))
            .label(kind.label())
            .emoji(ReactionType::Unicode(kind.emoji().to_string()))
            .style(style)
            .disabled(disabled)
    };
    vec![CreateActionRow::Buttons(vec![
        button(ButtonKind::Delete, ButtonStyle::Danger),
        button(ButtonKind::Keep, ButtonStyle::Secondary),
    ])]
}

fn build_embed(embed: &Embed) -> CreateEmbed {
    let mut out = CreateEmbed::new().title(&embed.title).color(embed.color);
    if let Some(description) = &embed.description {
        out = out.description(description);
    }
    for field in &embed.fields {
        out = out.field(&field.name, &field.value, field.inline);
    }
    if let Some(at) = embed
        .timestamp
        .and_then(|t| Timestamp::from_unix_timestamp(t.timestamp()).ok())
    {
        out = out.timestamp(at);
    }
    out
}

fn classify(err: serenity::Error) -> GatewayError {
    if let serenity::Error::Http(http_err) = &err {
        match http_err.status_code().map(|s| s.as_u16()) {
            Some(403) => return GatewayError::Forbidden,
            Some(404) => return GatewayError::NotFound,
            _ => {}
        }
    }
    GatewayError::Other(err.to_string())
}
