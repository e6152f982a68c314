//! Platform-neutral view of the objects the moderation core touches.
//!
//! Everything here is a snapshot: the platform owns the real threads,
//! members and messages, and the core only ever sees copies taken at event
//! time or re-fetched through [`Gateway`](super::Gateway).

use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;

pub type GuildId = u64;
pub type ChannelId = u64;
/// Threads are channels on the platform, so they share the id space.
pub type ThreadId = u64;
pub type UserId = u64;
pub type RoleId = u64;
pub type MessageId = u64;

// ============================================================================
// Permissions
// ============================================================================

/// Platform capabilities relevant to thread moderation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Permission {
    Administrator,
    ManageThreads,
    SendMessages,
    EmbedLinks,
    ReadMessageHistory,
    UseExternalEmojis,
}

impl Permission {
    /// Permissions the bot identity needs to operate in a guild.
    pub const BOT_REQUIRED: [Permission; 5] = [
        Permission::ManageThreads,
        Permission::SendMessages,
        Permission::EmbedLinks,
        Permission::ReadMessageHistory,
        Permission::UseExternalEmojis,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Administrator => "administrator",
            Self::ManageThreads => "manage_threads",
            Self::SendMessages => "send_messages",
            Self::EmbedLinks => "embed_links",
            Self::ReadMessageHistory => "read_message_history",
            Self::UseExternalEmojis => "use_external_emojis",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Guilds, threads, actors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildInfo {
    pub id: GuildId,
    pub name: String,
}

/// A thread as last observed from the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadInfo {
    pub id: ThreadId,
    pub name: String,
    /// Channel the thread was created in.
    pub parent_id: Option<ChannelId>,
    pub guild_id: GuildId,
    pub locked: bool,
}

/// Immutable snapshot of a guild member taken when an event arrives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActorSnapshot {
    pub id: UserId,
    pub name: String,
    pub bot: bool,
    pub permissions: Vec<Permission>,
    pub role_names: Vec<String>,
    pub role_ids: Vec<RoleId>,
}

impl ActorSnapshot {
    pub fn new(id: UserId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_permission(mut self, permission: Permission) -> Self {
        if !self.permissions.contains(&permission) {
            self.permissions.push(permission);
        }
        self
    }

    pub fn with_role(mut self, id: RoleId, name: impl Into<String>) -> Self {
        self.role_ids.push(id);
        self.role_names.push(name.into());
        self
    }

    /// Platform mention markup for this actor.
    pub fn mention(&self) -> String {
        format!("<@{}>", self.id)
    }
}

// ============================================================================
// Thread operations
// ============================================================================

/// Mutating thread operations, used to label errors and notices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadOp {
    Lock,
    Unlock,
    Delete,
}

impl ThreadOp {
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Lock => "lock",
            Self::Unlock => "unlock",
            Self::Delete => "delete",
        }
    }

    pub fn gerund(&self) -> &'static str {
        match self {
            Self::Lock => "locking",
            Self::Unlock => "unlocking",
            Self::Delete => "deleting",
        }
    }
}

// ============================================================================
// Outgoing messages
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Embed {
    pub title: String,
    pub description: Option<String>,
    pub color: u32,
    pub fields: Vec<EmbedField>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl Embed {
    pub fn new(title: impl Into<String>, color: u32) -> Self {
        Self {
            title: title.into(),
            description: None,
            color,
            fields: Vec::new(),
            timestamp: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push(EmbedField {
            name: name.into(),
            value: value.into(),
            inline,
        });
        self
    }

    pub fn timestamp(mut self, at: DateTime<Utc>) -> Self {
        self.timestamp = Some(at);
        self
    }
}

/// A message the core asks the gateway to post in a channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub content: Option<String>,
    pub embed: Option<Embed>,
    /// Delete the posted message after this delay (transient notice).
    pub delete_after: Option<Duration>,
    /// Attach Delete/Keep buttons bound to this thread's confirmation session.
    pub prompt_for: Option<ThreadId>,
}

impl OutgoingMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    pub fn embed(embed: Embed) -> Self {
        Self {
            embed: Some(embed),
            ..Self::default()
        }
    }

    pub fn delete_after(mut self, delay: Duration) -> Self {
        self.delete_after = Some(delay);
        self
    }

    pub fn with_prompt(mut self, thread: ThreadId) -> Self {
        self.prompt_for = Some(thread);
        self
    }
}

/// Reference to a message the gateway posted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageHandle {
    pub channel_id: ChannelId,
    pub message_id: MessageId,
}

// ============================================================================
// Inbound events
// ============================================================================

/// Opaque reference to a pending platform interaction, used for private replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InteractionRef {
    pub id: u64,
    pub actor: UserId,
}

/// The two actions offered by a confirmation prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonKind {
    Delete,
    Keep,
}

const CUSTOM_ID_PREFIX: &str = "threadlock";

impl ButtonKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Delete => "Delete",
            Self::Keep => "Keep",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Self::Delete => "🗑️",
            Self::Keep => "📌",
        }
    }

    /// Component id carried by the button: `threadlock:<action>:<thread id>`.
    pub fn custom_id(&self, thread: ThreadId) -> String {
        let action = match self {
            Self::Delete => "delete",
            Self::Keep => "keep",
        };
        format!("{CUSTOM_ID_PREFIX}:{action}:{thread}")
    }

    /// Parse a component id produced by [`ButtonKind::custom_id`].
    pub fn parse_custom_id(custom_id: &str) -> Option<(Self, ThreadId)> {
        let mut parts = custom_id.splitn(3, ':');
        if parts.next()? != CUSTOM_ID_PREFIX {
            return None;
        }
        let kind = match parts.next()? {
            "delete" => Self::Delete,
            "keep" => Self::Keep,
            _ => return None,
        };
        let thread = parts.next()?.parse().ok()?;
        Some((kind, thread))
    }
}

/// A message posted in a guild channel or thread.
#[derive(Debug, Clone)]
pub struct MessageCreated {
    pub author: ActorSnapshot,
    pub guild: GuildInfo,
    pub channel_id: ChannelId,
    /// Present when the message was posted inside a thread.
    pub thread: Option<ThreadInfo>,
    pub content: String,
}

/// A Delete/Keep button press on a confirmation prompt.
#[derive(Debug, Clone)]
pub struct ButtonPressed {
    pub actor: ActorSnapshot,
    pub guild: GuildInfo,
    /// Thread whose confirmation session the button belongs to.
    pub thread_id: ThreadId,
    /// Id of the prompt message carrying the pressed button.
    pub prompt_message_id: u64,
    pub button: ButtonKind,
    pub interaction: InteractionRef,
}
