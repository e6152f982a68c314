//! Serenity event handler.
//!
//! Turns gateway events into platform-neutral snapshots for the moderation
//! core, and dispatches the `unlock` / `lockconfig` prefix commands.

use crate::gateway::discord::{DiscordGateway, permissions_from, thread_info};
use crate::gateway::{
    ActorSnapshot, ButtonKind, ButtonPressed, Gateway, GuildInfo, MessageCreated, OutgoingMessage,
};
use crate::moderation::{LockConfigCommand, Moderator};
use crate::security::Capabilities;
use crate::telemetry::spans;
use serenity::all::{
    ActivityData, Context, EventHandler, Guild, GuildId, Interaction, Member, Message,
    Permissions, Ready, User,
};
use serenity::async_trait;
use std::sync::Arc;
use tracing::{Instrument, debug, info, warn};

const NO_PERMISSION: &str = "❌ You don't have permission to use this command.";
const THREADS_ONLY: &str = "❌ This command can only be used in threads.";

pub struct Handler {
    moderator: Arc<Moderator>,
    gateway: Arc<DiscordGateway>,
    prefix: String,
    status_text: String,
}

impl Handler {
    pub fn new(
        moderator: Arc<Moderator>,
        gateway: Arc<DiscordGateway>,
        prefix: impl Into<String>,
        status_text: impl Into<String>,
    ) -> Self {
        Self {
            moderator,
            gateway,
            prefix: prefix.into(),
            status_text: status_text.into(),
        }
    }

    /// Snapshot the author, guild and thread of a guild message.
    async fn message_event(
        &self,
        ctx: &Context,
        msg: &Message,
        guild_id: GuildId,
    ) -> Option<MessageCreated> {
        let member = match guild_id.member(ctx, msg.author.id).await {
            Ok(member) => member,
            Err(e) => {
                warn!(user = %msg.author.name, error = %e, "Could not resolve message author");
                return None;
            }
        };
        let (author, guild) = member_snapshot(ctx, guild_id, &member, None);

        let thread = match msg.channel(ctx).await {
            Ok(channel) => channel.guild().as_ref().and_then(thread_info),
            Err(e) => {
                warn!(channel = %msg.channel_id, error = %e, "Could not resolve channel");
                None
            }
        };

        Some(MessageCreated {
            author,
            guild,
            channel_id: msg.channel_id.get(),
            thread,
            content: msg.content.clone(),
        })
    }

    async fn dispatch_command(&self, ctx: &Context, msg: &Message, guild_id: GuildId, body: &str) {
        let (name, args) = body.split_once(char::is_whitespace).unwrap_or((body, ""));
        let name = name.to_lowercase();
        if name != "unlock" && name != "lockconfig" {
            return;
        }
        let Some(event) = self.message_event(ctx, msg, guild_id).await else {
            return;
        };

        let span = spans::command(&name, &event.author.name);
        self.run_command(&name, args, &event).instrument(span).await;
    }

    async fn run_command(&self, name: &str, args: &str, event: &MessageCreated) {
        let channel = event.channel_id;
        let actor = &event.author;

        match name {
            "unlock" => {
                if !actor.has_manage_threads() && !actor.has_administrator() {
                    self.reply(channel, NO_PERMISSION).await;
                    return;
                }
                let Some(thread) = &event.thread else {
                    self.reply(channel, THREADS_ONLY).await;
                    return;
                };
                if let Err(e) = self.moderator.unlock(channel, thread, &event.guild, actor).await {
                    debug!(error = %e, "Unlock command did not complete");
                }
            }
            "lockconfig" => {
                if !actor.has_administrator() {
                    self.reply(channel, NO_PERMISSION).await;
                    return;
                }
                let command = LockConfigCommand::parse(args);
                if let Err(e) = self
                    .moderator
                    .lock_config(channel, &event.guild, &self.prefix, command)
                    .await
                {
                    debug!(error = %e, "Lockconfig command did not complete");
                }
            }
            _ => {}
        }
    }

    async fn reply(&self, channel: u64, text: &str) {
        if let Err(e) = self.gateway.send_message(channel, OutgoingMessage::text(text)).await {
            warn!(channel = channel, error = %e, "Failed to send reply");
        }
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!(user = %ready.user.name, guilds = ready.guilds.len(), "Connected to Discord");
        ctx.set_activity(Some(ActivityData::watching(self.status_text.clone())));
    }

    /// Check the bot's own permissions whenever a guild becomes available.
    async fn guild_create(&self, ctx: Context, guild: Guild, _is_new: Option<bool>) {
        let bot_id = ctx.cache.current_user().id;
        let Some(member) = guild.members.get(&bot_id) else {
            debug!(guild = %guild.name, "Bot member not cached; skipping permission check");
            return;
        };

        let mut bot = ActorSnapshot::new(bot_id.get(), member.display_name());
        bot.bot = true;
        for permission in permissions_from(guild.member_permissions(member)) {
            bot = bot.with_permission(permission);
        }
        let info = GuildInfo {
            id: guild.id.get(),
            name: guild.name.clone(),
        };

        let report = self.moderator.resolver().check_bot_capabilities(&info, &bot);
        if report.all_granted {
            info!(guild = %info.name, granted = report.granted.len(), "Bot has all required permissions");
        }
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }
        let Some(guild_id) = msg.guild_id else {
            return;
        };

        let content = msg.content.trim();
        if let Some(body) = content.strip_prefix(self.prefix.as_str()) {
            self.dispatch_command(&ctx, &msg, guild_id, body).await;
            return;
        }
        if !self.moderator.is_trigger(content) {
            return;
        }

        if let Some(event) = self.message_event(&ctx, &msg, guild_id).await {
            let outcome = self.moderator.handle_message(&event).await;
            debug!(?outcome, "Lock request handled");
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        let Interaction::Component(component) = interaction else {
            return;
        };
        let Some((button, thread_id)) = ButtonKind::parse_custom_id(&component.data.custom_id)
        else {
            return;
        };
        let Some(guild_id) = component.guild_id else {
            return;
        };

        let (actor, guild) = match &component.member {
            Some(member) => member_snapshot(&ctx, guild_id, member, member.permissions),
            None => (
                user_actor(&component.user),
                GuildInfo {
                    id: guild_id.get(),
                    name: guild_id.to_string(),
                },
            ),
        };

        let prompt_message_id = component.message.id.get();
        let interaction = self.gateway.track_interaction(component);
        let event = ButtonPressed {
            actor,
            guild,
            thread_id,
            prompt_message_id,
            button,
            interaction,
        };
        let outcome = self.moderator.handle_button(&event).await;
        debug!(?outcome, "Button press handled");
        self.gateway.forget_interaction(&interaction);
    }
}

/// Actors are named by their account username, which nicknames do not change.
fn user_actor(user: &User) -> ActorSnapshot {
    let mut actor = ActorSnapshot::new(user.id.get(), user.name.clone());
    actor.bot = user.bot;
    actor
}

/// Build the actor and guild snapshots from the cache.
///
/// Interaction members carry resolved permissions; message authors need them
/// computed from the cached guild.
fn member_snapshot(
    ctx: &Context,
    guild_id: GuildId,
    member: &Member,
    resolved: Option<Permissions>,
) -> (ActorSnapshot, GuildInfo) {
    let mut actor = user_actor(&member.user);

    let (permissions, guild_name) = match ctx.cache.guild(guild_id) {
        Some(guild) => {
            for role_id in &member.roles {
                if let Some(role) = guild.roles.get(role_id) {
                    actor = actor.with_role(role_id.get(), role.name.clone());
                }
            }
            let permissions = resolved.unwrap_or_else(|| guild.member_permissions(member));
            (permissions, guild.name.clone())
        }
        None => {
            actor.role_ids = member.roles.iter().map(|r| r.get()).collect();
            (resolved.unwrap_or_else(Permissions::empty), guild_id.to_string())
        }
    };

    for permission in permissions_from(permissions) {
        actor = actor.with_permission(permission);
    }
    (
        actor,
        GuildInfo {
            id: guild_id.get(),
            name: guild_name,
        },
    )
}
