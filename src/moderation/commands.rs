//! Prefix commands: `unlock` and `lockconfig`.
//!
//! Permission gating happens in the dispatcher, which knows the invoking
//! member's platform permissions; these handlers assume the caller is allowed.

use super::Moderator;
use crate::audit::{LockAction, LockEventRecord};
use crate::error::ModerationError;
use crate::gateway::{ActorSnapshot, ChannelId, Embed, GuildInfo, OutgoingMessage, ThreadInfo, ThreadOp};
use crate::metrics;
use crate::state::StoreError;
use chrono::Utc;
use tracing::{error, info, warn};

const UNLOCK_COLOR: u32 = 0x00FF00;
const CONFIG_COLOR: u32 = 0x3498DB;

/// Parsed `lockconfig` arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockConfigCommand {
    Show,
    Add(String),
    Remove(String),
    List,
    Invalid,
}

impl LockConfigCommand {
    /// Parse everything after the command name. Role names may contain spaces.
    pub fn parse(args: &str) -> Self {
        let args = args.trim();
        if args.is_empty() {
            return Self::Show;
        }
        let (action, rest) = match args.split_once(char::is_whitespace) {
            Some((action, rest)) => (action, rest.trim()),
            None => (args, ""),
        };
        match (action.to_lowercase().as_str(), rest) {
            ("add", role) if !role.is_empty() => Self::Add(role.to_string()),
            ("remove", role) if !role.is_empty() => Self::Remove(role.to_string()),
            ("list", _) => Self::List,
            _ => Self::Invalid,
        }
    }
}

fn bullet_list(roles: &[String]) -> Option<String> {
    if roles.is_empty() {
        return None;
    }
    Some(
        roles
            .iter()
            .map(|r| format!("• {r}"))
            .collect::<Vec<_>>()
            .join("\n"),
    )
}

impl Moderator {
    /// Unlock `thread` and announce it in `channel`.
    pub async fn unlock(
        &self,
        channel: ChannelId,
        thread: &ThreadInfo,
        guild: &GuildInfo,
        actor: &ActorSnapshot,
    ) -> Result<(), ModerationError> {
        if !thread.locked {
            let err = ModerationError::AlreadyInState("unlocked");
            self.reply(channel, OutgoingMessage::text(err.user_notice()))
                .await;
            return Err(err);
        }

        if let Err(e) = self.gateway.unlock_thread(thread.id).await {
            let err = ModerationError::from_gateway(ThreadOp::Unlock, e);
            metrics::record_gateway_error("unlock", err.error_code());
            if err.is_benign() {
                warn!(thread = %thread.name, "Thread vanished before it could be unlocked");
            } else {
                error!(thread = %thread.name, error = %err, "Error unlocking thread");
            }
            self.reply(channel, OutgoingMessage::text(err.user_notice()))
                .await;
            return Err(err);
        }

        self.audit.record(LockEventRecord::new(
            LockAction::Unlock,
            &thread.name,
            &actor.name,
            &guild.name,
        ));

        let embed = Embed::new("🔓 Thread Unlocked", UNLOCK_COLOR)
            .description(format!("This thread has been unlocked by {}", actor.mention()))
            .timestamp(Utc::now());
        self.reply(channel, OutgoingMessage::embed(embed)).await;

        info!(thread = %thread.name, moderator = %actor.name, guild = %guild.name, "Thread unlocked");
        Ok(())
    }

    /// Show or edit the authorized role list for `guild`.
    pub async fn lock_config(
        &self,
        channel: ChannelId,
        guild: &GuildInfo,
        prefix: &str,
        command: LockConfigCommand,
    ) -> Result<(), StoreError> {
        let scope = Some(guild.id);
        let message = match command {
            LockConfigCommand::Show => {
                let roles = self.guild_config.authorized_roles(scope);
                let usage = format!(
                    "```\n{prefix}lockconfig add <role_name>\n{prefix}lockconfig remove <role_name>\n{prefix}lockconfig list\n```"
                );
                OutgoingMessage::embed(
                    Embed::new("🔧 Thread Lock Configuration", CONFIG_COLOR)
                        .field(
                            "Authorized Roles",
                            bullet_list(&roles).unwrap_or_else(|| "None".to_string()),
                            false,
                        )
                        .field("Commands", usage, false),
                )
            }
            LockConfigCommand::List => {
                let roles = self.guild_config.authorized_roles(scope);
                OutgoingMessage::embed(
                    Embed::new("📋 Authorized Roles", CONFIG_COLOR).description(
                        bullet_list(&roles)
                            .unwrap_or_else(|| "No authorized roles configured.".to_string()),
                    ),
                )
            }
            LockConfigCommand::Add(role) => {
                match self.guild_config.add_authorized_role(&role, scope) {
                    Ok(true) => {
                        info!(role = %role, guild = %guild.name, "Authorized role added");
                        OutgoingMessage::text(format!("✅ Added '{role}' to authorized roles."))
                    }
                    Ok(false) => OutgoingMessage::text(format!(
                        "❌ '{role}' is already in authorized roles."
                    )),
                    Err(e) => return self.config_save_failed(channel, e).await,
                }
            }
            LockConfigCommand::Remove(role) => {
                match self.guild_config.remove_authorized_role(&role, scope) {
                    Ok(true) => {
                        info!(role = %role, guild = %guild.name, "Authorized role removed");
                        OutgoingMessage::text(format!(
                            "✅ Removed '{role}' from authorized roles."
                        ))
                    }
                    Ok(false) => OutgoingMessage::text(format!(
                        "❌ '{role}' not found in authorized roles."
                    )),
                    Err(e) => return self.config_save_failed(channel, e).await,
                }
            }
            LockConfigCommand::Invalid => OutgoingMessage::text(format!(
                "❌ Invalid usage. Use `{prefix}lockconfig` to see available commands."
            )),
        };

        self.reply(channel, message).await;
        Ok(())
    }

    async fn config_save_failed(&self, channel: ChannelId, err: StoreError) -> Result<(), StoreError> {
        error!(error = %err, "Failed to save guild configuration");
        self.reply(
            channel,
            OutgoingMessage::text("❌ Failed to save the configuration. The change was not applied."),
        )
        .await;
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use crate::gateway::memory::FailPoint;
    use crate::moderation::testing::*;

    #[test]
    fn test_parse_lockconfig() {
        assert_eq!(LockConfigCommand::parse(""), LockConfigCommand::Show);
        assert_eq!(LockConfigCommand::parse("  list "), LockConfigCommand::List);
        assert_eq!(
            LockConfigCommand::parse("ADD  Senior Helper "),
            LockConfigCommand::Add("Senior Helper".into())
        );
        assert_eq!(
            LockConfigCommand::parse("remove Staff"),
            LockConfigCommand::Remove("Staff".into())
        );
        assert_eq!(LockConfigCommand::parse("add"), LockConfigCommand::Invalid);
        assert_eq!(LockConfigCommand::parse("purge"), LockConfigCommand::Invalid);
    }

    #[tokio::test]
    async fn test_unlock_locked_thread() {
        let mut locked = thread(PARENT);
        locked.locked = true;
        let f = fixture(locked.clone());

        f.moderator
            .unlock(THREAD, &locked, &guild(), &admin_actor())
            .await
            .unwrap();

        assert!(!f.gateway.thread(THREAD).unwrap().locked);
        let lines = f.audit_lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with("[UNLOCK] Thread 'help wanted' by carol in Test Guild"));

        let embed = f.gateway.sent_messages().pop().unwrap().embed.unwrap();
        assert_eq!(embed.title, "🔓 Thread Unlocked");
        assert_eq!(
            embed.description.as_deref(),
            Some("This thread has been unlocked by <@3>")
        );
        assert_eq!(embed.color, UNLOCK_COLOR);
    }

    #[tokio::test]
    async fn test_unlock_unlocked_thread_is_noop() {
        let f = fixture(thread(PARENT));
        let err = f
            .moderator
            .unlock(THREAD, &thread(PARENT), &guild(), &admin_actor())
            .await
            .unwrap_err();

        assert_eq!(err, ModerationError::AlreadyInState("unlocked"));
        assert!(f.audit_lines().is_empty());
        assert_eq!(f.gateway.sent_texts(), vec!["🔓 This thread is not locked."]);
    }

    #[tokio::test]
    async fn test_unlock_forbidden_writes_no_entry() {
        let mut locked = thread(PARENT);
        locked.locked = true;
        let f = fixture(locked.clone());
        f.gateway.fail_on(FailPoint::Unlock, GatewayError::Forbidden);

        let err = f
            .moderator
            .unlock(THREAD, &locked, &guild(), &admin_actor())
            .await
            .unwrap_err();

        assert_eq!(err, ModerationError::GatewayForbidden(ThreadOp::Unlock));
        assert!(f.audit_lines().is_empty());
        assert_eq!(
            f.gateway.sent_texts(),
            vec!["❌ I don't have permission to unlock this thread."]
        );
    }

    #[tokio::test]
    async fn test_lockconfig_add_remove_list() {
        let f = fixture(thread(PARENT));
        let m = &f.moderator;

        m.lock_config(PARENT, &guild(), "!", LockConfigCommand::Add("Helper".into()))
            .await
            .unwrap();
        m.lock_config(PARENT, &guild(), "!", LockConfigCommand::Add("Helper".into()))
            .await
            .unwrap();
        m.lock_config(PARENT, &guild(), "!", LockConfigCommand::Remove("Ghost".into()))
            .await
            .unwrap();
        m.lock_config(PARENT, &guild(), "!", LockConfigCommand::Invalid)
            .await
            .unwrap();

        assert_eq!(
            f.gateway.sent_texts(),
            vec![
                "✅ Added 'Helper' to authorized roles.",
                "❌ 'Helper' is already in authorized roles.",
                "❌ 'Ghost' not found in authorized roles.",
                "❌ Invalid usage. Use `!lockconfig` to see available commands.",
            ]
        );

        // A member holding the new role can now lock in this guild.
        let helper = ActorSnapshot::new(8, "erin").with_role(12, "Helper");
        assert!(m.resolver().can_lock(&helper, GUILD));

        m.lock_config(PARENT, &guild(), "!", LockConfigCommand::List)
            .await
            .unwrap();
        let embed = f.gateway.sent_messages().pop().unwrap().embed.unwrap();
        assert_eq!(embed.title, "📋 Authorized Roles");
        assert_eq!(
            embed.description.as_deref(),
            Some("• Moderator\n• Admin\n• Staff\n• Helper")
        );
    }

    #[tokio::test]
    async fn test_lockconfig_show_uses_prefix() {
        let f = fixture(thread(PARENT));
        f.moderator
            .lock_config(PARENT, &guild(), "?", LockConfigCommand::Show)
            .await
            .unwrap();

        let embed = f.gateway.sent_messages().pop().unwrap().embed.unwrap();
        assert_eq!(embed.title, "🔧 Thread Lock Configuration");
        assert_eq!(embed.fields[0].value, "• Moderator\n• Admin\n• Staff");
        assert!(embed.fields[1].value.contains("?lockconfig add <role_name>"));
    }
}
