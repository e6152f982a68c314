//! Authorization for thread moderation.
//!
//! Decides who may lock a thread, who may delete one another moderator
//! locked, and audits the bot's own permissions in a guild.

use crate::gateway::{ActorSnapshot, GuildId, GuildInfo, Permission, RoleId, UserId};
use crate::state::GuildConfigStore;
use std::sync::Arc;
use tracing::{debug, warn};

/// Narrow view of a platform identity.
///
/// Implemented by [`ActorSnapshot`]; the resolver never sees the platform's
/// own member objects.
pub trait Capabilities {
    fn user_id(&self) -> UserId;
    fn display_name(&self) -> &str;
    fn has_permission(&self, permission: Permission) -> bool;
    fn role_names(&self) -> &[String];
    fn role_ids(&self) -> &[RoleId];

    fn has_administrator(&self) -> bool {
        self.has_permission(Permission::Administrator)
    }

    fn has_manage_threads(&self) -> bool {
        self.has_permission(Permission::ManageThreads)
    }
}

impl Capabilities for ActorSnapshot {
    fn user_id(&self) -> UserId {
        self.id
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn has_permission(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }

    fn role_names(&self) -> &[String] {
        &self.role_names
    }

    fn role_ids(&self) -> &[RoleId] {
        &self.role_ids
    }
}

/// Why an actor may lock threads, in precedence order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockGrant {
    Administrator,
    ManageThreads,
    RoleName(String),
    RoleId(RoleId),
}

/// Result of the bot permission preflight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotCapabilityReport {
    pub all_granted: bool,
    pub granted: Vec<Permission>,
    pub missing: Vec<Permission>,
}

/// Resolves lock and delete permissions against the guild configuration.
pub struct AuthorizationResolver {
    config: Arc<GuildConfigStore>,
}

impl AuthorizationResolver {
    pub fn new(config: Arc<GuildConfigStore>) -> Self {
        Self { config }
    }

    /// First grant that lets `actor` lock threads in `guild`, if any.
    ///
    /// Checked in order: administrator, manage-threads, authorized role name,
    /// authorized role id.
    pub fn lock_grant(&self, actor: &impl Capabilities, guild: GuildId) -> Option<LockGrant> {
        if actor.has_administrator() {
            return Some(LockGrant::Administrator);
        }
        if actor.has_manage_threads() {
            return Some(LockGrant::ManageThreads);
        }

        let held = actor.role_names();
        if let Some(name) = self
            .config
            .authorized_roles(Some(guild))
            .into_iter()
            .find(|role| held.contains(role))
        {
            debug!(user = %actor.display_name(), role = %name, "User has authorized role");
            return Some(LockGrant::RoleName(name));
        }

        let held_ids = actor.role_ids();
        if let Some(id) = self
            .config
            .authorized_role_ids(guild)
            .into_iter()
            .find(|id| held_ids.contains(id))
        {
            debug!(user = %actor.display_name(), role_id = id, "User has authorized role ID");
            return Some(LockGrant::RoleId(id));
        }

        debug!(user = %actor.display_name(), guild = guild, "User does not have lock permissions");
        None
    }

    pub fn can_lock(&self, actor: &impl Capabilities, guild: GuildId) -> bool {
        self.lock_grant(actor, guild).is_some()
    }

    /// The original locker, administrators and manage-threads holders may
    /// delete. Other authorized lockers may not.
    pub fn can_delete(&self, actor: &impl Capabilities, original_locker: UserId) -> bool {
        if actor.user_id() == original_locker
            || actor.has_administrator()
            || actor.has_manage_threads()
        {
            return true;
        }
        debug!(
            user = %actor.display_name(),
            locker = original_locker,
            "User may not delete a thread locked by someone else"
        );
        false
    }

    /// Report which of the permissions the bot needs it actually holds.
    ///
    /// Never blocks anything; missing permissions are logged as a warning.
    pub fn check_bot_capabilities(
        &self,
        guild: &GuildInfo,
        bot: &impl Capabilities,
    ) -> BotCapabilityReport {
        let (granted, missing): (Vec<_>, Vec<_>) = Permission::BOT_REQUIRED
            .into_iter()
            .partition(|p| bot.has_permission(*p));

        if !missing.is_empty() {
            let names: Vec<&str> = missing.iter().map(Permission::as_str).collect();
            warn!(guild = %guild.name, missing = ?names, "Bot missing permissions");
        }

        BotCapabilityReport {
            all_granted: missing.is_empty(),
            granted,
            missing,
        }
    }
}
