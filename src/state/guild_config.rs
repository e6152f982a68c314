//! Authorized roles and auto-delete channels.
//!
//! Persisted as JSON so existing `config.json` files keep working. Keys this
//! store does not understand are carried through untouched on save.

use crate::gateway::{ChannelId, GuildId, RoleId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info, warn};

/// Errors persisting the role store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to write guild config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode guild config: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Per-guild section of the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildSection {
    #[serde(default)]
    pub authorized_roles: Vec<String>,
}

/// On-disk layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuildConfigData {
    /// Global role names, used by guilds without their own section.
    #[serde(default = "default_authorized_roles")]
    pub authorized_roles: Vec<String>,
    #[serde(default)]
    pub guild_specific: BTreeMap<String, GuildSection>,
    /// Role ids per guild id.
    #[serde(default)]
    pub authorized_role_ids: BTreeMap<String, Vec<RoleId>>,
    #[serde(default)]
    pub auto_delete_channels: Vec<ChannelId>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_authorized_roles() -> Vec<String> {
    ["Moderator", "Admin", "Staff"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for GuildConfigData {
    fn default() -> Self {
        Self {
            authorized_roles: default_authorized_roles(),
            guild_specific: BTreeMap::new(),
            authorized_role_ids: BTreeMap::new(),
            auto_delete_channels: Vec::new(),
            extra: serde_json::Map::new(),
        }
    }
}

impl GuildConfigData {
    /// Role list edited for `guild`. The first guild-specific edit seeds the
    /// guild's list from the global one, so adding a role never drops the
    /// defaults the guild relied on.
    fn roles_mut(&mut self, guild: Option<GuildId>) -> &mut Vec<String> {
        match guild {
            Some(id) => {
                let global = &self.authorized_roles;
                &mut self
                    .guild_specific
                    .entry(id.to_string())
                    .or_insert_with(|| GuildSection {
                        authorized_roles: global.clone(),
                    })
                    .authorized_roles
            }
            None => &mut self.authorized_roles,
        }
    }
}

/// Read-mostly store of who may lock and where threads are auto-deleted.
///
/// Reads take a shared lock for the duration of a copy. Writes are rare and
/// persist the whole file while holding the write lock, which serializes them.
pub struct GuildConfigStore {
    path: Option<PathBuf>,
    data: RwLock<GuildConfigData>,
}

impl GuildConfigStore {
    /// Load from `path`, falling back to defaults when the file is missing or
    /// unreadable. The path is kept so later edits are saved back to it.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let data = match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<GuildConfigData>(&content) {
                Ok(data) => {
                    info!(path = %path.display(), "Guild configuration loaded");
                    data
                }
                Err(e) => {
                    error!(path = %path.display(), error = %e, "Failed to parse guild configuration, using defaults");
                    GuildConfigData::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "Guild configuration not found, using defaults");
                GuildConfigData::default()
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to read guild configuration, using defaults");
                GuildConfigData::default()
            }
        };

        Self {
            path: Some(path.to_path_buf()),
            data: RwLock::new(data),
        }
    }

    /// A store that is never written to disk.
    pub fn in_memory(data: GuildConfigData) -> Self {
        Self {
            path: None,
            data: RwLock::new(data),
        }
    }

    /// Authorized role names for a guild, or the global list when the guild
    /// has no section of its own.
    pub fn authorized_roles(&self, guild: Option<GuildId>) -> Vec<String> {
        let data = self.data.read();
        guild
            .and_then(|id| data.guild_specific.get(&id.to_string()))
            .map(|section| section.authorized_roles.clone())
            .unwrap_or_else(|| data.authorized_roles.clone())
    }

    pub fn authorized_role_ids(&self, guild: GuildId) -> Vec<RoleId> {
        self.data
            .read()
            .authorized_role_ids
            .get(&guild.to_string())
            .cloned()
            .unwrap_or_default()
    }

    pub fn auto_delete_channels(&self) -> Vec<ChannelId> {
        self.data.read().auto_delete_channels.clone()
    }

    pub fn is_auto_delete_channel(&self, channel: ChannelId) -> bool {
        self.data.read().auto_delete_channels.contains(&channel)
    }

    /// Add a role name. Returns `Ok(false)` if it was already present.
    pub fn add_authorized_role(
        &self,
        role_name: &str,
        guild: Option<GuildId>,
    ) -> Result<bool, StoreError> {
        self.update(|data| {
            let roles = data.roles_mut(guild);
            if roles.iter().any(|r| r == role_name) {
                return false;
            }
            roles.push(role_name.to_string());
            true
        })
    }

    /// Remove a role name. Returns `Ok(false)` if it was not present.
    pub fn remove_authorized_role(
        &self,
        role_name: &str,
        guild: Option<GuildId>,
    ) -> Result<bool, StoreError> {
        self.update(|data| {
            let roles = data.roles_mut(guild);
            match roles.iter().position(|r| r == role_name) {
                Some(index) => {
                    roles.remove(index);
                    true
                }
                None => false,
            }
        })
    }

    /// Apply `edit` to a copy, persist it, then publish it. Nothing changes in
    /// memory if the edit was a no-op or the save failed.
    fn update(&self, edit: impl FnOnce(&mut GuildConfigData) -> bool) -> Result<bool, StoreError> {
        let mut data = self.data.write();
        let mut next = data.clone();
        if !edit(&mut next) {
            return Ok(false);
        }
        if let Some(path) = &self.path {
            save(path, &next)?;
            info!(path = %path.display(), "Guild configuration saved");
        }
        *data = next;
        Ok(true)
    }
}

fn save(path: &Path, data: &GuildConfigData) -> Result<(), StoreError> {
    let encoded = serde_json::to_string_pretty(data)?;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, encoded)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
