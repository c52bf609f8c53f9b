//! Cached Entities
//!
//! Typed forms of the gateway objects the cache stores. Every entity is keyed
//! by a snowflake; guild-scoped entities also carry the guild they belong to.
//!
//! Entities are immutable once built and are shared as `Arc`s, so handing one
//! out of a view is a reference-count bump.

mod decoder;

pub use decoder::{EntityDecoder, JsonEntityDecoder};

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CacheError;

// =============================================================================
// Users
// =============================================================================

/// A user account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(deserialize_with = "crate::snowflake::deserialize")]
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub discriminator: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub bot: bool,
}

impl User {
    /// `username#discriminator`
    pub fn tag(&self) -> String {
        format!("{}#{}", self.username, self.discriminator)
    }
}

/// Online status of a user or of one of their clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnlineStatus {
    Online,
    Idle,
    Dnd,
    Invisible,
    #[default]
    #[serde(other)]
    Offline,
}

/// Activity kind, as numbered by the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum ActivityKind {
    Playing,
    Streaming,
    Listening,
    Watching,
    Other(u8),
}

impl From<u8> for ActivityKind {
    fn from(value: u8) -> Self {
        match value {
            0 => ActivityKind::Playing,
            1 => ActivityKind::Streaming,
            2 => ActivityKind::Listening,
            3 => ActivityKind::Watching,
            other => ActivityKind::Other(other),
        }
    }
}

impl From<ActivityKind> for u8 {
    fn from(kind: ActivityKind) -> Self {
        match kind {
            ActivityKind::Playing => 0,
            ActivityKind::Streaming => 1,
            ActivityKind::Listening => 2,
            ActivityKind::Watching => 3,
            ActivityKind::Other(other) => other,
        }
    }
}

/// What a user is doing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    #[serde(default)]
    pub url: Option<String>,
}

/// Per-client status breakdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClientStatus {
    #[serde(default)]
    pub desktop: Option<OnlineStatus>,
    #[serde(default)]
    pub mobile: Option<OnlineStatus>,
    #[serde(default)]
    pub web: Option<OnlineStatus>,
}

/// A user's presence, stored apart from the user itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Presence {
    pub user_id: u64,
    pub status: OnlineStatus,
    pub activity: Option<Activity>,
    pub client_status: ClientStatus,
}

// =============================================================================
// Guilds
// =============================================================================

/// Guild metadata. Roles, channels, members, emoji and voice states are
/// cached in their own per-guild partitions, not on the guild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guild {
    #[serde(deserialize_with = "crate::snowflake::deserialize")]
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default, deserialize_with = "crate::snowflake::deserialize_option")]
    pub owner_id: Option<u64>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default, deserialize_with = "crate::snowflake::deserialize_option")]
    pub afk_channel_id: Option<u64>,
    #[serde(default)]
    pub afk_timeout: u32,
    #[serde(default)]
    pub verification_level: u8,
    #[serde(default)]
    pub member_count: Option<u64>,
    #[serde(default)]
    pub large: bool,
    #[serde(default)]
    pub unavailable: bool,
}

/// A guild member. Keyed by user ID within its guild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Member {
    pub guild_id: u64,
    pub user_id: u64,
    pub nick: Option<String>,
    pub role_ids: Vec<u64>,
    pub joined_at: Option<DateTime<FixedOffset>>,
    pub deaf: bool,
    pub mute: bool,
}

/// A guild role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    #[serde(deserialize_with = "crate::snowflake::deserialize")]
    pub id: u64,
    #[serde(default)]
    pub guild_id: u64,
    pub name: String,
    #[serde(default)]
    pub color: u32,
    #[serde(default)]
    pub hoist: bool,
    #[serde(default)]
    pub position: i32,
    #[serde(default, deserialize_with = "permissions")]
    pub permissions: u64,
    #[serde(default)]
    pub managed: bool,
    #[serde(default)]
    pub mentionable: bool,
}

/// Permission bitsets arrive as numbers or, on newer gateways, as strings
fn permissions<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    crate::snowflake::deserialize(deserializer)
}

/// A custom guild emoji
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomEmoji {
    #[serde(deserialize_with = "crate::snowflake::deserialize")]
    pub id: u64,
    #[serde(default)]
    pub guild_id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "crate::snowflake::deserialize_vec")]
    pub roles: Vec<u64>,
    #[serde(default)]
    pub animated: bool,
    #[serde(default)]
    pub managed: bool,
    #[serde(default = "default_true")]
    pub require_colons: bool,
}

fn default_true() -> bool {
    true
}

/// A user's voice connection state within a guild
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceState {
    #[serde(default, deserialize_with = "crate::snowflake::deserialize_option")]
    pub guild_id: Option<u64>,
    #[serde(default, deserialize_with = "crate::snowflake::deserialize_option")]
    pub channel_id: Option<u64>,
    #[serde(deserialize_with = "crate::snowflake::deserialize")]
    pub user_id: u64,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub deaf: bool,
    #[serde(default)]
    pub mute: bool,
    #[serde(default)]
    pub self_deaf: bool,
    #[serde(default)]
    pub self_mute: bool,
    #[serde(default)]
    pub suppress: bool,
}

// =============================================================================
// Channels
// =============================================================================

/// Channel type, as numbered by the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ChannelKind {
    Text,
    Dm,
    Voice,
    GroupDm,
    Category,
    News,
    Store,
}

impl ChannelKind {
    /// Whether channels of this kind belong to a guild
    pub fn is_guild(self) -> bool {
        matches!(
            self,
            ChannelKind::Text
                | ChannelKind::Voice
                | ChannelKind::Category
                | ChannelKind::News
                | ChannelKind::Store
        )
    }
}

impl TryFrom<u64> for ChannelKind {
    type Error = CacheError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ChannelKind::Text),
            1 => Ok(ChannelKind::Dm),
            2 => Ok(ChannelKind::Voice),
            3 => Ok(ChannelKind::GroupDm),
            4 => Ok(ChannelKind::Category),
            5 => Ok(ChannelKind::News),
            6 => Ok(ChannelKind::Store),
            other => Err(CacheError::UnsupportedChannelType(other)),
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChannelKind::Text => "text",
            ChannelKind::Dm => "dm",
            ChannelKind::Voice => "voice",
            ChannelKind::GroupDm => "group_dm",
            ChannelKind::Category => "category",
            ChannelKind::News => "news",
            ChannelKind::Store => "store",
        };
        f.write_str(name)
    }
}

/// A channel inside a guild
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuildChannel {
    pub id: u64,
    pub guild_id: u64,
    pub kind: ChannelKind,
    pub name: String,
    pub position: i32,
    pub parent_id: Option<u64>,
    pub topic: Option<String>,
    pub nsfw: bool,
}

/// A one-to-one direct message channel. Cached under the recipient's user ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DmChannel {
    pub id: u64,
    pub recipient_id: u64,
}

/// A group direct message channel. Decoded but never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupDmChannel {
    pub id: u64,
    pub name: Option<String>,
    pub recipient_ids: Vec<u64>,
}

/// Any channel the gateway can describe
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Channel {
    Guild(GuildChannel),
    Dm(DmChannel),
    GroupDm(GroupDmChannel),
}

impl Channel {
    pub fn id(&self) -> u64 {
        match self {
            Channel::Guild(c) => c.id,
            Channel::Dm(c) => c.id,
            Channel::GroupDm(c) => c.id,
        }
    }

    pub fn kind(&self) -> ChannelKind {
        match self {
            Channel::Guild(c) => c.kind,
            Channel::Dm(_) => ChannelKind::Dm,
            Channel::GroupDm(_) => ChannelKind::GroupDm,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
