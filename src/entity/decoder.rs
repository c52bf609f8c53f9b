//! Payload decoding boundary
//!
//! The cache never parses gateway JSON itself. It hands payload fragments to
//! an [`EntityDecoder`] supplied at construction time and stores whatever
//! typed entity comes back.

use chrono::{DateTime, FixedOffset};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use super::{
    Activity, Channel, ChannelKind, ClientStatus, CustomEmoji, DmChannel, Guild, GuildChannel,
    GroupDmChannel, Member, OnlineStatus, Presence, Role, User, VoiceState,
};
use crate::error::{CacheError, Result};

/// Turns raw payload fragments into typed entities.
///
/// Guild-scoped constructors take the guild ID separately because the
/// gateway omits it from objects nested inside a guild snapshot.
pub trait EntityDecoder: Send + Sync {
    fn create_user(&self, data: &Value) -> Result<User>;

    fn create_guild(&self, data: &Value) -> Result<Guild>;

    /// Any channel; guild channels must carry `guild_id`
    fn create_channel(&self, data: &Value) -> Result<Channel>;

    fn create_guild_channel(&self, guild_id: u64, data: &Value) -> Result<GuildChannel>;

    fn create_member(&self, guild_id: u64, data: &Value) -> Result<Member>;

    fn create_role(&self, guild_id: u64, data: &Value) -> Result<Role>;

    fn create_custom_emoji(&self, guild_id: u64, data: &Value) -> Result<CustomEmoji>;

    /// Voice state; `guild_id` is the fallback when the payload has none
    fn create_voice_state(&self, guild_id: Option<u64>, data: &Value) -> Result<VoiceState>;

    fn create_presence(&self, data: &Value) -> Result<Presence>;
}

/// Decoder for the gateway's JSON shapes, built on serde
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEntityDecoder;

impl JsonEntityDecoder {
    pub fn new() -> Self {
        Self
    }
}

fn decode<T: DeserializeOwned>(entity: &'static str, data: &Value) -> Result<T> {
    T::deserialize(data).map_err(|e| CacheError::decode(entity, e))
}

/// Wire shape shared by every channel type
#[derive(Deserialize)]
struct ChannelPayload {
    #[serde(deserialize_with = "crate::snowflake::deserialize")]
    id: u64,
    #[serde(rename = "type")]
    kind: u64,
    #[serde(default, deserialize_with = "crate::snowflake::deserialize_option")]
    guild_id: Option<u64>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    position: i32,
    #[serde(default, deserialize_with = "crate::snowflake::deserialize_option")]
    parent_id: Option<u64>,
    #[serde(default)]
    topic: Option<String>,
    #[serde(default)]
    nsfw: bool,
    #[serde(default)]
    recipients: Vec<UserRef>,
}

impl ChannelPayload {
    fn into_guild_channel(self, kind: ChannelKind, guild_id: u64) -> GuildChannel {
        GuildChannel {
            id: self.id,
            guild_id,
            kind,
            name: self.name.unwrap_or_default(),
            position: self.position,
            parent_id: self.parent_id,
            topic: self.topic,
            nsfw: self.nsfw,
        }
    }
}

/// Nested `{"id": ..}` user reference; other user fields are ignored
#[derive(Deserialize)]
struct UserRef {
    #[serde(deserialize_with = "crate::snowflake::deserialize")]
    id: u64,
}

#[derive(Deserialize)]
struct MemberPayload {
    user: UserRef,
    #[serde(default)]
    nick: Option<String>,
    #[serde(default, deserialize_with = "crate::snowflake::deserialize_vec")]
    roles: Vec<u64>,
    #[serde(default)]
    joined_at: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    deaf: bool,
    #[serde(default)]
    mute: bool,
}

#[derive(Deserialize)]
struct PresencePayload {
    user: UserRef,
    #[serde(default)]
    status: OnlineStatus,
    #[serde(default)]
    game: Option<Activity>,
    #[serde(default)]
    activities: Vec<Activity>,
    #[serde(default)]
    client_status: Option<ClientStatus>,
}

impl EntityDecoder for JsonEntityDecoder {
    fn create_user(&self, data: &Value) -> Result<User> {
        decode("user", data)
    }

    fn create_guild(&self, data: &Value) -> Result<Guild> {
        decode("guild", data)
    }

    fn create_channel(&self, data: &Value) -> Result<Channel> {
        let payload: ChannelPayload = decode("channel", data)?;
        let kind = ChannelKind::try_from(payload.kind)?;
        match kind {
            ChannelKind::Dm => {
                let recipient_id = payload
                    .recipients
                    .first()
                    .map(|r| r.id)
                    .ok_or_else(|| CacheError::missing("CHANNEL", "recipients"))?;
                Ok(Channel::Dm(DmChannel {
                    id: payload.id,
                    recipient_id,
                }))
            }
            ChannelKind::GroupDm => Ok(Channel::GroupDm(GroupDmChannel {
                id: payload.id,
                name: payload.name,
                recipient_ids: payload.recipients.iter().map(|r| r.id).collect(),
            })),
            kind => {
                let guild_id = payload
                    .guild_id
                    .ok_or_else(|| CacheError::missing("CHANNEL", "guild_id"))?;
                Ok(Channel::Guild(payload.into_guild_channel(kind, guild_id)))
            }
        }
    }

    fn create_guild_channel(&self, guild_id: u64, data: &Value) -> Result<GuildChannel> {
        let payload: ChannelPayload = decode("guild channel", data)?;
        let kind = ChannelKind::try_from(payload.kind)?;
        if !kind.is_guild() {
            return Err(CacheError::UnsupportedChannelType(payload.kind));
        }
        Ok(payload.into_guild_channel(kind, guild_id))
    }

    fn create_member(&self, guild_id: u64, data: &Value) -> Result<Member> {
        let payload: MemberPayload = decode("member", data)?;
        Ok(Member {
            guild_id,
            user_id: payload.user.id,
            nick: payload.nick,
            role_ids: payload.roles,
            joined_at: payload.joined_at,
            deaf: payload.deaf,
            mute: payload.mute,
        })
    }

    fn create_role(&self, guild_id: u64, data: &Value) -> Result<Role> {
        let mut role: Role = decode("role", data)?;
        role.guild_id = guild_id;
        Ok(role)
    }

    fn create_custom_emoji(&self, guild_id: u64, data: &Value) -> Result<CustomEmoji> {
        let mut emoji: CustomEmoji = decode("emoji", data)?;
        emoji.guild_id = guild_id;
        Ok(emoji)
    }

    fn create_voice_state(&self, guild_id: Option<u64>, data: &Value) -> Result<VoiceState> {
        let mut state: VoiceState = decode("voice state", data)?;
        state.guild_id = state.guild_id.or(guild_id);
        Ok(state)
    }

    fn create_presence(&self, data: &Value) -> Result<Presence> {
        let payload: PresencePayload = decode("presence", data)?;
        let activity = payload
            .game
            .or_else(|| payload.activities.into_iter().next());
        Ok(Presence {
            user_id: payload.user.id,
            status: payload.status,
            activity,
            client_status: payload.client_status.unwrap_or_default(),
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
