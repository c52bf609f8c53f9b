//! Gateway event types the cache reacts to

use std::fmt;
use std::str::FromStr;

/// Dispatch event types that mutate the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayEvent {
    Ready,
    UserUpdate,
    ChannelCreate,
    ChannelUpdate,
    ChannelDelete,
    GuildCreate,
    GuildUpdate,
    GuildDelete,
    GuildRoleCreate,
    GuildRoleUpdate,
    GuildRoleDelete,
    GuildMemberAdd,
    GuildMemberUpdate,
    GuildMemberRemove,
    GuildMembersChunk,
    GuildEmojisUpdate,
    PresenceUpdate,
    VoiceStateUpdate,
}

impl GatewayEvent {
    pub const ALL: [GatewayEvent; 18] = [
        GatewayEvent::Ready,
        GatewayEvent::UserUpdate,
        GatewayEvent::ChannelCreate,
        GatewayEvent::ChannelUpdate,
        GatewayEvent::ChannelDelete,
        GatewayEvent::GuildCreate,
        GatewayEvent::GuildUpdate,
        GatewayEvent::GuildDelete,
        GatewayEvent::GuildRoleCreate,
        GatewayEvent::GuildRoleUpdate,
        GatewayEvent::GuildRoleDelete,
        GatewayEvent::GuildMemberAdd,
        GatewayEvent::GuildMemberUpdate,
        GatewayEvent::GuildMemberRemove,
        GatewayEvent::GuildMembersChunk,
        GatewayEvent::GuildEmojisUpdate,
        GatewayEvent::PresenceUpdate,
        GatewayEvent::VoiceStateUpdate,
    ];

    /// Wire name of the event
    pub fn as_str(self) -> &'static str {
        match self {
            GatewayEvent::Ready => "READY",
            GatewayEvent::UserUpdate => "USER_UPDATE",
            GatewayEvent::ChannelCreate => "CHANNEL_CREATE",
            GatewayEvent::ChannelUpdate => "CHANNEL_UPDATE",
            GatewayEvent::ChannelDelete => "CHANNEL_DELETE",
            GatewayEvent::GuildCreate => "GUILD_CREATE",
            GatewayEvent::GuildUpdate => "GUILD_UPDATE",
            GatewayEvent::GuildDelete => "GUILD_DELETE",
            GatewayEvent::GuildRoleCreate => "GUILD_ROLE_CREATE",
            GatewayEvent::GuildRoleUpdate => "GUILD_ROLE_UPDATE",
            GatewayEvent::GuildRoleDelete => "GUILD_ROLE_DELETE",
            GatewayEvent::GuildMemberAdd => "GUILD_MEMBER_ADD",
            GatewayEvent::GuildMemberUpdate => "GUILD_MEMBER_UPDATE",
            GatewayEvent::GuildMemberRemove => "GUILD_MEMBER_REMOVE",
            GatewayEvent::GuildMembersChunk => "GUILD_MEMBERS_CHUNK",
            GatewayEvent::GuildEmojisUpdate => "GUILD_EMOJIS_UPDATE",
            GatewayEvent::PresenceUpdate => "PRESENCE_UPDATE",
            GatewayEvent::VoiceStateUpdate => "VOICE_STATE_UPDATE",
        }
    }
}

impl fmt::Display for GatewayEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event names the cache does not handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEvent(pub String);

impl FromStr for GatewayEvent {
    type Err = UnknownEvent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GatewayEvent::ALL
            .iter()
            .copied()
            .find(|event| event.as_str() == s)
            .ok_or_else(|| UnknownEvent(s.to_string()))
    }
}

// =============================================================================
// Tests
// =============================================================================
