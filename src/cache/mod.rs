//! Entity Cache
//!
//! The read contract application code queries and the write contract the
//! gateway feeds.
//!
//! # Architecture
//!
//! ```text
//! gateway ──(event, shard, payload)──► EntityCacheWorker::update_cache
//!                                              │
//!                          ┌───────────────────┼────────────────────┐
//!                          ▼                   ▼                    ▼
//!                   guild partition     per-guild maps        per-shard stores
//!                   (one, global)       members, roles,       users, presences,
//!                                       channels, emoji,      DM channels
//!                                       voice states          (split | unified)
//!                          └───────────────────┼────────────────────┘
//!                                              ▼
//!                       EntityCache lookups and live views ──► callers
//! ```
//!
//! Lookups against a guild that has no partition return `None` or an empty
//! view, never an error. Only malformed ID strings at the query boundary are
//! errors.

mod events;
mod memory;
mod metrics;
mod noop;
mod partition;

pub use events::{GatewayEvent, UnknownEvent};
pub use memory::MemoryEntityCache;
pub use metrics::{CacheMetrics, MetricsSnapshot};
pub use noop::NoopEntityCache;
pub use partition::{PartitionMap, ShardStore};

use futures::future::{self, BoxFuture, Ready};
use serde_json::Value;
use std::sync::Arc;

use crate::entity::{
    CustomEmoji, DmChannel, Guild, GuildChannel, Member, Presence, Role, User, VoiceState,
};
use crate::error::Result;
use crate::snowflake::IntoSnowflake;
use crate::view::{NamedView, View};

/// Read side of the cache. All lookups are synchronous.
pub trait EntityCache: Send + Sync {
    fn guild(&self, id: u64) -> Option<Arc<Guild>>;

    fn guilds(&self) -> NamedView<Arc<Guild>>;

    fn user(&self, id: u64) -> Option<Arc<User>>;

    fn users(&self) -> NamedView<Arc<User>>;

    fn presence(&self, user_id: u64) -> Option<Arc<Presence>>;

    fn presences(&self) -> View<Arc<Presence>>;

    fn member(&self, guild_id: u64, user_id: u64) -> Option<Arc<Member>>;

    /// Members of one guild
    fn members(&self, guild_id: u64) -> NamedView<Arc<Member>>;

    /// Members across every guild
    fn all_members(&self) -> NamedView<Arc<Member>>;

    fn role(&self, guild_id: u64, id: u64) -> Option<Arc<Role>>;

    fn roles(&self, guild_id: u64) -> NamedView<Arc<Role>>;

    fn all_roles(&self) -> NamedView<Arc<Role>>;

    fn channel(&self, guild_id: u64, id: u64) -> Option<Arc<GuildChannel>>;

    fn channels(&self, guild_id: u64) -> NamedView<Arc<GuildChannel>>;

    fn all_channels(&self) -> NamedView<Arc<GuildChannel>>;

    /// DM channel with the given recipient
    fn dm_channel(&self, user_id: u64) -> Option<Arc<DmChannel>>;

    fn dm_channels(&self) -> View<Arc<DmChannel>>;

    fn emoji(&self, guild_id: u64, id: u64) -> Option<Arc<CustomEmoji>>;

    fn emojis(&self, guild_id: u64) -> NamedView<Arc<CustomEmoji>>;

    fn all_emojis(&self) -> NamedView<Arc<CustomEmoji>>;

    fn voice_state(&self, guild_id: u64, user_id: u64) -> Option<Arc<VoiceState>>;

    fn voice_states(&self, guild_id: u64) -> View<Arc<VoiceState>>;

    fn all_voice_states(&self) -> View<Arc<VoiceState>>;

    /// The logged-in user, once READY has been seen
    fn self_user(&self) -> Option<Arc<User>>;
}

/// Write side of the cache
pub trait EntityCacheWorker: EntityCache {
    /// Apply one gateway dispatch. The returned future resolves once the
    /// event's writes are committed; only GUILD_CREATE takes longer than the
    /// call itself.
    fn update_cache(
        &self,
        event_type: &str,
        shard_id: u32,
        payload: &Value,
    ) -> BoxFuture<'static, Result<()>>;

    fn bulk_cache_users(&self, shard_id: u32, users: Vec<User>);

    fn bulk_cache_channels(&self, shard_id: u32, channels: Vec<GuildChannel>);

    fn bulk_cache_roles(&self, shard_id: u32, roles: Vec<Role>);

    fn bulk_cache_members(&self, shard_id: u32, members: Vec<Member>);

    fn bulk_cache_emoji(&self, shard_id: u32, emoji: Vec<CustomEmoji>);

    fn bulk_cache_presences(&self, shard_id: u32, presences: Vec<Presence>);

    fn bulk_cache_voice_states(&self, shard_id: u32, voice_states: Vec<VoiceState>);

    /// Forget everything owned by `shard_id`
    fn invalidate_shard(&self, shard_id: u32);
}

/// Lookups by ID in either string or numeric form, plus already-completed
/// future forms of the point lookups.
pub trait EntityCacheExt: EntityCache {
    fn guild_by_id(&self, id: impl IntoSnowflake) -> Result<Option<Arc<Guild>>> {
        Ok(self.guild(id.into_snowflake()?))
    }

    fn user_by_id(&self, id: impl IntoSnowflake) -> Result<Option<Arc<User>>> {
        Ok(self.user(id.into_snowflake()?))
    }

    fn presence_by_id(&self, user_id: impl IntoSnowflake) -> Result<Option<Arc<Presence>>> {
        Ok(self.presence(user_id.into_snowflake()?))
    }

    fn member_by_id(
        &self,
        guild_id: impl IntoSnowflake,
        user_id: impl IntoSnowflake,
    ) -> Result<Option<Arc<Member>>> {
        Ok(self.member(guild_id.into_snowflake()?, user_id.into_snowflake()?))
    }

    fn members_of(&self, guild_id: impl IntoSnowflake) -> Result<NamedView<Arc<Member>>> {
        Ok(self.members(guild_id.into_snowflake()?))
    }

    fn role_by_id(
        &self,
        guild_id: impl IntoSnowflake,
        id: impl IntoSnowflake,
    ) -> Result<Option<Arc<Role>>> {
        Ok(self.role(guild_id.into_snowflake()?, id.into_snowflake()?))
    }

    fn roles_of(&self, guild_id: impl IntoSnowflake) -> Result<NamedView<Arc<Role>>> {
        Ok(self.roles(guild_id.into_snowflake()?))
    }

    fn channel_by_id(
        &self,
        guild_id: impl IntoSnowflake,
        id: impl IntoSnowflake,
    ) -> Result<Option<Arc<GuildChannel>>> {
        Ok(self.channel(guild_id.into_snowflake()?, id.into_snowflake()?))
    }

    fn channels_of(&self, guild_id: impl IntoSnowflake) -> Result<NamedView<Arc<GuildChannel>>> {
        Ok(self.channels(guild_id.into_snowflake()?))
    }

    fn dm_channel_by_id(&self, user_id: impl IntoSnowflake) -> Result<Option<Arc<DmChannel>>> {
        Ok(self.dm_channel(user_id.into_snowflake()?))
    }

    fn emoji_by_id(
        &self,
        guild_id: impl IntoSnowflake,
        id: impl IntoSnowflake,
    ) -> Result<Option<Arc<CustomEmoji>>> {
        Ok(self.emoji(guild_id.into_snowflake()?, id.into_snowflake()?))
    }

    fn emojis_of(&self, guild_id: impl IntoSnowflake) -> Result<NamedView<Arc<CustomEmoji>>> {
        Ok(self.emojis(guild_id.into_snowflake()?))
    }

    fn voice_state_by_id(
        &self,
        guild_id: impl IntoSnowflake,
        user_id: impl IntoSnowflake,
    ) -> Result<Option<Arc<VoiceState>>> {
        Ok(self.voice_state(guild_id.into_snowflake()?, user_id.into_snowflake()?))
    }

    fn voice_states_of(&self, guild_id: impl IntoSnowflake) -> Result<View<Arc<VoiceState>>> {
        Ok(self.voice_states(guild_id.into_snowflake()?))
    }

    // =========================================================================
    // Completed-future forms
    // =========================================================================

    fn guild_async(&self, id: u64) -> Ready<Option<Arc<Guild>>> {
        future::ready(self.guild(id))
    }

    fn user_async(&self, id: u64) -> Ready<Option<Arc<User>>> {
        future::ready(self.user(id))
    }

    fn presence_async(&self, user_id: u64) -> Ready<Option<Arc<Presence>>> {
        future::ready(self.presence(user_id))
    }

    fn member_async(&self, guild_id: u64, user_id: u64) -> Ready<Option<Arc<Member>>> {
        future::ready(self.member(guild_id, user_id))
    }

    fn role_async(&self, guild_id: u64, id: u64) -> Ready<Option<Arc<Role>>> {
        future::ready(self.role(guild_id, id))
    }

    fn channel_async(&self, guild_id: u64, id: u64) -> Ready<Option<Arc<GuildChannel>>> {
        future::ready(self.channel(guild_id, id))
    }

    fn dm_channel_async(&self, user_id: u64) -> Ready<Option<Arc<DmChannel>>> {
        future::ready(self.dm_channel(user_id))
    }

    fn emoji_async(&self, guild_id: u64, id: u64) -> Ready<Option<Arc<CustomEmoji>>> {
        future::ready(self.emoji(guild_id, id))
    }

    fn voice_state_async(&self, guild_id: u64, user_id: u64) -> Ready<Option<Arc<VoiceState>>> {
        future::ready(self.voice_state(guild_id, user_id))
    }

    fn self_user_async(&self) -> Ready<Option<Arc<User>>> {
        future::ready(self.self_user())
    }
}

impl<C: EntityCache + ?Sized> EntityCacheExt for C {}
