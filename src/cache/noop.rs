//! Cache that stores nothing
//!
//! Used when caching is disabled. Every lookup misses, every view is empty,
//! every write is dropped silently.

use futures::future::{self, BoxFuture, FutureExt};
use serde_json::Value;
use std::sync::Arc;

use super::{EntityCache, EntityCacheWorker};
use crate::entity::{
    CustomEmoji, DmChannel, Guild, GuildChannel, Member, Presence, Role, User, VoiceState,
};
use crate::error::Result;
use crate::view::{self, NamedView, View};

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEntityCache;

impl NoopEntityCache {
    pub fn new() -> Self {
        Self
    }
}

impl EntityCache for NoopEntityCache {
    fn guild(&self, _id: u64) -> Option<Arc<Guild>> {
        None
    }

    fn guilds(&self) -> NamedView<Arc<Guild>> {
        view::empty()
    }

    fn user(&self, _id: u64) -> Option<Arc<User>> {
        None
    }

    fn users(&self) -> NamedView<Arc<User>> {
        view::empty()
    }

    fn presence(&self, _user_id: u64) -> Option<Arc<Presence>> {
        None
    }

    fn presences(&self) -> View<Arc<Presence>> {
        view::empty_view()
    }

    fn member(&self, _guild_id: u64, _user_id: u64) -> Option<Arc<Member>> {
        None
    }

    fn members(&self, _guild_id: u64) -> NamedView<Arc<Member>> {
        view::empty()
    }

    fn all_members(&self) -> NamedView<Arc<Member>> {
        view::empty()
    }

    fn role(&self, _guild_id: u64, _id: u64) -> Option<Arc<Role>> {
        None
    }

    fn roles(&self, _guild_id: u64) -> NamedView<Arc<Role>> {
        view::empty()
    }

    fn all_roles(&self) -> NamedView<Arc<Role>> {
        view::empty()
    }

    fn channel(&self, _guild_id: u64, _id: u64) -> Option<Arc<GuildChannel>> {
        None
    }

    fn channels(&self, _guild_id: u64) -> NamedView<Arc<GuildChannel>> {
        view::empty()
    }

    fn all_channels(&self) -> NamedView<Arc<GuildChannel>> {
        view::empty()
    }

    fn dm_channel(&self, _user_id: u64) -> Option<Arc<DmChannel>> {
        None
    }

    fn dm_channels(&self) -> View<Arc<DmChannel>> {
        view::empty_view()
    }

    fn emoji(&self, _guild_id: u64, _id: u64) -> Option<Arc<CustomEmoji>> {
        None
    }

    fn emojis(&self, _guild_id: u64) -> NamedView<Arc<CustomEmoji>> {
        view::empty()
    }

    fn all_emojis(&self) -> NamedView<Arc<CustomEmoji>> {
        view::empty()
    }

    fn voice_state(&self, _guild_id: u64, _user_id: u64) -> Option<Arc<VoiceState>> {
        None
    }

    fn voice_states(&self, _guild_id: u64) -> View<Arc<VoiceState>> {
        view::empty_view()
    }

    fn all_voice_states(&self) -> View<Arc<VoiceState>> {
        view::empty_view()
    }

    fn self_user(&self) -> Option<Arc<User>> {
        None
    }
}

impl EntityCacheWorker for NoopEntityCache {
    fn update_cache(
        &self,
        _event_type: &str,
        _shard_id: u32,
        _payload: &Value,
    ) -> BoxFuture<'static, Result<()>> {
        future::ready(Ok(())).boxed()
    }

    fn bulk_cache_users(&self, _shard_id: u32, _users: Vec<User>) {}

    fn bulk_cache_channels(&self, _shard_id: u32, _channels: Vec<GuildChannel>) {}

    fn bulk_cache_roles(&self, _shard_id: u32, _roles: Vec<Role>) {}

    fn bulk_cache_members(&self, _shard_id: u32, _members: Vec<Member>) {}

    fn bulk_cache_emoji(&self, _shard_id: u32, _emoji: Vec<CustomEmoji>) {}

    fn bulk_cache_presences(&self, _shard_id: u32, _presences: Vec<Presence>) {}

    fn bulk_cache_voice_states(&self, _shard_id: u32, _voice_states: Vec<VoiceState>) {}

    fn invalidate_shard(&self, _shard_id: u32) {}
}

// =============================================================================
// Tests
// =============================================================================
