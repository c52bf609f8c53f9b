//! In-Memory Entity Cache
//!
//! The default [`EntityCacheWorker`]. Guild metadata lives in one global
//! partition; members, roles, channels, emoji and voice states get one
//! partition per guild; users, presences and DM channels are stored per shard
//! or in one shared partition depending on
//! [`Topology`](crate::config::Topology).
//!
//! Every handler runs to completion on the calling thread except the
//! GUILD_CREATE snapshot, which is moved to tokio's blocking pool when a
//! runtime is available.

use futures::future::{self, BoxFuture, FutureExt};
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, trace, warn};

use super::events::GatewayEvent;
use super::metrics::CacheMetrics;
use super::partition::{PartitionMap, ShardStore};
use super::{EntityCache, EntityCacheWorker};
use crate::config::{CacheFlag, CacheOptions};
use crate::entity::{
    Channel, CustomEmoji, DmChannel, EntityDecoder, Guild, GuildChannel, JsonEntityDecoder,
    Member, Presence, Role, User, VoiceState,
};
use crate::error::{CacheError, Result};
use crate::snowflake::{parse_snowflake, shard_for};
use crate::view::{
    self, CacheView, CompositeCacheView, CompositeNamedCacheView, DefaultCacheView,
    DefaultNamedCacheView, MutableCacheView, NameFn, NamedView, View,
};

type Named<T> = DefaultNamedCacheView<Arc<T>>;
type Plain<T> = DefaultCacheView<Arc<T>>;

/// Entity cache backed by [`LongEntityMap`](crate::view::LongEntityMap)
/// partitions. Clones share the same storage.
#[derive(Clone)]
pub struct MemoryEntityCache {
    state: Arc<CacheState>,
}

impl fmt::Debug for MemoryEntityCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryEntityCache")
            .field("options", &self.state.options)
            .field("guilds", &self.state.guilds.len())
            .field("users", &self.state.users)
            .finish()
    }
}

struct CacheState {
    options: CacheOptions,
    decoder: Arc<dyn EntityDecoder>,
    metrics: CacheMetrics,

    self_user: RwLock<Option<Arc<User>>>,
    guilds: Named<Guild>,

    // Per shard, or unified
    users: Arc<ShardStore<Named<User>>>,
    presences: ShardStore<Plain<Presence>>,
    dm_channels: ShardStore<Plain<DmChannel>>,

    // Per guild
    members: Arc<PartitionMap<Named<Member>>>,
    roles: Arc<PartitionMap<Named<Role>>>,
    channels: Arc<PartitionMap<Named<GuildChannel>>>,
    emojis: Arc<PartitionMap<Named<CustomEmoji>>>,
    voice_states: Arc<PartitionMap<Plain<VoiceState>>>,

    user_names: NameFn<Arc<User>>,
    member_names: NameFn<Arc<Member>>,
    role_names: NameFn<Arc<Role>>,
    channel_names: NameFn<Arc<GuildChannel>>,
    emoji_names: NameFn<Arc<CustomEmoji>>,
}

fn named_partitions<T>(name_fn: &NameFn<Arc<T>>) -> Arc<PartitionMap<Named<T>>>
where
    T: Send + Sync + 'static,
{
    let name_fn = Arc::clone(name_fn);
    Arc::new(PartitionMap::new(move || {
        DefaultNamedCacheView::new(Arc::clone(&name_fn))
    }))
}

fn named_or_empty<T>(partition: Option<Arc<Named<T>>>) -> NamedView<Arc<T>>
where
    T: Send + Sync + 'static,
{
    match partition {
        Some(partition) => partition,
        None => view::empty(),
    }
}

impl MemoryEntityCache {
    /// Cache that decodes payloads with [`JsonEntityDecoder`]
    pub fn new(options: CacheOptions) -> Result<Self> {
        Self::with_decoder(options, Arc::new(JsonEntityDecoder::new()))
    }

    /// Cache that decodes payloads with `decoder`
    pub fn with_decoder(options: CacheOptions, decoder: Arc<dyn EntityDecoder>) -> Result<Self> {
        options.validate()?;
        let topology = options.topology;

        let guild_names: NameFn<Arc<Guild>> = Arc::new(|g: &Arc<Guild>| Some(g.name.clone()));
        let user_names: NameFn<Arc<User>> = Arc::new(|u: &Arc<User>| Some(u.username.clone()));
        let role_names: NameFn<Arc<Role>> = Arc::new(|r: &Arc<Role>| Some(r.name.clone()));
        let channel_names: NameFn<Arc<GuildChannel>> =
            Arc::new(|c: &Arc<GuildChannel>| Some(c.name.clone()));
        let emoji_names: NameFn<Arc<CustomEmoji>> =
            Arc::new(|e: &Arc<CustomEmoji>| e.name.clone());

        let users = {
            let user_names = Arc::clone(&user_names);
            Arc::new(ShardStore::new(topology, move || {
                DefaultNamedCacheView::new(Arc::clone(&user_names))
            }))
        };

        // Nickname first, then the cached username
        let member_names: NameFn<Arc<Member>> = {
            let users = Arc::clone(&users);
            Arc::new(move |m: &Arc<Member>| {
                m.nick.clone().or_else(|| {
                    users
                        .lookup::<Arc<User>>(m.user_id)
                        .map(|u| u.username.clone())
                })
            })
        };

        let state = CacheState {
            decoder,
            metrics: CacheMetrics::new(),
            self_user: RwLock::new(None),
            guilds: DefaultNamedCacheView::new(guild_names),
            users,
            presences: ShardStore::new(topology, DefaultCacheView::new),
            dm_channels: ShardStore::new(topology, DefaultCacheView::new),
            members: named_partitions(&member_names),
            roles: named_partitions(&role_names),
            channels: named_partitions(&channel_names),
            emojis: named_partitions(&emoji_names),
            voice_states: Arc::new(PartitionMap::new(DefaultCacheView::new)),
            user_names,
            member_names,
            role_names,
            channel_names,
            emoji_names,
            options,
        };

        Ok(Self {
            state: Arc::new(state),
        })
    }

    pub fn options(&self) -> &CacheOptions {
        &self.state.options
    }

    /// Counters for how events have been handled so far
    pub fn metrics(&self) -> &CacheMetrics {
        &self.state.metrics
    }

    /// Run the GUILD_CREATE snapshot on the blocking pool, or inline when no
    /// tokio runtime is running on this thread.
    fn spawn_guild_load(&self, shard_id: u32, payload: Value) -> BoxFuture<'static, Result<()>> {
        let state = Arc::clone(&self.state);
        match Handle::try_current() {
            Ok(handle) => {
                let task = handle.spawn_blocking(move || {
                    state.dispatch(GatewayEvent::GuildCreate, shard_id, &payload)
                });
                async move { task.await.map_err(CacheError::from) }.boxed()
            }
            Err(_) => {
                state.dispatch(GatewayEvent::GuildCreate, shard_id, &payload);
                future::ready(Ok(())).boxed()
            }
        }
    }
}

// =============================================================================
// Update protocol
// =============================================================================

/// Snowflake held in `payload[field]`, as a string or a number
fn id_field(event: GatewayEvent, payload: &Value, field: &'static str) -> Result<u64> {
    match payload.get(field) {
        Some(Value::String(raw)) => parse_snowflake(raw),
        Some(Value::Number(n)) => n
            .as_u64()
            .ok_or_else(|| CacheError::missing(event.as_str(), field)),
        _ => Err(CacheError::missing(event.as_str(), field)),
    }
}

fn object_field<'a>(
    event: GatewayEvent,
    payload: &'a Value,
    field: &'static str,
) -> Result<&'a Value> {
    payload
        .get(field)
        .filter(|v| !v.is_null())
        .ok_or_else(|| CacheError::missing(event.as_str(), field))
}

fn array_field<'a>(payload: &'a Value, field: &str) -> &'a [Value] {
    payload
        .get(field)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

impl CacheState {
    /// Apply one event, logging instead of failing when it cannot be applied
    fn dispatch(&self, event: GatewayEvent, shard_id: u32, payload: &Value) {
        if let Err(error) = self.apply(event, shard_id, payload) {
            warn!(%event, shard_id, %error, "Dropping event that could not be applied");
            self.metrics.record_dropped();
        }
    }

    fn apply(&self, event: GatewayEvent, shard_id: u32, payload: &Value) -> Result<()> {
        match event {
            GatewayEvent::Ready => {
                let user = self.decoder.create_user(object_field(event, payload, "user")?)?;
                *self.self_user.write() = Some(Arc::new(user));
            }
            GatewayEvent::UserUpdate => {
                let user = self.decoder.create_user(payload)?;
                *self.self_user.write() = Some(Arc::new(user));
            }
            GatewayEvent::ChannelCreate | GatewayEvent::ChannelUpdate => {
                let channel = self.decoder.create_channel(payload)?;
                self.cache_channel(shard_id, channel);
            }
            GatewayEvent::ChannelDelete => {
                let channel = self.decoder.create_channel(payload)?;
                self.uncache_channel(channel);
            }
            GatewayEvent::GuildCreate => self.load_guild(shard_id, payload)?,
            GatewayEvent::GuildUpdate => {
                let guild = self.decoder.create_guild(payload)?;
                self.guilds.put(guild.id, Arc::new(guild));
            }
            GatewayEvent::GuildDelete => {
                let guild_id = id_field(event, payload, "id")?;
                self.delete_guild(guild_id);
            }
            GatewayEvent::GuildRoleCreate | GatewayEvent::GuildRoleUpdate => {
                let guild_id = id_field(event, payload, "guild_id")?;
                let role = self
                    .decoder
                    .create_role(guild_id, object_field(event, payload, "role")?)?;
                self.roles
                    .get_or_create(guild_id)
                    .put(role.id, Arc::new(role));
            }
            GatewayEvent::GuildRoleDelete => {
                let guild_id = id_field(event, payload, "guild_id")?;
                let role_id = id_field(event, payload, "role_id")?;
                if let Some(roles) = self.roles.get(guild_id) {
                    roles.remove(role_id);
                }
            }
            GatewayEvent::GuildMemberAdd => {
                let guild_id = id_field(event, payload, "guild_id")?;
                let member = self.decoder.create_member(guild_id, payload)?;
                self.cache_member(shard_id, member, payload.get("user"));
            }
            GatewayEvent::GuildMemberUpdate => self.merge_member(payload)?,
            GatewayEvent::GuildMemberRemove => {
                let guild_id = id_field(event, payload, "guild_id")?;
                let user_id = id_field(event, object_field(event, payload, "user")?, "id")?;
                if let Some(members) = self.members.get(guild_id) {
                    members.remove(user_id);
                }
            }
            GatewayEvent::GuildMembersChunk => {
                let guild_id = id_field(event, payload, "guild_id")?;
                for data in array_field(payload, "members") {
                    match self.decoder.create_member(guild_id, data) {
                        Ok(member) => self.cache_member(shard_id, member, data.get("user")),
                        Err(error) => warn!(guild_id, %error, "Skipping undecodable chunk member"),
                    }
                }
            }
            GatewayEvent::GuildEmojisUpdate => {
                if self.options.has_flag(CacheFlag::DropEmoji) {
                    return Ok(());
                }
                let guild_id = id_field(event, payload, "guild_id")?;
                let emojis = self.decode_all(guild_id, payload, "emojis", |data| {
                    self.decoder.create_custom_emoji(guild_id, data)
                });
                fill(&self.emojis, guild_id, emojis.into_iter().map(|e| (e.id, Arc::new(e))));
            }
            GatewayEvent::PresenceUpdate => self.update_presence(shard_id, payload)?,
            GatewayEvent::VoiceStateUpdate => {
                if self.options.has_flag(CacheFlag::DropVoiceStates) {
                    return Ok(());
                }
                let state = self.decoder.create_voice_state(None, payload)?;
                self.cache_voice_state(state);
            }
        }
        Ok(())
    }

    fn cache_channel(&self, shard_id: u32, channel: Channel) {
        match channel {
            Channel::Guild(channel) => {
                self.channels
                    .get_or_create(channel.guild_id)
                    .put(channel.id, Arc::new(channel));
            }
            Channel::Dm(channel) => {
                self.dm_channels
                    .upsert(shard_id, channel.recipient_id, Arc::new(channel));
            }
            Channel::GroupDm(channel) => {
                warn!(channel_id = channel.id, "Not caching group DM channel");
                self.metrics.record_dropped();
            }
        }
    }

    fn uncache_channel(&self, channel: Channel) {
        match channel {
            Channel::Guild(channel) => {
                if let Some(channels) = self.channels.get(channel.guild_id) {
                    channels.remove(channel.id);
                }
            }
            Channel::Dm(channel) => {
                self.dm_channels.remove::<Arc<DmChannel>>(channel.recipient_id);
            }
            Channel::GroupDm(channel) => {
                warn!(channel_id = channel.id, "Ignoring delete of group DM channel");
                self.metrics.record_dropped();
            }
        }
    }

    /// Store a member, and the user embedded in its payload if there is one
    fn cache_member(&self, shard_id: u32, member: Member, user: Option<&Value>) {
        if let Some(data) = user {
            match self.decoder.create_user(data) {
                Ok(user) => {
                    self.users.upsert(shard_id, user.id, Arc::new(user));
                }
                Err(error) => {
                    debug!(user_id = member.user_id, %error, "Member carries no usable user")
                }
            }
        }
        self.members
            .get_or_create(member.guild_id)
            .put(member.user_id, Arc::new(member));
    }

    fn cache_voice_state(&self, state: VoiceState) {
        let Some(guild_id) = state.guild_id else {
            warn!(user_id = state.user_id, "Not caching voice state without a guild");
            self.metrics.record_dropped();
            return;
        };
        self.voice_states
            .get_or_create(guild_id)
            .put(state.user_id, Arc::new(state));
    }

    /// GUILD_MEMBER_UPDATE carries only user, roles and nick. The rest comes
    /// from the member already cached. The embedded user is partial, so the
    /// user cache is left alone.
    fn merge_member(&self, payload: &Value) -> Result<()> {
        let event = GatewayEvent::GuildMemberUpdate;
        let guild_id = id_field(event, payload, "guild_id")?;
        let user = object_field(event, payload, "user")?;
        let user_id = id_field(event, user, "id")?;

        let Some(old) = self.members.get(guild_id).and_then(|m| m.get(user_id)) else {
            warn!(guild_id, user_id, "Got GUILD_MEMBER_UPDATE for a member that is not cached");
            self.metrics.record_dropped();
            return Ok(());
        };

        let roles = match payload.get("roles") {
            Some(roles) if roles.is_array() => roles.clone(),
            _ => json!(old.role_ids.iter().map(u64::to_string).collect::<Vec<_>>()),
        };
        let merged = json!({
            "user": user,
            "roles": roles,
            "nick": payload.get("nick").cloned().unwrap_or(Value::Null),
            "deaf": old.deaf,
            "mute": old.mute,
            "joined_at": old.joined_at.map(|t| t.to_rfc3339()),
        });
        let member = self.decoder.create_member(guild_id, &merged)?;
        self.members
            .get_or_create(guild_id)
            .put(user_id, Arc::new(member));
        Ok(())
    }

    /// PRESENCE_UPDATE may also carry a changed username, discriminator or
    /// avatar for a user we already hold.
    fn update_presence(&self, shard_id: u32, payload: &Value) -> Result<()> {
        let event = GatewayEvent::PresenceUpdate;
        let user = object_field(event, payload, "user")?;
        let user_id = id_field(event, user, "id")?;

        let Some(old) = self.users.lookup::<Arc<User>>(user_id) else {
            if self.options.chunk_members {
                warn!(
                    user_id,
                    "Received PRESENCE_UPDATE for unknown user (member chunking enabled)"
                );
            } else {
                warn!(user_id, "Received PRESENCE_UPDATE for uncached user");
            }
            self.metrics.record_dropped();
            return Ok(());
        };

        let text = |field: &str| user.get(field).and_then(Value::as_str).map(str::to_owned);
        let avatar = match user.get("avatar") {
            Some(Value::Null) => None,
            Some(Value::String(avatar)) => Some(avatar.clone()),
            _ => old.avatar.clone(),
        };
        let merged = json!({
            "id": user_id.to_string(),
            "bot": old.bot,
            "username": text("username").unwrap_or_else(|| old.username.clone()),
            "discriminator": text("discriminator").unwrap_or_else(|| old.discriminator.clone()),
            "avatar": avatar,
        });
        let updated = self.decoder.create_user(&merged)?;
        self.users.upsert(shard_id, user_id, Arc::new(updated));

        if !self.options.has_flag(CacheFlag::DropGameStatuses) {
            let presence = self.decoder.create_presence(payload)?;
            self.presences.upsert(shard_id, user_id, Arc::new(presence));
        }
        Ok(())
    }

    /// Decode every element of `payload[field]`, skipping the ones that fail
    fn decode_all<T, F>(
        &self,
        guild_id: u64,
        payload: &Value,
        field: &'static str,
        decode: F,
    ) -> Vec<T>
    where
        F: Fn(&Value) -> Result<T>,
    {
        array_field(payload, field)
            .iter()
            .filter_map(|data| match decode(data) {
                Ok(entity) => Some(entity),
                Err(error) => {
                    warn!(guild_id, field, %error, "Skipping undecodable guild snapshot entry");
                    None
                }
            })
            .collect()
    }

    fn load_guild(&self, shard_id: u32, payload: &Value) -> Result<()> {
        let guild = self.decoder.create_guild(payload)?;
        let guild_id = guild.id;

        let roles = self.decode_all(guild_id, payload, "roles", |data| {
            self.decoder.create_role(guild_id, data)
        });
        let roles = fill(&self.roles, guild_id, roles.into_iter().map(|r| (r.id, Arc::new(r))));

        let channels = self.decode_all(guild_id, payload, "channels", |data| {
            self.decoder.create_guild_channel(guild_id, data)
        });
        let channels = fill(
            &self.channels,
            guild_id,
            channels.into_iter().map(|c| (c.id, Arc::new(c))),
        );

        let members = self.decode_all(guild_id, payload, "members", |data| {
            let member = self.decoder.create_member(guild_id, data)?;
            Ok((member, data.get("user").and_then(|u| self.decoder.create_user(u).ok())))
        });
        for (_, user) in &members {
            if let Some(user) = user {
                self.users.upsert(shard_id, user.id, Arc::new(user.clone()));
            }
        }
        let members = fill(
            &self.members,
            guild_id,
            members.into_iter().map(|(m, _)| (m.user_id, Arc::new(m))),
        );

        let mut emojis = 0;
        if !self.options.has_flag(CacheFlag::DropEmoji) {
            let decoded = self.decode_all(guild_id, payload, "emojis", |data| {
                self.decoder.create_custom_emoji(guild_id, data)
            });
            emojis = fill(&self.emojis, guild_id, decoded.into_iter().map(|e| (e.id, Arc::new(e))));
        }

        let mut presences = 0;
        if !self.options.has_flag(CacheFlag::DropGameStatuses) {
            let decoded = self.decode_all(guild_id, payload, "presences", |data| {
                self.decoder.create_presence(data)
            });
            presences = decoded.len();
            for presence in decoded {
                self.presences
                    .upsert(shard_id, presence.user_id, Arc::new(presence));
            }
        }

        let mut voice_states = 0;
        if !self.options.has_flag(CacheFlag::DropVoiceStates) {
            let decoded = self.decode_all(guild_id, payload, "voice_states", |data| {
                self.decoder.create_voice_state(Some(guild_id), data)
            });
            voice_states = decoded.len();
            for state in decoded {
                self.cache_voice_state(state);
            }
        }

        self.guilds.put(guild_id, Arc::new(guild));

        let total = roles + channels + members + emojis + presences + voice_states + 1;
        self.metrics.record_bulk_load(total as u64);
        debug!(
            guild_id,
            shard_id,
            roles,
            channels,
            members,
            emojis,
            presences,
            voice_states,
            "Loaded guild snapshot"
        );
        Ok(())
    }

    fn delete_guild(&self, guild_id: u64) {
        self.guilds.remove(guild_id);
        self.members.remove(guild_id);
        self.roles.remove(guild_id);
        self.channels.remove(guild_id);
        self.emojis.remove(guild_id);
        self.voice_states.remove(guild_id);
    }

    fn invalidate_shard(&self, shard_id: u32) {
        let shard_count = self.options.shard_count;
        let owned = |id: u64| shard_for(id, shard_count) == shard_id;

        let mut dropped = self.members.remove_where(owned)
            + self.roles.remove_where(owned)
            + self.channels.remove_where(owned)
            + self.emojis.remove_where(owned)
            + self.voice_states.remove_where(owned);

        let guilds_before = self.guilds.len();
        self.guilds.remove_if(&mut |id| owned(id));
        let guilds = guilds_before.saturating_sub(self.guilds.len());

        for store_dropped in [
            self.users.drop_shard(shard_id),
            self.presences.drop_shard(shard_id),
            self.dm_channels.drop_shard(shard_id),
        ] {
            if store_dropped {
                dropped += 1;
            }
        }

        self.metrics.record_invalidation(dropped as u64);
        debug!(shard_id, partitions = dropped, guilds, "Invalidated shard");
    }
}

/// Write a batch into one guild's partition. An empty batch creates nothing.
fn fill<T, I>(partitions: &PartitionMap<Named<T>>, guild_id: u64, entries: I) -> usize
where
    T: Send + Sync + 'static,
    I: IntoIterator<Item = (u64, Arc<T>)>,
{
    let mut entries = entries.into_iter().peekable();
    if entries.peek().is_none() {
        return 0;
    }
    partitions.get_or_create(guild_id).put_all(entries)
}

// =============================================================================
// Read contract
// =============================================================================

impl EntityCache for MemoryEntityCache {
    fn guild(&self, id: u64) -> Option<Arc<Guild>> {
        self.state.guilds.get(id)
    }

    fn guilds(&self) -> NamedView<Arc<Guild>> {
        Arc::new(self.state.guilds.clone())
    }

    fn user(&self, id: u64) -> Option<Arc<User>> {
        self.state.users.lookup(id)
    }

    fn users(&self) -> NamedView<Arc<User>> {
        Arc::new(CompositeNamedCacheView::<Arc<User>, Named<User>>::new(
            self.state.users.partitions(),
            Arc::clone(&self.state.user_names),
        ))
    }

    fn presence(&self, user_id: u64) -> Option<Arc<Presence>> {
        self.state.presences.lookup(user_id)
    }

    fn presences(&self) -> View<Arc<Presence>> {
        Arc::new(self.state.presences.composite::<Arc<Presence>>())
    }

    fn member(&self, guild_id: u64, user_id: u64) -> Option<Arc<Member>> {
        self.state.members.get(guild_id)?.get(user_id)
    }

    fn members(&self, guild_id: u64) -> NamedView<Arc<Member>> {
        named_or_empty(self.state.members.get(guild_id))
    }

    fn all_members(&self) -> NamedView<Arc<Member>> {
        Arc::new(CompositeNamedCacheView::<Arc<Member>, Named<Member>>::new(
            Arc::clone(&self.state.members),
            Arc::clone(&self.state.member_names),
        ))
    }

    fn role(&self, guild_id: u64, id: u64) -> Option<Arc<Role>> {
        self.state.roles.get(guild_id)?.get(id)
    }

    fn roles(&self, guild_id: u64) -> NamedView<Arc<Role>> {
        named_or_empty(self.state.roles.get(guild_id))
    }

    fn all_roles(&self) -> NamedView<Arc<Role>> {
        Arc::new(CompositeNamedCacheView::<Arc<Role>, Named<Role>>::new(
            Arc::clone(&self.state.roles),
            Arc::clone(&self.state.role_names),
        ))
    }

    fn channel(&self, guild_id: u64, id: u64) -> Option<Arc<GuildChannel>> {
        self.state.channels.get(guild_id)?.get(id)
    }

    fn channels(&self, guild_id: u64) -> NamedView<Arc<GuildChannel>> {
        named_or_empty(self.state.channels.get(guild_id))
    }

    fn all_channels(&self) -> NamedView<Arc<GuildChannel>> {
        Arc::new(
            CompositeNamedCacheView::<Arc<GuildChannel>, Named<GuildChannel>>::new(
                Arc::clone(&self.state.channels),
                Arc::clone(&self.state.channel_names),
            ),
        )
    }

    fn dm_channel(&self, user_id: u64) -> Option<Arc<DmChannel>> {
        self.state.dm_channels.lookup(user_id)
    }

    fn dm_channels(&self) -> View<Arc<DmChannel>> {
        Arc::new(self.state.dm_channels.composite::<Arc<DmChannel>>())
    }

    fn emoji(&self, guild_id: u64, id: u64) -> Option<Arc<CustomEmoji>> {
        self.state.emojis.get(guild_id)?.get(id)
    }

    fn emojis(&self, guild_id: u64) -> NamedView<Arc<CustomEmoji>> {
        named_or_empty(self.state.emojis.get(guild_id))
    }

    fn all_emojis(&self) -> NamedView<Arc<CustomEmoji>> {
        Arc::new(
            CompositeNamedCacheView::<Arc<CustomEmoji>, Named<CustomEmoji>>::new(
                Arc::clone(&self.state.emojis),
                Arc::clone(&self.state.emoji_names),
            ),
        )
    }

    fn voice_state(&self, guild_id: u64, user_id: u64) -> Option<Arc<VoiceState>> {
        self.state.voice_states.get(guild_id)?.get(user_id)
    }

    fn voice_states(&self, guild_id: u64) -> View<Arc<VoiceState>> {
        match self.state.voice_states.get(guild_id) {
            Some(partition) => partition,
            None => view::empty_view(),
        }
    }

    fn all_voice_states(&self) -> View<Arc<VoiceState>> {
        Arc::new(CompositeCacheView::<Arc<VoiceState>, Plain<VoiceState>>::new(
            Arc::clone(&self.state.voice_states),
        ))
    }

    fn self_user(&self) -> Option<Arc<User>> {
        self.state.self_user.read().clone()
    }
}

// =============================================================================
// Write contract
// =============================================================================

impl EntityCacheWorker for MemoryEntityCache {
    fn update_cache(
        &self,
        event_type: &str,
        shard_id: u32,
        payload: &Value,
    ) -> BoxFuture<'static, Result<()>> {
        let event = match event_type.parse::<GatewayEvent>() {
            Ok(event) => event,
            Err(_) => {
                trace!(event_type, shard_id, "Ignoring unhandled event");
                self.state.metrics.record_ignored();
                return future::ready(Ok(())).boxed();
            }
        };
        trace!(%event, shard_id, "Routing event");
        self.state.metrics.record_routed();

        if event == GatewayEvent::GuildCreate {
            return self.spawn_guild_load(shard_id, payload.clone());
        }
        self.state.dispatch(event, shard_id, payload);
        future::ready(Ok(())).boxed()
    }

    fn bulk_cache_users(&self, shard_id: u32, users: Vec<User>) {
        for user in users {
            self.state.users.upsert(shard_id, user.id, Arc::new(user));
        }
    }

    fn bulk_cache_channels(&self, _shard_id: u32, channels: Vec<GuildChannel>) {
        for channel in channels {
            self.state
                .channels
                .get_or_create(channel.guild_id)
                .put(channel.id, Arc::new(channel));
        }
    }

    fn bulk_cache_roles(&self, _shard_id: u32, roles: Vec<Role>) {
        for role in roles {
            self.state
                .roles
                .get_or_create(role.guild_id)
                .put(role.id, Arc::new(role));
        }
    }

    fn bulk_cache_members(&self, _shard_id: u32, members: Vec<Member>) {
        for member in members {
            self.state
                .members
                .get_or_create(member.guild_id)
                .put(member.user_id, Arc::new(member));
        }
    }

    fn bulk_cache_emoji(&self, _shard_id: u32, emoji: Vec<CustomEmoji>) {
        if self.state.options.has_flag(CacheFlag::DropEmoji) {
            return;
        }
        for emoji in emoji {
            self.state
                .emojis
                .get_or_create(emoji.guild_id)
                .put(emoji.id, Arc::new(emoji));
        }
    }

    fn bulk_cache_presences(&self, shard_id: u32, presences: Vec<Presence>) {
        if self.state.options.has_flag(CacheFlag::DropGameStatuses) {
            return;
        }
        for presence in presences {
            self.state
                .presences
                .upsert(shard_id, presence.user_id, Arc::new(presence));
        }
    }

    fn bulk_cache_voice_states(&self, _shard_id: u32, voice_states: Vec<VoiceState>) {
        if self.state.options.has_flag(CacheFlag::DropVoiceStates) {
            return;
        }
        for state in voice_states {
            self.state.cache_voice_state(state);
        }
    }

    fn invalidate_shard(&self, shard_id: u32) {
        self.state.invalidate_shard(shard_id);
    }
}

// =============================================================================
// Tests
// =============================================================================
