//! Guildcache Integration Tests
//!
//! Drives `MemoryEntityCache` through the gateway-facing write contract only:
//! - Guild snapshots, role and guild deletion
//! - Presence updates against cached and uncached users
//! - Shard invalidation and topologies
//! - Partition isolation
//! - Deletes, bulk loads and cache flags

use serde_json::{json, Value};

use guildcache::{
    CacheFlag, CacheOptions, CacheView, CacheViewExt, EntityCache, EntityCacheExt,
    EntityCacheWorker, EntityDecoder, JsonEntityDecoder, MemoryEntityCache, NamedCacheViewExt,
    Topology,
};

/// A snowflake that hashes to `shard` out of `shard_count`
fn id_on_shard(shard: u64, shard_count: u64, n: u64) -> u64 {
    (shard + n * shard_count) << 22
}

fn user(id: u64, name: &str) -> Value {
    json!({"id": id.to_string(), "username": name, "discriminator": "0001", "avatar": null})
}

fn guild(id: u64, roles: usize, members: &[u64]) -> Value {
    let roles: Vec<Value> = (0..roles)
        .map(|i| json!({"id": (id + 1 + i as u64).to_string(), "name": format!("role{}", i)}))
        .collect();
    let members: Vec<Value> = members
        .iter()
        .map(|&m| json!({"user": user(m, &format!("user{}", m)), "roles": [], "deaf": false}))
        .collect();
    json!({
        "id": id.to_string(),
        "name": format!("guild{}", id),
        "roles": roles,
        "channels": [{"id": (id + 100).to_string(), "type": 0, "name": "general"}],
        "members": members,
        "emojis": [{"id": (id + 200).to_string(), "name": "wave"}],
        "voice_states": [{"user_id": "9", "channel_id": (id + 100).to_string(), "session_id": "s"}]
    })
}

// =============================================================================
// Guild lifecycle
// =============================================================================

mod guild_tests {
    use super::*;

    #[tokio::test]
    async fn test_role_delete_then_guild_delete() {
        let cache = MemoryEntityCache::new(CacheOptions::default()).unwrap();
        cache
            .update_cache("GUILD_CREATE", 0, &guild(1000, 2, &[1, 2, 3]))
            .await
            .unwrap();
        assert_eq!(cache.roles(1000).len(), 2);
        assert_eq!(cache.members(1000).len(), 3);

        cache
            .update_cache("GUILD_ROLE_DELETE", 0, &json!({"guild_id": "1000", "role_id": "1001"}))
            .await
            .unwrap();
        assert_eq!(cache.roles(1000).len(), 1);
        assert!(cache.role(1000, 1001).is_none());
        assert!(cache.role(1000, 1002).is_some());
        assert_eq!(cache.members(1000).len(), 3);

        cache
            .update_cache("GUILD_DELETE", 0, &json!({"id": "1000", "unavailable": false}))
            .await
            .unwrap();
        assert_eq!(cache.roles(1000).len(), 0);
        assert_eq!(cache.members(1000).len(), 0);
    }

    #[tokio::test]
    async fn test_guild_delete_cascades_to_every_scoped_partition() {
        let cache = MemoryEntityCache::new(CacheOptions::default()).unwrap();
        cache
            .update_cache("GUILD_CREATE", 0, &guild(50, 3, &[4, 5]))
            .await
            .unwrap();
        let members = cache.members(50);
        assert!(!cache.channels(50).is_empty());
        assert!(!cache.emojis(50).is_empty());
        assert!(!cache.voice_states(50).is_empty());

        cache
            .update_cache("GUILD_DELETE", 0, &json!({"id": "50"}))
            .await
            .unwrap();

        assert!(cache.guild(50).is_none());
        assert!(cache.members(50).is_empty());
        assert!(cache.roles(50).is_empty());
        assert!(cache.channels(50).is_empty());
        assert!(cache.emojis(50).is_empty());
        assert!(cache.voice_states(50).is_empty());
        assert!(cache.all_members().is_empty());

        // A view taken earlier still holds the detached partition
        assert_eq!(members.len(), 2);
    }

    #[tokio::test]
    async fn test_guild_update_leaves_scoped_partitions() {
        let cache = MemoryEntityCache::new(CacheOptions::default()).unwrap();
        cache
            .update_cache("GUILD_CREATE", 0, &guild(7, 1, &[1]))
            .await
            .unwrap();
        cache
            .update_cache("GUILD_UPDATE", 0, &json!({"id": "7", "name": "renamed"}))
            .await
            .unwrap();

        assert_eq!(cache.guild(7).map(|g| g.name.clone()), Some("renamed".to_string()));
        assert_eq!(cache.roles(7).len(), 1);
        assert_eq!(cache.guilds().find_by_name("RENAMED", true).len(), 1);
    }
}

// =============================================================================
// Presence and members
// =============================================================================

mod presence_tests {
    use super::*;

    fn presence(user_id: u64, username: &str) -> Value {
        json!({
            "user": {"id": user_id.to_string(), "username": username},
            "status": "dnd",
            "guild_id": "10"
        })
    }

    #[tokio::test]
    async fn test_presence_waits_for_cached_user() {
        let options = CacheOptions::with_shards(1).chunk_members(false);
        let cache = MemoryEntityCache::new(options).unwrap();

        cache
            .update_cache("PRESENCE_UPDATE", 0, &presence(42, "newname"))
            .await
            .unwrap();
        assert!(cache.presence(42).is_none());
        assert!(cache.user(42).is_none());
        assert_eq!(cache.metrics().events_dropped(), 1);

        cache
            .update_cache(
                "GUILD_MEMBER_ADD",
                0,
                &json!({"guild_id": "10", "user": user(42, "oldname"), "roles": []}),
            )
            .await
            .unwrap();
        assert_eq!(cache.user(42).map(|u| u.username.clone()), Some("oldname".to_string()));

        cache
            .update_cache("PRESENCE_UPDATE", 0, &presence(42, "newname"))
            .await
            .unwrap();
        assert!(cache.presence(42).is_some());
        let user = cache.user(42).unwrap();
        assert_eq!(user.username, "newname");
        assert_eq!(user.discriminator, "0001");
        assert_eq!(cache.users().len(), 1);
    }

    #[tokio::test]
    async fn test_member_add_update_remove() {
        let cache = MemoryEntityCache::new(CacheOptions::default()).unwrap();
        cache
            .update_cache(
                "GUILD_MEMBER_ADD",
                0,
                &json!({
                    "guild_id": "10",
                    "user": user(5, "kim"),
                    "roles": ["1"],
                    "mute": true,
                    "joined_at": "2020-05-05T10:00:00+02:00"
                }),
            )
            .await
            .unwrap();
        cache
            .update_cache(
                "GUILD_MEMBER_UPDATE",
                0,
                &json!({
                    "guild_id": "10",
                    "user": user(5, "kim"),
                    "roles": ["1", "2"],
                    "nick": null
                }),
            )
            .await
            .unwrap();

        let member = cache.member_by_id("10", "5").unwrap().unwrap();
        assert!(member.mute);
        assert_eq!(member.role_ids, vec![1, 2]);
        assert!(member.joined_at.is_some());

        cache
            .update_cache("GUILD_MEMBER_REMOVE", 0, &json!({"guild_id": "10", "user": {"id": "5"}}))
            .await
            .unwrap();
        assert!(cache.member(10, 5).is_none());
    }

    #[tokio::test]
    async fn test_member_update_keeps_cached_user() {
        let cache = MemoryEntityCache::new(CacheOptions::default()).unwrap();
        cache
            .update_cache(
                "GUILD_MEMBER_ADD",
                0,
                &json!({
                    "guild_id": "10",
                    "user": {
                        "id": "5",
                        "username": "kim",
                        "discriminator": "1234",
                        "avatar": "abc",
                        "bot": true
                    },
                    "roles": []
                }),
            )
            .await
            .unwrap();
        cache
            .update_cache(
                "GUILD_MEMBER_UPDATE",
                0,
                &json!({"guild_id": "10", "user": {"id": "5", "username": "kim"}, "roles": ["3"]}),
            )
            .await
            .unwrap();

        let user = cache.user(5).unwrap();
        assert_eq!(user.discriminator, "1234");
        assert_eq!(user.avatar.as_deref(), Some("abc"));
        assert!(user.bot);
        assert_eq!(cache.member(10, 5).map(|m| m.role_ids.clone()), Some(vec![3]));
    }

    #[tokio::test]
    async fn test_members_chunk() {
        let cache = MemoryEntityCache::new(CacheOptions::default()).unwrap();
        let members: Vec<Value> = (1..=5u64)
            .map(|id| json!({"user": user(id, &format!("m{}", id)), "roles": []}))
            .collect();
        cache
            .update_cache("GUILD_MEMBERS_CHUNK", 0, &json!({"guild_id": "3", "members": members}))
            .await
            .unwrap();
        assert_eq!(cache.members(3).len(), 5);
        assert_eq!(cache.users().len(), 5);
        assert_eq!(cache.members(3).find_by_name_ends_with("M4", true).len(), 1);
    }
}

// =============================================================================
// Shards and topology
// =============================================================================

mod shard_tests {
    use super::*;

    #[tokio::test]
    async fn test_invalidate_shard_two_of_four() {
        let cache = MemoryEntityCache::new(CacheOptions::with_shards(4)).unwrap();
        let doomed = id_on_shard(2, 4, 0);
        let doomed_too = id_on_shard(2, 4, 3);
        let kept: Vec<u64> = [0, 1, 3].iter().map(|&s| id_on_shard(s, 4, 1)).collect();

        let placements =
            [(2u32, doomed), (2, doomed_too), (0, kept[0]), (1, kept[1]), (3, kept[2])];
        for (shard, id) in placements {
            cache
                .update_cache("GUILD_CREATE", shard, &guild(id, 2, &[id + 10, id + 11]))
                .await
                .unwrap();
        }
        assert_eq!(cache.guilds().len(), 5);
        assert_eq!(cache.all_roles().len(), 10);

        cache.invalidate_shard(2);

        for id in [doomed, doomed_too] {
            assert!(cache.guild(id).is_none());
            assert!(cache.members(id).is_empty());
            assert!(cache.roles(id).is_empty());
            assert!(cache.channels(id).is_empty());
            assert!(cache.emojis(id).is_empty());
            assert!(cache.voice_states(id).is_empty());
        }
        for &id in &kept {
            assert!(cache.guild(id).is_some());
            assert_eq!(cache.members(id).len(), 2);
            assert_eq!(cache.roles(id).len(), 2);
            assert_eq!(cache.channels(id).len(), 1);
            assert_eq!(cache.emojis(id).len(), 1);
            assert_eq!(cache.voice_states(id).len(), 1);
        }
        assert_eq!(cache.guilds().len(), 3);
        assert_eq!(cache.all_roles().len(), 6);

        // Users that arrived on shard 2 went with its partition
        assert!(cache.user(doomed + 10).is_none());
        assert!(cache.user(kept[0] + 10).is_some());
        assert_eq!(cache.metrics().snapshot().shard_invalidations, 1);
    }

    #[tokio::test]
    async fn test_split_and_unified_agree_on_reads() {
        for topology in [Topology::Split, Topology::Unified] {
            let options = CacheOptions::with_shards(3).topology(topology);
            let cache = MemoryEntityCache::new(options).unwrap();
            for shard in 0..3u32 {
                let id = u64::from(shard) + 1;
                cache
                    .update_cache(
                        "CHANNEL_CREATE",
                        shard,
                        &json!({
                            "id": (id + 50).to_string(),
                            "type": 1,
                            "recipients": [{"id": id.to_string()}]
                        }),
                    )
                    .await
                    .unwrap();
                cache
                    .update_cache(
                        "GUILD_MEMBER_ADD",
                        shard,
                        &json!({"guild_id": "99", "user": user(id, "same"), "roles": []}),
                    )
                    .await
                    .unwrap();
            }

            assert_eq!(cache.users().len(), 3, "{}", topology);
            assert_eq!(cache.dm_channels().len(), 3, "{}", topology);
            assert_eq!(cache.dm_channel(2).map(|c| c.id), Some(52), "{}", topology);
            assert_eq!(cache.users().find_by_name("same", false).len(), 3, "{}", topology);
            assert_eq!(cache.members(99).len(), 3, "{}", topology);
        }
    }
}

// =============================================================================
// Partition isolation
// =============================================================================

mod isolation_tests {
    use super::*;

    #[tokio::test]
    async fn test_writes_stay_in_their_guild() {
        let cache = MemoryEntityCache::new(CacheOptions::default()).unwrap();
        for (guild_id, user_id, name) in [("1", 7, "a"), ("2", 8, "b")] {
            cache
                .update_cache(
                    "GUILD_MEMBER_ADD",
                    0,
                    &json!({"guild_id": guild_id, "user": user(user_id, name), "roles": []}),
                )
                .await
                .unwrap();
        }

        assert!(cache.member(2, 7).is_none());
        assert!(cache.members(2).get(7).is_none());
        assert_eq!(cache.members(1).len(), 1);
        assert_eq!(
            cache.all_members().count(|m| m.guild_id != 1 && m.user_id == 7),
            0
        );
        assert_eq!(cache.all_members().len(), 2);
    }

    #[tokio::test]
    async fn test_views_are_live() {
        let cache = MemoryEntityCache::new(CacheOptions::default()).unwrap();
        let all = cache.all_roles();
        assert!(all.is_empty());

        cache
            .update_cache(
                "GUILD_ROLE_CREATE",
                0,
                &json!({"guild_id": "4", "role": {"id": "40", "name": "mods", "position": 3}}),
            )
            .await
            .unwrap();
        let roles = cache.roles(4);
        assert_eq!(all.len(), 1);

        cache
            .update_cache(
                "GUILD_ROLE_UPDATE",
                0,
                &json!({"guild_id": "4", "role": {"id": "41", "name": "admins", "position": 9}}),
            )
            .await
            .unwrap();
        assert_eq!(roles.len(), 2);
        assert_eq!(all.max_by(|a, b| a.position.cmp(&b.position)).map(|r| r.id), Some(41));
        assert_eq!(roles.snapshot().len(), 2);
    }
}

// =============================================================================
// Deletes
// =============================================================================

mod delete_tests {
    use super::*;

    #[tokio::test]
    async fn test_guild_channel_delete() {
        let cache = MemoryEntityCache::new(CacheOptions::default()).unwrap();
        cache
            .update_cache("GUILD_CREATE", 0, &guild(1000, 0, &[]))
            .await
            .unwrap();
        cache
            .update_cache(
                "CHANNEL_CREATE",
                0,
                &json!({"id": "1101", "type": 2, "guild_id": "1000", "name": "voice"}),
            )
            .await
            .unwrap();
        assert_eq!(cache.channels(1000).len(), 2);

        cache
            .update_cache(
                "CHANNEL_DELETE",
                0,
                &json!({"id": "1100", "type": 0, "guild_id": "1000", "name": "general"}),
            )
            .await
            .unwrap();
        assert!(cache.channel(1000, 1100).is_none());
        assert!(cache.channel(1000, 1101).is_some());
        assert_eq!(cache.channels(1000).len(), 1);
        assert_eq!(cache.all_channels().len(), 1);
    }

    #[tokio::test]
    async fn test_deletes_in_unknown_guild_create_nothing() {
        let cache = MemoryEntityCache::new(CacheOptions::default()).unwrap();
        let deletes = [
            ("GUILD_ROLE_DELETE", json!({"guild_id": "77", "role_id": "1"})),
            ("GUILD_MEMBER_REMOVE", json!({"guild_id": "77", "user": {"id": "2"}})),
            (
                "CHANNEL_DELETE",
                json!({"id": "3", "type": 0, "guild_id": "77", "name": "gone"}),
            ),
        ];
        for (event, payload) in &deletes {
            cache.update_cache(event, 0, payload).await.unwrap();
        }
        assert_eq!(cache.metrics().events_dropped(), 0);

        // Views of a missing partition are detached, so later writes stay invisible to them
        let roles = cache.roles(77);
        let members = cache.members(77);
        let channels = cache.channels(77);

        cache
            .update_cache(
                "GUILD_ROLE_CREATE",
                0,
                &json!({"guild_id": "77", "role": {"id": "1", "name": "back"}}),
            )
            .await
            .unwrap();
        cache
            .update_cache(
                "GUILD_MEMBER_ADD",
                0,
                &json!({"guild_id": "77", "user": user(2, "back"), "roles": []}),
            )
            .await
            .unwrap();
        cache
            .update_cache(
                "CHANNEL_CREATE",
                0,
                &json!({"id": "3", "type": 0, "guild_id": "77", "name": "back"}),
            )
            .await
            .unwrap();

        assert!(roles.is_empty());
        assert!(members.is_empty());
        assert!(channels.is_empty());
        assert_eq!(cache.roles(77).len(), 1);
        assert_eq!(cache.members(77).len(), 1);
        assert_eq!(cache.channels(77).len(), 1);
    }

    #[tokio::test]
    async fn test_voice_state_without_guild_is_dropped() {
        let cache = MemoryEntityCache::new(CacheOptions::default()).unwrap();
        cache
            .update_cache(
                "VOICE_STATE_UPDATE",
                0,
                &json!({"user_id": "9", "channel_id": "10", "session_id": "s"}),
            )
            .await
            .unwrap();

        assert!(cache.all_voice_states().is_empty());
        assert_eq!(cache.metrics().events_dropped(), 1);

        cache
            .update_cache(
                "VOICE_STATE_UPDATE",
                0,
                &json!({"guild_id": "4", "user_id": "9", "channel_id": "10", "session_id": "s"}),
            )
            .await
            .unwrap();
        assert!(cache.voice_state(4, 9).is_some());
        assert_eq!(cache.metrics().events_dropped(), 1);
    }
}

// =============================================================================
// Bulk loads
// =============================================================================

mod bulk_tests {
    use super::*;

    const GUILD: u64 = 20;

    fn decoder() -> JsonEntityDecoder {
        JsonEntityDecoder
    }

    #[test]
    fn test_bulk_channels() {
        let cache = MemoryEntityCache::new(CacheOptions::default()).unwrap();
        let channels = (1..=3u64)
            .map(|id| {
                decoder()
                    .create_guild_channel(
                        GUILD,
                        &json!({"id": id.to_string(), "type": 0, "name": format!("c{}", id)}),
                    )
                    .unwrap()
            })
            .collect();
        cache.bulk_cache_channels(0, channels);

        assert_eq!(cache.channels(GUILD).len(), 3);
        assert_eq!(cache.channel(GUILD, 2).map(|c| c.name.clone()), Some("c2".into()));
        assert_eq!(cache.channels(GUILD).find_by_name("C3", true).len(), 1);
    }

    #[test]
    fn test_bulk_members() {
        let cache = MemoryEntityCache::new(CacheOptions::default()).unwrap();
        let members = (1..=4u64)
            .map(|id| {
                decoder()
                    .create_member(GUILD, &json!({"user": user(id, "m"), "roles": []}))
                    .unwrap()
            })
            .collect();
        cache.bulk_cache_members(0, members);

        assert_eq!(cache.members(GUILD).len(), 4);
        assert!(cache.member(GUILD, 4).is_some());
        assert!(cache.member(GUILD + 1, 4).is_none());
        // Members alone do not populate the user cache
        assert!(cache.users().is_empty());
    }

    #[test]
    fn test_bulk_emoji_respects_flag() {
        let emoji = |n: u64| {
            (1..=n)
                .map(|id| {
                    decoder()
                        .create_custom_emoji(GUILD, &json!({"id": id.to_string(), "name": "e"}))
                        .unwrap()
                })
                .collect::<Vec<_>>()
        };

        let cache = MemoryEntityCache::new(CacheOptions::default()).unwrap();
        cache.bulk_cache_emoji(0, emoji(2));
        assert_eq!(cache.emojis(GUILD).len(), 2);

        let options = CacheOptions::default().flag(CacheFlag::DropEmoji);
        let cache = MemoryEntityCache::new(options).unwrap();
        cache.bulk_cache_emoji(0, emoji(2));
        assert!(cache.emojis(GUILD).is_empty());
        assert!(cache.all_emojis().is_empty());
    }

    #[test]
    fn test_bulk_presences_respects_flag() {
        let presences = || {
            (1..=3u64)
                .map(|id| {
                    decoder()
                        .create_presence(&json!({"user": {"id": id.to_string()}, "status": "idle"}))
                        .unwrap()
                })
                .collect::<Vec<_>>()
        };

        let cache = MemoryEntityCache::new(CacheOptions::with_shards(2)).unwrap();
        cache.bulk_cache_presences(1, presences());
        assert_eq!(cache.presences().len(), 3);
        assert_eq!(cache.presence(2).map(|p| p.user_id), Some(2));

        let options = CacheOptions::with_shards(2).flag(CacheFlag::DropGameStatuses);
        let cache = MemoryEntityCache::new(options).unwrap();
        cache.bulk_cache_presences(1, presences());
        assert!(cache.presences().is_empty());
    }

    #[test]
    fn test_bulk_voice_states_respects_flag() {
        let states = || {
            vec![
                decoder()
                    .create_voice_state(Some(GUILD), &json!({"user_id": "1", "session_id": "a"}))
                    .unwrap(),
                decoder()
                    .create_voice_state(None, &json!({"user_id": "2", "session_id": "b"}))
                    .unwrap(),
            ]
        };

        let cache = MemoryEntityCache::new(CacheOptions::default()).unwrap();
        cache.bulk_cache_voice_states(0, states());
        assert_eq!(cache.voice_states(GUILD).len(), 1);
        assert!(cache.voice_state(GUILD, 1).is_some());
        assert_eq!(cache.all_voice_states().len(), 1);
        assert_eq!(cache.metrics().events_dropped(), 1);

        let options = CacheOptions::default().flag(CacheFlag::DropVoiceStates);
        let cache = MemoryEntityCache::new(options).unwrap();
        cache.bulk_cache_voice_states(0, states());
        assert!(cache.all_voice_states().is_empty());
    }
}
