//! Guildcache - In-Memory Entity Cache for Sharded Chat Gateways
//!
//! Keeps guilds, users, members, roles, channels, emoji, voice states and
//! presences in memory as gateway events arrive, and answers synchronous
//! lookups and live, non-copying views over them.
//!
//! # Architecture
//!
//! ```text
//! gateway events ──► cache (update protocol) ──► view (partitions) ──► callers
//!                         │
//!                         └── entity (EntityDecoder turns payloads into entities)
//! ```
//!
//! # Modules
//!
//! - [`cache`] - Read/write cache contracts, the in-memory and no-op caches
//! - [`config`] - Cache options, topology and cache flags
//! - [`entity`] - Cached entity types and the payload decoder
//! - [`error`] - Error types
//! - [`snowflake`] - ID parsing and shard hashing
//! - [`view`] - Primitive-keyed table and the cache view family

pub mod cache;
pub mod config;
pub mod entity;
pub mod error;
pub mod snowflake;
pub mod view;

// Re-export commonly used types
pub use cache::{EntityCache, EntityCacheExt, EntityCacheWorker, MemoryEntityCache, NoopEntityCache};
pub use config::{CacheFlag, CacheOptions, Topology};
pub use entity::{EntityDecoder, JsonEntityDecoder};
pub use error::{CacheError, Result};
pub use view::{CacheView, CacheViewExt, NamedCacheView, NamedCacheViewExt};
