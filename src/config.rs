//! Cache configuration

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::error::{CacheError, Result};

/// Storage topology for entities partitioned across shards
/// (users, presences, DM channels).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    /// One partition per shard: writes never contend across shards, reads
    /// probe every shard partition
    #[default]
    Split,
    /// One shared partition per entity kind
    Unified,
}

impl std::fmt::Display for Topology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Topology::Split => write!(f, "split"),
            Topology::Unified => write!(f, "unified"),
        }
    }
}

impl std::str::FromStr for Topology {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "split" => Ok(Topology::Split),
            "unified" => Ok(Topology::Unified),
            other => Err(CacheError::Config(format!("unknown topology '{}'", other))),
        }
    }
}

/// Entity kinds the cache can be told not to store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheFlag {
    /// Skip custom emoji
    DropEmoji,
    /// Skip voice states
    DropVoiceStates,
    /// Skip presences (users are still refreshed)
    DropGameStatuses,
}

/// Cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheOptions {
    /// Number of gateway shards, used to hash IDs to shards
    pub shard_count: u32,
    /// Partitioning of users, presences and DM channels
    pub topology: Topology,
    /// Whether the gateway requests member chunks for large guilds
    pub chunk_members: bool,
    /// Entity kinds not to cache
    pub cache_flags: HashSet<CacheFlag>,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            shard_count: 1,
            topology: Topology::Split,
            chunk_members: true,
            cache_flags: HashSet::new(),
        }
    }
}

impl CacheOptions {
    /// Options for `shard_count` shards, everything else default
    pub fn with_shards(shard_count: u32) -> Self {
        Self {
            shard_count,
            ..Default::default()
        }
    }

    /// Set the topology
    pub fn topology(mut self, topology: Topology) -> Self {
        self.topology = topology;
        self
    }

    /// Set member chunking
    pub fn chunk_members(mut self, chunk_members: bool) -> Self {
        self.chunk_members = chunk_members;
        self
    }

    /// Add a cache flag
    pub fn flag(mut self, flag: CacheFlag) -> Self {
        self.cache_flags.insert(flag);
        self
    }

    /// Check whether a flag is set
    pub fn has_flag(&self, flag: CacheFlag) -> bool {
        self.cache_flags.contains(&flag)
    }

    /// Reject configurations the cache cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.shard_count == 0 {
            return Err(CacheError::Config("shard_count must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Load options from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let options: CacheOptions = serde_yaml::from_str(&raw)?;
        options.validate()?;
        Ok(options)
    }
}

// =============================================================================
// Tests
// =============================================================================
