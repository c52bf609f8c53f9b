//! Gateway Event Replay
//!
//! Feeds a recorded gateway session into a [`MemoryEntityCache`] and reports
//! what ended up cached.
//!
//! # Input
//!
//! Newline-delimited JSON, one dispatch per line:
//!
//! ```text
//! {"t": "GUILD_CREATE", "shard": 0, "d": { ... }}
//! {"t": "PRESENCE_UPDATE", "shard": 1, "d": { ... }}
//! ```

use anyhow::Context;
use clap::Parser;
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use guildcache::{
    CacheOptions, CacheView, EntityCache, EntityCacheWorker, MemoryEntityCache, Topology,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Replay recorded gateway events into an in-memory entity cache
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Newline-delimited JSON event log
    events: PathBuf,

    /// YAML file with cache options
    #[arg(long, env = "GUILDCACHE_CONFIG")]
    config: Option<PathBuf>,

    /// Override the shard count from the config file
    #[arg(long, env = "GUILDCACHE_SHARDS")]
    shards: Option<u32>,

    /// Override the topology (split, unified)
    #[arg(long, env = "GUILDCACHE_TOPOLOGY")]
    topology: Option<Topology>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

/// One recorded dispatch
#[derive(Debug, Deserialize)]
struct Envelope {
    t: String,
    #[serde(default)]
    shard: u32,
    #[serde(default)]
    d: Value,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(&args)?;

    let mut options = match &args.config {
        Some(path) => CacheOptions::from_yaml_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => CacheOptions::default(),
    };
    if let Some(shards) = args.shards {
        options.shard_count = shards;
    }
    if let Some(topology) = args.topology {
        options.topology = topology;
    }

    info!("Starting gateway replay");
    info!("  Events: {}", args.events.display());
    info!("  Shards: {}", options.shard_count);
    info!("  Topology: {}", options.topology);

    let cache = MemoryEntityCache::new(options)?;

    let file = File::open(&args.events)
        .await
        .with_context(|| format!("opening {}", args.events.display()))?;
    let mut lines = BufReader::new(file).lines();

    let mut line_no = 0u64;
    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        let envelope: Envelope = match serde_json::from_str(&line) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Skipping line {}: {}", line_no, e);
                continue;
            }
        };
        cache
            .update_cache(&envelope.t, envelope.shard, &envelope.d)
            .await?;
    }

    report(&cache);
    Ok(())
}

fn report(cache: &MemoryEntityCache) {
    info!("Replay complete");
    info!("  Guilds: {}", cache.guilds().len());
    info!("  Users: {}", cache.users().len());
    info!("  Presences: {}", cache.presences().len());
    info!("  Members: {}", cache.all_members().len());
    info!("  Roles: {}", cache.all_roles().len());
    info!("  Channels: {}", cache.all_channels().len());
    info!("  DM channels: {}", cache.dm_channels().len());
    info!("  Emoji: {}", cache.all_emojis().len());
    info!("  Voice states: {}", cache.all_voice_states().len());

    let metrics = cache.metrics().snapshot();
    match serde_json::to_string(&metrics) {
        Ok(json) => info!("  Metrics: {}", json),
        Err(e) => warn!("Could not serialize metrics: {}", e),
    }
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) -> anyhow::Result<()> {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(level.into())
        .add_directive("tokio=warn".parse()?);

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
    Ok(())
}
