//! Built-in defaults, the lowest layer of every merge.

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError};

pub const DEFAULT_BACKEND: &str = "echo";
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;
pub const DEFAULT_MAX_WORKERS: i64 = 4;
pub const DEFAULT_MAX_CANDIDATES: i64 = 5;
pub const DEFAULT_MIN_SCORE: f64 = 0.1;

/// Builder seeded with the defaults later layers override key by key.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    config::Config::builder()
        .set_default("default_backend", DEFAULT_BACKEND)?
        .set_default("registry.cache_ttl_secs", DEFAULT_CACHE_TTL_SECS)?
        .set_default("scheduler.max_workers", DEFAULT_MAX_WORKERS)?
        .set_default("scheduler.skip_dependents_of_failed", true)?
        .set_default("intent.max_candidates", DEFAULT_MAX_CANDIDATES)?
        .set_default("intent.min_score", DEFAULT_MIN_SCORE)
}
