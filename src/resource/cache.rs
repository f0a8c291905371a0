//! Persisted registry snapshot.
//!
//! Two advisory files live under the registry directory: `scan_meta.json` (when the
//! scan ran and what the sources hashed to) and `resources.json` (the full resource
//! list). Missing or corrupt files mean "no cache", never an error.

use crate::error::ApiError;
use crate::resource::metadata::ResourceMetadata;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

pub const SCAN_META_FILE: &str = "scan_meta.json";
pub const RESOURCES_FILE: &str = "resources.json";

/// Bumped whenever the snapshot layout changes; older snapshots are ignored.
pub const CACHE_FORMAT_VERSION: u32 = 1;

/// Scan metadata half of the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanMeta {
    pub version: u32,
    pub scanned_at: DateTime<Utc>,
    /// Hex-encoded content hash of the scanned sources
    pub content_hash: String,
    pub resource_count: usize,
}

/// A complete cache entry as read from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub meta: ScanMeta,
    pub resources: Vec<ResourceMetadata>,
}

/// Why a rescan is needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RescanReason {
    Forced,
    Absent,
    VersionMismatch,
    HashMismatch,
    Expired,
}

/// Outcome of the cache validity check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheDecision {
    UseCache,
    Rescan(RescanReason),
}

/// Decide between the cached snapshot and a rescan.
///
/// Pure: callers supply the cache metadata they read, the current time and the
/// freshly computed hash of the sources.
pub fn resolve_state(
    cache: Option<&ScanMeta>,
    now: DateTime<Utc>,
    current_hash: &str,
    ttl: Duration,
) -> CacheDecision {
    let Some(meta) = cache else {
        return CacheDecision::Rescan(RescanReason::Absent);
    };
    if meta.version != CACHE_FORMAT_VERSION {
        return CacheDecision::Rescan(RescanReason::VersionMismatch);
    }
    if meta.content_hash != current_hash {
        return CacheDecision::Rescan(RescanReason::HashMismatch);
    }
    // A timestamp in the future counts as expired.
    let age = now.signed_duration_since(meta.scanned_at);
    match age.to_std() {
        Ok(age) if age < ttl => CacheDecision::UseCache,
        _ => CacheDecision::Rescan(RescanReason::Expired),
    }
}

/// Filesystem side of the registry cache.
#[derive(Debug, Clone)]
pub struct RegistryCache {
    dir: PathBuf,
}

impl RegistryCache {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn meta_path(&self) -> PathBuf {
        self.dir.join(SCAN_META_FILE)
    }

    pub fn resources_path(&self) -> PathBuf {
        self.dir.join(RESOURCES_FILE)
    }

    /// Read the scan metadata. Any failure reads as absent.
    pub fn read_meta(&self) -> Option<ScanMeta> {
        read_json(&self.meta_path())
    }

    /// Read the resource snapshot. Any failure reads as absent.
    pub fn read_resources(&self, meta: &ScanMeta) -> Option<Vec<ResourceMetadata>> {
        let resources: Vec<ResourceMetadata> = read_json(&self.resources_path())?;
        if resources.len() != meta.resource_count {
            warn!(
                expected = meta.resource_count,
                found = resources.len(),
                "Registry snapshot does not match scan metadata, ignoring cache"
            );
            return None;
        }
        Some(resources)
    }

    /// Read both halves together.
    pub fn read(&self) -> Option<CacheEntry> {
        let meta = self.read_meta()?;
        let resources = self.read_resources(&meta)?;
        Some(CacheEntry { meta, resources })
    }

    /// Persist a fresh scan. The snapshot is written before the metadata so a
    /// crash between the two leaves metadata pointing at the old count, which
    /// `read_resources` rejects.
    pub fn write(&self, meta: &ScanMeta, resources: &[ResourceMetadata]) -> Result<(), ApiError> {
        std::fs::create_dir_all(&self.dir)?;
        write_json_atomic(&self.resources_path(), &resources)?;
        write_json_atomic(&self.meta_path(), meta)?;
        debug!(dir = %self.dir.display(), count = resources.len(), "Wrote registry cache");
        Ok(())
    }

    /// Delete both cache files. Already-missing files are fine.
    pub fn invalidate(&self) -> Result<(), ApiError> {
        for path in [self.meta_path(), self.resources_path()] {
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Option<T> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Unreadable registry cache file");
            return None;
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Corrupt registry cache file");
            None
        }
    }
}

fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), ApiError> {
    let tmp = path.with_extension("json.tmp");
    let bytes = serde_json::to_vec_pretty(value)?;
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
