//! Resource registry: in-memory map rebuilt from a scan or restored from cache.

use crate::error::ApiError;
use crate::resource::cache::{
    resolve_state, CacheDecision, RegistryCache, RescanReason, ScanMeta, CACHE_FORMAT_VERSION,
};
use crate::resource::content::ContentProvider;
use crate::resource::hash::compute_sources_hash;
use crate::resource::metadata::{ResourceMetadata, ResourceType};
use crate::resource::scan::ResourceScanner;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Where the current in-memory map came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadSource {
    Cache,
    Scan,
}

/// Summary of the last `load`.
#[derive(Debug, Clone, Serialize)]
pub struct RegistryState {
    pub source: LoadSource,
    pub content_hash: String,
    pub scanned_at: DateTime<Utc>,
    pub resource_count: usize,
    pub enabled_count: usize,
    pub load_ms: u128,
}

/// Availability of a namespace for execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    Available,
    Missing,
    Disabled,
    /// A declared dependency is missing or disabled
    UnsatisfiedDependency(String),
}

impl Availability {
    pub fn is_available(&self) -> bool {
        matches!(self, Availability::Available)
    }

    /// Human-readable reason, `None` when available.
    pub fn reason(&self, namespace: &str) -> Option<String> {
        match self {
            Availability::Available => None,
            Availability::Missing => Some(format!("resource '{}' is not registered", namespace)),
            Availability::Disabled => Some(format!("resource '{}' is disabled", namespace)),
            Availability::UnsatisfiedDependency(dep) => Some(format!(
                "resource '{}' depends on '{}', which is missing or disabled",
                namespace, dep
            )),
        }
    }
}

/// Registry settings resolved from configuration.
#[derive(Debug, Clone)]
pub struct RegistrySettings {
    pub sources: Vec<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    pub cache_ttl: Duration,
}

/// Resource registry
///
/// Holds the in-memory aggregate; scanning and persistence are delegated to the
/// scanner and cache. Shared by reference across every component that needs it.
pub struct ResourceRegistry {
    scanner: ResourceScanner,
    cache: Option<RegistryCache>,
    cache_ttl: Duration,
    resources: RwLock<HashMap<String, ResourceMetadata>>,
    state: RwLock<Option<RegistryState>>,
    scan_count: AtomicUsize,
}

impl ResourceRegistry {
    /// Create an empty registry. Nothing is loaded until `load` is called.
    pub fn new(settings: RegistrySettings, provider: Arc<dyn ContentProvider>) -> Self {
        Self {
            scanner: ResourceScanner::new(settings.sources, provider),
            cache: settings.cache_dir.map(RegistryCache::new),
            cache_ttl: settings.cache_ttl,
            resources: RwLock::new(HashMap::new()),
            state: RwLock::new(None),
            scan_count: AtomicUsize::new(0),
        }
    }

    /// Registry with a fixed resource set and no sources or cache.
    pub fn from_resources(
        resources: Vec<ResourceMetadata>,
        provider: Arc<dyn ContentProvider>,
    ) -> Self {
        let registry = Self::new(
            RegistrySettings {
                sources: Vec::new(),
                cache_dir: None,
                cache_ttl: Duration::ZERO,
            },
            provider,
        );
        for resource in resources {
            registry.register(resource);
        }
        registry
    }

    /// Load the registry, from cache when valid unless `force_rescan`.
    pub fn load(&self, force_rescan: bool) -> Result<RegistryState, ApiError> {
        let started = Instant::now();
        let current_hash = hex::encode(compute_sources_hash(self.scanner.roots()));

        let decision = if force_rescan {
            CacheDecision::Rescan(RescanReason::Forced)
        } else {
            match &self.cache {
                Some(cache) => {
                    resolve_state(cache.read_meta().as_ref(), Utc::now(), &current_hash, self.cache_ttl)
                }
                None => CacheDecision::Rescan(RescanReason::Absent),
            }
        };

        if decision == CacheDecision::UseCache {
            if let Some(entry) = self.cache.as_ref().and_then(|cache| cache.read()) {
                let state = self.install(
                    entry.resources,
                    LoadSource::Cache,
                    entry.meta.content_hash,
                    entry.meta.scanned_at,
                    started,
                );
                info!(
                    resources = state.resource_count,
                    load_ms = state.load_ms,
                    "Registry restored from cache"
                );
                return Ok(state);
            }
            debug!("Cache metadata valid but snapshot unreadable, rescanning");
        } else {
            debug!(decision = ?decision, "Registry cache not usable");
        }

        self.rescan(current_hash, started)
    }

    fn rescan(&self, content_hash: String, started: Instant) -> Result<RegistryState, ApiError> {
        let resources = self.scanner.scan()?;
        self.scan_count.fetch_add(1, Ordering::SeqCst);
        let scanned_at = Utc::now();

        if let Some(cache) = &self.cache {
            let meta = ScanMeta {
                version: CACHE_FORMAT_VERSION,
                scanned_at,
                content_hash: content_hash.clone(),
                resource_count: resources.len(),
            };
            if let Err(e) = cache.write(&meta, &resources) {
                warn!(error = %e, "Failed to persist registry cache");
            }
        }

        let state = self.install(resources, LoadSource::Scan, content_hash, scanned_at, started);
        info!(
            resources = state.resource_count,
            enabled = state.enabled_count,
            load_ms = state.load_ms,
            "Registry rebuilt from scan"
        );
        Ok(state)
    }

    fn install(
        &self,
        resources: Vec<ResourceMetadata>,
        source: LoadSource,
        content_hash: String,
        scanned_at: DateTime<Utc>,
        started: Instant,
    ) -> RegistryState {
        let map: HashMap<String, ResourceMetadata> = resources
            .into_iter()
            .map(|resource| (resource.namespace.clone(), resource))
            .collect();
        let enabled_count = map.values().filter(|r| r.enabled).count();
        let resource_count = map.len();
        *self.resources.write() = map;

        let state = RegistryState {
            source,
            content_hash,
            scanned_at,
            resource_count,
            enabled_count,
            load_ms: started.elapsed().as_millis(),
        };
        *self.state.write() = Some(state.clone());
        state
    }

    /// Delete the persisted cache. The in-memory map is left as is.
    pub fn invalidate(&self) -> Result<(), ApiError> {
        if let Some(cache) = &self.cache {
            cache.invalidate()?;
            info!(dir = %cache.dir().display(), "Registry cache invalidated");
        }
        Ok(())
    }

    /// Register or replace a resource in memory.
    pub fn register(&self, resource: ResourceMetadata) {
        self.resources
            .write()
            .insert(resource.namespace.clone(), resource);
    }

    pub fn exists(&self, namespace: &str) -> bool {
        self.resources.read().contains_key(namespace)
    }

    pub fn get(&self, namespace: &str) -> Option<ResourceMetadata> {
        self.resources.read().get(namespace).cloned()
    }

    /// Get a resource or return an error
    pub fn get_or_error(&self, namespace: &str) -> Result<ResourceMetadata, ApiError> {
        self.get(namespace)
            .ok_or_else(|| ApiError::ResourceNotFound(namespace.to_string()))
    }

    /// Resources of one type, sorted by namespace.
    pub fn list_by_type(
        &self,
        resource_type: ResourceType,
        enabled_only: bool,
    ) -> Vec<ResourceMetadata> {
        let mut resources: Vec<_> = self
            .resources
            .read()
            .values()
            .filter(|r| r.resource_type == resource_type && (!enabled_only || r.enabled))
            .cloned()
            .collect();
        resources.sort_by(|a, b| a.namespace.cmp(&b.namespace));
        resources
    }

    /// Every resource, sorted by namespace.
    pub fn list_all(&self) -> Vec<ResourceMetadata> {
        let mut resources: Vec<_> = self.resources.read().values().cloned().collect();
        resources.sort_by(|a, b| a.namespace.cmp(&b.namespace));
        resources
    }

    pub fn len(&self) -> usize {
        self.resources.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.read().is_empty()
    }

    /// Check existence, enablement and declared dependencies in one read.
    pub fn availability(&self, namespace: &str) -> Availability {
        let resources = self.resources.read();
        let Some(resource) = resources.get(namespace) else {
            return Availability::Missing;
        };
        if !resource.enabled {
            return Availability::Disabled;
        }
        for dependency in &resource.dependencies {
            let satisfied = resources.get(dependency).map(|d| d.enabled).unwrap_or(false);
            if !satisfied {
                return Availability::UnsatisfiedDependency(dependency.clone());
            }
        }
        Availability::Available
    }

    pub fn is_available(&self, namespace: &str) -> bool {
        self.availability(namespace).is_available()
    }

    /// Number of full scans performed by this instance.
    pub fn scan_count(&self) -> usize {
        self.scan_count.load(Ordering::SeqCst)
    }

    /// State of the last `load`, if any.
    pub fn state(&self) -> Option<RegistryState> {
        self.state.read().clone()
    }

    pub fn sources(&self) -> &[PathBuf] {
        self.scanner.roots()
    }

    pub fn cache_dir(&self) -> Option<PathBuf> {
        self.cache.as_ref().map(|cache| cache.dir().to_path_buf())
    }
}
