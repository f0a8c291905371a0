//! Resource domain: discovery, metadata, content parsing, and the cached registry.

pub mod cache;
pub mod content;
pub mod hash;
pub mod metadata;
pub mod registry;
pub mod scan;

pub use cache::{resolve_state, CacheDecision, RegistryCache, RescanReason, ScanMeta};
pub use content::{
    ContentProvider, MarkdownContentProvider, ResourceContent, SYSTEM_SECTION,
    USER_TEMPLATE_SECTION,
};
pub use metadata::{make_namespace, parse_namespace, ResourceMetadata, ResourceType};
pub use registry::{Availability, LoadSource, RegistrySettings, RegistryState, ResourceRegistry};
pub use scan::ResourceScanner;
