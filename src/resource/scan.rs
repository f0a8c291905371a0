//! Resource discovery over configured source roots.

use crate::error::ApiError;
use crate::resource::content::ContentProvider;
use crate::resource::metadata::{ResourceMetadata, ResourceType};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Descriptor file name inside a skill directory.
pub const SKILL_FILE: &str = "SKILL.md";
const DESCRIPTOR_EXTENSION: &str = "md";

/// Walks source roots and builds metadata for every descriptor found.
pub struct ResourceScanner {
    roots: Vec<PathBuf>,
    provider: Arc<dyn ContentProvider>,
}

impl ResourceScanner {
    pub fn new(roots: Vec<PathBuf>, provider: Arc<dyn ContentProvider>) -> Self {
        Self { roots, provider }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Scan all roots in order. The first root to define a namespace wins.
    pub fn scan(&self) -> Result<Vec<ResourceMetadata>, ApiError> {
        let mut seen: HashMap<String, PathBuf> = HashMap::new();
        let mut resources = Vec::new();

        for root in &self.roots {
            if !root.is_dir() {
                warn!(root = %root.display(), "Resource source root not found, skipping");
                continue;
            }
            let root = dunce::canonicalize(root).unwrap_or_else(|_| root.clone());

            for resource_type in ResourceType::ALL {
                let dir = root.join(resource_type.dir_name());
                if !dir.is_dir() {
                    continue;
                }
                for (name, path) in discover_descriptors(&dir, resource_type)? {
                    let metadata = self.build_metadata(resource_type, &name, path);
                    if let Some(existing) = seen.get(&metadata.namespace) {
                        warn!(
                            namespace = %metadata.namespace,
                            kept = %existing.display(),
                            ignored = %metadata.source_path.display(),
                            "Duplicate resource namespace, keeping first definition"
                        );
                        continue;
                    }
                    seen.insert(metadata.namespace.clone(), metadata.source_path.clone());
                    resources.push(metadata);
                }
            }
        }

        resources.sort_by(|a, b| a.namespace.cmp(&b.namespace));
        debug!(count = resources.len(), "Resource scan finished");
        Ok(resources)
    }

    fn build_metadata(
        &self,
        resource_type: ResourceType,
        fallback_name: &str,
        path: PathBuf,
    ) -> ResourceMetadata {
        let content = match self.provider.load(&path) {
            Ok(content) => content,
            Err(e) => {
                // Still registered: executing it will report the parse failure.
                warn!(path = %path.display(), error = %e, "Failed to read resource metadata");
                return ResourceMetadata::new(resource_type, fallback_name, path);
            }
        };

        let name = content.meta("name").unwrap_or(fallback_name).trim().to_string();
        let mut metadata = ResourceMetadata::new(resource_type, &name, path);
        metadata.description = content.meta("description").unwrap_or_default().to_string();
        metadata.tags = content.meta_list("tags");
        metadata.dependencies = content.meta_list("dependencies").into_iter().collect();
        metadata.backend = content.meta("backend").map(str::to_string);
        if let Some(enabled) = content.meta("enabled") {
            metadata.enabled = !matches!(
                enabled.trim().to_ascii_lowercase().as_str(),
                "false" | "no" | "0" | "off"
            );
        }
        if let Some(priority) = content.meta("priority") {
            match priority.trim().parse::<i64>() {
                Ok(value) => metadata.priority = value,
                Err(_) => warn!(
                    namespace = %metadata.namespace,
                    value = %priority,
                    "Ignoring non-integer priority"
                ),
            }
        }
        metadata
    }
}

/// List `(name, descriptor path)` pairs in one type directory.
fn discover_descriptors(
    dir: &Path,
    resource_type: ResourceType,
) -> Result<Vec<(String, PathBuf)>, ApiError> {
    let mut found = Vec::new();
    let mut entries: Vec<_> = std::fs::read_dir(dir)?.collect::<Result<_, _>>()?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let path = entry.path();
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
            continue;
        };
        if stem.starts_with('.') {
            continue;
        }

        if path.is_dir() {
            if resource_type == ResourceType::Skill {
                let descriptor = path.join(SKILL_FILE);
                if descriptor.is_file() {
                    let name = path
                        .file_name()
                        .and_then(|s| s.to_str())
                        .unwrap_or(&stem)
                        .to_string();
                    found.push((name, descriptor));
                }
            }
            continue;
        }

        if path.extension().and_then(|e| e.to_str()) == Some(DESCRIPTOR_EXTENSION) {
            found.push((stem, path));
        }
    }

    Ok(found)
}
