//! Resource identity and metadata.

use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Resource kind. Every resource behaves the same once wrapped by an executor,
/// but the kind decides which executor is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Skill,
    Agent,
    Command,
    Prompt,
    Backend,
}

impl ResourceType {
    pub const ALL: [ResourceType; 5] = [
        ResourceType::Skill,
        ResourceType::Agent,
        ResourceType::Command,
        ResourceType::Prompt,
        ResourceType::Backend,
    ];

    /// Namespace prefix, e.g. `skill` in `skill:codegen`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Skill => "skill",
            ResourceType::Agent => "agent",
            ResourceType::Command => "command",
            ResourceType::Prompt => "prompt",
            ResourceType::Backend => "backend",
        }
    }

    /// Directory name under a source root holding resources of this kind.
    pub fn dir_name(&self) -> &'static str {
        match self {
            ResourceType::Skill => "skills",
            ResourceType::Agent => "agents",
            ResourceType::Command => "commands",
            ResourceType::Prompt => "prompts",
            ResourceType::Backend => "backends",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skill" | "skills" => Ok(ResourceType::Skill),
            "agent" | "agents" => Ok(ResourceType::Agent),
            "command" | "commands" => Ok(ResourceType::Command),
            "prompt" | "prompts" => Ok(ResourceType::Prompt),
            "backend" | "backends" => Ok(ResourceType::Backend),
            other => Err(ApiError::InvalidNamespace(format!(
                "Unknown resource type '{}'. Must be skill, agent, command, prompt, or backend",
                other
            ))),
        }
    }
}

/// Build the namespace string for a resource.
pub fn make_namespace(resource_type: ResourceType, name: &str) -> String {
    format!("{}:{}", resource_type.as_str(), name)
}

/// Split `"<type>:<name>"` into its parts.
pub fn parse_namespace(namespace: &str) -> Result<(ResourceType, &str), ApiError> {
    let (kind, name) = namespace
        .split_once(':')
        .ok_or_else(|| ApiError::InvalidNamespace(namespace.to_string()))?;
    if name.is_empty() {
        return Err(ApiError::InvalidNamespace(namespace.to_string()));
    }
    Ok((kind.parse()?, name))
}

/// Registered resource metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceMetadata {
    /// Unique `"<type>:<name>"` key
    pub namespace: String,
    pub name: String,
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    pub enabled: bool,
    /// Higher wins ties during candidate ranking
    #[serde(default)]
    pub priority: i64,
    /// Namespaces that must exist and be enabled for this resource to be available
    #[serde(default)]
    pub dependencies: BTreeSet<String>,
    /// Opaque locator handed to the content provider
    pub source_path: PathBuf,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub description: String,
    /// Backend declared by the resource itself
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
}

impl ResourceMetadata {
    pub fn new(resource_type: ResourceType, name: &str, source_path: PathBuf) -> Self {
        Self {
            namespace: make_namespace(resource_type, name),
            name: name.to_string(),
            resource_type,
            enabled: true,
            priority: 0,
            dependencies: BTreeSet::new(),
            source_path,
            tags: Vec::new(),
            description: String::new(),
            backend: None,
        }
    }
}
