//! Resource content: metadata block plus named text sections.
//!
//! The core only needs the parsed shape. `MarkdownContentProvider` is the default
//! reader: an optional leading `---` YAML block followed by heading-delimited sections.

use crate::error::ApiError;
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// Section holding system instructions.
pub const SYSTEM_SECTION: &str = "System Prompt";
/// Section holding the user request template.
pub const USER_TEMPLATE_SECTION: &str = "User Prompt Template";
/// Pseudo-section for text before the first heading.
pub const BODY_SECTION: &str = "body";

/// Parsed resource content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceContent {
    pub metadata: BTreeMap<String, String>,
    /// Sections in document order
    pub sections: Vec<(String, String)>,
}

impl ResourceContent {
    /// Section text by exact name.
    pub fn section(&self, name: &str) -> Option<&str> {
        self.sections
            .iter()
            .find(|(section, _)| section == name)
            .map(|(_, text)| text.as_str())
            .filter(|text| !text.trim().is_empty())
    }

    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    /// Comma-separated metadata value split into trimmed items.
    pub fn meta_list(&self, key: &str) -> Vec<String> {
        self.meta(key)
            .map(|value| {
                value
                    .split(',')
                    .map(|item| item.trim().to_string())
                    .filter(|item| !item.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Loads and parses a resource's backing content.
pub trait ContentProvider: Send + Sync {
    fn load(&self, source_path: &Path) -> Result<ResourceContent, ApiError>;
}

/// Markdown-with-front-matter reader.
#[derive(Debug, Default, Clone)]
pub struct MarkdownContentProvider;

impl MarkdownContentProvider {
    pub fn new() -> Self {
        Self
    }

    /// Parse descriptor text. `origin` is only used in error messages.
    pub fn parse(text: &str, origin: &str) -> Result<ResourceContent, ApiError> {
        if text.trim().is_empty() {
            return Err(ApiError::ContentParse {
                path: origin.to_string(),
                reason: "descriptor is empty".to_string(),
            });
        }

        let (metadata, rest) = split_front_matter(text, origin)?;
        let sections = split_sections(rest);

        Ok(ResourceContent { metadata, sections })
    }
}

impl ContentProvider for MarkdownContentProvider {
    fn load(&self, source_path: &Path) -> Result<ResourceContent, ApiError> {
        let text = std::fs::read_to_string(source_path).map_err(|e| ApiError::ContentParse {
            path: source_path.display().to_string(),
            reason: format!("failed to read descriptor: {}", e),
        })?;
        Self::parse(&text, &source_path.display().to_string())
    }
}

fn split_front_matter<'a>(
    text: &'a str,
    origin: &str,
) -> Result<(BTreeMap<String, String>, &'a str), ApiError> {
    let trimmed = text.trim_start_matches('\u{feff}');
    let Some(after_open) = trimmed
        .strip_prefix("---\n")
        .or_else(|| trimmed.strip_prefix("---\r\n"))
    else {
        return Ok((BTreeMap::new(), trimmed));
    };

    let mut offset = 0;
    let mut close = None;
    for line in after_open.split_inclusive('\n') {
        if line.trim_end() == "---" {
            close = Some((offset, offset + line.len()));
            break;
        }
        offset += line.len();
    }
    let (yaml_end, body_start) = close.ok_or_else(|| ApiError::ContentParse {
        path: origin.to_string(),
        reason: "front matter block is not terminated".to_string(),
    })?;

    let yaml = &after_open[..yaml_end];
    let value: Value = if yaml.trim().is_empty() {
        Value::Null
    } else {
        serde_yaml::from_str(yaml).map_err(|e| ApiError::ContentParse {
            path: origin.to_string(),
            reason: format!("invalid front matter: {}", e),
        })?
    };

    let mut metadata = BTreeMap::new();
    match value {
        Value::Null => {}
        Value::Mapping(map) => {
            for (key, value) in map {
                let Some(key) = scalar_to_string(&key) else {
                    continue;
                };
                metadata.insert(key, flatten_value(&value));
            }
        }
        _ => {
            return Err(ApiError::ContentParse {
                path: origin.to_string(),
                reason: "front matter must be a key/value mapping".to_string(),
            })
        }
    }

    Ok((metadata, &after_open[body_start..]))
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn flatten_value(value: &Value) -> String {
    match value {
        Value::Sequence(items) => items
            .iter()
            .filter_map(scalar_to_string)
            .collect::<Vec<_>>()
            .join(","),
        Value::Null => String::new(),
        other => scalar_to_string(other).unwrap_or_default(),
    }
}

fn heading_name(line: &str) -> Option<&str> {
    let hashes = line.bytes().take_while(|b| *b == b'#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let rest = &line[hashes..];
    if !rest.starts_with(' ') {
        return None;
    }
    let name = rest.trim();
    (!name.is_empty()).then_some(name)
}

fn split_sections(text: &str) -> Vec<(String, String)> {
    let mut sections = Vec::new();
    let mut current = BODY_SECTION.to_string();
    let mut buffer = String::new();
    let mut in_fence = false;

    for line in text.lines() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
        }
        if !in_fence {
            if let Some(name) = heading_name(line) {
                push_section(&mut sections, &current, &buffer);
                current = name.to_string();
                buffer.clear();
                continue;
            }
        }
        buffer.push_str(line);
        buffer.push('\n');
    }
    push_section(&mut sections, &current, &buffer);
    sections
}

fn push_section(sections: &mut Vec<(String, String)>, name: &str, buffer: &str) {
    let text = buffer.trim();
    if name == BODY_SECTION && text.is_empty() {
        return;
    }
    sections.push((name.to_string(), text.to_string()));
}
