//! Request normalization and prompt rendering.

use std::collections::BTreeMap;

/// Prefix marking a structured request payload.
pub const REQUEST_MARKER: &str = "request:";

/// Reduce raw input to the request text.
///
/// - `request: <text>` yields `<text>`
/// - `/<name> <rest>` yields `<rest>`
/// - anything else is returned as-is
pub fn normalize_input(raw: &str) -> String {
    let trimmed = raw.trim_start();
    if let Some(rest) = trimmed.strip_prefix(REQUEST_MARKER) {
        return rest.trim().to_string();
    }
    if let Some(invocation) = trimmed.strip_prefix('/') {
        return match invocation.split_once(char::is_whitespace) {
            Some((_, rest)) => rest.trim().to_string(),
            None => String::new(),
        };
    }
    raw.to_string()
}

/// Name of the slash command at the start of `raw`, if any.
pub fn slash_command(raw: &str) -> Option<&str> {
    let invocation = raw.trim_start().strip_prefix('/')?;
    let name = invocation
        .split(char::is_whitespace)
        .next()
        .unwrap_or_default();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

fn is_placeholder_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Placeholder opening `tail` (which starts with `{`): its name and byte length.
fn placeholder_at(tail: &str) -> Option<(&str, usize)> {
    if let Some(inner) = tail.strip_prefix("{{") {
        let close = inner.find("}}")?;
        let name = inner[..close].trim();
        return is_placeholder_name(name).then_some((name, close + 4));
    }
    let close = tail[1..].find('}')?;
    let name = &tail[1..1 + close];
    is_placeholder_name(name).then_some((name, close + 2))
}

/// True when `template` references any of `names` in either placeholder syntax.
pub fn mentions_any(template: &str, names: &[&str]) -> bool {
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        let tail = &rest[open..];
        if let Some((name, _)) = placeholder_at(tail) {
            if names.contains(&name) {
                return true;
            }
        }
        rest = &tail[1..];
    }
    false
}

/// Substitute `{{name}}` and `{name}` placeholders.
///
/// Names absent from `vars` and braces that do not form a placeholder are kept verbatim.
pub fn render(template: &str, vars: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];

        if let Some((name, len)) = placeholder_at(tail) {
            if let Some(value) = vars.get(name) {
                out.push_str(value);
                rest = &tail[len..];
                continue;
            }
        }

        out.push('{');
        rest = &tail[1..];
    }
    out.push_str(rest);
    out
}

/// System text, a blank line, then the user text. Either part may be missing.
pub fn compose(system: Option<&str>, user: &str) -> String {
    match system.map(str::trim).filter(|s| !s.is_empty()) {
        Some(system) if user.trim().is_empty() => system.to_string(),
        Some(system) => format!("{}\n\n{}", system, user),
        None => user.to_string(),
    }
}
