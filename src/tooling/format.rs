//! Text rendering for CLI output.

use crate::intent::Intent;
use crate::resource::{Availability, RegistryState, ResourceContent, ResourceMetadata};
use crate::schedule::{BatchResult, TaskResult};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;
use std::collections::BTreeMap;

/// Section heading in bold and underline.
pub fn format_section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

fn status_label(success: bool) -> String {
    if success {
        format!("{}", "ok".green())
    } else {
        format!("{}", "failed".red())
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    let single_line = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if single_line.chars().count() <= max_chars {
        single_line
    } else {
        let cut: String = single_line.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

/// A single routed result: output on success, the error otherwise.
pub fn format_task_result_text(result: &TaskResult) -> String {
    if result.success {
        return result.output.clone();
    }
    let mut out = format!(
        "{} {}",
        status_label(false),
        result.error.as_deref().unwrap_or("unknown error")
    );
    if let Some(namespace) = &result.namespace {
        out.push_str(&format!("\n  resource: {}", namespace));
    }
    out
}

pub fn format_batch_text(batch: &BatchResult) -> String {
    let mut out = format!("{}\n\n", format_section_heading("Batch"));
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Task", "Resource", "Status", "Attempts", "Seconds", "Detail"]);
    for result in &batch.task_results {
        let detail = match (&result.error, result.success) {
            (Some(error), false) => truncate(error, 60),
            _ => truncate(&result.output, 60),
        };
        table.add_row(vec![
            result.task_id.clone().unwrap_or_else(|| "-".to_string()),
            result.namespace.clone().unwrap_or_else(|| "-".to_string()),
            status_label(result.success),
            result.attempts.to_string(),
            format!("{:.2}", result.duration_seconds),
            detail,
        ]);
    }
    out.push_str(&format!("{}\n\n", table));
    out.push_str(&format!(
        "Total: {}  Succeeded: {}  Failed: {}  Waves: {}  Duration: {:.2}s",
        batch.total_tasks,
        batch.successful,
        batch.failed,
        batch.groups,
        batch.total_duration_seconds
    ));
    if batch.cancelled {
        out.push_str(&format!("\n{}", "Batch was cancelled".yellow()));
    }
    out
}

pub fn format_intent_text(intent: &Intent) -> String {
    let mut out = format!("{}\n\n", format_section_heading("Intent"));
    out.push_str(&format!("  Request:    {}\n", intent.raw_request));
    out.push_str(&format!("  Task type:  {}\n", intent.task_type.as_str()));
    out.push_str(&format!("  Complexity: {}\n", intent.complexity.as_str()));
    out.push_str(&format!(
        "  Entity:     {}\n",
        intent.entity.as_deref().unwrap_or("-")
    ));
    out.push_str(&format!(
        "  Parallel:   {} ({})\n",
        if intent.enable_parallel { "yes" } else { "no" },
        intent.parallel_reasoning
    ));
    for subtask in &intent.subtasks {
        out.push_str(&format!("    - {}\n", subtask));
    }

    if intent.candidates.is_empty() {
        out.push_str("\nNo candidate resources.");
        return out;
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Candidate", "Score"]);
    for candidate in &intent.candidates {
        table.add_row(vec![
            candidate.namespace.clone(),
            format!("{:.3}", candidate.score),
        ]);
    }
    out.push_str(&format!("\n{}", table));
    out
}

pub fn format_resource_list_text(resources: &[(ResourceMetadata, Availability)]) -> String {
    if resources.is_empty() {
        return "No resources found.".to_string();
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Namespace", "Priority", "Status", "Description"]);
    for (resource, availability) in resources {
        let status = match availability {
            Availability::Available => format!("{}", "available".green()),
            Availability::Disabled => format!("{}", "disabled".yellow()),
            Availability::Missing => format!("{}", "missing".red()),
            Availability::UnsatisfiedDependency(dep) => {
                format!("{}", format!("needs {}", dep).red())
            }
        };
        table.add_row(vec![
            resource.namespace.clone(),
            resource.priority.to_string(),
            status,
            truncate(&resource.description, 50),
        ]);
    }
    format!("{}\n\nTotal: {} resource(s)", table, resources.len())
}

pub fn format_resource_show_text(
    resource: &ResourceMetadata,
    availability: &Availability,
    content: Option<&ResourceContent>,
) -> String {
    let mut out = format!("{}\n\n", format_section_heading(&resource.namespace));
    out.push_str(&format!("  Type:         {}\n", resource.resource_type));
    out.push_str(&format!("  Source:       {}\n", resource.source_path.display()));
    out.push_str(&format!("  Enabled:      {}\n", resource.enabled));
    out.push_str(&format!("  Priority:     {}\n", resource.priority));
    out.push_str(&format!(
        "  Available:    {}\n",
        availability
            .reason(&resource.namespace)
            .unwrap_or_else(|| "yes".to_string())
    ));
    if let Some(backend) = &resource.backend {
        out.push_str(&format!("  Backend:      {}\n", backend));
    }
    if !resource.tags.is_empty() {
        out.push_str(&format!("  Tags:         {}\n", resource.tags.join(", ")));
    }
    if !resource.dependencies.is_empty() {
        let deps: Vec<&str> = resource.dependencies.iter().map(String::as_str).collect();
        out.push_str(&format!("  Dependencies: {}\n", deps.join(", ")));
    }
    if !resource.description.is_empty() {
        out.push_str(&format!("\n{}\n", resource.description));
    }
    if let Some(content) = content {
        for (name, text) in &content.sections {
            if text.trim().is_empty() {
                continue;
            }
            out.push_str(&format!("\n{}\n{}\n", format_section_heading(name), text.trim()));
        }
    }
    out
}

pub fn format_registry_state_text(state: &RegistryState, scans: usize) -> String {
    let mut out = format!("{}\n\n", format_section_heading("Registry"));
    out.push_str(&format!("  Loaded from:  {:?}\n", state.source));
    out.push_str(&format!(
        "  Content hash: {}...\n",
        &state.content_hash[..state.content_hash.len().min(12)]
    ));
    out.push_str(&format!("  Scanned at:   {}\n", state.scanned_at.to_rfc3339()));
    out.push_str(&format!(
        "  Resources:    {} ({} enabled)\n",
        state.resource_count, state.enabled_count
    ));
    out.push_str(&format!("  Load time:    {} ms\n", state.load_ms));
    out.push_str(&format!("  Scans:        {}", scans));
    out
}

/// Backend names with their health; `None` means usable.
pub fn format_backend_list_text(
    backends: &BTreeMap<String, Option<String>>,
    default_backend: Option<&str>,
) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Backend", "Default", "Status"]);
    for (name, problem) in backends {
        let is_default = default_backend == Some(name.as_str());
        let status = match problem {
            None => format!("{}", "ready".green()),
            Some(reason) => format!("{}", truncate(reason, 60).red()),
        };
        table.add_row(vec![
            name.clone(),
            if is_default { "*".to_string() } else { String::new() },
            status,
        ]);
    }
    format!("{}", table)
}

pub fn format_backend_validation_text(results: &[(String, Result<(), String>)]) -> String {
    if results.is_empty() {
        return "No backends configured.".to_string();
    }
    let mut out = String::new();
    for (name, outcome) in results {
        match outcome {
            Ok(()) => out.push_str(&format!("{} {}\n", "✓".green(), name)),
            Err(reason) => out.push_str(&format!("{} {}: {}\n", "✗".red(), name, reason)),
        }
    }
    let failed = results.iter().filter(|(_, r)| r.is_err()).count();
    out.push_str(&format!(
        "\n{} backend(s) checked, {} invalid",
        results.len(),
        failed
    ));
    out
}
