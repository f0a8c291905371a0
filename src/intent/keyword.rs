//! Deterministic keyword classifier.

use crate::executor::prompt::slash_command;
use crate::intent::types::{Candidate, Complexity, Intent, TaskType};
use crate::intent::IntentAnalyzer;
use crate::resource::{make_namespace, parse_namespace, ResourceMetadata, ResourceRegistry, ResourceType};
use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization;

const NAME_WEIGHT: f64 = 3.0;
const TAG_WEIGHT: f64 = 2.0;
const DESCRIPTION_WEIGHT: f64 = 1.0;

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "can", "do", "for", "from", "i", "in", "is",
    "it", "me", "my", "of", "on", "or", "our", "please", "should", "so", "that", "the", "this",
    "to", "us", "we", "with", "you", "your",
];

const CODE_VERBS: &[&str] = &[
    "implement", "create", "build", "write", "generate", "add", "code", "refactor", "fix",
];
const ANALYSIS_VERBS: &[&str] = &[
    "analyze", "analyse", "review", "explain", "inspect", "audit", "check", "debug",
    "investigate", "evaluate",
];
const DESIGN_VERBS: &[&str] = &["design", "architect", "plan", "model", "diagram", "sketch"];

/// Lowercased NFKC text split on non-alphanumerics, stop words removed.
pub fn tokenize(text: &str) -> Vec<String> {
    let normalized: String = text.nfkc().collect::<String>().to_lowercase();
    normalized
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty() && !STOP_WORDS.contains(token))
        .map(str::to_string)
        .collect()
}

/// Clauses separated by `,`, `;`, or newlines.
pub fn split_clauses(request: &str) -> Vec<String> {
    request
        .split([',', ';', '\n'])
        .map(str::trim)
        .filter(|clause| !clause.is_empty())
        .map(str::to_string)
        .collect()
}

/// Token-overlap scoring against names, tags, and descriptions.
#[derive(Debug, Clone)]
pub struct KeywordIntentAnalyzer {
    pub max_candidates: usize,
    pub min_score: f64,
}

impl Default for KeywordIntentAnalyzer {
    fn default() -> Self {
        Self {
            max_candidates: 5,
            min_score: 0.1,
        }
    }
}

struct Profile {
    namespace: String,
    priority: i64,
    name: HashSet<String>,
    tags: HashSet<String>,
    description: HashSet<String>,
}

impl Profile {
    fn of(resource: &ResourceMetadata) -> Self {
        Self {
            namespace: resource.namespace.clone(),
            priority: resource.priority,
            name: tokenize(&resource.name).into_iter().collect(),
            tags: resource.tags.iter().flat_map(|t| tokenize(t)).collect(),
            description: tokenize(&resource.description).into_iter().collect(),
        }
    }

    /// Best field weight per distinct request token, normalized into [0, 1].
    fn score(&self, tokens: &HashSet<String>) -> f64 {
        if tokens.is_empty() {
            return 0.0;
        }
        let raw: f64 = tokens
            .iter()
            .map(|token| {
                if self.name.contains(token) {
                    NAME_WEIGHT
                } else if self.tags.contains(token) {
                    TAG_WEIGHT
                } else if self.description.contains(token) {
                    DESCRIPTION_WEIGHT
                } else {
                    0.0
                }
            })
            .sum();
        (raw / (NAME_WEIGHT * tokens.len() as f64)).min(1.0)
    }
}

impl KeywordIntentAnalyzer {
    pub fn new(max_candidates: usize, min_score: f64) -> Self {
        Self {
            max_candidates,
            min_score,
        }
    }

    fn profiles(registry: &ResourceRegistry) -> Vec<Profile> {
        registry
            .list_all()
            .iter()
            .filter(|r| r.enabled && r.resource_type != ResourceType::Backend)
            .map(Profile::of)
            .collect()
    }

    fn rank(&self, profiles: &[Profile], text: &str) -> Vec<Candidate> {
        let tokens: HashSet<String> = tokenize(text).into_iter().collect();
        let mut scored: Vec<(&Profile, f64)> = profiles
            .iter()
            .map(|profile| (profile, profile.score(&tokens)))
            .filter(|(_, score)| *score > 0.0 && *score >= self.min_score)
            .collect();
        scored.sort_by(|(a, sa), (b, sb)| {
            sb.total_cmp(sa)
                .then_with(|| b.priority.cmp(&a.priority))
                .then_with(|| a.namespace.cmp(&b.namespace))
        });
        scored
            .into_iter()
            .take(self.max_candidates)
            .map(|(profile, score)| Candidate::new(profile.namespace.clone(), score))
            .collect()
    }

    /// `/name` at the start, or the first `type:name` token naming a known resource.
    fn explicit_reference(request: &str, registry: &ResourceRegistry) -> Option<String> {
        if let Some(name) = slash_command(request) {
            let namespace = make_namespace(ResourceType::Command, name);
            if registry.exists(&namespace) {
                return Some(namespace);
            }
        }
        request
            .split_whitespace()
            .map(|word| {
                word.trim_matches(|c: char| !(c.is_alphanumeric() || c == ':' || c == '-' || c == '_'))
            })
            .filter(|word| parse_namespace(word).is_ok())
            .find(|word| registry.exists(word))
            .map(str::to_string)
    }
}

fn classify_task(tokens: &[String]) -> TaskType {
    let count = |verbs: &[&str]| tokens.iter().filter(|t| verbs.contains(&t.as_str())).count();
    let scores = [
        (TaskType::CodeGeneration, count(CODE_VERBS)),
        (TaskType::Analysis, count(ANALYSIS_VERBS)),
        (TaskType::Design, count(DESIGN_VERBS)),
    ];
    let mut best = (TaskType::General, 0);
    for (task_type, score) in scores {
        if score > best.1 {
            best = (task_type, score);
        }
    }
    best.0
}

fn classify_complexity(clauses: usize, words: usize) -> Complexity {
    if clauses >= 3 || words > 60 {
        Complexity::Complex
    } else if clauses == 2 || words > 20 {
        Complexity::Moderate
    } else {
        Complexity::Simple
    }
}

impl IntentAnalyzer for KeywordIntentAnalyzer {
    fn analyze(&self, request: &str, registry: &ResourceRegistry) -> Intent {
        let profiles = Self::profiles(registry);
        let tokens = tokenize(request);
        let clauses = split_clauses(request);
        let words = request.split_whitespace().count();

        let mut intent = Intent::new(request);
        intent.task_type = classify_task(&tokens);
        intent.complexity = classify_complexity(clauses.len(), words);
        intent.entity = Self::explicit_reference(request, registry);
        intent.candidates = self.rank(&profiles, request);

        if intent.entity.is_some() {
            intent.parallel_reasoning = "explicit resource reference".to_string();
        } else if clauses.len() < 2 {
            intent.parallel_reasoning = "single clause".to_string();
        } else {
            match clauses
                .iter()
                .find(|clause| self.rank(&profiles, clause).is_empty())
            {
                Some(unmatched) => {
                    intent.parallel_reasoning =
                        format!("clause '{}' matched no resource", unmatched);
                }
                None => {
                    intent.enable_parallel = true;
                    intent.parallel_reasoning =
                        format!("{} independent clauses each matched a resource", clauses.len());
                    intent.subtasks = clauses;
                }
            }
        }

        intent.finalize()
    }
}
