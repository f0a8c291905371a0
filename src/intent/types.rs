//! Intent: the structured reading of a request.

use crate::types::Namespace;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    CodeGeneration,
    Analysis,
    Design,
    General,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::CodeGeneration => "code_generation",
            TaskType::Analysis => "analysis",
            TaskType::Design => "design",
            TaskType::General => "general",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
}

impl Complexity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Complexity::Simple => "simple",
            Complexity::Moderate => "moderate",
            Complexity::Complex => "complex",
        }
    }
}

/// A ranked candidate resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub namespace: Namespace,
    pub score: f64,
}

impl Candidate {
    pub fn new(namespace: impl Into<Namespace>, score: f64) -> Self {
        Self {
            namespace: namespace.into(),
            score,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Intent {
    pub raw_request: String,
    pub task_type: TaskType,
    pub complexity: Complexity,
    /// Primary candidate; first in `candidates` once finalized
    pub entity: Option<Namespace>,
    /// Descending by score
    pub candidates: Vec<Candidate>,
    pub enable_parallel: bool,
    pub parallel_reasoning: String,
    /// Independent sub-requests when `enable_parallel`
    pub subtasks: Vec<String>,
}

impl Intent {
    pub fn new(raw_request: impl Into<String>) -> Self {
        Self {
            raw_request: raw_request.into(),
            task_type: TaskType::General,
            complexity: Complexity::Simple,
            entity: None,
            candidates: Vec::new(),
            enable_parallel: false,
            parallel_reasoning: String::new(),
            subtasks: Vec::new(),
        }
    }

    pub fn with_entity(mut self, entity: impl Into<Namespace>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    pub fn with_candidates(mut self, candidates: Vec<Candidate>) -> Self {
        self.candidates = candidates;
        self
    }

    /// Sort candidates by descending score (namespace breaks ties), drop
    /// duplicates, and move `entity` to the front.
    pub fn finalize(mut self) -> Self {
        self.candidates.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.namespace.cmp(&b.namespace))
        });
        let mut seen = std::collections::HashSet::new();
        self.candidates
            .retain(|candidate| seen.insert(candidate.namespace.clone()));

        if let Some(entity) = &self.entity {
            let position = self
                .candidates
                .iter()
                .position(|candidate| &candidate.namespace == entity);
            let candidate = match position {
                Some(index) => self.candidates.remove(index),
                None => Candidate::new(entity.clone(), 1.0),
            };
            self.candidates.insert(0, candidate);
        }
        self
    }

    /// Namespaces to try in order: entity, then candidates, each once.
    pub fn try_list(&self) -> Vec<Namespace> {
        let mut ordered: Vec<Namespace> = Vec::with_capacity(self.candidates.len() + 1);
        let mut ranked: Vec<&Candidate> = self.candidates.iter().collect();
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        let entity = self.entity.iter();
        for namespace in entity.chain(ranked.into_iter().map(|c| &c.namespace)) {
            if !ordered.contains(namespace) {
                ordered.push(namespace.clone());
            }
        }
        ordered
    }
}
