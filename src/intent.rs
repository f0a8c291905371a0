//! Intent analysis: request text to a ranked set of candidate resources.

pub mod keyword;
pub mod types;

pub use keyword::KeywordIntentAnalyzer;
pub use types::{Candidate, Complexity, Intent, TaskType};

use crate::resource::ResourceRegistry;

/// Maps a request to an `Intent`. Implementations return finalized intents.
pub trait IntentAnalyzer: Send + Sync {
    fn analyze(&self, request: &str, registry: &ResourceRegistry) -> Intent;
}
