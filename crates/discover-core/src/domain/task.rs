//! Tasks and the crawl stages they belong to.
//!
//! The stage of an entity is not stored anywhere; it is implied by which
//! task currently references it:
//!
//! ```text
//! discovered -> Onboarding -> Followee -> Repository -> resolved
//!                                     \-> User (reserved, no-op)
//! SuggestionExtraction runs on its own schedule.
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// First contact with a user: list their followees.
    Onboarding,
    /// Collect a user's stars, fan out to their repositories.
    Followee,
    /// Reserved for per-user analytics.
    User,
    /// Resolve repository metadata.
    Repository,
    /// Compute and deliver a user's suggestion.
    SuggestionExtraction,
}

impl Stage {
    /// Stages served by the crawl orchestrator.
    pub const CRAWL: [Stage; 4] = [
        Stage::Onboarding,
        Stage::Followee,
        Stage::User,
        Stage::Repository,
    ];

    /// Stages served by the extraction engine.
    pub const EXTRACTION: [Stage; 1] = [Stage::SuggestionExtraction];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Onboarding => "onboarding",
            Stage::Followee => "followee",
            Stage::User => "user",
            Stage::Repository => "repository",
            Stage::SuggestionExtraction => "suggestion_extraction",
        }
    }

    /// Name of the durable queue owning this stage.
    pub fn queue_name(self) -> String {
        format!("{}.queue", self.as_str())
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of work: the stage plus the minimal key needed to resume it.
///
/// Serialized with an internal `stage` tag, e.g.
/// `{"stage":"followee","name":"alice"}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum Task {
    Onboarding { name: String },
    Followee { name: String },
    User { name: String },
    Repository { name: String },
    SuggestionExtraction { name: String },
}

impl Task {
    pub fn onboarding(name: impl Into<String>) -> Self {
        Task::Onboarding { name: name.into() }
    }

    pub fn followee(name: impl Into<String>) -> Self {
        Task::Followee { name: name.into() }
    }

    pub fn user(name: impl Into<String>) -> Self {
        Task::User { name: name.into() }
    }

    pub fn repository(name: impl Into<String>) -> Self {
        Task::Repository { name: name.into() }
    }

    pub fn suggestion_extraction(name: impl Into<String>) -> Self {
        Task::SuggestionExtraction { name: name.into() }
    }

    pub fn stage(&self) -> Stage {
        match self {
            Task::Onboarding { .. } => Stage::Onboarding,
            Task::Followee { .. } => Stage::Followee,
            Task::User { .. } => Stage::User,
            Task::Repository { .. } => Stage::Repository,
            Task::SuggestionExtraction { .. } => Stage::SuggestionExtraction,
        }
    }

    /// User login or `owner/repo` full name.
    pub fn key(&self) -> &str {
        match self {
            Task::Onboarding { name }
            | Task::Followee { name }
            | Task::User { name }
            | Task::Repository { name }
            | Task::SuggestionExtraction { name } => name,
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.stage(), self.key())
    }
}
