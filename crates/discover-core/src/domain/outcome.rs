//! Outcome of one handler invocation.
//!
//! Handlers do not touch queues. They describe the follow-up work and the
//! pipeline routes each follow-up to the queue owning its stage.

use super::Task;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutcomeKind {
    /// The task did its work.
    Completed,
    /// Nothing to do, e.g. the entity is locked as recently processed.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub kind: OutcomeKind,
    pub follow_ups: Vec<Task>,
    pub reason: Option<String>,
}

impl Outcome {
    pub fn completed() -> Self {
        Self {
            kind: OutcomeKind::Completed,
            follow_ups: Vec::new(),
            reason: None,
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            kind: OutcomeKind::Skipped,
            follow_ups: Vec::new(),
            reason: Some(reason.into()),
        }
    }

    pub fn with_follow_up(mut self, task: Task) -> Self {
        self.follow_ups.push(task);
        self
    }

    pub fn with_follow_ups(mut self, tasks: impl IntoIterator<Item = Task>) -> Self {
        self.follow_ups.extend(tasks);
        self
    }

    pub fn is_skipped(&self) -> bool {
        self.kind == OutcomeKind::Skipped
    }
}
