//! Status - pipeline の実行結果と queue の深さ

use serde::{Deserialize, Serialize};

use crate::domain::Stage;

/// Counters of one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStats {
    pub completed: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Follow-up tasks routed to queues.
    pub follow_ups: usize,
    /// Tasks enqueued by periodic jobs.
    pub seeded: usize,
    pub periodic_failures: usize,
}

impl PipelineStats {
    /// Handler invocations, whatever their result.
    pub fn dispatched(&self) -> usize {
        self.completed + self.skipped + self.failed
    }
}

/// Tasks waiting in one stage's durable queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueDepth {
    pub stage: Stage,
    pub queue: String,
    pub pending: usize,
}
