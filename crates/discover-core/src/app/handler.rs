//! StageHandler - 1 stage 分の処理
//!
//! Handler は queue に触らない。次の仕事は `Outcome::follow_ups` として返し、
//! pipeline がそれぞれの stage を持つ queue に振り分ける。

use async_trait::async_trait;

use crate::domain::{CorrelationId, Outcome, Stage, Task};
use crate::error::DiscoverError;

/// Per-dispatch context passed explicitly to the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerContext {
    pub correlation_id: CorrelationId,
    pub stage: Stage,
}

#[async_trait]
pub trait StageHandler: Send + Sync {
    async fn handle(&self, task: &Task, ctx: &HandlerContext) -> Result<Outcome, DiscoverError>;
}

/// Rejects a task routed to the wrong handler.
pub(crate) fn unexpected(expected: Stage, task: &Task) -> DiscoverError {
    DiscoverError::UnexpectedTask {
        expected,
        task: task.clone(),
    }
}
