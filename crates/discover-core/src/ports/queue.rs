//! TaskQueue port - a named FIFO of tasks, one per stage.

use std::io;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::Task;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue {queue}: io: {source}")]
    Io {
        queue: String,
        #[source]
        source: io::Error,
    },

    #[error("queue {queue}: corrupt state: {message}")]
    Corrupt { queue: String, message: String },

    #[error("queue {queue}: encode: {source}")]
    Encode {
        queue: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("queue {queue}: background operation failed: {message}")]
    Background { queue: String, message: String },
}

/// A named FIFO.
///
/// - `push` never blocks on capacity.
/// - `pop` never waits: an empty queue yields `Ok(None)`.
/// - An `Err` means the backing storage is unusable; callers treat it as
///   fatal for the task type the queue owns.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    fn name(&self) -> &str;

    async fn push(&self, task: &Task) -> Result<(), QueueError>;

    async fn pop(&self) -> Result<Option<Task>, QueueError>;

    /// Number of tasks waiting.
    async fn len(&self) -> Result<usize, QueueError>;

    async fn is_empty(&self) -> Result<bool, QueueError> {
        Ok(self.len().await? == 0)
    }
}
