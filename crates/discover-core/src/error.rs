use thiserror::Error;

use crate::domain::{Stage, Task};
use crate::ports::{LockError, MailerError, ProviderError, QueueError, StoreError};

/// Crate-level error returned by stage handlers and periodic jobs.
///
/// Every variant is recoverable from the pipeline's point of view: the
/// dispatch loop logs it and moves on to the next task.
#[derive(Debug, Error)]
pub enum DiscoverError {
    #[error("queue: {0}")]
    Queue(#[from] QueueError),

    #[error("lock cache: {0}")]
    Lock(#[from] LockError),

    #[error("store: {0}")]
    Store(#[from] StoreError),

    #[error("provider: {0}")]
    Provider(#[from] ProviderError),

    #[error("mailer: {0}")]
    Mailer(#[from] MailerError),

    #[error("handler not found for stage={0}")]
    HandlerNotFound(Stage),

    #[error("handler for stage={expected} received {task}")]
    UnexpectedTask { expected: Stage, task: Task },

    #[error("no queue owns stage={0}")]
    QueueNotFound(Stage),

    #[error("unknown user: {0}")]
    UnknownUser(String),
}
