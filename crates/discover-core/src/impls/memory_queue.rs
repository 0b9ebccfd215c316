//! In-memory TaskQueue. Loses everything on restart; used by tests and
//! one-shot runs.

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::Task;
use crate::ports::{QueueError, TaskQueue};

pub struct MemoryQueue {
    name: String,
    tasks: Mutex<VecDeque<Task>>,
}

impl MemoryQueue {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tasks: Mutex::new(VecDeque::new()),
        }
    }

    /// Snapshot of the waiting tasks, front first.
    pub async fn snapshot(&self) -> Vec<Task> {
        self.tasks.lock().await.iter().cloned().collect()
    }
}

#[async_trait]
impl TaskQueue for MemoryQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn push(&self, task: &Task) -> Result<(), QueueError> {
        self.tasks.lock().await.push_back(task.clone());
        Ok(())
    }

    async fn pop(&self) -> Result<Option<Task>, QueueError> {
        Ok(self.tasks.lock().await.pop_front())
    }

    async fn len(&self) -> Result<usize, QueueError> {
        Ok(self.tasks.lock().await.len())
    }
}
