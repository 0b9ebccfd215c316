//! One queue per stage, opened together.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::domain::Stage;
use crate::impls::{FileQueue, MemoryQueue};
use crate::ports::{QueueError, TaskQueue};

#[derive(Clone, Default)]
pub struct QueueSet {
    queues: HashMap<Stage, Arc<dyn TaskQueue>>,
}

impl QueueSet {
    /// Durable queues `<root>/<stage>.queue` for each of `stages`.
    pub fn open_files(root: &Path, stages: &[Stage]) -> Result<Self, QueueError> {
        let mut set = Self::default();
        for stage in stages {
            let queue = FileQueue::open(root, &stage.queue_name())?;
            set.queues.insert(*stage, Arc::new(queue));
        }
        Ok(set)
    }

    pub fn in_memory(stages: &[Stage]) -> Self {
        let mut set = Self::default();
        for stage in stages {
            set.queues
                .insert(*stage, Arc::new(MemoryQueue::new(stage.queue_name())));
        }
        set
    }

    pub fn get(&self, stage: Stage) -> Option<Arc<dyn TaskQueue>> {
        self.queues.get(&stage).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Stage, &Arc<dyn TaskQueue>)> {
        self.queues.iter().map(|(stage, queue)| (*stage, queue))
    }
}
