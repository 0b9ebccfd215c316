//! PeriodicJob - ticker driven producers (seed, extraction scheduling).

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::Task;
use crate::error::DiscoverError;

/// Fires every `interval`; optionally once as soon as the pipeline starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub interval: Duration,
    pub fire_on_start: bool,
}

impl Schedule {
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            fire_on_start: false,
        }
    }

    pub fn fire_on_start(mut self, fire: bool) -> Self {
        self.fire_on_start = fire;
        self
    }
}

/// Produces tasks on a schedule. Runs on the dispatch loop, never
/// concurrently with a handler of the same pipeline.
#[async_trait]
pub trait PeriodicJob: Send + Sync {
    fn name(&self) -> &str;

    /// Tasks to enqueue for this tick.
    async fn run(&self) -> Result<Vec<Task>, DiscoverError>;
}
