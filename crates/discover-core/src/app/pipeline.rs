//! Pipeline - drain loops と 1 本の dispatch loop
//!
//! # 設計
//! ```text
//! queue(onboarding) --drain--> mpsc(cap) --+
//! queue(followee)   --drain--> mpsc(cap) --+--> dispatch loop --> handler
//! queue(repository) --drain--> mpsc(cap) --+        |   ^
//!                                                   |   +-- periodic jobs
//!                     follow-ups <------------------+
//! ```
//! - Each stage has one drain task. It pops its queue, forwards the task
//!   into a bounded channel and wakes the dispatcher. An empty queue backs
//!   off for `poll_backoff`.
//! - One dispatch loop runs every handler of the pipeline, one at a time.
//!   Provider calls are therefore serialized per pipeline.
//! - Stages are served round-robin: after a task of stage `i` the next scan
//!   starts at `i + 1`, so a busy stage cannot starve the others.
//! - Due periodic jobs run before queued tasks.
//! - Handler errors are logged and counted; the loop keeps going.
//!
//! Shutdown: the dispatch loop exits after the handler in flight. Drain
//! tasks are aborted; tasks still in the durable queues are picked up by
//! the next run.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep, sleep_until};
use tracing::Instrument;

use super::handler::{HandlerContext, StageHandler};
use super::periodic::{PeriodicJob, Schedule};
use super::registry::{RegistryError, StageRegistry};
use super::status::{PipelineStats, QueueDepth};
use crate::config::PipelineConfig;
use crate::domain::{Outcome, OutcomeKind, Stage, Task};
use crate::error::DiscoverError;
use crate::ports::{IdGenerator, QueueError, SystemClock, TaskQueue, UlidGenerator};

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing stages: {0:?}. These stages need both a handler and a queue.")]
    MissingStages(Vec<Stage>),

    #[error("Periodic job '{0}' has a zero interval")]
    ZeroInterval(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Cloneable trigger for the `watch` channel the pipelines listen on.
///
/// Dropping every handle also stops the pipelines.
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    pub fn request_shutdown(&self) {
        // receivers may already be gone
        let _ = self.tx.send(true);
    }
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

struct ScheduledJob {
    schedule: Schedule,
    job: Arc<dyn PeriodicJob>,
}

pub struct PipelineBuilder {
    name: String,
    registry: StageRegistry,
    queues: HashMap<Stage, Arc<dyn TaskQueue>>,
    jobs: Vec<ScheduledJob>,
    expected: Option<Vec<Stage>>,
    config: PipelineConfig,
    ids: Option<Arc<dyn IdGenerator>>,
}

impl PipelineBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            registry: StageRegistry::new(),
            queues: HashMap::new(),
            jobs: Vec::new(),
            expected: None,
            config: PipelineConfig::default(),
            ids: None,
        }
    }

    pub fn handler(
        mut self,
        stage: Stage,
        handler: Arc<dyn StageHandler>,
    ) -> Result<Self, RegistryError> {
        self.registry.register(stage, handler)?;
        Ok(self)
    }

    /// Queue owning `stage`; replaces any earlier one.
    pub fn queue(mut self, stage: Stage, queue: Arc<dyn TaskQueue>) -> Self {
        self.queues.insert(stage, queue);
        self
    }

    pub fn periodic(mut self, schedule: Schedule, job: Arc<dyn PeriodicJob>) -> Self {
        self.jobs.push(ScheduledJob { schedule, job });
        self
    }

    /// Stages `build` must find wired. Defaults to the stages that have a
    /// handler.
    pub fn expect_stages(mut self, stages: &[Stage]) -> Self {
        self.expected = Some(stages.to_vec());
        self
    }

    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn build(self) -> Result<Pipeline, BuildError> {
        let expected = self
            .expected
            .unwrap_or_else(|| self.registry.registered_stages());
        let mut missing: Vec<Stage> = expected
            .iter()
            .copied()
            .filter(|stage| self.registry.get(*stage).is_none() || !self.queues.contains_key(stage))
            .collect();
        missing.sort();
        missing.dedup();
        if !missing.is_empty() {
            return Err(BuildError::MissingStages(missing));
        }

        if let Some(job) = self.jobs.iter().find(|j| j.schedule.interval.is_zero()) {
            return Err(BuildError::ZeroInterval(job.job.name().to_string()));
        }

        // 入力は handler がある stage の queue だけ。他は follow-up の出口
        let mut inputs: Vec<(Stage, Arc<dyn TaskQueue>)> = self
            .queues
            .iter()
            .filter(|(stage, _)| self.registry.get(**stage).is_some())
            .map(|(stage, queue)| (*stage, Arc::clone(queue)))
            .collect();
        inputs.sort_by_key(|(stage, _)| *stage);

        Ok(Pipeline {
            name: self.name,
            registry: self.registry,
            inputs,
            queues: self.queues,
            jobs: self.jobs,
            config: self.config,
            ids: self
                .ids
                .unwrap_or_else(|| Arc::new(UlidGenerator::new(SystemClock))),
        })
    }
}

pub struct Pipeline {
    name: String,
    registry: StageRegistry,
    /// Queues drained by this pipeline, in stage order.
    inputs: Vec<(Stage, Arc<dyn TaskQueue>)>,
    /// Every queue follow-ups may be routed to.
    queues: HashMap<Stage, Arc<dyn TaskQueue>>,
    jobs: Vec<ScheduledJob>,
    config: PipelineConfig,
    ids: Arc<dyn IdGenerator>,
}

impl Pipeline {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Pushes `task` onto the queue owning its stage.
    pub async fn enqueue(&self, task: &Task) -> Result<(), DiscoverError> {
        let queue = self
            .queues
            .get(&task.stage())
            .ok_or(DiscoverError::QueueNotFound(task.stage()))?;
        queue.push(task).await?;
        Ok(())
    }

    /// Runs the handler for `task` and routes its follow-ups.
    pub async fn dispatch(&self, task: &Task) -> Result<Outcome, DiscoverError> {
        let ctx = HandlerContext {
            correlation_id: self.ids.generate_correlation_id(),
            stage: task.stage(),
        };
        let span = tracing::info_span!(
            "task",
            pipeline = %self.name,
            stage = %ctx.stage,
            key = task.key(),
            correlation_id = %ctx.correlation_id,
        );
        self.dispatch_with(task, &ctx).instrument(span).await
    }

    async fn dispatch_with(
        &self,
        task: &Task,
        ctx: &HandlerContext,
    ) -> Result<Outcome, DiscoverError> {
        let handler = self
            .registry
            .get(ctx.stage)
            .ok_or(DiscoverError::HandlerNotFound(ctx.stage))?;
        let outcome = handler.handle(task, ctx).await?;
        for follow_up in &outcome.follow_ups {
            self.enqueue(follow_up).await?;
        }
        match outcome.kind {
            OutcomeKind::Completed => tracing::debug!(
                follow_ups = outcome.follow_ups.len(),
                "task completed"
            ),
            OutcomeKind::Skipped => tracing::debug!(
                reason = outcome.reason.as_deref().unwrap_or_default(),
                "task skipped"
            ),
        }
        Ok(outcome)
    }

    /// Pending tasks per drained stage.
    pub async fn queue_depths(&self) -> Result<Vec<QueueDepth>, QueueError> {
        let mut depths = Vec::with_capacity(self.inputs.len());
        for (stage, queue) in &self.inputs {
            depths.push(QueueDepth {
                stage: *stage,
                queue: queue.name().to_string(),
                pending: queue.len().await?,
            });
        }
        Ok(depths)
    }

    /// Runs until `shutdown` turns true or its sender is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> PipelineStats {
        let notify = Arc::new(Notify::new());
        let mut receivers = Vec::with_capacity(self.inputs.len());
        let mut drains: Vec<JoinHandle<()>> = Vec::with_capacity(self.inputs.len());
        for (stage, queue) in &self.inputs {
            let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));
            drains.push(tokio::spawn(drain_loop(
                *stage,
                Arc::clone(queue),
                tx,
                Arc::clone(&notify),
                self.config.poll_backoff,
                shutdown.clone(),
            )));
            receivers.push(rx);
        }

        let started = Instant::now();
        let mut next_due: Vec<Instant> = self
            .jobs
            .iter()
            .map(|j| {
                if j.schedule.fire_on_start {
                    started
                } else {
                    started + j.schedule.interval
                }
            })
            .collect();

        tracing::info!(
            pipeline = %self.name,
            stages = ?self.inputs.iter().map(|(s, _)| *s).collect::<Vec<_>>(),
            periodic_jobs = self.jobs.len(),
            "pipeline started"
        );

        let mut stats = PipelineStats::default();
        let mut cursor = 0;
        loop {
            if *shutdown.borrow() {
                break;
            }

            if self.run_due_jobs(&mut next_due, &mut stats).await {
                continue;
            }

            if let Some(task) = next_round_robin(&mut receivers, &mut cursor) {
                self.process(task, &mut stats).await;
                continue;
            }

            let deadline = next_due.iter().min().copied();
            tokio::select! {
                _ = notify.notified() => {}
                _ = sleep_until_opt(deadline) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        for drain in drains {
            drain.abort();
        }
        tracing::info!(pipeline = %self.name, ?stats, "pipeline stopped");
        stats
    }

    /// Returns whether any job fired.
    async fn run_due_jobs(&self, next_due: &mut [Instant], stats: &mut PipelineStats) -> bool {
        let now = Instant::now();
        let mut fired = false;
        for (scheduled, due) in self.jobs.iter().zip(next_due.iter_mut()) {
            if *due > now {
                continue;
            }
            fired = true;
            *due = now + scheduled.schedule.interval;

            let name = scheduled.job.name();
            let tasks = match scheduled.job.run().await {
                Ok(tasks) => tasks,
                Err(err) => {
                    stats.periodic_failures += 1;
                    tracing::warn!(pipeline = %self.name, job = name, error = %err, "periodic job failed");
                    continue;
                }
            };
            let mut seeded = 0;
            for task in &tasks {
                match self.enqueue(task).await {
                    Ok(()) => seeded += 1,
                    Err(err) => {
                        tracing::warn!(pipeline = %self.name, job = name, %task, error = %err, "enqueue failed")
                    }
                }
            }
            stats.seeded += seeded;
            tracing::info!(pipeline = %self.name, job = name, seeded, "periodic job fired");
        }
        fired
    }

    async fn process(&self, task: Task, stats: &mut PipelineStats) {
        match self.dispatch(&task).await {
            Ok(outcome) => {
                stats.follow_ups += outcome.follow_ups.len();
                match outcome.kind {
                    OutcomeKind::Completed => stats.completed += 1,
                    OutcomeKind::Skipped => stats.skipped += 1,
                }
            }
            Err(err) => {
                stats.failed += 1;
                tracing::warn!(pipeline = %self.name, %task, error = %err, "task failed, dropping");
            }
        }
    }
}

/// Takes the next task, starting the scan after the stage served last.
fn next_round_robin(receivers: &mut [mpsc::Receiver<Task>], cursor: &mut usize) -> Option<Task> {
    let n = receivers.len();
    for offset in 0..n {
        let index = (*cursor + offset) % n;
        if let Ok(task) = receivers[index].try_recv() {
            *cursor = (index + 1) % n;
            return Some(task);
        }
    }
    None
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn drain_loop(
    stage: Stage,
    queue: Arc<dyn TaskQueue>,
    tx: mpsc::Sender<Task>,
    notify: Arc<Notify>,
    backoff: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            return;
        }
        match queue.pop().await {
            Ok(Some(task)) if task.stage() != stage => {
                tracing::debug!(%stage, queue = queue.name(), %task, "discarding task of another stage");
            }
            Ok(Some(task)) => {
                if tx.send(task).await.is_err() {
                    return;
                }
                notify.notify_one();
            }
            Ok(None) => {
                tokio::select! {
                    _ = sleep(backoff) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            return;
                        }
                    }
                }
            }
            Err(err) => {
                tracing::error!(%stage, queue = queue.name(), error = %err, "queue pop failed, stopping drain loop");
                return;
            }
        }
    }
}
