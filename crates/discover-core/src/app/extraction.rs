//! Extraction engine - graph state から週次の suggestion を作って送る
//!
//! Runs as its own pipeline with its own queue and ticker, independent of
//! the crawl.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

use super::handler::{HandlerContext, StageHandler, unexpected};
use super::periodic::{PeriodicJob, Schedule};
use super::pipeline::{BuildError, Pipeline, PipelineBuilder};
use super::queues::QueueSet;
use super::status::PipelineStats;
use crate::config::ExtractionConfig;
use crate::domain::{Outcome, Stage, Suggestion, Task};
use crate::error::DiscoverError;
use crate::ports::{AccountStore, Clock, GraphStore, IdGenerator, Mailer, SuggestionPolicy};

/// Computes, persists and mails one user's suggestion.
pub struct SuggestionExtractionHandler {
    graph: Arc<dyn GraphStore>,
    accounts: Arc<dyn AccountStore>,
    mailer: Arc<dyn Mailer>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    policy: SuggestionPolicy,
}

impl SuggestionExtractionHandler {
    pub fn new(
        graph: Arc<dyn GraphStore>,
        accounts: Arc<dyn AccountStore>,
        mailer: Arc<dyn Mailer>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        policy: SuggestionPolicy,
    ) -> Self {
        Self {
            graph,
            accounts,
            mailer,
            clock,
            ids,
            policy,
        }
    }
}

#[async_trait]
impl StageHandler for SuggestionExtractionHandler {
    async fn handle(&self, task: &Task, _ctx: &HandlerContext) -> Result<Outcome, DiscoverError> {
        let Task::SuggestionExtraction { name } = task else {
            return Err(unexpected(Stage::SuggestionExtraction, task));
        };

        let account = self
            .accounts
            .get_account(name)
            .await?
            .ok_or_else(|| DiscoverError::UnknownUser(name.clone()))?;

        let now = self.clock.now();
        let items = self
            .graph
            .get_user_suggestion(name, &self.policy, now)
            .await?;
        if items.is_empty() {
            return Ok(Outcome::skipped(format!("nothing to suggest to {name}")));
        }

        let suggestion = Suggestion {
            id: self.ids.generate_suggestion_id(),
            user: name.clone(),
            created_at: now,
            items,
        };
        self.accounts.put_suggestion(&suggestion).await?;
        tracing::info!(
            user = %name,
            suggestion_id = %suggestion.id,
            items = suggestion.items.len(),
            "suggestion stored"
        );

        match account.email.as_deref() {
            Some(email) => self.mailer.send(email, &suggestion.render()).await?,
            None => tracing::info!(user = %name, "no email address, suggestion not mailed"),
        }
        Ok(Outcome::completed())
    }
}

/// Enqueues one extraction per known account.
pub struct ExtractionScheduler {
    accounts: Arc<dyn AccountStore>,
}

impl ExtractionScheduler {
    pub fn new(accounts: Arc<dyn AccountStore>) -> Self {
        Self { accounts }
    }
}

#[async_trait]
impl PeriodicJob for ExtractionScheduler {
    fn name(&self) -> &str {
        "extraction"
    }

    async fn run(&self) -> Result<Vec<Task>, DiscoverError> {
        Ok(self
            .accounts
            .get_all_accounts()
            .await?
            .into_iter()
            .map(|account| Task::suggestion_extraction(account.name))
            .collect())
    }
}

#[derive(Clone)]
pub struct ExtractionDeps {
    pub graph: Arc<dyn GraphStore>,
    pub accounts: Arc<dyn AccountStore>,
    pub mailer: Arc<dyn Mailer>,
    pub clock: Arc<dyn Clock>,
    /// Must hold a queue for [`Stage::SuggestionExtraction`].
    pub queues: QueueSet,
    pub ids: Arc<dyn IdGenerator>,
}

pub struct ExtractionEngine {
    pipeline: Pipeline,
    scheduler: ExtractionScheduler,
}

impl ExtractionEngine {
    pub fn new(config: &ExtractionConfig, deps: ExtractionDeps) -> Result<Self, BuildError> {
        let handler = SuggestionExtractionHandler::new(
            Arc::clone(&deps.graph),
            Arc::clone(&deps.accounts),
            Arc::clone(&deps.mailer),
            Arc::clone(&deps.clock),
            Arc::clone(&deps.ids),
            config.policy.clone(),
        );

        let mut builder = PipelineBuilder::new("extraction")
            .config(config.pipeline.clone())
            .id_generator(Arc::clone(&deps.ids))
            .expect_stages(&Stage::EXTRACTION)
            .handler(Stage::SuggestionExtraction, Arc::new(handler))?
            .periodic(
                Schedule::every(config.extraction_interval)
                    .fire_on_start(config.extract_on_start),
                Arc::new(ExtractionScheduler::new(Arc::clone(&deps.accounts))),
            );
        for (stage, queue) in deps.queues.iter() {
            builder = builder.queue(stage, Arc::clone(queue));
        }

        Ok(Self {
            pipeline: builder.build()?,
            scheduler: ExtractionScheduler::new(deps.accounts),
        })
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// On-demand extraction for every account. Returns the number queued.
    pub async fn schedule_all(&self) -> Result<usize, DiscoverError> {
        let tasks = self.scheduler.run().await?;
        for task in &tasks {
            self.pipeline.enqueue(task).await?;
        }
        Ok(tasks.len())
    }

    pub async fn run(self, shutdown: watch::Receiver<bool>) -> PipelineStats {
        self.pipeline.run(shutdown).await
    }
}
