//! Crawl orchestrator - onboarding → followee → repository
//!
//! # 設計
//! - 各 stage の handler は Provider から読み、GraphStore に部分的な User /
//!   Repository を upsert し、次の stage の task を follow-up として返す。
//! - Followee と Repository は dedup lock を取れなかったら Skipped
//!   (エラーではない)。
//! - Seeder が周期的に Onboarding task を投入して既知ユーザーを再訪する。

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

use super::handler::{HandlerContext, StageHandler, unexpected};
use super::periodic::{PeriodicJob, Schedule};
use super::pipeline::{BuildError, Pipeline, PipelineBuilder};
use super::queues::QueueSet;
use super::status::PipelineStats;
use crate::config::{CrawlerConfig, SeedSource};
use crate::domain::{Account, Outcome, Stage, Task, User};
use crate::error::DiscoverError;
use crate::ports::provider::{list_followees, list_followers, list_stars};
use crate::ports::{
    AccountStore, DedupLocks, GraphStore, IdGenerator, LockCache, LockOutcome, Provider,
};

/// Lists followees, stores them, fans out to followee expansion.
pub struct OnboardingHandler {
    provider: Arc<dyn Provider>,
    graph: Arc<dyn GraphStore>,
}

impl OnboardingHandler {
    pub fn new(provider: Arc<dyn Provider>, graph: Arc<dyn GraphStore>) -> Self {
        Self { provider, graph }
    }
}

#[async_trait]
impl StageHandler for OnboardingHandler {
    async fn handle(&self, task: &Task, _ctx: &HandlerContext) -> Result<Outcome, DiscoverError> {
        let Task::Onboarding { name } = task else {
            return Err(unexpected(Stage::Onboarding, task));
        };

        let followees = list_followees(self.provider.as_ref(), name).await?;
        tracing::debug!(user = %name, followees = followees.len(), "listed followees");

        self.graph
            .put_user(&User::new(name.as_str()).with_followees(followees.clone()))
            .await?;

        // the user itself first, so its own stars get collected too
        let follow_ups = std::iter::once(Task::followee(name.as_str()))
            .chain(followees.into_iter().filter(|f| f != name).map(Task::followee));
        Ok(Outcome::completed().with_follow_ups(follow_ups))
    }
}

/// Collects a user's stars once per user-lock TTL.
pub struct FolloweeHandler {
    provider: Arc<dyn Provider>,
    graph: Arc<dyn GraphStore>,
    locks: DedupLocks,
}

impl FolloweeHandler {
    pub fn new(provider: Arc<dyn Provider>, graph: Arc<dyn GraphStore>, locks: DedupLocks) -> Self {
        Self {
            provider,
            graph,
            locks,
        }
    }
}

#[async_trait]
impl StageHandler for FolloweeHandler {
    async fn handle(&self, task: &Task, _ctx: &HandlerContext) -> Result<Outcome, DiscoverError> {
        let Task::Followee { name } = task else {
            return Err(unexpected(Stage::Followee, task));
        };

        if self.locks.lock_user(name).await? == LockOutcome::AlreadyLocked {
            return Ok(Outcome::skipped(format!("user {name} processed recently")));
        }

        let stars = list_stars(self.provider.as_ref(), name).await?;
        tracing::debug!(user = %name, stars = stars.len(), "listed stars");

        let view = User::new(name.as_str()).with_stars(stars);
        let repositories: Vec<Task> = view
            .starred_repositories()
            .into_iter()
            .map(Task::repository)
            .collect();
        self.graph.put_user(&view).await?;
        Ok(Outcome::completed().with_follow_ups(repositories))
    }
}

/// Reserved for per-user analytics.
pub struct UserHandler;

#[async_trait]
impl StageHandler for UserHandler {
    async fn handle(&self, task: &Task, _ctx: &HandlerContext) -> Result<Outcome, DiscoverError> {
        match task {
            Task::User { .. } => Ok(Outcome::completed()),
            other => Err(unexpected(Stage::User, other)),
        }
    }
}

/// Resolves repository metadata once per repository-lock TTL.
pub struct RepositoryHandler {
    provider: Arc<dyn Provider>,
    graph: Arc<dyn GraphStore>,
    locks: DedupLocks,
}

impl RepositoryHandler {
    pub fn new(provider: Arc<dyn Provider>, graph: Arc<dyn GraphStore>, locks: DedupLocks) -> Self {
        Self {
            provider,
            graph,
            locks,
        }
    }
}

#[async_trait]
impl StageHandler for RepositoryHandler {
    async fn handle(&self, task: &Task, _ctx: &HandlerContext) -> Result<Outcome, DiscoverError> {
        let Task::Repository { name } = task else {
            return Err(unexpected(Stage::Repository, task));
        };

        if self.locks.lock_repository(name).await? == LockOutcome::AlreadyLocked {
            return Ok(Outcome::skipped(format!("repository {name} resolved recently")));
        }

        let repository = self.provider.get_repository(name).await?;
        tracing::debug!(
            repository = %name,
            labels = repository.labels.len(),
            stargazers = repository.stargazers.len(),
            "resolved repository"
        );
        self.graph.put_repository(&repository).await?;
        Ok(Outcome::completed())
    }
}

/// Periodic re-entry point: one onboarding task per seeded user.
pub struct Seeder {
    source: SeedSource,
    accounts: Arc<dyn AccountStore>,
    provider: Arc<dyn Provider>,
}

impl Seeder {
    pub fn new(
        source: SeedSource,
        accounts: Arc<dyn AccountStore>,
        provider: Arc<dyn Provider>,
    ) -> Self {
        Self {
            source,
            accounts,
            provider,
        }
    }
}

#[async_trait]
impl PeriodicJob for Seeder {
    fn name(&self) -> &str {
        "seed"
    }

    async fn run(&self) -> Result<Vec<Task>, DiscoverError> {
        match &self.source {
            SeedSource::KnownUsers => Ok(self
                .accounts
                .get_all_accounts()
                .await?
                .into_iter()
                .map(|account| Task::onboarding(account.name))
                .collect()),
            SeedSource::OwnFollowers { login, follow_back } => {
                let followers = list_followers(self.provider.as_ref(), login).await?;
                let mut tasks = Vec::with_capacity(followers.len());
                for follower in followers {
                    if *follow_back {
                        if let Err(err) = self.provider.follow(&follower).await {
                            tracing::warn!(user = %follower, error = %err, "follow back failed");
                        }
                    }
                    // extraction enumerates accounts, so followers must be registered
                    self.accounts
                        .put_account(&Account::new(follower.as_str()))
                        .await?;
                    tasks.push(Task::onboarding(follower));
                }
                Ok(tasks)
            }
        }
    }
}

/// Ports the crawl pipeline runs against.
#[derive(Clone)]
pub struct CrawlDeps {
    pub provider: Arc<dyn Provider>,
    pub graph: Arc<dyn GraphStore>,
    pub accounts: Arc<dyn AccountStore>,
    pub lock_cache: Arc<dyn LockCache>,
    /// Must hold a queue for every stage in [`Stage::CRAWL`].
    pub queues: QueueSet,
    pub ids: Arc<dyn IdGenerator>,
}

pub struct CrawlOrchestrator {
    pipeline: Pipeline,
    accounts: Arc<dyn AccountStore>,
}

impl CrawlOrchestrator {
    pub fn new(config: &CrawlerConfig, deps: CrawlDeps) -> Result<Self, BuildError> {
        let locks = DedupLocks::new(Arc::clone(&deps.lock_cache), config.locks);
        let handlers: [(Stage, Arc<dyn StageHandler>); 4] = [
            (
                Stage::Onboarding,
                Arc::new(OnboardingHandler::new(
                    Arc::clone(&deps.provider),
                    Arc::clone(&deps.graph),
                )),
            ),
            (
                Stage::Followee,
                Arc::new(FolloweeHandler::new(
                    Arc::clone(&deps.provider),
                    Arc::clone(&deps.graph),
                    locks.clone(),
                )),
            ),
            (Stage::User, Arc::new(UserHandler)),
            (
                Stage::Repository,
                Arc::new(RepositoryHandler::new(
                    Arc::clone(&deps.provider),
                    Arc::clone(&deps.graph),
                    locks,
                )),
            ),
        ];

        let mut builder = PipelineBuilder::new("crawl")
            .config(config.pipeline.clone())
            .id_generator(Arc::clone(&deps.ids))
            .expect_stages(&Stage::CRAWL)
            .periodic(
                Schedule::every(config.seed_interval).fire_on_start(config.seed_on_start),
                Arc::new(Seeder::new(
                    config.seed_source.clone(),
                    Arc::clone(&deps.accounts),
                    Arc::clone(&deps.provider),
                )),
            );
        for (stage, handler) in handlers {
            builder = builder.handler(stage, handler)?;
        }
        for (stage, queue) in deps.queues.iter() {
            builder = builder.queue(stage, Arc::clone(queue));
        }

        Ok(Self {
            pipeline: builder.build()?,
            accounts: deps.accounts,
        })
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Records `login` as a known user and queues its onboarding.
    pub async fn register(&self, login: &str) -> Result<(), DiscoverError> {
        self.accounts.put_account(&Account::new(login)).await?;
        self.pipeline.enqueue(&Task::onboarding(login)).await
    }

    pub async fn run(self, shutdown: watch::Receiver<bool>) -> PipelineStats {
        self.pipeline.run(shutdown).await
    }
}
