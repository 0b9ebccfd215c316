use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use discover_core::app::{CrawlDeps, CrawlOrchestrator, QueueSet, ShutdownHandle};
use discover_core::config::CrawlerConfig;
use discover_core::domain::{Repository, Stage, Stargazer, StarredRepository, Task};
use discover_core::impls::{
    MemoryAccountStore, MemoryGraphStore, MemoryLockCache, ProviderCall, StaticProvider,
};
use discover_core::ports::{AccountStore, GraphStore, ManualClock, TaskQueue, UlidGenerator};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
}

fn repository(name: &str, stargazers: &[&str]) -> Repository {
    let mut repo = Repository::new(name);
    repo.labels = vec!["cli".to_string()];
    repo.languages = vec!["Rust".to_string()];
    repo.stargazers = stargazers
        .iter()
        .map(|user| Stargazer::new(*user, t0()))
        .collect();
    repo
}

fn provider() -> StaticProvider {
    StaticProvider::new()
        .with_followees("alice", &["bob", "carol"])
        .with_stars("alice", vec![StarredRepository::new("a/a", t0())])
        .with_stars(
            "bob",
            vec![
                StarredRepository::new("x/y", t0()),
                StarredRepository::new("a/a", t0() - TimeDelta::days(1)),
            ],
        )
        .with_stars("carol", vec![StarredRepository::new("x/y", t0())])
        .with_repository(repository("x/y", &["bob", "carol"]))
        .with_repository(repository("a/a", &["alice", "bob"]))
}

struct Harness {
    provider: Arc<StaticProvider>,
    graph: Arc<MemoryGraphStore>,
    accounts: Arc<MemoryAccountStore>,
    queues: QueueSet,
    orchestrator: CrawlOrchestrator,
}

fn harness(config: CrawlerConfig) -> Harness {
    let clock = Arc::new(ManualClock::new(t0()));
    let provider = Arc::new(provider());
    let graph = Arc::new(MemoryGraphStore::new());
    let accounts = Arc::new(MemoryAccountStore::new());
    let queues = QueueSet::in_memory(&Stage::CRAWL);
    let orchestrator = CrawlOrchestrator::new(
        &config,
        CrawlDeps {
            provider: provider.clone(),
            graph: graph.clone(),
            accounts: accounts.clone(),
            lock_cache: Arc::new(MemoryLockCache::new(clock.clone())),
            queues: queues.clone(),
            ids: Arc::new(UlidGenerator::new(clock)),
        },
    )
    .unwrap();
    Harness {
        provider,
        graph,
        accounts,
        queues,
        orchestrator,
    }
}

async fn pending(queues: &QueueSet, stage: Stage) -> Vec<Task> {
    let queue = queues.get(stage).unwrap();
    let mut tasks = Vec::new();
    while let Some(task) = queue.pop().await.unwrap() {
        tasks.push(task);
    }
    tasks
}

#[tokio::test]
async fn onboarding_enqueues_the_user_and_its_followees() {
    let h = harness(CrawlerConfig::default());

    h.orchestrator
        .pipeline()
        .dispatch(&Task::onboarding("alice"))
        .await
        .unwrap();

    assert_eq!(
        pending(&h.queues, Stage::Followee).await,
        vec![
            Task::followee("alice"),
            Task::followee("bob"),
            Task::followee("carol")
        ]
    );
    let alice = h.graph.get_user("alice").await.unwrap().unwrap();
    assert_eq!(alice.followees, vec!["bob", "carol"]);
}

#[tokio::test]
async fn repeated_followee_within_ttl_emits_nothing() {
    let h = harness(CrawlerConfig::default());
    let pipeline = h.orchestrator.pipeline();

    let first = pipeline.dispatch(&Task::followee("carol")).await.unwrap();
    assert_eq!(first.follow_ups, vec![Task::repository("x/y")]);
    assert_eq!(
        pending(&h.queues, Stage::Repository).await,
        vec![Task::repository("x/y")]
    );

    let second = pipeline.dispatch(&Task::followee("carol")).await.unwrap();
    assert!(second.is_skipped());
    assert!(pending(&h.queues, Stage::Repository).await.is_empty());

    let star_calls = h
        .provider
        .calls()
        .into_iter()
        .filter(|call| matches!(call, ProviderCall::Stars { .. }))
        .count();
    assert_eq!(star_calls, 1);
}

#[tokio::test(start_paused = true)]
async fn running_crawl_converges_on_the_reachable_graph() {
    let h = harness(CrawlerConfig::default());
    h.orchestrator.register("alice").await.unwrap();

    let shutdown = ShutdownHandle::new();
    let run = tokio::spawn(h.orchestrator.run(shutdown.subscribe()));
    tokio::time::sleep(Duration::from_secs(30)).await;
    shutdown.request_shutdown();
    let stats = run.await.unwrap();

    for user in ["alice", "bob", "carol"] {
        assert!(h.graph.get_user(user).await.unwrap().is_some(), "{user}");
    }
    let xy = h.graph.get_repository("x/y").await.unwrap().unwrap();
    assert_eq!(xy.languages, vec!["Rust"]);
    assert_eq!(xy.stargazers.len(), 2);
    assert!(h.graph.get_repository("a/a").await.unwrap().is_some());

    // each repository is resolved once even though several users star it
    let repo_calls = h
        .provider
        .calls()
        .into_iter()
        .filter(|call| matches!(call, ProviderCall::Repository(_)))
        .count();
    assert_eq!(repo_calls, 2);

    assert_eq!(stats.failed, 0);
    assert!(stats.skipped > 0);
    assert_eq!(h.accounts.get_all_accounts().await.unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn provider_failure_drops_the_task_and_the_crawl_goes_on() {
    let clock = Arc::new(ManualClock::new(t0()));
    let provider = Arc::new(provider().failing_for("bob"));
    let graph = Arc::new(MemoryGraphStore::new());
    let queues = QueueSet::in_memory(&Stage::CRAWL);
    let orchestrator = CrawlOrchestrator::new(
        &CrawlerConfig::default(),
        CrawlDeps {
            provider,
            graph: graph.clone(),
            accounts: Arc::new(MemoryAccountStore::new()),
            lock_cache: Arc::new(MemoryLockCache::new(clock.clone())),
            queues,
            ids: Arc::new(UlidGenerator::new(clock)),
        },
    )
    .unwrap();
    orchestrator.register("alice").await.unwrap();

    let shutdown = ShutdownHandle::new();
    let run = tokio::spawn(orchestrator.run(shutdown.subscribe()));
    tokio::time::sleep(Duration::from_secs(30)).await;
    shutdown.request_shutdown();
    let stats = run.await.unwrap();

    assert!(stats.failed >= 1);
    assert!(graph.get_user("carol").await.unwrap().is_some());
    assert!(graph.get_repository("x/y").await.unwrap().is_some());
}
