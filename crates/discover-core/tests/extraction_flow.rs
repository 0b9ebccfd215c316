use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use discover_core::app::{ExtractionDeps, ExtractionEngine, QueueSet, ShutdownHandle};
use discover_core::config::{ExtractionConfig, PipelineConfig};
use discover_core::domain::{Account, Stage, StarredRepository, SuggestionKind, User};
use discover_core::impls::{MemoryAccountStore, MemoryGraphStore, MemoryMailer};
use discover_core::ports::{AccountStore, FixedClock, GraphStore, UlidGenerator};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap()
}

fn star(repository: &str, days_ago: i64) -> StarredRepository {
    StarredRepository::new(repository, now() - TimeDelta::days(days_ago))
}

async fn graph() -> Arc<MemoryGraphStore> {
    let graph = Arc::new(MemoryGraphStore::new());
    let followees = vec!["bob".to_string(), "carol".to_string(), "dave".to_string()];
    graph
        .put_user(&User::new("alice").with_followees(followees))
        .await
        .unwrap();
    for followee in ["bob", "carol", "dave"] {
        graph
            .put_user(&User::new(followee).with_stars(vec![star("x/y", 2)]))
            .await
            .unwrap();
    }
    graph
        .put_user(&User::new("bob").with_stars(vec![star("a/b", 10)]))
        .await
        .unwrap();
    graph
}

#[tokio::test(start_paused = true)]
async fn weekly_tick_extracts_stores_and_mails() {
    let graph = graph().await;
    let accounts = Arc::new(MemoryAccountStore::with_accounts([
        Account::new("alice").with_email("alice@example.com"),
        Account::new("bob"),
    ]));
    let mailer = Arc::new(MemoryMailer::new());
    let clock = Arc::new(FixedClock::new(now()));

    // long backoff keeps the idle drain loop cheap across a simulated week
    let config = ExtractionConfig {
        pipeline: PipelineConfig {
            poll_backoff: Duration::from_secs(60),
            ..PipelineConfig::default()
        },
        ..ExtractionConfig::default()
    };
    let engine = ExtractionEngine::new(
        &config,
        ExtractionDeps {
            graph,
            accounts: accounts.clone(),
            mailer: mailer.clone(),
            clock: clock.clone(),
            queues: QueueSet::in_memory(&Stage::EXTRACTION),
            ids: Arc::new(UlidGenerator::new(clock)),
        },
    )
    .unwrap();

    let shutdown = ShutdownHandle::new();
    let run = tokio::spawn(engine.run(shutdown.subscribe()));
    // first tick after one week, not on start
    tokio::time::sleep(Duration::from_secs(6 * 24 * 3600)).await;
    assert!(mailer.deliveries().is_empty());
    tokio::time::sleep(Duration::from_secs(24 * 3600 + 600)).await;
    shutdown.request_shutdown();
    let stats = run.await.unwrap();

    assert_eq!(stats.seeded, 2);
    // bob's followees are unknown: nothing to suggest
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.skipped, 1);

    let suggestion = accounts.latest_suggestion("alice").await.unwrap().unwrap();
    let top = &suggestion.items[0];
    assert_eq!(top.kind, SuggestionKind::StarRepository);
    assert_eq!(top.value, "x/y");
    assert!(top.reason.contains('3'));
    assert!(suggestion.items.iter().all(|item| item.value != "a/b"));

    let deliveries = mailer.deliveries();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].0, "alice@example.com");
    assert!(deliveries[0].1.text.contains("x/y"));
}
