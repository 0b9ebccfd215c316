mod config;
mod github;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::task::JoinHandle;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use discover_core::app::{
    CrawlDeps, CrawlOrchestrator, ExtractionDeps, ExtractionEngine, PipelineStats, QueueSet,
    ShutdownHandle,
};
use discover_core::domain::{Account, Stage};
use discover_core::impls::{LogMailer, MemoryAccountStore, MemoryGraphStore, MemoryLockCache};
use discover_core::ports::{
    AccountStore, Clock, GraphStore, IdGenerator, LockCache, Provider, StoreError, SystemClock,
    UlidGenerator,
};

use crate::config::{Config, LogFormat, LogSettings, Mode};
use crate::github::GitHubProvider;

#[derive(Parser, Debug)]
#[command(name = "discover", about = "Crawls the GitHub graph and mails weekly suggestions")]
struct Args {
    /// Path to .env file
    #[arg(long, env = "DOTENV_PATH", default_value = ".env")]
    dotenv: PathBuf,

    /// Overrides DISCOVER_MODE.
    #[arg(long, value_enum)]
    mode: Option<Mode>,

    /// Queue one extraction per known account at startup.
    #[arg(long)]
    extract_now: bool,
}

fn init_tracing(settings: &LogSettings) {
    let filter = EnvFilter::try_new(&settings.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match settings.format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Plain => registry.with(fmt::layer()).init(),
    }
}

/// Records each login as a known account without queueing a crawl.
async fn register_seed_users(
    accounts: &dyn AccountStore,
    logins: &[String],
) -> Result<(), StoreError> {
    for login in logins {
        accounts.put_account(&Account::new(login.as_str())).await?;
        tracing::info!(user = %login, "registered");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    if args.dotenv.exists() {
        dotenvy::from_path(&args.dotenv)
            .with_context(|| format!("failed to load {}", args.dotenv.display()))?;
    }

    init_tracing(&LogSettings::from_env());

    let config = Config::from_env()?;
    let mode = args.mode.unwrap_or(config.mode);

    // (A) ports: provider は GitHub、store 類はプロセス内
    let provider: Arc<dyn Provider> = Arc::new(GitHubProvider::new(
        config.github_api_url.clone(),
        config.github_token.clone(),
    )?);
    let graph: Arc<dyn GraphStore> = Arc::new(MemoryGraphStore::new());
    let accounts: Arc<dyn AccountStore> = Arc::new(MemoryAccountStore::new());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let ids: Arc<dyn IdGenerator> = Arc::new(UlidGenerator::new(Arc::clone(&clock)));

    if !mode.runs_crawler() {
        register_seed_users(accounts.as_ref(), &config.seed_users)
            .await
            .context("failed to register seed users")?;
        // graph / account store はプロセス内なので crawler なしでは空のまま
        tracing::warn!(
            seed_users = config.seed_users.len(),
            "extraction-only mode runs on in-memory stores; no graph state will be crawled"
        );
    }

    let shutdown = ShutdownHandle::new();
    let mut runs: Vec<(&'static str, JoinHandle<PipelineStats>)> = Vec::new();

    // (B) crawl pipeline
    if mode.runs_crawler() {
        let queues = QueueSet::open_files(&config.queue_dir, &Stage::CRAWL)
            .context("failed to open crawl queues")?;
        let lock_cache: Arc<dyn LockCache> = Arc::new(MemoryLockCache::new(Arc::clone(&clock)));
        let orchestrator = CrawlOrchestrator::new(
            &config.crawler,
            CrawlDeps {
                provider: Arc::clone(&provider),
                graph: Arc::clone(&graph),
                accounts: Arc::clone(&accounts),
                lock_cache,
                queues,
                ids: Arc::clone(&ids),
            },
        )?;
        for login in &config.seed_users {
            orchestrator
                .register(login)
                .await
                .with_context(|| format!("failed to register {login}"))?;
            tracing::info!(user = %login, "registered");
        }
        runs.push(("crawl", tokio::spawn(orchestrator.run(shutdown.subscribe()))));
    }

    // (C) extraction pipeline
    if mode.runs_extraction() {
        let queues = QueueSet::open_files(&config.queue_dir, &Stage::EXTRACTION)
            .context("failed to open extraction queue")?;
        let engine = ExtractionEngine::new(
            &config.extraction,
            ExtractionDeps {
                graph: Arc::clone(&graph),
                accounts: Arc::clone(&accounts),
                mailer: Arc::new(LogMailer),
                clock: Arc::clone(&clock),
                queues,
                ids: Arc::clone(&ids),
            },
        )?;
        if args.extract_now {
            let queued = engine.schedule_all().await?;
            tracing::info!(queued, "extraction queued on demand");
        }
        runs.push(("extraction", tokio::spawn(engine.run(shutdown.subscribe()))));
    }

    tracing::info!(mode = ?mode, pipelines = runs.len(), "discover started");

    // (D) Ctrl-C で停止要求 -> 各 pipeline の終了を待つ
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    tracing::info!("shutdown requested");
    shutdown.request_shutdown();

    for (name, run) in runs {
        match run.await {
            Ok(stats) => tracing::info!(
                pipeline = name,
                completed = stats.completed,
                skipped = stats.skipped,
                failed = stats.failed,
                follow_ups = stats.follow_ups,
                seeded = stats.seeded,
                "pipeline stopped"
            ),
            Err(e) => tracing::error!(pipeline = name, error = %e, "pipeline task panicked"),
        }
    }
    Ok(())
}
