//! Process configuration loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};
use discover_core::config::{CrawlerConfig, ExtractionConfig, SeedSource, default_queue_dir};

pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

/// Which pipelines the process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Mode {
    Crawler,
    Extraction,
    All,
}

impl Mode {
    pub fn runs_crawler(self) -> bool {
        matches!(self, Mode::Crawler | Mode::All)
    }

    pub fn runs_extraction(self) -> bool {
        matches!(self, Mode::Extraction | Mode::All)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Plain,
    Json,
}

/// Logging settings, read before anything else so config loading can log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// `EnvFilter` directive, e.g. `info` or `discover_core=debug`.
    pub level: String,
    pub format: LogFormat,
}

impl LogSettings {
    /// - `LOG_LEVEL`: filter directive (default: "info")
    /// - `LOG_FORMAT`: "json" for JSON lines, anything else for plain text
    pub fn from_env() -> Self {
        let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let format = match std::env::var("LOG_FORMAT") {
            Ok(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Plain,
        };
        Self { level, format }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub mode: Mode,
    pub queue_dir: PathBuf,
    pub github_api_url: String,
    pub github_token: Option<String>,
    /// Users registered (and queued for onboarding) at startup.
    pub seed_users: Vec<String>,
    pub crawler: CrawlerConfig,
    pub extraction: ExtractionConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// All optional:
    /// - `DISCOVER_MODE`: crawler | extraction | all (default: all)
    /// - `QUEUE_STORE_DIR`: durable queue root (default: "./local/queues")
    /// - `GITHUB_API_URL`: REST base URL (default: "https://api.github.com")
    /// - `GITHUB_TOKEN`: bearer token; unauthenticated when unset
    /// - `GITHUB_LOGIN`: the crawler's own account, needed by `own-followers`
    /// - `SEED_SOURCE`: known-users | own-followers (default: known-users)
    /// - `FOLLOW_BACK`: follow each seeded follower back (default: false)
    /// - `SEED_USERS`: comma-separated logins to register at startup
    /// - `SEED_INTERVAL` (5m), `EXTRACTION_INTERVAL` (7d),
    ///   `LOCK_USER_DURATION` (12h), `LOCK_REPOSITORY_DURATION` (24h):
    ///   durations such as `90s`, `5m`, `12h`, `7d`
    pub fn from_env() -> anyhow::Result<Self> {
        let mode = match std::env::var("DISCOVER_MODE") {
            Ok(raw) => <Mode as clap::ValueEnum>::from_str(raw.trim(), true)
                .map_err(|e| anyhow::anyhow!("DISCOVER_MODE: {e}"))?,
            Err(_) => Mode::All,
        };

        let queue_dir = std::env::var("QUEUE_STORE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_queue_dir());

        let github_api_url = std::env::var("GITHUB_API_URL")
            .unwrap_or_else(|_| DEFAULT_GITHUB_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let github_token = std::env::var("GITHUB_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty());

        let seed_users: Vec<String> = std::env::var("SEED_USERS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let mut crawler = CrawlerConfig::default();
        crawler.seed_source = seed_source()?;
        crawler.seed_interval = duration_var("SEED_INTERVAL", crawler.seed_interval)?;
        crawler.locks.user = duration_var("LOCK_USER_DURATION", crawler.locks.user)?;
        crawler.locks.repository =
            duration_var("LOCK_REPOSITORY_DURATION", crawler.locks.repository)?;

        let mut extraction = ExtractionConfig::default();
        extraction.extraction_interval =
            duration_var("EXTRACTION_INTERVAL", extraction.extraction_interval)?;

        tracing::info!(
            mode = ?mode,
            queue_dir = %queue_dir.display(),
            github_api_url = %github_api_url,
            authenticated = github_token.is_some(),
            seed_source = ?crawler.seed_source,
            seed_users = seed_users.len(),
            seed_interval = ?crawler.seed_interval,
            extraction_interval = ?extraction.extraction_interval,
            "discover configuration loaded"
        );

        Ok(Self {
            mode,
            queue_dir,
            github_api_url,
            github_token,
            seed_users,
            crawler,
            extraction,
        })
    }
}

fn seed_source() -> anyhow::Result<SeedSource> {
    let raw = std::env::var("SEED_SOURCE").unwrap_or_else(|_| "known-users".to_string());
    match raw.trim() {
        "known-users" => Ok(SeedSource::KnownUsers),
        "own-followers" => {
            let login = std::env::var("GITHUB_LOGIN")
                .ok()
                .filter(|l| !l.trim().is_empty())
                .context("SEED_SOURCE=own-followers requires GITHUB_LOGIN")?;
            let follow_back = std::env::var("FOLLOW_BACK")
                .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
                .unwrap_or(false);
            Ok(SeedSource::OwnFollowers {
                login: login.trim().to_string(),
                follow_back,
            })
        }
        other => bail!("SEED_SOURCE: unknown value {other:?} (expected known-users or own-followers)"),
    }
}

fn duration_var(key: &str, default: Duration) -> anyhow::Result<Duration> {
    match std::env::var(key) {
        Ok(raw) => parse_duration(&raw).with_context(|| format!("{key}={raw:?}")),
        Err(_) => Ok(default),
    }
}

/// Parses `<n><unit>` with unit `ms`, `s`, `m`, `h` or `d`; a bare number is
/// seconds.
pub fn parse_duration(raw: &str) -> anyhow::Result<Duration> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    let (digits, unit) = raw.split_at(split);
    if digits.is_empty() {
        bail!("duration must start with a number");
    }
    let n: u64 = digits.parse().context("duration out of range")?;
    let secs = match unit {
        "ms" => return Ok(Duration::from_millis(n)),
        "" | "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        other => bail!("unknown duration unit {other:?}"),
    };
    n.checked_mul(secs)
        .map(Duration::from_secs)
        .context("duration out of range")
}
