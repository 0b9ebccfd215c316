//! Configuration consumed by the core.
//!
//! The core never reads the environment; the binary builds these structs
//! and hands them to the constructors.

use std::path::PathBuf;
use std::time::Duration;

use crate::ports::SuggestionPolicy;

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(60 * 60);
const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// TTLs of the two dedup namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockTtls {
    pub user: Duration,
    pub repository: Duration,
}

impl Default for LockTtls {
    fn default() -> Self {
        Self {
            user: 12 * HOUR,
            repository: DAY,
        }
    }
}

/// Knobs shared by every pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Sleep of a drain loop after finding its queue empty.
    pub poll_backoff: Duration,
    /// Capacity of each stage's channel between drain and dispatch.
    ///
    /// Tasks in the channel are already past the durable cursor, so a
    /// shutdown can drop up to this many tasks per stage.
    pub channel_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            poll_backoff: Duration::from_secs(1),
            channel_capacity: 16,
        }
    }
}

/// Where the periodic seed finds users to refresh.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SeedSource {
    /// Every account in the account store: breadth-first over all
    /// onboarded users.
    #[default]
    KnownUsers,
    /// The crawler account's own followers: bounded to one ego network.
    OwnFollowers {
        login: String,
        /// Follow each follower back before onboarding them.
        follow_back: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlerConfig {
    pub seed_interval: Duration,
    /// Seed once right away instead of waiting a full interval.
    pub seed_on_start: bool,
    pub seed_source: SeedSource,
    pub locks: LockTtls,
    pub pipeline: PipelineConfig,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            seed_interval: 5 * MINUTE,
            seed_on_start: true,
            seed_source: SeedSource::default(),
            locks: LockTtls::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionConfig {
    pub extraction_interval: Duration,
    pub extract_on_start: bool,
    pub policy: SuggestionPolicy,
    pub pipeline: PipelineConfig,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            extraction_interval: 7 * DAY,
            extract_on_start: false,
            policy: SuggestionPolicy::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

/// Root directory of the durable queues.
pub fn default_queue_dir() -> PathBuf {
    PathBuf::from("./local/queues")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_values() {
        let crawler = CrawlerConfig::default();
        assert_eq!(crawler.seed_interval, Duration::from_secs(300));
        assert_eq!(crawler.locks.user, Duration::from_secs(12 * 3600));
        assert_eq!(crawler.locks.repository, Duration::from_secs(24 * 3600));
        assert_eq!(crawler.seed_source, SeedSource::KnownUsers);
        assert_eq!(crawler.pipeline.channel_capacity, 16);

        let extraction = ExtractionConfig::default();
        assert_eq!(extraction.extraction_interval, Duration::from_secs(7 * 24 * 3600));
        assert_eq!(extraction.policy.limit, 5);
        assert_eq!(default_queue_dir(), PathBuf::from("./local/queues"));
    }
}
