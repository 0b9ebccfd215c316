//! GraphStore port - merge-upserts over the User/Repository graph.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::{Repository, SuggestionItem, User};

/// Shared by the graph store and the account store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("invalid record: {0}")]
    Invalid(String),
}

/// Ranking parameters for [`GraphStore::get_user_suggestion`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestionPolicy {
    /// Only stars newer than `now - window` count.
    pub window: Duration,
    /// Distinct followees that must have starred a repository.
    pub min_followees: usize,
    /// Maximum repository suggestions.
    pub limit: usize,
    /// Distinct followees that must follow someone before suggesting them.
    pub min_common_followees: usize,
    /// Maximum follow suggestions; `0` disables them.
    pub follow_limit: usize,
}

impl Default for SuggestionPolicy {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(7 * 24 * 60 * 60),
            min_followees: 1,
            limit: 5,
            min_common_followees: 2,
            follow_limit: 3,
        }
    }
}

/// Upserts must merge: applying a partial view never removes edges, and
/// applying the same view twice changes nothing.
#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn put_user(&self, user: &User) -> Result<(), StoreError>;

    async fn put_repository(&self, repository: &Repository) -> Result<(), StoreError>;

    async fn get_user(&self, name: &str) -> Result<Option<User>, StoreError>;

    async fn get_repository(&self, name: &str) -> Result<Option<Repository>, StoreError>;

    /// Ranked recommendations for `user`, repositories first.
    async fn get_user_suggestion(
        &self,
        user: &str,
        policy: &SuggestionPolicy,
        now: DateTime<Utc>,
    ) -> Result<Vec<SuggestionItem>, StoreError>;
}
