//! AccountStore port - the system of record for onboarded users and the
//! suggestions sent to them.

use async_trait::async_trait;

use super::StoreError;
use crate::domain::{Account, Suggestion, SuggestionId};

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn get_all_accounts(&self) -> Result<Vec<Account>, StoreError>;

    async fn get_account(&self, name: &str) -> Result<Option<Account>, StoreError>;

    /// Upsert keyed by name. A missing email keeps the stored one.
    async fn put_account(&self, account: &Account) -> Result<(), StoreError>;

    async fn get_suggestion(&self, id: SuggestionId) -> Result<Option<Suggestion>, StoreError>;

    /// Append-or-update keyed by id.
    async fn put_suggestion(&self, suggestion: &Suggestion) -> Result<(), StoreError>;

    /// Most recent suggestion for `user`.
    async fn latest_suggestion(&self, user: &str) -> Result<Option<Suggestion>, StoreError>;
}
