//! In-memory AccountStore.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{Account, Suggestion, SuggestionId};
use crate::ports::{AccountStore, StoreError};

#[derive(Default)]
struct Records {
    /// Ordered so enumeration is stable.
    accounts: BTreeMap<String, Account>,
    suggestions: HashMap<SuggestionId, Suggestion>,
}

#[derive(Default)]
pub struct MemoryAccountStore {
    records: RwLock<Records>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `accounts`.
    pub fn with_accounts(accounts: impl IntoIterator<Item = Account>) -> Self {
        let accounts = accounts
            .into_iter()
            .map(|account| (account.name.clone(), account))
            .collect();
        Self {
            records: RwLock::new(Records {
                accounts,
                suggestions: HashMap::new(),
            }),
        }
    }

    /// Every suggestion for `user`, oldest first.
    pub async fn suggestions_for(&self, user: &str) -> Vec<Suggestion> {
        let records = self.records.read().await;
        let mut found: Vec<Suggestion> = records
            .suggestions
            .values()
            .filter(|s| s.user == user)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        found
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn get_all_accounts(&self) -> Result<Vec<Account>, StoreError> {
        Ok(self.records.read().await.accounts.values().cloned().collect())
    }

    async fn get_account(&self, name: &str) -> Result<Option<Account>, StoreError> {
        Ok(self.records.read().await.accounts.get(name).cloned())
    }

    async fn put_account(&self, account: &Account) -> Result<(), StoreError> {
        if account.name.is_empty() {
            return Err(StoreError::Invalid("account without a name".to_string()));
        }
        let mut records = self.records.write().await;
        match records.accounts.get_mut(&account.name) {
            Some(existing) => {
                if account.email.is_some() {
                    existing.email = account.email.clone();
                }
            }
            None => {
                records
                    .accounts
                    .insert(account.name.clone(), account.clone());
            }
        }
        Ok(())
    }

    async fn get_suggestion(&self, id: SuggestionId) -> Result<Option<Suggestion>, StoreError> {
        Ok(self.records.read().await.suggestions.get(&id).cloned())
    }

    async fn put_suggestion(&self, suggestion: &Suggestion) -> Result<(), StoreError> {
        self.records
            .write()
            .await
            .suggestions
            .insert(suggestion.id, suggestion.clone());
        Ok(())
    }

    async fn latest_suggestion(&self, user: &str) -> Result<Option<Suggestion>, StoreError> {
        Ok(self.suggestions_for(user).await.pop())
    }
}
