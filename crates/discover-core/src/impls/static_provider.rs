//! Provider serving a fixed, in-memory view of the code host.
//!
//! Listings are paginated exactly like the real API (numbered pages of
//! `page_size`, `next_page == 0` on the last one) so pagination bugs show
//! up against it. Every call is recorded.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::{Repository, StarredRepository, split_full_name};
use crate::ports::provider::PAGE_SIZE;
use crate::ports::{Page, Provider, ProviderError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    Followers { user: String, page: u32 },
    Followees { user: String, page: u32 },
    Stars { user: String, page: u32 },
    Repository(String),
    Follow(String),
}

#[derive(Default)]
pub struct StaticProvider {
    page_size: usize,
    followers: HashMap<String, Vec<String>>,
    followees: HashMap<String, Vec<String>>,
    stars: HashMap<String, Vec<StarredRepository>>,
    repositories: HashMap<String, Repository>,
    /// Keys (user or repository) whose every call fails.
    failing: HashSet<String>,
    calls: Mutex<Vec<ProviderCall>>,
}

impl StaticProvider {
    pub fn new() -> Self {
        Self {
            page_size: PAGE_SIZE as usize,
            ..Self::default()
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_followers(mut self, user: &str, followers: &[&str]) -> Self {
        self.followers
            .insert(user.to_string(), followers.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn with_followees(mut self, user: &str, followees: &[&str]) -> Self {
        self.followees
            .insert(user.to_string(), followees.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn with_stars(mut self, user: &str, stars: Vec<StarredRepository>) -> Self {
        self.stars.insert(user.to_string(), stars);
        self
    }

    pub fn with_repository(mut self, repository: Repository) -> Self {
        self.repositories.insert(repository.name.clone(), repository);
        self
    }

    /// Makes every call concerning `key` fail with a transport error.
    pub fn failing_for(mut self, key: &str) -> Self {
        self.failing.insert(key.to_string());
        self
    }

    pub fn calls(&self) -> Vec<ProviderCall> {
        match self.calls.lock() {
            Ok(calls) => calls.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn record(&self, call: ProviderCall) {
        let mut calls = match self.calls.lock() {
            Ok(calls) => calls,
            Err(poisoned) => poisoned.into_inner(),
        };
        calls.push(call);
    }

    fn check(&self, key: &str) -> Result<(), ProviderError> {
        if self.failing.contains(key) {
            return Err(ProviderError::Transport(format!("injected failure for {key}")));
        }
        Ok(())
    }

    fn page_of<T: Clone>(&self, items: Option<&Vec<T>>, page: u32) -> Page<T> {
        let items = items.map(Vec::as_slice).unwrap_or_default();
        let size = self.page_size.max(1);
        let index = page.saturating_sub(1) as usize;
        let start = index.saturating_mul(size).min(items.len());
        let end = start.saturating_add(size).min(items.len());
        let slice = items[start..end].to_vec();
        if end < items.len() {
            Page::with_next(slice, page + 1)
        } else {
            Page::last(slice)
        }
    }
}

#[async_trait]
impl Provider for StaticProvider {
    async fn followers_page(&self, user: &str, page: u32) -> Result<Page<String>, ProviderError> {
        self.record(ProviderCall::Followers {
            user: user.to_string(),
            page,
        });
        self.check(user)?;
        Ok(self.page_of(self.followers.get(user), page))
    }

    async fn followees_page(&self, user: &str, page: u32) -> Result<Page<String>, ProviderError> {
        self.record(ProviderCall::Followees {
            user: user.to_string(),
            page,
        });
        self.check(user)?;
        Ok(self.page_of(self.followees.get(user), page))
    }

    async fn stars_page(
        &self,
        user: &str,
        page: u32,
    ) -> Result<Page<StarredRepository>, ProviderError> {
        self.record(ProviderCall::Stars {
            user: user.to_string(),
            page,
        });
        self.check(user)?;
        Ok(self.page_of(self.stars.get(user), page))
    }

    async fn get_repository(&self, full_name: &str) -> Result<Repository, ProviderError> {
        self.record(ProviderCall::Repository(full_name.to_string()));
        if split_full_name(full_name).is_none() {
            return Err(ProviderError::InvalidName(full_name.to_string()));
        }
        self.check(full_name)?;
        self.repositories
            .get(full_name)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(full_name.to_string()))
    }

    async fn follow(&self, user: &str) -> Result<(), ProviderError> {
        self.record(ProviderCall::Follow(user.to_string()));
        self.check(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::provider::list_followees;

    #[tokio::test]
    async fn listings_are_served_in_pages() {
        let followees: Vec<String> = (0..5).map(|i| format!("user{i}")).collect();
        let refs: Vec<&str> = followees.iter().map(String::as_str).collect();
        let provider = StaticProvider::new()
            .with_page_size(2)
            .with_followees("alice", &refs);

        assert_eq!(list_followees(&provider, "alice").await.unwrap(), followees);
        let pages: Vec<u32> = provider
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                ProviderCall::Followees { page, .. } => Some(page),
                _ => None,
            })
            .collect();
        assert_eq!(pages, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn unknown_user_has_an_empty_last_page() {
        let provider = StaticProvider::new();
        let page = provider.stars_page("ghost", 1).await.unwrap();
        assert!(page.items.is_empty());
        assert!(page.is_last());
    }

    #[tokio::test]
    async fn injected_failures_and_missing_repositories() {
        let provider = StaticProvider::new().failing_for("bob");
        assert!(matches!(
            provider.followees_page("bob", 1).await,
            Err(ProviderError::Transport(_))
        ));
        assert!(matches!(
            provider.get_repository("x/y").await,
            Err(ProviderError::NotFound(_))
        ));
        assert!(matches!(
            provider.get_repository("nope").await,
            Err(ProviderError::InvalidName(_))
        ));
    }
}
