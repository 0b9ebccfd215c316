//! Provider port - pull-based, page-numbered access to the code host.
//!
//! Pages are numbered from [`FIRST_PAGE`]; each page reports the number of
//! the next one, and `0` means there is none. A listing is complete only
//! once that sentinel has been seen, so callers go through [`paginate`] or
//! the `list_*` helpers that drain it.

use std::future::Future;

use async_trait::async_trait;
use futures::{Stream, TryStreamExt, stream};
use thiserror::Error;

use crate::domain::{Repository, StarredRepository};

pub const PAGE_SIZE: u32 = 100;
pub const FIRST_PAGE: u32 = 1;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("transport: {0}")]
    Transport(String),

    #[error("api error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("decode: {0}")]
    Decode(String),

    #[error("invalid repository name: {0}")]
    InvalidName(String),
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// `0` when this is the last page.
    pub next_page: u32,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_page: 0,
        }
    }

    pub fn with_next(items: Vec<T>, next_page: u32) -> Self {
        Self { items, next_page }
    }

    pub fn is_last(&self) -> bool {
        self.next_page == 0
    }
}

#[async_trait]
pub trait Provider: Send + Sync {
    /// Users following `user`.
    async fn followers_page(&self, user: &str, page: u32) -> Result<Page<String>, ProviderError>;

    /// Users `user` follows.
    async fn followees_page(&self, user: &str, page: u32) -> Result<Page<String>, ProviderError>;

    async fn stars_page(
        &self,
        user: &str,
        page: u32,
    ) -> Result<Page<StarredRepository>, ProviderError>;

    /// Topics, languages and the full stargazer list of `owner/repo`.
    async fn get_repository(&self, full_name: &str) -> Result<Repository, ProviderError>;

    async fn follow(&self, user: &str) -> Result<(), ProviderError>;
}

/// Lazily walks a paginated listing, yielding items in page order.
///
/// A provider that answers with a next page that does not move forward is
/// treated as exhausted rather than looped on.
pub fn paginate<'a, T, F, Fut>(fetch: F) -> impl Stream<Item = Result<T, ProviderError>> + 'a
where
    T: 'a,
    F: FnMut(u32) -> Fut + 'a,
    Fut: Future<Output = Result<Page<T>, ProviderError>> + 'a,
{
    stream::try_unfold((fetch, Some(FIRST_PAGE)), |(mut fetch, page)| async move {
        let Some(current) = page else {
            return Ok(None);
        };
        let page = fetch(current).await?;
        let next = match page.next_page {
            0 => None,
            next if next > current => Some(next),
            next => {
                tracing::warn!(current, next, "provider returned a non-advancing next page");
                None
            }
        };
        Ok(Some((page.items, (fetch, next))))
    })
    .map_ok(|items| stream::iter(items.into_iter().map(Ok)))
    .try_flatten()
}

pub async fn list_followers(
    provider: &dyn Provider,
    user: &str,
) -> Result<Vec<String>, ProviderError> {
    paginate(|page| provider.followers_page(user, page))
        .try_collect()
        .await
}

pub async fn list_followees(
    provider: &dyn Provider,
    user: &str,
) -> Result<Vec<String>, ProviderError> {
    paginate(|page| provider.followees_page(user, page))
        .try_collect()
        .await
}

pub async fn list_stars(
    provider: &dyn Provider,
    user: &str,
) -> Result<Vec<StarredRepository>, ProviderError> {
    paginate(|page| provider.stars_page(user, page))
        .try_collect()
        .await
}
