//! GitHub REST implementation of the Provider port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use reqwest::header::{ACCEPT, LINK};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use discover_core::domain::{Repository, Stargazer, StarredRepository, split_full_name};
use discover_core::ports::provider::{PAGE_SIZE, paginate};
use discover_core::ports::{Page, Provider, ProviderError};

const JSON_MEDIA: &str = "application/vnd.github+json";
/// Adds `starred_at` to star listings.
const STAR_MEDIA: &str = "application/vnd.github.star+json";

#[derive(Debug, Deserialize)]
struct UserDto {
    login: String,
}

#[derive(Debug, Deserialize)]
struct RepoDto {
    full_name: String,
    #[serde(default)]
    topics: Vec<String>,
    language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StarDto {
    starred_at: DateTime<Utc>,
    repo: RepoDto,
}

#[derive(Debug, Deserialize)]
struct StargazerDto {
    starred_at: DateTime<Utc>,
    user: UserDto,
}

pub struct GitHubProvider {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl GitHubProvider {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("discover/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(transport)?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            token,
        })
    }

    fn request(&self, method: reqwest::Method, path: &str, accept: &str) -> reqwest::RequestBuilder {
        let request = self
            .client
            .request(method, format!("{}{}", self.base_url, path))
            .header(ACCEPT, accept);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn get_page<T: DeserializeOwned>(
        &self,
        path: &str,
        page: u32,
        accept: &str,
    ) -> Result<Page<T>, ProviderError> {
        let resp = self
            .request(reqwest::Method::GET, path, accept)
            .query(&[("per_page", PAGE_SIZE), ("page", page)])
            .send()
            .await
            .map_err(transport)?;
        let resp = check_status(resp, path).await?;

        let next_page = resp
            .headers()
            .get(LINK)
            .and_then(|v| v.to_str().ok())
            .and_then(next_page_from_link)
            .unwrap_or(0);
        let items: Vec<T> = resp
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;

        tracing::debug!(path, page, items = items.len(), next_page, "fetched page");
        Ok(Page::with_next(items, next_page))
    }

    async fn logins_page(&self, path: &str, page: u32) -> Result<Page<String>, ProviderError> {
        let page: Page<UserDto> = self.get_page(path, page, JSON_MEDIA).await?;
        Ok(Page::with_next(
            page.items.into_iter().map(|u| u.login).collect(),
            page.next_page,
        ))
    }
}

#[async_trait]
impl Provider for GitHubProvider {
    async fn followers_page(&self, user: &str, page: u32) -> Result<Page<String>, ProviderError> {
        self.logins_page(&format!("/users/{user}/followers"), page)
            .await
    }

    async fn followees_page(&self, user: &str, page: u32) -> Result<Page<String>, ProviderError> {
        self.logins_page(&format!("/users/{user}/following"), page)
            .await
    }

    async fn stars_page(
        &self,
        user: &str,
        page: u32,
    ) -> Result<Page<StarredRepository>, ProviderError> {
        let page: Page<StarDto> = self
            .get_page(&format!("/users/{user}/starred"), page, STAR_MEDIA)
            .await?;
        Ok(Page::with_next(
            page.items
                .into_iter()
                .map(|s| StarredRepository::new(s.repo.full_name, s.starred_at))
                .collect(),
            page.next_page,
        ))
    }

    async fn get_repository(&self, full_name: &str) -> Result<Repository, ProviderError> {
        let (owner, name) = split_full_name(full_name)
            .ok_or_else(|| ProviderError::InvalidName(full_name.to_string()))?;

        let path = format!("/repos/{owner}/{name}");
        let resp = self
            .request(reqwest::Method::GET, &path, JSON_MEDIA)
            .send()
            .await
            .map_err(transport)?;
        let dto: RepoDto = check_status(resp, &path)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;

        let stargazers_path = format!("{path}/stargazers");
        let stargazers: Vec<Stargazer> = paginate(|page| {
            self.get_page::<StargazerDto>(&stargazers_path, page, STAR_MEDIA)
        })
        .map_ok(|s| Stargazer::new(s.user.login, s.starred_at))
        .try_collect()
        .await?;

        Ok(Repository {
            name: dto.full_name,
            labels: dto.topics,
            languages: dto.language.into_iter().collect(),
            stargazers,
        })
    }

    async fn follow(&self, user: &str) -> Result<(), ProviderError> {
        let path = format!("/user/following/{user}");
        let resp = self
            .request(reqwest::Method::PUT, &path, JSON_MEDIA)
            .header(reqwest::header::CONTENT_LENGTH, 0)
            .send()
            .await
            .map_err(transport)?;
        check_status(resp, &path).await?;
        Ok(())
    }
}

fn transport(err: reqwest::Error) -> ProviderError {
    ProviderError::Transport(err.to_string())
}

async fn check_status(
    resp: reqwest::Response,
    path: &str,
) -> Result<reqwest::Response, ProviderError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(ProviderError::NotFound(path.to_string()));
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ProviderError::Api {
        status: status.as_u16(),
        message: body,
    })
}

/// Page number of the `rel="next"` entry of a `Link` header.
fn next_page_from_link(header: &str) -> Option<u32> {
    header.split(',').find_map(|entry| {
        let mut parts = entry.split(';');
        let url = parts.next()?.trim().strip_prefix('<')?.strip_suffix('>')?;
        if !parts.any(|p| p.trim() == r#"rel="next""#) {
            return None;
        }
        let query = url.split_once('?')?.1;
        query
            .split('&')
            .find_map(|pair| pair.strip_prefix("page="))
            .and_then(|n| n.parse().ok())
    })
}
