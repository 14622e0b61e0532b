use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;
use crate::directory::extract_login;

/// Number of most recently created repositories requested per account
pub const RECENT_REPOS_PAGE_SIZE: u32 = 10;

const API_VERSION: &str = "2022-11-28";
const ACCEPT_MEDIA_TYPE: &str = "application/vnd.github+json";

/// GitHub refused service because the request quota is spent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("GitHub API rate limit exceeded, resets at {reset_time}")]
pub struct RateLimitError {
    pub reset_time: DateTime<Utc>,
}

/// Account shapes that own a `/repos` listing, in the order they are tried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountKind {
    User,
    Organization,
}

impl AccountKind {
    pub const ALL: [AccountKind; 2] = [AccountKind::User, AccountKind::Organization];

    fn path_segment(self) -> &'static str {
        match self {
            AccountKind::User => "users",
            AccountKind::Organization => "orgs",
        }
    }
}

/// Outcome of asking one endpoint shape for an account's repositories
#[derive(Debug)]
pub enum Attempt {
    Found(Vec<ApiRepository>),
    NotApplicable(String),
    RateLimited(DateTime<Utc>),
}

/// Subset of the GitHub repository record that announcements need
#[derive(Debug, Clone, Deserialize)]
pub struct ApiRepository {
    pub name: String,
    pub description: Option<String>,
    pub html_url: String,
    pub language: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A repository observed inside the current creation window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositorySighting {
    pub repo_name: String,
    pub description: String,
    pub repo_url: String,
    pub language: String,
    pub created_at: DateTime<Utc>,
}

impl From<ApiRepository> for RepositorySighting {
    fn from(repo: ApiRepository) -> Self {
        Self {
            repo_name: repo.name,
            description: repo.description.unwrap_or_default(),
            repo_url: repo.html_url,
            language: repo.language.unwrap_or_default(),
            created_at: repo.created_at,
        }
    }
}

/// Read-only GitHub REST client for the list-repositories endpoints
#[derive(Clone)]
pub struct GitHubClient {
    client: Client,
    api_url: String,
    token: Option<SecretString>,
}

impl GitHubClient {
    pub fn new(client: Client, config: &Config) -> Self {
        Self {
            client,
            api_url: config.github_api_url.clone(),
            token: config.github_token.clone(),
        }
    }

    /// Whether requests carry a bearer token
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Repositories under `github_url` created within the last `minutes`
    pub async fn recent_repositories(
        &self,
        github_url: &str,
        minutes: u32,
    ) -> Result<Vec<RepositorySighting>, RateLimitError> {
        self.recent_repositories_at(github_url, minutes, Utc::now())
            .await
    }

    /// Same as [`recent_repositories`](Self::recent_repositories) with an explicit clock
    pub async fn recent_repositories_at(
        &self,
        github_url: &str,
        minutes: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<RepositorySighting>, RateLimitError> {
        let login = extract_login(github_url);

        let Some(repos) = self.list_recent(login).await? else {
            warn!("Could not fetch repos for {}", login);
            return Ok(Vec::new());
        };

        let cutoff = now - Duration::minutes(i64::from(minutes));
        let sightings = filter_created_since(repos, cutoff);

        debug!("{}: {} repositories inside the window", login, sightings.len());
        Ok(sightings)
    }

    /// Try each account shape until one lists repositories
    ///
    /// `Ok(None)` means no shape applied to this login.
    async fn list_recent(&self, login: &str) -> Result<Option<Vec<ApiRepository>>, RateLimitError> {
        for kind in AccountKind::ALL {
            match self.attempt(kind, login).await {
                Attempt::Found(repos) => {
                    debug!("{} resolved as {:?} ({} repositories)", login, kind, repos.len());
                    return Ok(Some(repos));
                }
                Attempt::NotApplicable(reason) => {
                    debug!("{} is not a {:?}: {}", login, kind, reason);
                }
                Attempt::RateLimited(reset_time) => {
                    return Err(RateLimitError { reset_time });
                }
            }
        }
        Ok(None)
    }

    /// Request one endpoint shape and classify the result
    pub async fn attempt(&self, kind: AccountKind, login: &str) -> Attempt {
        let url = format!("{}/{}/{}/repos", self.api_url, kind.path_segment(), login);

        let headers = match request_headers(self.token.as_ref()) {
            Ok(headers) => headers,
            Err(e) => return Attempt::NotApplicable(format!("{:#}", e)),
        };

        let per_page = RECENT_REPOS_PAGE_SIZE.to_string();
        let response = match self
            .client
            .get(&url)
            .headers(headers)
            .query(&[
                ("sort", "created"),
                ("direction", "desc"),
                ("per_page", per_page.as_str()),
            ])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return Attempt::NotApplicable(format!("request failed: {}", e)),
        };

        let status = response.status();
        if status != StatusCode::OK {
            return classify_failure(status, response.headers());
        }

        match response.json::<Vec<ApiRepository>>().await {
            Ok(repos) => Attempt::Found(repos),
            Err(e) => Attempt::NotApplicable(format!("undecodable response body: {}", e)),
        }
    }
}

/// Headers sent with every GitHub request
pub fn request_headers(token: Option<&SecretString>) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_MEDIA_TYPE));
    headers.insert("X-GitHub-Api-Version", HeaderValue::from_static(API_VERSION));

    if let Some(token) = token {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
            .context("Invalid GITHUB_TOKEN value")?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }

    Ok(headers)
}

/// Decide what a non-200 response means for the fallback chain
///
/// Only a 403 whose remaining quota is literally `0` is a rate limit; every
/// other failure just means this endpoint shape does not apply.
pub fn classify_failure(status: StatusCode, headers: &HeaderMap) -> Attempt {
    if status == StatusCode::FORBIDDEN {
        let remaining = headers
            .get("X-RateLimit-Remaining")
            .and_then(|v| v.to_str().ok());

        if remaining == Some("0") {
            let reset_epoch = headers
                .get("X-RateLimit-Reset")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<i64>().ok())
                .unwrap_or(0);
            let reset_time = DateTime::from_timestamp(reset_epoch, 0).unwrap_or_default();
            debug!("GitHub rate limit exhausted until {}", reset_time);
            return Attempt::RateLimited(reset_time);
        }
    }

    Attempt::NotApplicable(format!("HTTP {}", status))
}

/// Keep repositories created at or after `cutoff`, in their original order
pub fn filter_created_since(
    repos: Vec<ApiRepository>,
    cutoff: DateTime<Utc>,
) -> Vec<RepositorySighting> {
    repos
        .into_iter()
        .filter(|repo| repo.created_at >= cutoff)
        .map(RepositorySighting::from)
        .collect()
}
