//! Run orchestration
//!
//! One run walks the selected accounts strictly in order: look up recent
//! repositories, render a post for each, hand it to the publisher. A GitHub
//! rate limit ends the run; any other per-account problem only costs that
//! account its sightings.

use anyhow::Context;
use chrono::{DateTime, Utc};
use reqwest::Client;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::directory::{load_directory, AccountEntry};
use crate::github::{GitHubClient, RateLimitError};
use crate::http;
use crate::publish::{BlueskyPublisher, DryRunPublisher, PublishError, Publisher};
use crate::render::{Post, Template};

/// Which directory accounts a run covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Every directory entry, in order
    All,
    /// The first N entries
    Limit(usize),
    /// One account given on the command line
    Single {
        handle: String,
        display_name: Option<String>,
    },
}

impl Selection {
    /// Build a selection from CLI arguments; a single account wins over a limit
    pub fn from_args(limit: usize, org: Option<String>, name: Option<String>) -> Self {
        match org.filter(|o| !o.trim().is_empty()) {
            Some(org) => Selection::Single {
                handle: normalize_handle(&org),
                display_name: name,
            },
            None if limit > 0 => Selection::Limit(limit),
            None => Selection::All,
        }
    }
}

/// Lower-cased login from a bare handle or a GitHub URL
pub fn normalize_handle(input: &str) -> String {
    let handle = input.trim().to_lowercase();
    let handle = handle.trim_end_matches('/');
    handle.rsplit('/').next().unwrap_or(handle).to_string()
}

/// Apply a selection to the loaded directory
pub fn select_accounts(directory: Vec<AccountEntry>, selection: &Selection) -> Vec<AccountEntry> {
    match selection {
        Selection::All => directory,
        Selection::Limit(n) => {
            info!("Limited to first {} accounts", n);
            directory.into_iter().take(*n).collect()
        }
        Selection::Single {
            handle,
            display_name,
        } => {
            let matching: Vec<AccountEntry> = directory
                .into_iter()
                .filter(|entry| entry.login().to_lowercase() == *handle)
                .collect();

            if matching.is_empty() {
                info!("Account '{}' not found in directory, using handle as name", handle);
                vec![AccountEntry::new(
                    display_name.clone().unwrap_or_else(|| handle.clone()),
                    format!("https://github.com/{}", handle),
                )]
            } else {
                info!("Checking single account: {}", matching[0].display_name);
                matching
            }
        }
    }
}

/// Counters reported at the end of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub accounts_total: usize,
    pub accounts_checked: usize,
    pub published: usize,
}

/// Conditions that end a run early
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Failed to prepare run: {0:#}")]
    Setup(anyhow::Error),

    #[error("Failed to fetch account directory: {0:#}")]
    Directory(anyhow::Error),

    #[error("Bluesky login failed: {0}")]
    Login(PublishError),

    #[error("GitHub API rate limit exceeded after checking {checked} of {total} accounts")]
    RateLimited {
        checked: usize,
        total: usize,
        #[source]
        source: RateLimitError,
    },

    #[error("Failed to publish {account}/{repo}: {source}")]
    Publish {
        account: String,
        repo: String,
        #[source]
        source: PublishError,
    },
}

impl RunError {
    /// Reset time when the run stopped on a rate limit
    pub fn reset_time(&self) -> Option<DateTime<Utc>> {
        match self {
            RunError::RateLimited { source, .. } => Some(source.reset_time),
            _ => None,
        }
    }

    /// Write the operator-facing explanation to the log
    pub fn report(&self) {
        match self {
            RunError::RateLimited {
                checked,
                total,
                source,
            } => {
                error!("GitHub API rate limit exceeded!");
                error!(
                    "Checked {} of {} accounts before hitting limit.",
                    checked, total
                );
                error!(
                    "Rate limit resets at: {}",
                    source.reset_time.format("%Y-%m-%d %H:%M:%S UTC")
                );
                error!("Tip: Set GITHUB_TOKEN for 5000 requests/hour.");
            }
            other => error!("{}", other),
        }
    }
}

/// Drives a single pass over the selected accounts
pub struct Orchestrator {
    config: Config,
    client: Client,
    github: GitHubClient,
    template: Template,
}

impl Orchestrator {
    /// Prepare HTTP plumbing and the post template; no network traffic yet
    pub fn new(config: Config) -> Result<Self, RunError> {
        let client = http::build_client().map_err(RunError::Setup)?;
        let template = Template::load(config.template_path.as_deref())
            .context("Failed to load post template")
            .map_err(RunError::Setup)?;
        let github = GitHubClient::new(client.clone(), &config);

        Ok(Self {
            config,
            client,
            github,
            template,
        })
    }

    /// Complete run: directory, selection, publisher login, processing
    pub async fn run(&self, selection: &Selection) -> Result<RunSummary, RunError> {
        info!("Fetching CSV from {}...", self.config.csv_url);
        let directory = load_directory(&self.client, &self.config.csv_url)
            .await
            .map_err(RunError::Directory)?;

        let accounts = select_accounts(directory, selection);

        info!(
            "Checking {} accounts for repos created in last {} minutes...",
            accounts.len(),
            self.config.check_minutes
        );

        if !self.github.is_authenticated() {
            warn!("No GITHUB_TOKEN set. Rate limited to 60 requests/hour.");
        }

        let publisher = self.connect_publisher().await?;
        let summary = self.process(&accounts, publisher.as_ref()).await?;

        info!(
            "Done. Checked {} accounts, found {} new repos.",
            summary.accounts_checked, summary.published
        );

        Ok(summary)
    }

    /// Dry-run publisher, or a logged-in Bluesky session in live mode
    pub async fn connect_publisher(&self) -> Result<Box<dyn Publisher>, RunError> {
        if self.config.dry_run {
            return Ok(Box::new(DryRunPublisher));
        }

        let credentials = self.config.bluesky.as_ref().ok_or_else(|| {
            RunError::Login(PublishError::Authentication(
                "BLUESKY_HANDLE and BLUESKY_APP_PASSWORD are not set".to_string(),
            ))
        })?;

        info!("Logging into Bluesky...");
        let publisher = BlueskyPublisher::login(&self.config.bluesky_service, credentials)
            .await
            .map_err(RunError::Login)?;

        Ok(Box::new(publisher))
    }

    /// Look up, render and publish for each account in order
    pub async fn process(
        &self,
        accounts: &[AccountEntry],
        publisher: &dyn Publisher,
    ) -> Result<RunSummary, RunError> {
        let mut summary = RunSummary {
            accounts_total: accounts.len(),
            ..RunSummary::default()
        };

        for account in accounts {
            let sightings = self
                .github
                .recent_repositories(&account.github_url, self.config.check_minutes)
                .await
                .map_err(|source| RunError::RateLimited {
                    checked: summary.accounts_checked,
                    total: summary.accounts_total,
                    source,
                })?;
            summary.accounts_checked += 1;

            for sighting in &sightings {
                let post = Post::render(&self.template, &account.display_name, sighting);

                if !self.config.dry_run {
                    info!(
                        "Posting about {}/{}...",
                        account.display_name, sighting.repo_name
                    );
                }

                publisher
                    .publish(&post)
                    .await
                    .map_err(|source| RunError::Publish {
                        account: account.display_name.clone(),
                        repo: sighting.repo_name.clone(),
                        source,
                    })?;

                summary.published += 1;
            }
        }

        Ok(summary)
    }
}
