//! Publishing rendered posts
//!
//! [`BlueskyPublisher`] wraps a `bsky_sdk` agent: one login per run, then one
//! `app.bsky.feed.post` record per post carrying an external link card.
//! [`DryRunPublisher`] only logs.

use async_trait::async_trait;
use bsky_sdk::agent::config::Config as AgentConfig;
use bsky_sdk::api::app::bsky::embed::external;
use bsky_sdk::api::app::bsky::feed::post::{RecordData, RecordEmbedRefs};
use bsky_sdk::api::types::string::Datetime;
use bsky_sdk::api::types::Union;
use bsky_sdk::BskyAgent;
use secrecy::ExposeSecret;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::BlueskyCredentials;
use crate::render::{LinkPreview, Post};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Content validation failed: {0}")]
    Validation(String),

    #[error("Posting failed: {0}")]
    Posting(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),
}

/// Destination for rendered announcements
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish one post, returning the created record's URI when there is one
    async fn publish(&self, post: &Post) -> Result<Option<String>, PublishError>;

    /// Publisher name for logging
    fn name(&self) -> &str;
}

/// Logs the post that would have been published
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunPublisher;

impl DryRunPublisher {
    /// Human-readable block describing a post
    pub fn describe(post: &Post) -> Vec<String> {
        vec![
            "--- DRY RUN: would post ---".to_string(),
            post.text.clone(),
            format!("[Link Card] Title: {}", post.preview.title),
            format!("[Link Card] Description: {}", post.preview.description),
            format!("[Link Card] URL: {}", post.preview.uri),
            "---------------------------".to_string(),
        ]
    }
}

#[async_trait]
impl Publisher for DryRunPublisher {
    async fn publish(&self, post: &Post) -> Result<Option<String>, PublishError> {
        for line in Self::describe(post) {
            info!("{}", line);
        }
        Ok(None)
    }

    fn name(&self) -> &str {
        "dry-run"
    }
}

/// Map bsky-sdk errors to a [`PublishError`] variant
///
/// The SDK surfaces XRPC failures with the HTTP status and the AT Protocol
/// error code in their text, so classification works on the rendered error.
fn map_bluesky_error<E: fmt::Display + fmt::Debug>(error: E, context: &str) -> PublishError {
    let error_msg = error.to_string();
    let debug_msg = format!("{:?}", error);
    let mentions = |needles: &[&str]| {
        needles
            .iter()
            .any(|n| error_msg.contains(n) || debug_msg.contains(n))
    };

    // Transport failures mention the service address, whose port digits
    // could look like a status code
    let lowered = error_msg.to_lowercase();
    if ["connection", "timed out", "timeout", "dns", "unreachable"]
        .iter()
        .any(|n| lowered.contains(n))
        || debug_msg.contains("Connect")
    {
        return PublishError::Network(format!(
            "Network error while connecting to Bluesky during {}: {}",
            context, error_msg
        ));
    }

    if mentions(&[
        "401",
        "403",
        "AuthenticationRequired",
        "InvalidToken",
        "ExpiredToken",
        "AccountTakedown",
        "Unauthorized",
        "Forbidden",
    ]) {
        return PublishError::Authentication(format!(
            "Bluesky rejected credentials during {}: {}. Check BLUESKY_HANDLE and BLUESKY_APP_PASSWORD.",
            context, error_msg
        ));
    }

    if mentions(&["429", "RateLimitExceeded", "TooManyRequests"]) {
        return PublishError::RateLimit(format!(
            "Bluesky rate limit exceeded during {}: {}",
            context, error_msg
        ));
    }

    if mentions(&["400", "InvalidRequest", "InvalidRecord", "BadRequest"]) {
        return PublishError::Validation(format!(
            "Bluesky rejected the request during {}: {}",
            context, error_msg
        ));
    }

    PublishError::Posting(format!(
        "Bluesky operation failed during {}: {}",
        context, error_msg
    ))
}

/// Post record with the link card attached
fn post_record(post: &Post) -> RecordData {
    let LinkPreview {
        title,
        description,
        uri,
    } = post.preview.clone();

    let embed = external::MainData {
        external: external::ExternalData {
            description,
            thumb: None,
            title,
            uri,
        }
        .into(),
    };

    RecordData {
        created_at: Datetime::now(),
        embed: Some(Union::Refs(RecordEmbedRefs::AppBskyEmbedExternalMain(
            Box::new(embed.into()),
        ))),
        entities: None,
        facets: None,
        labels: None,
        langs: None,
        reply: None,
        tags: None,
        text: post.text.clone(),
    }
}

/// Logged-in Bluesky session
pub struct BlueskyPublisher {
    agent: BskyAgent,
    did: String,
}

impl fmt::Debug for BlueskyPublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlueskyPublisher")
            .field("did", &self.did)
            .finish_non_exhaustive()
    }
}

impl BlueskyPublisher {
    /// Create a session with the Bluesky service at `service`
    pub async fn login(
        service: &str,
        credentials: &BlueskyCredentials,
    ) -> Result<Self, PublishError> {
        debug!("Creating Bluesky session for handle: {}", credentials.handle);

        let agent = BskyAgent::builder()
            .config(AgentConfig {
                endpoint: service.trim_end_matches('/').to_string(),
                ..Default::default()
            })
            .build()
            .await
            .map_err(|e| PublishError::Authentication(format!("Failed to create agent: {}", e)))?;

        let session = agent
            .login(&credentials.handle, credentials.app_password.expose_secret())
            .await
            .map_err(|e| map_bluesky_error(e, "authentication"))?;

        info!("Logged into Bluesky as {}", session.handle.as_str());

        Ok(Self {
            did: session.did.as_str().to_string(),
            agent,
        })
    }

    /// DID of the logged-in account
    pub fn did(&self) -> &str {
        &self.did
    }
}

#[async_trait]
impl Publisher for BlueskyPublisher {
    async fn publish(&self, post: &Post) -> Result<Option<String>, PublishError> {
        if post.text.is_empty() {
            return Err(PublishError::Validation("Content cannot be empty".to_string()));
        }

        debug!("Posting to Bluesky: {} characters", post.text.chars().count());

        let created = self
            .agent
            .create_record(post_record(post))
            .await
            .map_err(|e| map_bluesky_error(e, "posting"))?;

        let uri = created.uri.to_string();
        debug!("Posted to Bluesky: {}", uri);
        Ok(Some(uri))
    }

    fn name(&self) -> &str {
        "bluesky"
    }
}
