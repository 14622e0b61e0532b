use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::Client;

use crate::config::REQUEST_TIMEOUT;

/// Creates the HTTP client shared by the directory fetch, GitHub and Bluesky.
///
/// GitHub rejects requests without a `User-Agent`, so one is always sent.
pub fn build_client() -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_static(concat!("repoherald/", env!("CARGO_PKG_VERSION"))),
    );

    Client::builder()
        .default_headers(headers)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")
}
