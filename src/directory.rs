//! Account directory loading
//!
//! The directory is a CSV document with at least an `Organization` and a
//! `Github` column. Lines whose first non-whitespace character is `#` are
//! comments and never reach the CSV parser.

use anyhow::{Context, Result};
use reqwest::Client;
use tracing::{debug, info};

const NAME_COLUMN: &str = "Organization";
const URL_COLUMN: &str = "Github";

/// A monitored GitHub account and the name it is announced under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountEntry {
    pub display_name: String,
    pub github_url: String,
}

impl AccountEntry {
    pub fn new(display_name: impl Into<String>, github_url: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            github_url: github_url.into(),
        }
    }

    /// GitHub login this entry points at
    pub fn login(&self) -> &str {
        extract_login(&self.github_url)
    }
}

/// Final path segment of a GitHub URL, ignoring trailing slashes
pub fn extract_login(github_url: &str) -> &str {
    let trimmed = github_url.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Download the raw directory document
pub async fn fetch_directory(client: &Client, url: &str) -> Result<String> {
    debug!("Requesting account directory: {}", url);

    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Failed to request account directory from {}", url))?
        .error_for_status()
        .context("Account directory request was rejected")?;

    response
        .text()
        .await
        .context("Failed to read account directory body")
}

/// Fetch and parse the directory in one step
pub async fn load_directory(client: &Client, url: &str) -> Result<Vec<AccountEntry>> {
    let content = fetch_directory(client, url).await?;
    let entries = parse_directory(&content);
    info!("Loaded {} accounts from directory", entries.len());
    Ok(entries)
}

/// Parse directory CSV into account entries, preserving source order
///
/// Rows missing either column (after trimming) are skipped silently, as are
/// records the CSV reader cannot decode.
pub fn parse_directory(content: &str) -> Vec<AccountEntry> {
    let cleaned = content
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n");

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(cleaned.as_bytes());

    let (name_idx, url_idx) = match reader.headers() {
        Ok(headers) => (
            headers.iter().position(|h| h.trim() == NAME_COLUMN),
            headers.iter().position(|h| h.trim() == URL_COLUMN),
        ),
        Err(e) => {
            debug!("Directory has no readable header row: {}", e);
            return Vec::new();
        }
    };

    let mut entries = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                debug!("Skipping unreadable directory row {}: {}", row + 1, e);
                continue;
            }
        };

        let field = |idx: Option<usize>| {
            idx.and_then(|i| record.get(i))
                .map(str::trim)
                .unwrap_or_default()
        };

        let display_name = field(name_idx);
        let github_url = field(url_idx);

        if display_name.is_empty() || github_url.is_empty() {
            continue;
        }

        entries.push(AccountEntry::new(display_name, github_url));
    }

    entries
}
