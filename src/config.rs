use secrecy::SecretString;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Fixed per-request ceiling for every outbound HTTP call
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors raised while assembling the run configuration
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("CSV_URL environment variable is required")]
    MissingCsvUrl,

    #[error("BLUESKY_HANDLE and BLUESKY_APP_PASSWORD are required when TEST_MODE is false")]
    MissingBlueskyCredentials,

    #[error("{key} must be a non-negative integer, got {value:?}")]
    InvalidNumber { key: &'static str, value: String },

    #[error("{key} must be true or false, got {value:?}")]
    InvalidFlag { key: &'static str, value: String },
}

/// Resolved configuration for a single run
///
/// Built once at start-up from the process environment, then adjusted by CLI
/// overrides. Nothing reads the environment after this value exists.
#[derive(Debug, Clone)]
pub struct Config {
    /// Where the account directory CSV lives
    pub csv_url: String,

    /// GitHub token; unauthenticated requests get a much lower rate limit
    pub github_token: Option<SecretString>,

    /// Bluesky account credentials (required for live posting)
    pub bluesky: Option<BlueskyCredentials>,

    /// Trailing window, in minutes, that decides which repositories are new
    pub check_minutes: u32,

    /// Log intended posts instead of publishing them
    pub dry_run: bool,

    /// Base URL of the GitHub REST API
    pub github_api_url: String,

    /// Bluesky PDS / entryway base URL
    pub bluesky_service: String,

    /// Optional template override; the built-in template is used otherwise
    pub template_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct BlueskyCredentials {
    pub handle: String,
    pub app_password: SecretString,
}

// Default value functions
fn default_check_minutes() -> u32 {
    15
}
fn default_github_api_url() -> String {
    "https://api.github.com".to_string()
}
fn default_bluesky_service() -> String {
    "https://bsky.social".to_string()
}

impl Config {
    /// Load configuration from the process environment
    ///
    /// A `.env` file in the working directory is read first; variables that
    /// are already set always win over the file.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {:?}", path);
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    ///
    /// Empty values are treated the same as unset ones.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let csv_url = get("CSV_URL").ok_or(ConfigError::MissingCsvUrl)?;

        let check_minutes = match get("CHECK_MINUTES") {
            Some(value) => value.parse().map_err(|_| ConfigError::InvalidNumber {
                key: "CHECK_MINUTES",
                value,
            })?,
            None => default_check_minutes(),
        };

        let dry_run = match get("TEST_MODE") {
            Some(value) => parse_flag("TEST_MODE", value)?,
            None => true,
        };

        let bluesky = match (get("BLUESKY_HANDLE"), get("BLUESKY_APP_PASSWORD")) {
            (Some(handle), Some(password)) => Some(BlueskyCredentials {
                handle,
                app_password: SecretString::from(password),
            }),
            _ => None,
        };

        if !dry_run && bluesky.is_none() {
            return Err(ConfigError::MissingBlueskyCredentials);
        }

        Ok(Self {
            csv_url,
            github_token: get("GITHUB_TOKEN").map(SecretString::from),
            bluesky,
            check_minutes,
            dry_run,
            github_api_url: get("GITHUB_API_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(default_github_api_url),
            bluesky_service: get("BLUESKY_SERVICE")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(default_bluesky_service),
            template_path: get("TEMPLATE_PATH").map(PathBuf::from),
        })
    }

    /// Apply command-line overrides; CLI values always take precedence
    pub fn with_overrides(mut self, minutes: Option<u32>) -> Self {
        if let Some(minutes) = minutes {
            self.check_minutes = minutes;
        }
        self
    }
}

fn parse_flag(key: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidFlag { key, value }),
    }
}
