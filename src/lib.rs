//! repoherald - Announce newly created GitHub repositories on Bluesky
//!
//! repoherald reads a directory of newsroom GitHub accounts, finds
//! repositories created within a trailing time window, and posts an
//! announcement with a link card for each one.
//!
//! ## Modules
//!
//! - [`config`]: Environment configuration and CLI overrides
//! - [`directory`]: Account directory (CSV) loading
//! - [`github`]: Recent-repository lookup with user/organization fallback
//! - [`render`]: Post templates and link previews
//! - [`publish`]: Bluesky and dry-run publishers
//! - [`run`]: Account selection and the per-run pass

pub mod config;
pub mod directory;
pub mod github;
pub mod http;
pub mod publish;
pub mod render;
pub mod run;

pub use config::{Config, ConfigError};
pub use directory::AccountEntry;
pub use github::{GitHubClient, RateLimitError, RepositorySighting};
pub use publish::{BlueskyPublisher, DryRunPublisher, Publisher};
pub use render::{LinkPreview, Post, Template};
pub use run::{Orchestrator, RunError, RunSummary, Selection};
