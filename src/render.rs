//! Post rendering
//!
//! Announcement text comes from a Mustache template rendered by `ramhorns`
//! over [`PostFields`]. Empty fields are falsy, so `{{#description}}` blocks
//! disappear for repositories without a description.

use anyhow::{Context, Result};
use ramhorns::Content;
use std::fmt;
use std::path::Path;

use crate::github::RepositorySighting;

/// Template compiled into the binary, used when no override is configured
pub const DEFAULT_TEMPLATE: &str = include_str!("../templates/post.mustache");

/// Preview description used when a repository has none
pub const FALLBACK_PREVIEW_DESCRIPTION: &str = "A GitHub repository";

/// A compiled post template
pub struct Template {
    inner: ramhorns::Template<'static>,
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template").finish_non_exhaustive()
    }
}

impl Template {
    /// Compile template source
    pub fn parse(source: &str) -> Result<Self, ramhorns::Error> {
        let inner = ramhorns::Template::new(source.to_string())?;
        Ok(Self { inner })
    }

    /// Load the template at `path`, or the built-in one when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let source = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read template file: {:?}", path))?;
                Self::parse(&source)
                    .with_context(|| format!("Failed to parse template file: {:?}", path))
            }
            None => Self::parse(DEFAULT_TEMPLATE).context("Built-in template is invalid"),
        }
    }

    /// Substitute fields and trim surrounding whitespace
    pub fn render(&self, fields: &PostFields<'_>) -> String {
        self.inner.render(fields).trim().to_string()
    }
}

/// Values a template can reference
#[derive(Debug, Clone, Copy, Content)]
pub struct PostFields<'a> {
    pub org_name: &'a str,
    pub repo_name: &'a str,
    pub description: &'a str,
    pub repo_url: &'a str,
    pub language: &'a str,
}

impl<'a> PostFields<'a> {
    pub fn new(org_name: &'a str, sighting: &'a RepositorySighting) -> Self {
        Self {
            org_name,
            repo_name: &sighting.repo_name,
            description: &sighting.description,
            repo_url: &sighting.repo_url,
            language: &sighting.language,
        }
    }
}

/// Link card shown under the post
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkPreview {
    pub title: String,
    pub description: String,
    pub uri: String,
}

impl LinkPreview {
    pub fn for_sighting(sighting: &RepositorySighting) -> Self {
        let description = if sighting.description.is_empty() {
            FALLBACK_PREVIEW_DESCRIPTION.to_string()
        } else {
            sighting.description.clone()
        };

        Self {
            title: sighting.repo_name.clone(),
            description,
            uri: sighting.repo_url.clone(),
        }
    }
}

/// A fully rendered announcement ready for a publisher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub text: String,
    pub preview: LinkPreview,
}

impl Post {
    pub fn render(template: &Template, org_name: &str, sighting: &RepositorySighting) -> Self {
        Self {
            text: template.render(&PostFields::new(org_name, sighting)),
            preview: LinkPreview::for_sighting(sighting),
        }
    }
}
