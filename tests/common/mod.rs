//! Common test utilities and helpers for repoherald tests

#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use std::collections::HashMap;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use repoherald::Config;

/// Mock services a run talks to
pub struct TestEnvironment {
    pub directory: MockServer,
    pub github: MockServer,
    pub bluesky: MockServer,
}

impl TestEnvironment {
    pub async fn new() -> Self {
        Self {
            directory: MockServer::start().await,
            github: MockServer::start().await,
            bluesky: MockServer::start().await,
        }
    }

    pub fn csv_url(&self) -> String {
        format!("{}/orgs.csv", self.directory.uri())
    }

    /// Environment variables pointing every service at the mocks
    pub fn env_vars(&self, dry_run: bool) -> HashMap<String, String> {
        let mut vars = HashMap::new();
        vars.insert("CSV_URL".to_string(), self.csv_url());
        vars.insert("GITHUB_API_URL".to_string(), self.github.uri());
        vars.insert("BLUESKY_SERVICE".to_string(), self.bluesky.uri());
        vars.insert("CHECK_MINUTES".to_string(), "15".to_string());
        vars.insert("TEST_MODE".to_string(), dry_run.to_string());
        if !dry_run {
            vars.insert("BLUESKY_HANDLE".to_string(), "herald.bsky.social".to_string());
            vars.insert("BLUESKY_APP_PASSWORD".to_string(), "app-pass-word".to_string());
        }
        vars
    }

    pub fn config(&self, dry_run: bool) -> Config {
        let vars = self.env_vars(dry_run);
        Config::from_lookup(move |key| vars.get(key).cloned()).expect("test config is valid")
    }

    pub async fn serve_directory(&self, csv: &str) {
        Mock::given(method("GET"))
            .and(path("/orgs.csv"))
            .respond_with(ResponseTemplate::new(200).set_body_string(csv.to_string()))
            .mount(&self.directory)
            .await;
    }

    pub async fn serve_user_repos(&self, login: &str, repos: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path(format!("/users/{}/repos", login)))
            .respond_with(ResponseTemplate::new(200).set_body_json(repos))
            .mount(&self.github)
            .await;
    }

    pub async fn serve_bluesky(&self, expected_posts: u64) {
        Mock::given(method("POST"))
            .and(path("/xrpc/com.atproto.server.createSession"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "accessJwt": "access-token",
                "refreshJwt": "refresh-token",
                "handle": "herald.bsky.social",
                "did": "did:plc:herald"
            })))
            .expect(if expected_posts == 0 { 0 } else { 1 })
            .mount(&self.bluesky)
            .await;

        Mock::given(method("POST"))
            .and(path("/xrpc/com.atproto.repo.createRecord"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "uri": "at://did:plc:herald/app.bsky.feed.post/3kabc",
                "cid": RECORD_CID
            })))
            .expect(expected_posts)
            .mount(&self.bluesky)
            .await;
    }
}

/// Content identifier returned for created records
pub const RECORD_CID: &str = "bafyreie5737gdxlw5i64vzichcalba3z2v5n6icifvx5xytvske7mr3hpm";

/// GitHub API repository record created `minutes_ago` minutes before now
pub fn repo_created(owner: &str, name: &str, minutes_ago: i64) -> serde_json::Value {
    let created_at: DateTime<Utc> = Utc::now() - Duration::minutes(minutes_ago);
    json!({
        "name": name,
        "full_name": format!("{}/{}", owner, name),
        "description": null,
        "html_url": format!("https://github.com/{}/{}", owner, name),
        "language": "JavaScript",
        "created_at": created_at.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        "fork": false
    })
}

pub const STRIBLAB_DIRECTORY: &str = "# Newsroom accounts\n\
Organization,Github\n\
Star Tribune,https://github.com/striblab\n";

/// Assertion helpers for test validation
pub fn assert_contains_all(text: &str, expected: &[&str]) {
    for item in expected {
        assert!(
            text.contains(item),
            "Expected text to contain '{}', but it didn't. Text: {}",
            item,
            text
        );
    }
}
