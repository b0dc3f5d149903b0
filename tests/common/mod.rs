//! Common test utilities and helpers for git-projects tests
#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use git_projects::config::TimeoutConfig;
use git_projects::FoundryConfig;
use serde_json::{json, Value};
use wiremock::MockServer;

/// Foundry config pointing at a mock server
pub fn foundry_config(server: &MockServer, name: &str, kind: &str, token: &str) -> FoundryConfig {
    FoundryConfig {
        name: name.to_string(),
        kind: kind.to_string(),
        url: Some(server.uri()),
        token: token.to_string(),
    }
}

/// HTTP client with short timeouts for tests
pub fn test_client() -> reqwest::Client {
    let timeouts = TimeoutConfig {
        connect_secs: 2,
        request_secs: 5,
        git_secs: 5,
    };
    git_projects::foundry::http_client(&timeouts).expect("Failed to build HTTP client")
}

pub fn days_ago(days: i64) -> DateTime<Utc> {
    Utc::now() - Duration::days(days)
}

/// A GitHub `/user/repos` item
pub fn github_repo(name: &str, pushed_at: DateTime<Utc>) -> Value {
    json!({
        "name": name,
        "html_url": format!("https://github.com/me/{}", name),
        "ssh_url": format!("git@github.com:me/{}.git", name),
        "clone_url": format!("https://github.com/me/{}.git", name),
        "default_branch": "main",
        "description": format!("{} description", name),
        "private": false,
        "visibility": "public",
        "pushed_at": pushed_at.to_rfc3339(),
        "updated_at": pushed_at.to_rfc3339(),
    })
}

/// A GitLab `/api/v4/projects` item
pub fn gitlab_project(name: &str, last_activity_at: DateTime<Utc>) -> Value {
    json!({
        "name": name,
        "web_url": format!("https://gitlab.com/me/{}", name),
        "ssh_url_to_repo": format!("git@gitlab.com:me/{}.git", name),
        "http_url_to_repo": format!("https://gitlab.com/me/{}.git", name),
        "default_branch": null,
        "visibility": "internal",
        "description": null,
        "last_activity_at": last_activity_at.to_rfc3339(),
    })
}

/// A Gitea `/api/v1/user/repos` item
pub fn gitea_repo(name: &str, updated_at: DateTime<Utc>, private: bool) -> Value {
    json!({
        "name": name,
        "html_url": format!("https://gitea.example.com/me/{}", name),
        "ssh_url": format!("git@gitea.example.com:me/{}.git", name),
        "clone_url": format!("https://gitea.example.com/me/{}.git", name),
        "default_branch": "trunk",
        "description": "",
        "private": private,
        "updated_at": updated_at.to_rfc3339(),
    })
}
