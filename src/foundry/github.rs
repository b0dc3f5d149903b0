use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;

use super::{
    base_url, branch_or_empty, description_or_empty, fetch_all_pages, require_token, Foundry,
    HubStyleItem, RemoteRepo, Visibility,
};
use crate::config::{CloneUrlFormat, FoundryConfig};
use crate::error::FetchError;

pub const DEFAULT_URL: &str = "https://api.github.com";

/// GitHub REST API client (`/user/repos`)
pub struct GitHubFoundry {
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct GitHubRepo {
    #[serde(flatten)]
    common: HubStyleItem,
    /// Null for repositories that never received a push
    #[serde(default)]
    pushed_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    visibility: Option<Visibility>,
}

impl GitHubFoundry {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn normalize(item: GitHubRepo, format: CloneUrlFormat) -> RemoteRepo {
        let clone_url = item.common.clone_url_for(format);
        let visibility = item
            .visibility
            .unwrap_or_else(|| Visibility::from_private_flag(item.common.private));

        RemoteRepo {
            name: item.common.name,
            repo_url: item.common.html_url,
            clone_url,
            pushed_at: item.pushed_at.unwrap_or(item.updated_at),
            default_branch: branch_or_empty(item.common.default_branch),
            visibility,
            description: description_or_empty(item.common.description),
        }
    }
}

#[async_trait]
impl Foundry for GitHubFoundry {
    async fn fetch(
        &self,
        config: &FoundryConfig,
        format: CloneUrlFormat,
    ) -> Result<Vec<RemoteRepo>, FetchError> {
        let token = require_token(config)?;
        let base = base_url(config, Some(DEFAULT_URL))?;
        let url = format!(
            "{}/user/repos?affiliation=owner&sort=pushed&direction=desc&per_page=100",
            base
        );

        let items: Vec<GitHubRepo> = fetch_all_pages(
            &self.client,
            &config.name,
            url,
            &format!("Bearer {}", token),
            "application/vnd.github+json",
        )
        .await?;

        let repos: Vec<RemoteRepo> = items
            .into_iter()
            .map(|item| Self::normalize(item, format))
            .collect();

        info!("Found {} repositories on {}", repos.len(), config.name);
        Ok(repos)
    }

    fn kind(&self) -> &'static str {
        "github"
    }
}
