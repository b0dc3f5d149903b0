use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;

use super::{
    base_url, branch_or_empty, description_or_empty, fetch_all_pages, require_token, Foundry,
    RemoteRepo, Visibility,
};
use crate::config::{CloneUrlFormat, FoundryConfig};
use crate::error::FetchError;

pub const DEFAULT_URL: &str = "https://gitlab.com";

/// GitLab REST API client (`/api/v4/projects?owned=true`)
pub struct GitLabFoundry {
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct GitLabProject {
    name: String,
    web_url: String,
    ssh_url_to_repo: String,
    http_url_to_repo: String,
    last_activity_at: DateTime<Utc>,
    #[serde(default)]
    default_branch: Option<String>,
    visibility: Visibility,
    #[serde(default)]
    description: Option<String>,
}

impl GitLabFoundry {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn normalize(item: GitLabProject, format: CloneUrlFormat) -> RemoteRepo {
        let clone_url = match format {
            CloneUrlFormat::Ssh => item.ssh_url_to_repo,
            CloneUrlFormat::Https => item.http_url_to_repo,
        };

        RemoteRepo {
            name: item.name,
            repo_url: item.web_url,
            clone_url,
            pushed_at: item.last_activity_at,
            default_branch: branch_or_empty(item.default_branch),
            visibility: item.visibility,
            description: description_or_empty(item.description),
        }
    }
}

#[async_trait]
impl Foundry for GitLabFoundry {
    async fn fetch(
        &self,
        config: &FoundryConfig,
        format: CloneUrlFormat,
    ) -> Result<Vec<RemoteRepo>, FetchError> {
        let token = require_token(config)?;
        let base = base_url(config, Some(DEFAULT_URL))?;
        let url = format!(
            "{}/api/v4/projects?owned=true&order_by=last_activity_at&sort=desc&per_page=100",
            base
        );

        let items: Vec<GitLabProject> = fetch_all_pages(
            &self.client,
            &config.name,
            url,
            &format!("Bearer {}", token),
            "application/json",
        )
        .await?;

        let repos: Vec<RemoteRepo> = items
            .into_iter()
            .map(|item| Self::normalize(item, format))
            .collect();

        info!("Found {} projects on {}", repos.len(), config.name);
        Ok(repos)
    }

    fn kind(&self) -> &'static str {
        "gitlab"
    }
}
