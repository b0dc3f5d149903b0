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

/// Gitea (and Forgejo) REST API client (`/api/v1/user/repos`)
///
/// Gitea has no public default instance, so the foundry `url` is required.
pub struct GiteaFoundry {
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct GiteaRepo {
    #[serde(flatten)]
    common: HubStyleItem,
    #[serde(alias = "updated")]
    updated_at: DateTime<Utc>,
}

impl GiteaFoundry {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn normalize(item: GiteaRepo, format: CloneUrlFormat) -> RemoteRepo {
        let clone_url = item.common.clone_url_for(format);

        RemoteRepo {
            name: item.common.name,
            repo_url: item.common.html_url,
            clone_url,
            pushed_at: item.updated_at,
            default_branch: branch_or_empty(item.common.default_branch),
            visibility: Visibility::from_private_flag(item.common.private),
            description: description_or_empty(item.common.description),
        }
    }
}

#[async_trait]
impl Foundry for GiteaFoundry {
    async fn fetch(
        &self,
        config: &FoundryConfig,
        format: CloneUrlFormat,
    ) -> Result<Vec<RemoteRepo>, FetchError> {
        let token = require_token(config)?;
        let base = base_url(config, None)?;
        let url = format!("{}/api/v1/user/repos?limit=50&page=1", base);

        let items: Vec<GiteaRepo> = fetch_all_pages(
            &self.client,
            &config.name,
            url,
            &format!("token {}", token),
            "application/json",
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
        "gitea"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_visibility_derived_from_private_flag() {
        let raw: GiteaRepo = serde_json::from_value(json!({
            "name": "dotfiles",
            "html_url": "https://git.example.com/me/dotfiles",
            "ssh_url": "git@git.example.com:me/dotfiles.git",
            "clone_url": "https://git.example.com/me/dotfiles.git",
            "updated_at": "2026-03-01T09:00:00+01:00",
            "default_branch": "main",
            "description": "",
            "private": true
        }))
        .unwrap();

        let repo = GiteaFoundry::normalize(raw, CloneUrlFormat::Ssh);

        assert_eq!(repo.visibility, Visibility::Private);
        assert_eq!(repo.clone_url, "git@git.example.com:me/dotfiles.git");
        assert_eq!(repo.pushed_at.to_rfc3339(), "2026-03-01T08:00:00+00:00");
    }

    #[tokio::test]
    async fn test_missing_url_is_rejected_before_request() {
        let foundry = GiteaFoundry::new(reqwest::Client::new());
        let config = FoundryConfig {
            name: "home".to_string(),
            kind: "gitea".to_string(),
            url: None,
            token: "abc".to_string(),
        };

        let err = foundry.fetch(&config, CloneUrlFormat::Ssh).await.unwrap_err();
        assert!(matches!(err, FetchError::MissingUrl { .. }));
    }
}
