//! Foundry clients
//!
//! A foundry is a git hosting API (GitHub, GitLab, Gitea or a self-hosted
//! instance of one). Each client lists the repositories owned by the
//! authenticated identity and normalizes them into [`RemoteRepo`], following
//! RFC 5988 `Link: <...>; rel="next"` headers until the last page.

pub mod gitea;
pub mod github;
pub mod gitlab;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, LINK};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::OnceLock;
use tracing::{debug, warn};

use crate::config::{CloneUrlFormat, FoundryConfig, TimeoutConfig};
use crate::error::FetchError;

pub use gitea::GiteaFoundry;
pub use github::GitHubFoundry;
pub use gitlab::GitLabFoundry;

/// Identifying user agent sent with every API request
pub const USER_AGENT: &str = concat!("git-projects/", env!("CARGO_PKG_VERSION"));

/// Repository visibility as reported by the foundry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Internal,
    Private,
}

impl Visibility {
    pub fn from_private_flag(private: bool) -> Self {
        if private {
            Visibility::Private
        } else {
            Visibility::Public
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Internal => "internal",
            Visibility::Private => "private",
        }
    }
}

/// Normalized repository metadata, independent of the source API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRepo {
    pub name: String,

    /// Browser URL
    pub repo_url: String,

    /// SSH or HTTPS URL, fixed at fetch time by the clone URL format
    pub clone_url: String,

    pub pushed_at: DateTime<Utc>,

    /// Empty for repositories without commits
    pub default_branch: String,

    pub visibility: Visibility,

    /// Empty when the repository has no description
    pub description: String,
}

/// Capability implemented by every foundry type
#[async_trait]
pub trait Foundry: Send + Sync {
    /// Fetch every repository owned by the authenticated identity
    async fn fetch(
        &self,
        config: &FoundryConfig,
        format: CloneUrlFormat,
    ) -> Result<Vec<RemoteRepo>, FetchError>;

    /// Foundry type string this client serves, e.g. "github"
    fn kind(&self) -> &'static str;
}

/// Build the HTTP client shared by the foundry implementations
pub fn http_client(timeouts: &TimeoutConfig) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(timeouts.connect())
        .timeout(timeouts.request())
        .build()
}

/// Token check performed before any request is issued
pub(crate) fn require_token(config: &FoundryConfig) -> Result<&str, FetchError> {
    let token = config.token.trim();
    if token.is_empty() {
        return Err(FetchError::Authentication {
            foundry: config.name.clone(),
        });
    }
    Ok(token)
}

/// Base URL without trailing slashes, falling back to `default` when unset
pub(crate) fn base_url(config: &FoundryConfig, default: Option<&str>) -> Result<String, FetchError> {
    match config.url.as_deref().filter(|url| !url.trim().is_empty()).or(default) {
        Some(url) => Ok(url.trim().trim_end_matches('/').to_string()),
        None => Err(FetchError::MissingUrl {
            foundry: config.name.clone(),
        }),
    }
}

/// Issue `first_url` and every `rel="next"` page after it, concatenating items in order
pub(crate) async fn fetch_all_pages<T: DeserializeOwned>(
    client: &reqwest::Client,
    foundry: &str,
    first_url: String,
    authorization: &str,
    accept: &'static str,
) -> Result<Vec<T>, FetchError> {
    let transport = |source: reqwest::Error| FetchError::Transport {
        foundry: foundry.to_string(),
        source,
    };

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(authorization).map_err(|_| FetchError::Authentication {
            foundry: foundry.to_string(),
        })?,
    );
    headers.insert(ACCEPT, HeaderValue::from_static(accept));

    let mut items = Vec::new();
    let mut visited = HashSet::new();
    let mut next = Some(first_url);
    let mut page = 0usize;

    while let Some(url) = next {
        if !visited.insert(url.clone()) {
            warn!("{} repeated page link {}, stopping pagination", foundry, url);
            break;
        }
        page += 1;
        debug!("Fetching {} page {}: {}", foundry, page, url);

        let response = client
            .get(&url)
            .headers(headers.clone())
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Upstream {
                foundry: foundry.to_string(),
                status: status.as_u16(),
            });
        }

        next = response
            .headers()
            .get(LINK)
            .and_then(|value| value.to_str().ok())
            .and_then(next_link);

        let page_items: Vec<T> = response.json().await.map_err(transport)?;
        debug!("{} page {} returned {} items", foundry, page, page_items.len());
        items.extend(page_items);
    }

    Ok(items)
}

/// Extract the `rel="next"` target from an RFC 5988 `Link` header
pub fn next_link(header: &str) -> Option<String> {
    static NEXT: OnceLock<Option<regex::Regex>> = OnceLock::new();
    let pattern = NEXT
        .get_or_init(|| {
            regex::Regex::new(
                r#"^\s*<([^>]+)>\s*;.*\brel=(?:"(?:[^"]*\s)?next(?:\s[^"]*)?"|next\s*(?:;|$))"#,
            )
            .ok()
        })
        .as_ref()?;

    header
        .split(',')
        .find_map(|part| pattern.captures(part).map(|caps| caps[1].to_string()))
}

/// Description normalization shared by all field mappings
pub(crate) fn description_or_empty(description: Option<String>) -> String {
    description.unwrap_or_default()
}

/// Default-branch normalization: empty repositories report null
pub(crate) fn branch_or_empty(branch: Option<String>) -> String {
    branch.unwrap_or_default()
}

/// Raw repository item used by foundries whose field names follow GitHub
#[derive(Debug, Deserialize)]
pub(crate) struct HubStyleItem {
    pub name: String,
    pub html_url: String,
    pub ssh_url: String,
    pub clone_url: String,
    #[serde(default)]
    pub default_branch: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub private: bool,
}

impl HubStyleItem {
    pub fn clone_url_for(&self, format: CloneUrlFormat) -> String {
        match format {
            CloneUrlFormat::Ssh => self.ssh_url.clone(),
            CloneUrlFormat::Https => self.clone_url.clone(),
        }
    }
}
