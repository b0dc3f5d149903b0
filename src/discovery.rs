//! Repository discovery across configured foundries
//!
//! Foundry clients are looked up in a [`FoundryRegistry`] keyed by the
//! foundry type string, so new foundry types plug in without touching the
//! aggregator. Results from every foundry are merged into one index ordered
//! by push time.

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::{CloneUrlFormat, FoundryConfig, TimeoutConfig};
use crate::error::{DiscoveryError, FetchError};
use crate::foundry::{self, Foundry, GitHubFoundry, GitLabFoundry, GiteaFoundry, RemoteRepo};
use crate::index;

/// A discovered repository tagged with the foundry it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub foundry: String,
    #[serde(flatten)]
    pub repo: RemoteRepo,
}

/// Map from foundry type string to client implementation
#[derive(Default, Clone)]
pub struct FoundryRegistry {
    clients: HashMap<String, Arc<dyn Foundry>>,
}

impl FoundryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the GitHub, GitLab and Gitea clients sharing one HTTP client
    pub fn with_defaults(timeouts: &TimeoutConfig) -> reqwest::Result<Self> {
        let http = foundry::http_client(timeouts)?;

        let mut registry = Self::new();
        registry.register(Arc::new(GitHubFoundry::new(http.clone())));
        registry.register(Arc::new(GitLabFoundry::new(http.clone())));
        registry.register(Arc::new(GiteaFoundry::new(http)));
        Ok(registry)
    }

    /// Register a client under its own type string, replacing any previous one
    pub fn register(&mut self, client: Arc<dyn Foundry>) {
        self.clients.insert(client.kind().to_string(), client);
    }

    pub fn get(&self, kind: &str) -> Option<&Arc<dyn Foundry>> {
        self.clients.get(kind)
    }
}

/// Per-run discovery settings
#[derive(Debug, Clone, Default)]
pub struct DiscoveryOptions {
    /// Restrict the run to the foundry with this name
    pub foundry: Option<String>,

    /// Drop repositories not pushed within this many days
    pub max_age_days: Option<i64>,
}

/// Outcome of a discovery run
#[derive(Debug, Clone, Default)]
pub struct DiscoveryReport {
    /// Merged index, newest push first
    pub entries: Vec<IndexEntry>,

    /// Kept repositories per queried foundry, in config order
    pub counts: Vec<(String, usize)>,
}

/// Aggregates every configured foundry into one repository index
pub struct Discovery {
    registry: FoundryRegistry,
    clone_url_format: CloneUrlFormat,
}

impl Discovery {
    pub fn new(registry: FoundryRegistry, clone_url_format: CloneUrlFormat) -> Self {
        Self {
            registry,
            clone_url_format,
        }
    }

    /// Query the configured foundries and merge their repositories
    ///
    /// Foundries are queried concurrently. The first error aborts the whole
    /// run so a partial result never replaces a complete index.
    pub async fn discover(
        &self,
        foundries: &[FoundryConfig],
        options: &DiscoveryOptions,
    ) -> Result<DiscoveryReport, DiscoveryError> {
        self.discover_at(foundries, options, Utc::now()).await
    }

    /// [`Discovery::discover`] with an explicit evaluation time for the recency filter
    pub async fn discover_at(
        &self,
        foundries: &[FoundryConfig],
        options: &DiscoveryOptions,
        now: DateTime<Utc>,
    ) -> Result<DiscoveryReport, DiscoveryError> {
        let selected: Vec<&FoundryConfig> = match &options.foundry {
            Some(name) => {
                let matching: Vec<_> = foundries.iter().filter(|f| &f.name == name).collect();
                if matching.is_empty() {
                    return Err(DiscoveryError::UnknownFoundry(name.clone()));
                }
                matching
            }
            None => foundries.iter().collect(),
        };

        let queries = selected.into_iter().filter_map(|config| {
            match self.registry.get(&config.kind) {
                Some(client) => Some(self.fetch_one(client.clone(), config)),
                None => {
                    debug!(
                        "Skipping foundry {} with unsupported type: {}",
                        config.name, config.kind
                    );
                    None
                }
            }
        });

        let per_foundry = try_join_all(queries).await?;

        let cutoff = options
            .max_age_days
            .and_then(|days| index::recency_cutoff(now, days));
        let mut report = DiscoveryReport::default();
        let mut seen = HashSet::new();

        for (name, repos) in per_foundry {
            let kept: Vec<RemoteRepo> = repos
                .into_iter()
                .filter(|repo| cutoff.map_or(true, |cutoff| repo.pushed_at >= cutoff))
                .filter(|repo| {
                    // Two foundry entries pointing at one instance list the same repos
                    let first = seen.insert(repo.clone_url.clone());
                    if !first {
                        debug!("Dropping duplicate {} from {}", repo.clone_url, name);
                    }
                    first
                })
                .collect();

            info!("Discovered {} repositories from {}", kept.len(), name);
            report.counts.push((name.clone(), kept.len()));
            report.entries.extend(kept.into_iter().map(|repo| IndexEntry {
                foundry: name.clone(),
                repo,
            }));
        }

        sort_by_recency(&mut report.entries);
        Ok(report)
    }

    async fn fetch_one(
        &self,
        client: Arc<dyn Foundry>,
        config: &FoundryConfig,
    ) -> Result<(String, Vec<RemoteRepo>), FetchError> {
        debug!("Querying foundry {} ({})", config.name, config.kind);
        let repos = client.fetch(config, self.clone_url_format).await?;
        Ok((config.name.clone(), repos))
    }
}

/// Stable sort by push time, newest first
///
/// Entries pushed at the same instant keep their relative order, which is
/// the per-foundry fetch order with foundries in config order.
pub fn sort_by_recency(entries: &mut [IndexEntry]) {
    entries.sort_by(|a, b| b.repo.pushed_at.cmp(&a.repo.pushed_at));
}
