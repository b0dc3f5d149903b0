//! Repository Index Store
//!
//! Holds the snapshot written by the last discovery run so repositories can
//! be browsed offline and names resolved when tracking. Every persist is a
//! full overwrite.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use dirs::data_dir;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::discovery::IndexEntry;

/// Environment variable overriding the index location
pub const INDEX_PATH_ENV: &str = "GIT_PROJECTS_INDEX";

/// On-disk index document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSnapshot {
    /// When the snapshot was written
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub repos: Vec<IndexEntry>,
}

/// JSON-file backed index store
#[derive(Debug, Clone)]
pub struct IndexStore {
    path: PathBuf,
}

impl IndexStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the default data location (XDG compliant)
    pub fn at_default_location() -> Result<Self> {
        Ok(Self::new(Self::default_path()?))
    }

    /// `$GIT_PROJECTS_INDEX` when set, otherwise `index.json` under the user data directory
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = std::env::var_os(INDEX_PATH_ENV).filter(|p| !p.is_empty()) {
            return Ok(PathBuf::from(path));
        }

        let data_dir = data_dir().context("Failed to get user data directory")?;

        Ok(data_dir.join("git-projects").join("index.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the stored index with `entries` and return its location
    pub fn persist(&self, entries: &[IndexEntry]) -> Result<PathBuf> {
        let snapshot = IndexSnapshot {
            updated_at: Utc::now(),
            repos: entries.to_vec(),
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create index directory: {:?}", parent))?;
        }

        let content =
            serde_json::to_string_pretty(&snapshot).context("Failed to serialize index")?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to write index file: {:?}", self.path))?;

        info!("Saved {} repositories to {:?}", entries.len(), self.path);
        Ok(self.path.clone())
    }

    /// Last snapshot, or `None` when discovery never ran
    pub fn load_snapshot(&self) -> Result<Option<IndexSnapshot>> {
        if !self.path.exists() {
            debug!("No index at {:?}", self.path);
            return Ok(None);
        }

        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read index file: {:?}", self.path))?;
        let snapshot: IndexSnapshot = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse index file: {:?}", self.path))?;

        Ok(Some(snapshot))
    }

    /// Stored entries; empty when no snapshot exists
    pub fn load(&self) -> Result<Vec<IndexEntry>> {
        Ok(self
            .load_snapshot()?
            .map(|snapshot| snapshot.repos)
            .unwrap_or_default())
    }
}

/// Case-insensitive match on name or description, optionally limited to recent pushes
///
/// Input order is preserved.
pub fn search(entries: &[IndexEntry], query: Option<&str>, max_age_days: Option<i64>) -> Vec<IndexEntry> {
    search_at(entries, query, max_age_days, Utc::now())
}

/// [`search`] with an explicit evaluation time
pub fn search_at(
    entries: &[IndexEntry],
    query: Option<&str>,
    max_age_days: Option<i64>,
    now: DateTime<Utc>,
) -> Vec<IndexEntry> {
    let needle = query
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_lowercase);
    let cutoff = max_age_days.and_then(|days| recency_cutoff(now, days));

    entries
        .iter()
        .filter(|entry| match &needle {
            Some(needle) => {
                entry.repo.name.to_lowercase().contains(needle)
                    || entry.repo.description.to_lowercase().contains(needle)
            }
            None => true,
        })
        .filter(|entry| cutoff.map_or(true, |cutoff| entry.repo.pushed_at >= cutoff))
        .cloned()
        .collect()
}

/// Oldest push time inside a `days` window ending at `now`
///
/// `None` when the window reaches past the representable range, which means no cutoff.
pub fn recency_cutoff(now: DateTime<Utc>, days: i64) -> Option<DateTime<Utc>> {
    Duration::try_days(days).and_then(|window| now.checked_sub_signed(window))
}

/// Every entry whose repository name equals `name`, in index order
pub fn find_by_name<'a>(entries: &'a [IndexEntry], name: &str) -> Vec<&'a IndexEntry> {
    entries.iter().filter(|entry| entry.repo.name == name).collect()
}
