//! Tracked project list management
//!
//! Tracking edits the in-memory [`Config`]; callers persist it afterwards.

use anyhow::{anyhow, bail, Result};
use tracing::info;

use crate::config::{Config, TrackedProject};
use crate::discovery::IndexEntry;
use crate::index;

/// Repository name from a clone URL: last path segment without `.git`
///
/// Handles HTTPS URLs and scp-style `git@host:owner/repo.git`.
pub fn project_name_from_url(clone_url: &str) -> Option<String> {
    let trimmed = clone_url.trim().trim_end_matches('/');
    let without_scheme = trimmed.split_once("://").map_or(trimmed, |(_, rest)| rest);
    let last = without_scheme.rsplit(['/', ':']).next()?;
    let name = last.strip_suffix(".git").unwrap_or(last);

    if name.is_empty() || name == without_scheme {
        None
    } else {
        Some(name.to_string())
    }
}

fn looks_like_url(target: &str) -> bool {
    target.contains("://") || target.contains('@') || target.contains(':')
}

/// Resolve a clone URL or an index repository name to a clone URL
pub fn resolve_clone_url(target: &str, entries: &[IndexEntry]) -> Result<String> {
    if looks_like_url(target) {
        return Ok(target.trim().to_string());
    }

    match index::find_by_name(entries, target).as_slice() {
        [] => bail!(
            "No repository named '{}' in the index. Run 'git-projects fetch' or pass a clone URL.",
            target
        ),
        [single] => Ok(single.repo.clone_url.clone()),
        several => {
            let foundries: Vec<&str> = several.iter().map(|e| e.foundry.as_str()).collect();
            bail!(
                "Repository name '{}' is ambiguous (found on: {}). Pass the clone URL instead.",
                target,
                foundries.join(", ")
            )
        }
    }
}

/// Add a project to `config`; `path` defaults to the name under the clone root
pub fn track(
    config: &mut Config,
    target: &str,
    path: Option<&str>,
    entries: &[IndexEntry],
) -> Result<TrackedProject> {
    let clone_url = resolve_clone_url(target, entries)?;

    if config.projects.iter().any(|p| p.clone_url == clone_url) {
        bail!("Already tracking: {}", clone_url);
    }

    let name = project_name_from_url(&clone_url)
        .ok_or_else(|| anyhow!("Cannot derive a project name from '{}'", clone_url))?;

    if config.projects.iter().any(|p| p.name == name) {
        bail!(
            "A project named '{}' is already tracked. Untrack it first.",
            name
        );
    }

    let project = TrackedProject {
        clone_url,
        path: path.map(str::to_string).unwrap_or_else(|| name.clone()),
        name,
    };

    info!("Tracking {} at {}", project.name, project.path);
    config.projects.push(project.clone());
    Ok(project)
}

/// Remove the project called `name` from `config`
pub fn untrack(config: &mut Config, name: &str) -> Result<TrackedProject> {
    let position = config
        .projects
        .iter()
        .position(|p| p.name == name)
        .ok_or_else(|| anyhow!("No project named '{}' found.", name))?;

    let removed = config.projects.remove(position);
    info!("Untracked {}", removed.name);
    Ok(removed)
}
