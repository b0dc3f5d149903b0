use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command as AsyncCommand;
use tracing::{debug, info};

use crate::error::GitError;

/// Captured result of one git invocation
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GitOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl GitOutput {
    /// Convert a non-zero exit into [`GitError::Failed`] carrying stderr
    pub fn into_result(self) -> Result<GitOutput, GitError> {
        if self.success {
            return Ok(self);
        }

        let stderr = self.stderr.trim();
        Err(GitError::Failed {
            stderr: if stderr.is_empty() {
                "git exited with a non-zero status".to_string()
            } else {
                stderr.to_string()
            },
        })
    }
}

/// Executes git as a subprocess
///
/// Every call is one OS process. Implementations must bound the call in time.
#[async_trait]
pub trait GitRunner: Send + Sync {
    async fn run(&self, args: &[String]) -> Result<GitOutput, GitError>;
}

/// Runs the `git` binary found on PATH
#[derive(Debug, Clone)]
pub struct SystemGit {
    timeout: Duration,
}

impl SystemGit {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl GitRunner for SystemGit {
    async fn run(&self, args: &[String]) -> Result<GitOutput, GitError> {
        debug!("Running git {}", args.join(" "));

        let child = AsyncCommand::new("git")
            .args(args)
            // A credential prompt would otherwise block until the timeout
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) => Ok(GitOutput {
                success: output.status.success(),
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            }),
            Ok(Err(e)) => Err(GitError::Spawn(e)),
            Err(_) => Err(GitError::TimedOut {
                secs: self.timeout.as_secs(),
            }),
        }
    }
}

/// Git operations on local working copies
pub struct GitClient<R> {
    runner: R,
}

impl<R: GitRunner> GitClient<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Whether anything exists at `path`
    pub fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    /// True when `status --porcelain` reports anything at all
    ///
    /// Staged, unstaged and untracked changes are not distinguished.
    pub async fn is_dirty(&self, path: &Path) -> Result<bool, GitError> {
        let output = self
            .runner
            .run(&in_dir(path, &["status", "--porcelain"]))
            .await?
            .into_result()?;

        Ok(!output.stdout.trim().is_empty())
    }

    /// Clone `url` into `path`, creating parent directories as needed
    pub async fn clone_repository(&self, url: &str, path: &Path) -> Result<(), GitError> {
        info!("Cloning repository: {} -> {}", url, path.display());

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(GitError::Io)?;
        }

        let args = vec![
            "clone".to_string(),
            url.to_string(),
            path.to_string_lossy().to_string(),
        ];
        self.runner.run(&args).await?.into_result()?;
        Ok(())
    }

    /// Pull the checked-out branch
    pub async fn pull(&self, path: &Path) -> Result<(), GitError> {
        debug!("Pulling {}", path.display());
        self.runner.run(&in_dir(path, &["pull"])).await?.into_result()?;
        Ok(())
    }

    /// Push the checked-out branch to its configured upstream
    pub async fn push(&self, path: &Path) -> Result<(), GitError> {
        debug!("Pushing {}", path.display());
        self.runner.run(&in_dir(path, &["push"])).await?.into_result()?;
        Ok(())
    }
}

/// `-C <path>` followed by `args`
fn in_dir(path: &Path, args: &[&str]) -> Vec<String> {
    let mut full = vec!["-C".to_string(), path.to_string_lossy().to_string()];
    full.extend(args.iter().map(|arg| arg.to_string()));
    full
}
