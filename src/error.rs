//! Error taxonomy shared by the discovery and sync layers
//!
//! Discovery errors abort a run; git errors are recorded per project by the
//! sync engine and never abort a batch.

use thiserror::Error;

/// Failure while fetching repositories from a single foundry
#[derive(Debug, Error)]
pub enum FetchError {
    /// No token configured; raised before any network call
    #[error("no token configured for foundry '{foundry}'")]
    Authentication { foundry: String },

    /// The foundry type needs an explicit base URL and none was configured
    #[error("no url configured for foundry '{foundry}'")]
    MissingUrl { foundry: String },

    /// The API answered with a non-success status
    #[error("foundry '{foundry}' returned HTTP {status}")]
    Upstream { foundry: String, status: u16 },

    /// Connection, timeout or body decoding failure
    #[error("request to foundry '{foundry}' failed: {source}")]
    Transport {
        foundry: String,
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    /// True when the upstream rejected the configured token
    pub fn is_invalid_token(&self) -> bool {
        matches!(self, FetchError::Upstream { status: 401 | 403, .. })
    }

    pub fn foundry(&self) -> &str {
        match self {
            FetchError::Authentication { foundry }
            | FetchError::MissingUrl { foundry }
            | FetchError::Upstream { foundry, .. }
            | FetchError::Transport { foundry, .. } => foundry,
        }
    }
}

/// Failure of a discovery run across all configured foundries
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("no foundry named '{0}' in config")]
    UnknownFoundry(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Failure of a single git subprocess
#[derive(Debug, Error)]
pub enum GitError {
    /// Non-zero exit; carries the captured standard error
    #[error("{stderr}")]
    Failed { stderr: String },

    #[error("git operation timed out after {secs}s")]
    TimedOut { secs: u64 },

    #[error("failed to run git: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("failed to prepare working copy: {0}")]
    Io(#[source] std::io::Error),
}
