//! git-projects - repository discovery and local synchronization across git foundries
//!
//! Lists the repositories you own on GitHub, GitLab and Gitea, keeps an
//! offline index of them, and keeps a tracked subset cloned and in sync
//! under one directory.
//!
//! ## Modules
//!
//! - [`config`]: Configuration and the tracked project list
//! - [`foundry`]: Foundry API clients and the normalized [`RemoteRepo`]
//! - [`discovery`]: Multi-foundry aggregation into one ordered index
//! - [`index`]: Offline index snapshot and search
//! - [`git`]: Git subprocess execution and working copy probing
//! - [`sync`]: Per-project reconciliation state machine
//! - [`tracking`]: Track and untrack projects

pub mod config;
pub mod discovery;
pub mod error;
pub mod foundry;
pub mod git;
pub mod index;
pub mod sync;
pub mod tracking;

pub use config::{CloneUrlFormat, Config, FoundryConfig, TrackedProject};
pub use discovery::{Discovery, DiscoveryOptions, DiscoveryReport, FoundryRegistry, IndexEntry};
pub use error::{DiscoveryError, FetchError, GitError};
pub use foundry::{Foundry, RemoteRepo, Visibility};
pub use git::{GitClient, GitRunner, SystemGit};
pub use index::IndexStore;
pub use sync::{SyncEngine, SyncOutcome, SyncResult};
