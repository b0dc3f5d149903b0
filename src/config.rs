use anyhow::{bail, Context, Result};
use dirs::config_dir;
use path_clean::PathClean;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Document written by `config init`
pub const DEFAULT_CONFIG: &str = r#"clone_root: ~/projects    # where repos get cloned
clone_url_format: ssh     # ssh or https
max_age_days: 180         # hide repos not pushed within this window (null = keep all)
foundries:
  - name: github
    type: github
    url: https://api.github.com
    token: ""              # paste your token here
  # - name: my-gitlab
  #   type: gitlab
  #   url: https://gitlab.com
  #   token: ""
  # - name: my-gitea
  #   type: gitea
  #   url: https://gitea.example.com
  #   token: ""
projects: []
"#;

/// Main configuration structure for git-projects
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    /// Directory tracked projects are cloned under
    #[serde(default = "default_clone_root")]
    pub clone_root: String,

    /// Protocol used for clone URLs at fetch time
    #[serde(default)]
    pub clone_url_format: CloneUrlFormat,

    /// Recency window for fetch and search
    #[serde(default = "default_max_age_days")]
    pub max_age_days: Option<i64>,

    /// Configured foundry APIs, in query order
    #[serde(default)]
    pub foundries: Vec<FoundryConfig>,

    /// Projects kept in sync locally
    #[serde(default)]
    pub projects: Vec<TrackedProject>,

    /// Network and subprocess timeouts
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// One configured foundry endpoint
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct FoundryConfig {
    pub name: String,

    /// Foundry type: "github", "gitlab" or "gitea"
    #[serde(rename = "type")]
    pub kind: String,

    /// API base URL; GitHub and GitLab fall back to their public instances
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default)]
    pub token: String,
}

/// Clone URL protocol preference
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CloneUrlFormat {
    /// git@github.com:user/repo.git
    #[default]
    Ssh,
    /// https://github.com/user/repo.git
    Https,
}

/// A repository the user keeps synchronized locally
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct TrackedProject {
    pub clone_url: String,
    pub name: String,

    /// Local path, relative to the clone root unless absolute or `~`-prefixed
    pub path: String,
}

impl TrackedProject {
    /// Absolute local path of this project's working copy
    pub fn resolve_path(&self, clone_root: &Path) -> PathBuf {
        let expanded = PathBuf::from(shellexpand::tilde(&self.path).as_ref());
        if expanded.is_absolute() {
            expanded.clean()
        } else {
            clone_root.join(expanded).clean()
        }
    }
}

/// Timeout configuration
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct TimeoutConfig {
    /// TCP connect timeout for foundry requests, in seconds
    #[serde(default = "default_connect_secs")]
    pub connect_secs: u64,

    /// Whole-request timeout for a single page, in seconds
    #[serde(default = "default_request_secs")]
    pub request_secs: u64,

    /// Ceiling for any git subprocess, in seconds
    #[serde(default = "default_git_secs")]
    pub git_secs: u64,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_clone_root() -> String {
    "~/projects".to_string()
}
fn default_max_age_days() -> Option<i64> {
    Some(180)
}
fn default_connect_secs() -> u64 {
    10
}
fn default_request_secs() -> u64 {
    30
}
fn default_git_secs() -> u64 {
    300
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: default_connect_secs(),
            request_secs: default_request_secs(),
            git_secs: default_git_secs(),
        }
    }
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }

    pub fn git(&self) -> Duration {
        Duration::from_secs(self.git_secs)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Write the default configuration document and return its path
    pub fn init(path: &Path, force: bool) -> Result<PathBuf> {
        if path.exists() && !force {
            bail!(
                "Config already exists at {}. Use --force to overwrite.",
                path.display()
            );
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        std::fs::write(path, DEFAULT_CONFIG)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        tracing::info!("Created default configuration at: {:?}", path);
        Ok(path.to_path_buf())
    }

    /// Load configuration from a specific file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            bail!(
                "No config found at {}. Run 'git-projects config init' first.",
                path.display()
            );
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        Self::parse(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Parse a configuration document
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(content)?;

        for foundry in &config.foundries {
            if config
                .foundries
                .iter()
                .filter(|other| other.name == foundry.name)
                .count()
                > 1
            {
                bail!("Duplicate foundry name: {}", foundry.name);
            }
        }

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self).context("Failed to serialize configuration")?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    /// Get the default configuration file path (XDG compliant)
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = config_dir().context("Failed to get user config directory")?;

        Ok(config_dir.join("git-projects").join("config.yaml"))
    }

    /// Clone root with `~` and environment variables expanded
    pub fn clone_root_path(&self) -> Result<PathBuf> {
        let expanded = shellexpand::full(&self.clone_root)
            .context("Failed to expand clone_root path")?;

        Ok(PathBuf::from(expanded.as_ref()).clean())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            clone_root: default_clone_root(),
            clone_url_format: CloneUrlFormat::default(),
            max_age_days: default_max_age_days(),
            foundries: vec![FoundryConfig {
                name: "github".to_string(),
                kind: "github".to_string(),
                url: Some("https://api.github.com".to_string()),
                token: String::new(),
            }],
            projects: Vec::new(),
            timeouts: TimeoutConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
