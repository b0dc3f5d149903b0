use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use git_projects::discovery::{DiscoveryOptions, FoundryRegistry};
use git_projects::index::{self, IndexStore};
use git_projects::sync::SyncOutcome;
use git_projects::{
    tracking, Config, Discovery, DiscoveryError, FetchError, IndexEntry, SyncEngine, SystemGit,
};

#[derive(Parser)]
#[command(name = "git-projects")]
#[command(about = "Discover repositories across git foundries and keep local clones in sync")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (defaults to XDG config location)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage configuration
    Config {
        #[command(subcommand)]
        config_command: ConfigCommands,
    },

    /// Fetch repositories from the foundry APIs and refresh the index
    Fetch {
        /// Only query the foundry with this name
        foundry: Option<String>,

        /// Keep repositories regardless of last push
        #[arg(long)]
        all: bool,
    },

    /// Search the index from the last fetch
    Search {
        /// Case-insensitive match on name or description
        query: Option<String>,

        /// Only repositories pushed within this many days
        #[arg(long, conflicts_with = "all")]
        days: Option<i64>,

        /// Ignore the recency window
        #[arg(long)]
        all: bool,
    },

    /// Start tracking a repository by clone URL or index name
    Track {
        /// Clone URL, or a repository name from the index
        target: String,

        /// Local path, relative to clone_root unless absolute
        #[arg(long)]
        path: Option<String>,
    },

    /// Stop tracking a project
    Untrack {
        /// Project name
        name: String,
    },

    /// Show tracked projects
    List,

    /// Clone missing projects, pull and push existing ones
    Sync,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Create the default config file
    Init {
        /// Overwrite an existing config
        #[arg(short, long)]
        force: bool,
    },

    /// Show config file path and contents
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(path) => path,
        None => Config::default_config_path()?,
    };

    let command = match cli.command {
        Commands::Config { config_command } => {
            init_logging(cli.verbose, "warn")?;
            return cmd_config(config_command, &config_path);
        }
        command => command,
    };

    let config = Config::load(&config_path)?;
    init_logging(cli.verbose, &config.logging.level)?;
    info!("Starting git-projects v{}", env!("CARGO_PKG_VERSION"));

    match command {
        Commands::Config { .. } => Ok(()),
        Commands::Fetch { foundry, all } => cmd_fetch(foundry, all, &config).await,
        Commands::Search { query, days, all } => cmd_search(query, days, all, &config),
        Commands::Track { target, path } => cmd_track(&target, path, config, &config_path),
        Commands::Untrack { name } => cmd_untrack(&name, config, &config_path),
        Commands::List => cmd_list(&config),
        Commands::Sync => cmd_sync(&config).await,
    }
}

/// Initialize logging; RUST_LOG wins over the verbosity flag and config
fn init_logging(verbose: bool, level: &str) -> Result<()> {
    let default_level = if verbose { "debug" } else { level };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    Ok(())
}

fn cmd_config(config_command: ConfigCommands, config_path: &Path) -> Result<()> {
    match config_command {
        ConfigCommands::Init { force } => {
            let path = Config::init(config_path, force)?;
            println!("✅ Config written to {}", path.display());
            println!("   Next: add your foundry tokens, then run 'git-projects fetch'");
        }
        ConfigCommands::Show => {
            if !config_path.exists() {
                bail!("No config found. Run 'git-projects config init' first.");
            }
            let content = std::fs::read_to_string(config_path)
                .with_context(|| format!("Failed to read config file: {:?}", config_path))?;
            println!("{}", config_path.display());
            print!("{}", content);
        }
    }
    Ok(())
}

/// Discover repositories and replace the index
async fn cmd_fetch(foundry: Option<String>, all: bool, config: &Config) -> Result<()> {
    let registry =
        FoundryRegistry::with_defaults(&config.timeouts).context("Failed to create HTTP client")?;
    let discovery = Discovery::new(registry, config.clone_url_format);
    let options = DiscoveryOptions {
        foundry,
        max_age_days: if all { None } else { config.max_age_days },
    };

    println!("🔍 Discovering repositories...");
    let report = match discovery.discover(&config.foundries, &options).await {
        Ok(report) => report,
        Err(DiscoveryError::Fetch(e)) if e.is_invalid_token() => bail!(
            "{}. The token for foundry '{}' is invalid or lacks access.",
            e,
            e.foundry()
        ),
        Err(DiscoveryError::Fetch(e @ FetchError::Authentication { .. })) => bail!(
            "{}. Add a token for it in the config file.",
            e
        ),
        Err(e) => return Err(e.into()),
    };

    let store = IndexStore::at_default_location()?;
    let location = store.persist(&report.entries)?;

    for (name, count) in &report.counts {
        println!();
        println!("{}  {} repos", name.to_uppercase(), count);
        println!("{}", "─".repeat(60));
        for entry in report.entries.iter().filter(|e| &e.foundry == name) {
            print_entry(entry);
        }
    }

    println!();
    println!("📇 Index saved to {}", location.display());
    Ok(())
}

/// Search the offline index
fn cmd_search(query: Option<String>, days: Option<i64>, all: bool, config: &Config) -> Result<()> {
    let store = IndexStore::at_default_location()?;
    let Some(snapshot) = store.load_snapshot()? else {
        println!("No index yet. Run 'git-projects fetch' first.");
        return Ok(());
    };

    let max_age_days = if all { None } else { days.or(config.max_age_days) };
    let hits = index::search(&snapshot.repos, query.as_deref(), max_age_days);

    println!(
        "Repositories ({} of {}, index from {}):",
        hits.len(),
        snapshot.repos.len(),
        snapshot.updated_at.format("%Y-%m-%d %H:%M UTC")
    );
    for entry in &hits {
        print_entry(entry);
    }
    Ok(())
}

fn cmd_track(
    target: &str,
    path: Option<String>,
    mut config: Config,
    config_path: &Path,
) -> Result<()> {
    let entries = IndexStore::at_default_location()?.load()?;
    let project = tracking::track(&mut config, target, path.as_deref(), &entries)?;
    config.save(config_path)?;

    let clone_root = config.clone_root_path()?;
    println!(
        "Tracking {} → {}",
        project.name,
        project.resolve_path(&clone_root).display()
    );
    Ok(())
}

fn cmd_untrack(name: &str, mut config: Config, config_path: &Path) -> Result<()> {
    let project = tracking::untrack(&mut config, name)?;
    config.save(config_path)?;

    println!("Untracked {}", project.name);
    Ok(())
}

fn cmd_list(config: &Config) -> Result<()> {
    if config.projects.is_empty() {
        println!("No projects tracked. Use 'git-projects track <clone_url>' to add one.");
        return Ok(());
    }

    let clone_root = config.clone_root_path()?;
    for project in &config.projects {
        println!(
            "{}  {}",
            project.name,
            project.resolve_path(&clone_root).display()
        );
    }
    Ok(())
}

/// Reconcile every tracked project with its working copy
async fn cmd_sync(config: &Config) -> Result<()> {
    if config.projects.is_empty() {
        println!("No projects tracked. Use 'git-projects track <clone_url>' to add one.");
        return Ok(());
    }

    let clone_root = config.clone_root_path()?;
    let engine = SyncEngine::new(SystemGit::new(config.timeouts.git()), clone_root);

    println!("🔄 Syncing {} projects", config.projects.len());
    let mut report = |name: &str, outcome: &SyncOutcome| {
        let icon = match outcome {
            SyncOutcome::Cloned => "📥",
            SyncOutcome::Synced => "✅",
            SyncOutcome::SkippedDirty => "⚠️ ",
            SyncOutcome::Errored(_) => "❌",
        };
        println!("   {} {}: {}", icon, name, outcome);
    };

    let result = engine.sync(&config.projects, Some(&mut report)).await;

    println!();
    println!("🎉 Sync complete: {}", result.counts());

    if result.has_errors() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_entry(entry: &IndexEntry) {
    let repo = &entry.repo;
    println!();
    println!(
        "{:<44}{:>16}",
        repo.name,
        repo.pushed_at.format("%Y-%m-%d")
    );
    println!("  {}  [{}]", repo.clone_url, repo.visibility.as_str());
    if !repo.description.is_empty() {
        let description: String = if repo.description.chars().count() > 60 {
            repo.description.chars().take(59).chain(['…']).collect()
        } else {
            repo.description.clone()
        };
        println!("  {}", description);
    }
}
