//! Sync Engine - reconciles tracked projects with local working copies
//!
//! Each project walks a small state machine: a missing working copy is
//! cloned, a dirty one is left alone, a clean one is pulled and then pushed.
//! Projects are processed one after another and every failure is recorded
//! against its project without stopping the batch.

use std::fmt;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::TrackedProject;
use crate::error::GitError;
use crate::git::{GitClient, GitRunner};

/// Terminal outcome for one project
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Cloned,
    Synced,
    SkippedDirty,
    /// Carries the failing git invocation's stderr
    Errored(String),
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncOutcome::Cloned => write!(f, "cloned"),
            SyncOutcome::Synced => write!(f, "synced"),
            SyncOutcome::SkippedDirty => write!(f, "skipped (dirty)"),
            SyncOutcome::Errored(message) => write!(f, "error: {}", message),
        }
    }
}

/// Position of one project in the reconciliation state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectState {
    Start,
    Cloning,
    CheckingDirty,
    Pulling,
    Pushing,
    Done(SyncOutcome),
}

impl ProjectState {
    /// After checking whether the working copy exists
    pub fn located(exists: bool) -> Self {
        if exists {
            ProjectState::CheckingDirty
        } else {
            ProjectState::Cloning
        }
    }

    pub fn cloned(result: Result<(), GitError>) -> Self {
        match result {
            Ok(()) => ProjectState::Done(SyncOutcome::Cloned),
            Err(e) => ProjectState::Done(SyncOutcome::Errored(e.to_string())),
        }
    }

    pub fn probed(dirty: Result<bool, GitError>) -> Self {
        match dirty {
            Ok(true) => ProjectState::Done(SyncOutcome::SkippedDirty),
            Ok(false) => ProjectState::Pulling,
            Err(e) => ProjectState::Done(SyncOutcome::Errored(e.to_string())),
        }
    }

    /// A failed pull ends the project; push is never attempted
    pub fn pulled(result: Result<(), GitError>) -> Self {
        match result {
            Ok(()) => ProjectState::Pushing,
            Err(e) => ProjectState::Done(SyncOutcome::Errored(e.to_string())),
        }
    }

    /// A failed push reports the project as errored even though the pull landed
    pub fn pushed(result: Result<(), GitError>) -> Self {
        match result {
            Ok(()) => ProjectState::Done(SyncOutcome::Synced),
            Err(e) => ProjectState::Done(SyncOutcome::Errored(e.to_string())),
        }
    }
}

/// Per-batch result, one ordered list per outcome kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncResult {
    cloned: Vec<String>,
    synced: Vec<String>,
    skipped: Vec<String>,
    errored: Vec<(String, String)>,
}

/// Aggregate counts for the summary line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncCounts {
    pub cloned: usize,
    pub synced: usize,
    pub skipped: usize,
    pub errored: usize,
}

impl fmt::Display for SyncCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} cloned, {} synced, {} skipped, {} errored",
            self.cloned, self.synced, self.skipped, self.errored
        )
    }
}

impl SyncResult {
    fn record(&mut self, name: &str, outcome: SyncOutcome) {
        let name = name.to_string();
        match outcome {
            SyncOutcome::Cloned => self.cloned.push(name),
            SyncOutcome::Synced => self.synced.push(name),
            SyncOutcome::SkippedDirty => self.skipped.push(name),
            SyncOutcome::Errored(message) => self.errored.push((name, message)),
        }
    }

    pub fn cloned(&self) -> &[String] {
        &self.cloned
    }

    pub fn synced(&self) -> &[String] {
        &self.synced
    }

    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    /// `(project name, error detail)` pairs
    pub fn errored(&self) -> &[(String, String)] {
        &self.errored
    }

    pub fn counts(&self) -> SyncCounts {
        SyncCounts {
            cloned: self.cloned.len(),
            synced: self.synced.len(),
            skipped: self.skipped.len(),
            errored: self.errored.len(),
        }
    }

    pub fn total(&self) -> usize {
        self.cloned.len() + self.synced.len() + self.skipped.len() + self.errored.len()
    }

    pub fn has_errors(&self) -> bool {
        !self.errored.is_empty()
    }
}

/// Progress callback invoked once per project with its outcome
pub type ProgressFn<'a> = dyn FnMut(&str, &SyncOutcome) + 'a;

/// Drives the reconciliation state machine over a list of tracked projects
pub struct SyncEngine<R> {
    git: GitClient<R>,
    clone_root: PathBuf,
}

impl<R: GitRunner> SyncEngine<R> {
    pub fn new(runner: R, clone_root: impl Into<PathBuf>) -> Self {
        Self {
            git: GitClient::new(runner),
            clone_root: clone_root.into(),
        }
    }

    pub fn git(&self) -> &GitClient<R> {
        &self.git
    }

    /// Synchronize `projects` strictly in order, one at a time
    pub async fn sync(
        &self,
        projects: &[TrackedProject],
        mut on_progress: Option<&mut ProgressFn<'_>>,
    ) -> SyncResult {
        let start_time = Instant::now();
        let mut result = SyncResult::default();

        for project in projects {
            let outcome = self.sync_project(project).await;

            if let SyncOutcome::Errored(message) = &outcome {
                warn!("Sync failed for {}: {}", project.name, message);
            }
            if let Some(progress) = on_progress.as_deref_mut() {
                progress(project.name.as_str(), &outcome);
            }
            result.record(&project.name, outcome);
        }

        info!(
            "Sync completed in {:.2}s: {}",
            start_time.elapsed().as_secs_f64(),
            result.counts()
        );
        result
    }

    /// Run one project from `Start` to a terminal outcome
    pub async fn sync_project(&self, project: &TrackedProject) -> SyncOutcome {
        let path = project.resolve_path(&self.clone_root);
        let mut state = ProjectState::Start;

        loop {
            state = match state {
                ProjectState::Start => ProjectState::located(self.git.exists(&path)),
                ProjectState::Cloning => ProjectState::cloned(
                    self.git
                        .clone_repository(&project.clone_url, &path)
                        .await,
                ),
                ProjectState::CheckingDirty => ProjectState::probed(self.git.is_dirty(&path).await),
                ProjectState::Pulling => ProjectState::pulled(self.git.pull(&path).await),
                ProjectState::Pushing => ProjectState::pushed(self.git.push(&path).await),
                ProjectState::Done(outcome) => return outcome,
            };
            debug!("{} -> {:?}", project.name, state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::GitOutput;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Fake git: answers per subcommand and records every invocation
    #[derive(Default)]
    struct ScriptedGit {
        responses: HashMap<&'static str, GitOutput>,
        calls: Mutex<Vec<Vec<String>>>,
    }

    impl ScriptedGit {
        fn respond(mut self, subcommand: &'static str, success: bool, stdout: &str, stderr: &str) -> Self {
            self.responses.insert(
                subcommand,
                GitOutput {
                    success,
                    stdout: stdout.to_string(),
                    stderr: stderr.to_string(),
                },
            );
            self
        }

        fn subcommands(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .map(|args| subcommand(args).to_string())
                .collect()
        }
    }

    fn subcommand(args: &[String]) -> &str {
        if args[0] == "-C" {
            &args[2]
        } else {
            &args[0]
        }
    }

    #[async_trait]
    impl GitRunner for ScriptedGit {
        async fn run(&self, args: &[String]) -> Result<GitOutput, GitError> {
            self.calls.lock().unwrap().push(args.to_vec());
            Ok(self
                .responses
                .get(subcommand(args))
                .cloned()
                .unwrap_or(GitOutput {
                    success: true,
                    ..GitOutput::default()
                }))
        }
    }

    fn project(name: &str) -> TrackedProject {
        TrackedProject {
            clone_url: format!("git@example.com:me/{}.git", name),
            name: name.to_string(),
            path: name.to_string(),
        }
    }

    /// Clone root with working copies for `present` already on disk
    fn clone_root(present: &[&str]) -> TempDir {
        let root = TempDir::new().unwrap();
        for name in present {
            std::fs::create_dir_all(root.path().join(name)).unwrap();
        }
        root
    }

    #[test]
    fn test_transitions_cover_every_terminal_outcome() {
        let failure = || GitError::Failed {
            stderr: "boom".to_string(),
        };

        assert_eq!(ProjectState::located(false), ProjectState::Cloning);
        assert_eq!(ProjectState::located(true), ProjectState::CheckingDirty);
        assert_eq!(
            ProjectState::cloned(Ok(())),
            ProjectState::Done(SyncOutcome::Cloned)
        );
        assert_eq!(
            ProjectState::probed(Ok(true)),
            ProjectState::Done(SyncOutcome::SkippedDirty)
        );
        assert_eq!(ProjectState::probed(Ok(false)), ProjectState::Pulling);
        assert_eq!(ProjectState::pulled(Ok(())), ProjectState::Pushing);
        assert_eq!(
            ProjectState::pulled(Err(failure())),
            ProjectState::Done(SyncOutcome::Errored("boom".to_string()))
        );
        assert_eq!(
            ProjectState::pushed(Ok(())),
            ProjectState::Done(SyncOutcome::Synced)
        );
        assert_eq!(
            ProjectState::pushed(Err(failure())),
            ProjectState::Done(SyncOutcome::Errored("boom".to_string()))
        );
    }

    #[tokio::test]
    async fn test_empty_project_list_runs_nothing() {
        let root = clone_root(&[]);
        let engine = SyncEngine::new(ScriptedGit::default(), root.path());

        let result = engine.sync(&[], None).await;

        assert_eq!(result.counts(), SyncCounts::default());
        assert_eq!(result.total(), 0);
        assert!(engine.git().runner().calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_path_is_cloned_without_push() {
        let root = clone_root(&[]);
        let engine = SyncEngine::new(ScriptedGit::default(), root.path());

        let result = engine.sync(&[project("alpha")], None).await;

        assert_eq!(result.cloned(), ["alpha".to_string()]);
        assert_eq!(engine.git().runner().subcommands(), vec!["clone"]);
        let calls = engine.git().runner().calls.lock().unwrap().clone();
        assert_eq!(calls[0][1], "git@example.com:me/alpha.git");
        assert_eq!(calls[0][2], root.path().join("alpha").to_string_lossy());
    }

    #[tokio::test]
    async fn test_clone_failure_is_recorded_and_batch_continues() {
        let root = clone_root(&["beta"]);
        let git = ScriptedGit::default().respond(
            "clone",
            false,
            "",
            "fatal: repository 'x' not found\n",
        );
        let engine = SyncEngine::new(git, root.path());

        let result = engine.sync(&[project("alpha"), project("beta")], None).await;

        assert_eq!(
            result.errored(),
            [(
                "alpha".to_string(),
                "fatal: repository 'x' not found".to_string()
            )]
        );
        assert_eq!(result.synced(), ["beta".to_string()]);
        assert_eq!(
            engine.git().runner().subcommands(),
            vec!["clone", "status", "pull", "push"]
        );
    }

    #[tokio::test]
    async fn test_dirty_tree_is_skipped_without_pull_or_push() {
        let root = clone_root(&["alpha"]);
        let git = ScriptedGit::default().respond("status", true, " M src/lib.rs\n", "");
        let engine = SyncEngine::new(git, root.path());

        let result = engine.sync(&[project("alpha")], None).await;

        assert_eq!(result.skipped(), ["alpha".to_string()]);
        assert_eq!(engine.git().runner().subcommands(), vec!["status"]);
    }

    #[tokio::test]
    async fn test_push_failure_after_successful_pull_is_errored() {
        let root = clone_root(&["alpha"]);
        let git = ScriptedGit::default().respond(
            "push",
            false,
            "",
            "fatal: The current branch main has no upstream branch.\n",
        );
        let engine = SyncEngine::new(git, root.path());

        let result = engine.sync(&[project("alpha")], None).await;

        assert!(result.synced().is_empty());
        assert_eq!(result.errored().len(), 1);
        assert_eq!(
            result.errored()[0].1,
            "fatal: The current branch main has no upstream branch."
        );
        assert_eq!(
            engine.git().runner().subcommands(),
            vec!["status", "pull", "push"]
        );
    }

    #[tokio::test]
    async fn test_pull_failure_never_pushes() {
        let root = clone_root(&["alpha"]);
        let git = ScriptedGit::default().respond("pull", false, "", "fatal: refusing to merge\n");
        let engine = SyncEngine::new(git, root.path());

        let outcome = engine.sync_project(&project("alpha")).await;

        assert_matches!(outcome, SyncOutcome::Errored(ref message) if message == "fatal: refusing to merge");
        assert_eq!(engine.git().runner().subcommands(), vec!["status", "pull"]);
    }

    #[tokio::test]
    async fn test_failed_status_is_errored() {
        let root = clone_root(&["alpha"]);
        let git = ScriptedGit::default().respond(
            "status",
            false,
            "",
            "fatal: not a git repository\n",
        );
        let engine = SyncEngine::new(git, root.path());

        let outcome = engine.sync_project(&project("alpha")).await;

        assert_matches!(outcome, SyncOutcome::Errored(_));
        assert_eq!(engine.git().runner().subcommands(), vec!["status"]);
    }

    #[tokio::test]
    async fn test_repeated_sync_of_clean_project_stays_synced() {
        let root = clone_root(&["alpha"]);
        let engine = SyncEngine::new(ScriptedGit::default(), root.path());
        let projects = [project("alpha")];

        let first = engine.sync(&projects, None).await;
        let second = engine.sync(&projects, None).await;

        assert_eq!(first.synced(), ["alpha".to_string()]);
        assert_eq!(second, first);
        assert!(!engine.git().runner().subcommands().contains(&"clone".to_string()));
    }

    #[tokio::test]
    async fn test_progress_reports_every_project_in_order() {
        let root = clone_root(&["clean", "dirty"]);

        /// Reports dirty only for the working copy named "dirty"
        struct PerPathGit(ScriptedGit);

        #[async_trait]
        impl GitRunner for PerPathGit {
            async fn run(&self, args: &[String]) -> Result<GitOutput, GitError> {
                let output = self.0.run(args).await?;
                if subcommand(args) == "status" && args[1].ends_with("dirty") {
                    return Ok(GitOutput {
                        success: true,
                        stdout: "?? scratch.txt\n".to_string(),
                        stderr: String::new(),
                    });
                }
                Ok(output)
            }
        }

        let engine = SyncEngine::new(PerPathGit(ScriptedGit::default()), root.path());
        let projects = [project("fresh"), project("clean"), project("dirty")];
        let mut seen = Vec::new();
        let mut record = |name: &str, outcome: &SyncOutcome| {
            seen.push(format!("{}: {}", name, outcome));
        };

        let result = engine.sync(&projects, Some(&mut record)).await;

        assert_eq!(
            seen,
            vec!["fresh: cloned", "clean: synced", "dirty: skipped (dirty)"]
        );
        assert_eq!(result.total(), projects.len());
        assert_eq!(
            result.counts(),
            SyncCounts {
                cloned: 1,
                synced: 1,
                skipped: 1,
                errored: 0
            }
        );
        assert_eq!(result.counts().to_string(), "1 cloned, 1 synced, 1 skipped, 0 errored");
    }
}
