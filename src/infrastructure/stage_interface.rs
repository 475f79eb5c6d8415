//! Capability interfaces for the pipeline stages
//!
//! The coordinator only talks to these traits; production implementations
//! live in the sibling modules and tests substitute their own.

use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::git::GitRepositoryError;
use super::rcon::RconError;
use crate::domain::value_objects::{DirectorySelection, Messages};

/// Number of visible countdown steps before the restart command
pub const COUNTDOWN_STEPS: u32 = 10;

/// Brings a local working copy up to date with a remote branch
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RepositorySyncer: Send + Sync {
    /// Clone `url` into `path` if absent, otherwise force-pull `branch` from `origin`
    async fn sync(
        &self,
        path: &Path,
        url: &str,
        branch: &str,
    ) -> Result<SyncOutcome, RepositorySyncError>;
}

/// Runs the external asset-fetch step inside the synced repository
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    async fn fetch(&self, repo_path: &Path) -> Result<FetchOutcome, AssetFetchError>;
}

/// Replaces destination subtrees with fresh copies from the repository
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DirectoryMirror: Send + Sync {
    async fn mirror(
        &self,
        repo_path: &Path,
        data_dir: &Path,
        selection: &DirectorySelection,
        owner_id: Option<u32>,
    ) -> Result<MirrorReport, DirectoryMirrorError>;
}

/// Drives the warning, countdown and restart command over the remote console
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RestartAnnouncer: Send + Sync {
    async fn announce(&self, plan: &RestartPlan) -> Result<(), RestartError>;
}

/// Result of a repository sync
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The path did not exist and was cloned
    Cloned { commit: String },
    /// The working copy was moved to a new commit
    Updated { from: String, to: String },
    /// Remote had nothing new
    AlreadyUpToDate { commit: String },
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cloned { commit } => write!(f, "cloned at {}", short(commit)),
            Self::Updated { from, to } => write!(f, "updated {}..{}", short(from), short(to)),
            Self::AlreadyUpToDate { commit } => write!(f, "already up to date at {}", short(commit)),
        }
    }
}

fn short(commit: &str) -> &str {
    commit.get(..7).unwrap_or(commit)
}

/// Result of the asset-fetch step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    pub script: PathBuf,
}

impl fmt::Display for FetchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ran {}", self.script.display())
    }
}

/// Result of a directory mirror
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MirrorReport {
    /// Directories copied, in selection order
    pub copied: Vec<String>,
    /// Selected directories absent from the repository
    pub missing: Vec<String>,
    /// Owner id applied to the copies, if any
    pub owner_applied: Option<u32>,
}

impl fmt::Display for MirrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "copied [{}]", self.copied.join(", "))?;
        if !self.missing.is_empty() {
            write!(f, ", missing [{}]", self.missing.join(", "))?;
        }
        if let Some(owner) = self.owner_applied {
            write!(f, ", owner {}", owner)?;
        }
        Ok(())
    }
}

/// Everything the detached restart unit needs, detached from the coordinator's config
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartPlan {
    /// Remote console `host:port`
    pub address: String,
    pub password: String,
    pub messages: Messages,
    pub restart_command: String,
    /// Delay between the warning and the first countdown step
    pub countdown_wait: Duration,
    /// Delay after each countdown step
    pub countdown_tick: Duration,
}

impl RestartPlan {
    /// Total notice given to players, in whole seconds
    pub fn notice_secs(&self) -> u64 {
        (self.countdown_wait + self.countdown_tick * COUNTDOWN_STEPS).as_secs()
    }
}

/// Steps of the restart sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartStep {
    Connect,
    AnnounceWarning,
    WaitCountdownDelay,
    Countdown(u32),
    IssueRestartCommand,
    Close,
}

impl fmt::Display for RestartStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect => write!(f, "connect"),
            Self::AnnounceWarning => write!(f, "announce warning"),
            Self::WaitCountdownDelay => write!(f, "wait countdown delay"),
            Self::Countdown(i) => write!(f, "countdown {}", i),
            Self::IssueRestartCommand => write!(f, "restart command"),
            Self::Close => write!(f, "close"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RepositorySyncError {
    #[error("clone {url} (branch {branch}): {source}")]
    CloneFailed {
        url: String,
        branch: String,
        #[source]
        source: GitRepositoryError,
    },

    #[error("pull {branch} into {}: {source}", .path.display())]
    PullFailed {
        path: PathBuf,
        branch: String,
        #[source]
        source: GitRepositoryError,
    },

    #[error("inspect {}: {source}", .path.display())]
    Inspect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("repository task failed: {0}")]
    TaskFailed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum AssetFetchError {
    #[error("{} missing", .script.display())]
    ScriptMissing { script: PathBuf },

    #[error("run {}: {source}", .script.display())]
    SpawnFailed {
        script: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("run {}: exited with {}", .script.display(), .code.map(|c| c.to_string()).unwrap_or_else(|| "signal".to_string()))]
    ExitFailure { script: PathBuf, code: Option<i32> },
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryMirrorError {
    #[error("no directories to copy after applying SKIP_DIRS")]
    EmptySelection,

    #[error("no configured directories found in repo {}", .repo.display())]
    NothingToCopy { repo: PathBuf },

    #[error("ensure data dir {}: {source}", .path.display())]
    DataDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("copy {name}: {source}")]
    Copy {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("chown {}: {source}", .path.display())]
    Ownership {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("mirror task failed: {0}")]
    TaskFailed(String),
}

/// A failure inside the detached restart sequence
#[derive(Debug, thiserror::Error)]
#[error("{step}: {source}")]
pub struct RestartError {
    pub step: RestartStep,
    #[source]
    pub source: RconError,
}

impl RestartError {
    pub fn new(step: RestartStep, source: RconError) -> Self {
        Self { step, source }
    }
}
