use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, info};

use super::repository::{supports_shallow, CloneConfig, GitRepository, GitRepositoryError};
use crate::infrastructure::stage_interface::{RepositorySyncError, RepositorySyncer, SyncOutcome};

/// Remote the working copy is pulled from
pub const DEFAULT_REMOTE: &str = "origin";

/// libgit2-backed [`RepositorySyncer`]
///
/// Clones with a shallow single-branch fetch when the path is absent, and
/// otherwise force-pulls the branch, discarding local modifications.
#[derive(Debug, Clone)]
pub struct GitRepositorySyncer {
    remote_name: String,
}

impl Default for GitRepositorySyncer {
    fn default() -> Self {
        Self {
            remote_name: DEFAULT_REMOTE.to_string(),
        }
    }
}

impl GitRepositorySyncer {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RepositorySyncer for GitRepositorySyncer {
    async fn sync(
        &self,
        path: &Path,
        url: &str,
        branch: &str,
    ) -> Result<SyncOutcome, RepositorySyncError> {
        let path = path.to_path_buf();
        let url = url.to_string();
        let branch = branch.to_string();
        let remote = self.remote_name.clone();

        tokio::task::spawn_blocking(move || sync_blocking(&path, &url, &branch, &remote))
            .await
            .map_err(|e| RepositorySyncError::TaskFailed(e.to_string()))?
    }
}

fn sync_blocking(
    path: &Path,
    url: &str,
    branch: &str,
    remote: &str,
) -> Result<SyncOutcome, RepositorySyncError> {
    match std::fs::metadata(path) {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => clone(path, url, branch),
        Err(source) => Err(RepositorySyncError::Inspect {
            path: path.to_path_buf(),
            source,
        }),
        Ok(_) => pull(path, url, branch, remote).map_err(|source| RepositorySyncError::PullFailed {
            path: path.to_path_buf(),
            branch: branch.to_string(),
            source,
        }),
    }
}

fn clone(path: &Path, url: &str, branch: &str) -> Result<SyncOutcome, RepositorySyncError> {
    info!(url, path = %path.display(), branch, "cloning repository");

    let clone_failed = |source: GitRepositoryError| RepositorySyncError::CloneFailed {
        url: url.to_string(),
        branch: branch.to_string(),
        source,
    };

    let repo = GitRepository::clone(url, path, &CloneConfig::single_branch(url, branch))
        .map_err(clone_failed)?;
    let commit = repo
        .head_commit()
        .ok_or_else(|| {
            clone_failed(GitRepositoryError::BranchNotFound(format!(
                "refs/heads/{}",
                branch
            )))
        })?
        .to_string();

    Ok(SyncOutcome::Cloned { commit })
}

fn pull(
    path: &Path,
    url: &str,
    branch: &str,
    remote: &str,
) -> Result<SyncOutcome, GitRepositoryError> {
    info!(path = %path.display(), branch, "pulling latest changes");

    let repo = GitRepository::open(path)?;
    let depth = supports_shallow(url).then_some(1);
    let fetched = repo.fetch_branch(remote, branch, depth)?;
    let current = repo.head_commit();

    if current == Some(fetched)
        && repo.is_on_branch(branch)
        && repo.is_working_directory_clean()?
    {
        debug!(commit = %fetched, "already up to date");
        return Ok(SyncOutcome::AlreadyUpToDate {
            commit: fetched.to_string(),
        });
    }

    repo.force_checkout(branch, fetched)?;

    Ok(SyncOutcome::Updated {
        from: current.map(|oid| oid.to_string()).unwrap_or_default(),
        to: fetched.to_string(),
    })
}
