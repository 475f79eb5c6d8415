use git2::{
    build::RepoBuilder, Cred, CredentialType, FetchOptions, Oid, RemoteCallbacks,
    Repository as Git2Repository, ResetType, StatusOptions,
};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;

/// Git repository operations related errors
#[derive(Debug, Error)]
pub enum GitRepositoryError {
    #[error("Repository not found at path: {0}")]
    RepositoryNotFound(String),

    #[error("Remote not found: {0}")]
    RemoteNotFound(String),

    #[error("Branch not found: {0}")]
    BranchNotFound(String),

    #[error("Git operation failed: {0}")]
    GitOperationFailed(String),

    #[error("Git2 error: {0}")]
    Git2Error(#[from] git2::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Clone options for repository cloning
#[derive(Debug, Clone, Default)]
pub struct CloneConfig {
    /// Branch to clone; only this branch is fetched
    pub branch: Option<String>,

    /// History depth (None for full history)
    pub depth: Option<i32>,
}

impl CloneConfig {
    /// Single-branch clone, shallow when the transport supports it
    pub fn single_branch(url: &str, branch: impl Into<String>) -> Self {
        Self {
            branch: Some(branch.into()),
            depth: supports_shallow(url).then_some(1),
        }
    }
}

/// Wrapper around git2::Repository with the operations a force pull needs
pub struct GitRepository {
    /// The underlying git2 repository
    repo: Git2Repository,

    /// Repository path
    path: PathBuf,
}

impl std::fmt::Debug for GitRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitRepository")
            .field("path", &self.path)
            .field("repo", &"<git2::Repository>")
            .finish()
    }
}

impl GitRepository {
    /// Open an existing Git repository
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, GitRepositoryError> {
        let path_buf = path.as_ref().to_path_buf();

        if !path_buf.exists() {
            return Err(GitRepositoryError::RepositoryNotFound(
                path_buf.display().to_string(),
            ));
        }

        let repo = Git2Repository::open(&path_buf)
            .map_err(|e| GitRepositoryError::GitOperationFailed(e.to_string()))?;

        Ok(Self {
            repo,
            path: path_buf,
        })
    }

    /// Clone a remote repository
    pub fn clone(
        url: &str,
        target_path: &Path,
        config: &CloneConfig,
    ) -> Result<Self, GitRepositoryError> {
        // Create parent directories if they don't exist
        if let Some(parent) = target_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut fetch_options = FetchOptions::new();
        fetch_options.remote_callbacks(remote_callbacks());
        if let Some(depth) = config.depth {
            fetch_options.depth(depth);
        }

        let mut builder = RepoBuilder::new();
        builder.fetch_options(fetch_options);

        if let Some(branch) = &config.branch {
            builder.branch(branch);
            let refspec_branch = branch.clone();
            builder.remote_create(move |repo, name, url| {
                let refspec = format!(
                    "+refs/heads/{b}:refs/remotes/{name}/{b}",
                    b = refspec_branch,
                    name = name
                );
                repo.remote_with_fetch(name, url, &refspec)
            });
        }

        let repo = builder.clone(url, target_path)?;

        Ok(Self {
            repo,
            path: target_path.to_path_buf(),
        })
    }

    /// Fetch a single branch from `remote_name` and return the fetched commit
    pub fn fetch_branch(
        &self,
        remote_name: &str,
        branch: &str,
        depth: Option<i32>,
    ) -> Result<Oid, GitRepositoryError> {
        let mut remote = self
            .repo
            .find_remote(remote_name)
            .map_err(|_| GitRepositoryError::RemoteNotFound(remote_name.to_string()))?;

        let mut fetch_options = FetchOptions::new();
        fetch_options.remote_callbacks(remote_callbacks());
        if let Some(depth) = depth {
            fetch_options.depth(depth);
        }

        let tracking = format!("refs/remotes/{}/{}", remote_name, branch);
        let refspec = format!("+refs/heads/{}:{}", branch, tracking);
        remote.fetch(&[refspec.as_str()], Some(&mut fetch_options), None)?;

        let reference = self
            .repo
            .find_reference(&tracking)
            .map_err(|_| GitRepositoryError::BranchNotFound(tracking.clone()))?;
        Ok(reference.peel_to_commit()?.id())
    }

    /// Current HEAD commit, if HEAD is born
    pub fn head_commit(&self) -> Option<Oid> {
        self.repo
            .head()
            .ok()
            .and_then(|head| head.peel_to_commit().ok())
            .map(|commit| commit.id())
    }

    /// Whether HEAD is the local branch `branch`
    pub fn is_on_branch(&self, branch: &str) -> bool {
        self.repo
            .head()
            .ok()
            .and_then(|head| head.name().map(|name| name == format!("refs/heads/{}", branch)))
            .unwrap_or(false)
    }

    /// Whether tracked files are unmodified
    pub fn is_working_directory_clean(&self) -> Result<bool, GitRepositoryError> {
        let mut options = StatusOptions::new();
        options.include_untracked(false).include_ignored(false);
        let statuses = self.repo.statuses(Some(&mut options))?;
        Ok(statuses.is_empty())
    }

    /// Point `branch` at `target`, check it out and hard-reset the working tree
    pub fn force_checkout(&self, branch: &str, target: Oid) -> Result<(), GitRepositoryError> {
        let commit = self.repo.find_commit(target)?;
        let refname = format!("refs/heads/{}", branch);

        if !self.is_on_branch(branch) {
            self.repo
                .reference(&refname, target, true, "mcmgr: force pull")?;
            self.repo.set_head(&refname)?;
        }

        self.repo.reset(commit.as_object(), ResetType::Hard, None)?;
        Ok(())
    }

    /// Get the repository path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Whether `url` goes through a transport that can fetch shallow history.
///
/// libgit2's local transport rejects depth-limited fetches, so plain paths and
/// `file://` URLs are fetched in full.
pub fn supports_shallow(url: &str) -> bool {
    static SCP_LIKE: OnceLock<Option<Regex>> = OnceLock::new();

    if let Ok(parsed) = url::Url::parse(url) {
        // Single-letter schemes are Windows drive letters
        return parsed.scheme() != "file" && parsed.scheme().len() > 1;
    }

    SCP_LIKE
        .get_or_init(|| Regex::new(r"^[\w.-]+@[\w.-]+:").ok())
        .as_ref()
        .map(|re| re.is_match(url))
        .unwrap_or(false)
}

fn remote_callbacks<'a>() -> RemoteCallbacks<'a> {
    let mut callbacks = RemoteCallbacks::new();
    let mut attempts = 0;

    callbacks.credentials(move |url, username_from_url, allowed_types| {
        attempts += 1;
        if attempts > 3 {
            return Err(git2::Error::from_str("authentication failed"));
        }

        if allowed_types.contains(CredentialType::SSH_KEY) {
            Cred::ssh_key_from_agent(username_from_url.unwrap_or("git"))
        } else if allowed_types.contains(CredentialType::USER_PASS_PLAINTEXT) {
            let config = git2::Config::open_default()?;
            Cred::credential_helper(&config, url, username_from_url)
        } else if allowed_types.contains(CredentialType::DEFAULT) {
            Cred::default()
        } else {
            Err(git2::Error::from_str("No supported authentication method"))
        }
    });

    callbacks
}
