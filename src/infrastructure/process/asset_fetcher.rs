use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::info;

use crate::infrastructure::stage_interface::{AssetFetchError, AssetFetcher, FetchOutcome};

/// Fetch script location, relative to the repository root
pub const DEFAULT_FETCH_SCRIPT: &str = "plugins/download.sh";

/// Interpreter the fetch script is run with
pub const DEFAULT_INTERPRETER: &str = "bash";

/// Runs the repository's fetch script with inherited stdout/stderr.
///
/// The script's own directory is the working directory. There is no timeout;
/// a hung script blocks the pipeline until it exits.
#[derive(Debug, Clone)]
pub struct ScriptAssetFetcher {
    script: PathBuf,
    interpreter: String,
}

impl Default for ScriptAssetFetcher {
    fn default() -> Self {
        Self {
            script: PathBuf::from(DEFAULT_FETCH_SCRIPT),
            interpreter: DEFAULT_INTERPRETER.to_string(),
        }
    }
}

impl ScriptAssetFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom interpreter executable
    pub fn with_interpreter(mut self, interpreter: impl Into<String>) -> Self {
        self.interpreter = interpreter.into();
        self
    }

    /// Script path this fetcher runs for `repo_path`
    pub fn script_path(&self, repo_path: &Path) -> PathBuf {
        repo_path.join(&self.script)
    }
}

#[async_trait]
impl AssetFetcher for ScriptAssetFetcher {
    async fn fetch(&self, repo_path: &Path) -> Result<FetchOutcome, AssetFetchError> {
        let script = self.script_path(repo_path);

        let is_file = tokio::fs::metadata(&script)
            .await
            .map(|metadata| metadata.is_file())
            .unwrap_or(false);
        if !is_file {
            return Err(AssetFetchError::ScriptMissing { script });
        }

        // cwd is the script's directory, so pass the bare file name
        let (dir, file_name) = match (script.parent(), script.file_name()) {
            (Some(dir), Some(file_name)) => (dir.to_path_buf(), file_name.to_os_string()),
            _ => return Err(AssetFetchError::ScriptMissing { script }),
        };

        info!(script = %script.display(), "running fetch script");

        let status = Command::new(&self.interpreter)
            .arg(&file_name)
            .current_dir(&dir)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|source| AssetFetchError::SpawnFailed {
                script: script.clone(),
                source,
            })?;

        if !status.success() {
            return Err(AssetFetchError::ExitFailure {
                script,
                code: status.code(),
            });
        }

        Ok(FetchOutcome { script })
    }
}
