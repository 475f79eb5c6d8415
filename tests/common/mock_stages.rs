//! Recording fakes for the pipeline stages
//!
//! Every fake appends its name to a shared [`CallLog`] so tests can assert
//! which stages ran and in what order.

use async_trait::async_trait;
use mcmgr::application::use_cases::UpdateStages;
use mcmgr::domain::value_objects::DirectorySelection;
use mcmgr::infrastructure::rcon::RconError;
use mcmgr::infrastructure::stage_interface::{
    AssetFetchError, AssetFetcher, DirectoryMirror, DirectoryMirrorError, FetchOutcome,
    MirrorReport, RepositorySyncError, RepositorySyncer, RestartAnnouncer, RestartError,
    RestartPlan, RestartStep, SyncOutcome,
};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

/// Ordered record of stage invocations
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<&'static str>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, name: &'static str) {
        self.calls.lock().unwrap().push(name);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    /// Poll until `name` has been recorded or `timeout` elapses
    pub async fn wait_for(&self, name: &'static str, timeout: Duration) -> bool {
        let start = std::time::Instant::now();
        while start.elapsed() < timeout {
            if self.calls().contains(&name) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        false
    }
}

pub struct RecordingSyncer {
    log: CallLog,
    fail: bool,
    gate: Option<Arc<Semaphore>>,
}

#[async_trait]
impl RepositorySyncer for RecordingSyncer {
    async fn sync(&self, _: &Path, _: &str, _: &str) -> Result<SyncOutcome, RepositorySyncError> {
        self.log.push("sync");
        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await;
        }
        if self.fail {
            return Err(RepositorySyncError::TaskFailed("remote unreachable".to_string()));
        }
        Ok(SyncOutcome::AlreadyUpToDate {
            commit: "0123456789abcdef".to_string(),
        })
    }
}

pub struct RecordingFetcher {
    log: CallLog,
    fail: bool,
}

#[async_trait]
impl AssetFetcher for RecordingFetcher {
    async fn fetch(&self, repo_path: &Path) -> Result<FetchOutcome, AssetFetchError> {
        self.log.push("fetch");
        let script = repo_path.join("plugins/download.sh");
        if self.fail {
            return Err(AssetFetchError::ScriptMissing { script });
        }
        Ok(FetchOutcome { script })
    }
}

pub struct RecordingMirror {
    log: CallLog,
    fail: bool,
}

#[async_trait]
impl DirectoryMirror for RecordingMirror {
    async fn mirror(
        &self,
        repo_path: &Path,
        _: &Path,
        selection: &DirectorySelection,
        owner_id: Option<u32>,
    ) -> Result<MirrorReport, DirectoryMirrorError> {
        self.log.push("mirror");
        if self.fail {
            return Err(DirectoryMirrorError::NothingToCopy {
                repo: repo_path.to_path_buf(),
            });
        }
        Ok(MirrorReport {
            copied: selection.names().to_vec(),
            missing: Vec::new(),
            owner_applied: owner_id,
        })
    }
}

pub struct RecordingAnnouncer {
    log: CallLog,
    fail: bool,
    delay: Duration,
}

#[async_trait]
impl RestartAnnouncer for RecordingAnnouncer {
    async fn announce(&self, _: &RestartPlan) -> Result<(), RestartError> {
        tokio::time::sleep(self.delay).await;
        self.log.push("restart");
        if self.fail {
            return Err(RestartError::new(RestartStep::Connect, RconError::AuthRejected));
        }
        Ok(())
    }
}

/// Builder for a set of recording fakes sharing one [`CallLog`]
#[derive(Debug, Clone, Default)]
pub struct FakeStages {
    pub log: CallLog,
    fail_sync: bool,
    fail_fetch: bool,
    fail_mirror: bool,
    fail_restart: bool,
    restart_delay: Duration,
    sync_gate: Option<Arc<Semaphore>>,
}

impl FakeStages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_sync(mut self) -> Self {
        self.fail_sync = true;
        self
    }

    pub fn failing_fetch(mut self) -> Self {
        self.fail_fetch = true;
        self
    }

    pub fn failing_mirror(mut self) -> Self {
        self.fail_mirror = true;
        self
    }

    pub fn failing_restart(mut self) -> Self {
        self.fail_restart = true;
        self
    }

    pub fn with_restart_delay(mut self, delay: Duration) -> Self {
        self.restart_delay = delay;
        self
    }

    /// Hold the syncer after it records its call until `gate` has a permit
    pub fn with_sync_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.sync_gate = Some(gate);
        self
    }

    pub fn build(&self) -> UpdateStages {
        UpdateStages {
            syncer: Arc::new(RecordingSyncer {
                log: self.log.clone(),
                fail: self.fail_sync,
                gate: self.sync_gate.clone(),
            }),
            fetcher: Arc::new(RecordingFetcher {
                log: self.log.clone(),
                fail: self.fail_fetch,
            }),
            mirror: Arc::new(RecordingMirror {
                log: self.log.clone(),
                fail: self.fail_mirror,
            }),
            announcer: Arc::new(RecordingAnnouncer {
                log: self.log.clone(),
                fail: self.fail_restart,
                delay: self.restart_delay,
            }),
        }
    }
}
