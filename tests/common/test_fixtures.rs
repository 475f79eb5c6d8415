//! Test fixtures for git origins, configurations and a fake remote console

use git2::{Oid, Repository, RepositoryInitOptions, Signature};
use mcmgr::domain::entities::PipelineConfig;
use mcmgr::infrastructure::rcon::client::{
    Packet, SERVERDATA_AUTH_RESPONSE, SERVERDATA_RESPONSE_VALUE,
};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Shared secret used by configuration fixtures
pub const TEST_TOKEN: &str = "s3cret";

/// Console password used by configuration fixtures
pub const TEST_PASSWORD: &str = "rcon-pw";

/// Initialize a non-bare origin repository whose initial branch is `branch`
pub fn init_origin(dir: &Path, branch: &str) -> Repository {
    let mut options = RepositoryInitOptions::new();
    options.initial_head(branch);
    Repository::init_opts(dir, &options).unwrap()
}

/// Write `content` to `relative` in the working tree and commit it on HEAD
pub fn commit_file(repo: &Repository, relative: &str, content: &str, message: &str) -> Oid {
    let workdir = repo.workdir().unwrap();
    let path = workdir.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, content).unwrap();

    let mut index = repo.index().unwrap();
    index.add_path(Path::new(relative)).unwrap();
    index.write().unwrap();
    let tree_id = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_id).unwrap();

    let signature = Signature::now("mcmgr test", "test@example.com").unwrap();
    let parent = repo.head().ok().and_then(|head| head.peel_to_commit().ok());
    let parents: Vec<&git2::Commit> = parent.iter().collect();

    repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
        .unwrap()
}

/// Minimal valid configuration with millisecond countdowns
pub fn test_config(console_address: &str) -> PipelineConfig {
    let (host, port) = console_address.rsplit_once(':').unwrap();
    PipelineConfig::new(
        "https://example.invalid/content.git",
        host,
        port.parse().unwrap(),
        TEST_PASSWORD,
    )
    .with_secret_token(Some(TEST_TOKEN.to_string()))
    .with_countdown(Duration::from_millis(5), Duration::from_millis(1))
}

/// In-process remote console that records every command it receives
pub struct FakeConsole {
    pub address: String,
    commands: Arc<Mutex<Vec<String>>>,
    handle: JoinHandle<()>,
}

impl FakeConsole {
    /// Accept any number of sessions authenticated with `password`
    pub async fn start(password: &str) -> Self {
        Self::start_with(password, None).await
    }

    /// Like [`FakeConsole::start`], but each session drops its connection
    /// instead of answering command number `fail_at` (1-based)
    pub async fn start_with(password: &str, fail_at: Option<usize>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let commands = Arc::new(Mutex::new(Vec::new()));
        let password = password.to_string();

        let log = Arc::clone(&commands);
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve_session(stream, password.clone(), Arc::clone(&log), fail_at));
            }
        });

        Self {
            address,
            commands,
            handle,
        }
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

impl Drop for FakeConsole {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve_session(
    mut stream: TcpStream,
    password: String,
    log: Arc<Mutex<Vec<String>>>,
    fail_at: Option<usize>,
) {
    let auth = match Packet::read_from(&mut stream).await {
        Ok(packet) => packet,
        Err(_) => return,
    };
    if auth.body != password {
        let _ = Packet::new(-1, SERVERDATA_AUTH_RESPONSE, "")
            .write_to(&mut stream)
            .await;
        return;
    }
    if Packet::new(auth.id, SERVERDATA_AUTH_RESPONSE, "")
        .write_to(&mut stream)
        .await
        .is_err()
    {
        return;
    }

    let mut seen = 0;
    while let Ok(packet) = Packet::read_from(&mut stream).await {
        seen += 1;
        log.lock().unwrap().push(packet.body);
        if Some(seen) == fail_at {
            return;
        }
        if Packet::new(packet.id, SERVERDATA_RESPONSE_VALUE, "")
            .write_to(&mut stream)
            .await
            .is_err()
        {
            return;
        }
    }
}
