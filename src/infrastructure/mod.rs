/// Infrastructure layer modules
///
/// This layer provides concrete implementations of the pipeline stages:
/// - Git working-copy sync (clone, force pull)
/// - Fetch script execution
/// - Directory mirroring and ownership
/// - Remote console restart countdown
pub mod filesystem;
pub mod git;
pub mod process;
pub mod rcon;
pub mod stage_interface;

// Re-export commonly used types
pub use filesystem::FsDirectoryMirror;
pub use git::{GitRepository, GitRepositorySyncer};
pub use process::ScriptAssetFetcher;
pub use rcon::{RconClient, RconError, RconRestartAnnouncer};
pub use stage_interface::{
    AssetFetchError, AssetFetcher, DirectoryMirror, DirectoryMirrorError, FetchOutcome,
    MirrorReport, RepositorySyncError, RepositorySyncer, RestartAnnouncer, RestartError,
    RestartPlan, RestartStep, SyncOutcome,
};
