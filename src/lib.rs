//! # mcmgr - game server update agent
//!
//! `mcmgr` keeps a game server's content in step with a git repository. A
//! webhook (or the `update` subcommand) triggers one update cycle:
//!
//! 1. sync the local working copy (clone if absent, otherwise force pull)
//! 2. optionally run `plugins/download.sh` from the repository
//! 3. mirror the selected top-level directories into the live data directory
//! 4. announce a restart over the remote console, count down from ten and
//!    send the restart command
//!
//! Steps 1-3 run under a lock and are reported to the caller; step 4 runs
//! detached and its failures are only logged.
//!
//! ## Quick Start
//!
//! ```bash
//! REPO_URL=https://github.com/example/server-content.git \
//! RCON_HOST=127.0.0.1 RCON_PORT=25575 RCON_PASSWORD=secret \
//! COPY_DIRS=plugins,world SECRET_TOKEN=s3cret \
//! mcmgr serve
//!
//! curl -X POST -H 'X-Secret-Token: s3cret' http://localhost:8080/update
//! ```
//!
//! ## Architecture
//!
//! - [`domain`]: configuration, run records, directory selection, messages
//! - [`application`]: the [`UpdateCoordinator`](application::use_cases::UpdateCoordinator)
//! - [`infrastructure`]: git2, script, filesystem and RCON stage implementations
//! - [`presentation`]: CLI and HTTP surface
//! - [`common`]: errors, results and logging
//!
//! ## Using the Library
//!
//! ```rust,no_run
//! use mcmgr::application::use_cases::{TriggerRequest, UpdateCoordinator, UpdateStages};
//! use mcmgr::domain::entities::PipelineConfig;
//!
//! # async fn example() -> mcmgr::Result<()> {
//! let config = PipelineConfig::new("https://example.com/content.git", "127.0.0.1", 25575, "secret")
//!     .with_dirs("plugins,world", "")
//!     .validated()?;
//!
//! let coordinator = UpdateCoordinator::new(config, UpdateStages::production());
//! let accepted = coordinator.trigger(TriggerRequest::default()).await?;
//! println!("run {} scheduled a restart", accepted.run.run_id());
//! accepted.restart.wait().await?;
//! # Ok(())
//! # }
//! ```

#![deny(rustdoc::broken_intra_doc_links)]

pub mod application;
pub mod common;
pub mod domain;
pub mod infrastructure;
pub mod presentation;

// Re-export commonly used types for convenience
pub use crate::common::error::MgrError;
pub use crate::common::result::MgrResult as Result;
