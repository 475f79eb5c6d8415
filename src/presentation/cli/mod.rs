use clap::builder::BoolishValueParser;
use clap::{ArgAction, Args, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::process::exit;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::application::use_cases::{TriggerRequest, UpdateCoordinator, UpdateStages};
use crate::common::logging::{self, LogFormat};
use crate::common::result::MgrResult;
use crate::domain::entities::pipeline_config::{
    DEFAULT_BRANCH, DEFAULT_COPY_DIRS, DEFAULT_DATA_DIR, DEFAULT_LOCALE, DEFAULT_REPO_PATH,
    DEFAULT_RESTART_COMMAND,
};
use crate::domain::entities::{PipelineConfig, RestartFencing};
use crate::presentation::http;

/// Default HTTP listen port
pub const DEFAULT_PORT: u16 = 8080;

/// `--version` output with the build metadata from build.rs
pub const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_HASH"),
    " built ",
    env!("BUILD_DATE"),
    ", target ",
    env!("BUILD_TARGET"),
    ")"
);

/// mcmgr - deploy server content from git and restart with a countdown
#[derive(Debug, Parser)]
#[command(name = "mcmgr")]
#[command(about = "Deploy game-server content from git and restart it with a countdown")]
#[command(version, long_version = LONG_VERSION)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Log line layout
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Columns, global = true)]
    pub log_format: LogFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Clone, Copy, Subcommand)]
pub enum Commands {
    /// Serve the update webhook (default)
    Serve,

    /// Run one update in-process and wait for the restart to finish
    Update,

    /// Validate and print the effective configuration
    CheckConfig,
}

/// Pipeline settings; every flag falls back to an environment variable
#[derive(Debug, Clone, Args)]
pub struct ConfigArgs {
    /// Source repository URL
    #[arg(long, env = "REPO_URL", global = true)]
    pub repo_url: Option<String>,

    /// Branch to deploy
    #[arg(long, env = "REPO_BRANCH", default_value = DEFAULT_BRANCH, global = true)]
    pub repo_branch: String,

    /// Local working copy
    #[arg(long, env = "REPO_PATH", default_value = DEFAULT_REPO_PATH, global = true)]
    pub repo_path: PathBuf,

    /// Live server data directory
    #[arg(long, env = "DATA_DIR", default_value = DEFAULT_DATA_DIR, global = true)]
    pub data_dir: PathBuf,

    /// HTTP listen port
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT, global = true)]
    pub port: u16,

    /// Remote console host
    #[arg(long, env = "RCON_HOST", global = true)]
    pub rcon_host: Option<String>,

    /// Remote console port
    #[arg(long, env = "RCON_PORT", global = true)]
    pub rcon_port: Option<u16>,

    /// Remote console password
    #[arg(long, env = "RCON_PASSWORD", hide_env_values = true, global = true)]
    pub rcon_password: Option<String>,

    /// Console command that restarts the server
    #[arg(long, env = "RCON_RESTART_COMMAND", default_value = DEFAULT_RESTART_COMMAND, global = true)]
    pub restart_command: String,

    /// Seconds between the warning and the final ten-second countdown
    #[arg(long, env = "COUNTDOWN_WAIT", default_value_t = 50, global = true)]
    pub countdown_wait: u64,

    /// Comma-separated directories to mirror
    #[arg(long, env = "COPY_DIRS", default_value = DEFAULT_COPY_DIRS, global = true)]
    pub copy_dirs: String,

    /// Comma-separated directories to leave out
    #[arg(long, env = "SKIP_DIRS", default_value = "", global = true)]
    pub skip_dirs: String,

    /// Owner id (user and group) applied to mirrored files
    #[arg(long, env = "PLUGINS_UID", global = true)]
    pub plugins_uid: Option<u32>,

    /// Run plugins/download.sh after syncing
    #[arg(
        long,
        env = "PLUGINS_DOWNLOAD",
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new(),
        default_value_t = false,
        global = true
    )]
    pub plugins_download: bool,

    /// Shared secret expected in the X-Secret-Token header
    #[arg(long, env = "SECRET_TOKEN", hide_env_values = true, global = true)]
    pub secret_token: Option<String>,

    /// Locale of player-facing messages
    #[arg(long, env = "LOCALE", default_value = DEFAULT_LOCALE, global = true)]
    pub locale: String,

    /// Whether a running restart countdown blocks the next sync (overlap, exclusive)
    #[arg(long, env = "RESTART_FENCING", default_value = "overlap", global = true)]
    pub restart_fencing: RestartFencing,
}

impl ConfigArgs {
    /// Build and validate the pipeline configuration
    pub fn into_pipeline_config(self) -> MgrResult<PipelineConfig> {
        PipelineConfig::new(
            self.repo_url.unwrap_or_default(),
            self.rcon_host.unwrap_or_default(),
            self.rcon_port.unwrap_or(0),
            self.rcon_password.unwrap_or_default(),
        )
        .with_branch(self.repo_branch)
        .with_repo_path(self.repo_path)
        .with_data_dir(self.data_dir)
        .with_dirs(self.copy_dirs, self.skip_dirs)
        .with_plugins_download(self.plugins_download)
        .with_owner_id(self.plugins_uid)
        .with_restart_command(self.restart_command)
        .with_countdown(Duration::from_secs(self.countdown_wait), Duration::from_secs(1))
        .with_locale(self.locale)
        .with_secret_token(self.secret_token)
        .with_restart_fencing(self.restart_fencing)
        .validated()
    }
}

pub struct CliApp {
    cli: Cli,
}

impl Default for CliApp {
    fn default() -> Self {
        Self::new()
    }
}

impl CliApp {
    pub fn new() -> Self {
        Self { cli: Cli::parse() }
    }

    pub fn from_cli(cli: Cli) -> Self {
        Self { cli }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        if self.cli.no_color {
            colored::control::set_override(false);
        }

        match self.handle_command().await {
            Ok(_) => Ok(()),
            Err(e) => {
                eprintln!("{} {}", "Error:".red().bold(), e);
                exit(1);
            }
        }
    }

    async fn handle_command(self) -> MgrResult<()> {
        let command = self.cli.command.unwrap_or(Commands::Serve);
        let port = self.cli.config.port;
        let log_format = self.cli.log_format;
        let config = self.cli.config.into_pipeline_config()?;

        match command {
            Commands::Serve => {
                logging::init(log_format)?;
                Self::handle_serve_command(config, port).await
            }
            Commands::Update => {
                logging::init(log_format)?;
                Self::handle_update_command(config).await
            }
            Commands::CheckConfig => Self::handle_check_config_command(config),
        }
    }

    async fn handle_serve_command(config: PipelineConfig, port: u16) -> MgrResult<()> {
        let coordinator = Arc::new(UpdateCoordinator::new(config, UpdateStages::production()));
        let config = coordinator.config();
        info!(
            repo = %config.repo_url,
            branch = %config.repo_branch,
            dirs = %coordinator.selection(),
            locale = coordinator.messages().locale,
            fencing = %config.restart_fencing,
            token = config.secret_token.is_some(),
            "starting update agent"
        );

        let listener = http::bind(port).await?;
        let router = http::create_router(Arc::clone(&coordinator));
        http::serve(listener, router, http::shutdown_signal()).await
    }

    async fn handle_update_command(config: PipelineConfig) -> MgrResult<()> {
        let coordinator = UpdateCoordinator::new(config, UpdateStages::production());
        let request = TriggerRequest::new(coordinator.config().secret_token.clone())
            .with_origin("cli");

        let accepted = coordinator.trigger(request).await?;
        println!("{}", serde_json::to_string_pretty(&accepted.run)?);

        accepted.restart.wait().await?;
        println!("{} restart sequence finished", "✓".green());
        Ok(())
    }

    fn handle_check_config_command(config: PipelineConfig) -> MgrResult<()> {
        let coordinator = UpdateCoordinator::new(config, UpdateStages::production());
        let report = serde_json::json!({
            "config": coordinator.config(),
            "directories": coordinator.selection(),
            "messages": coordinator.messages(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        Ok(())
    }
}
