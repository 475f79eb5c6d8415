use crate::domain::entities::pipeline_run::Stage;
use crate::infrastructure::stage_interface::RestartError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MgrError {
    #[error("Configuration error: {message}")]
    ConfigError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Unauthorized update request")]
    Unauthorized,

    #[error("{stage} failed: {source}")]
    StageError {
        stage: Stage,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Restart sequence failed: {source}")]
    RestartError {
        #[source]
        source: RestartError,
    },

    #[error("Server error: {message}")]
    ServerError {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Internal error: {message}")]
    InternalError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl MgrError {
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
            source: None,
        }
    }

    pub fn config_error_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::ConfigError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn stage_error(
        stage: Stage,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::StageError {
            stage,
            source: Box::new(source),
        }
    }

    pub fn restart_error(source: RestartError) -> Self {
        Self::RestartError { source }
    }

    pub fn server_error(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::ServerError {
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
            source: None,
        }
    }

    pub fn internal_error_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::InternalError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// The stage that aborted the pipeline, if this is a stage failure
    pub fn failed_stage(&self) -> Option<Stage> {
        match self {
            Self::StageError { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}

impl From<serde_json::Error> for MgrError {
    fn from(error: serde_json::Error) -> Self {
        Self::internal_error_with_source("JSON serialization failed", error)
    }
}

impl From<tokio::task::JoinError> for MgrError {
    fn from(error: tokio::task::JoinError) -> Self {
        Self::internal_error_with_source("Background task failed", error)
    }
}
