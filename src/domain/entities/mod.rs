pub mod pipeline_config;
pub mod pipeline_run;

pub use pipeline_config::{PipelineConfig, RestartFencing};
pub use pipeline_run::{PipelineRun, Stage, StageOutcome, StageRecord};
