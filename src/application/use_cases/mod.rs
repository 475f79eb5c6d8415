pub mod update_coordinator;

pub use update_coordinator::{
    RestartHandle, TriggerAccepted, TriggerRequest, UpdateCoordinator, UpdateStages,
};
