pub mod repository;
pub mod syncer;

// Re-export main types for convenience
pub use repository::{CloneConfig, GitRepository, GitRepositoryError};
pub use syncer::GitRepositorySyncer;
