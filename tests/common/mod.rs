//! Common test utilities and helpers
//!
//! Shared fixtures for the integration tests: recording stage fakes, git
//! origin repositories and an in-process remote console server.

#![allow(dead_code)]

pub mod mock_stages;
pub mod test_fixtures;
