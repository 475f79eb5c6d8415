//! Shared error handling, result helpers and logging setup

pub mod error;
pub mod logging;
pub mod result;
