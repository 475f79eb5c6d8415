//! Application layer: the update pipeline use case

pub mod use_cases;
