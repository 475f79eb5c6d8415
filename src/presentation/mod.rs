//! Presentation layer: command line and HTTP entry points

pub mod cli;
pub mod http;
