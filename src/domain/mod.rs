//! Domain layer: pipeline configuration, run records and value objects

pub mod entities;
pub mod value_objects;
