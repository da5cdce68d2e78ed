//! Shared types for the class-pipeline workspace.
//!
//! This crate holds the leaf vocabulary used by both the pipeline core and the
//! CLI, so neither has to depend on the other for it:
//!
//! - [`class_name`]: dotted class names and their resource-path form
//! - [`phase`]: the coarse bootstrap phase the engine negotiates at startup
//! - [`env_utils`]: environment-variable overrides for configuration

pub mod class_name;
pub mod env_utils;
pub mod phase;

pub use class_name::{package_of, resource_path, simple_name};
pub use phase::Phase;
