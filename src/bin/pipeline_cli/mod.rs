//! CLI subcommand implementations for class-pipeline

pub mod chain;
pub mod paths;
pub mod phase;
pub mod resolve;
pub mod show_config;
