//! Pipeline configuration.
//!
//! Layers, lowest first: [`PipelineConfig::default`], an optional JSON file
//! ([`PipelineConfig::load`]), then `CLASS_PIPELINE_*` environment variables
//! ([`PipelineConfig::with_env_overrides`]).

use anyhow::{Context, Result};
use class_pipeline_types::env_utils::{env_list, env_parse, env_string};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name under which the engine's own proxy transformer is registered.
pub const DEFAULT_SELF_NAME: &str = "org.classpipeline.transformer.Proxy";

/// Launcher entry point whose frame is used to negotiate the initial phase.
pub const DEFAULT_BOOTSTRAP_ENTRY: &str = "launchwrapper::Launch::launch";

/// Launch-command marker of a development launch.
pub const DEFAULT_DEV_LAUNCH_MARKER: &str = "devlaunchinjector";

/// Bootstrap-frame line above which the engine is considered late.
pub const DEFAULT_PHASE_THRESHOLD: u32 = 132;

/// Bootstrap-frame line below which `init` runs too early.
pub const DEFAULT_INIT_MIN_LINE: u32 = 4;

pub const ENV_SELF_NAME: &str = "CLASS_PIPELINE_SELF_NAME";
pub const ENV_EXCLUDE: &str = "CLASS_PIPELINE_EXCLUDE";
pub const ENV_CLASS_EXCLUSIONS: &str = "CLASS_PIPELINE_CLASS_EXCLUSIONS";
pub const ENV_PHASE_THRESHOLD: &str = "CLASS_PIPELINE_PHASE_THRESHOLD";
pub const ENV_INIT_MIN_LINE: &str = "CLASS_PIPELINE_INIT_MIN_LINE";
pub const ENV_BOOTSTRAP_ENTRY: &str = "CLASS_PIPELINE_BOOTSTRAP_ENTRY";
pub const ENV_DEV_MARKER: &str = "CLASS_PIPELINE_DEV_MARKER";
pub const ENV_MAX_DEPTH: &str = "CLASS_PIPELINE_MAX_DEPTH";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Proxy transformer name; never part of the delegation chain.
    pub self_name: String,
    /// Exclusion entries added on top of the built-in known-bad list.
    pub extra_exclusions: Vec<String>,
    /// Class-name prefixes the delegated chain never touches.
    pub class_exclusions: Vec<String>,
    pub phase_threshold: u32,
    pub init_min_line: u32,
    pub bootstrap_entry: String,
    pub dev_launch_marker: String,
    /// Nesting depth at which an engine entry counts as re-entrant.
    pub max_reentrance_depth: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            self_name: DEFAULT_SELF_NAME.to_string(),
            extra_exclusions: Vec::new(),
            class_exclusions: vec![
                "java.".to_string(),
                "sun.".to_string(),
                "org.classpipeline.".to_string(),
            ],
            phase_threshold: DEFAULT_PHASE_THRESHOLD,
            init_min_line: DEFAULT_INIT_MIN_LINE,
            bootstrap_entry: DEFAULT_BOOTSTRAP_ENTRY.to_string(),
            dev_launch_marker: DEFAULT_DEV_LAUNCH_MARKER.to_string(),
            max_reentrance_depth: 1,
        }
    }
}

impl PipelineConfig {
    /// Defaults plus environment overrides.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Read a JSON config file, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let config: PipelineConfig = serde_json::from_str(&json)
            .with_context(|| format!("parse config {}", path.display()))?;
        Ok(config.with_env_overrides())
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Some(name) = env_string(ENV_SELF_NAME) {
            self.self_name = name;
        }
        if let Some(list) = env_list(ENV_EXCLUDE) {
            self.extra_exclusions = list;
        }
        if let Some(list) = env_list(ENV_CLASS_EXCLUSIONS) {
            self.class_exclusions = list;
        }
        if let Some(threshold) = env_parse(ENV_PHASE_THRESHOLD) {
            self.phase_threshold = threshold;
        }
        if let Some(line) = env_parse(ENV_INIT_MIN_LINE) {
            self.init_min_line = line;
        }
        if let Some(entry) = env_string(ENV_BOOTSTRAP_ENTRY) {
            self.bootstrap_entry = entry;
        }
        if let Some(marker) = env_string(ENV_DEV_MARKER) {
            self.dev_launch_marker = marker;
        }
        if let Some(depth) = env_parse::<usize>(ENV_MAX_DEPTH) {
            self.max_reentrance_depth = depth.max(1);
        }
        self
    }
}
