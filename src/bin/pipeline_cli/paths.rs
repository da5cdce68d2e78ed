use anyhow::Result;
use class_pipeline::PipelineConfig;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const ENV_HOME: &str = "CLASS_PIPELINE_HOME";

pub fn pipeline_home() -> PathBuf {
    std::env::var(ENV_HOME)
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".class-pipeline")
        })
}

pub fn default_config_path() -> PathBuf {
    pipeline_home().join("config.json")
}

/// Explicit `--config`, else the home config when it exists, else defaults.
/// Environment overrides apply in every case.
pub fn load_config(explicit: Option<&Path>) -> Result<(PipelineConfig, Option<PathBuf>)> {
    if let Some(path) = explicit {
        return Ok((PipelineConfig::load(path)?, Some(path.to_path_buf())));
    }
    let fallback = default_config_path();
    if fallback.is_file() {
        debug!(path = %fallback.display(), "using home config");
        return Ok((PipelineConfig::load(&fallback)?, Some(fallback)));
    }
    Ok((PipelineConfig::from_env(), None))
}
