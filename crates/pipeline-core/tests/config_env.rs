//! Environment overrides for `PipelineConfig`.
//!
//! Kept in its own test binary, as a single test, because it mutates process
//! environment variables.

use anyhow::Result;
use class_pipeline_core::config::{
    ENV_CLASS_EXCLUSIONS, ENV_EXCLUDE, ENV_MAX_DEPTH, ENV_PHASE_THRESHOLD, ENV_SELF_NAME,
};
use class_pipeline_core::PipelineConfig;
use tempfile::TempDir;

#[test]
fn test_env_overrides_file_and_defaults() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("pipeline.json");
    std::fs::write(
        &path,
        r#"{ "self_name": "file.Proxy", "extra_exclusions": ["FromFile"], "phase_threshold": 90 }"#,
    )?;

    std::env::set_var(ENV_SELF_NAME, "env.Proxy");
    std::env::set_var(ENV_EXCLUDE, "Bar, org.c.");
    std::env::set_var(ENV_CLASS_EXCLUSIONS, "");
    std::env::set_var(ENV_PHASE_THRESHOLD, "not-a-number");
    std::env::set_var(ENV_MAX_DEPTH, "0");

    let config = PipelineConfig::load(&path)?;
    assert_eq!(config.self_name, "env.Proxy");
    assert_eq!(config.extra_exclusions, vec!["Bar".to_string(), "org.c.".to_string()]);
    // Unparseable values leave the lower layer in place.
    assert_eq!(config.phase_threshold, 90);
    // A depth of zero would flag every call as re-entrant.
    assert_eq!(config.max_reentrance_depth, 1);

    let from_env = PipelineConfig::from_env();
    assert_eq!(from_env.self_name, "env.Proxy");
    assert_eq!(from_env.phase_threshold, 132);

    for key in [
        ENV_SELF_NAME,
        ENV_EXCLUDE,
        ENV_CLASS_EXCLUSIONS,
        ENV_PHASE_THRESHOLD,
        ENV_MAX_DEPTH,
    ] {
        std::env::remove_var(key);
    }
    assert_eq!(PipelineConfig::from_env(), PipelineConfig::default());
    Ok(())
}
