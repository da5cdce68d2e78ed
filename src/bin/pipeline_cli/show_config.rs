use anyhow::{Context, Result};
use class_pipeline::core::exclusion::DEFAULT_EXCLUSIONS;
use class_pipeline::PipelineConfig;
use std::path::Path;

/// Print the effective configuration after file and environment layering.
pub fn execute(config: &PipelineConfig, source: Option<&Path>, json_output: bool) -> Result<()> {
    if json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(config).context("serialize config")?
        );
        return Ok(());
    }

    match source {
        Some(path) => println!("config file:          {}", path.display()),
        None => println!("config file:          (defaults)"),
    }
    println!("self name:            {}", config.self_name);
    println!("phase threshold:      {}", config.phase_threshold);
    println!("init min line:        {}", config.init_min_line);
    println!("bootstrap entry:      {}", config.bootstrap_entry);
    println!("dev launch marker:    {}", config.dev_launch_marker);
    println!("max re-entrance:      {}", config.max_reentrance_depth);
    println!("class exclusions:     {}", config.class_exclusions.join(", "));
    println!("transformer exclusions:");
    for entry in DEFAULT_EXCLUSIONS {
        println!("  {} (built-in)", entry);
    }
    for entry in &config.extra_exclusions {
        println!("  {}", entry);
    }
    Ok(())
}
