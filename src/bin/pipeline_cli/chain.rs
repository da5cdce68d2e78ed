use anyhow::{Context, Result};
use clap::Parser;
use class_pipeline::core::chain::{ExcludedUnit, ExclusionReason};
use class_pipeline::core::TransformerSource;
use class_pipeline::{ChainManifest, DelegationChainBuilder, ExclusionSet, PipelineConfig};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(about = "Build the delegation chain for a transformer manifest")]
pub struct ChainCmd {
    /// JSON manifest of registered transformers
    #[arg(long)]
    manifest: PathBuf,

    /// Extra exclusion entry (repeatable, substring match)
    #[arg(long = "exclude")]
    exclude: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ChainReport {
    self_name: String,
    included: Vec<String>,
    excluded: Vec<ExcludedUnit>,
    foreign: Vec<String>,
    exclusions: Vec<String>,
}

fn describe(reason: &ExclusionReason) -> String {
    match reason {
        ExclusionReason::SelfProxy => "pipeline proxy".to_string(),
        ExclusionReason::Matched(entry) => format!("matches '{}'", entry),
        ExclusionReason::DelegationExcluded => "opted out of delegation".to_string(),
    }
}

fn print_report(report: &ChainReport, verbose: bool) {
    println!("Delegation chain ({} units)", report.included.len());
    for (i, name) in report.included.iter().enumerate() {
        println!("  {:>2}. {}", i + 1, name);
    }

    if !report.excluded.is_empty() {
        println!();
        println!("Excluded:");
        for unit in &report.excluded {
            println!("  {} ({})", unit.name, describe(&unit.reason));
        }
    }

    if !report.foreign.is_empty() {
        println!();
        println!("Foreign (not delegated):");
        for name in &report.foreign {
            println!("  {}", name);
        }
    }

    if verbose {
        println!();
        println!("Exclusion entries:");
        for entry in &report.exclusions {
            println!("  {}", entry);
        }
    }
}

impl ChainCmd {
    pub fn execute(&self, config: &PipelineConfig, json_output: bool, verbose: bool) -> Result<()> {
        let manifest = ChainManifest::load(&self.manifest)?;
        let registry = Arc::new(manifest.to_registry());
        let self_name = manifest
            .self_name
            .clone()
            .unwrap_or_else(|| config.self_name.clone());

        let mut exclusions = ExclusionSet::new();
        exclusions.extend(&config.extra_exclusions);
        exclusions.extend(&manifest.exclusions);
        exclusions.extend(&self.exclude);

        let builder = DelegationChainBuilder::new(registry.clone(), &self_name, exclusions);
        let chain = builder.get();

        let report = ChainReport {
            self_name,
            included: chain.names().into_iter().map(str::to_string).collect(),
            excluded: chain.excluded().to_vec(),
            foreign: registry
                .snapshot()
                .iter()
                .filter(|h| h.as_legacy().is_none())
                .map(|h| h.name().to_string())
                .collect(),
            exclusions: builder.exclusions(),
        };

        if json_output {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("serialize chain report")?
            );
        } else {
            print_report(&report, verbose);
        }
        Ok(())
    }
}
