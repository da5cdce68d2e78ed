use anyhow::{Context, Result};
use clap::Parser;
use class_pipeline::core::metrics::{PipelineMetrics, Stage};
use class_pipeline::core::resolver::{ArtifactResolver, Resolution, ResolutionTier};
use class_pipeline::core::source::{DirectorySource, NoopSource, ParentLoader};
use class_pipeline::types::resource_path;
use class_pipeline::PipelineError;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(about = "Resolve a class through the loader tiers")]
pub struct ResolveCmd {
    /// Dotted class name, e.g. net.example.Target
    class: String,

    /// Primary classpath root (repeatable, searched in order)
    #[arg(long, short = 'c', required = true)]
    classpath: Vec<PathBuf>,

    /// Parent loader root (repeatable)
    #[arg(long)]
    parent: Vec<PathBuf>,
}

#[derive(Debug, Serialize)]
struct ResolveReport {
    class: String,
    resource: String,
    outcome: &'static str,
    tier: Option<ResolutionTier>,
    size: Option<usize>,
    sha256: Option<String>,
    error: Option<String>,
    elapsed_ms: f64,
}

fn print_report(report: &ResolveReport) {
    println!("class:    {}", report.class);
    println!("resource: {}", report.resource);
    match (&report.tier, report.size, &report.sha256) {
        (Some(tier), Some(size), Some(sha)) => {
            let tier = match tier {
                ResolutionTier::Primary => "primary",
                ResolutionTier::Secondary => "parent",
            };
            println!("tier:     {}", tier);
            println!("size:     {} bytes", size);
            println!("sha256:   {}", sha);
        }
        _ => {
            println!("outcome:  {}", report.outcome);
            if let Some(error) = &report.error {
                println!("error:    {}", error);
            }
        }
    }
    println!("time:     {:.3} ms", report.elapsed_ms);
}

impl ResolveCmd {
    pub fn execute(&self, json_output: bool, verbose: bool) -> Result<()> {
        let metrics = Arc::new(PipelineMetrics::new().context("register metrics")?);
        let parent: Arc<dyn ParentLoader> = if self.parent.is_empty() {
            Arc::new(NoopSource)
        } else {
            Arc::new(DirectorySource::new(&self.parent))
        };
        let resolver = ArtifactResolver::new(Arc::new(DirectorySource::new(&self.classpath)), parent)
            .with_metrics(metrics.clone());

        let resolution = {
            let _timer = metrics.stage_timer(Stage::ClassLoad);
            resolver.resolve(&self.class)
        };
        let snapshot = metrics.snapshot();

        let outcome = resolution.label();
        let tier = resolution.tier();
        let error = match &resolution {
            Resolution::Unreadable { error, .. } => Some(error.to_string()),
            _ => None,
        };
        let bytes = resolution.into_bytes();
        let report = ResolveReport {
            class: self.class.clone(),
            resource: resource_path(&self.class),
            outcome,
            tier,
            size: bytes.as_ref().map(Vec::len),
            sha256: bytes.as_ref().map(|b| hex::encode(Sha256::digest(b))),
            error,
            elapsed_ms: snapshot.class_load.total_seconds * 1000.0,
        };

        if json_output {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("serialize resolve report")?
            );
        } else {
            print_report(&report);
            if verbose {
                println!();
                println!("{}", snapshot.format_report());
            }
        }

        if bytes.is_none() {
            return Err(PipelineError::not_found(&self.class).into());
        }
        Ok(())
    }
}
