use anyhow::{Context, Result};
use clap::Parser;
use class_pipeline::core::phase::{
    refmap_remap_enabled, EarlyStartProbe, EnvProbe, FixedProbe, InitPlan, PhaseNegotiator,
};
use class_pipeline::types::Phase;
use class_pipeline::PipelineConfig;
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(about = "Negotiate the initial bootstrap phase")]
pub struct PhaseCmd {
    /// Line of the launcher entry frame (0 = not found)
    #[arg(long)]
    line: Option<u32>,

    /// Launch command to check for the development marker
    #[arg(long)]
    command: Option<String>,

    /// Override the configured phase threshold
    #[arg(long)]
    threshold: Option<u32>,
}

#[derive(Debug, Serialize)]
struct PhaseReport {
    probe: &'static str,
    line: u32,
    threshold: u32,
    phase: Phase,
    init_ok: bool,
    deferred_steps: Vec<String>,
    refmap_remap: bool,
}

fn print_report(report: &PhaseReport) {
    println!("probe:        {}", report.probe);
    println!("frame line:   {} (threshold {})", report.line, report.threshold);
    println!("phase:        {}", report.phase);
    if !report.init_ok {
        println!("init:         too early (bootstrap constructor)");
    }
    if report.deferred_steps.is_empty() {
        println!("deferred:     none");
    } else {
        println!("deferred:     {}", report.deferred_steps.join(", "));
    }
    println!("refmap remap: {}", report.refmap_remap);
}

impl PhaseCmd {
    pub fn execute(&self, config: &PipelineConfig, json_output: bool) -> Result<()> {
        let (probe_name, probe): (&'static str, Box<dyn EarlyStartProbe>) =
            if self.line.is_none() && self.command.is_none() {
                ("env", Box::new(EnvProbe))
            } else {
                (
                    "fixed",
                    Box::new(FixedProbe::new(self.line.unwrap_or(0), self.command.as_deref())),
                )
            };
        let line = probe.bootstrap_frame_line();

        let mut config = config.clone();
        if let Some(threshold) = self.threshold {
            config.phase_threshold = threshold;
        }
        let negotiator = PhaseNegotiator::from_config(probe, &config);
        let init_ok = negotiator.validate_init();
        let phase = negotiator.decide_initial_phase();
        let plan = InitPlan::for_phase(phase);

        let report = PhaseReport {
            probe: probe_name,
            line,
            threshold: negotiator.threshold(),
            phase,
            init_ok,
            deferred_steps: plan.deferred_steps,
            refmap_remap: refmap_remap_enabled(),
        };

        if json_output {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("serialize phase report")?
            );
        } else {
            print_report(&report);
        }
        Ok(())
    }
}
