//! Latency and outcome metrics for the pipeline.
//!
//! Metrics live in a private `prometheus::Registry` owned by each pipeline
//! instance so that several engines in one process never collide.

use prometheus::{
    HistogramOpts, HistogramTimer, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const STAGE_SECONDS: &str = "class_pipeline_stage_seconds";
const UNIT_SECONDS: &str = "class_pipeline_unit_seconds";
const RESOLUTIONS: &str = "class_pipeline_resolutions_total";
const CHAIN_REBUILDS: &str = "class_pipeline_chain_rebuilds_total";
const REENTRANT_UNITS: &str = "class_pipeline_reentrant_units_total";

/// Timed stages of a class request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Byte resolution through the loader tiers.
    ClassLoad,
    /// The delegated transformer chain.
    ClassTransform,
}

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Stage::ClassLoad => "class.load",
            Stage::ClassTransform => "class.transform",
        }
    }
}

#[derive(Clone)]
pub struct PipelineMetrics {
    registry: Registry,
    stage_seconds: HistogramVec,
    unit_seconds: HistogramVec,
    resolutions: IntCounterVec,
    chain_rebuilds: IntCounter,
    reentrant_units: IntCounter,
}

impl PipelineMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let stage_seconds = HistogramVec::new(
            HistogramOpts::new(STAGE_SECONDS, "Latency of class load and transform stages"),
            &["stage"],
        )?;
        let unit_seconds = HistogramVec::new(
            HistogramOpts::new(UNIT_SECONDS, "Latency of individual delegated transformers"),
            &["unit"],
        )?;
        let resolutions = IntCounterVec::new(
            Opts::new(RESOLUTIONS, "Class byte resolutions by outcome tier"),
            &["tier"],
        )?;
        let chain_rebuilds = IntCounter::new(CHAIN_REBUILDS, "Delegation chain rebuilds")?;
        let reentrant_units = IntCounter::new(
            REENTRANT_UNITS,
            "Transformers promoted to the exclusion set after re-entering the pipeline",
        )?;

        registry.register(Box::new(stage_seconds.clone()))?;
        registry.register(Box::new(unit_seconds.clone()))?;
        registry.register(Box::new(resolutions.clone()))?;
        registry.register(Box::new(chain_rebuilds.clone()))?;
        registry.register(Box::new(reentrant_units.clone()))?;

        Ok(Self {
            registry,
            stage_seconds,
            unit_seconds,
            resolutions,
            chain_rebuilds,
            reentrant_units,
        })
    }

    /// Start timing a stage; the observation is recorded when the timer drops.
    pub fn stage_timer(&self, stage: Stage) -> HistogramTimer {
        self.stage_seconds
            .with_label_values(&[stage.label()])
            .start_timer()
    }

    /// Start timing one transformer, labelled by its lower-cased simple name.
    pub fn unit_timer(&self, simple_name: &str) -> HistogramTimer {
        let label = simple_name.to_lowercase();
        self.unit_seconds
            .with_label_values(&[label.as_str()])
            .start_timer()
    }

    pub fn record_resolution(&self, tier: &str) {
        self.resolutions.with_label_values(&[tier]).inc();
    }

    pub fn record_chain_rebuild(&self) {
        self.chain_rebuilds.inc();
    }

    pub fn record_reentrant_unit(&self) {
        self.reentrant_units.inc();
    }

    /// Raw metric families, for hosts that export to a scrape endpoint.
    pub fn gather(&self) -> Vec<prometheus::proto::MetricFamily> {
        self.registry.gather()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let stage = |stage: Stage| {
            let histogram = self.stage_seconds.with_label_values(&[stage.label()]);
            StageTiming {
                count: histogram.get_sample_count(),
                total_seconds: histogram.get_sample_sum(),
            }
        };
        let tier = |tier: &str| self.resolutions.with_label_values(&[tier]).get();

        let mut units = BTreeMap::new();
        for family in self.registry.gather() {
            if family.get_name() != UNIT_SECONDS {
                continue;
            }
            for metric in family.get_metric() {
                let Some(label) = metric.get_label().first() else {
                    continue;
                };
                let histogram = metric.get_histogram();
                units.insert(
                    label.get_value().to_string(),
                    StageTiming {
                        count: histogram.get_sample_count(),
                        total_seconds: histogram.get_sample_sum(),
                    },
                );
            }
        }

        MetricsSnapshot {
            class_load: stage(Stage::ClassLoad),
            class_transform: stage(Stage::ClassTransform),
            units,
            resolved_primary: tier("primary"),
            resolved_secondary: tier("secondary"),
            not_found: tier("not_found"),
            unreadable: tier("unreadable"),
            chain_rebuilds: self.chain_rebuilds.get(),
            reentrant_units: self.reentrant_units.get(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageTiming {
    pub count: u64,
    pub total_seconds: f64,
}

impl StageTiming {
    pub fn mean_millis(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.total_seconds * 1000.0 / self.count as f64
    }
}

/// Point-in-time copy of the pipeline metrics (for reporting).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub class_load: StageTiming,
    pub class_transform: StageTiming,
    pub units: BTreeMap<String, StageTiming>,
    pub resolved_primary: u64,
    pub resolved_secondary: u64,
    pub not_found: u64,
    pub unreadable: u64,
    pub chain_rebuilds: u64,
    pub reentrant_units: u64,
}

impl MetricsSnapshot {
    pub fn total_resolutions(&self) -> u64 {
        self.resolved_primary + self.resolved_secondary + self.not_found + self.unreadable
    }

    /// Share of resolutions served by the primary loader.
    pub fn primary_hit_rate(&self) -> f64 {
        let total = self.total_resolutions();
        if total == 0 {
            return 0.0;
        }
        self.resolved_primary as f64 / total as f64
    }

    pub fn format_report(&self) -> String {
        let mut lines = Vec::new();
        lines.push("Pipeline Metrics Report".to_string());
        lines.push("=".repeat(50));
        lines.push("Resolution:".to_string());
        lines.push(format!("  Primary loader:   {}", self.resolved_primary));
        lines.push(format!("  Parent resource:  {}", self.resolved_secondary));
        lines.push(format!("  Not found:        {}", self.not_found));
        lines.push(format!("  Unreadable:       {}", self.unreadable));
        lines.push(format!(
            "  Primary hit rate: {:.1}%",
            self.primary_hit_rate() * 100.0
        ));
        lines.push(String::new());
        lines.push("Stages:".to_string());
        lines.push(format!(
            "  class.load:       {} calls, {:.3} ms avg",
            self.class_load.count,
            self.class_load.mean_millis()
        ));
        lines.push(format!(
            "  class.transform:  {} calls, {:.3} ms avg",
            self.class_transform.count,
            self.class_transform.mean_millis()
        ));
        if !self.units.is_empty() {
            lines.push(String::new());
            lines.push("Transformers:".to_string());
            for (unit, timing) in &self.units {
                lines.push(format!(
                    "  {:<24} {} calls, {:.3} ms avg",
                    unit,
                    timing.count,
                    timing.mean_millis()
                ));
            }
        }
        lines.push(String::new());
        lines.push(format!("Chain rebuilds:     {}", self.chain_rebuilds));
        lines.push(format!("Re-entrant units:   {}", self.reentrant_units));
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_and_snapshot() -> prometheus::Result<()> {
        let metrics = PipelineMetrics::new()?;
        metrics.record_resolution("primary");
        metrics.record_resolution("primary");
        metrics.record_resolution("not_found");
        metrics.record_chain_rebuild();
        metrics.record_reentrant_unit();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.resolved_primary, 2);
        assert_eq!(snapshot.not_found, 1);
        assert_eq!(snapshot.total_resolutions(), 3);
        assert_eq!(snapshot.chain_rebuilds, 1);
        assert_eq!(snapshot.reentrant_units, 1);
        assert!((snapshot.primary_hit_rate() - 2.0 / 3.0).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn test_timers_record_on_drop() -> prometheus::Result<()> {
        let metrics = PipelineMetrics::new()?;
        {
            let _load = metrics.stage_timer(Stage::ClassLoad);
        }
        metrics.unit_timer("TerminalTransformer").observe_duration();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.class_load.count, 1);
        assert_eq!(snapshot.class_transform.count, 0);
        assert_eq!(
            snapshot.units.get("terminaltransformer").map(|t| t.count),
            Some(1)
        );
        assert!(snapshot.format_report().contains("terminaltransformer"));
        Ok(())
    }

    #[test]
    fn test_instances_are_independent() -> prometheus::Result<()> {
        let a = PipelineMetrics::new()?;
        let b = PipelineMetrics::new()?;
        a.record_chain_rebuild();
        assert_eq!(a.snapshot().chain_rebuilds, 1);
        assert_eq!(b.snapshot().chain_rebuilds, 0);
        Ok(())
    }
}
