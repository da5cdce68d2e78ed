//! Initial phase negotiation.
//!
//! The engine has to know whether it was started early in the host's
//! bootstrap (and must schedule its own later initialization step) or late
//! (most of the bootstrap already ran). The only signal available is the
//! source line of the launcher's entry frame on the main thread's stack: a
//! line past the configured threshold means the launcher already passed the
//! point where early tweakers run.
//!
//! Reading that line is host-specific and fragile, so it sits behind the
//! [`EarlyStartProbe`] trait. [`BacktraceProbe`] is a best-effort
//! implementation over `std::backtrace`; it depends on debug info being
//! present and on symbol names staying stable.

use class_pipeline_types::env_utils::{env_parse, env_string};
use class_pipeline_types::Phase;
use serde::Serialize;
use std::backtrace::Backtrace;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;
use tracing::{debug, error, info};

use crate::config::PipelineConfig;

pub const ENV_BOOTSTRAP_LINE: &str = "CLASS_PIPELINE_BOOTSTRAP_LINE";
pub const ENV_LAUNCH_COMMAND: &str = "CLASS_PIPELINE_LAUNCH_COMMAND";

/// Deferred bootstrap step that moves the engine out of `PreInit`.
pub const STATE_TRANSITION_STEP: &str = "org.classpipeline.bootstrap.StateTransition";

static REFMAP_REMAP: AtomicBool = AtomicBool::new(false);

/// Whether a development launch was detected in this process.
pub fn refmap_remap_enabled() -> bool {
    REFMAP_REMAP.load(Ordering::Acquire)
}

fn enable_refmap_remap() {
    REFMAP_REMAP.store(true, Ordering::Release);
}

pub trait EarlyStartProbe: Send + Sync {
    /// Line of the launcher entry frame, or 0 when there is no such frame or
    /// the caller is not on the main thread.
    fn bootstrap_frame_line(&self) -> u32;

    /// Full launch command, when known.
    fn launch_command(&self) -> Option<String>;
}

/// Values supplied up front by the host.
#[derive(Debug, Clone, Default)]
pub struct FixedProbe {
    pub line: u32,
    pub command: Option<String>,
}

impl FixedProbe {
    pub fn new(line: u32, command: Option<&str>) -> Self {
        Self {
            line,
            command: command.map(str::to_string),
        }
    }
}

impl EarlyStartProbe for FixedProbe {
    fn bootstrap_frame_line(&self) -> u32 {
        self.line
    }

    fn launch_command(&self) -> Option<String> {
        self.command.clone()
    }
}

/// Reads [`ENV_BOOTSTRAP_LINE`] and [`ENV_LAUNCH_COMMAND`].
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvProbe;

impl EarlyStartProbe for EnvProbe {
    fn bootstrap_frame_line(&self) -> u32 {
        env_parse(ENV_BOOTSTRAP_LINE).unwrap_or(0)
    }

    fn launch_command(&self) -> Option<String> {
        env_string(ENV_LAUNCH_COMMAND)
    }
}

/// Scans the current stack for the launcher entry frame.
#[derive(Debug, Clone)]
pub struct BacktraceProbe {
    entry_symbol: String,
}

impl BacktraceProbe {
    pub fn new(entry_symbol: &str) -> Self {
        Self {
            entry_symbol: entry_symbol.to_string(),
        }
    }
}

impl EarlyStartProbe for BacktraceProbe {
    fn bootstrap_frame_line(&self) -> u32 {
        if std::thread::current().name() != Some("main") {
            return 0;
        }
        let trace = Backtrace::force_capture().to_string();
        find_frame_line(&trace, &self.entry_symbol).unwrap_or(0)
    }

    fn launch_command(&self) -> Option<String> {
        let args: Vec<String> = std::env::args().collect();
        if args.is_empty() {
            None
        } else {
            Some(args.join(" "))
        }
    }
}

/// Source line of the first frame whose symbol contains `symbol`, in the
/// rendering of `std::backtrace::Backtrace`:
///
/// ```text
///    3: launchwrapper::Launch::launch
///              at ./src/launch.rs:141:9
/// ```
pub fn find_frame_line(trace: &str, symbol: &str) -> Option<u32> {
    let mut lines = trace.lines();
    while let Some(line) = lines.next() {
        if !is_symbol_line(line) || !line.contains(symbol) {
            continue;
        }
        let location = lines.next()?.trim_start();
        let location = location.strip_prefix("at ")?;
        let mut parts = location.rsplitn(3, ':');
        let _column = parts.next()?;
        return parts.next()?.parse().ok();
    }
    None
}

fn is_symbol_line(line: &str) -> bool {
    line.trim_start()
        .split_once(": ")
        .map(|(index, _)| index.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(false)
}

/// Decides and remembers the engine's initial phase.
pub struct PhaseNegotiator {
    probe: Box<dyn EarlyStartProbe>,
    threshold: u32,
    init_min_line: u32,
    dev_marker: String,
    decided: OnceLock<Phase>,
}

impl PhaseNegotiator {
    pub fn new(probe: Box<dyn EarlyStartProbe>, threshold: u32) -> Self {
        let defaults = PipelineConfig::default();
        Self {
            probe,
            threshold,
            init_min_line: defaults.init_min_line,
            dev_marker: defaults.dev_launch_marker,
            decided: OnceLock::new(),
        }
    }

    pub fn from_config(probe: Box<dyn EarlyStartProbe>, config: &PipelineConfig) -> Self {
        Self {
            probe,
            threshold: config.phase_threshold,
            init_min_line: config.init_min_line,
            dev_marker: config.dev_launch_marker.clone(),
            decided: OnceLock::new(),
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Only the first call consults the probe.
    pub fn decide_initial_phase(&self) -> Phase {
        *self.decided.get_or_init(|| self.negotiate())
    }

    /// The decision, if one was made.
    pub fn decided(&self) -> Option<Phase> {
        self.decided.get().copied()
    }

    /// `false` when `init` runs from inside a bootstrap constructor, or when
    /// the launcher frame cannot be located at all (line 0).
    pub fn validate_init(&self) -> bool {
        let line = self.probe.bootstrap_frame_line();
        if line < self.init_min_line {
            error!(
                line,
                min_line = self.init_min_line,
                "init called during a bootstrap constructor"
            );
            return false;
        }
        true
    }

    fn negotiate(&self) -> Phase {
        if let Some(command) = self.probe.launch_command() {
            if !self.dev_marker.is_empty() && command.contains(&self.dev_marker) {
                debug!(marker = %self.dev_marker, "development launch detected, enabling refmap remapping");
                enable_refmap_remap();
            }
        }

        let line = self.probe.bootstrap_frame_line();
        let phase = if line > self.threshold {
            Phase::Default
        } else {
            Phase::PreInit
        };
        info!(line, threshold = self.threshold, %phase, "initial phase negotiated");
        phase
    }
}

/// Steps `init` hands to the host's deferred bootstrap queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InitPlan {
    pub phase: Phase,
    pub deferred_steps: Vec<String>,
}

impl InitPlan {
    pub fn for_phase(phase: Phase) -> Self {
        let deferred_steps = match phase {
            Phase::PreInit => vec![STATE_TRANSITION_STEP.to_string()],
            Phase::Default => Vec::new(),
        };
        Self {
            phase,
            deferred_steps,
        }
    }

    /// Append the deferred steps the queue does not already hold.
    pub fn schedule_into(&self, queue: &mut Vec<String>) {
        for step in &self.deferred_steps {
            if !queue.contains(step) {
                queue.push(step.clone());
            }
        }
    }
}
