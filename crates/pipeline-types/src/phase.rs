//! Bootstrap phase markers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Coarse position of the engine relative to the host's bootstrap sequence.
///
/// Phases are ordered: `PreInit < Default`. A mixin definition bound to a
/// phase applies once the environment has reached that phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Engine started before the host finished bootstrapping; a later
    /// initialization step has to be self-scheduled.
    PreInit,
    /// Most of the bootstrap already ran.
    Default,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::PreInit => "preinit",
            Phase::Default => "default",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "preinit" | "pre_init" | "early" => Ok(Phase::PreInit),
            "default" | "late" => Ok(Phase::Default),
            other => Err(format!("unknown phase '{}'", other)),
        }
    }
}
