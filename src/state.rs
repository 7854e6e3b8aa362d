//! Engine-wide mutable state.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::rules::Rule;

/// Decision policy in force.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineMode {
    /// Forecasts come from the fixed fallback table.
    #[default]
    Static,
    /// Mined rules are consulted first.
    Adaptive,
}

impl fmt::Display for EngineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static => f.write_str("STATIC"),
            Self::Adaptive => f.write_str("ADAPTIVE"),
        }
    }
}

/// Mode, counters and the active rule set.
///
/// Mutated only by the mode controller and the decision path; persisted as
/// one record (the rule lists are stored under their own key as well).
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineState {
    pub mode: EngineMode,
    pub last_mining_time: Option<DateTime<Utc>>,
    pub last_forecast_round: Option<u64>,
    pub last_forecast_time: Option<DateTime<Utc>>,
    pub consecutive_static_failures: u32,
    pub active_rules: Vec<Rule>,
    /// Rule set installed before the latest mining pass.
    pub previous_rules: Vec<Rule>,
    /// Recipient of rule notices, set by a manual activation.
    pub admin_id: Option<i64>,
}

impl EngineState {
    /// Returns true in adaptive mode.
    #[must_use]
    pub const fn is_adaptive(&self) -> bool {
        matches!(self.mode, EngineMode::Adaptive)
    }
}
