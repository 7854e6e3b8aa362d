//! Mode controller: the STATIC / ADAPTIVE state machine.
//!
//! Transitions are deliberately asymmetric. A single miss by an adaptive
//! rule drops back to the static table at once, while the static table has
//! to miss `static_failure_threshold` times in a row (2 by default) before
//! the controller forces a switch to mined rules.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::correlation::CorrelationRecord;
use crate::forecast::Provenance;
use crate::notify::{RuleNotice, RuleNoticeKind, RuleNotifier};
use crate::rules::{rules_changed, RuleMiner};
use crate::state::{EngineMode, EngineState};

/// Owns the transition rules; the state itself lives in [`EngineState`].
#[derive(Clone)]
pub struct ModeController {
    miner: RuleMiner,
    mining_interval: Duration,
    failure_threshold: u32,
    notifier: Arc<dyn RuleNotifier>,
}

impl std::fmt::Debug for ModeController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModeController")
            .field("miner", &self.miner)
            .field("mining_interval", &self.mining_interval)
            .field("failure_threshold", &self.failure_threshold)
            .finish_non_exhaustive()
    }
}

impl ModeController {
    /// Controller using the mining and threshold settings of `config`.
    #[must_use]
    pub fn new(config: &EngineConfig, notifier: Arc<dyn RuleNotifier>) -> Self {
        Self {
            miner: RuleMiner::new(config.mining_policy, config.min_samples),
            mining_interval: config.mining_interval(),
            failure_threshold: config.static_failure_threshold,
            notifier,
        }
    }

    /// Re-mines the rule set and picks the mode.
    ///
    /// With `force`, or when mining produced rules, the mode becomes
    /// `Adaptive` and the static failure counter resets. Otherwise the mode
    /// becomes `Static`. `requested_by` registers the operator receiving
    /// notices: a forced request always takes over, an unforced one only
    /// fills an empty slot.
    pub fn request_activate(
        &self,
        state: &mut EngineState,
        records: &[CorrelationRecord],
        force: bool,
        requested_by: Option<i64>,
        now: DateTime<Utc>,
    ) -> RuleNotice {
        let rules = self.miner.mine(records);
        state.previous_rules = std::mem::replace(&mut state.active_rules, rules);
        let changed = rules_changed(&state.previous_rules, &state.active_rules);

        if let Some(admin) = requested_by {
            if force || state.admin_id.is_none() {
                state.admin_id = Some(admin);
            }
        }

        let previous_mode = state.mode;
        if force || !state.active_rules.is_empty() {
            state.mode = EngineMode::Adaptive;
            state.consecutive_static_failures = 0;
        } else {
            state.mode = EngineMode::Static;
        }
        state.last_mining_time = Some(now);

        info!(
            force,
            samples = records.len(),
            rules = state.active_rules.len(),
            changed,
            from = %previous_mode,
            to = %state.mode,
            "rules mined"
        );

        let kind = if state.active_rules.is_empty() {
            if state.mode == EngineMode::Adaptive {
                RuleNoticeKind::AwaitingData
            } else {
                RuleNoticeKind::Disabled
            }
        } else if changed {
            RuleNoticeKind::Changed {
                rules: state.active_rules.clone(),
            }
        } else {
            RuleNoticeKind::Unchanged
        };
        let notice = RuleNotice {
            recipient: requested_by.or(state.admin_id),
            kind,
        };
        self.notifier.notify(&notice);
        notice
    }

    /// Re-evaluates adaptive rules once they are older than the mining interval.
    ///
    /// Runs unforced, so degraded rules may silently fall back to `Static`.
    /// Returns true if a mining pass ran.
    pub fn periodic_check(
        &self,
        state: &mut EngineState,
        records: &[CorrelationRecord],
        now: DateTime<Utc>,
    ) -> bool {
        if !state.is_adaptive() {
            return false;
        }
        let due = state
            .last_mining_time
            .map_or(true, |mined| now - mined > self.mining_interval);
        if !due {
            return false;
        }
        debug!(last = ?state.last_mining_time, "periodic rule re-evaluation");
        self.request_activate(state, records, false, None, now);
        true
    }

    /// Applies a lost forecast.
    pub fn on_forecast_failure(
        &self,
        state: &mut EngineState,
        records: &[CorrelationRecord],
        provenance: Provenance,
        now: DateTime<Utc>,
    ) {
        match provenance {
            Provenance::Adaptive => {
                state.mode = EngineMode::Static;
                state.consecutive_static_failures = 0;
                warn!("adaptive rule missed, falling back to static table");
            }
            Provenance::Static => {
                state.consecutive_static_failures += 1;
                warn!(
                    failures = state.consecutive_static_failures,
                    threshold = self.failure_threshold,
                    "static forecast missed"
                );
                if state.consecutive_static_failures >= self.failure_threshold {
                    info!("static table failed repeatedly, forcing adaptive mode");
                    self.request_activate(state, records, true, None, now);
                }
            }
        }
    }

    /// Applies a confirmed forecast, whatever its provenance.
    pub fn on_forecast_success(&self, state: &mut EngineState) {
        state.consecutive_static_failures = 0;
    }

    /// Manual switch back to the static table.
    pub fn force_deactivate(&self, state: &mut EngineState) {
        state.mode = EngineMode::Static;
        info!("adaptive mode disabled manually");
    }

    /// Fills an empty rule set from existing data without touching the mode.
    ///
    /// Used after a restore so the status view shows candidate rules.
    pub fn prime(&self, state: &mut EngineState, records: &[CorrelationRecord]) {
        if state.active_rules.is_empty() && !records.is_empty() && !state.is_adaptive() {
            state.active_rules = self.miner.mine(records);
            debug!(rules = state.active_rules.len(), "rules primed from stored correlations");
        }
    }
}
