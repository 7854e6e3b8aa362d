//! Forecast records and the ledger that owns them.
//!
//! The ledger is keyed by target round: a second forecast for the same
//! target is rejected, and a resolved forecast never changes again.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::card::Suit;

/// Which policy produced a forecast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// The fixed fallback table.
    Static,
    /// A mined rule.
    Adaptive,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static => f.write_str("static"),
            Self::Adaptive => f.write_str("adaptive"),
        }
    }
}

/// Lifecycle of a forecast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ForecastStatus {
    /// Awaiting a result inside the verification window.
    Pending,
    /// Confirmed `offset` rounds after the target round.
    Won {
        /// Distance between the confirming round and the target round.
        offset: u64,
    },
    /// Not confirmed inside the window.
    Lost,
}

impl ForecastStatus {
    /// Returns true until the forecast is resolved.
    #[must_use]
    pub const fn is_pending(self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Status mark used in display text.
    #[must_use]
    pub fn mark(self) -> String {
        match self {
            Self::Pending => "\u{23F3}".to_string(),
            Self::Won { offset } if offset <= 9 => format!("\u{2705}{offset}\u{FE0F}\u{20E3}"),
            Self::Won { offset } => format!("\u{2705}{offset}"),
            Self::Lost => "\u{274C}".to_string(),
        }
    }
}

/// A forecast of the suit of `target_round`, made at `source_round`.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Forecast {
    pub source_round: u64,
    pub target_round: u64,
    pub predicted: Suit,
    pub status: ForecastStatus,
    pub provenance: Provenance,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
    /// Host-side handle of the delivered message, used to edit it on resolution.
    #[serde(default)]
    pub message_id: Option<i64>,
}

impl Forecast {
    /// Creates a pending forecast.
    #[must_use]
    pub fn pending(
        source_round: u64,
        target_round: u64,
        predicted: Suit,
        provenance: Provenance,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            source_round,
            target_round,
            predicted,
            status: ForecastStatus::Pending,
            provenance,
            created_at,
            resolved_at: None,
            message_id: None,
        }
    }

    /// Text announcing or updating this forecast.
    #[must_use]
    pub fn display_text(&self) -> String {
        format!(
            "\u{1F535}{round}\u{1F535}:Suit {suit} status :{mark}",
            round = self.target_round,
            suit = self.predicted,
            mark = self.status.mark()
        )
    }
}

/// Ledger errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// A forecast already exists for this target round.
    #[error("forecast for target round {0} already exists")]
    DuplicateTarget(u64),
}

/// All forecasts, keyed by target round.
#[derive(Debug, Clone, Default)]
pub struct ForecastLedger {
    by_target: BTreeMap<u64, Forecast>,
}

impl ForecastLedger {
    /// Empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a ledger from persisted forecasts; later duplicates are dropped.
    #[must_use]
    pub fn from_forecasts(forecasts: impl IntoIterator<Item = Forecast>) -> Self {
        let mut ledger = Self::new();
        for forecast in forecasts {
            let source = forecast.source_round;
            if let Err(LedgerError::DuplicateTarget(target)) = ledger.open(forecast) {
                warn!(source, target, "dropping stored forecast with a duplicate target");
            }
        }
        ledger
    }

    /// Inserts a new forecast.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::DuplicateTarget` if the target round is taken.
    pub fn open(&mut self, forecast: Forecast) -> Result<&Forecast, LedgerError> {
        use std::collections::btree_map::Entry;

        match self.by_target.entry(forecast.target_round) {
            Entry::Occupied(_) => Err(LedgerError::DuplicateTarget(forecast.target_round)),
            Entry::Vacant(slot) => Ok(slot.insert(forecast)),
        }
    }

    /// Moves a pending forecast to a terminal status.
    ///
    /// Returns `None` if the forecast is unknown or already resolved.
    pub(crate) fn resolve(
        &mut self,
        target_round: u64,
        status: ForecastStatus,
        at: DateTime<Utc>,
    ) -> Option<&Forecast> {
        let forecast = self.by_target.get_mut(&target_round)?;
        if !forecast.status.is_pending() || status.is_pending() {
            return None;
        }
        forecast.status = status;
        forecast.resolved_at = Some(at);
        Some(forecast)
    }

    /// Records the host's message handle for a forecast.
    pub fn attach_message_id(&mut self, target_round: u64, message_id: i64) -> bool {
        match self.by_target.get_mut(&target_round) {
            Some(forecast) => {
                forecast.message_id = Some(message_id);
                true
            }
            None => false,
        }
    }

    /// Drops resolved forecasts whose target round is below `floor`.
    pub fn prune_resolved_before(&mut self, floor: u64) {
        self.by_target
            .retain(|target, forecast| *target >= floor || forecast.status.is_pending());
    }

    /// Forecast for `target_round`.
    #[must_use]
    pub fn get(&self, target_round: u64) -> Option<&Forecast> {
        self.by_target.get(&target_round)
    }

    /// Target rounds of pending forecasts, ascending.
    #[must_use]
    pub fn pending_targets(&self) -> Vec<u64> {
        self.by_target
            .values()
            .filter(|f| f.status.is_pending())
            .map(|f| f.target_round)
            .collect()
    }

    /// All forecasts in ascending target order.
    pub fn iter(&self) -> impl Iterator<Item = &Forecast> {
        self.by_target.values()
    }

    /// Number of forecasts held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_target.len()
    }

    /// Returns true if no forecast is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_target.is_empty()
    }
}
