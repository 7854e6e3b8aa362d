//! Read-only status view of an engine.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::card::Suit;
use crate::correlation::{CorrelationRecord, CorrelationStore};
use crate::forecast::{Forecast, ForecastLedger};
use crate::rules::Rule;
use crate::state::{EngineMode, EngineState};

const RECENT: usize = 5;
const LINES_PER_SUIT: usize = 10;

/// Point-in-time copy of the engine's introspectable state.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub mode: EngineMode,
    pub rules: Vec<Rule>,
    /// Number of correlation records.
    pub sample_count: usize,
    /// Last few correlation records, oldest first.
    pub recent_correlations: Vec<CorrelationRecord>,
    /// Every correlation record, grouped by the suit of its trigger card.
    pub triggers_by_suit: BTreeMap<Suit, Vec<CorrelationRecord>>,
    pub pending_forecasts: Vec<Forecast>,
}

impl StatusSnapshot {
    pub(crate) fn capture(
        state: &EngineState,
        correlations: &CorrelationStore,
        ledger: &ForecastLedger,
    ) -> Self {
        let mut triggers_by_suit: BTreeMap<Suit, Vec<CorrelationRecord>> = BTreeMap::new();
        for record in correlations.records() {
            triggers_by_suit
                .entry(record.trigger_card.suit)
                .or_default()
                .push(record.clone());
        }

        Self {
            mode: state.mode,
            rules: state.active_rules.clone(),
            sample_count: correlations.len(),
            recent_correlations: correlations.recent(RECENT).to_vec(),
            triggers_by_suit,
            pending_forecasts: ledger
                .iter()
                .filter(|f| f.status.is_pending())
                .cloned()
                .collect(),
        }
    }

    /// Multi-line text for an operator.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        let (active, source) = match self.mode {
            EngineMode::Adaptive => ("yes (mined rules applied)", "mined rule"),
            EngineMode::Static => ("no (static table)", "static table"),
        };
        let _ = writeln!(out, "Mode: {} | adaptive: {active}", self.mode);
        let _ = writeln!(out, "Forecast source: {source}");
        let _ = writeln!(out, "Samples: {}", self.sample_count);

        if self.rules.is_empty() {
            out.push_str("Rules: none\n");
        } else {
            out.push_str("Rules:\n");
            for (i, rule) in self.rules.iter().enumerate() {
                let _ = writeln!(out, "  {}. {rule}", i + 1);
            }
        }

        if !self.recent_correlations.is_empty() {
            out.push_str("Recent correlations:\n");
            for record in &self.recent_correlations {
                let _ = writeln!(out, "  {}", correlation_line(record));
            }
        }

        if !self.pending_forecasts.is_empty() {
            out.push_str("Pending forecasts:\n");
            for forecast in &self.pending_forecasts {
                let _ = writeln!(out, "  {}", forecast.display_text());
            }
        }

        let _ = write!(out, "Triggers (total {}):", self.sample_count);
        for (suit, records) in &self.triggers_by_suit {
            let _ = write!(out, "\n{suit} triggers ({} entries)", records.len());
            for record in records.iter().take(LINES_PER_SUIT) {
                let _ = write!(out, "\n  {}", correlation_line(record));
            }
            if records.len() > LINES_PER_SUIT {
                let _ = write!(out, "\n  ... {} entries hidden", records.len() - LINES_PER_SUIT);
            }
        }
        out
    }
}

fn correlation_line(record: &CorrelationRecord) -> String {
    format!(
        "N{} ({}) -> N{} ({})",
        record.trigger_round, record.trigger_card, record.result_round, record.result_suit
    )
}
