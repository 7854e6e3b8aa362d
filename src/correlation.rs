//! Correlation store: `(trigger at R-2, suit at R)` observations.
//!
//! Records are append-only and unique per result round. Insertion order is
//! kept because the rule miner breaks ties by first appearance.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::card::{Card, Suit};
use crate::history::HistoryWindow;

/// A learned `(trigger, outcome)` pair.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationRecord {
    pub trigger_card: Card,
    pub trigger_round: u64,
    pub result_round: u64,
    pub result_suit: Suit,
    pub recorded_at: DateTime<Utc>,
}

/// What [`CorrelationStore::observe`] did with a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// A new record was appended.
    Recorded,
    /// A record for this result round already exists.
    Duplicate,
    /// No leading card is known for the trigger round.
    NoTrigger,
}

/// Append-only correlation log keyed by result round.
#[derive(Debug, Clone)]
pub struct CorrelationStore {
    lookback: u64,
    records: Vec<CorrelationRecord>,
    result_rounds: BTreeSet<u64>,
}

impl CorrelationStore {
    /// Creates an empty store pairing each round with the round `lookback` earlier.
    #[must_use]
    pub fn new(lookback: u64) -> Self {
        Self {
            lookback,
            records: Vec::new(),
            result_rounds: BTreeSet::new(),
        }
    }

    /// Rebuilds a store from persisted records, dropping duplicates by result round.
    #[must_use]
    pub fn from_records(lookback: u64, records: impl IntoIterator<Item = CorrelationRecord>) -> Self {
        let mut store = Self::new(lookback);
        for record in records {
            store.insert(record);
        }
        store
    }

    /// Records `round` in `history`, then pairs it with the trigger `lookback` rounds back.
    ///
    /// Every round is recorded into the history, even when no correlation
    /// forms, since it is a potential future trigger.
    pub fn observe(
        &mut self,
        history: &mut HistoryWindow,
        round: u64,
        card: Card,
        suit: Suit,
        now: DateTime<Utc>,
    ) -> Observation {
        history.record(round, card, now);

        let Some(trigger_round) = round.checked_sub(self.lookback) else {
            return Observation::NoTrigger;
        };
        let Some(trigger) = history.lookup(trigger_round) else {
            return Observation::NoTrigger;
        };

        let record = CorrelationRecord {
            trigger_card: trigger.card,
            trigger_round,
            result_round: round,
            result_suit: suit,
            recorded_at: now,
        };
        if self.insert(record) {
            Observation::Recorded
        } else {
            Observation::Duplicate
        }
    }

    fn insert(&mut self, record: CorrelationRecord) -> bool {
        if !self.result_rounds.insert(record.result_round) {
            return false;
        }
        self.records.push(record);
        true
    }

    /// Returns true if a record exists for `result_round`.
    #[must_use]
    pub fn contains(&self, result_round: u64) -> bool {
        self.result_rounds.contains(&result_round)
    }

    /// All records in insertion order.
    #[must_use]
    pub fn records(&self) -> &[CorrelationRecord] {
        &self.records
    }

    /// The `n` most recent records, oldest first.
    #[must_use]
    pub fn recent(&self, n: usize) -> &[CorrelationRecord] {
        let start = self.records.len().saturating_sub(n);
        &self.records[start..]
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if nothing was learned yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
