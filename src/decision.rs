//! Decision engine: whether to forecast this round, and what.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::card::{Card, Rank, Suit};
use crate::config::EngineConfig;
use crate::forecast::Provenance;
use crate::state::EngineState;
use crate::time::elapsed_at_least;

/// Fixed card-to-suit fallback table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaticTable(HashMap<Card, Suit>);

impl Default for StaticTable {
    fn default() -> Self {
        use Rank::{Ace, Eight, Five, Nine, Seven, Six, Ten};
        use Suit::{Clubs, Diamonds, Hearts, Spades};

        Self::from_pairs([
            (Card::new(Ten, Diamonds), Spades),
            (Card::new(Ten, Spades), Hearts),
            (Card::new(Nine, Clubs), Hearts),
            (Card::new(Nine, Diamonds), Spades),
            (Card::new(Eight, Clubs), Spades),
            (Card::new(Eight, Spades), Clubs),
            (Card::new(Seven, Spades), Spades),
            (Card::new(Seven, Clubs), Clubs),
            (Card::new(Six, Diamonds), Clubs),
            (Card::new(Six, Clubs), Diamonds),
            (Card::new(Ace, Hearts), Hearts),
            (Card::new(Five, Hearts), Hearts),
            (Card::new(Five, Spades), Spades),
        ])
    }
}

impl StaticTable {
    /// An empty table: static mode never forecasts.
    #[must_use]
    pub fn empty() -> Self {
        Self(HashMap::new())
    }

    /// Table holding exactly `pairs`; later duplicates win.
    #[must_use]
    pub fn from_pairs(pairs: impl IntoIterator<Item = (Card, Suit)>) -> Self {
        Self(pairs.into_iter().collect())
    }

    /// Exact-card lookup.
    #[must_use]
    pub fn lookup(&self, card: Card) -> Option<Suit> {
        self.0.get(&card).copied()
    }

    /// Number of mapped cards.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if no card is mapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// An accepted forecast decision, not yet recorded.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub source_round: u64,
    pub target_round: u64,
    pub predicted: Suit,
    pub provenance: Provenance,
}

/// Pure decision function over the engine state.
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    table: StaticTable,
    horizon: u64,
    spacing: u64,
    cooldown: Duration,
}

impl DecisionEngine {
    /// Decision engine for `config`.
    #[must_use]
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            table: config.static_table.clone(),
            horizon: config.forecast_horizon,
            spacing: config.round_spacing,
            cooldown: config.cooldown(),
        }
    }

    /// Decides whether `round` produces a forecast.
    ///
    /// Checks run in order: round spacing, presence of a leading card, value
    /// resolution (adaptive rule first when adaptive, then the static
    /// table), wall-clock cooldown. Any failed check yields `None`. The
    /// state is not modified.
    #[must_use]
    pub fn decide(
        &self,
        state: &EngineState,
        round: u64,
        leading: Option<Card>,
        now: DateTime<Utc>,
    ) -> Option<Decision> {
        if let Some(last) = state.last_forecast_round {
            match round.checked_sub(last) {
                Some(gap) if gap >= self.spacing => {}
                Some(gap) => {
                    debug!(round, last, gap, "too close to previous forecast");
                    return None;
                }
                None => {
                    warn!(round, last, "round precedes the last forecast round");
                    return None;
                }
            }
        }

        let card = leading?;
        let (predicted, provenance) = self.resolve(state, card)?;

        if !elapsed_at_least(state.last_forecast_time, now, self.cooldown) {
            debug!(round, "forecast cooldown active");
            return None;
        }

        Some(Decision {
            source_round: round,
            target_round: round.saturating_add(self.horizon),
            predicted,
            provenance,
        })
    }

    fn resolve(&self, state: &EngineState, card: Card) -> Option<(Suit, Provenance)> {
        if state.is_adaptive() {
            if let Some(rule) = state.active_rules.iter().find(|r| r.trigger == card) {
                return Some((rule.predicted, Provenance::Adaptive));
            }
        }
        self.table.lookup(card).map(|suit| (suit, Provenance::Static))
    }
}
