//! History window: leading card per round, bounded by a retention horizon.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::card::Card;

/// Leading card observed in a round.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub round: u64,
    pub card: Card,
    pub observed_at: DateTime<Utc>,
}

/// Bounded map from round number to its leading card.
///
/// Eviction is driven by the highest round ever recorded, so a late, older
/// round cannot move the horizon backwards.
#[derive(Debug, Clone)]
pub struct HistoryWindow {
    retention: u64,
    entries: BTreeMap<u64, HistoryEntry>,
    latest_round: Option<u64>,
}

impl HistoryWindow {
    /// Creates an empty window keeping `retention` rounds behind the latest.
    #[must_use]
    pub fn new(retention: u64) -> Self {
        Self {
            retention,
            entries: BTreeMap::new(),
            latest_round: None,
        }
    }

    /// Rebuilds a window from persisted entries.
    #[must_use]
    pub fn from_entries(retention: u64, entries: impl IntoIterator<Item = HistoryEntry>) -> Self {
        let mut window = Self::new(retention);
        for entry in entries {
            window.latest_round = Some(window.latest_round.map_or(entry.round, |r| r.max(entry.round)));
            window.entries.insert(entry.round, entry);
        }
        window.evict();
        window
    }

    /// Stores the leading card of `round`, then evicts stale rounds.
    pub fn record(&mut self, round: u64, card: Card, observed_at: DateTime<Utc>) {
        self.entries.insert(
            round,
            HistoryEntry {
                round,
                card,
                observed_at,
            },
        );
        self.latest_round = Some(self.latest_round.map_or(round, |r| r.max(round)));
        self.evict();
    }

    /// Returns the entry recorded for `round`, if still retained.
    #[must_use]
    pub fn lookup(&self, round: u64) -> Option<&HistoryEntry> {
        self.entries.get(&round)
    }

    /// Highest round recorded so far.
    #[must_use]
    pub const fn latest_round(&self) -> Option<u64> {
        self.latest_round
    }

    /// Number of retained rounds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no round is retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in ascending round order.
    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.values()
    }

    fn evict(&mut self) {
        let Some(latest) = self.latest_round else {
            return;
        };
        let floor = latest.saturating_sub(self.retention);
        // split_off keeps keys >= floor
        self.entries = self.entries.split_off(&floor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::{Rank, Suit};

    fn card(rank: Rank, suit: Suit) -> Card {
        Card::new(rank, suit)
    }

    #[test]
    fn test_record_and_lookup() {
        let mut window = HistoryWindow::new(50);
        let t = DateTime::UNIX_EPOCH;
        window.record(10, card(Rank::Ten, Suit::Diamonds), t);
        assert_eq!(window.lookup(10).unwrap().card, card(Rank::Ten, Suit::Diamonds));
        assert!(window.lookup(11).is_none());
    }

    #[test]
    fn test_retention_drops_rounds_older_than_horizon() {
        let mut window = HistoryWindow::new(50);
        let t = DateTime::UNIX_EPOCH;
        for round in 1..=120 {
            window.record(round, card(Rank::Two, Suit::Clubs), t);
        }
        assert!(window.entries().all(|e| e.round >= 70));
        assert!(window.lookup(70).is_some());
        assert!(window.lookup(69).is_none());
        assert_eq!(window.len(), 51);
    }

    #[test]
    fn test_late_round_does_not_rewind_horizon() {
        let mut window = HistoryWindow::new(50);
        let t = DateTime::UNIX_EPOCH;
        window.record(200, card(Rank::Ace, Suit::Hearts), t);
        window.record(10, card(Rank::Ace, Suit::Spades), t);
        assert_eq!(window.latest_round(), Some(200));
        assert!(window.lookup(10).is_none());
        assert!(window.lookup(200).is_some());
    }

    #[test]
    fn test_rerecording_a_round_overwrites() {
        let mut window = HistoryWindow::new(50);
        let t = DateTime::UNIX_EPOCH;
        window.record(5, card(Rank::Five, Suit::Hearts), t);
        window.record(5, card(Rank::Five, Suit::Spades), t);
        assert_eq!(window.len(), 1);
        assert_eq!(window.lookup(5).unwrap().card.suit, Suit::Spades);
    }

    #[test]
    fn test_from_entries_applies_retention() {
        let t = DateTime::UNIX_EPOCH;
        let entries = vec![
            HistoryEntry { round: 1, card: card(Rank::Two, Suit::Clubs), observed_at: t },
            HistoryEntry { round: 100, card: card(Rank::Three, Suit::Clubs), observed_at: t },
        ];
        let window = HistoryWindow::from_entries(50, entries);
        assert_eq!(window.len(), 1);
        assert_eq!(window.latest_round(), Some(100));
    }
}
