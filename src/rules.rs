//! Rule mining over the correlation log.
//!
//! Mining is a pure function of the records: the rule set is rebuilt from
//! scratch on every pass, so it can never drift from the log.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::card::{Card, Suit};
use crate::correlation::CorrelationRecord;
use crate::error::ValidationError;

/// A mined mapping from trigger card to predicted suit.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub trigger: Card,
    pub predicted: Suit,
    /// Number of records supporting this mapping.
    pub count: u32,
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} (x{})", self.trigger, self.predicted, self.count)
    }
}

/// How ranked candidates are cut down to the active rule set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MiningPolicy {
    /// Keep the `k` strongest candidates overall.
    GlobalTopK {
        /// Number of rules kept.
        k: usize,
    },
    /// Keep the `per_suit` strongest candidates for each trigger-card suit.
    PerTriggerSuit {
        /// Number of rules kept per trigger suit.
        per_suit: usize,
    },
}

impl Default for MiningPolicy {
    fn default() -> Self {
        Self::GlobalTopK { k: 3 }
    }
}

impl MiningPolicy {
    pub(crate) fn validate(self) -> Result<Self, ValidationError> {
        match self {
            Self::GlobalTopK { k: 0 } => Err(ValidationError::config("mining_policy.k", "must be at least 1")),
            Self::PerTriggerSuit { per_suit: 0 } => Err(ValidationError::config(
                "mining_policy.per_suit",
                "must be at least 1",
            )),
            _ => Ok(self),
        }
    }

    fn select(self, ranked: Vec<Rule>) -> Vec<Rule> {
        match self {
            Self::GlobalTopK { k } => ranked.into_iter().take(k).collect(),
            Self::PerTriggerSuit { per_suit } => {
                let mut kept: HashMap<Suit, usize> = HashMap::new();
                ranked
                    .into_iter()
                    .filter(|rule| {
                        let slot = kept.entry(rule.trigger.suit).or_insert(0);
                        if *slot < per_suit {
                            *slot += 1;
                            true
                        } else {
                            false
                        }
                    })
                    .collect()
            }
        }
    }
}

/// Aggregates correlation records into ranked rules.
#[derive(Debug, Clone, Copy)]
pub struct RuleMiner {
    policy: MiningPolicy,
    min_samples: usize,
}

impl RuleMiner {
    /// Miner that needs at least `min_samples` records before producing rules.
    #[must_use]
    pub const fn new(policy: MiningPolicy, min_samples: usize) -> Self {
        Self {
            policy,
            min_samples,
        }
    }

    /// Mines the ranked rule set.
    ///
    /// Returns an empty set when fewer than `min_samples` records exist.
    /// Ties are broken by first appearance: the first-seen suit wins within a
    /// trigger, and equal-count triggers keep their first-seen order.
    #[must_use]
    pub fn mine(&self, records: &[CorrelationRecord]) -> Vec<Rule> {
        if records.len() < self.min_samples {
            return Vec::new();
        }

        let mut groups: Vec<(Card, Vec<(Suit, u32)>)> = Vec::new();
        let mut index: HashMap<Card, usize> = HashMap::new();
        for record in records {
            let slot = *index.entry(record.trigger_card).or_insert_with(|| {
                groups.push((record.trigger_card, Vec::new()));
                groups.len() - 1
            });
            let counts = &mut groups[slot].1;
            match counts.iter_mut().find(|(suit, _)| *suit == record.result_suit) {
                Some((_, count)) => *count += 1,
                None => counts.push((record.result_suit, 1)),
            }
        }

        let mut ranked: Vec<Rule> = groups
            .into_iter()
            .filter_map(|(trigger, counts)| {
                let mut best: Option<(Suit, u32)> = None;
                for (suit, count) in counts {
                    if best.map_or(true, |(_, c)| count > c) {
                        best = Some((suit, count));
                    }
                }
                best.map(|(predicted, count)| Rule {
                    trigger,
                    predicted,
                    count,
                })
            })
            .collect();

        // sort_by is stable
        ranked.sort_by(|a, b| b.count.cmp(&a.count));
        self.policy.select(ranked)
    }
}

/// Returns true if the two rule sets differ in trigger or prediction.
///
/// Support counts are ignored; a rule whose count grew is not a change.
#[must_use]
pub fn rules_changed(previous: &[Rule], current: &[Rule]) -> bool {
    previous.len() != current.len()
        || previous
            .iter()
            .zip(current)
            .any(|(old, new)| old.trigger != new.trigger || old.predicted != new.predicted)
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;

    use super::*;
    use crate::card::Rank;

    fn rec(trigger: Card, result_round: u64, suit: Suit) -> CorrelationRecord {
        CorrelationRecord {
            trigger_card: trigger,
            trigger_round: result_round - 2,
            result_round,
            result_suit: suit,
            recorded_at: DateTime::UNIX_EPOCH,
        }
    }

    fn log(entries: &[(Card, Suit)]) -> Vec<CorrelationRecord> {
        entries
            .iter()
            .enumerate()
            .map(|(i, (c, s))| rec(*c, i as u64 + 10, *s))
            .collect()
    }

    const TEN_D: Card = Card::new(Rank::Ten, Suit::Diamonds);
    const NINE_C: Card = Card::new(Rank::Nine, Suit::Clubs);
    const ACE_H: Card = Card::new(Rank::Ace, Suit::Hearts);
    const SEVEN_S: Card = Card::new(Rank::Seven, Suit::Spades);

    #[test]
    fn test_below_min_samples_mines_nothing() {
        let miner = RuleMiner::new(MiningPolicy::default(), 3);
        let records = log(&[(TEN_D, Suit::Spades), (TEN_D, Suit::Spades)]);
        assert!(miner.mine(&records).is_empty());
    }

    #[test]
    fn test_majority_suit_wins_per_trigger() {
        let miner = RuleMiner::new(MiningPolicy::default(), 3);
        let records = log(&[
            (TEN_D, Suit::Hearts),
            (TEN_D, Suit::Spades),
            (TEN_D, Suit::Spades),
        ]);
        let rules = miner.mine(&records);
        assert_eq!(rules, vec![Rule { trigger: TEN_D, predicted: Suit::Spades, count: 2 }]);
    }

    #[test]
    fn test_tie_goes_to_first_seen_suit() {
        let miner = RuleMiner::new(MiningPolicy::default(), 1);
        let records = log(&[
            (TEN_D, Suit::Clubs),
            (TEN_D, Suit::Hearts),
            (TEN_D, Suit::Hearts),
            (TEN_D, Suit::Clubs),
        ]);
        let rules = miner.mine(&records);
        assert_eq!(rules[0].predicted, Suit::Clubs);
        assert_eq!(rules[0].count, 2);
    }

    #[test]
    fn test_ranked_by_count_then_first_seen_and_truncated() {
        let miner = RuleMiner::new(MiningPolicy::GlobalTopK { k: 3 }, 1);
        let records = log(&[
            (NINE_C, Suit::Hearts),
            (ACE_H, Suit::Hearts),
            (TEN_D, Suit::Spades),
            (TEN_D, Suit::Spades),
            (SEVEN_S, Suit::Clubs),
            (SEVEN_S, Suit::Clubs),
            (SEVEN_S, Suit::Clubs),
        ]);
        let rules = miner.mine(&records);
        let triggers: Vec<Card> = rules.iter().map(|r| r.trigger).collect();
        assert_eq!(triggers, vec![SEVEN_S, TEN_D, NINE_C]);
        assert_eq!(rules[0].count, 3);
    }

    #[test]
    fn test_mining_is_deterministic() {
        let miner = RuleMiner::new(MiningPolicy::default(), 3);
        let records = log(&[
            (NINE_C, Suit::Hearts),
            (ACE_H, Suit::Diamonds),
            (TEN_D, Suit::Spades),
            (ACE_H, Suit::Diamonds),
            (NINE_C, Suit::Clubs),
        ]);
        let first = miner.mine(&records);
        for _ in 0..10 {
            assert_eq!(miner.mine(&records), first);
        }
    }

    #[test]
    fn test_per_trigger_suit_policy_caps_each_suit() {
        let miner = RuleMiner::new(MiningPolicy::PerTriggerSuit { per_suit: 2 }, 1);
        let five_h = Card::new(Rank::Five, Suit::Hearts);
        let king_h = Card::new(Rank::King, Suit::Hearts);
        let records = log(&[
            (ACE_H, Suit::Spades),
            (ACE_H, Suit::Spades),
            (ACE_H, Suit::Spades),
            (five_h, Suit::Clubs),
            (five_h, Suit::Clubs),
            (king_h, Suit::Hearts),
            (TEN_D, Suit::Clubs),
        ]);
        let rules = miner.mine(&records);
        let triggers: Vec<Card> = rules.iter().map(|r| r.trigger).collect();
        assert_eq!(triggers, vec![ACE_H, five_h, TEN_D]);
    }

    #[test]
    fn test_rules_changed_ignores_counts() {
        let a = vec![Rule { trigger: TEN_D, predicted: Suit::Spades, count: 2 }];
        let b = vec![Rule { trigger: TEN_D, predicted: Suit::Spades, count: 9 }];
        let c = vec![Rule { trigger: TEN_D, predicted: Suit::Hearts, count: 2 }];
        assert!(!rules_changed(&a, &b));
        assert!(rules_changed(&a, &c));
        assert!(rules_changed(&a, &[]));
        assert!(!rules_changed(&[], &[]));
    }

    #[test]
    fn test_policy_validation() {
        assert!(MiningPolicy::GlobalTopK { k: 0 }.validate().is_err());
        assert!(MiningPolicy::PerTriggerSuit { per_suit: 0 }.validate().is_err());
        assert!(MiningPolicy::default().validate().is_ok());
    }
}
