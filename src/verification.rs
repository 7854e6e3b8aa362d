//! Verification engine: resolves pending forecasts against results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::card::Suit;
use crate::forecast::{ForecastLedger, ForecastStatus, Provenance};

/// A forecast that just reached a terminal status.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub target_round: u64,
    pub source_round: u64,
    /// Round whose result resolved the forecast.
    pub resolved_round: u64,
    pub predicted: Suit,
    pub status: ForecastStatus,
    pub provenance: Provenance,
    /// Handle of the original forecast message, if the host attached one.
    pub message_id: Option<i64>,
    /// Final display text for the forecast message.
    pub text: String,
}

impl Resolution {
    /// Returns true if the forecast was confirmed.
    #[must_use]
    pub const fn is_won(&self) -> bool {
        matches!(self.status, ForecastStatus::Won { .. })
    }
}

/// Checks pending forecasts inside a tolerance window.
///
/// A forecast for round `T` can be confirmed by the results of rounds
/// `T..=T + window`. Without a match by `T + window` it is lost; a result
/// arriving past the window (a gap in the stream) also loses it.
#[derive(Debug, Clone, Copy)]
pub struct Verifier {
    window: u64,
}

impl Verifier {
    /// Verifier confirming up to `window` rounds after the target.
    #[must_use]
    pub const fn new(window: u64) -> Self {
        Self { window }
    }

    /// Resolves every eligible pending forecast, in ascending target order.
    pub fn verify(
        &self,
        ledger: &mut ForecastLedger,
        round: u64,
        result_suits: &[Suit],
        now: DateTime<Utc>,
    ) -> Vec<Resolution> {
        let mut resolutions = Vec::new();

        for target in ledger.pending_targets() {
            let Some(offset) = round.checked_sub(target) else {
                // targets ascend; the rest are in the future too
                break;
            };
            let Some(forecast) = ledger.get(target) else {
                continue;
            };

            let status = if offset <= self.window && result_suits.contains(&forecast.predicted) {
                ForecastStatus::Won { offset }
            } else if offset >= self.window {
                ForecastStatus::Lost
            } else {
                continue;
            };

            if offset > self.window {
                warn!(target, round, offset, "result arrived past the window");
            }

            if let Some(resolved) = ledger.resolve(target, status, now) {
                info!(
                    target,
                    round,
                    predicted = %resolved.predicted,
                    provenance = %resolved.provenance,
                    status = ?resolved.status,
                    "forecast resolved"
                );
                resolutions.push(Resolution {
                    target_round: resolved.target_round,
                    source_round: resolved.source_round,
                    resolved_round: round,
                    predicted: resolved.predicted,
                    status: resolved.status,
                    provenance: resolved.provenance,
                    message_id: resolved.message_id,
                    text: resolved.display_text(),
                });
            }
        }

        resolutions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::Forecast;

    fn ledger_with(targets: &[(u64, Suit)]) -> ForecastLedger {
        ForecastLedger::from_forecasts(targets.iter().map(|(t, s)| {
            Forecast::pending(t - 2, *t, *s, Provenance::Static, DateTime::UNIX_EPOCH)
        }))
    }

    #[test]
    fn test_no_match_inside_window_stays_pending() {
        let mut ledger = ledger_with(&[(14, Suit::Spades)]);
        let v = Verifier::new(2);
        assert!(v.verify(&mut ledger, 14, &[Suit::Diamonds], DateTime::UNIX_EPOCH).is_empty());
        assert_eq!(ledger.pending_targets(), vec![14]);
    }

    #[test]
    fn test_match_at_offset_one_wins() {
        let mut ledger = ledger_with(&[(14, Suit::Spades)]);
        let v = Verifier::new(2);
        let t = DateTime::UNIX_EPOCH;
        v.verify(&mut ledger, 14, &[Suit::Diamonds], t);
        let out = v.verify(&mut ledger, 15, &[Suit::Spades], t);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].status, ForecastStatus::Won { offset: 1 });
        assert_eq!(out[0].text, "🔵14🔵:Suit ♠️ status :✅1️⃣");
        assert!(v.verify(&mut ledger, 16, &[Suit::Spades], t).is_empty());
    }

    #[test]
    fn test_match_on_last_window_round_still_wins() {
        let mut ledger = ledger_with(&[(14, Suit::Hearts)]);
        let out = Verifier::new(2).verify(&mut ledger, 16, &[Suit::Hearts], DateTime::UNIX_EPOCH);
        assert_eq!(out[0].status, ForecastStatus::Won { offset: 2 });
    }

    #[test]
    fn test_window_end_without_match_loses() {
        let mut ledger = ledger_with(&[(14, Suit::Hearts)]);
        let out = Verifier::new(2).verify(&mut ledger, 16, &[Suit::Clubs], DateTime::UNIX_EPOCH);
        assert_eq!(out[0].status, ForecastStatus::Lost);
        assert!(out[0].text.ends_with('❌'));
    }

    #[test]
    fn test_late_result_loses_even_on_match() {
        let mut ledger = ledger_with(&[(14, Suit::Hearts)]);
        let out = Verifier::new(2).verify(&mut ledger, 17, &[Suit::Hearts], DateTime::UNIX_EPOCH);
        assert_eq!(out[0].status, ForecastStatus::Lost);
    }

    #[test]
    fn test_future_targets_untouched() {
        let mut ledger = ledger_with(&[(20, Suit::Hearts)]);
        let out = Verifier::new(2).verify(&mut ledger, 19, &[Suit::Hearts], DateTime::UNIX_EPOCH);
        assert!(out.is_empty());
        assert_eq!(ledger.pending_targets(), vec![20]);
    }

    #[test]
    fn test_backlog_resolves_all_in_target_order() {
        let mut ledger = ledger_with(&[(10, Suit::Clubs), (13, Suit::Spades), (16, Suit::Clubs)]);
        let out = Verifier::new(2).verify(&mut ledger, 15, &[Suit::Spades], DateTime::UNIX_EPOCH);
        let targets: Vec<u64> = out.iter().map(|r| r.target_round).collect();
        assert_eq!(targets, vec![10, 13]);
        assert_eq!(out[0].status, ForecastStatus::Lost);
        assert_eq!(out[1].status, ForecastStatus::Won { offset: 2 });
        assert_eq!(ledger.pending_targets(), vec![16]);
    }
}
