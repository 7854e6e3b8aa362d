//! The forecasting engine.
//!
//! [`Engine`] owns every piece of state and runs each finalized round to
//! completion before returning: periodic rule check, history and
//! correlation update, verification of earlier forecasts, then the decision
//! for this round. Delivery and persistence are the caller's business and
//! never roll back what the engine computed.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::card::{Card, Suit};
use crate::config::EngineConfig;
use crate::correlation::{CorrelationRecord, CorrelationStore, Observation};
use crate::decision::DecisionEngine;
use crate::error::SuitcastResult;
use crate::forecast::{Forecast, ForecastLedger, ForecastStatus, LedgerError};
use crate::history::{HistoryEntry, HistoryWindow};
use crate::mode::ModeController;
use crate::notify::{NoopNotifier, RuleNotice, RuleNotifier};
use crate::rules::Rule;
use crate::state::{EngineMode, EngineState};
use crate::status::StatusSnapshot;
use crate::storage::{load_as, save_as, StateKey, StateStore};
use crate::time::{Clock, SystemClock};
use crate::verification::{Resolution, Verifier};

/// A finalized round as delivered by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundEvent {
    /// Round number.
    pub round: u64,
    /// Leading card of the round, if the result had one.
    pub leading_card: Option<Card>,
    /// Outcome suit recorded for correlations; defaults to the leading card's suit.
    pub suit: Option<Suit>,
    /// Every card of the result, used to confirm forecasts.
    pub result_cards: Vec<Card>,
}

impl RoundEvent {
    /// Builds an event from the cards of a result, leading card first.
    #[must_use]
    pub fn from_cards(round: u64, cards: Vec<Card>) -> Self {
        let leading_card = cards.first().copied();
        Self {
            round,
            leading_card,
            suit: leading_card.map(|c| c.suit),
            result_cards: cards,
        }
    }

    fn outcome_suit(&self) -> Option<Suit> {
        self.suit.or_else(|| self.leading_card.map(|c| c.suit))
    }

    fn result_suits(&self) -> Vec<Suit> {
        let mut suits: Vec<Suit> = self.result_cards.iter().map(|c| c.suit).collect();
        suits.extend(self.outcome_suit());
        suits.sort_unstable();
        suits.dedup();
        suits
    }
}

/// What one finalized round produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundOutcome {
    /// Forecasts resolved by this round, in target order.
    pub resolutions: Vec<Resolution>,
    /// Forecast opened by this round, if any.
    pub forecast: Option<Forecast>,
}

/// Everything needed to rebuild an engine.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSnapshot {
    pub history: Vec<HistoryEntry>,
    pub correlations: Vec<CorrelationRecord>,
    pub forecasts: Vec<Forecast>,
    pub state: EngineState,
}

/// Suit forecasting engine.
pub struct Engine {
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    history: HistoryWindow,
    correlations: CorrelationStore,
    ledger: ForecastLedger,
    state: EngineState,
    mode: ModeController,
    decision: DecisionEngine,
    verifier: Verifier,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("history", &self.history.len())
            .field("correlations", &self.correlations.len())
            .field("forecasts", &self.ledger.len())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Creates an empty engine.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `config` is inconsistent.
    pub fn new(config: EngineConfig, clock: Arc<dyn Clock>, notifier: Arc<dyn RuleNotifier>) -> SuitcastResult<Self> {
        Self::restore(config, EngineSnapshot::default(), clock, notifier)
    }

    /// Empty engine on the system clock that discards rule notices.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `config` is inconsistent.
    pub fn with_defaults(config: EngineConfig) -> SuitcastResult<Self> {
        Self::new(config, Arc::new(SystemClock), Arc::new(NoopNotifier))
    }

    /// Rebuilds an engine from a snapshot.
    ///
    /// Stored records pass through the same dedup and retention rules as
    /// live ones. If the snapshot has correlations but no rules, candidate
    /// rules are mined without changing the mode.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `config` is inconsistent.
    pub fn restore(
        config: EngineConfig,
        snapshot: EngineSnapshot,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn RuleNotifier>,
    ) -> SuitcastResult<Self> {
        let config = config.validate()?;
        let mode = ModeController::new(&config, notifier);
        let correlations = CorrelationStore::from_records(config.forecast_horizon, snapshot.correlations);
        let mut state = snapshot.state;
        mode.prime(&mut state, correlations.records());

        let engine = Self {
            history: HistoryWindow::from_entries(config.retention_rounds, snapshot.history),
            correlations,
            ledger: ForecastLedger::from_forecasts(snapshot.forecasts),
            state,
            decision: DecisionEngine::new(&config),
            verifier: Verifier::new(config.verification_window),
            mode,
            clock,
            config,
        };
        debug!(
            history = engine.history.len(),
            correlations = engine.correlations.len(),
            forecasts = engine.ledger.len(),
            mode = %engine.state.mode,
            "engine restored"
        );
        Ok(engine)
    }

    /// Processes a finalized round.
    pub fn on_finalized_round(&mut self, event: RoundEvent) -> RoundOutcome {
        let now = self.clock.now();
        let round = event.round;

        self.mode
            .periodic_check(&mut self.state, self.correlations.records(), now);

        match (event.leading_card, event.outcome_suit()) {
            (Some(card), Some(suit)) => {
                let observation = self
                    .correlations
                    .observe(&mut self.history, round, card, suit, now);
                if observation == Observation::Duplicate {
                    debug!(round, "correlation already recorded");
                }
            }
            _ => debug!(round, "round without a leading card"),
        }

        let suits = event.result_suits();
        if suits.is_empty() {
            debug!(round, "round without result cards, nothing to verify");
            return RoundOutcome::default();
        }

        let resolutions = self.verify(round, &suits, now);
        let forecast = self.decide(round, event.leading_card, now);

        if let Some(latest) = self.history.latest_round() {
            self.ledger
                .prune_resolved_before(latest.saturating_sub(self.config.retention_rounds));
        }

        RoundOutcome {
            resolutions,
            forecast,
        }
    }

    /// Re-runs verification for a result that was edited after delivery.
    ///
    /// History and correlations are left alone; only pending forecasts can
    /// change. An empty result resolves nothing.
    pub fn on_revised_result(&mut self, round: u64, result_cards: &[Card]) -> Vec<Resolution> {
        let suits = RoundEvent::from_cards(round, result_cards.to_vec()).result_suits();
        if suits.is_empty() {
            return Vec::new();
        }
        let now = self.clock.now();
        self.verify(round, &suits, now)
    }

    fn verify(&mut self, round: u64, suits: &[Suit], now: chrono::DateTime<chrono::Utc>) -> Vec<Resolution> {
        let resolutions = self.verifier.verify(&mut self.ledger, round, suits, now);
        for resolution in &resolutions {
            match resolution.status {
                ForecastStatus::Won { .. } => self.mode.on_forecast_success(&mut self.state),
                ForecastStatus::Lost => self.mode.on_forecast_failure(
                    &mut self.state,
                    self.correlations.records(),
                    resolution.provenance,
                    now,
                ),
                ForecastStatus::Pending => {}
            }
        }
        resolutions
    }

    fn decide(&mut self, round: u64, leading: Option<Card>, now: chrono::DateTime<chrono::Utc>) -> Option<Forecast> {
        let decision = self.decision.decide(&self.state, round, leading, now)?;
        let forecast = Forecast::pending(
            decision.source_round,
            decision.target_round,
            decision.predicted,
            decision.provenance,
            now,
        );

        match self.ledger.open(forecast) {
            Ok(opened) => {
                self.state.last_forecast_round = Some(round);
                self.state.last_forecast_time = Some(now);
                info!(
                    source = opened.source_round,
                    target = opened.target_round,
                    predicted = %opened.predicted,
                    provenance = %opened.provenance,
                    "forecast opened"
                );
                Some(opened.clone())
            }
            Err(LedgerError::DuplicateTarget(target)) => {
                debug!(round, target, "forecast already exists for target");
                None
            }
        }
    }

    /// Mines rules and switches to adaptive mode regardless of the result.
    ///
    /// `admin_id` becomes the recipient of later rule notices.
    pub fn force_activate(&mut self, admin_id: Option<i64>) -> RuleNotice {
        let now = self.clock.now();
        self.mode.request_activate(
            &mut self.state,
            self.correlations.records(),
            true,
            admin_id,
            now,
        )
    }

    /// Switches back to the static table.
    pub fn force_deactivate(&mut self) {
        self.mode.force_deactivate(&mut self.state);
    }

    /// Read-only view for a status display.
    #[must_use]
    pub fn status_snapshot(&self) -> StatusSnapshot {
        StatusSnapshot::capture(&self.state, &self.correlations, &self.ledger)
    }

    /// Records the host's message id for the forecast of `target_round`.
    pub fn attach_message_id(&mut self, target_round: u64, message_id: i64) -> bool {
        self.ledger.attach_message_id(target_round, message_id)
    }

    /// Current mode.
    #[must_use]
    pub const fn mode(&self) -> EngineMode {
        self.state.mode
    }

    /// Mode, counters and timestamps.
    #[must_use]
    pub const fn state(&self) -> &EngineState {
        &self.state
    }

    /// Rules currently used in adaptive mode.
    #[must_use]
    pub fn active_rules(&self) -> &[Rule] {
        &self.state.active_rules
    }

    /// Validated configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Recent leading cards.
    #[must_use]
    pub const fn history(&self) -> &HistoryWindow {
        &self.history
    }

    /// Learned correlation records.
    #[must_use]
    pub const fn correlations(&self) -> &CorrelationStore {
        &self.correlations
    }

    /// Open and recently resolved forecasts.
    #[must_use]
    pub const fn ledger(&self) -> &ForecastLedger {
        &self.ledger
    }

    /// Copies the persistent state out of the engine.
    #[must_use]
    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            history: self.history.entries().cloned().collect(),
            correlations: self.correlations.records().to_vec(),
            forecasts: self.ledger.iter().cloned().collect(),
            state: self.state.clone(),
        }
    }

    /// Writes every record to `store`, one key each.
    ///
    /// # Errors
    ///
    /// Returns the first storage error; records written before it stay written.
    pub fn save(&self, store: &dyn StateStore) -> SuitcastResult<()> {
        let snapshot = self.snapshot();
        save_as(store, StateKey::History, &snapshot.history)?;
        save_as(store, StateKey::Correlations, &snapshot.correlations)?;
        save_as(store, StateKey::Forecasts, &snapshot.forecasts)?;
        save_as(store, StateKey::EngineState, &snapshot.state)?;
        save_as(store, StateKey::Rules, &snapshot.state.active_rules)?;
        Ok(())
    }

    /// Rebuilds an engine from `store`. Missing keys start empty.
    ///
    /// A separately stored rule list takes precedence over the rules inside
    /// the engine-state record.
    ///
    /// # Errors
    ///
    /// Returns storage errors for unreadable or malformed records, and
    /// validation errors for a bad `config`.
    pub fn load(
        config: EngineConfig,
        store: &dyn StateStore,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn RuleNotifier>,
    ) -> SuitcastResult<Self> {
        let mut state: EngineState = load_as(store, StateKey::EngineState)?.unwrap_or_default();
        if let Some(rules) = load_as::<Vec<Rule>>(store, StateKey::Rules)? {
            state.active_rules = rules;
        }
        let snapshot = EngineSnapshot {
            history: load_as(store, StateKey::History)?.unwrap_or_default(),
            correlations: load_as(store, StateKey::Correlations)?.unwrap_or_default(),
            forecasts: load_as(store, StateKey::Forecasts)?.unwrap_or_default(),
            state,
        };
        Self::restore(config, snapshot, clock, notifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::Rank;
    use crate::forecast::Provenance;
    use crate::storage::InMemoryStateStore;
    use crate::time::ManualClock;

    fn engine_with_clock() -> (Engine, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::at_epoch());
        let engine = Engine::new(EngineConfig::default(), clock.clone(), Arc::new(NoopNotifier)).unwrap();
        (engine, clock)
    }

    fn card(rank: Rank, suit: Suit) -> Card {
        Card::new(rank, suit)
    }

    #[test]
    fn test_event_from_cards() {
        let event = RoundEvent::from_cards(9, vec![card(Rank::Ace, Suit::Hearts), card(Rank::Two, Suit::Clubs)]);
        assert_eq!(event.leading_card, Some(card(Rank::Ace, Suit::Hearts)));
        assert_eq!(event.suit, Some(Suit::Hearts));
        assert_eq!(event.result_suits(), vec![Suit::Hearts, Suit::Clubs]);

        let empty = RoundEvent::from_cards(9, Vec::new());
        assert!(empty.leading_card.is_none());
        assert!(empty.result_suits().is_empty());
    }

    #[test]
    fn test_round_without_cards_is_harmless() {
        let (mut engine, _) = engine_with_clock();
        let outcome = engine.on_finalized_round(RoundEvent::from_cards(5, Vec::new()));
        assert_eq!(outcome, RoundOutcome::default());
        assert!(engine.history().is_empty());
    }

    #[test]
    fn test_static_forecast_updates_state() {
        let (mut engine, _) = engine_with_clock();
        let outcome = engine.on_finalized_round(RoundEvent::from_cards(12, vec![card(Rank::Ten, Suit::Diamonds)]));
        let forecast = outcome.forecast.unwrap();
        assert_eq!(forecast.target_round, 14);
        assert_eq!(forecast.provenance, Provenance::Static);
        assert_eq!(engine.state().last_forecast_round, Some(12));
        assert!(engine.state().last_forecast_time.is_some());
    }

    #[test]
    fn test_revised_result_only_verifies() {
        let (mut engine, clock) = engine_with_clock();
        engine.on_finalized_round(RoundEvent::from_cards(12, vec![card(Rank::Ten, Suit::Diamonds)]));
        clock.advance_secs(60);
        engine.on_finalized_round(RoundEvent::from_cards(14, vec![card(Rank::Three, Suit::Diamonds)]));
        let history_len = engine.history().len();

        let resolutions = engine.on_revised_result(14, &[card(Rank::Three, Suit::Diamonds), card(Rank::King, Suit::Spades)]);
        assert_eq!(resolutions.len(), 1);
        assert_eq!(resolutions[0].status, ForecastStatus::Won { offset: 0 });
        assert_eq!(engine.history().len(), history_len);
    }

    #[test]
    fn test_revised_result_uses_round_suits() {
        let (mut engine, clock) = engine_with_clock();
        engine.on_finalized_round(RoundEvent::from_cards(12, vec![card(Rank::Ten, Suit::Diamonds)]));
        clock.advance_secs(60);
        engine.on_finalized_round(RoundEvent::from_cards(14, vec![card(Rank::Three, Suit::Diamonds)]));

        assert!(engine.on_revised_result(14, &[]).is_empty());
        assert!(engine.ledger().get(14).unwrap().status.is_pending());
        assert_eq!(engine.state().consecutive_static_failures, 0);

        let cards = [
            card(Rank::Four, Suit::Diamonds),
            card(Rank::Five, Suit::Clubs),
            card(Rank::Six, Suit::Diamonds),
        ];
        assert_eq!(
            RoundEvent::from_cards(14, cards.to_vec()).result_suits(),
            vec![Suit::Clubs, Suit::Diamonds]
        );
        assert!(engine.on_revised_result(14, &cards).is_empty());
        assert!(engine.ledger().get(14).unwrap().status.is_pending());
    }

    #[test]
    fn test_attach_message_id_flows_into_resolution() {
        let (mut engine, clock) = engine_with_clock();
        engine.on_finalized_round(RoundEvent::from_cards(12, vec![card(Rank::Ten, Suit::Diamonds)]));
        assert!(engine.attach_message_id(14, 777));
        clock.advance_secs(60);
        let outcome = engine.on_finalized_round(RoundEvent::from_cards(14, vec![card(Rank::Two, Suit::Spades)]));
        assert_eq!(outcome.resolutions[0].message_id, Some(777));
    }

    #[test]
    fn test_save_load_round_trip() {
        let (mut engine, clock) = engine_with_clock();
        for round in 10..=20 {
            clock.advance_secs(40);
            engine.on_finalized_round(RoundEvent::from_cards(round, vec![card(Rank::Ten, Suit::Diamonds)]));
        }
        engine.force_activate(Some(5));

        let store = InMemoryStateStore::new();
        engine.save(&store).unwrap();
        let loaded = Engine::load(EngineConfig::default(), &store, clock, Arc::new(NoopNotifier)).unwrap();
        assert_eq!(loaded.snapshot(), engine.snapshot());
        assert_eq!(loaded.mode(), EngineMode::Adaptive);
        assert_eq!(loaded.state().admin_id, Some(5));
    }

    #[test]
    fn test_restore_primes_rules_without_activating() {
        let (mut engine, clock) = engine_with_clock();
        for round in 1..=8 {
            engine.on_finalized_round(RoundEvent::from_cards(round, vec![card(Rank::Seven, Suit::Clubs)]));
        }
        let mut snapshot = engine.snapshot();
        snapshot.state.active_rules.clear();

        let restored = Engine::restore(EngineConfig::default(), snapshot, clock, Arc::new(NoopNotifier)).unwrap();
        assert_eq!(restored.mode(), EngineMode::Static);
        assert_eq!(restored.active_rules().len(), 1);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = EngineConfig {
            round_spacing: 0,
            ..EngineConfig::default()
        };
        let err = Engine::with_defaults(config).unwrap_err();
        assert!(err.is_validation());
    }
}
