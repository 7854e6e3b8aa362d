//! # suitcast - adaptive suit forecasting
//!
//! suitcast consumes a stream of finalized card-game rounds and forecasts the
//! suit of the round two rounds ahead. It learns which leading cards tend to
//! precede which suits, ranks the strongest pairings as rules, and checks
//! every forecast against the results that follow.
//!
//! ## Core Concepts
//!
//! - **Trigger**: the leading card of round `R`, used to predict round `R + 2`
//! - **Correlation**: an observed `(trigger, outcome suit)` pair
//! - **Rule**: a mined, ranked trigger-to-suit mapping with its support count
//! - **Mode**: `STATIC` answers from a fixed table, `ADAPTIVE` consults rules first
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use suitcast::{Engine, EngineConfig, NoopNotifier, SystemClock};
//! use suitcast::normalize::parse_message;
//!
//! let mut engine = Engine::new(EngineConfig::default(), Arc::new(SystemClock), Arc::new(NoopNotifier))?;
//! if let Some(event) = parse_message("#N812. ✅3(10♦️K♠️) - 5(2❤️3♣️)").and_then(|m| m.into_event()) {
//!     let outcome = engine.on_finalized_round(event);
//!     if let Some(forecast) = outcome.forecast {
//!         println!("{}", forecast.display_text());
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

// Domain types
pub mod card;
pub mod error;
pub mod time;

// Learning pipeline
pub mod correlation;
pub mod history;
pub mod rules;

// Decisions and verification
pub mod decision;
pub mod forecast;
pub mod mode;
pub mod state;
pub mod verification;

// Host-facing surface
pub mod config;
pub mod engine;
pub mod normalize;
pub mod notify;
pub mod status;
pub mod storage;

pub use card::{Card, Rank, Suit};
pub use config::EngineConfig;
pub use correlation::{CorrelationRecord, CorrelationStore, Observation};
pub use decision::{Decision, DecisionEngine, StaticTable};
pub use engine::{Engine, EngineSnapshot, RoundEvent, RoundOutcome};
pub use error::{SuitcastError, SuitcastResult, ValidationError};
pub use forecast::{Forecast, ForecastLedger, ForecastStatus, LedgerError, Provenance};
pub use history::{HistoryEntry, HistoryWindow};
pub use mode::ModeController;
pub use normalize::{parse_message, MessageState, ParsedMessage};
pub use notify::{ChannelNotifier, FnNotifier, NoopNotifier, RuleNotice, RuleNoticeKind, RuleNotifier};
pub use rules::{MiningPolicy, Rule, RuleMiner};
pub use state::{EngineMode, EngineState};
pub use status::StatusSnapshot;
pub use storage::{InMemoryStateStore, StateKey, StateStore, StorageError};
pub use time::{Clock, ManualClock, SystemClock};
pub use verification::{Resolution, Verifier};
