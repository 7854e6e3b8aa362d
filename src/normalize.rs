//! Event normalizer: raw result text to structured rounds.
//!
//! Result messages look like `#N812. ✅3(K♠️10♦️) - 5(2❤️3♣️)`. The round
//! number comes from `#N<digits>.` or `🔵<digits>🔵`; the cards from the first
//! parenthesised group. Anything that does not parse is skipped rather than
//! reported: a malformed message is simply not an event.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::card::{Card, Rank, Suit};
use crate::engine::RoundEvent;

static ROUND_HASH: OnceLock<Option<Regex>> = OnceLock::new();
static ROUND_BLUE: OnceLock<Option<Regex>> = OnceLock::new();
static FIRST_GROUP: OnceLock<Option<Regex>> = OnceLock::new();
static CARD: OnceLock<Option<Regex>> = OnceLock::new();

fn compiled(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(err) => {
            tracing::error!(pattern, error = %err, "invalid normalizer pattern");
            None
        }
    })
    .as_ref()
}

/// Completion state carried by a result message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageState {
    /// Carries a pending marker (`🕐` or `⏰`); the round is still being dealt.
    Pending,
    /// Carries a completion marker (`✅` or `🔰`) and no pending marker.
    Finalized,
    /// Neither marker.
    Incomplete,
}

impl MessageState {
    /// Pending markers win over completion markers.
    #[must_use]
    pub fn classify(text: &str) -> Self {
        if text.contains('\u{1F550}') || text.contains('\u{23F0}') {
            Self::Pending
        } else if text.contains('\u{2705}') || text.contains('\u{1F530}') {
            Self::Finalized
        } else {
            Self::Incomplete
        }
    }
}

/// A result message reduced to what the engine needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMessage {
    /// Round number.
    pub round: u64,
    /// Cards of the first parenthesised group, in order.
    pub cards: Vec<Card>,
    /// Completion state.
    pub state: MessageState,
}

impl ParsedMessage {
    /// First card of the group, if any.
    #[must_use]
    pub fn leading_card(&self) -> Option<Card> {
        self.cards.first().copied()
    }

    /// Returns true if the result is final.
    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.state == MessageState::Finalized
    }

    /// Converts a finalized message into an engine event.
    ///
    /// Returns `None` for pending or incomplete messages.
    #[must_use]
    pub fn into_event(self) -> Option<RoundEvent> {
        if !self.is_finalized() {
            return None;
        }
        Some(RoundEvent::from_cards(self.round, self.cards))
    }
}

/// Extracts the round number.
#[must_use]
pub fn parse_round(text: &str) -> Option<u64> {
    let captures = compiled(&ROUND_HASH, r"(?i)#N(\d+)\.")
        .and_then(|re| re.captures(text))
        .or_else(|| compiled(&ROUND_BLUE, r"\x{1F535}(\d+)\x{1F535}").and_then(|re| re.captures(text)))?;
    captures.get(1)?.as_str().parse().ok()
}

/// Cards of the first parenthesised group.
///
/// Ranks outside the deck (`1`, `11`, ...) are skipped.
#[must_use]
pub fn parse_first_group(text: &str) -> Vec<Card> {
    let Some(group) = compiled(&FIRST_GROUP, r"\(([^)]*)\)")
        .and_then(|re| re.captures(text))
        .and_then(|c| c.get(1))
    else {
        return Vec::new();
    };
    parse_cards(group.as_str())
}

/// Every `rank + suit glyph` token in `content`.
#[must_use]
pub fn parse_cards(content: &str) -> Vec<Card> {
    let Some(re) = compiled(&CARD, r"(?i)(\d+|[AKQJ])([\x{2660}-\x{2667}\x{2764}])") else {
        return Vec::new();
    };
    re.captures_iter(content)
        .filter_map(|c| {
            let rank: Rank = c.get(1)?.as_str().parse().ok()?;
            let suit = Suit::from_char(c.get(2)?.as_str().chars().next()?)?;
            Some(Card::new(rank, suit))
        })
        .collect()
}

/// Parses a raw result message; `None` if it has no round number.
#[must_use]
pub fn parse_message(text: &str) -> Option<ParsedMessage> {
    let round = parse_round(text)?;
    Some(ParsedMessage {
        round,
        cards: parse_first_group(text),
        state: MessageState::classify(text),
    })
}
