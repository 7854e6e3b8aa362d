//! Card model for result streams.
//!
//! Result messages spell suits with several glyph variants (`♥`, `♥️`, `❤️`,
//! ...). Everything entering the engine is normalized into [`Suit`] and
//! [`Card`], so two visually distinct hearts always compare equal. Both types
//! serialize as their canonical glyph strings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

const VARIATION_SELECTOR: char = '\u{FE0F}';

/// Card suit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Suit {
    /// Hearts.
    Hearts,
    /// Spades.
    Spades,
    /// Clubs.
    Clubs,
    /// Diamonds.
    Diamonds,
}

impl Suit {
    /// All suits in display order.
    pub const ALL: [Suit; 4] = [Suit::Hearts, Suit::Spades, Suit::Clubs, Suit::Diamonds];

    /// Canonical glyph, including the emoji variation selector.
    #[must_use]
    pub const fn glyph(self) -> &'static str {
        match self {
            Suit::Hearts => "\u{2764}\u{FE0F}",
            Suit::Spades => "\u{2660}\u{FE0F}",
            Suit::Clubs => "\u{2663}\u{FE0F}",
            Suit::Diamonds => "\u{2666}\u{FE0F}",
        }
    }

    /// Maps a single suit character (any known glyph or ASCII letter).
    #[must_use]
    pub const fn from_char(c: char) -> Option<Self> {
        match c {
            '\u{2764}' | '\u{2665}' | '\u{2661}' | 'H' | 'h' => Some(Suit::Hearts),
            '\u{2660}' | '\u{2664}' | 'S' | 's' => Some(Suit::Spades),
            '\u{2663}' | '\u{2667}' | 'C' | 'c' => Some(Suit::Clubs),
            '\u{2666}' | '\u{2662}' | 'D' | 'd' => Some(Suit::Diamonds),
            _ => None,
        }
    }
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.glyph())
    }
}

impl FromStr for Suit {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.trim().chars().filter(|c| *c != VARIATION_SELECTOR);
        match (chars.next(), chars.next()) {
            (Some(c), None) => Suit::from_char(c).ok_or_else(|| ValidationError::InvalidSuit {
                input: s.to_string(),
            }),
            _ => Err(ValidationError::InvalidSuit {
                input: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for Suit {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Suit> for String {
    fn from(suit: Suit) -> Self {
        suit.glyph().to_string()
    }
}

/// Card rank.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Rank {
    Ace = 1,
    Two = 2,
    Three = 3,
    Four = 4,
    Five = 5,
    Six = 6,
    Seven = 7,
    Eight = 8,
    Nine = 9,
    Ten = 10,
    Jack = 11,
    Queen = 12,
    King = 13,
}

impl Rank {
    /// Rank for a numeric value, ace being 1.
    #[must_use]
    pub const fn from_value(value: u8) -> Option<Self> {
        match value {
            1 => Some(Rank::Ace),
            2 => Some(Rank::Two),
            3 => Some(Rank::Three),
            4 => Some(Rank::Four),
            5 => Some(Rank::Five),
            6 => Some(Rank::Six),
            7 => Some(Rank::Seven),
            8 => Some(Rank::Eight),
            9 => Some(Rank::Nine),
            10 => Some(Rank::Ten),
            11 => Some(Rank::Jack),
            12 => Some(Rank::Queen),
            13 => Some(Rank::King),
            _ => None,
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Rank::Ace => "A",
            Rank::Two => "2",
            Rank::Three => "3",
            Rank::Four => "4",
            Rank::Five => "5",
            Rank::Six => "6",
            Rank::Seven => "7",
            Rank::Eight => "8",
            Rank::Nine => "9",
            Rank::Ten => "10",
            Rank::Jack => "J",
            Rank::Queen => "Q",
            Rank::King => "K",
        };
        f.write_str(text)
    }
}

impl FromStr for Rank {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let rank = match trimmed.to_ascii_uppercase().as_str() {
            "A" => Some(Rank::Ace),
            "K" => Some(Rank::King),
            "Q" => Some(Rank::Queen),
            "J" => Some(Rank::Jack),
            digits => digits
                .parse::<u8>()
                .ok()
                .filter(|v| (2..=10).contains(v))
                .and_then(Rank::from_value),
        };
        rank.ok_or_else(|| ValidationError::InvalidCard {
            input: s.to_string(),
        })
    }
}

/// A playing card as it appears in a result message.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Card {
    pub rank: Rank,
    pub suit: Suit,
}

impl Card {
    /// Card of `rank` and `suit`.
    pub const fn new(rank: Rank, suit: Suit) -> Self {
        Self { rank, suit }
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.rank, self.suit)
    }
}

impl FromStr for Card {
    type Err = ValidationError;

    /// Parses `"10♦️"`, `"A❤"`, `"k♠"` or ASCII forms such as `"QS"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cleaned: String = s.trim().chars().filter(|c| *c != VARIATION_SELECTOR).collect();
        let invalid = || ValidationError::InvalidCard {
            input: s.to_string(),
        };

        let suit_char = cleaned.chars().last().ok_or_else(invalid)?;
        let suit = Suit::from_char(suit_char).ok_or_else(invalid)?;
        let rank_part = &cleaned[..cleaned.len() - suit_char.len_utf8()];
        let rank = rank_part.parse::<Rank>().map_err(|_| invalid())?;
        Ok(Self { rank, suit })
    }
}

impl TryFrom<String> for Card {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Card> for String {
    fn from(card: Card) -> Self {
        card.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heart_glyph_variants_compare_equal() {
        let variants = ["❤️", "❤", "♥", "♥️", "♡"];
        for v in variants {
            assert_eq!(v.parse::<Suit>().unwrap(), Suit::Hearts, "variant {v}");
        }
    }

    #[test]
    fn test_suit_display_uses_canonical_glyph() {
        assert_eq!(Suit::Spades.to_string(), "♠️");
        assert_eq!(Suit::Hearts.to_string(), "❤️");
    }

    #[test]
    fn test_suit_rejects_multiple_symbols() {
        assert!("♠♣".parse::<Suit>().is_err());
        assert!("".parse::<Suit>().is_err());
        assert!("x".parse::<Suit>().is_err());
    }

    #[test]
    fn test_card_parse_and_display() {
        let card: Card = "10♦".parse().unwrap();
        assert_eq!(card, Card::new(Rank::Ten, Suit::Diamonds));
        assert_eq!(card.to_string(), "10♦️");

        let ace: Card = "a♥️".parse().unwrap();
        assert_eq!(ace, Card::new(Rank::Ace, Suit::Hearts));
        assert_eq!(ace.to_string(), "A❤️");

        let ascii: Card = "QS".parse().unwrap();
        assert_eq!(ascii, Card::new(Rank::Queen, Suit::Spades));
    }

    #[test]
    fn test_card_parse_rejects_garbage() {
        assert!("1♠".parse::<Card>().is_err());
        assert!("11♠".parse::<Card>().is_err());
        assert!("♠".parse::<Card>().is_err());
        assert!("10".parse::<Card>().is_err());
    }

    #[test]
    fn test_card_serializes_as_glyph_string() {
        let card = Card::new(Rank::Five, Suit::Hearts);
        let json = serde_json::to_string(&card).unwrap();
        assert_eq!(json, "\"5❤️\"");
        let back: Card = serde_json::from_str("\"5♥\"").unwrap();
        assert_eq!(back, card);
    }
}
