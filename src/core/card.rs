//! Card Encoding
//!
//! 36-card deck: four suits with values 2-10.
//! `card_id = suit * 9 + (value - 2)`, so `suit = id / 9`, `value = id % 9 + 2`.

use serde::{Deserialize, Serialize};

/// Number of cards in the deck.
pub const DECK_SIZE: u32 = 36;

/// Cards per suit.
pub const CARDS_PER_SUIT: u32 = 9;

/// Number of suits.
pub const SUIT_COUNT: u32 = 4;

/// Action value meaning "cannot follow suit" (cangkul).
pub const CANNOT_FOLLOW_SENTINEL: u32 = 0xFFFF_FFFF;

/// Maximum ring size accepted by the verifier (one full suit).
pub const MAX_RING_SIZE: usize = CARDS_PER_SUIT as usize;

/// Maximum hand size accepted by the aggregate hand proof.
pub const MAX_HAND_SIZE: usize = 18;

/// Card identifier in `[0, 36)`.
pub type CardId = u32;

/// Suit of a card.
#[inline]
pub fn suit_of(card: CardId) -> u32 {
    card / CARDS_PER_SUIT
}

/// Face value of a card (2-10).
#[inline]
pub fn value_of(card: CardId) -> u32 {
    card % CARDS_PER_SUIT + 2
}

/// Is this a card id the ledger will accept?
#[inline]
pub fn is_valid_card(card: CardId) -> bool {
    card < DECK_SIZE
}

/// Cards of `hand` that follow `suit`, in hand order.
pub fn valid_set(hand: &[CardId], suit: u32) -> Vec<CardId> {
    hand.iter().copied().filter(|c| suit_of(*c) == suit).collect()
}

/// Does `hand` hold any card of `suit`?
pub fn has_suit(hand: &[CardId], suit: u32) -> bool {
    hand.iter().any(|c| suit_of(*c) == suit)
}

/// What a player commits to for one trick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayAction {
    /// Play this card.
    Card(CardId),
    /// Declare cannot follow suit.
    Cangkul,
}

impl PlayAction {
    /// Wire value: the card id or [`CANNOT_FOLLOW_SENTINEL`].
    pub fn wire_value(self) -> u32 {
        match self {
            Self::Card(card) => card,
            Self::Cangkul => CANNOT_FOLLOW_SENTINEL,
        }
    }

    /// Parse a wire value.
    pub fn from_wire(value: u32) -> Self {
        if value == CANNOT_FOLLOW_SENTINEL {
            Self::Cangkul
        } else {
            Self::Card(value)
        }
    }
}
