//! Session View
//!
//! Local projection of one ledger session as seen by one player. Refreshed by
//! polling and never authoritative: the ledger decides, the view only guides
//! which action to attempt next.

use serde::{Deserialize, Serialize};

use crate::core::card::{self, CardId};

/// Which seat a player occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    /// First player.
    Player1,
    /// Second player.
    Player2,
}

impl Slot {
    /// The other seat.
    pub fn other(self) -> Self {
        match self {
            Self::Player1 => Self::Player2,
            Self::Player2 => Self::Player1,
        }
    }

    /// 0 for player 1, 1 for player 2.
    pub fn index(self) -> usize {
        match self {
            Self::Player1 => 0,
            Self::Player2 => 1,
        }
    }
}

/// Game lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    /// Both players commit seed hashes.
    SeedCommit,
    /// Both players reveal and prove their seeds.
    SeedReveal,
    /// Tricks are being played.
    Playing,
    /// Outcome decided.
    Finished,
}

impl Lifecycle {
    /// Ledger encoding (1..=4).
    pub fn code(self) -> u32 {
        match self {
            Self::SeedCommit => 1,
            Self::SeedReveal => 2,
            Self::Playing => 3,
            Self::Finished => 4,
        }
    }

    /// Decode the ledger value.
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(Self::SeedCommit),
            2 => Some(Self::SeedReveal),
            3 => Some(Self::Playing),
            4 => Some(Self::Finished),
            _ => None,
        }
    }
}

/// Trick sub-state while [`Lifecycle::Playing`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrickState {
    /// No trick in progress.
    None,
    /// Waiting for both play commits.
    CommitWaitBoth,
    /// Waiting for player 1's play commit.
    CommitWaitP1,
    /// Waiting for player 2's play commit.
    CommitWaitP2,
    /// Waiting for both reveals.
    RevealWaitBoth,
    /// Waiting for player 1's reveal.
    RevealWaitP1,
    /// Waiting for player 2's reveal.
    RevealWaitP2,
}

impl TrickState {
    /// Ledger encoding.
    pub fn code(self) -> u32 {
        match self {
            Self::None => 0,
            Self::CommitWaitBoth => 10,
            Self::CommitWaitP1 => 11,
            Self::CommitWaitP2 => 12,
            Self::RevealWaitBoth => 20,
            Self::RevealWaitP1 => 21,
            Self::RevealWaitP2 => 22,
        }
    }

    /// Decode the ledger value.
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::None),
            10 => Some(Self::CommitWaitBoth),
            11 => Some(Self::CommitWaitP1),
            12 => Some(Self::CommitWaitP2),
            20 => Some(Self::RevealWaitBoth),
            21 => Some(Self::RevealWaitP1),
            22 => Some(Self::RevealWaitP2),
            _ => None,
        }
    }

    /// Is `slot` expected to commit a play?
    pub fn awaits_commit(self, slot: Slot) -> bool {
        matches!(
            (self, slot),
            (Self::CommitWaitBoth, _) | (Self::CommitWaitP1, Slot::Player1) | (Self::CommitWaitP2, Slot::Player2)
        )
    }

    /// Is `slot` expected to reveal a play?
    pub fn awaits_reveal(self, slot: Slot) -> bool {
        matches!(
            (self, slot),
            (Self::RevealWaitBoth, _) | (Self::RevealWaitP1, Slot::Player1) | (Self::RevealWaitP2, Slot::Player2)
        )
    }
}

/// Final result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Game still running.
    Undecided,
    /// Player 1 won.
    Player1Won,
    /// Player 2 won.
    Player2Won,
    /// Nobody won.
    Draw,
}

impl Outcome {
    /// Winning seat, if any.
    pub fn winner(self) -> Option<Slot> {
        match self {
            Self::Player1Won => Some(Slot::Player1),
            Self::Player2Won => Some(Slot::Player2),
            Self::Undecided | Self::Draw => None,
        }
    }

    /// Outcome in which `slot` wins.
    pub fn won_by(slot: Slot) -> Self {
        match slot {
            Slot::Player1 => Self::Player1Won,
            Slot::Player2 => Self::Player2Won,
        }
    }
}

/// One player's projection of a ledger session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    /// Ledger session id.
    pub session_id: u32,
    /// Viewer's seat.
    pub my_slot: Slot,
    /// Lifecycle phase.
    pub lifecycle: Lifecycle,
    /// Trick sub-state.
    pub trick_state: TrickState,
    /// Seed commit present, indexed by seat.
    pub seed_committed: [bool; 2],
    /// Seed revealed, indexed by seat.
    pub seed_revealed: [bool; 2],
    /// Play commit present for the current trick, indexed by seat.
    pub play_committed: [bool; 2],
    /// Viewer's hand; empty before the deal.
    pub my_hand: Vec<CardId>,
    /// Opponent's hand size.
    pub opponent_hand_size: usize,
    /// Cards left in the draw pile.
    pub draw_pile_size: usize,
    /// Card flipped to open the current trick.
    pub flipped_card: Option<CardId>,
    /// Suit every player must follow this trick.
    pub trick_suit: Option<u32>,
    /// Tricks won, indexed by seat.
    pub tricks_won: [u32; 2],
    /// Current action nonce.
    pub action_nonce: u32,
    /// Nonce at which a timeout may be resolved.
    pub deadline_nonce: Option<u32>,
    /// Ledger sequence at which a timeout may be resolved.
    pub deadline_ledger: Option<u32>,
    /// Ledger sequence when the view was taken.
    pub current_ledger: u32,
    /// Final result.
    pub outcome: Outcome,
}

impl SessionView {
    /// Opponent's seat.
    pub fn opponent_slot(&self) -> Slot {
        self.my_slot.other()
    }

    /// Has the game ended?
    pub fn is_finished(&self) -> bool {
        self.lifecycle == Lifecycle::Finished
    }

    /// Cards of my hand that follow the trick suit.
    pub fn valid_set(&self) -> Vec<CardId> {
        self.trick_suit
            .map(|suit| card::valid_set(&self.my_hand, suit))
            .unwrap_or_default()
    }

    /// Should I commit my seed now?
    pub fn awaiting_my_seed_commit(&self) -> bool {
        self.lifecycle == Lifecycle::SeedCommit && !self.seed_committed[self.my_slot.index()]
    }

    /// Should I reveal my seed now?
    pub fn awaiting_my_seed_reveal(&self) -> bool {
        self.lifecycle == Lifecycle::SeedReveal && !self.seed_revealed[self.my_slot.index()]
    }

    /// Should I commit a play now?
    pub fn awaiting_my_play_commit(&self) -> bool {
        self.lifecycle == Lifecycle::Playing && self.trick_state.awaits_commit(self.my_slot)
    }

    /// Should I reveal my play now?
    pub fn awaiting_my_play_reveal(&self) -> bool {
        self.lifecycle == Lifecycle::Playing && self.trick_state.awaits_reveal(self.my_slot)
    }

    /// Is the opponent the one holding the game up?
    pub fn waiting_on_opponent(&self) -> bool {
        let me = self.my_slot.index();
        let them = self.opponent_slot().index();
        match self.lifecycle {
            Lifecycle::SeedCommit => self.seed_committed[me] && !self.seed_committed[them],
            Lifecycle::SeedReveal => self.seed_revealed[me] && !self.seed_revealed[them],
            Lifecycle::Playing => {
                let opp = self.opponent_slot();
                (self.trick_state.awaits_commit(opp) && !self.trick_state.awaits_commit(self.my_slot))
                    || (self.trick_state.awaits_reveal(opp) && !self.trick_state.awaits_reveal(self.my_slot))
            }
            Lifecycle::Finished => false,
        }
    }

    /// Would `resolve_timeout` be accepted, as far as this view can tell?
    pub fn timeout_ready(&self) -> bool {
        if self.is_finished() {
            return false;
        }
        let by_nonce = self.deadline_nonce.is_some_and(|d| self.action_nonce >= d);
        let by_ledger = self.deadline_ledger.is_some_and(|l| self.current_ledger >= l);
        by_nonce || by_ledger
    }
}
