//! Proof Engines
//!
//! Builds and checks the byte blobs the ledger verifier consumes.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    PROOF ENGINES                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  mode.rs   - Proof modes and length discrimination          │
//! │  seed.rs   - Seed commit/reveal (nizk, pedersen, noir)      │
//! │  ring.rs   - 1-of-N ring proof of suit compliance           │
//! │  hand.rs   - Aggregate exclusion ("cangkul") proof          │
//! │  play.rs   - Play commitments and reveal openings           │
//! │  verify.rs - Verification errors                            │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod hand;
pub mod mode;
pub mod play;
pub mod ring;
pub mod seed;
pub mod verify;

use thiserror::Error;

use crate::core::card::CardId;
use crate::core::encoding::EncodingError;

// Re-export key types
pub use mode::{classify_play_proof, classify_seed_proof, PlayProofKind, ProofMode, SeedProofKind};
pub use play::{PlayProof, PreparedPlay};
pub use seed::{SeedCommitment, SeedReveal};
pub use verify::VerifyError;

/// Session binding folded into every Fiat-Shamir transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProofContext<'a> {
    /// Ledger session id.
    pub session_id: u32,
    /// Prover's ledger address.
    pub party: &'a str,
}

impl<'a> ProofContext<'a> {
    /// Create a context.
    pub fn new(session_id: u32, party: &'a str) -> Self {
        Self { session_id, party }
    }

    /// `session_be4 ‖ party`, the tail of every public-input block.
    pub fn tail_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + self.party.len());
        out.extend_from_slice(&self.session_id.to_be_bytes());
        out.extend_from_slice(self.party.as_bytes());
        out
    }
}

/// Precondition violations raised before anything is submitted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProofError {
    /// Ring proof over an empty valid set.
    #[error("valid set is empty")]
    EmptySet,

    /// The chosen card is not in the valid set.
    #[error("card {0} is not in the valid set")]
    CardNotInSet(CardId),

    /// Ring larger than one suit.
    #[error("valid set of {0} cards exceeds the ring limit")]
    SetTooLarge(usize),

    /// Exclusion proof over an empty hand.
    #[error("hand is empty")]
    EmptyHand,

    /// Exclusion proof over more cards than the verifier accepts.
    #[error("hand of {0} cards exceeds the aggregate limit")]
    HandTooLarge(usize),

    /// Cannot claim cangkul while holding the trick suit.
    #[error("hand holds a card of suit {0}")]
    HandHasSuit(u32),

    /// Card id outside the deck.
    #[error("invalid card id {0}")]
    InvalidCard(CardId),

    /// Seed fails the leading-bytes entropy predicate.
    #[error("seed has insufficient entropy")]
    WeakSeed,

    /// `blake2s(seed)` differs from the claimed seed hash.
    #[error("seed does not hash to the claimed seed hash")]
    SeedHashMismatch,

    /// This mode is proven through the circuit bridge.
    #[error("{0} proofs are produced by the circuit bridge")]
    CircuitRequired(ProofMode),

    /// Malformed input bytes.
    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),
}
