//! Verification Errors
//!
//! Every way a commitment or proof can be rejected. The ledger runs the same
//! checks; the client runs them before submitting so a bad proof never costs
//! a ledger round trip.

use thiserror::Error;

use crate::core::encoding::EncodingError;

use super::mode::ProofMode;

/// Why a proof or opening was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    /// The proof blob does not belong to the mode the seed was committed with.
    #[error("proof is not a {expected} proof ({len} bytes)")]
    ModeMismatch {
        /// Mode the commitment was made under.
        expected: ProofMode,
        /// Proof length seen.
        len: usize,
    },

    /// No proof kind has this length.
    #[error("unrecognised proof length {0}")]
    UnknownLength(usize),

    /// A field could not be decoded.
    #[error("malformed proof: {0}")]
    Malformed(#[from] EncodingError),

    /// The recomputed commitment does not match the published commit hash.
    #[error("commitment does not match commit hash")]
    BindingMismatch,

    /// The nullifier does not match the session.
    #[error("nullifier mismatch")]
    NullifierMismatch,

    /// Seed hash has fewer than four distinct byte values.
    #[error("seed hash has too little entropy")]
    WeakSeedHash,

    /// Schnorr relation `z·H == R + e·D` failed.
    #[error("schnorr relation does not hold")]
    RelationFailed,

    /// Ring challenges do not sum to the transcript challenge.
    #[error("ring challenge sum mismatch")]
    RingRelationFailed,

    /// The ring proof was built over a different valid set than the current one.
    #[error("ring proof built for {proof_size} candidates, current set has {set_size}")]
    StaleValidSet {
        /// Legs in the proof.
        proof_size: usize,
        /// Cards in the current valid set.
        set_size: usize,
    },

    /// Hand size in the proof differs from the hand being checked.
    #[error("hand proof covers {proof_count} cards, hand has {hand_len}")]
    HandSizeMismatch {
        /// Count encoded in the proof.
        proof_count: u32,
        /// Actual hand length.
        hand_len: usize,
    },

    /// A card in the exclusion set follows the trick suit or is out of range.
    #[error("card {card} violates suit exclusion")]
    SuitViolation {
        /// Offending card.
        card: u32,
    },

    /// Empty valid set or hand.
    #[error("empty candidate set")]
    EmptySet,

    /// Circuit verifier rejected the proof.
    #[error("circuit proof rejected")]
    CircuitRejected,
}
