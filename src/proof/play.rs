//! Play Commitments
//!
//! What a player submits for one trick, and how the reveal opens it.
//!
//! | Mode | Commit hash | Reveal salt |
//! |---|---|---|
//! | plain | `keccak256(action_be4 ‖ salt)` | random salt |
//! | ring | `keccak256(card·G + r·H)` | `r` |
//! | aggregate | `keccak256((Σhand)·G + r_agg·H)` | `r_agg` |

use crate::core::card::{has_suit, is_valid_card, valid_set, CardId, PlayAction};
use crate::core::encoding::{point_to_bytes, scalar_from_be_canonical, scalar_from_u32};
use crate::core::hash::{keccak256, keccak256_concat, Hash32};
use crate::core::rng::random_blinding;
use crate::crypto::pedersen::commit;

use super::hand::{opens_aggregate, prove_exclusion, verify_exclusion};
use super::ring::{prove_membership, verify_membership};
use super::verify::VerifyError;
use super::{ProofContext, ProofError};

/// Proof that accompanies a play commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayProof {
    /// Hash commitment, no proof.
    Plain,
    /// Ring membership proof bytes and the valid set it was built over.
    Ring {
        /// Serialized proof.
        proof: Vec<u8>,
        /// Valid set used to build it.
        valid_set: Vec<CardId>,
    },
    /// Aggregate exclusion proof bytes.
    Aggregate {
        /// Serialized proof.
        proof: Vec<u8>,
    },
}

impl PlayProof {
    /// Is this a ZK play (Pedersen opening at reveal)?
    pub fn is_zk(&self) -> bool {
        !matches!(self, Self::Plain)
    }
}

/// Everything needed to commit a play now and reveal it later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedPlay {
    /// Card or cangkul.
    pub action: PlayAction,
    /// Reveal salt (blinding for ZK plays).
    pub salt: [u8; 32],
    /// Value submitted to the ledger.
    pub commit_hash: Hash32,
    /// Proof to submit alongside.
    pub proof: PlayProof,
}

/// `keccak256(action_be4 ‖ salt)`.
pub fn plain_commit_hash(action: PlayAction, salt: &[u8; 32]) -> Hash32 {
    keccak256_concat(&[&action.wire_value().to_be_bytes()[..], &salt[..]])
}

/// Reject an action the ledger would refuse at reveal.
///
/// A card must be in the hand and follow `trick_suit`; cangkul is only
/// allowed when no card of the hand follows it.
pub fn check_play(action: PlayAction, hand: &[CardId], trick_suit: u32) -> Result<(), ProofError> {
    match action {
        PlayAction::Card(card) if !is_valid_card(card) => Err(ProofError::InvalidCard(card)),
        PlayAction::Card(card) if !valid_set(hand, trick_suit).contains(&card) => {
            Err(ProofError::CardNotInSet(card))
        }
        PlayAction::Cangkul if has_suit(hand, trick_suit) => Err(ProofError::HandHasSuit(trick_suit)),
        _ => Ok(()),
    }
}

/// Plain hash commitment with a fresh salt.
pub fn prepare_plain(action: PlayAction) -> PreparedPlay {
    let salt = random_blinding();
    PreparedPlay {
        action,
        commit_hash: plain_commit_hash(action, &salt),
        salt,
        proof: PlayProof::Plain,
    }
}

/// Pedersen commitment to `card` with a ring proof over `valid_set`.
pub fn prepare_ring(
    card: CardId,
    valid_set: &[CardId],
    ctx: &ProofContext<'_>,
) -> Result<PreparedPlay, ProofError> {
    let salt = random_blinding();
    let ring = prove_membership(card, &salt, valid_set, ctx)?;
    Ok(PreparedPlay {
        action: PlayAction::Card(card),
        salt,
        commit_hash: ring.commit_hash(),
        proof: PlayProof::Ring { proof: ring.to_bytes(), valid_set: valid_set.to_vec() },
    })
}

/// Aggregate commitment over `hand` with an exclusion proof for `trick_suit`.
pub fn prepare_cangkul(
    hand: &[CardId],
    trick_suit: u32,
    ctx: &ProofContext<'_>,
) -> Result<PreparedPlay, ProofError> {
    let committed = prove_exclusion(hand, trick_suit, ctx)?;
    Ok(PreparedPlay {
        action: PlayAction::Cangkul,
        salt: committed.blinding,
        commit_hash: committed.proof.commit_hash(),
        proof: PlayProof::Aggregate { proof: committed.proof.to_bytes() },
    })
}

/// Check a prepared ZK play against a ledger view of the hand, the way the
/// ledger will. Plain plays carry no proof and always pass.
pub fn verify_prepared(
    play: &PreparedPlay,
    hand: &[CardId],
    trick_suit: u32,
    ctx: &ProofContext<'_>,
) -> Result<(), VerifyError> {
    match &play.proof {
        PlayProof::Plain => Ok(()),
        PlayProof::Ring { proof, .. } => {
            verify_membership(&play.commit_hash, &valid_set(hand, trick_suit), proof, ctx)
        }
        PlayProof::Aggregate { proof } => verify_exclusion(&play.commit_hash, trick_suit, hand, proof, ctx),
    }
}

/// Does the reveal `(action, salt)` open `commit_hash`?
///
/// `zk` selects the Pedersen opening; a ZK cangkul is opened against the
/// current `hand`.
pub fn opens_play(
    commit_hash: &Hash32,
    action: PlayAction,
    salt: &[u8; 32],
    zk: bool,
    hand: &[CardId],
) -> bool {
    if !zk {
        return plain_commit_hash(action, salt) == *commit_hash;
    }
    match action {
        PlayAction::Cangkul => opens_aggregate(commit_hash, hand, salt),
        PlayAction::Card(card) => match scalar_from_be_canonical(salt) {
            Ok(r) => keccak256(&point_to_bytes(&commit(&scalar_from_u32(card), &r))) == *commit_hash,
            Err(_) => false,
        },
    }
}
