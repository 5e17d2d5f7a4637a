//! Aggregate Exclusion ("Cangkul") Proof
//!
//! Proves a player who declares "cannot follow suit" holds no card of the
//! trick suit. The whole hand is committed as one aggregate
//! `A = Σ(card_i·G + r_i·H) = (Σcard_i)·G + r_agg·H`; the ledger knows the
//! hand, checks every card against the suit, and a Schnorr proof on
//! `A − (Σcard_i)·G` shows the prover knows `r_agg`.
//!
//! Layout: `k(4) ‖ A(96) ‖ R(96) ‖ z(32)` = 228 bytes.

use bls12_381::{G1Projective, Scalar};

use crate::core::card::{has_suit, is_valid_card, suit_of, CardId, MAX_HAND_SIZE, SUIT_COUNT};
use crate::core::encoding::{
    point_from_bytes, point_to_bytes, read_array, read_u32, scalar_from_be_canonical,
    scalar_from_u32, scalar_to_be, POINT_LEN,
};
use crate::core::hash::{keccak256, Hash32};
use crate::core::rng::random_scalar;
use crate::crypto::challenge::{Transcript, TAG_AGGREGATE};
use crate::crypto::generators::generator_g;
use crate::crypto::pedersen::commit;
use crate::crypto::schnorr::{schnorr_prove, schnorr_verify};

use super::mode::AGGREGATE_PROOF_LEN;
use super::verify::VerifyError;
use super::{ProofContext, ProofError};

/// Aggregate exclusion proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandProof {
    /// Number of cards covered.
    pub count: u32,
    /// Aggregate commitment `A`.
    pub aggregate: G1Projective,
    /// Schnorr nonce commitment `R`.
    pub nonce_point: G1Projective,
    /// Schnorr response `z`.
    pub response: Scalar,
}

/// Proof plus the aggregate blinding that opens it at reveal.
#[derive(Debug, Clone, Copy)]
pub struct HandCommitment {
    /// The proof submitted with the commit.
    pub proof: HandProof,
    /// `r_agg = Σ r_i`, the reveal salt.
    pub blinding: [u8; 32],
}

impl HandProof {
    /// Ledger commit hash `keccak256(A)`.
    pub fn commit_hash(&self) -> Hash32 {
        keccak256(&point_to_bytes(&self.aggregate))
    }

    /// Serialize to the wire layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(AGGREGATE_PROOF_LEN);
        out.extend_from_slice(&self.count.to_be_bytes());
        out.extend_from_slice(&point_to_bytes(&self.aggregate));
        out.extend_from_slice(&point_to_bytes(&self.nonce_point));
        out.extend_from_slice(&scalar_to_be(&self.response));
        out
    }

    /// Parse the wire layout.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, VerifyError> {
        if bytes.len() != AGGREGATE_PROOF_LEN {
            return Err(VerifyError::UnknownLength(bytes.len()));
        }
        Ok(Self {
            count: read_u32(bytes, 0)?,
            aggregate: point_from_bytes(&read_array(bytes, 4)?)?,
            nonce_point: point_from_bytes(&read_array(bytes, 4 + POINT_LEN)?)?,
            response: scalar_from_be_canonical(&read_array(bytes, 4 + 2 * POINT_LEN)?)?,
        })
    }
}

fn card_sum(hand: &[CardId]) -> u32 {
    hand.iter().sum()
}

fn hand_challenge(
    aggregate: &G1Projective,
    nonce_point: &G1Projective,
    suit: u32,
    count: u32,
    ctx: &ProofContext<'_>,
) -> Scalar {
    let mut t = Transcript::new();
    t.append_point(aggregate)
        .append_point(nonce_point)
        .append_u32(suit)
        .append_u32(count)
        .append_context(ctx.session_id, ctx.party);
    t.challenge(TAG_AGGREGATE)
}

/// Prove that `hand` holds no card of `trick_suit`.
pub fn prove_exclusion(
    hand: &[CardId],
    trick_suit: u32,
    ctx: &ProofContext<'_>,
) -> Result<HandCommitment, ProofError> {
    if hand.is_empty() {
        return Err(ProofError::EmptyHand);
    }
    if hand.len() > MAX_HAND_SIZE {
        return Err(ProofError::HandTooLarge(hand.len()));
    }
    if let Some(card) = hand.iter().find(|c| !is_valid_card(**c)) {
        return Err(ProofError::InvalidCard(*card));
    }
    if has_suit(hand, trick_suit) {
        return Err(ProofError::HandHasSuit(trick_suit));
    }

    // Per-card blindings, summed into the aggregate.
    let blindings: Vec<Scalar> = hand.iter().map(|_| random_scalar()).collect();
    let aggregate = hand
        .iter()
        .zip(&blindings)
        .fold(G1Projective::identity(), |acc, (card, r)| acc + commit(&scalar_from_u32(*card), r));
    let r_agg = blindings.iter().fold(Scalar::zero(), |acc, r| acc + r);

    let count = hand.len() as u32;
    let sigma = schnorr_prove(&r_agg, |nonce_point| {
        hand_challenge(&aggregate, nonce_point, trick_suit, count, ctx)
    });

    Ok(HandCommitment {
        proof: HandProof {
            count,
            aggregate,
            nonce_point: sigma.nonce_point,
            response: sigma.response,
        },
        blinding: scalar_to_be(&r_agg),
    })
}

/// Verify a serialized exclusion proof against the ledger's view of the hand.
pub fn verify_exclusion(
    commit_hash: &Hash32,
    trick_suit: u32,
    hand: &[CardId],
    proof: &[u8],
    ctx: &ProofContext<'_>,
) -> Result<(), VerifyError> {
    let proof = HandProof::from_bytes(proof)?;
    if proof.count == 0 || proof.count as usize > MAX_HAND_SIZE || proof.count as usize != hand.len() {
        return Err(VerifyError::HandSizeMismatch { proof_count: proof.count, hand_len: hand.len() });
    }
    if proof.commit_hash() != *commit_hash {
        return Err(VerifyError::BindingMismatch);
    }
    if trick_suit >= SUIT_COUNT {
        return Err(VerifyError::SuitViolation { card: trick_suit });
    }
    if let Some(card) = hand.iter().find(|c| !is_valid_card(**c) || suit_of(**c) == trick_suit) {
        return Err(VerifyError::SuitViolation { card: *card });
    }

    let statement = proof.aggregate - generator_g() * scalar_from_u32(card_sum(hand));
    let e = hand_challenge(&proof.aggregate, &proof.nonce_point, trick_suit, proof.count, ctx);
    if !schnorr_verify(&statement, &proof.nonce_point, &e, &proof.response) {
        return Err(VerifyError::RelationFailed);
    }
    Ok(())
}

/// Reveal-time opening: `keccak256((Σcard)·G + r_agg·H) == commit_hash`.
pub fn opens_aggregate(commit_hash: &Hash32, hand: &[CardId], blinding: &[u8; 32]) -> bool {
    match scalar_from_be_canonical(blinding) {
        Ok(r) => keccak256(&point_to_bytes(&commit(&scalar_from_u32(card_sum(hand)), &r))) == *commit_hash,
        Err(_) => false,
    }
}
