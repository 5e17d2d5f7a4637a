//! Ring Membership Proof
//!
//! 1-of-N Schnorr OR-proof that a Pedersen commitment `C = card·G + r·H`
//! hides one of the cards in a public valid set, without saying which.
//!
//! For each candidate `D_i = C − card_i·G`; only the real leg knows
//! `log_H(D_j) = r`. Simulated legs pick `(e_i, z_i)` first and solve for
//! `R_i`; the real leg's challenge is whatever makes `Σ e_i = e`.
//!
//! Layout: `C(96) ‖ [e_i(32) ‖ z_i(32)] × N`, `N ∈ [1, 9]`.

use bls12_381::{G1Projective, Scalar};

use crate::core::card::{is_valid_card, CardId, MAX_RING_SIZE};
use crate::core::encoding::{
    point_from_bytes, point_to_bytes, read_array, scalar_from_be_canonical, scalar_from_u32,
    scalar_to_be, POINT_LEN, SCALAR_LEN,
};
use crate::core::hash::{keccak256, Hash32};
use crate::core::rng::random_scalar;
use crate::crypto::challenge::{Transcript, TAG_RING};
use crate::crypto::generators::{generator_g, generator_h};
use crate::crypto::pedersen::commit;
use crate::crypto::schnorr::{respond, simulate_nonce_point};

use super::mode::{classify_play_proof, ring_proof_len, PlayProofKind, RING_LEG_LEN};
use super::verify::VerifyError;
use super::{ProofContext, ProofError};

/// One `(e_i, z_i)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingLeg {
    /// Leg challenge `e_i`.
    pub challenge: Scalar,
    /// Leg response `z_i`.
    pub response: Scalar,
}

/// Ring membership proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingProof {
    /// Commitment `C` to the played card.
    pub commitment: G1Projective,
    /// One leg per valid-set candidate, in set order.
    pub legs: Vec<RingLeg>,
}

impl RingProof {
    /// Number of candidates.
    pub fn size(&self) -> usize {
        self.legs.len()
    }

    /// Ledger commit hash `keccak256(C)`.
    pub fn commit_hash(&self) -> Hash32 {
        keccak256(&point_to_bytes(&self.commitment))
    }

    /// Serialize to the wire layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(ring_proof_len(self.legs.len()));
        out.extend_from_slice(&point_to_bytes(&self.commitment));
        for leg in &self.legs {
            out.extend_from_slice(&scalar_to_be(&leg.challenge));
            out.extend_from_slice(&scalar_to_be(&leg.response));
        }
        out
    }

    /// Parse the wire layout.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, VerifyError> {
        let size = match classify_play_proof(bytes.len()) {
            Some(PlayProofKind::Ring { size }) => size,
            _ => return Err(VerifyError::UnknownLength(bytes.len())),
        };
        let commitment = point_from_bytes(&read_array(bytes, 0)?)?;
        let legs = (0..size)
            .map(|i| -> Result<RingLeg, VerifyError> {
                let offset = POINT_LEN + i * RING_LEG_LEN;
                Ok(RingLeg {
                    challenge: scalar_from_be_canonical(&read_array(bytes, offset)?)?,
                    response: scalar_from_be_canonical(&read_array(bytes, offset + SCALAR_LEN)?)?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { commitment, legs })
    }
}

fn statements(commitment: &G1Projective, valid_set: &[CardId]) -> Vec<G1Projective> {
    let g = generator_g();
    valid_set
        .iter()
        .map(|card| commitment - g * scalar_from_u32(*card))
        .collect()
}

fn ring_challenge(commitment: &G1Projective, nonce_points: &[G1Projective], ctx: &ProofContext<'_>) -> Scalar {
    let mut t = Transcript::new();
    t.append_point(commitment);
    for point in nonce_points {
        t.append_point(point);
    }
    t.append_context(ctx.session_id, ctx.party);
    t.challenge(TAG_RING)
}

/// Prove that the commitment to `card` under `blinding` hides a member of `valid_set`.
pub fn prove_membership(
    card: CardId,
    blinding: &[u8; 32],
    valid_set: &[CardId],
    ctx: &ProofContext<'_>,
) -> Result<RingProof, ProofError> {
    if valid_set.is_empty() {
        return Err(ProofError::EmptySet);
    }
    if valid_set.len() > MAX_RING_SIZE {
        return Err(ProofError::SetTooLarge(valid_set.len()));
    }
    if !is_valid_card(card) {
        return Err(ProofError::InvalidCard(card));
    }
    let real = valid_set
        .iter()
        .position(|c| *c == card)
        .ok_or(ProofError::CardNotInSet(card))?;

    let r = scalar_from_be_canonical(blinding)?;
    let commitment = commit(&scalar_from_u32(card), &r);
    let ds = statements(&commitment, valid_set);

    let k = random_scalar();
    let mut legs = Vec::with_capacity(valid_set.len());
    let mut nonce_points = Vec::with_capacity(valid_set.len());
    for (i, d) in ds.iter().enumerate() {
        if i == real {
            legs.push(RingLeg { challenge: Scalar::zero(), response: Scalar::zero() });
            nonce_points.push(generator_h() * k);
        } else {
            let leg = RingLeg { challenge: random_scalar(), response: random_scalar() };
            nonce_points.push(simulate_nonce_point(d, &leg.challenge, &leg.response));
            legs.push(leg);
        }
    }

    let e = ring_challenge(&commitment, &nonce_points, ctx);
    let simulated_sum = legs
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != real)
        .fold(Scalar::zero(), |acc, (_, leg)| acc + leg.challenge);
    let e_real = e - simulated_sum;
    legs[real] = RingLeg { challenge: e_real, response: respond(&k, &e_real, &r) };

    Ok(RingProof { commitment, legs })
}

/// Verify a serialized ring proof against `commit_hash` and the current valid set.
pub fn verify_membership(
    commit_hash: &Hash32,
    valid_set: &[CardId],
    proof: &[u8],
    ctx: &ProofContext<'_>,
) -> Result<(), VerifyError> {
    if valid_set.is_empty() {
        return Err(VerifyError::EmptySet);
    }
    let proof = RingProof::from_bytes(proof)?;
    if proof.size() != valid_set.len() {
        return Err(VerifyError::StaleValidSet {
            proof_size: proof.size(),
            set_size: valid_set.len(),
        });
    }
    if proof.commit_hash() != *commit_hash {
        return Err(VerifyError::BindingMismatch);
    }

    let ds = statements(&proof.commitment, valid_set);
    let nonce_points: Vec<G1Projective> = ds
        .iter()
        .zip(&proof.legs)
        .map(|(d, leg)| simulate_nonce_point(d, &leg.challenge, &leg.response))
        .collect();
    let e = ring_challenge(&proof.commitment, &nonce_points, ctx);
    let sum = proof.legs.iter().fold(Scalar::zero(), |acc, leg| acc + leg.challenge);
    if sum != e {
        return Err(VerifyError::RingRelationFailed);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rng::random_blinding;
    use proptest::prelude::*;

    const PARTY: &str = "GBRINGPLAYER";

    #[test]
    fn test_ring_single_candidate() {
        let ctx = ProofContext::new(11, PARTY);
        let proof = prove_membership(4, &random_blinding(), &[4], &ctx).unwrap();
        let bytes = proof.to_bytes();
        assert_eq!(bytes.len(), 160);
        verify_membership(&proof.commit_hash(), &[4], &bytes, &ctx).unwrap();
    }

    #[test]
    fn test_ring_full_suit() {
        let ctx = ProofContext::new(11, PARTY);
        let set: Vec<CardId> = (9..18).collect();
        let proof = prove_membership(13, &random_blinding(), &set, &ctx).unwrap();
        let bytes = proof.to_bytes();
        assert_eq!(bytes.len(), 96 + 9 * 64);
        verify_membership(&proof.commit_hash(), &set, &bytes, &ctx).unwrap();
    }

    #[test]
    fn test_ring_rejects_bad_inputs() {
        let ctx = ProofContext::new(1, PARTY);
        let blinding = random_blinding();
        assert_eq!(prove_membership(3, &blinding, &[], &ctx), Err(ProofError::EmptySet));
        assert_eq!(prove_membership(3, &blinding, &[1, 2], &ctx), Err(ProofError::CardNotInSet(3)));
        let ten: Vec<CardId> = (0..10).collect();
        assert_eq!(prove_membership(3, &blinding, &ten, &ctx), Err(ProofError::SetTooLarge(10)));
    }

    #[test]
    fn test_ring_bound_to_context() {
        let ctx = ProofContext::new(5, PARTY);
        let set = [0, 2, 7];
        let proof = prove_membership(2, &random_blinding(), &set, &ctx).unwrap();
        let bytes = proof.to_bytes();
        let other_session = ProofContext::new(6, PARTY);
        assert_eq!(
            verify_membership(&proof.commit_hash(), &set, &bytes, &other_session),
            Err(VerifyError::RingRelationFailed)
        );
        let other_party = ProofContext::new(5, "GBSOMEONEELSE");
        assert_eq!(
            verify_membership(&proof.commit_hash(), &set, &bytes, &other_party),
            Err(VerifyError::RingRelationFailed)
        );
    }

    #[test]
    fn test_ring_wrong_commit_hash() {
        let ctx = ProofContext::new(5, PARTY);
        let proof = prove_membership(2, &random_blinding(), &[1, 2], &ctx).unwrap();
        assert_eq!(
            verify_membership(&[0u8; 32], &[1, 2], &proof.to_bytes(), &ctx),
            Err(VerifyError::BindingMismatch)
        );
    }

    #[test]
    fn test_ring_stale_valid_set() {
        let ctx = ProofContext::new(5, PARTY);
        let proof = prove_membership(2, &random_blinding(), &[1, 2, 3], &ctx).unwrap();
        let hash = proof.commit_hash();
        assert_eq!(
            verify_membership(&hash, &[1, 2], &proof.to_bytes(), &ctx),
            Err(VerifyError::StaleValidSet { proof_size: 3, set_size: 2 })
        );
        // Same size, different members.
        assert_eq!(
            verify_membership(&hash, &[1, 2, 4], &proof.to_bytes(), &ctx),
            Err(VerifyError::RingRelationFailed)
        );
    }

    #[test]
    fn test_ring_commitment_prefix_shared_across_sessions() {
        let blinding = random_blinding();
        let a = prove_membership(2, &blinding, &[1, 2], &ProofContext::new(1, PARTY)).unwrap();
        let b = prove_membership(2, &blinding, &[1, 2], &ProofContext::new(2, PARTY)).unwrap();
        assert_eq!(a.to_bytes()[..96], b.to_bytes()[..96]);
        assert_ne!(a.to_bytes()[96..], b.to_bytes()[96..]);
    }

    #[test]
    fn test_ring_opening_matches_commitment() {
        let ctx = ProofContext::new(1, PARTY);
        let blinding = random_blinding();
        let proof = prove_membership(20, &blinding, &[19, 20, 21], &ctx).unwrap();
        let r = scalar_from_be_canonical(&blinding).unwrap();
        assert_eq!(proof.commitment, commit(&scalar_from_u32(20), &r));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(12))]

        #[test]
        fn prop_ring_challenges_sum_to_transcript(
            suit in 0u32..4,
            size in 1usize..=9,
            pick in 0usize..9,
            session in any::<u32>(),
        ) {
            let set: Vec<CardId> = (0..size as u32).map(|v| suit * 9 + v).collect();
            let card = set[pick % size];
            let ctx = ProofContext::new(session, PARTY);
            let proof = prove_membership(card, &random_blinding(), &set, &ctx).unwrap();

            let ds = statements(&proof.commitment, &set);
            let nonce_points: Vec<G1Projective> = ds
                .iter()
                .zip(&proof.legs)
                .map(|(d, leg)| simulate_nonce_point(d, &leg.challenge, &leg.response))
                .collect();
            let e = ring_challenge(&proof.commitment, &nonce_points, &ctx);
            let sum = proof.legs.iter().fold(Scalar::zero(), |acc, leg| acc + leg.challenge);
            prop_assert_eq!(sum, e);
            prop_assert!(verify_membership(&proof.commit_hash(), &set, &proof.to_bytes(), &ctx).is_ok());
        }
    }
}
