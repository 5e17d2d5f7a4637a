//! Seed Commit-Reveal Engine
//!
//! Three interchangeable schemes, all revealing only `seed_hash`:
//!
//! - **nizk**: hash commitment `keccak256(seed_hash ‖ blinding ‖ party)` and a
//!   hash-based Fiat-Shamir response. Proof = `blinding ‖ response` (64 B).
//! - **pedersen**: `C = Fr(seed_hash)·G + blinding·H`, commit hash
//!   `keccak256(C)`, Schnorr proof on `C − seed_hash·G`. Proof = `C ‖ R ‖ z`
//!   (224 B).
//! - **noir**: commit hash `keccak256(blake2s(seed))`. The proof comes from
//!   the circuit bridge; this module only covers the commit and the binding.

use bls12_381::{G1Projective, Scalar};
use serde::{Deserialize, Serialize};

use crate::core::encoding::{
    point_from_bytes, point_to_bytes, read_array, scalar_from_be_canonical,
    scalar_from_be_reduced, scalar_to_be, EncodingError, POINT_LEN, SCALAR_LEN,
};
use crate::core::hash::{distinct_byte_count, keccak256, keccak256_concat, Hash32, MIN_DISTINCT_HASH_BYTES};
use crate::core::rng::seed_has_entropy;
use crate::crypto::challenge::{Transcript, TAG_NIZK, TAG_NULLIFIER, TAG_PEDERSEN};
use crate::crypto::generators::generator_g;
use crate::crypto::pedersen::{commit, commit_hash};
use crate::crypto::schnorr::{schnorr_prove, schnorr_verify};

use super::mode::{classify_seed_proof, ProofMode, SeedProofKind};
use super::verify::VerifyError;
use super::{ProofContext, ProofError};

/// What gets published at seed-commit time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedCommitment {
    /// Mode the seed is committed under.
    pub mode: ProofMode,
    /// Mode-specific seed hash (kept locally until reveal).
    pub seed_hash: Hash32,
    /// Value submitted to the ledger.
    pub commit_hash: Hash32,
}

/// What gets submitted at seed-reveal time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedReveal {
    /// Revealed seed hash.
    pub seed_hash: Hash32,
    /// Mode-specific proof bytes.
    pub proof: Vec<u8>,
}

// =============================================================================
// Commit
// =============================================================================

/// Build the seed commitment for `mode`.
///
/// Entropy-aware modes refuse seeds whose first four bytes are all zero.
pub fn commit_seed(
    mode: ProofMode,
    seed: &[u8; 32],
    blinding: &[u8; 32],
    ctx: &ProofContext<'_>,
) -> Result<SeedCommitment, ProofError> {
    if mode.is_entropy_aware() && !seed_has_entropy(seed) {
        return Err(ProofError::WeakSeed);
    }
    let seed_hash = mode.seed_hash(seed);
    let commit_hash = match mode {
        ProofMode::Nizk => nizk_commitment(&seed_hash, blinding, ctx.party),
        ProofMode::Pedersen => commit_hash(&pedersen_point(&seed_hash, blinding)?),
        ProofMode::Noir => keccak256(&seed_hash),
    };
    Ok(SeedCommitment { mode, seed_hash, commit_hash })
}

/// `keccak256(seed_hash ‖ blinding ‖ party)`.
pub fn nizk_commitment(seed_hash: &Hash32, blinding: &[u8; 32], party: &str) -> Hash32 {
    keccak256_concat(&[&seed_hash[..], &blinding[..], party.as_bytes()])
}

/// `keccak256(seed_hash ‖ "NULL" ‖ session_be4)`.
pub fn nullifier(seed_hash: &Hash32, session_id: u32) -> Hash32 {
    keccak256_concat(&[&seed_hash[..], &TAG_NULLIFIER[..], &session_id.to_be_bytes()[..]])
}

/// `C = Fr(seed_hash)·G + blinding·H`; the blinding must be canonical.
pub fn pedersen_point(seed_hash: &Hash32, blinding: &[u8; 32]) -> Result<G1Projective, ProofError> {
    let r = scalar_from_be_canonical(blinding)?;
    Ok(commit(&scalar_from_be_reduced(seed_hash), &r))
}

// =============================================================================
// Prove
// =============================================================================

/// Produce the reveal proof for the hash-based and Pedersen modes.
pub fn prove_seed(
    mode: ProofMode,
    seed: &[u8; 32],
    blinding: &[u8; 32],
    ctx: &ProofContext<'_>,
) -> Result<SeedReveal, ProofError> {
    let seed_hash = mode.seed_hash(seed);
    let proof = match mode {
        ProofMode::Nizk => prove_nizk(&seed_hash, blinding, ctx),
        ProofMode::Pedersen => prove_pedersen(&seed_hash, blinding, ctx)?,
        ProofMode::Noir => return Err(ProofError::CircuitRequired(mode)),
    };
    Ok(SeedReveal { seed_hash, proof })
}

fn nizk_challenge(commitment: &Hash32, ctx: &ProofContext<'_>) -> Hash32 {
    let mut t = Transcript::new();
    t.append_bytes(commitment).append_context(ctx.session_id, ctx.party);
    t.finish_hash(TAG_NIZK)
}

fn nizk_response(seed_hash: &Hash32, challenge: &Hash32, blinding: &[u8; 32]) -> Hash32 {
    keccak256_concat(&[&seed_hash[..], &challenge[..], &blinding[..]])
}

fn prove_nizk(seed_hash: &Hash32, blinding: &[u8; 32], ctx: &ProofContext<'_>) -> Vec<u8> {
    let commitment = nizk_commitment(seed_hash, blinding, ctx.party);
    let challenge = nizk_challenge(&commitment, ctx);
    let response = nizk_response(seed_hash, &challenge, blinding);

    let mut proof = Vec::with_capacity(2 * SCALAR_LEN);
    proof.extend_from_slice(blinding);
    proof.extend_from_slice(&response);
    proof
}

fn pedersen_challenge(
    c: &G1Projective,
    r: &G1Projective,
    seed_hash: &Hash32,
    ctx: &ProofContext<'_>,
) -> Scalar {
    let mut t = Transcript::new();
    t.append_point(c)
        .append_point(r)
        .append_bytes(seed_hash)
        .append_context(ctx.session_id, ctx.party);
    t.challenge(TAG_PEDERSEN)
}

fn prove_pedersen(
    seed_hash: &Hash32,
    blinding: &[u8; 32],
    ctx: &ProofContext<'_>,
) -> Result<Vec<u8>, ProofError> {
    let r = scalar_from_be_canonical(blinding)?;
    let c = commit(&scalar_from_be_reduced(seed_hash), &r);
    let sigma = schnorr_prove(&r, |nonce_point| pedersen_challenge(&c, nonce_point, seed_hash, ctx));

    let mut proof = Vec::with_capacity(2 * POINT_LEN + SCALAR_LEN);
    proof.extend_from_slice(&point_to_bytes(&c));
    proof.extend_from_slice(&point_to_bytes(&sigma.nonce_point));
    proof.extend_from_slice(&scalar_to_be(&sigma.response));
    Ok(proof)
}

// =============================================================================
// Public inputs
// =============================================================================

/// Offset of the party address in the nizk public inputs.
const NIZK_PARTY_OFFSET: usize = 100;

/// `seed_hash ‖ commitment ‖ nullifier ‖ session_be4 ‖ party`.
pub fn nizk_public_inputs(seed_hash: &Hash32, commitment: &Hash32, ctx: &ProofContext<'_>) -> Vec<u8> {
    let mut out = Vec::with_capacity(96 + 4 + ctx.party.len());
    out.extend_from_slice(seed_hash);
    out.extend_from_slice(commitment);
    out.extend_from_slice(&nullifier(seed_hash, ctx.session_id));
    out.extend_from_slice(&ctx.tail_bytes());
    out
}

/// Circuit public inputs: each seed-hash byte left-padded to a 32-byte field element.
pub fn circuit_public_inputs(seed_hash: &Hash32) -> Vec<u8> {
    let mut out = Vec::with_capacity(32 * 32);
    for byte in seed_hash {
        out.extend_from_slice(&[0u8; 31]);
        out.push(*byte);
    }
    out
}

// =============================================================================
// Verify
// =============================================================================

/// Verify a seed reveal against the published commit hash.
///
/// `mode` is the mode the seed was committed under; a proof of another mode
/// is rejected without coercion. Circuit proofs only get the binding check
/// here, the proof itself goes to the circuit verifier.
pub fn verify_seed_reveal(
    mode: ProofMode,
    commit_hash: &Hash32,
    seed_hash: &Hash32,
    proof: &[u8],
    ctx: &ProofContext<'_>,
) -> Result<(), VerifyError> {
    let kind = classify_seed_proof(proof.len()).ok_or(VerifyError::UnknownLength(proof.len()))?;
    if kind.mode() != mode {
        return Err(VerifyError::ModeMismatch { expected: mode, len: proof.len() });
    }
    if distinct_byte_count(seed_hash) < MIN_DISTINCT_HASH_BYTES {
        return Err(VerifyError::WeakSeedHash);
    }
    match kind {
        SeedProofKind::Nizk => verify_nizk(commit_hash, seed_hash, proof, ctx),
        SeedProofKind::Pedersen => verify_pedersen(commit_hash, seed_hash, proof, ctx),
        SeedProofKind::Circuit | SeedProofKind::PreVerified => verify_circuit_binding(commit_hash, seed_hash),
    }
}

/// Noir binding: `keccak256(seed_hash) == commit_hash`.
pub fn verify_circuit_binding(commit_hash: &Hash32, seed_hash: &Hash32) -> Result<(), VerifyError> {
    if keccak256(seed_hash) != *commit_hash {
        return Err(VerifyError::BindingMismatch);
    }
    Ok(())
}

fn verify_nizk(
    commit_hash: &Hash32,
    seed_hash: &Hash32,
    proof: &[u8],
    ctx: &ProofContext<'_>,
) -> Result<(), VerifyError> {
    verify_nizk_public_inputs(&nizk_public_inputs(seed_hash, commit_hash, ctx), proof)
}

/// Verify a nizk proof against the public-input block the ledger receives.
///
/// Checks, in order: commitment binding, the nullifier for the session in
/// the block, the Fiat-Shamir response, seed-hash entropy.
pub fn verify_nizk_public_inputs(public_inputs: &[u8], proof: &[u8]) -> Result<(), VerifyError> {
    let seed_hash: Hash32 = read_array(public_inputs, 0)?;
    let commitment: Hash32 = read_array(public_inputs, 32)?;
    let claimed_nullifier: Hash32 = read_array(public_inputs, 64)?;
    let session_id = u32::from_be_bytes(read_array(public_inputs, 96)?);
    let party = match public_inputs.get(NIZK_PARTY_OFFSET..) {
        Some(bytes) if !bytes.is_empty() => std::str::from_utf8(bytes).map_err(|_| VerifyError::BindingMismatch)?,
        _ => {
            return Err(EncodingError::WrongLength {
                expected: NIZK_PARTY_OFFSET + 1,
                got: public_inputs.len(),
            }
            .into())
        }
    };
    let ctx = ProofContext::new(session_id, party);

    let blinding: [u8; 32] = read_array(proof, 0)?;
    let response: [u8; 32] = read_array(proof, SCALAR_LEN)?;

    if nizk_commitment(&seed_hash, &blinding, party) != commitment {
        return Err(VerifyError::BindingMismatch);
    }
    if nullifier(&seed_hash, session_id) != claimed_nullifier {
        return Err(VerifyError::NullifierMismatch);
    }
    let challenge = nizk_challenge(&commitment, &ctx);
    if nizk_response(&seed_hash, &challenge, &blinding) != response {
        return Err(VerifyError::RelationFailed);
    }
    if distinct_byte_count(&seed_hash) < MIN_DISTINCT_HASH_BYTES {
        return Err(VerifyError::WeakSeedHash);
    }
    Ok(())
}

fn verify_pedersen(
    commit_hash: &Hash32,
    seed_hash: &Hash32,
    proof: &[u8],
    ctx: &ProofContext<'_>,
) -> Result<(), VerifyError> {
    let c_bytes: [u8; POINT_LEN] = read_array(proof, 0)?;
    if keccak256(&c_bytes) != *commit_hash {
        return Err(VerifyError::BindingMismatch);
    }
    let c = point_from_bytes(&c_bytes)?;
    let nonce_point = point_from_bytes(&read_array(proof, POINT_LEN)?)?;
    let z = scalar_from_be_canonical(&read_array(proof, 2 * POINT_LEN)?)?;

    let statement = c - generator_g() * scalar_from_be_reduced(seed_hash);
    let e = pedersen_challenge(&c, &nonce_point, seed_hash, ctx);
    if !schnorr_verify(&statement, &nonce_point, &e, &z) {
        return Err(VerifyError::RelationFailed);
    }
    Ok(())
}
