//! Schnorr Sigma Protocol on Base H
//!
//! Proves knowledge of `r` with `D = r·H` for a statement point `D`.
//! Prover: `R = k·H`, `z = k + e·r`. Verifier: `z·H == R + e·D`.

use bls12_381::{G1Projective, Scalar};

use crate::core::rng::random_scalar;

use super::generators::generator_h;

/// Non-interactive Schnorr proof (nonce commitment and response).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SchnorrProof {
    /// Nonce commitment `R = k·H`.
    pub nonce_point: G1Projective,
    /// Response `z = k + e·r`.
    pub response: Scalar,
}

/// Prove knowledge of `blinding` for the statement `blinding·H`.
///
/// `challenge` receives `R` and must hash the full context
/// (statement, `R`, session, party, tag).
pub fn schnorr_prove<F>(blinding: &Scalar, challenge: F) -> SchnorrProof
where
    F: FnOnce(&G1Projective) -> Scalar,
{
    let k = random_scalar();
    let nonce_point = generator_h() * k;
    let e = challenge(&nonce_point);
    SchnorrProof { nonce_point, response: respond(&k, &e, blinding) }
}

/// `z = k + e·r`.
#[inline]
pub fn respond(nonce: &Scalar, challenge: &Scalar, secret: &Scalar) -> Scalar {
    nonce + challenge * secret
}

/// Check `z·H == R + e·D`.
pub fn schnorr_verify(
    statement: &G1Projective,
    nonce_point: &G1Projective,
    challenge: &Scalar,
    response: &Scalar,
) -> bool {
    generator_h() * response == nonce_point + statement * challenge
}

/// Nonce point that makes `(e, z)` verify for `statement`: `R = z·H − e·D`.
pub fn simulate_nonce_point(
    statement: &G1Projective,
    challenge: &Scalar,
    response: &Scalar,
) -> G1Projective {
    generator_h() * response - statement * challenge
}
