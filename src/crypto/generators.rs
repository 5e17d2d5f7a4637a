//! Commitment Generators
//!
//! `G` is the standard BLS12-381 G1 generator. `H` is a nothing-up-my-sleeve
//! point derived by hashing to the curve, so nobody knows `log_G(H)`.

use std::sync::OnceLock;

use bls12_381::hash_to_curve::{ExpandMsgXmd, HashToCurve};
use bls12_381::G1Projective;

/// Message hashed to obtain `H`.
pub const H_MESSAGE: &[u8] = b"PEDERSEN_H";

/// Domain separation tag for the `H` derivation.
pub const H_DST: &[u8] = b"SGS_CANGKULAN_V1";

/// Value generator `G`.
#[inline]
pub fn generator_g() -> G1Projective {
    G1Projective::generator()
}

/// Blinding generator `H`, derived once per process.
pub fn generator_h() -> G1Projective {
    static H: OnceLock<G1Projective> = OnceLock::new();
    *H.get_or_init(|| {
        <G1Projective as HashToCurve<ExpandMsgXmd<sha2::Sha256>>>::hash_to_curve(H_MESSAGE, H_DST)
    })
}
