//! Secret Randomness
//!
//! All secrets (seeds, blinding factors, Schnorr nonces) come from the
//! operating system CSPRNG. Blinding factors are sampled as field elements
//! so their big-endian encoding is always canonical.

use bls12_381::Scalar;
use ff::Field;
use rand::rngs::OsRng;
use rand::{Rng, RngCore};

use super::encoding::scalar_to_be;

/// Fresh 32 random bytes.
pub fn random_bytes32() -> [u8; 32] {
    let mut out = [0u8; 32];
    OsRng.fill_bytes(&mut out);
    out
}

/// Fresh uniformly random scalar.
pub fn random_scalar() -> Scalar {
    Scalar::random(OsRng)
}

/// Fresh blinding factor, encoded as a canonical big-endian scalar.
pub fn random_blinding() -> [u8; 32] {
    scalar_to_be(&random_scalar())
}

/// Fresh seed that satisfies the leading-bytes entropy predicate.
pub fn random_seed() -> [u8; 32] {
    loop {
        let seed = random_bytes32();
        if seed_has_entropy(&seed) {
            return seed;
        }
    }
}

/// Number of leading seed bytes the entropy predicate inspects.
pub const SEED_ENTROPY_PREFIX: usize = 4;

/// Leading-bytes entropy predicate: the first four bytes are not all zero.
pub fn seed_has_entropy(seed: &[u8; 32]) -> bool {
    seed[..SEED_ENTROPY_PREFIX].iter().any(|b| *b != 0)
}

/// Jitter factor in `[0.5, 1.0)` scaled to permille, for retry backoff.
pub fn jitter_permille() -> u64 {
    rand::thread_rng().gen_range(500..1000)
}
