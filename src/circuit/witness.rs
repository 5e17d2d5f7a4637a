//! Seed Witness Generation
//!
//! Runs the circuit's assertions natively before any proving work, so a bad
//! seed fails in microseconds instead of after a long proving run.

use crate::core::hash::{blake2s256, Hash32};
use crate::core::rng::seed_has_entropy;
use crate::proof::ProofError;

/// Private and public inputs of the seed circuit.
#[derive(Clone, PartialEq, Eq)]
pub struct SeedWitness {
    seed: [u8; 32],
    seed_hash: Hash32,
}

impl std::fmt::Debug for SeedWitness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeedWitness")
            .field("seed", &"<redacted>")
            .field("seed_hash", &hex::encode(self.seed_hash))
            .finish()
    }
}

impl SeedWitness {
    /// Check `blake2s(seed) == seed_hash` and the entropy predicate.
    pub fn generate(seed: &[u8; 32], seed_hash: &Hash32) -> Result<Self, ProofError> {
        if blake2s256(seed) != *seed_hash {
            return Err(ProofError::SeedHashMismatch);
        }
        if !seed_has_entropy(seed) {
            return Err(ProofError::WeakSeed);
        }
        Ok(Self { seed: *seed, seed_hash: *seed_hash })
    }

    /// Public seed hash.
    pub fn seed_hash(&self) -> &Hash32 {
        &self.seed_hash
    }

    /// `Prover.toml` body for the witness solver.
    pub fn to_prover_toml(&self) -> String {
        format!(
            "seed = [{}]\nseed_hash = [{}]\n",
            toml_byte_array(&self.seed),
            toml_byte_array(&self.seed_hash)
        )
    }
}

fn toml_byte_array(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("\"{b}\""))
        .collect::<Vec<_>>()
        .join(", ")
}
