//! External Circuit Bridge
//!
//! Adapter to a general-purpose circuit prover for the `noir` seed mode.
//! The circuit proves `blake2s(seed) == seed_hash` and the leading-bytes
//! entropy predicate; only `seed_hash` is public.

pub mod artifact;
pub mod backend;
pub mod bridge;
#[cfg(any(test, feature = "test-ledger"))]
pub mod testing;
pub mod witness;

use thiserror::Error;

use crate::proof::ProofError;

pub use artifact::CircuitArtifact;
pub use backend::{BbCliBackend, CircuitBackend};
pub use bridge::{ArtifactSource, BridgeState, NoirBridge, NoirSeedProof};
pub use witness::SeedWitness;

/// Circuit bridge errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CircuitError {
    /// Artifact missing, unparsable, or with the wrong ABI.
    #[error("circuit artifact: {0}")]
    Artifact(String),

    /// Bridge initialization failed.
    #[error("circuit bridge initialization failed: {0}")]
    Init(String),

    /// Witness generation rejected the inputs.
    #[error("witness generation failed: {0}")]
    Witness(#[from] ProofError),

    /// Prover process or I/O failure.
    #[error("prover backend: {0}")]
    Backend(String),

    /// Backend returned something too short to be a circuit proof.
    #[error("circuit proof too short ({0} bytes)")]
    ProofTooShort(usize),
}
