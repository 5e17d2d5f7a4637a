//! Deterministic stand-in backend.
//!
//! Produces fixed-size blobs tagged with a hash of the public inputs, so the
//! split verification flow can run where no prover toolchain is installed.
//! It proves nothing.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::core::hash::keccak256;
use crate::proof::seed::circuit_public_inputs;

use super::artifact::CircuitArtifact;
use super::backend::CircuitBackend;
use super::witness::SeedWitness;
use super::CircuitError;

/// Minimal seed-circuit artifact with the expected ABI.
pub const SAMPLE_ARTIFACT: &str = r#"{
    "noir_version": "1.0.0-beta.9+abc",
    "hash": 1234567890,
    "abi": {
        "parameters": [
            {"name": "seed", "type": {"kind": "array", "length": 32}, "visibility": "private"},
            {"name": "seed_hash", "type": {"kind": "array", "length": 32}, "visibility": "public"}
        ],
        "return_type": null,
        "error_types": {}
    },
    "bytecode": "H4sIAAAAAAAA/wEAAP//AAAAAAAAAAA=",
    "debug_symbols": "",
    "file_map": {}
}"#;

/// Parse [`SAMPLE_ARTIFACT`].
pub fn sample_artifact() -> Result<CircuitArtifact, CircuitError> {
    CircuitArtifact::from_json(SAMPLE_ARTIFACT)
}

/// Length of the blobs [`EchoBackend`] emits.
pub const ECHO_PROOF_LEN: usize = 4096;

/// Backend whose "proof" is a tag over the public inputs.
#[derive(Debug, Default)]
pub struct EchoBackend {
    proofs: AtomicUsize,
    verifications: AtomicUsize,
    reject_all: AtomicBool,
}

impl EchoBackend {
    /// Make every verification fail from now on.
    pub fn reject_all(&self, reject: bool) {
        self.reject_all.store(reject, Ordering::SeqCst);
    }

    /// Proofs produced so far.
    pub fn proofs(&self) -> usize {
        self.proofs.load(Ordering::SeqCst)
    }

    /// Verifications performed so far.
    pub fn verifications(&self) -> usize {
        self.verifications.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CircuitBackend for EchoBackend {
    fn name(&self) -> &str {
        "echo"
    }

    async fn prove(&self, _artifact: &CircuitArtifact, witness: &SeedWitness) -> Result<Vec<u8>, CircuitError> {
        self.proofs.fetch_add(1, Ordering::SeqCst);
        let tag = keccak256(&circuit_public_inputs(witness.seed_hash()));
        let mut proof = tag.repeat(ECHO_PROOF_LEN / tag.len());
        proof.truncate(ECHO_PROOF_LEN);
        Ok(proof)
    }

    async fn verify(
        &self,
        _artifact: &CircuitArtifact,
        proof: &[u8],
        public_inputs: &[u8],
    ) -> Result<bool, CircuitError> {
        self.verifications.fetch_add(1, Ordering::SeqCst);
        if self.reject_all.load(Ordering::SeqCst) {
            return Ok(false);
        }
        let tag = keccak256(public_inputs);
        Ok(proof.len() == ECHO_PROOF_LEN && proof[..32] == tag)
    }
}
