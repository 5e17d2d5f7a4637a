//! Lazy Circuit Bridge
//!
//! Loads the circuit artifact and readies the backend on first use. Concurrent
//! first callers share one initialization; a failed initialization is retried
//! by the next caller.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::core::hash::Hash32;
use crate::proof::mode::CIRCUIT_PROOF_MIN_EXCLUSIVE;
use crate::proof::seed::circuit_public_inputs;

use super::artifact::CircuitArtifact;
use super::backend::CircuitBackend;
use super::witness::SeedWitness;
use super::CircuitError;

/// Where the artifact comes from.
#[derive(Debug, Clone)]
pub enum ArtifactSource {
    /// Compiled JSON on disk.
    Path(PathBuf),
    /// Already parsed.
    Inline(Box<CircuitArtifact>),
}

/// Initialization state, observable for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeState {
    /// Nothing loaded yet.
    Uninitialized,
    /// A caller is loading the artifact.
    Initializing,
    /// Artifact loaded and validated.
    Ready,
    /// Last initialization failed with this message.
    Failed(String),
}

/// Proof of seed knowledge from the circuit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoirSeedProof {
    /// Raw proof bytes (> 4000).
    #[serde(with = "hex_bytes")]
    pub proof: Vec<u8>,
    /// 32 field elements, one per seed-hash byte.
    #[serde(with = "hex_bytes")]
    pub public_inputs: Vec<u8>,
    /// Wall time spent proving.
    pub elapsed_ms: u64,
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(d)?;
        hex::decode(text).map_err(serde::de::Error::custom)
    }
}

/// Lazily-initialized adapter to the circuit prover.
pub struct NoirBridge {
    source: ArtifactSource,
    backend: Arc<dyn CircuitBackend>,
    artifact: OnceCell<Arc<CircuitArtifact>>,
    state: Mutex<BridgeState>,
    init_runs: AtomicUsize,
}

impl NoirBridge {
    /// Create an uninitialized bridge.
    pub fn new(source: ArtifactSource, backend: Arc<dyn CircuitBackend>) -> Self {
        Self {
            source,
            backend,
            artifact: OnceCell::new(),
            state: Mutex::new(BridgeState::Uninitialized),
            init_runs: AtomicUsize::new(0),
        }
    }

    /// Current initialization state.
    pub fn state(&self) -> BridgeState {
        self.state
            .lock()
            .map(|s| s.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// How many times initialization actually ran.
    pub fn init_runs(&self) -> usize {
        self.init_runs.load(Ordering::SeqCst)
    }

    fn set_state(&self, next: BridgeState) {
        match self.state.lock() {
            Ok(mut s) => *s = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }

    async fn load(&self) -> Result<Arc<CircuitArtifact>, CircuitError> {
        self.init_runs.fetch_add(1, Ordering::SeqCst);
        self.set_state(BridgeState::Initializing);
        let loaded = match &self.source {
            ArtifactSource::Path(path) => CircuitArtifact::load(path).await,
            ArtifactSource::Inline(artifact) => artifact.validate().map(|_| (**artifact).clone()),
        };
        match loaded {
            Ok(artifact) => {
                info!(
                    backend = self.backend.name(),
                    noir_version = %artifact.noir_version,
                    "circuit bridge ready"
                );
                self.set_state(BridgeState::Ready);
                Ok(Arc::new(artifact))
            }
            Err(e) => {
                warn!(error = %e, "circuit bridge initialization failed");
                self.set_state(BridgeState::Failed(e.to_string()));
                Err(CircuitError::Init(e.to_string()))
            }
        }
    }

    /// Initialize once and return the artifact.
    pub async fn ensure_ready(&self) -> Result<Arc<CircuitArtifact>, CircuitError> {
        self.artifact.get_or_try_init(|| self.load()).await.cloned()
    }

    /// Prove knowledge of `seed` with `blake2s(seed) == seed_hash`.
    pub async fn prove_knowledge(&self, seed: &[u8; 32], seed_hash: &Hash32) -> Result<NoirSeedProof, CircuitError> {
        let witness = SeedWitness::generate(seed, seed_hash)?;
        let artifact = self.ensure_ready().await?;

        let started = Instant::now();
        let proof = self.backend.prove(&artifact, &witness).await?;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        if proof.len() <= CIRCUIT_PROOF_MIN_EXCLUSIVE {
            return Err(CircuitError::ProofTooShort(proof.len()));
        }
        info!(proof_len = proof.len(), elapsed_ms, "circuit proof generated");

        Ok(NoirSeedProof {
            proof,
            public_inputs: circuit_public_inputs(seed_hash),
            elapsed_ms,
        })
    }

    /// Verify a circuit proof for `seed_hash`.
    pub async fn verify_seed_proof(&self, seed_hash: &Hash32, proof: &[u8]) -> Result<bool, CircuitError> {
        if proof.len() <= CIRCUIT_PROOF_MIN_EXCLUSIVE {
            return Ok(false);
        }
        let artifact = self.ensure_ready().await?;
        self.backend
            .verify(&artifact, proof, &circuit_public_inputs(seed_hash))
            .await
    }
}

impl std::fmt::Debug for NoirBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoirBridge")
            .field("backend", &self.backend.name())
            .field("state", &self.state())
            .finish()
    }
}
