//! Session Action Orchestration
//!
//! Drives one party through a ledger session: seed commit and reveal, trick
//! commits and reveals, timeouts and forfeit.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    SESSION ORCHESTRATOR                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  config.rs       - Engine settings                          │
//! │  context.rs      - Per-session identity and modes           │
//! │  retry.rs        - Jittered exponential backoff             │
//! │  orchestrator.rs - Phase sequencing, retries, auto-reveal   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Lifecycle
//!
//! ```text
//! SeedCommit ──► SeedReveal ──► Playing ──► Finished
//!                                 │   ▲
//!                      commit ──► reveal
//! ```

pub mod config;
pub mod context;
pub mod orchestrator;
pub mod retry;

use std::sync::Arc;

use thiserror::Error;

use crate::circuit::{ArtifactSource, BbCliBackend, CircuitError, NoirBridge};
use crate::ledger::{user_message, LedgerError};
use crate::proof::{ProofError, VerifyError};
use crate::store::{FileStore, KeyValueStore, MemoryStore, SecretStore, StoreError};

pub use config::{ConfigError, EngineConfig};
pub use context::SessionContext;
pub use orchestrator::SessionOrchestrator;
pub use retry::Backoff;

/// Orchestrator errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Input rejected before anything was submitted.
    #[error(transparent)]
    Proof(#[from] ProofError),

    /// A proof failed local verification.
    #[error(transparent)]
    Verify(#[from] VerifyError),

    /// Secret persistence failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The ledger rejected the call, or contention outlasted the retries.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Circuit prover failure.
    #[error(transparent)]
    Circuit(#[from] CircuitError),

    /// Bad configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Opening material for a pending reveal is gone.
    #[error("no stored {kind} secret for session {session_id}; wait for the timeout")]
    SecretLost {
        /// `seed` or `play`.
        kind: &'static str,
        /// Ledger session id.
        session_id: u32,
    },

    /// Circuit mode selected but no prover configured.
    #[error("circuit prover not configured")]
    CircuitUnavailable,

    /// A play was requested while no trick is open.
    #[error("no trick in progress")]
    NoTrick,
}

impl EngineError {
    /// Message fit for a player.
    pub fn user_message(&self) -> String {
        match self {
            Self::Ledger(e) => user_message(e),
            other => other.to_string(),
        }
    }
}

/// What an orchestrator call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    /// Accepted by the ledger after `attempts` tries.
    Submitted {
        /// Attempts used, the first included.
        attempts: u32,
    },
    /// Another action for this session is in flight; nothing was done.
    Skipped,
    /// The ledger is not waiting on this party for that action.
    NotNeeded,
}

impl ActionOutcome {
    /// Did this call reach the ledger successfully?
    pub fn is_submitted(&self) -> bool {
        matches!(self, Self::Submitted { .. })
    }
}

/// Secret store for `config`: file-backed when `store_dir` is set.
pub fn open_secret_store(config: &EngineConfig) -> Result<SecretStore, EngineError> {
    let kv: Arc<dyn KeyValueStore> = match &config.store_dir {
        Some(dir) => Arc::new(FileStore::open(dir.clone())?),
        None => Arc::new(MemoryStore::new()),
    };
    Ok(SecretStore::new(kv))
}

/// Circuit bridge for `config`, when an artifact and project are configured.
pub fn circuit_bridge(config: &EngineConfig) -> Option<Arc<NoirBridge>> {
    let artifact = config.circuit_artifact.clone()?;
    let project_dir = config.circuit_project_dir.clone()?;
    let backend = BbCliBackend::new(
        config.bb_binary.clone(),
        config.nargo_binary.clone(),
        project_dir,
        config.prover_work_dir.clone(),
    );
    Some(Arc::new(NoirBridge::new(ArtifactSource::Path(artifact), Arc::new(backend))))
}
