//! # Cangkulan Prover
//!
//! Client-side commit-reveal and zero-knowledge proof engine for two-player
//! Cangkulan Lite sessions settled on a ledger.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    CANGKULAN PROVER                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Byte-level primitives                     │
//! │  ├── hash.rs     - keccak256 / blake2s / sha256              │
//! │  ├── encoding.rs - Point and scalar wire formats             │
//! │  ├── card.rs     - Card ids, suits, play actions             │
//! │  └── rng.rs      - Seeds, blindings, jitter                  │
//! │                                                              │
//! │  crypto/         - BLS12-381 G1 building blocks              │
//! │  ├── generators  - G and hash-to-curve H                     │
//! │  ├── pedersen    - C = v·G + r·H                             │
//! │  ├── challenge   - Fiat-Shamir transcripts                   │
//! │  └── schnorr     - Knowledge of r for C - v·G                │
//! │                                                              │
//! │  proof/          - Seed proofs, ring and exclusion proofs    │
//! │  circuit/        - External circuit prover bridge            │
//! │  store/          - Secret persistence                        │
//! │  ledger/         - Ledger ports, error codes, in-memory      │
//! │  session/        - Action orchestration                      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Commit-Reveal Guarantee
//!
//! Opening material is persisted before a commitment is submitted, and the
//! ledger only accepts an opening that matches the stored commitment:
//! - Seed reveals prove knowledge without exposing the seed
//! - Card commits prove the card follows suit without naming it
//! - Cangkul commits prove the hand holds no card of the trick suit

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod circuit;
pub mod core;
pub mod crypto;
pub mod ledger;
pub mod proof;
pub mod session;
pub mod store;

// Re-export commonly used types
pub use core::card::{CardId, PlayAction};
pub use core::hash::Hash32;
pub use ledger::{LedgerClient, LedgerError, SessionView, StateRefresh};
#[cfg(any(test, feature = "test-ledger"))]
pub use ledger::InMemoryLedger;
pub use proof::{ProofContext, ProofError, ProofMode, VerifyError};
pub use session::{ActionOutcome, EngineConfig, EngineError, SessionContext, SessionOrchestrator};
pub use store::{FileStore, MemoryStore, SecretStore};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
