//! Ledger Boundary
//!
//! The remote, nonce-ordered ledger the orchestrator talks to.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    LEDGER BOUNDARY                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  mod.rs    - LedgerClient / StateRefresh ports              │
//! │  view.rs   - Per-player session projection                  │
//! │  errors.rs - Failure codes and user-facing messages         │
//! │  memory.rs - In-process ledger (`test-ledger` feature)      │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod errors;
#[cfg(any(test, feature = "test-ledger"))]
pub mod memory;
pub mod view;

use async_trait::async_trait;

use crate::core::card::PlayAction;
use crate::core::hash::Hash32;

pub use errors::{user_message, ContractError, LedgerError};
#[cfg(any(test, feature = "test-ledger"))]
pub use memory::InMemoryLedger;
pub use view::{Lifecycle, Outcome, SessionView, Slot, TrickState};

/// Ledger calls that mutate a session.
///
/// Every call is addressed by `(session_id, party)` where `party` is the
/// caller's ledger address.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Publish a seed commit hash.
    async fn commit_seed(&self, session_id: u32, party: &str, commit_hash: Hash32) -> Result<(), LedgerError>;

    /// Reveal a seed hash with its proof (64 / 224 / 0 bytes).
    async fn reveal_seed(
        &self,
        session_id: u32,
        party: &str,
        seed_hash: Hash32,
        proof: Vec<u8>,
    ) -> Result<(), LedgerError>;

    /// Verify a circuit seed proof and record a short-lived verified flag.
    async fn verify_noir_seed(
        &self,
        session_id: u32,
        party: &str,
        seed_hash: Hash32,
        proof: Vec<u8>,
    ) -> Result<(), LedgerError>;

    /// Commit a plain hashed play.
    async fn commit_play(
        &self,
        session_id: u32,
        party: &str,
        commit_hash: Hash32,
        expected_nonce: u32,
    ) -> Result<(), LedgerError>;

    /// Commit a card play with a ring membership proof.
    async fn commit_play_zk(
        &self,
        session_id: u32,
        party: &str,
        commit_hash: Hash32,
        expected_nonce: u32,
        ring_proof: Vec<u8>,
    ) -> Result<(), LedgerError>;

    /// Commit a cangkul with an aggregate exclusion proof.
    async fn commit_cangkul_zk(
        &self,
        session_id: u32,
        party: &str,
        commit_hash: Hash32,
        expected_nonce: u32,
        hand_proof: Vec<u8>,
    ) -> Result<(), LedgerError>;

    /// Open the play commitment.
    async fn reveal_play(
        &self,
        session_id: u32,
        party: &str,
        action: PlayAction,
        salt: [u8; 32],
    ) -> Result<(), LedgerError>;

    /// Advance the action nonce toward the deadline; returns the new nonce.
    async fn tick_timeout(&self, session_id: u32, caller: &str) -> Result<u32, LedgerError>;

    /// Settle a game whose deadline passed.
    async fn resolve_timeout(&self, session_id: u32, caller: &str) -> Result<(), LedgerError>;

    /// Concede.
    async fn forfeit(&self, session_id: u32, caller: &str) -> Result<(), LedgerError>;
}

/// Read access to the ledger's session state.
#[async_trait]
pub trait StateRefresh: Send + Sync {
    /// Fetch `viewer`'s projection of the session.
    async fn fetch_session_view(&self, session_id: u32, viewer: &str) -> Result<SessionView, LedgerError>;
}
