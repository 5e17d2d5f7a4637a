//! Core primitives.
//!
//! Hashing, fixed-width encodings, card encoding and secret randomness.
//! Everything the proof engines and the ledger verifier must agree on
//! byte-for-byte lives here.

pub mod card;
pub mod encoding;
pub mod hash;
pub mod rng;

// Re-export core types
pub use card::{CardId, PlayAction, CANNOT_FOLLOW_SENTINEL};
pub use encoding::EncodingError;
pub use hash::{keccak256, Hash32};
