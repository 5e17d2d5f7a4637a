//! Hashing for Commitments and Transcripts
//!
//! Provides the hash functions the verifying ledger recomputes:
//! - keccak256 for commit hashes, nullifiers and Fiat-Shamir challenges
//! - blake2s for the circuit-native seed hash
//!
//! All multi-byte integers are fed big-endian, matching the ledger encoding.

use blake2::Blake2s256;
use sha3::{Digest, Keccak256};

/// Hash output type (256 bits / 32 bytes).
pub type Hash32 = [u8; 32];

/// Incremental keccak256 hasher for proof transcripts.
///
/// Order of updates is critical: the verifier hashes fields in the
/// exact order they are appended here.
#[derive(Clone, Default)]
pub struct TranscriptHasher {
    hasher: Keccak256,
}

impl TranscriptHasher {
    /// Create an empty hasher.
    pub fn new() -> Self {
        Self { hasher: Keccak256::new() }
    }

    /// Update with raw bytes.
    #[inline]
    pub fn update_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.hasher.update(bytes);
        self
    }

    /// Update with a u32 value (big-endian).
    #[inline]
    pub fn update_u32(&mut self, value: u32) -> &mut Self {
        self.hasher.update(value.to_be_bytes());
        self
    }

    /// Update with a 4-byte domain tag.
    #[inline]
    pub fn update_tag(&mut self, tag: &[u8; 4]) -> &mut Self {
        self.hasher.update(tag);
        self
    }

    /// Finalize and return the hash.
    pub fn finalize(self) -> Hash32 {
        self.hasher.finalize().into()
    }
}

/// keccak256 of a single buffer.
pub fn keccak256(data: &[u8]) -> Hash32 {
    Keccak256::digest(data).into()
}

/// keccak256 over the concatenation of several buffers.
pub fn keccak256_concat(parts: &[&[u8]]) -> Hash32 {
    let mut hasher = Keccak256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// blake2s-256, the hash the seed circuit computes natively.
pub fn blake2s256(data: &[u8]) -> Hash32 {
    Blake2s256::digest(data).into()
}

/// Count distinct byte values in a 32-byte hash.
///
/// The ledger rejects seed hashes with fewer than
/// [`MIN_DISTINCT_HASH_BYTES`] distinct values.
pub fn distinct_byte_count(hash: &Hash32) -> usize {
    let mut seen = [false; 256];
    let mut distinct = 0;
    for byte in hash {
        let slot = &mut seen[usize::from(*byte)];
        if !*slot {
            *slot = true;
            distinct += 1;
        }
    }
    distinct
}

/// Minimum distinct byte values a revealed seed hash must carry.
pub const MIN_DISTINCT_HASH_BYTES: usize = 4;
