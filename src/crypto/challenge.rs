//! Fiat-Shamir Challenges
//!
//! `e = Fr(keccak256(fields ‖ tag))`, reduced big-endian mod r.
//! Each proof kind appends its own 4-byte domain tag last.

use bls12_381::{G1Projective, Scalar};

use crate::core::encoding::{point_to_bytes, scalar_from_be_reduced};
use crate::core::hash::{Hash32, TranscriptHasher};

/// Hash-based seed proof.
pub const TAG_NIZK: &[u8; 4] = b"ZKV2";
/// Pedersen seed proof.
pub const TAG_PEDERSEN: &[u8; 4] = b"ZKP4";
/// Ring membership proof.
pub const TAG_RING: &[u8; 4] = b"ZKP7";
/// Aggregate exclusion proof.
pub const TAG_AGGREGATE: &[u8; 4] = b"ZKP8";
/// Seed nullifier.
pub const TAG_NULLIFIER: &[u8; 4] = b"NULL";

/// Ordered challenge transcript.
#[derive(Clone, Default)]
pub struct Transcript {
    hasher: TranscriptHasher,
}

impl Transcript {
    /// Empty transcript.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a point in its 96-byte encoding.
    pub fn append_point(&mut self, point: &G1Projective) -> &mut Self {
        self.hasher.update_bytes(&point_to_bytes(point));
        self
    }

    /// Append raw bytes.
    pub fn append_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.hasher.update_bytes(bytes);
        self
    }

    /// Append a big-endian u32.
    pub fn append_u32(&mut self, value: u32) -> &mut Self {
        self.hasher.update_u32(value);
        self
    }

    /// Append the session binding: session id then party bytes.
    pub fn append_context(&mut self, session_id: u32, party: &str) -> &mut Self {
        self.hasher.update_u32(session_id).update_bytes(party.as_bytes());
        self
    }

    /// Close with `tag` and return the raw digest.
    pub fn finish_hash(mut self, tag: &[u8; 4]) -> Hash32 {
        self.hasher.update_tag(tag);
        self.hasher.finalize()
    }

    /// Close with `tag` and reduce to a scalar.
    pub fn challenge(self, tag: &[u8; 4]) -> Scalar {
        scalar_from_be_reduced(&self.finish_hash(tag))
    }
}
