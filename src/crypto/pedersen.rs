//! Pedersen Commitments
//!
//! `C = v·G + r·H`. Binding under discrete log between `G` and `H`,
//! perfectly hiding for uniform `r`. The ledger stores `keccak256(C)`.

use bls12_381::{G1Projective, Scalar};

use crate::core::encoding::{point_from_bytes, point_to_bytes, EncodingError, POINT_LEN};
use crate::core::hash::{keccak256, Hash32};

use super::generators::{generator_g, generator_h};

/// Commit to `value` with blinding `blinding`.
pub fn commit(value: &Scalar, blinding: &Scalar) -> G1Projective {
    generator_g() * value + generator_h() * blinding
}

/// Ledger-facing hash of a commitment point.
pub fn commit_hash(point: &G1Projective) -> Hash32 {
    keccak256(&point_to_bytes(point))
}

/// A Pedersen commitment with its cached wire encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Commitment {
    point: G1Projective,
    bytes: [u8; POINT_LEN],
}

impl Commitment {
    /// Commit to `value` with blinding `blinding`.
    pub fn new(value: &Scalar, blinding: &Scalar) -> Self {
        Self::from_point(commit(value, blinding))
    }

    /// Wrap an existing point.
    pub fn from_point(point: G1Projective) -> Self {
        Self { bytes: point_to_bytes(&point), point }
    }

    /// Decode from the 96-byte uncompressed encoding.
    pub fn from_bytes(bytes: &[u8; POINT_LEN]) -> Result<Self, EncodingError> {
        let point = point_from_bytes(bytes)?;
        Ok(Self { point, bytes: *bytes })
    }

    /// The underlying point.
    #[inline]
    pub fn point(&self) -> &G1Projective {
        &self.point
    }

    /// 96-byte uncompressed encoding.
    #[inline]
    pub fn to_bytes(&self) -> [u8; POINT_LEN] {
        self.bytes
    }

    /// `keccak256` of the encoding.
    pub fn hash(&self) -> Hash32 {
        keccak256(&self.bytes)
    }

    /// Does `(value, blinding)` open this commitment?
    pub fn opens_to(&self, value: &Scalar, blinding: &Scalar) -> bool {
        commit(value, blinding) == self.point
    }
}
