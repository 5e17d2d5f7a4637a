//! Fixed-Width Encodings
//!
//! Every value that crosses the ledger boundary has exactly one encoding:
//! - Fr scalars: 32 bytes, big-endian
//! - G1 points: 96 bytes, uncompressed (big-endian x || y with flag bits)
//! - integers: u32, big-endian
//!
//! The verifier recomputes everything from these bytes, so any mismatch
//! is a hard failure.

use bls12_381::{G1Affine, G1Projective, Scalar};
use group::Curve;

/// Encoded scalar length.
pub const SCALAR_LEN: usize = 32;

/// Encoded G1 point length (uncompressed).
pub const POINT_LEN: usize = 96;

/// Encoding errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodingError {
    /// Field has the wrong length.
    #[error("expected {expected} bytes, got {got}")]
    WrongLength {
        /// Required length.
        expected: usize,
        /// Provided length.
        got: usize,
    },

    /// Bytes are not a canonical scalar.
    #[error("scalar is not canonical")]
    NonCanonicalScalar,

    /// Bytes do not decode to a point in the G1 subgroup.
    #[error("point is not on the curve or not in the G1 subgroup")]
    InvalidPoint,

    /// Hex text could not be decoded.
    #[error("invalid hex: {0}")]
    Hex(String),
}

/// Interpret 32 big-endian bytes as an integer and reduce it mod r.
///
/// This is how the ledger turns hashes and card ids into scalars.
pub fn scalar_from_be_reduced(bytes: &[u8; SCALAR_LEN]) -> Scalar {
    let mut wide = [0u8; 64];
    for (dst, src) in wide.iter_mut().zip(bytes.iter().rev()) {
        *dst = *src;
    }
    Scalar::from_bytes_wide(&wide)
}

/// Decode a canonical big-endian scalar (value must be below r).
pub fn scalar_from_be_canonical(bytes: &[u8; SCALAR_LEN]) -> Result<Scalar, EncodingError> {
    let mut le = *bytes;
    le.reverse();
    Option::<Scalar>::from(Scalar::from_bytes(&le)).ok_or(EncodingError::NonCanonicalScalar)
}

/// Encode a scalar as 32 big-endian bytes.
pub fn scalar_to_be(scalar: &Scalar) -> [u8; SCALAR_LEN] {
    let mut bytes = scalar.to_bytes();
    bytes.reverse();
    bytes
}

/// Lift a u32 (card id, card sum) to a scalar.
pub fn scalar_from_u32(value: u32) -> Scalar {
    Scalar::from(u64::from(value))
}

/// Encode a projective point as 96 uncompressed bytes.
pub fn point_to_bytes(point: &G1Projective) -> [u8; POINT_LEN] {
    point.to_affine().to_uncompressed()
}

/// Decode 96 uncompressed bytes, enforcing curve and subgroup membership.
pub fn point_from_bytes(bytes: &[u8; POINT_LEN]) -> Result<G1Projective, EncodingError> {
    Option::<G1Affine>::from(G1Affine::from_uncompressed(bytes))
        .map(G1Projective::from)
        .ok_or(EncodingError::InvalidPoint)
}

/// Copy a fixed-size array out of a slice at `offset`.
pub fn read_array<const N: usize>(data: &[u8], offset: usize) -> Result<[u8; N], EncodingError> {
    let end = offset.checked_add(N).ok_or(EncodingError::WrongLength {
        expected: N,
        got: 0,
    })?;
    let slice = data.get(offset..end).ok_or(EncodingError::WrongLength {
        expected: end,
        got: data.len(),
    })?;
    let mut out = [0u8; N];
    out.copy_from_slice(slice);
    Ok(out)
}

/// Read a big-endian u32 at `offset`.
pub fn read_u32(data: &[u8], offset: usize) -> Result<u32, EncodingError> {
    read_array::<4>(data, offset).map(u32::from_be_bytes)
}

/// Decode a 32-byte hex string.
pub fn bytes32_from_hex(text: &str) -> Result<[u8; 32], EncodingError> {
    let raw = hex::decode(text).map_err(|e| EncodingError::Hex(e.to_string()))?;
    let got = raw.len();
    raw.try_into()
        .map_err(|_| EncodingError::WrongLength { expected: 32, got })
}
