//! Proof Modes and Proof-Length Discrimination
//!
//! The ledger tells proof kinds apart by byte length alone. Seed proofs and
//! play proofs travel through different calls, so the two length tables are
//! classified separately (a 224-byte blob is a Pedersen seed proof on the seed
//! path and a two-card ring proof on the play path).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::card::MAX_RING_SIZE;
use crate::core::encoding::{POINT_LEN, SCALAR_LEN};
use crate::core::hash::{blake2s256, keccak256, Hash32};

/// `blinding(32) ‖ response(32)`.
pub const NIZK_PROOF_LEN: usize = 2 * SCALAR_LEN;

/// `C(96) ‖ R(96) ‖ z(32)`.
pub const PEDERSEN_PROOF_LEN: usize = 2 * POINT_LEN + SCALAR_LEN;

/// `k(4) ‖ A(96) ‖ R(96) ‖ z(32)`.
pub const AGGREGATE_PROOF_LEN: usize = 4 + 2 * POINT_LEN + SCALAR_LEN;

/// Bytes per ring leg: `e_i(32) ‖ z_i(32)`.
pub const RING_LEG_LEN: usize = 2 * SCALAR_LEN;

/// Circuit proofs are strictly longer than this.
pub const CIRCUIT_PROOF_MIN_EXCLUSIVE: usize = 4000;

/// Ring proof length for a set of `n` candidates.
#[inline]
pub const fn ring_proof_len(n: usize) -> usize {
    POINT_LEN + RING_LEG_LEN * n
}

/// Seed-reveal scheme, chosen per session before the seed commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProofMode {
    /// Hash-based Fiat-Shamir proof.
    #[default]
    Nizk,
    /// Pedersen commitment with a Schnorr proof on the blinding.
    Pedersen,
    /// External circuit proof of `blake2s(seed) == seed_hash`.
    Noir,
}

impl ProofMode {
    /// Modes that refuse seeds failing the leading-bytes entropy predicate.
    pub fn is_entropy_aware(self) -> bool {
        matches!(self, Self::Pedersen | Self::Noir)
    }

    /// Seed hash as this mode defines it.
    pub fn seed_hash(self, seed: &[u8; 32]) -> Hash32 {
        match self {
            Self::Nizk | Self::Pedersen => keccak256(seed),
            Self::Noir => blake2s256(seed),
        }
    }

    /// Lowercase wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Nizk => "nizk",
            Self::Pedersen => "pedersen",
            Self::Noir => "noir",
        }
    }
}

impl fmt::Display for ProofMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProofMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "nizk" => Ok(Self::Nizk),
            "pedersen" => Ok(Self::Pedersen),
            "noir" => Ok(Self::Noir),
            other => Err(format!("unknown proof mode: {other}")),
        }
    }
}

/// What a seed-reveal proof blob is, judged by length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedProofKind {
    /// Empty proof: the circuit proof was verified in a prior call.
    PreVerified,
    /// 64 bytes.
    Nizk,
    /// 224 bytes.
    Pedersen,
    /// More than 4000 bytes.
    Circuit,
}

impl SeedProofKind {
    /// Proof mode this kind belongs to.
    pub fn mode(self) -> ProofMode {
        match self {
            Self::Nizk => ProofMode::Nizk,
            Self::Pedersen => ProofMode::Pedersen,
            Self::PreVerified | Self::Circuit => ProofMode::Noir,
        }
    }
}

/// Classify a seed-reveal proof by its length.
pub fn classify_seed_proof(len: usize) -> Option<SeedProofKind> {
    match len {
        0 => Some(SeedProofKind::PreVerified),
        NIZK_PROOF_LEN => Some(SeedProofKind::Nizk),
        PEDERSEN_PROOF_LEN => Some(SeedProofKind::Pedersen),
        n if n > CIRCUIT_PROOF_MIN_EXCLUSIVE => Some(SeedProofKind::Circuit),
        _ => None,
    }
}

/// What a play-commit proof blob is, judged by length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayProofKind {
    /// Aggregate exclusion proof.
    Aggregate,
    /// Ring membership proof over `size` candidates.
    Ring {
        /// Number of ring legs.
        size: usize,
    },
}

/// Classify a play-commit proof by its length.
pub fn classify_play_proof(len: usize) -> Option<PlayProofKind> {
    if len == AGGREGATE_PROOF_LEN {
        return Some(PlayProofKind::Aggregate);
    }
    if len > POINT_LEN && (len - POINT_LEN) % RING_LEG_LEN == 0 {
        let size = (len - POINT_LEN) / RING_LEG_LEN;
        if (1..=MAX_RING_SIZE).contains(&size) {
            return Some(PlayProofKind::Ring { size });
        }
    }
    None
}
