//! Commitment primitives.
//!
//! Pedersen commitments over BLS12-381 G1, Schnorr proofs on the blinding
//! generator, and domain-separated Fiat-Shamir challenges.

pub mod challenge;
pub mod generators;
pub mod pedersen;
pub mod schnorr;

pub use challenge::Transcript;
pub use generators::{generator_g, generator_h};
pub use pedersen::{commit, commit_hash, Commitment};
pub use schnorr::{schnorr_prove, schnorr_verify, SchnorrProof};
