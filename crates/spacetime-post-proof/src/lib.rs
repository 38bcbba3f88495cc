// crates/spacetime-post-proof/src/lib.rs

//! Proof Generator (C6) and Proof Validator (C7): scanning a plot (or many
//! plots in parallel) for the best-scoring leaf against a challenge, and
//! independently re-verifying the resulting proof.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

pub mod generator;
pub mod scoring;
pub mod signer;
pub mod validator;

pub use generator::{
    generate_best_proof, generate_best_proof_with_cache, generate_proof, generate_proof_with_cache,
    MiningOutcome, PlotProof,
};
pub use scoring::compute_score;
pub use signer::Signer;
pub use validator::{validate, ProofValidationResult, ValidationError};
