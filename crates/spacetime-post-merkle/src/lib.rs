// crates/spacetime-post-merkle/src/lib.rs

//! Streaming Merkle Engine (C3): builds and verifies Merkle commitments
//! over plot-file leaf sequences in bounded, `O(height)` memory, plus the
//! optional sidecar cache format that accelerates proof generation over
//! the topmost levels of a plot's tree.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

pub mod cache;
pub mod engine;

pub use cache::{materialize_all_levels, CacheFile, CachedLevel};
pub use engine::{
    build_with_proof_target, parent, tree_height, verify_path, MerkleError, MerklePath,
    StreamingMerkleBuilder,
};
