// crates/spacetime-post-core/src/error.rs

//! Structured error taxonomy.
//!
//! `PlotError` covers the corruption/truncation/argument-validation kinds
//! that apply to plot files and their headers. I/O failures at a crate
//! boundary are wrapped with `anyhow::Context` rather than folded into this
//! enum — only conditions a caller is expected to match on by kind live
//! here.

use thiserror::Error;

/// Failure kinds for plot header parsing and plot-file validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlotError {
    /// A fixed-length byte argument (pubkey, seed, challenge, root) was not
    /// exactly the expected length, or a count was negative.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// Header magic bytes did not match `SPTP`.
    #[error("bad magic bytes in plot header")]
    BadMagic,

    /// Header version byte is not one this codec understands.
    #[error("unsupported plot header version: {0}")]
    UnsupportedVersion(u8),

    /// Recomputed checksum over the 89-byte prefix did not match.
    #[error("plot header checksum mismatch")]
    ChecksumMismatch,

    /// A header field failed a structural invariant (e.g. non-positive
    /// `leaf_count` or `leaf_size != 32`).
    #[error("invalid header field: {0}")]
    InvalidField(&'static str),

    /// The plot file is shorter than `121 + leaf_count * leaf_size` bytes.
    #[error("plot file truncated: expected at least {expected} bytes, found {actual}")]
    Truncated {
        /// Minimum valid length.
        expected: u64,
        /// Observed file length.
        actual: u64,
    },

    /// The plot file does not exist on disk.
    #[error("plot file missing")]
    Missing,
}

impl PlotError {
    /// Whether this error kind should be recorded as `Corrupted` in a
    /// plot registry. Truncation counts as corruption for registry
    /// purposes.
    #[must_use]
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::BadMagic
                | Self::UnsupportedVersion(_)
                | Self::ChecksumMismatch
                | Self::InvalidField(_)
                | Self::Truncated { .. }
        )
    }
}
