// crates/spacetime-post-core/src/header.rs

//! Plot header codec: fixed 121-byte layout with a checksum trailer.
//!
//! Offsets are bit-exact and fixed across versions. `parse` is the only
//! place a plot's validity is first judged; every failure here is fatal
//! corruption, never a soft warning.

use crate::error::PlotError;
use sha2::{Digest, Sha256};

/// On-disk header size in bytes.
pub const HEADER_LEN: usize = 121;
/// Fixed leaf size in bytes (SHA-256 digest width).
pub const LEAF_SIZE: i32 = 32;

const MAGIC: [u8; 4] = *b"SPTP";
const SUPPORTED_VERSION: u8 = 1;
const CHECKSUM_PREFIX_LEN: usize = 89;

/// Parsed, validated plot header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlotHeader {
    /// Header format version (currently always 1).
    pub version: u8,
    /// 32-byte seed the plot's leaves were derived from.
    pub plot_seed: [u8; 32],
    /// Number of leaves stored after the header.
    pub leaf_count: i64,
    /// Size of each leaf in bytes; always 32.
    pub leaf_size: i32,
    /// `ceil(log2(leaf_count))`, or 0 when `leaf_count == 1`.
    pub tree_height: i64,
    /// Merkle root committing all leaves.
    pub merkle_root: [u8; 32],
}

impl PlotHeader {
    /// Construct a header, computing `tree_height` from `leaf_count`.
    ///
    /// # Errors
    ///
    /// Returns [`PlotError::InvalidField`] if `leaf_count <= 0` or
    /// `leaf_size != 32`.
    pub fn new(plot_seed: [u8; 32], leaf_count: i64, merkle_root: [u8; 32]) -> Result<Self, PlotError> {
        if leaf_count <= 0 {
            return Err(PlotError::InvalidField("leaf_count must be positive"));
        }
        Ok(Self {
            version: SUPPORTED_VERSION,
            plot_seed,
            leaf_count,
            leaf_size: LEAF_SIZE,
            tree_height: ceil_log2(leaf_count),
            merkle_root,
        })
    }

    /// Minimum valid plot file length in bytes: header plus all leaves.
    #[must_use]
    pub fn min_file_len(&self) -> u64 {
        HEADER_LEN as u64 + (self.leaf_count as u64) * (self.leaf_size as u64)
    }

    /// Serialize to the exact 121-byte wire layout, including checksum.
    #[must_use]
    pub fn serialize(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[0..4].copy_from_slice(&MAGIC);
        buf[4] = self.version;
        buf[5..37].copy_from_slice(&self.plot_seed);
        buf[37..45].copy_from_slice(&self.leaf_count.to_le_bytes());
        buf[45..49].copy_from_slice(&self.leaf_size.to_le_bytes());
        buf[49..57].copy_from_slice(&self.tree_height.to_le_bytes());
        buf[57..89].copy_from_slice(&self.merkle_root);

        let checksum = checksum_of(&buf[0..CHECKSUM_PREFIX_LEN]);
        buf[89..121].copy_from_slice(&checksum);
        buf
    }

    /// Parse and fully validate a 121-byte header.
    ///
    /// # Errors
    ///
    /// Returns the specific [`PlotError`] corruption kind on any structural
    /// failure: bad magic, unsupported version, checksum mismatch, or an
    /// invalid field.
    pub fn parse(bytes: &[u8]) -> Result<Self, PlotError> {
        if bytes.len() != HEADER_LEN {
            return Err(PlotError::InvalidField("header must be exactly 121 bytes"));
        }
        if bytes[0..4] != MAGIC {
            return Err(PlotError::BadMagic);
        }
        let version = bytes[4];
        if version != SUPPORTED_VERSION {
            return Err(PlotError::UnsupportedVersion(version));
        }

        let expected_checksum = checksum_of(&bytes[0..CHECKSUM_PREFIX_LEN]);
        let actual_checksum = &bytes[89..121];
        if expected_checksum != actual_checksum {
            return Err(PlotError::ChecksumMismatch);
        }

        let mut plot_seed = [0u8; 32];
        plot_seed.copy_from_slice(&bytes[5..37]);

        let leaf_count = i64::from_le_bytes(bytes[37..45].try_into().unwrap_or([0; 8]));
        let leaf_size = i32::from_le_bytes(bytes[45..49].try_into().unwrap_or([0; 4]));
        let tree_height = i64::from_le_bytes(bytes[49..57].try_into().unwrap_or([0; 8]));

        let mut merkle_root = [0u8; 32];
        merkle_root.copy_from_slice(&bytes[57..89]);

        if leaf_count <= 0 {
            return Err(PlotError::InvalidField("leaf_count must be positive"));
        }
        if leaf_size != LEAF_SIZE {
            return Err(PlotError::InvalidField("leaf_size must be 32"));
        }
        if tree_height != ceil_log2(leaf_count) {
            return Err(PlotError::InvalidField("tree_height inconsistent with leaf_count"));
        }

        Ok(Self {
            version,
            plot_seed,
            leaf_count,
            leaf_size,
            tree_height,
            merkle_root,
        })
    }
}

fn checksum_of(prefix: &[u8]) -> [u8; 32] {
    let mut h = Sha256::new();
    h.update(prefix);
    h.finalize().into()
}

/// `ceil(log2(n))` for `n >= 1`; returns 0 for `n == 1`.
fn ceil_log2(n: i64) -> i64 {
    if n <= 1 {
        return 0;
    }
    let mut x = (n - 1) as u64;
    let mut bits = 0i64;
    while x > 0 {
        x >>= 1;
        bits += 1;
    }
    bits
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> PlotHeader {
        PlotHeader::new([3u8; 32], 3_355_443, [9u8; 32]).unwrap()
    }

    #[test]
    fn tree_height_matches_a_known_leaf_count() {
        // 3,355,443 leaves (a 100 MiB plot's worth) -> tree_height = 22.
        let h = sample_header();
        assert_eq!(h.tree_height, 22);
    }

    #[test]
    fn round_trip() {
        let h = sample_header();
        let bytes = h.serialize();
        let parsed = PlotHeader::parse(&bytes).unwrap();
        assert_eq!(h, parsed);
    }

    #[test]
    fn single_leaf_has_zero_height() {
        let h = PlotHeader::new([0u8; 32], 1, [0u8; 32]).unwrap();
        assert_eq!(h.tree_height, 0);
    }

    #[test]
    fn bad_magic_rejected() {
        let mut bytes = sample_header().serialize();
        bytes[0] = b'X';
        assert_eq!(PlotHeader::parse(&bytes).unwrap_err(), PlotError::BadMagic);
    }

    #[test]
    fn unsupported_version_rejected() {
        let mut bytes = sample_header().serialize();
        bytes[4] = 7;
        assert_eq!(
            PlotHeader::parse(&bytes).unwrap_err(),
            PlotError::UnsupportedVersion(7)
        );
    }

    #[test]
    fn flipping_any_bit_breaks_parse() {
        let bytes = sample_header().serialize();
        for byte_idx in 0..HEADER_LEN {
            for bit in 0..8u8 {
                let mut tampered = bytes;
                tampered[byte_idx] ^= 1 << bit;
                assert!(
                    PlotHeader::parse(&tampered).is_err(),
                    "byte {byte_idx} bit {bit} should invalidate the header"
                );
            }
        }
    }

    #[test]
    fn leaf_count_zero_is_invalid_field() {
        // Hand-build a header skeleton with leaf_count = 0 to check field
        // validation specifically (constructor rejects this too).
        assert!(PlotHeader::new([0u8; 32], 0, [0u8; 32]).is_err());
    }

    proptest::proptest! {
        #[test]
        fn round_trip_holds_for_any_valid_header(
            seed in proptest::collection::vec(proptest::prelude::any::<u8>(), 32..=32),
            root in proptest::collection::vec(proptest::prelude::any::<u8>(), 32..=32),
            leaf_count in 1i64..10_000_000,
        ) {
            let mut s = [0u8; 32];
            s.copy_from_slice(&seed);
            let mut r = [0u8; 32];
            r.copy_from_slice(&root);
            let h = PlotHeader::new(s, leaf_count, r).unwrap();
            let parsed = PlotHeader::parse(&h.serialize()).unwrap();
            proptest::prop_assert_eq!(h, parsed);
        }
    }
}
