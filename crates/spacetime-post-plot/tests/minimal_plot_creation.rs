// crates/spacetime-post-plot/tests/minimal_plot_creation.rs

//! End-to-end test: create a literal 100 MiB plot and check every header
//! field against the expected values for that size.
//!
//! Writing and reading a 100 MiB file is slow enough to be worth keeping
//! out of the default `cargo test` run; it's gated behind `#[ignore]` and
//! meant to be run explicitly (`cargo test -- --ignored`) when validating
//! a release.

use spacetime_post_plot::config::{PlotConfig, MIN_PLOT_SIZE_BYTES};
use spacetime_post_plot::creator::create_plot;
use spacetime_post_plot::loader::PlotLoader;
use tempfile::tempdir;

#[test]
#[ignore = "writes a literal 100 MiB plot file; run explicitly with --ignored"]
fn minimum_size_plot_creates_and_loads_with_expected_header() {
    let dir = tempdir().unwrap();
    let plot_path = dir.path().join("minimum.plot");

    let pubkey = [1u8; 32];
    let seed = [2u8; 32];
    let config = PlotConfig::new(MIN_PLOT_SIZE_BYTES, pubkey, seed, 0).unwrap();
    assert_eq!(config.leaf_count(), 3_355_443);

    let header = create_plot(&config, &plot_path, None, None, None).unwrap();
    assert_eq!(header.leaf_count, 3_355_443);
    assert_eq!(header.leaf_size, 32);
    assert_eq!(header.tree_height, 22);
    assert_eq!(header.version, 1);

    let expected_len = 121u64 + 3_355_443 * 32;
    assert_eq!(std::fs::metadata(&plot_path).unwrap().len(), expected_len);

    let mut loader = PlotLoader::open(&plot_path).unwrap();
    assert_eq!(loader.header().leaf_count, 3_355_443);
    assert_eq!(loader.header().leaf_size, 32);
    assert_eq!(loader.header().tree_height, 22);
    assert!(loader.verify_merkle_root().unwrap());
}

#[test]
fn plot_creation_is_deterministic_for_identical_inputs() {
    // Identical (pubkey, seed, size) must produce byte-identical files.
    // Uses a small size so this runs in the default test suite.
    let dir = tempdir().unwrap();
    let path_a = dir.path().join("a.plot");
    let path_b = dir.path().join("b.plot");

    let config = PlotConfig::new_unchecked(32 * 10_000, [9u8; 32], [8u8; 32], 0);

    create_plot(&config, &path_a, None, None, None).unwrap();
    create_plot(&config, &path_b, None, None, None).unwrap();

    let bytes_a = std::fs::read(&path_a).unwrap();
    let bytes_b = std::fs::read(&path_b).unwrap();
    assert_eq!(bytes_a, bytes_b);
}
