// crates/spacetime-post-plot/src/lib.rs

//! Plot Creator (C4) and Plot Loader (C5): turning a [`PlotConfig`] into a
//! plot file on disk, and turning a plot file back into random-access and
//! sequential leaf reads.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

pub mod config;
pub mod creator;
pub mod loader;

pub use config::{recommended_soft_cap_bytes, PlotConfig, MIN_PLOT_SIZE_BYTES};
pub use creator::{create_plot, CreateProgress};
pub use loader::PlotLoader;
