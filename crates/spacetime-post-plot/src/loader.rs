// crates/spacetime-post-plot/src/loader.rs

//! Plot loader: opens a plot file, validates its header and size, and
//! exposes random-access and sequential leaf reads.

use anyhow::{Context, Result};
use spacetime_post_core::cancel::Cancel;
use spacetime_post_core::header::{PlotHeader, HEADER_LEN, LEAF_SIZE};
use spacetime_post_core::error::PlotError;
use spacetime_post_merkle::engine::StreamingMerkleBuilder;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

/// An opened, header-validated plot file.
///
/// Owns its file handle exclusively; concurrent `read_leaf`/`read_leaves`
/// calls on a *single* loader are not guaranteed safe (they share one
/// seek position), but independent loaders opened on the same path are —
/// plot files are never mutated after creation.
pub struct PlotLoader {
    file: File,
    header: PlotHeader,
}

impl PlotLoader {
    /// Open and validate `path`.
    ///
    /// # Errors
    ///
    /// Returns [`PlotError::Missing`] if the file cannot be opened,
    /// the header's own [`PlotError`] variant if parsing fails, or
    /// [`PlotError::Truncated`] if the file is shorter than the header
    /// declares.
    pub fn open(path: &Path) -> Result<Self, PlotError> {
        let mut file = File::open(path).map_err(|_| PlotError::Missing)?;
        let mut header_buf = [0u8; HEADER_LEN];
        file.read_exact(&mut header_buf)
            .map_err(|_| PlotError::Truncated {
                expected: HEADER_LEN as u64,
                actual: file
                    .metadata()
                    .map(|m| m.len())
                    .unwrap_or(0),
            })?;
        let header = PlotHeader::parse(&header_buf)?;

        let actual_len = file.metadata().map_err(|_| PlotError::Missing)?.len();
        let expected_len = header.min_file_len();
        if actual_len < expected_len {
            return Err(PlotError::Truncated {
                expected: expected_len,
                actual: actual_len,
            });
        }

        Ok(Self { file, header })
    }

    /// The validated header.
    #[must_use]
    pub fn header(&self) -> &PlotHeader {
        &self.header
    }

    fn leaf_offset(&self, index: u64) -> u64 {
        HEADER_LEN as u64 + index * (LEAF_SIZE as u64)
    }

    /// Read a single leaf by index.
    ///
    /// # Errors
    ///
    /// Returns an error if `index >= leaf_count`, or on any I/O failure
    /// (including a short read, which is always fatal — plot files are
    /// never partially readable once validated).
    pub fn read_leaf(&mut self, index: u64) -> Result<[u8; 32]> {
        if index as i64 >= self.header.leaf_count {
            anyhow::bail!("leaf index {index} out of bounds ({} leaves)", self.header.leaf_count);
        }
        self.file
            .seek(SeekFrom::Start(self.leaf_offset(index)))
            .context("seeking to leaf")?;
        let mut buf = [0u8; 32];
        self.file.read_exact(&mut buf).context("reading leaf")?;
        Ok(buf)
    }

    /// Read `count` consecutive leaves starting at `start`.
    ///
    /// # Errors
    ///
    /// Returns an error if `[start, start+count)` exceeds `leaf_count`, or
    /// on I/O failure.
    pub fn read_leaves(&mut self, start: u64, count: u64) -> Result<Vec<[u8; 32]>> {
        let end = start.checked_add(count).context("range overflow")?;
        if end as i64 > self.header.leaf_count {
            anyhow::bail!(
                "range [{start}, {end}) exceeds {} leaves",
                self.header.leaf_count
            );
        }
        self.file
            .seek(SeekFrom::Start(self.leaf_offset(start)))
            .context("seeking to range start")?;
        let mut out = Vec::with_capacity(count as usize);
        let mut buf = [0u8; 32];
        for _ in 0..count {
            self.file.read_exact(&mut buf).context("reading leaf in range")?;
            out.push(buf);
        }
        Ok(out)
    }

    /// Start a restartable, lazy, pull-based scan of every leaf: seeks to
    /// the data offset once, then the returned [`LeafScan`] reads leaves
    /// one at a time from a buffered reader as it's driven, never
    /// materializing more than one leaf at once. Chain `.with_cancel()`
    /// and/or `.with_progress()` before iterating; after the scan ends
    /// (fully consumed or abandoned early), call
    /// [`LeafScan::into_result`] to surface any I/O failure or
    /// cancellation.
    ///
    /// # Errors
    ///
    /// Returns an error if seeking to the data region fails.
    pub fn read_all_leaves(&mut self) -> Result<LeafScan<'_>> {
        let total = self.header.leaf_count as u64;
        self.file
            .seek(SeekFrom::Start(HEADER_LEN as u64))
            .context("seeking to data region")?;
        Ok(LeafScan {
            reader: BufReader::new(&mut self.file),
            index: 0,
            total,
            cancel: None,
            on_progress: None,
            io_error: None,
            cancelled: false,
        })
    }

    /// Rebuild the Merkle root from every leaf on disk and compare it to
    /// the header's committed root. Expensive (`O(N)` I/O, `O(height)`
    /// memory via the streaming scan above); callers opt in.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure.
    pub fn verify_merkle_root(&mut self) -> Result<bool> {
        let mut scan = self.read_all_leaves()?;
        let mut builder = StreamingMerkleBuilder::new();
        for leaf in &mut scan {
            builder.push(leaf);
        }
        scan.into_result()?;
        let (root, _height) = builder.finish().context("rebuilding root")?;
        Ok(root == self.header.merkle_root)
    }
}

/// A finite, non-restartable, pull-based iterator over every leaf in a
/// plot, produced by [`PlotLoader::read_all_leaves`].
///
/// Checks cooperative cancellation between items and optionally invokes a
/// progress callback with the fraction of leaves read so far, in
/// `[0, 100]`. An I/O error or cancellation stops iteration silently
/// (`next` returns `None`) rather than panicking; callers that need to
/// know why the scan ended short of `leaf_count` items call
/// [`Self::into_result`] once they're done driving it.
pub struct LeafScan<'a> {
    reader: BufReader<&'a mut File>,
    index: u64,
    total: u64,
    cancel: Option<Cancel>,
    on_progress: Option<Box<dyn FnMut(f64) + Send + 'a>>,
    io_error: Option<std::io::Error>,
    cancelled: bool,
}

impl<'a> LeafScan<'a> {
    /// Attach a cancellation token; cancellation is checked every 1024
    /// leaves (the item already in flight always completes).
    #[must_use]
    pub fn with_cancel(mut self, cancel: Cancel) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Attach a progress callback, invoked after each leaf with the
    /// fraction of the plot scanned so far, in `[0, 100]`.
    #[must_use]
    pub fn with_progress<F: FnMut(f64) + Send + 'a>(mut self, f: F) -> Self {
        self.on_progress = Some(Box::new(f));
        self
    }

    /// Number of leaves yielded so far.
    #[must_use]
    pub fn leaves_yielded(&self) -> u64 {
        self.index
    }

    /// Surface why the scan ended, if it ended early.
    ///
    /// Must be called after the scan is done being driven (fully consumed
    /// or abandoned) to distinguish "read every leaf" from "stopped after
    /// an I/O error or cancellation" — a caller that only checks the
    /// count of yielded items would otherwise mistake a truncated scan
    /// for a short plot.
    ///
    /// # Errors
    ///
    /// Returns the I/O error that stopped the scan, or reports the
    /// cancellation if no I/O error occurred but the scan was cancelled.
    pub fn into_result(self) -> Result<()> {
        if let Some(e) = self.io_error {
            return Err(e).context("reading leaf during scan");
        }
        if self.cancelled {
            anyhow::bail!("scan cancelled after {}/{} leaves", self.index, self.total);
        }
        Ok(())
    }
}

impl<'a> Iterator for LeafScan<'a> {
    type Item = [u8; 32];

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.total || self.io_error.is_some() || self.cancelled {
            return None;
        }
        if self.index % 1024 == 0 {
            if let Some(c) = &self.cancel {
                if c.is_cancelled() {
                    self.cancelled = true;
                    return None;
                }
            }
        }
        let mut buf = [0u8; 32];
        match self.reader.read_exact(&mut buf) {
            Ok(()) => {
                self.index += 1;
                if let Some(cb) = &mut self.on_progress {
                    let frac = (self.index as f64 / self.total.max(1) as f64) * 100.0;
                    cb(frac);
                }
                Some(buf)
            }
            Err(e) => {
                self.io_error = Some(e);
                None
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = usize::try_from(self.total.saturating_sub(self.index)).unwrap_or(usize::MAX);
        (n, Some(n))
    }
}
