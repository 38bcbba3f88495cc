// crates/spacetime-post-core/src/cancel.rs

//! Cooperative cancellation token shared by generators, scanners, and the
//! streaming Merkle builder.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cheap, cloneable flag checked between work items.
///
/// Cloning shares the same underlying flag; cancelling any clone cancels
/// all of them. There is no way to "uncancel" a token — callers that need
/// a fresh run construct a new one.
#[derive(Clone, Debug, Default)]
pub struct Cancel(Arc<AtomicBool>);

impl Cancel {
    /// Construct a token that is not yet cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Signal cancellation to every clone of this token.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Returns `true` if [`cancel`](Self::cancel) has been called on any clone.
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
