mod sqlite;

pub use sqlite::*;

use crate::Result;

/// A freshly advanced window: the store moved `max_id` forward by `step`
/// and granted `[max_id - step, max_id)` to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentLease {
    /// The post-advance counter value; exclusive upper bound of the window.
    pub max_id: i64,
    /// Window size configured for the tag.
    pub step: i64,
}

impl SegmentLease {
    /// Inclusive lower bound of the granted window.
    pub fn left(&self) -> i64 {
        self.max_id - self.step
    }

    /// Exclusive upper bound of the granted window.
    pub fn right(&self) -> i64 {
        self.max_id
    }
}

/// The transactional advance primitive backing every refill.
///
/// Implementations must serialize concurrent `advance` calls for the same
/// tag through the store's own row-level write so that every caller
/// receives a disjoint window, and must bound each call with a deadline
/// rather than hanging on a stuck store.
pub trait SegmentStore: Send + Sync + 'static {
    /// Atomically advances `max_id` by `step` for `tag` and returns the
    /// post-update values. An unknown tag fails with
    /// [`Error::TagNotFound`](crate::Error::TagNotFound).
    fn advance(&self, tag: &str) -> Result<SegmentLease>;
}
