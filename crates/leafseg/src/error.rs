use std::sync::{MutexGuard, PoisonError};

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for segment allocation.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The store has no row for the requested tag. Fatal for the current
    /// request; an operator fixes it by inserting the row.
    #[error("tag not found: {tag}")]
    TagNotFound { tag: String },

    /// The store transaction failed: connection loss, lock contention past
    /// the deadline, or any other driver-level fault. The refill worker
    /// counts these toward its attempt budget.
    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// A table name that is not a bare SQL identifier was supplied at store
    /// construction.
    #[error("invalid table name: {table:?}")]
    InvalidTable { table: String },

    /// The buffer is empty and the bounded wait expired or the refill
    /// worker gave up. The allocator stays usable; a later call re-triggers
    /// refill.
    #[error("no available id")]
    NoAvailableId,

    /// A mutex guarding allocator state was poisoned by a panicking thread.
    #[error("lock poisoned")]
    LockPoisoned,
}

// Convert all poisoned lock errors to a simplified `LockPoisoned`
impl<T> From<PoisonError<MutexGuard<'_, T>>> for Error {
    fn from(_: PoisonError<MutexGuard<'_, T>>) -> Self {
        Error::LockPoisoned
    }
}
