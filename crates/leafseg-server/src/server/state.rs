//! Shared per-process service state.

use leafseg::{IdAllocator, SqliteSegmentStore, WallClock};
use std::sync::Arc;

/// The concrete allocator stack served over HTTP.
pub type Alloc = IdAllocator<SqliteSegmentStore, WallClock>;

/// State handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub alloc: Arc<Alloc>,
}

impl AppState {
    pub fn new(alloc: Arc<Alloc>) -> Self {
        Self { alloc }
    }
}
