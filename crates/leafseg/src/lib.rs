//! Leaf-segment ID allocation.
//!
//! A central relational store keeps one continuously advancing counter per
//! business tag. Processes fetch ID ranges ("segments") in bulk through a
//! transactional advance and serve individual IDs out of an in-process
//! double buffer, so the store sees one write per `step` IDs instead of one
//! per ID.
//!
//! The crate is built from small pieces that compose into [`IdAllocator`],
//! the service-facing API:
//!
//! - [`Segment`]: a half-open `[left, right)` window with a consumption
//!   cursor.
//! - [`TagAllocator`]: the per-tag double buffer, its background refill
//!   worker, and the bounded-wait protocol for consumers that catch the
//!   buffer empty.
//! - [`Registry`]: the process-wide tag map, created lazily on first use.
//! - [`SegmentStore`]: the transactional advance primitive, with
//!   [`SqliteSegmentStore`] as the shipped implementation.
//! - [`Composer`]: the optional wall-clock post-processing step applied to
//!   raw sequence IDs.
//!
//! IDs are monotone within one process (segments are appended in
//! store-advance order and drained front-to-back). Across processes the
//! store's row transaction guarantees disjoint windows but no interleaving
//! order. Segment state is never persisted: IDs left in a partially
//! consumed window at shutdown are skipped for good, trading density for
//! availability.

mod allocator;
mod compose;
mod error;
mod registry;
mod segment;
mod store;
mod time;

pub use crate::allocator::*;
pub use crate::compose::*;
pub use crate::error::*;
pub use crate::registry::*;
pub use crate::segment::*;
pub use crate::store::*;
pub use crate::time::*;
