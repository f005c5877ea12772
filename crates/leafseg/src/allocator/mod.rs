//! Per-tag segment buffering and refill.


use std::collections::VecDeque;
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tracing::warn;

use crate::{Error, Result, Segment, SegmentStore};

/// Upper bound on a consumer's slow-path wait for a refill.
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(2);

/// Consecutive store failures the refill worker absorbs before giving up;
/// one run makes at most `MAX_REFILL_FAILURES + 1` store attempts.
pub const MAX_REFILL_FAILURES: u32 = 3;

/// Segments the buffer tops out at: one being drained, one prefetched.
const BUFFER_DEPTH: usize = 2;

/// One-shot wakeup handle held by a consumer blocked on an empty buffer.
///
/// Backed by a capacity-1 channel: the signal fires at most once, and
/// firing after the consumer already woke up (or timed out and left) is
/// harmless.
struct Waiter(SyncSender<()>);

impl Waiter {
    fn pair() -> (Self, Receiver<()>) {
        let (tx, rx) = sync_channel(1);
        (Self(tx), rx)
    }

    fn notify(&self) {
        // Full or disconnected both mean the consumer no longer needs the
        // signal.
        let _ = self.0.try_send(());
    }
}

/// Mutable allocator state, all behind one mutex.
struct AllocState {
    buffer: VecDeque<Segment>,
    refilling: bool,
    waiters: Vec<Waiter>,
}

impl AllocState {
    fn remaining(&self) -> i64 {
        self.buffer.iter().map(Segment::remaining).sum()
    }

    /// Pops the next ID off the front segment, retiring the segment once
    /// spent. `None` when the buffer holds no IDs.
    ///
    /// A segment that arrives already spent (a store row misconfigured with
    /// a non-positive step) is dropped instead of served from.
    fn pop_front_id(&mut self) -> Option<i64> {
        while let Some(seg) = self.buffer.front_mut() {
            if seg.is_spent() {
                self.buffer.pop_front();
                continue;
            }
            let id = seg.take();
            if seg.is_spent() {
                self.buffer.pop_front();
            }
            return Some(id);
        }
        None
    }

    fn wake_all(&mut self) {
        for waiter in self.waiters.drain(..) {
            waiter.notify();
        }
    }
}

struct Inner<S> {
    tag: String,
    store: Arc<S>,
    state: Mutex<AllocState>,
}

/// A per-tag double-buffered range cache over a [`SegmentStore`].
///
/// At most two segments are held: the one being drained and one
/// prefetched. Consumers take IDs from the front segment; whenever the
/// buffer drops to a single segment a detached background worker tops it
/// back up through the store's transactional advance. The `refilling` flag
/// keeps that worker single-flight per tag.
///
/// All state sits behind one mutex, and the mutex is never held across a
/// store call: the worker releases it around `advance` so the fast path
/// keeps serving while the store round-trips.
///
/// The handle is cheap to clone; clones share the same buffer.
pub struct TagAllocator<S> {
    inner: Arc<Inner<S>>,
}

impl<S> Clone for TagAllocator<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: SegmentStore> TagAllocator<S> {
    pub(crate) fn new(tag: impl Into<String>, store: Arc<S>) -> Self {
        Self {
            inner: Arc::new(Inner {
                tag: tag.into(),
                store,
                state: Mutex::new(AllocState {
                    buffer: VecDeque::with_capacity(BUFFER_DEPTH),
                    refilling: false,
                    waiters: Vec::new(),
                }),
            }),
        }
    }

    /// The tag this allocator serves.
    pub fn tag(&self) -> &str {
        &self.inner.tag
    }

    /// Returns the next raw ID for this tag.
    ///
    /// Fast path: an ID is popped from the front segment without blocking.
    /// A caller that catches the buffer empty parks on a one-shot wakeup
    /// handle for at most [`WAIT_TIMEOUT`], then retries exactly once; if
    /// the buffer is still dry the call fails with
    /// [`Error::NoAvailableId`] and a later call starts the protocol over.
    ///
    /// Either way, a buffer at or below one segment triggers the
    /// single-flight background refill before the call returns.
    pub fn next_id(&self) -> Result<i64> {
        let mut state = self.inner.state.lock()?;

        let popped = state.pop_front_id();

        if state.buffer.len() <= 1 && !state.refilling {
            state.refilling = true;
            if let Err(err) = self.spawn_refill() {
                state.refilling = false;
                warn!(tag = %self.inner.tag, %err, "failed to spawn refill worker");
            }
        }

        if let Some(id) = popped {
            return Ok(id);
        }

        // Park until the refill worker signals or the wait bound expires,
        // whichever comes first.
        let (waiter, signal) = Waiter::pair();
        state.waiters.push(waiter);
        drop(state);

        let _ = signal.recv_timeout(WAIT_TIMEOUT);

        // One retry after the wake; never loop back into another wait.
        let mut state = self.inner.state.lock()?;
        state.pop_front_id().ok_or(Error::NoAvailableId)
    }

    /// IDs currently buffered in-process for this tag.
    pub fn remaining(&self) -> Result<i64> {
        Ok(self.inner.state.lock()?.remaining())
    }

    /// Spawns the detached refill worker. Called with the state lock held
    /// and `refilling` freshly set; on spawn failure the caller clears the
    /// flag again.
    fn spawn_refill(&self) -> std::io::Result<()> {
        let worker = Arc::clone(&self.inner);
        thread::Builder::new()
            .name(format!("leafseg-refill-{}", self.inner.tag))
            .spawn(move || worker.run_refill())
            .map(drop)
    }

    #[cfg(test)]
    pub(crate) fn debug_state(&self) -> (usize, bool, usize) {
        let state = self.inner.state.lock().unwrap();
        (state.buffer.len(), state.refilling, state.waiters.len())
    }
}

impl<S: SegmentStore> Inner<S> {
    /// Background top-up loop.
    ///
    /// Runs with `refilling` set and exits with it cleared, once the buffer
    /// holds two segments or the failure budget is spent. Every waiter
    /// queued at exit has been signalled: success wakes them with IDs on
    /// hand, give-up wakes them to fail fast instead of sitting out their
    /// timeout.
    fn run_refill(self: Arc<Self>) {
        let mut failures: u32 = 0;

        loop {
            {
                let Ok(mut state) = self.state.lock() else { return };
                if state.buffer.len() > 1 {
                    state.refilling = false;
                    return;
                }
            }

            // The store round-trip happens without the lock so the fast
            // path keeps serving concurrently.
            match self.store.advance(&self.tag) {
                Ok(lease) => {
                    let Ok(mut state) = self.state.lock() else { return };
                    state.buffer.push_back(Segment::new(lease.left(), lease.right()));
                    state.wake_all();
                    failures = 0;
                    if state.buffer.len() > 1 {
                        state.refilling = false;
                        return;
                    }
                }
                Err(err) => {
                    failures += 1;
                    warn!(tag = %self.tag, %err, failures, "segment refill failed");
                    if failures > MAX_REFILL_FAILURES {
                        let Ok(mut state) = self.state.lock() else { return };
                        state.wake_all();
                        state.refilling = false;
                        return;
                    }
                }
            }
        }
    }
}
