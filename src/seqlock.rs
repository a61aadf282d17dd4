use std::sync::atomic::{AtomicU64, Ordering};

/// A reader's sampled generation, validated once after the read completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadHandle(u64);

impl ReadHandle {
    /// True when no write was in progress at sampling time. An odd handle is
    /// allowed by `begin_read`; validation will simply fail it.
    pub fn is_quiescent(&self) -> bool {
        self.0 % 2 == 0
    }
}

/// Single-writer / many-reader generation counter shared across every table
/// of one open database.
///
/// The counter is even exactly when no write is in progress. Writers bracket
/// each logical mutation with `begin_write`/`end_write`; a second concurrent
/// writer is a caller bug the lock does not detect. Readers sample a handle,
/// traverse without blocking, then re-validate; on a failed validation the
/// whole read is discarded and retried.
#[derive(Debug, Default)]
pub struct SequenceLock {
    counter: AtomicU64,
}

impl SequenceLock {
    pub fn new() -> Self {
        SequenceLock {
            counter: AtomicU64::new(0),
        }
    }

    /// Mark a write in progress (counter becomes odd).
    pub fn begin_write(&self) {
        self.counter.fetch_add(1, Ordering::AcqRel);
    }

    /// Mark the write finished (counter becomes even again). Must pair with
    /// exactly one `begin_write`; nested writes are not supported.
    pub fn end_write(&self) {
        self.counter.fetch_add(1, Ordering::AcqRel);
    }

    /// Sample the current generation.
    pub fn begin_read(&self) -> ReadHandle {
        ReadHandle(self.counter.load(Ordering::Acquire))
    }

    /// A read is valid iff the counter is unchanged since sampling and no
    /// write was in progress at that instant.
    pub fn is_read_valid(&self, handle: ReadHandle) -> bool {
        handle.is_quiescent() && self.counter.load(Ordering::Acquire) == handle.0
    }
}
