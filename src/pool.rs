//! Preallocated ring of job records.
//!
//! Allocation walks the ring with a monotonically increasing cursor and takes
//! the first record whose counters read free. Records are recycled in place
//! when finalization drops `remaining` to the -1 sentinel with no outstanding
//! holds, so the pool never defragments and never grows.

use std::iter;
use std::sync::atomic::{AtomicUsize, Ordering};

use lazy_static::lazy_static;

use crate::job::Job;

/// Records preallocated for the process. Power of two, so the cursor can be
/// masked instead of taken modulo.
pub const POOL_SIZE: usize = 1 << 16;
const POOL_MASK: usize = POOL_SIZE - 1;

const _: () = assert!(POOL_SIZE.is_power_of_two());

pub(crate) struct JobPool {
    slots: Box<[Job]>,
    cursor: AtomicUsize,
}

impl JobPool {
    fn new() -> JobPool {
        JobPool {
            slots: iter::repeat_with(Job::empty).take(POOL_SIZE).collect(),
            cursor: AtomicUsize::new(0),
        }
    }

    /// Claim the next free record, spinning past busy ones. Saturation (no
    /// free record at all) keeps the caller spinning; a pool sized for the
    /// workload never reaches it.
    pub(crate) fn allocate(&self) -> &Job {
        loop {
            // Advance the cursor before inspecting, so concurrent allocators
            // land on distinct candidates.
            let index = self.cursor.fetch_add(1, Ordering::Relaxed) & POOL_MASK;
            let slot = &self.slots[index];
            if slot.is_free() {
                return slot;
            }
        }
    }
}

lazy_static! {
    static ref POOL: JobPool = JobPool::new();
}

/// The process-wide record pool. Every manager instance allocates from it.
pub(crate) fn global() -> &'static JobPool {
    &POOL
}
