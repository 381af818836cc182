//! Parallel-for over mutable slices.
//!
//! A splitter job fans out one child per chunk, holding itself open across
//! the submissions so an instantly-finishing child cannot finalize it early.
//! [`parallel_for`] submits the splitter and cooperatively waits, which is
//! what lets the chunk jobs borrow the caller's slice through raw pointers:
//! the slice and the manager are pinned by the caller's frame until the whole
//! tree has finished.

use std::slice;
use std::thread;

use crate::error::SubmitError;
use crate::handle::JobHandle;
use crate::job::{Job, JobFunction};
use crate::manager::Manager;

/// Chunk worker: receives the owning job and its slice of the data.
pub type ParallelForFn<T> = fn(JobHandle, &mut [T]);

struct SplitterArgs<T: 'static> {
    func: ParallelForFn<T>,
    base: *mut T,
    len: usize,
    chunk: usize,
    manager: *const Manager,
}

impl<T> Clone for SplitterArgs<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for SplitterArgs<T> {}

struct ChunkArgs<T: 'static> {
    func: ParallelForFn<T>,
    base: *mut T,
    len: usize,
}

impl<T> Clone for ChunkArgs<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for ChunkArgs<T> {}

fn splitter_job<T: 'static>(job: JobHandle) {
    let args: SplitterArgs<T> = job.data();
    // SAFETY: parallel_for does not return until this tree has finished, so
    // the manager reference stays valid for every submission below.
    let manager = unsafe { &*args.manager };

    let _hold = job.block();

    let mut start = 0;
    while start < args.len {
        let len = args.chunk.min(args.len - start);
        let chunk = ChunkArgs {
            func: args.func,
            // SAFETY: start stays within the slice handed to parallel_for.
            base: unsafe { args.base.add(start) },
            len,
        };
        let child = Job::create_child_with(JobFunction::misc(chunk_job::<T>), chunk, job);
        submit_with_retry(manager, child);
        start += len;
    }
}

fn chunk_job<T: 'static>(job: JobHandle) {
    let args: ChunkArgs<T> = job.data();
    // SAFETY: the pointer and length were carved from the caller's slice and
    // chunks are disjoint, so this is the only live view of these elements.
    let chunk = unsafe { slice::from_raw_parts_mut(args.base, args.len) };
    (args.func)(job, chunk);
}

fn submit_with_retry(manager: &Manager, handle: JobHandle) {
    while let Err(SubmitError::QueueFull(_)) = manager.submit_job(handle) {
        thread::yield_now();
    }
}

/// Run `func` over `data` in chunks of `chunk_size`, one job per chunk,
/// and wait for all of them. The calling thread executes jobs while it
/// waits.
pub fn parallel_for<T: Send + 'static>(
    manager: &Manager,
    data: &mut [T],
    chunk_size: usize,
    func: ParallelForFn<T>,
) {
    assert!(chunk_size > 0, "chunk size must be at least 1");
    if data.is_empty() {
        return;
    }

    let args = SplitterArgs {
        func,
        base: data.as_mut_ptr(),
        len: data.len(),
        chunk: chunk_size,
        manager: manager as *const Manager,
    };
    let splitter = Job::create_with(JobFunction::misc(splitter_job::<T>), args);
    submit_with_retry(manager, splitter);
    manager.wait_for_job(splitter);
}
