//! Job records and the completion protocol.
//!
//! A [`Job`] is a fixed-size, cache-line-aligned record holding a work
//! function, an optional completion callback, a back-reference to its parent,
//! the counters that drive fork-join completion, and an inline payload
//! buffer. Records live in a preallocated ring (see [`crate::pool`]) and are
//! recycled in place once fully finalized, so client code only ever sees them
//! through [`JobHandle`].

use std::cell::UnsafeCell;
use std::marker::PhantomData;
use std::mem;
use std::sync::atomic::{AtomicI32, AtomicI8, AtomicU8, Ordering};

#[cfg(debug_assertions)]
use std::sync::atomic::AtomicUsize;

use crate::handle::JobHandle;
use crate::pool;

/// Function executed when a job runs. The handle is passed back in so the
/// function can read its payload and attach children.
pub type JobFn = fn(JobHandle);

/// Categories a job can be tagged with. `Misc` is the absence of any tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobType {
    Tiny = 0,
    Huge = 1,
    IO = 2,
    Graphics = 3,
    Important = 4,
    Misc = 5,
}

/// Number of job types, and therefore of dispatch queues.
pub const NUM_JOB_TYPES: usize = 6;

const FLAG_TINY: u8 = 1 << JobType::Tiny as u8;
const FLAG_HUGE: u8 = 1 << JobType::Huge as u8;
const FLAG_IO: u8 = 1 << JobType::IO as u8;
const FLAG_GRAPHICS: u8 = 1 << JobType::Graphics as u8;
const FLAG_IMPORTANT: u8 = 1 << JobType::Important as u8;
const FLAG_IN_PROGRESS: u8 = FLAG_IMPORTANT << 1;

// All type bits, excluding the status bit.
const TYPE_MASK: u8 = FLAG_IN_PROGRESS - 1;

/// A work function bundled with its type tag, ready to be turned into a job.
#[derive(Clone, Copy)]
pub struct JobFunction {
    pub(crate) func: JobFn,
    pub(crate) flags: u8,
}

impl JobFunction {
    /// An untagged (`Misc`) job function.
    pub fn misc(func: JobFn) -> Self {
        JobFunction { func, flags: 0 }
    }

    /// A job function tagged with the given type.
    pub fn typed(func: JobFn, ty: JobType) -> Self {
        let flags = match ty {
            JobType::Tiny => FLAG_TINY,
            JobType::Huge => FLAG_HUGE,
            JobType::IO => FLAG_IO,
            JobType::Graphics => FLAG_GRAPHICS,
            JobType::Important => FLAG_IMPORTANT,
            JobType::Misc => 0,
        };
        JobFunction { func, flags }
    }

    pub fn tiny(func: JobFn) -> Self {
        Self::typed(func, JobType::Tiny)
    }

    pub fn huge(func: JobFn) -> Self {
        Self::typed(func, JobType::Huge)
    }

    pub fn io(func: JobFn) -> Self {
        Self::typed(func, JobType::IO)
    }

    pub fn graphics(func: JobFn) -> Self {
        Self::typed(func, JobType::Graphics)
    }

    pub fn important(func: JobFn) -> Self {
        Self::typed(func, JobType::Important)
    }
}

/// Size every job record is padded to. One record spans two 64-byte cache
/// lines, and the alignment keeps records from straddling line boundaries.
pub const TARGET_JOB_SIZE: usize = 128;

const HEADER_BYTES: usize = 2 * mem::size_of::<Option<JobFn>>() // work + callback
    + mem::size_of::<JobHandle>()                               // parent
    + mem::size_of::<AtomicI32>()                               // remaining
    + mem::size_of::<AtomicI8>()                                // holds
    + mem::size_of::<AtomicU8>();                               // flags

/// Bytes of inline payload available in each record.
pub const PAYLOAD_BYTES: usize = TARGET_JOB_SIZE - HEADER_BYTES;

const _: () = assert!(HEADER_BYTES < TARGET_JOB_SIZE, "job header exceeds the target record size");

// Compile-time bound on payload types. Referencing `OK` from a monomorphized
// accessor fails the build when `T` does not fit the inline buffer.
struct PayloadFits<T>(PhantomData<T>);

impl<T> PayloadFits<T> {
    const OK: () = assert!(
        mem::size_of::<T>() <= PAYLOAD_BYTES,
        "job payload too large, pass a pointer to the data instead"
    );
}

#[cfg(debug_assertions)]
pub(crate) static JOBS_ADDED: AtomicUsize = AtomicUsize::new(0);
#[cfg(debug_assertions)]
pub(crate) static JOBS_COMPLETED: AtomicUsize = AtomicUsize::new(0);

/// Number of jobs created but not yet finalized, process-wide. At quiescence
/// this is zero. Debug builds only.
#[cfg(debug_assertions)]
pub fn unfinished_job_count() -> usize {
    // Completed is sampled first so a creation landing between the two loads
    // cannot push the difference negative.
    let completed = JOBS_COMPLETED.load(Ordering::Relaxed);
    let added = JOBS_ADDED.load(Ordering::Relaxed);
    added.saturating_sub(completed)
}

/// A unit of work with parent-child completion coupling.
///
/// `remaining` counts unfinished sub-work: 1 for the job itself plus 1 per
/// live child. It is -1 exactly when the record is free for reuse. `holds`
/// counts outstanding keep-alive claims; finalization is suppressed while any
/// hold is live.
#[repr(C, align(128))]
pub struct Job {
    work_fn: UnsafeCell<Option<JobFn>>,
    callback_fn: UnsafeCell<Option<JobFn>>,
    parent: UnsafeCell<JobHandle>,
    remaining: AtomicI32,
    holds: AtomicI8,
    flags: AtomicU8,
    payload: UnsafeCell<[u8; PAYLOAD_BYTES]>,
}

const _: () = assert!(mem::size_of::<Job>() == TARGET_JOB_SIZE, "job record size drifted from target");

// SAFETY: the non-atomic fields are written only during allocation, before
// the handle is published to other threads (the queue's release/acquire pair
// covers submission), and by `set_callback`, which the client contract
// restricts to before the job is published for execution. All cross-thread
// mutation goes through the atomics.
unsafe impl Sync for Job {}

impl Job {
    pub(crate) const fn empty() -> Job {
        Job {
            work_fn: UnsafeCell::new(None),
            callback_fn: UnsafeCell::new(None),
            parent: UnsafeCell::new(JobHandle::null()),
            remaining: AtomicI32::new(-1),
            holds: AtomicI8::new(0),
            flags: AtomicU8::new(0),
            payload: UnsafeCell::new([0; PAYLOAD_BYTES]),
        }
    }

    /// Allocate a job from the pool with the given function.
    pub fn create(function: JobFunction) -> JobHandle {
        Self::create_child(function, JobHandle::null())
    }

    /// Allocate a job from the pool as a child of `parent`. The parent will
    /// not finalize until this job has.
    pub fn create_child(function: JobFunction, parent: JobHandle) -> JobHandle {
        let slot = pool::global().allocate();
        slot.init(function, parent);
        JobHandle::from_job(slot)
    }

    /// Allocate a job carrying `data` in its inline payload. The payload type
    /// must fit [`PAYLOAD_BYTES`]; the bound is checked at compile time.
    pub fn create_with<T: Copy>(function: JobFunction, data: T) -> JobHandle {
        Self::create_child_with(function, data, JobHandle::null())
    }

    /// Child variant of [`Job::create_with`].
    pub fn create_child_with<T: Copy>(function: JobFunction, data: T, parent: JobHandle) -> JobHandle {
        let handle = Self::create_child(function, parent);
        if let Some(job) = handle.job() {
            job.set_data(data);
        }
        handle
    }

    fn init(&self, function: JobFunction, parent: JobHandle) {
        // SAFETY: the allocator hands this slot to exactly one creator; no
        // other thread holds a live reference to a free record.
        unsafe {
            *self.work_fn.get() = Some(function.func);
            *self.callback_fn.get() = None;
            *self.parent.get() = parent;
        }
        self.holds.store(0, Ordering::Release);
        // A job can never begin life marked in-progress.
        self.flags.store(function.flags & !FLAG_IN_PROGRESS, Ordering::Release);

        // The parent now has one more piece of work that must land before it
        // may finalize.
        if let Some(parent_job) = parent.job() {
            parent_job.remaining.fetch_add(1, Ordering::AcqRel);
        }

        // Leaving the free state is the last store so the allocator cannot
        // hand out a half-initialized record.
        self.remaining.store(1, Ordering::Release);

        #[cfg(debug_assertions)]
        JOBS_ADDED.fetch_add(1, Ordering::Relaxed);
    }

    /// Execute this job on the current thread, then finalize it.
    pub(crate) fn run(&'static self) {
        // SAFETY: work_fn was written before the handle was published.
        let Some(func) = (unsafe { *self.work_fn.get() }) else {
            return;
        };

        self.flags.fetch_or(FLAG_IN_PROGRESS, Ordering::AcqRel);
        func(JobHandle::from_job(self));
        self.finish();
    }

    /// One unit of work (the job itself, a child, or a released hold) is
    /// done. The last unit to land drives full finalization: callback, parent
    /// propagation, and release of the record back to the pool.
    pub(crate) fn finish(&'static self) {
        let cached_holds = self.holds.load(Ordering::Acquire);
        let remaining = self.remaining.fetch_sub(1, Ordering::AcqRel) - 1;

        if remaining == 0 && cached_holds == 0 {
            // SAFETY: callback_fn and parent are quiescent by the time any
            // finalize can observe remaining == 0.
            let callback = unsafe { *self.callback_fn.get() };
            if let Some(callback) = callback {
                callback(JobHandle::from_job(self));
            }

            let parent = unsafe { *self.parent.get() };
            if let Some(parent_job) = parent.job() {
                parent_job.finish();
            }

            self.flags.fetch_and(!FLAG_IN_PROGRESS, Ordering::AcqRel);

            // Second decrement, to the -1 sentinel: only now may the
            // allocator recycle the slot.
            let prev = self.remaining.fetch_sub(1, Ordering::AcqRel);

            #[cfg(debug_assertions)]
            {
                JOBS_COMPLETED.fetch_add(1, Ordering::Relaxed);
                debug_assert_eq!(prev, 0, "finalized a job twice");
            }
            #[cfg(not(debug_assertions))]
            let _ = prev;
        }
    }

    /// While `completable` is false the job carries a keep-alive hold and
    /// cannot finalize. Releasing the hold is treated exactly like a child
    /// completing, so callbacks and parent propagation fire through the same
    /// path.
    pub(crate) fn set_allow_completion(&'static self, completable: bool) {
        if completable {
            self.holds.fetch_sub(1, Ordering::AcqRel);
            self.remaining.fetch_add(1, Ordering::AcqRel);
            self.finish();
        } else {
            self.holds.fetch_add(1, Ordering::AcqRel);
        }
    }

    pub(crate) fn set_callback(&self, function: JobFunction) {
        // SAFETY: per the client contract this happens before the job is
        // published for execution.
        unsafe {
            *self.callback_fn.get() = Some(function.func);
        }
    }

    /// Finished means all of this job's work, including children, has landed.
    /// The record may still be awaiting hold release or recycling.
    pub(crate) fn is_finished(&self) -> bool {
        self.remaining.load(Ordering::Acquire) <= 0
    }

    pub(crate) fn in_progress(&self) -> bool {
        self.flags.load(Ordering::Relaxed) & FLAG_IN_PROGRESS != 0
    }

    pub(crate) fn matches_type(&self, ty: JobType) -> bool {
        let flags = self.flags.load(Ordering::Relaxed);
        if ty == JobType::Misc {
            flags & TYPE_MASK == 0
        } else {
            flags & (1 << ty as u8) != 0
        }
    }

    /// Free records are the only ones the allocator may hand out.
    pub(crate) fn is_free(&self) -> bool {
        self.holds.load(Ordering::Acquire) == 0 && self.remaining.load(Ordering::Acquire) <= -1
    }

    /// Copy `data` into the inline payload. The write is unaligned; the
    /// buffer has byte alignment.
    pub(crate) fn set_data<T: Copy>(&self, data: T) {
        let () = PayloadFits::<T>::OK;
        // SAFETY: size is bounded at compile time; the creator owns the
        // record until submission.
        unsafe {
            (self.payload.get() as *mut T).write_unaligned(data);
        }
    }

    /// Copy the payload back out as `T`. Type agreement with the writer is a
    /// client contract; nothing is tagged or checked at runtime.
    pub(crate) fn data<T: Copy>(&self) -> T {
        let () = PayloadFits::<T>::OK;
        // SAFETY: size is bounded at compile time; the payload is quiescent
        // once the job is published.
        unsafe { (self.payload.get() as *const T).read_unaligned() }
    }
}
