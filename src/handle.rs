//! Client-facing job handles.
//!
//! A [`JobHandle`] is a copyable, non-owning view of a record in the pool.
//! Storage always belongs to the pool; a handle only grants access. The
//! distinguished null handle is observable through [`Props::null`] and makes
//! every other operation a harmless no-op or `false`.

use crate::job::{Job, JobFunction, JobType};

/// Stable identifier granting access to a job record. Copies share the same
/// record.
///
/// Handles must not outlive their record's recycle: once a job has fully
/// finalized (and any holds are released), the pool may reuse the slot and a
/// retained handle would observe an unrelated job. Handles are not
/// generation-tagged; staying inside that window is a client contract.
#[derive(Clone, Copy)]
pub struct JobHandle {
    job: Option<&'static Job>,
}

impl JobHandle {
    /// The distinguished handle that references no job.
    pub const fn null() -> JobHandle {
        JobHandle { job: None }
    }

    pub(crate) fn from_job(job: &'static Job) -> JobHandle {
        JobHandle { job: Some(job) }
    }

    pub(crate) fn job(&self) -> Option<&'static Job> {
        self.job
    }

    /// Affirmative predicates: `handle.is().finished()` and friends.
    pub fn is(&self) -> Props {
        Props { handle: *self, negated: false }
    }

    /// Negated mirror of [`JobHandle::is`]: `handle.is_not().finished()`.
    pub fn is_not(&self) -> Props {
        Props { handle: *self, negated: true }
    }

    /// Execute the job synchronously on the calling thread. Returns false if
    /// the handle is null or the job has already finished.
    pub fn run(&self) -> bool {
        match self.job {
            Some(job) if !job.is_finished() => {
                job.run();
                true
            }
            _ => false,
        }
    }

    /// Install a callback to run on the completing worker immediately after
    /// finalization. Must be called before the job runs; returns false if the
    /// handle is null or the job has already finished.
    pub fn set_callback(&self, function: JobFunction) -> bool {
        match self.job {
            Some(job) if !job.is_finished() => {
                job.set_callback(function);
                true
            }
            _ => false,
        }
    }

    /// Place a keep-alive hold: the job will not finalize until a matching
    /// [`JobHandle::unblock_completion`]. No-op on a null handle.
    pub fn block_completion(&self) {
        if let Some(job) = self.job {
            job.set_allow_completion(false);
        }
    }

    /// Release one hold. Release re-enters finalization exactly as if a child
    /// had completed, so the last release can finish the job.
    pub fn unblock_completion(&self) {
        if let Some(job) = self.job {
            job.set_allow_completion(true);
        }
    }

    /// Scoped hold: blocks completion now, unblocks when the guard drops.
    #[must_use = "the hold is released as soon as the guard is dropped"]
    pub fn block(&self) -> HoldGuard {
        self.block_completion();
        HoldGuard { handle: *self }
    }

    /// Copy the inline payload out as `T`.
    ///
    /// The payload is raw bytes; `T` must be the type the creator stored.
    /// Panics on a null handle.
    pub fn data<T: Copy>(&self) -> T {
        self.job.expect("payload read through a null job handle").data()
    }
}

/// Predicate view over a handle, in plain or negated form.
///
/// On a null handle, `null()` reports the truth and every other predicate
/// answers as if asked about nothing: plain form false, negated form true.
#[derive(Clone, Copy)]
pub struct Props {
    handle: JobHandle,
    negated: bool,
}

impl Props {
    fn answer(&self, plain: bool) -> bool {
        self.negated != plain
    }

    pub fn null(&self) -> bool {
        self.answer(self.handle.job.is_none())
    }

    pub fn finished(&self) -> bool {
        self.answer(self.handle.job.map(Job::is_finished).unwrap_or(false))
    }

    pub fn running(&self) -> bool {
        self.answer(self.handle.job.map(Job::in_progress).unwrap_or(false))
    }

    pub fn of_type(&self, ty: JobType) -> bool {
        self.answer(self.handle.job.map(|job| job.matches_type(ty)).unwrap_or(false))
    }
}

/// RAII hold on a job, taken with [`JobHandle::block`].
pub struct HoldGuard {
    handle: JobHandle,
}

impl Drop for HoldGuard {
    fn drop(&mut self) {
        self.handle.unblock_completion();
    }
}
