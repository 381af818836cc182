//! Typed queues and the work-dispatch policy.
//!
//! The dispatcher owns one bounded lock-free queue per job type. Submissions
//! are routed by the first matching type bit; worker requests drain the
//! Important queue first and then walk the worker's specialization in
//! priority order. Ordering holds within a single queue only; nothing is
//! coordinated across queues.

use crossbeam::queue::ArrayQueue;

use crate::error::SubmitError;
use crate::handle::JobHandle;
use crate::job::{JobType, NUM_JOB_TYPES};
use crate::worker::Specialization;

/// Default per-queue capacity. The queues are bounded, so a submission burst
/// beyond this surfaces as [`SubmitError::QueueFull`] rather than unbounded
/// memory growth.
pub const MAX_QUEUE_LENGTH: usize = 4096;

pub(crate) struct Dispatcher {
    queues: [ArrayQueue<JobHandle>; NUM_JOB_TYPES],
}

impl Dispatcher {
    pub(crate) fn new(queue_capacity: usize) -> Dispatcher {
        Dispatcher {
            queues: std::array::from_fn(|_| ArrayQueue::new(queue_capacity)),
        }
    }

    /// Route a job into the queue for its primary type.
    pub(crate) fn submit(&self, handle: JobHandle) -> Result<(), SubmitError> {
        let job = handle.job().ok_or(SubmitError::NullJob)?;

        let ty = if job.matches_type(JobType::Important) {
            JobType::Important
        } else if job.matches_type(JobType::IO) {
            JobType::IO
        } else if job.matches_type(JobType::Huge) {
            JobType::Huge
        } else if job.matches_type(JobType::Graphics) {
            JobType::Graphics
        } else if job.matches_type(JobType::Tiny) {
            JobType::Tiny
        } else {
            JobType::Misc
        };

        self.queues[ty as usize]
            .push(handle)
            .map_err(|_| SubmitError::QueueFull(ty))
    }

    /// Hand back the highest-priority job this specialization accepts, or
    /// None if every queue it may touch is empty.
    pub(crate) fn request(&self, specialization: &Specialization) -> Option<JobHandle> {
        // Important work is taken by everyone, ahead of any preference.
        if let Some(job) = self.try_get(JobType::Important) {
            return Some(job);
        }

        for slot in specialization.priorities {
            let Some(ty) = slot else {
                break;
            };
            if let Some(job) = self.try_get(ty) {
                return Some(job);
            }
        }

        None
    }

    pub(crate) fn try_get(&self, ty: JobType) -> Option<JobHandle> {
        self.queues[ty as usize].pop()
    }
}
