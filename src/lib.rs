//! # jobmill - Fork-Join Job Scheduler with Typed Work Queues
//!
//! A job scheduler for expressing units of work with parent-child completion
//! coupling and executing them across a pool of worker threads with typed
//! specialization. A job is complete only when all of its descendants have
//! completed.
//!
//! ## Architecture
//!
//! - **Job records**: fixed-size, cache-line-aligned records recycled in
//!   place inside a preallocated ring pool
//! - **Handles**: copyable, non-owning views client code works through
//! - **Typed queues**: one lock-free queue per job type, drained by worker
//!   specialization priority
//! - **Workers**: a Volunteer on the invoking thread plus Primary workers on
//!   dedicated threads, with cooperative waiting instead of blocking
//!
//! ## Example
//!
//! ```no_run
//! use jobmill::{Job, JobFunction, JobHandle, Manager};
//!
//! fn hello(_job: JobHandle) {
//!     println!("hello from a job");
//! }
//!
//! let manager = Manager::new(4); // 1 volunteer + 3 dedicated workers
//!
//! let job = Job::create(JobFunction::tiny(hello));
//! manager.submit_job(job).unwrap();
//! manager.wait_for_job(job);
//! assert!(job.is().finished());
//! ```

pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod job;
pub mod manager;
pub mod parallel;
pub mod pool;
pub mod worker;

pub use dispatcher::MAX_QUEUE_LENGTH;
pub use error::SubmitError;
pub use handle::{HoldGuard, JobHandle, Props};
pub use job::{Job, JobFn, JobFunction, JobType, NUM_JOB_TYPES, PAYLOAD_BYTES, TARGET_JOB_SIZE};
pub use manager::{run_job, wait_for_job, Manager};
pub use parallel::{parallel_for, ParallelForFn};
pub use pool::POOL_SIZE;
pub use worker::{Mode, Specialization, Worker};

#[cfg(debug_assertions)]
pub use job::unfinished_job_count;
