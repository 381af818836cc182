//! Workers: thread-bound executors with a typed specialization.
//!
//! A Primary worker owns a dedicated thread and blocks on its condition
//! variable when every queue it accepts is empty. The Volunteer worker shares
//! the thread that built the manager, so it only ever yields when idle and
//! contributes cycles through the cooperative wait.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, ThreadId};

use tracing::trace;

use crate::dispatcher::Dispatcher;
use crate::handle::JobHandle;
use crate::job::{JobType, NUM_JOB_TYPES};

/// How a worker relates to its thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Dedicated thread; sleeps on a condition variable when idle.
    Primary,
    /// Runs on the invoking thread; yields instead of blocking when idle.
    Volunteer,
}

/// Ordered list of job types a worker is willing to request. A `None` slot
/// terminates the list early; Important work is always requested first and
/// never appears here.
#[derive(Clone, Copy, Debug)]
pub struct Specialization {
    pub(crate) priorities: [Option<JobType>; NUM_JOB_TYPES - 1],
}

impl Specialization {
    /// Takes any work, preferring large non-blocking jobs.
    pub const NONE: Specialization = Specialization {
        priorities: [
            Some(JobType::Huge),
            Some(JobType::Graphics),
            Some(JobType::Misc),
            Some(JobType::IO),
            Some(JobType::Tiny),
        ],
    };

    /// Soaks up blocking work so the generalists rarely have to.
    pub const IO: Specialization = Specialization {
        priorities: [
            Some(JobType::IO),
            Some(JobType::Huge),
            Some(JobType::Misc),
            Some(JobType::Graphics),
            Some(JobType::Tiny),
        ],
    };

    /// Prefers graphics work and stays small otherwise, to always be ready
    /// for more graphics.
    pub const GRAPHICS: Specialization = Specialization {
        priorities: [Some(JobType::Graphics), Some(JobType::Tiny), Some(JobType::Misc), None, None],
    };

    /// Only quick work; never accepts anything that could block the thread.
    pub const REAL_TIME: Specialization = Specialization {
        priorities: [Some(JobType::Tiny), Some(JobType::Misc), Some(JobType::Graphics), None, None],
    };
}

pub struct Worker {
    dispatcher: Arc<Dispatcher>,
    mode: Mode,
    specialization: Specialization,
    thread_id: ThreadId,
    keep_working: AtomicBool,
    is_working: AtomicBool,
    // Each worker pairs its own mutex with its own condvar; the manager
    // "broadcasts" by notifying every worker. The flag absorbs a wake-up
    // that lands between a failed request and the wait.
    idle: Mutex<bool>,
    wakeup: Condvar,
}

impl Worker {
    /// Build a worker bound to the calling thread.
    pub(crate) fn new(dispatcher: Arc<Dispatcher>, mode: Mode, specialization: Specialization) -> Worker {
        Worker {
            dispatcher,
            mode,
            specialization,
            thread_id: thread::current().id(),
            // Born willing: a stop request must stick even when it races the
            // worker thread into its loop.
            keep_working: AtomicBool::new(true),
            is_working: AtomicBool::new(false),
            idle: Mutex::new(false),
            wakeup: Condvar::new(),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    pub fn is_working(&self) -> bool {
        self.is_working.load(Ordering::Acquire)
    }

    /// Work until told to stop. Primary workers call this as their thread
    /// body.
    pub(crate) fn start(&self) {
        trace!(mode = ?self.mode, thread = ?self.thread_id, "worker starting");
        self.is_working.store(true, Ordering::Release);

        while self.keep_working.load(Ordering::Acquire) {
            self.do_single_job();
        }

        self.is_working.store(false, Ordering::Release);
        trace!(mode = ?self.mode, thread = ?self.thread_id, "worker stopped");
    }

    /// Take and complete one job, or go idle in the mode-appropriate way.
    fn do_single_job(&self) {
        if !self.try_run_one() {
            match self.mode {
                // Step aside so whatever shares this thread can breathe.
                Mode::Volunteer => thread::yield_now(),
                Mode::Primary => self.sleep_until_notified(),
            }
        }
    }

    /// Fetch and run a single accepted job. False when every queue this
    /// worker accepts is empty.
    fn try_run_one(&self) -> bool {
        match self.dispatcher.request(&self.specialization) {
            Some(job) => {
                job.run();
                true
            }
            None => false,
        }
    }

    fn sleep_until_notified(&self) {
        let mut pending = self.idle.lock().unwrap();
        while !*pending && self.keep_working.load(Ordering::Acquire) {
            pending = self.wakeup.wait(pending).unwrap();
        }
        *pending = false;
    }

    /// Wake the worker if it is sleeping; remember the wake-up if it is not.
    pub(crate) fn notify(&self) {
        let mut pending = self.idle.lock().unwrap();
        *pending = true;
        self.wakeup.notify_one();
    }

    /// Execute other jobs until `target` finishes.
    ///
    /// The hold taken here is what makes the wait safe: without it, another
    /// worker could finalize and recycle `target` between this loop's exit
    /// check and the caller observing completion.
    pub fn work_while_waiting_for(&self, target: JobHandle) {
        // Nothing to wait for; a hold taken now could race a finalize that
        // is already past its hold snapshot.
        if target.is().null() || target.is().finished() {
            return;
        }

        let was_working = self.is_working.swap(true, Ordering::AcqRel);
        target.block_completion();

        while target.is_not().finished() {
            // Never sleep in here: the wake-up for `target` finishing is its
            // finalize, not a submission.
            if !self.try_run_one() {
                thread::yield_now();
            }
        }

        target.unblock_completion();
        self.is_working.store(was_working, Ordering::Release);
    }

    /// Execute other jobs until an external condition flips true.
    pub fn work_while_waiting_for_flag(&self, condition: &AtomicBool) {
        let was_working = self.is_working.swap(true, Ordering::AcqRel);

        while !condition.load(Ordering::Acquire) {
            if !self.try_run_one() {
                thread::yield_now();
            }
        }

        self.is_working.store(was_working, Ordering::Release);
    }

    /// Ask the worker to wind down once its current task completes.
    pub(crate) fn stop_after_current_task(&self) {
        self.keep_working.store(false, Ordering::Release);
    }

    /// Stop and wait until the worker has actually gone quiet.
    pub(crate) fn stop(&self) {
        self.stop_after_current_task();
        self.notify();
        while self.is_working.load(Ordering::Acquire) {
            thread::yield_now();
        }
    }
}
