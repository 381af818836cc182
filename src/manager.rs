//! Worker lifecycle and job routing.
//!
//! The manager owns the dispatcher and the worker set. The first worker is a
//! Volunteer on the thread that called [`Manager::new`]; every further worker
//! is a Primary on its own thread. Stopping is cooperative: workers are asked
//! to finish their current task, woken if asleep, and joined.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle, ThreadId};

use lazy_static::lazy_static;
use tracing::{debug, info};

use crate::dispatcher::{Dispatcher, MAX_QUEUE_LENGTH};
use crate::error::SubmitError;
use crate::handle::JobHandle;
use crate::worker::{Mode, Specialization, Worker};

// Specializations handed to primary workers, round-robin. None appears twice
// to weight generalists 2:1 against the specialists.
const PRIMARY_SPECS: [Specialization; 4] = [
    Specialization::NONE,
    Specialization::NONE,
    Specialization::GRAPHICS,
    Specialization::IO,
];

pub struct Manager {
    dispatcher: Arc<Dispatcher>,
    workers: Arc<Mutex<Vec<Arc<Worker>>>>,
    threads: Mutex<Vec<JoinHandle<()>>>,
    workers_working: Arc<AtomicBool>,
    primary_counter: AtomicUsize,
    num_workers: usize,
    pin_workers: bool,
}

impl Manager {
    /// Create a manager and eagerly start its workers. `num_workers == 0`
    /// means one worker per hardware thread. The calling thread becomes the
    /// Volunteer worker.
    pub fn new(num_workers: usize) -> Manager {
        Self::build(num_workers, false)
    }

    /// Like [`Manager::new`], but pins each primary worker to a core.
    pub fn with_affinity(num_workers: usize) -> Manager {
        Self::build(num_workers, true)
    }

    fn build(num_workers: usize, pin_workers: bool) -> Manager {
        let num_workers = if num_workers == 0 {
            thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
        } else {
            num_workers
        };

        let manager = Manager {
            dispatcher: Arc::new(Dispatcher::new(MAX_QUEUE_LENGTH)),
            workers: Arc::new(Mutex::new(Vec::with_capacity(num_workers))),
            threads: Mutex::new(Vec::new()),
            workers_working: Arc::new(AtomicBool::new(false)),
            primary_counter: AtomicUsize::new(0),
            num_workers,
            pin_workers,
        };
        manager.start_workers();
        manager
    }

    /// The process-wide manager, constructed with default sizing on first
    /// access and alive for the rest of the process.
    pub fn instance() -> &'static Manager {
        lazy_static! {
            static ref INSTANCE: Manager = Manager::new(0);
        }
        &INSTANCE
    }

    /// Spin up the worker set. The constructor calls this; it is only needed
    /// again after an explicit [`Manager::stop_workers`].
    pub fn start_workers(&self) {
        if self.workers_working.swap(true, Ordering::AcqRel) {
            return;
        }

        info!(num_workers = self.num_workers, "starting workers");

        // In a one-worker setup the volunteer has to take anything or
        // everything else starves.
        let volunteer_spec = if self.num_workers > 1 {
            Specialization::REAL_TIME
        } else {
            Specialization::NONE
        };
        let volunteer = Arc::new(Worker::new(
            Arc::clone(&self.dispatcher),
            Mode::Volunteer,
            volunteer_spec,
        ));
        self.workers.lock().unwrap().push(volunteer);

        let core_ids = if self.pin_workers {
            core_affinity::get_core_ids().unwrap_or_default()
        } else {
            Vec::new()
        };

        let mut threads = self.threads.lock().unwrap();
        for index in 1..self.num_workers {
            let spec_index = self.primary_counter.fetch_add(1, Ordering::Relaxed);
            let specialization = PRIMARY_SPECS[spec_index % PRIMARY_SPECS.len()];
            let dispatcher = Arc::clone(&self.dispatcher);
            let workers = Arc::clone(&self.workers);
            let working = Arc::clone(&self.workers_working);
            let core_id = core_ids.get((index - 1) % core_ids.len().max(1)).copied();

            let handle = thread::Builder::new()
                .name(format!("jobmill-worker-{index}"))
                .spawn(move || {
                    if let Some(core_id) = core_id {
                        core_affinity::set_for_current(core_id);
                    }

                    let worker = Arc::new(Worker::new(dispatcher, Mode::Primary, specialization));
                    workers.lock().unwrap().push(Arc::clone(&worker));

                    // A shutdown that raced our registration is observed
                    // here; registered workers are always stopped explicitly.
                    if working.load(Ordering::Acquire) {
                        worker.start();
                    }
                })
                .expect("failed to spawn a worker thread");
            threads.push(handle);
        }
    }

    /// Stop every worker, wake the sleepers so they notice, and join the
    /// worker threads.
    pub fn stop_workers(&self) {
        if !self.workers_working.swap(false, Ordering::AcqRel) {
            return;
        }

        debug!("stopping workers");

        // Snapshot the registry instead of holding its lock: a worker still
        // finishing a job may need the lock (submit_job broadcasts through
        // it), and spinning on that worker while holding it would deadlock.
        let workers: Vec<Arc<Worker>> = self.workers.lock().unwrap().clone();
        for worker in &workers {
            worker.stop_after_current_task();
        }
        // Sleeping workers need the nudge to observe the stop flag.
        for worker in &workers {
            worker.notify();
        }
        for worker in &workers {
            worker.stop();
        }

        let threads: Vec<_> = self.threads.lock().unwrap().drain(..).collect();
        for handle in threads {
            let _ = handle.join();
        }

        self.workers.lock().unwrap().clear();
        info!("workers stopped");
    }

    /// Route a job to the queue for its primary type and wake every sleeping
    /// worker. Broadcast is deliberate: not every worker accepts every queue.
    pub fn submit_job(&self, handle: JobHandle) -> Result<(), SubmitError> {
        self.dispatcher.submit(handle)?;

        for worker in self.workers.lock().unwrap().iter() {
            worker.notify();
        }
        Ok(())
    }

    /// Cooperatively wait for `handle` on this thread: keep executing other
    /// jobs until it finishes. Never blocks the scheduler.
    pub fn wait_for_job(&self, handle: JobHandle) {
        if let Some(worker) = self.this_threads_worker() {
            worker.work_while_waiting_for(handle);
            return;
        }

        // Threads without a registered worker still pitch in rather than
        // spin: take anything, like a one-worker volunteer would.
        if handle.is().null() || handle.is().finished() {
            return;
        }
        handle.block_completion();
        while handle.is_not().finished() {
            match self.dispatcher.request(&Specialization::NONE) {
                Some(job) => {
                    job.run();
                }
                None => thread::yield_now(),
            }
        }
        handle.unblock_completion();
    }

    /// The worker bound to the given thread, if any.
    // TODO: replace the linear scan with a thread-id map if worker counts grow
    // beyond a few dozen.
    pub fn worker_for_thread(&self, thread_id: ThreadId) -> Option<Arc<Worker>> {
        self.workers
            .lock()
            .unwrap()
            .iter()
            .find(|worker| worker.thread_id() == thread_id)
            .cloned()
    }

    /// The worker bound to the calling thread, if any.
    pub fn this_threads_worker(&self) -> Option<Arc<Worker>> {
        self.worker_for_thread(thread::current().id())
    }

    pub fn num_workers(&self) -> usize {
        self.num_workers
    }
}

impl Drop for Manager {
    fn drop(&mut self) {
        self.stop_workers();
    }
}

/// Submit a job to the process-wide manager.
pub fn run_job(handle: JobHandle) -> Result<(), SubmitError> {
    Manager::instance().submit_job(handle)
}

/// Cooperatively wait for a job via the process-wide manager.
pub fn wait_for_job(handle: JobHandle) {
    Manager::instance().wait_for_job(handle)
}
