//! Job record and handle behavior, exercised synchronously with
//! `JobHandle::run` so no workers are involved.

use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};

use jobmill::{Job, JobFunction, JobHandle, JobType, TARGET_JOB_SIZE};

#[test]
fn size_verification() {
    assert_eq!(mem::size_of::<Job>(), TARGET_JOB_SIZE, "job record was the wrong size");
}

#[test]
fn create_leaves_the_job_unstarted() {
    fn work(_job: JobHandle) {}

    let job = Job::create(JobFunction::tiny(work));
    assert!(job.is_not().finished(), "job reads finished before it has run");
    assert!(job.is_not().running(), "job reads running before it has run");
    assert!(job.is_not().null());
    job.run();
}

#[test]
fn run_executes_the_work_and_finishes() {
    static RAN: AtomicBool = AtomicBool::new(false);
    static WAS_RUNNING: AtomicBool = AtomicBool::new(false);
    fn work(job: JobHandle) {
        RAN.store(true, Ordering::SeqCst);
        // The in-progress bit is visible from inside the work function.
        WAS_RUNNING.store(job.is().running(), Ordering::SeqCst);
    }

    let job = Job::create(JobFunction::tiny(work));
    assert!(!RAN.load(Ordering::SeqCst), "job executed prematurely");
    assert!(job.is_not().finished());

    assert!(job.run());

    assert!(RAN.load(Ordering::SeqCst), "job ran but did not execute its work");
    assert!(WAS_RUNNING.load(Ordering::SeqCst), "job did not read as running during execution");
    assert!(job.is().finished(), "job ran but is not marked finished");
    assert!(job.is_not().running(), "job finished but still reads in progress");
}

#[test]
fn parent_waits_for_its_child() {
    static PARENT_RAN: AtomicBool = AtomicBool::new(false);
    static CHILD_RAN: AtomicBool = AtomicBool::new(false);
    fn parent_work(_job: JobHandle) {
        PARENT_RAN.store(true, Ordering::SeqCst);
    }
    fn child_work(_job: JobHandle) {
        CHILD_RAN.store(true, Ordering::SeqCst);
    }

    let parent = Job::create(JobFunction::tiny(parent_work));
    let child = Job::create_child(JobFunction::huge(child_work), parent);

    assert!(parent.is_not().finished());
    assert!(child.is_not().finished());

    parent.run();

    // The parent has executed but cannot finish while its child is live.
    assert!(PARENT_RAN.load(Ordering::SeqCst));
    assert!(parent.is_not().finished(), "parent finished before its child");
    assert!(!CHILD_RAN.load(Ordering::SeqCst));

    child.run();

    assert!(CHILD_RAN.load(Ordering::SeqCst));
    assert!(child.is().finished());
    assert!(parent.is().finished(), "parent not finished after its last child");
}

#[test]
fn callback_runs_after_completion() {
    static WORK_RAN: AtomicBool = AtomicBool::new(false);
    static CALLBACK_RAN: AtomicBool = AtomicBool::new(false);
    fn work(_job: JobHandle) {
        WORK_RAN.store(true, Ordering::SeqCst);
    }
    fn callback(_job: JobHandle) {
        CALLBACK_RAN.store(true, Ordering::SeqCst);
    }

    let job = Job::create(JobFunction::tiny(work));
    assert!(job.set_callback(JobFunction::huge(callback)));
    assert!(!CALLBACK_RAN.load(Ordering::SeqCst), "callback executed prematurely");

    job.run();

    assert!(WORK_RAN.load(Ordering::SeqCst));
    assert!(CALLBACK_RAN.load(Ordering::SeqCst), "job ran but did not execute its callback");
}

#[test]
fn integer_payload_round_trips() {
    static GOT_DATA: AtomicBool = AtomicBool::new(false);
    fn work(job: JobHandle) {
        GOT_DATA.store(job.data::<i32>() == 4, Ordering::SeqCst);
    }

    let job = Job::create_with(JobFunction::io(work), 4_i32);
    assert!(job.is_not().finished());

    job.run();

    assert!(GOT_DATA.load(Ordering::SeqCst), "work function did not receive its payload");
    assert!(job.is().finished());
}

#[test]
fn float_payload_round_trips() {
    static GOT_DATA: AtomicBool = AtomicBool::new(false);
    fn work(job: JobHandle) {
        GOT_DATA.store(job.data::<f32>() == 25.12, Ordering::SeqCst);
    }

    let job = Job::create_with(JobFunction::graphics(work), 25.12_f32);
    job.run();

    assert!(GOT_DATA.load(Ordering::SeqCst), "work function received the wrong payload");
    assert!(job.is().finished());
}

#[test]
fn type_tags_are_exclusive() {
    fn work(_job: JobHandle) {}

    let tiny = Job::create(JobFunction::tiny(work));
    let huge = Job::create(JobFunction::huge(work));
    let untagged = Job::create(JobFunction::misc(work));

    assert!(tiny.is().of_type(JobType::Tiny));
    assert!(tiny.is_not().of_type(JobType::Huge));
    assert!(tiny.is_not().of_type(JobType::Misc));

    assert!(huge.is().of_type(JobType::Huge));
    assert!(huge.is_not().of_type(JobType::Tiny));
    assert!(huge.is_not().of_type(JobType::Misc));

    assert!(untagged.is().of_type(JobType::Misc));
    assert!(untagged.is_not().of_type(JobType::Tiny));
    assert!(untagged.is_not().of_type(JobType::Huge));

    tiny.run();
    huge.run();
    untagged.run();
}

#[test]
fn hold_defers_finalization_until_release() {
    static CALLBACK_RAN: AtomicBool = AtomicBool::new(false);
    fn work(_job: JobHandle) {}
    fn callback(_job: JobHandle) {
        CALLBACK_RAN.store(true, Ordering::SeqCst);
    }

    let job = Job::create(JobFunction::tiny(work));
    job.set_callback(JobFunction::tiny(callback));

    job.block_completion();
    job.run();

    // The work has landed but the hold keeps finalization (and with it the
    // callback) pending.
    assert!(!CALLBACK_RAN.load(Ordering::SeqCst), "callback fired while a hold was outstanding");

    job.unblock_completion();
    assert!(CALLBACK_RAN.load(Ordering::SeqCst), "releasing the last hold did not finalize");
    assert!(job.is().finished());
}

#[test]
fn balanced_hold_pair_is_a_no_op_before_running() {
    fn work(_job: JobHandle) {}

    let job = Job::create(JobFunction::tiny(work));
    job.block_completion();
    job.unblock_completion();

    // The pair nets out; the job still runs and finishes normally.
    assert!(job.is_not().finished());
    assert!(job.run());
    assert!(job.is().finished());
}
