//! Throughput benchmarks using criterion.
//!
//! Measures fan-out throughput for a burst of tiny jobs under a single held
//! parent, and the chunked parallel-for layer over a large slice.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use jobmill::{parallel_for, Job, JobFunction, JobHandle, Manager, SubmitError};

const JOB_COUNT: usize = 10_000;

fn spin_job(_job: JobHandle) {
    std::hint::black_box(1 + 1);
}

fn submit_with_retry(manager: &Manager, job: JobHandle) {
    loop {
        match manager.submit_job(job) {
            Ok(()) => return,
            Err(SubmitError::QueueFull(_)) => std::thread::yield_now(),
            Err(other) => panic!("unexpected submission failure: {other}"),
        }
    }
}

/// Burst-submit JOB_COUNT tiny jobs under one held parent, then wait.
fn bench_fan_out(c: &mut Criterion) {
    let num_threads = num_cpus::get();
    let manager = Manager::new(num_threads);

    // Warmup
    for _ in 0..100 {
        let job = Job::create(JobFunction::tiny(spin_job));
        manager.submit_job(job).unwrap();
        manager.wait_for_job(job);
    }

    let mut group = c.benchmark_group("throughput");
    group.throughput(Throughput::Elements(JOB_COUNT as u64));
    group.sample_size(10);

    group.bench_function(BenchmarkId::new("fan_out", num_threads), |b| {
        b.iter(|| {
            let parent = Job::create(JobFunction::tiny(spin_job));
            parent.block_completion();
            manager.submit_job(parent).unwrap();

            for _ in 1..JOB_COUNT {
                let child = Job::create_child(JobFunction::tiny(spin_job), parent);
                submit_with_retry(&manager, child);
            }
            parent.unblock_completion();

            manager.wait_for_job(parent);
        })
    });

    group.finish();
}

/// Chunked transform over a slice, one job per chunk.
fn bench_parallel_for(c: &mut Criterion) {
    const ELEMENTS: usize = 1 << 20;

    fn scale(_job: JobHandle, chunk: &mut [u64]) {
        for value in chunk {
            *value = std::hint::black_box(*value * 3 + 1);
        }
    }

    let num_threads = num_cpus::get();
    let manager = Manager::new(num_threads);
    let mut data = vec![1_u64; ELEMENTS];

    let mut group = c.benchmark_group("parallel_for");
    group.throughput(Throughput::Elements(ELEMENTS as u64));
    group.sample_size(10);

    for chunk_size in [1 << 10, 1 << 12, 1 << 14] {
        group.bench_function(BenchmarkId::new("scale_1m", chunk_size), |b| {
            b.iter(|| {
                parallel_for(&manager, &mut data, chunk_size, scale);
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_fan_out, bench_parallel_for);
criterion_main!(benches);
