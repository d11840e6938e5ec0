use core::hint::black_box;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use futures::{StreamExt, stream::FuturesUnordered};
use leastload::{Balancer, Config, Intake, Pool};
use std::time::Instant;
use tokio::runtime::Builder;

// Number of dispatch/complete cycles per benchmark iteration.
const TOTAL_OPS: usize = 4096;

/// Benchmarks the heap alone: extract-min, charge, reinsert, then release.
fn pool_bench(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool/dispatch_complete");
    group.throughput(Throughput::Elements(TOTAL_OPS as u64));

    for workers in [4, 64, 1024] {
        group.bench_function(format!("workers/{workers}"), |b| {
            b.iter_custom(|iters| {
                let start = Instant::now();

                for _ in 0..iters {
                    let mut pool = Pool::new(workers);
                    let mut assigned = Vec::with_capacity(TOTAL_OPS);
                    for _ in 0..TOTAL_OPS {
                        let id = pool.pop_min().unwrap();
                        pool.increment(id).unwrap();
                        pool.reinsert(id).unwrap();
                        assigned.push(id);
                    }
                    for id in assigned {
                        pool.decrement(id).unwrap();
                        pool.fix(id).unwrap();
                    }
                    black_box(&pool);
                }

                start.elapsed()
            });
        });
    }

    group.finish();
}

#[derive(Clone, Copy, Debug)]
struct DispatchBenchParams {
    workers: usize,
    queue_capacity: usize,
    concurrency: usize,
}

/// Benchmarks the full path: generators submit trivial operations and await
/// their replies through a running balancer.
fn dispatch_bench(c: &mut Criterion) {
    let workers_cases = [1, 4, 16];
    let queue_capacity_cases = [0, 1, 8];
    let concurrency_cases = [1, 8, 64];

    // Generate cartesian product of all param combinations
    let mut cases = Vec::new();
    for &workers in &workers_cases {
        for &queue_capacity in &queue_capacity_cases {
            for &concurrency in &concurrency_cases {
                cases.push(DispatchBenchParams {
                    workers,
                    queue_capacity,
                    concurrency,
                });
            }
        }
    }
    let rt = Builder::new_multi_thread().enable_all().build().unwrap();

    for params in &cases {
        let mut group = c.benchmark_group("balancer/submit");
        group.throughput(Throughput::Elements(TOTAL_OPS as u64));

        group.bench_function(
            format!(
                "workers/{}/queue/{}/conc/{}",
                params.workers, params.queue_capacity, params.concurrency,
            ),
            |b| {
                b.to_async(&rt).iter_custom(|iters| async move {
                    let config = Config::builder()
                        .workers(params.workers)
                        .queue_capacity(params.queue_capacity)
                        .intake_capacity(params.concurrency)
                        .build()
                        .unwrap();
                    let (intake, balancer) = Balancer::new(config).unwrap();
                    let running = tokio::spawn(balancer.run());

                    let start = Instant::now();
                    for _ in 0..iters {
                        run_submit_bench(&intake, params).await;
                    }
                    let elapsed = start.elapsed();

                    drop(intake);
                    running.await.unwrap().unwrap();
                    elapsed
                });
            },
        );

        group.finish();
    }
}

async fn run_submit_bench(intake: &Intake<usize>, params: &DispatchBenchParams) {
    let per_task = TOTAL_OPS / params.concurrency;
    let mut tasks = FuturesUnordered::new();

    for _ in 0..params.concurrency {
        let intake = intake.clone();
        tasks.push(tokio::spawn(async move {
            for i in 0..per_task {
                let reply = intake.submit(move || black_box(i)).await.unwrap();
                black_box(reply.await.unwrap());
            }
        }));
    }

    // Wait for all tasks to complete
    while let Some(res) = tasks.next().await {
        res.unwrap();
    }
}

criterion_group!(benches, pool_bench, dispatch_bench);
criterion_main!(benches);
