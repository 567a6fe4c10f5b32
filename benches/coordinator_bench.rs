//! Performance benchmarks for DeviceCoordinator.
//!
//! These benchmarks measure the overhead of the registry lookup, the access
//! gate and error classification on top of an in-memory HAL.
//!
//! Run benchmarks with:
//! ```sh
//! cargo bench --bench coordinator_bench
//! ```

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use homehub_coordinator::{CoordinatorConfig, DeviceCoordinator, ShutdownSignal};
use homehub_hal::MockHal;
use std::hint::black_box;
use std::sync::Arc;
use tokio::runtime::Runtime;

fn build(rt: &Runtime, gate_capacity: usize) -> Arc<DeviceCoordinator<MockHal>> {
    let (hal, _handle) = MockHal::new();
    let config = CoordinatorConfig {
        gate_capacity,
        hal_timeout: None,
    };
    Arc::new(
        rt.block_on(DeviceCoordinator::new(hal, config, ShutdownSignal::new()))
            .unwrap(),
    )
}

/// Benchmark a single read through the gate.
fn bench_get_state(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let coordinator = build(&rt, 1);

    let mut group = c.benchmark_group("get_state");
    group.throughput(Throughput::Elements(1));

    group.bench_function("get_state_switch", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(coordinator.get_state("light_livingroom").await.unwrap()) });
    });

    group.bench_function("get_state_unknown", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(coordinator.get_state("light_attic").await.is_err()) });
    });

    group.finish();
}

/// Benchmark a normalized switch write.
fn bench_set_state(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let coordinator = build(&rt, 1);

    let mut group = c.benchmark_group("set_state");
    group.throughput(Throughput::Elements(1));

    group.bench_function("set_state_alias", |b| {
        b.to_async(&rt).iter(|| async {
            black_box(
                coordinator
                    .set_state("socket_kitchen", "ON".into())
                    .await
                    .unwrap(),
            )
        });
    });

    group.finish();
}

/// Benchmark concurrent readers contending for gates of various sizes.
fn bench_contended_reads(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("contended_reads");
    const READERS: usize = 16;
    group.throughput(Throughput::Elements(READERS as u64));

    for capacity in [1usize, 4, 16] {
        let coordinator = build(&rt, capacity);
        group.bench_with_input(
            BenchmarkId::from_parameter(capacity),
            &capacity,
            |b, _| {
                b.to_async(&rt).iter(|| {
                    let coordinator = Arc::clone(&coordinator);
                    async move {
                        let mut tasks = Vec::with_capacity(READERS);
                        for _ in 0..READERS {
                            let coordinator = Arc::clone(&coordinator);
                            tasks.push(tokio::spawn(async move {
                                coordinator.get_state("sensor_temp_main").await.is_ok()
                            }));
                        }
                        for task in tasks {
                            black_box(task.await.unwrap());
                        }
                    }
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_get_state,
    bench_set_state,
    bench_contended_reads
);
criterion_main!(benches);
