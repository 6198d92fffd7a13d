//! Read path benchmarks for scoped-config.
//!
//! Covers scope resolution depth, backend choice, observer dispatch and
//! concurrent readers.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use scoped_config::observer::{Configuration, Configurations};
use scoped_config::prelude::*;
use scoped_config::storage::{LruStorage, MapStorage};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;

fn base_url() -> Path {
    Path::new("web/unsecure/base_url").unwrap()
}

fn service_with(storage: impl Storager + 'static) -> Service {
    Service::builder()
        .with_storage(storage)
        .with_field(Field::new("web/unsecure/base_url").unwrap().with_default("{{base_url}}"))
        .with_store_website(1, 1)
        .build()
        .unwrap()
}

/// Benchmark how far a read has to fall back
fn benchmark_fallback_depth(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();
    let service = service_with(MapStorage::new());
    runtime.block_on(async {
        service.set(&base_url().bind_store(2), "store").await.unwrap();
        service.set(&base_url().bind_website(3), "website").await.unwrap();
    });

    let cases = [
        ("store_hit", base_url().bind_store(2)),
        ("website_hit", base_url().bind_store(9).in_website(3)),
        ("declared_default", base_url().bind_store(1)),
    ];

    let mut group = c.benchmark_group("fallback_depth");
    for (name, path) in cases {
        group.bench_function(name, |b| {
            b.iter(|| {
                let value = runtime.block_on(service.get(&path)).unwrap();
                black_box(value);
            });
        });
    }
    group.finish();
}

/// Benchmark backend choice on the hit path
fn benchmark_backends(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();
    let services = [
        ("map", service_with(MapStorage::new())),
        ("lru", service_with(LruStorage::new(10_000).unwrap())),
    ];

    let mut group = c.benchmark_group("backends");
    for (name, service) in &services {
        let path = base_url().bind_store(1);
        runtime.block_on(service.set(&path, "http://cs.io")).unwrap();
        group.bench_function(*name, |b| {
            b.iter(|| {
                let value = runtime.block_on(service.get(&path)).unwrap();
                black_box(value);
            });
        });
    }
    group.finish();
}

/// Benchmark reads with after_get observers registered
fn benchmark_observer_dispatch(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();
    let mut group = c.benchmark_group("observer_dispatch");

    for chain in [0usize, 1, 4] {
        let service = service_with(MapStorage::new());
        let batch = Configurations::new(
            (0..chain)
                .map(|_| {
                    Configuration::new(
                        "web/unsecure",
                        Event::AfterGet,
                        "modifier",
                        serde_json::json!({"funcs": ["trim"]}),
                    )
                })
                .collect(),
        );
        service.register_configurations(&batch).unwrap();
        runtime.block_on(service.set(&base_url(), " http://cs.io ")).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(chain), &service, |b, service| {
            b.iter(|| {
                let value = runtime.block_on(service.get(&base_url())).unwrap();
                black_box(value);
            });
        });
    }
    group.finish();
}

/// Benchmark concurrent reads with varying task counts
fn benchmark_concurrent_reads(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();
    let service = service_with(LruStorage::new(10_000).unwrap());
    runtime
        .block_on(service.set(&base_url().bind_website(1), "http://cs.io"))
        .unwrap();

    let mut group = c.benchmark_group("concurrent_reads");
    group.measurement_time(Duration::from_secs(10));

    for tasks in [1usize, 4, 16] {
        group.throughput(Throughput::Elements(tasks as u64 * 1000));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_tasks", tasks)),
            &tasks,
            |b, &tasks| {
                b.iter_custom(|iters| {
                    runtime.block_on(async {
                        let start = Instant::now();
                        let mut handles = Vec::with_capacity(tasks);
                        for store in 0..tasks {
                            let service = service.clone();
                            handles.push(tokio::spawn(async move {
                                let path = base_url().bind_store(store as u32).in_website(1);
                                for _ in 0..iters {
                                    black_box(service.get(&path).await.unwrap());
                                }
                            }));
                        }
                        for handle in handles {
                            handle.await.unwrap();
                        }
                        start.elapsed()
                    })
                });
            },
        );
    }
    group.finish();
}

criterion_group!(
    benches,
    benchmark_fallback_depth,
    benchmark_backends,
    benchmark_observer_dispatch,
    benchmark_concurrent_reads,
);

criterion_main!(benches);
