use capped_lib::gate::{AdmissionGate, BoundedGate, UnboundedGate};
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;

fn uncontended(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    let bounded = BoundedGate::new(15);
    let unbounded = UnboundedGate::default();

    c.bench_function("BoundedGate acquire and release", |b| {
        b.iter(|| runtime.block_on(async { black_box(bounded.acquire().await.unwrap()) }));
    });

    c.bench_function("UnboundedGate acquire and release", |b| {
        b.iter(|| runtime.block_on(async { black_box(unbounded.acquire().await.unwrap()) }));
    });
}

/// 64 tasks competing for 4 slots
fn contended(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .build()
        .unwrap();
    let gate = Arc::new(BoundedGate::new(4));

    c.bench_function("BoundedGate contended", |b| {
        b.iter(|| {
            runtime.block_on(async {
                let tasks: Vec<_> = (0..64)
                    .map(|_| {
                        let gate = gate.clone();
                        tokio::spawn(async move {
                            let slot = gate.acquire().await.unwrap();
                            tokio::task::yield_now().await;
                            drop(slot);
                        })
                    })
                    .collect();
                for task in tasks {
                    task.await.unwrap();
                }
            });
        });
    });
    assert!(gate.peak() <= 4);
}

criterion_group!(
    name = benches;
    config = Criterion::default().sample_size(20);
    targets = uncontended, contended
);
criterion_main!(benches);
