use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use worldsync::sim::{ManualTickHost, SimEntity, SimRegionHost};
use worldsync::{
    EntityRef, ExecutionStrategy, GlobalSerialStrategy, RegionAffineStrategy, TimedQueue, WorldId,
};

fn bench_global_serial_delayed_1000(c: &mut Criterion) {
    c.bench_function("global_serial_delayed_1000", |b| {
        b.iter(|| {
            let host = ManualTickHost::new();
            let strategy = GlobalSerialStrategy::new(host.clone());
            let entity: EntityRef = SimEntity::spawn(WorldId::new_v4());
            let count = Arc::new(AtomicUsize::new(0));
            for i in 0..1000u64 {
                let count = count.clone();
                strategy.submit_for_entity_delayed(
                    &entity,
                    Box::new(move || {
                        count.fetch_add(1, Ordering::Relaxed);
                    }),
                    i % 20,
                );
            }
            host.advance(20);
            black_box(count.load(Ordering::Relaxed));
        })
    });
}

fn bench_region_affine_submit_1000(c: &mut Criterion) {
    c.bench_function("region_affine_submit_1000", |b| {
        b.iter(|| {
            let host = SimRegionHost::new();
            let strategy = RegionAffineStrategy::new(&host.capabilities()).unwrap();
            let entity: EntityRef = SimEntity::spawn(WorldId::new_v4());
            for i in 0..1000u64 {
                strategy.submit_for_entity_delayed(&entity, Box::new(|| {}), i % 20);
            }
            host.advance(20);
            black_box(host.executed_count());
        })
    });
}

fn bench_timed_queue_10k(c: &mut Criterion) {
    c.bench_function("timed_queue_push_pop_10k", |b| {
        b.iter(|| {
            let mut queue = TimedQueue::new();
            for i in 0..10_000u64 {
                queue.push((i * 7919) % 1000, i);
            }
            let mut popped = 0;
            while queue.pop_due(u64::MAX).is_some() {
                popped += 1;
            }
            black_box(popped);
        })
    });
}

criterion_group!(
    benches,
    bench_global_serial_delayed_1000,
    bench_region_affine_submit_1000,
    bench_timed_queue_10k
);
criterion_main!(benches);
