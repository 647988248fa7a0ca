use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;
use worldsync::sim::{ManualTickHost, RecordingChannel, SimEntity, StaticWorldIndex};
use worldsync::{
    EntityRef, GlobalSerialStrategy, TrackerConfig, TrackerContext, WorldChangeTracker, WorldId,
};

fn tracker(host: &Arc<ManualTickHost>) -> (WorldChangeTracker, Arc<RecordingChannel>) {
    let channel = RecordingChannel::new();
    let tracker = WorldChangeTracker::new(
        TrackerConfig::default(),
        TrackerContext {
            scheduler: Arc::new(GlobalSerialStrategy::new(host.clone())),
            channel: channel.clone(),
            worlds: StaticWorldIndex::new(),
            encoder: Arc::new(|index: i32| index.to_be_bytes().to_vec()),
        },
    )
    .unwrap();
    (tracker, channel)
}

fn bench_join_1000_entities(c: &mut Criterion) {
    c.bench_function("tracker_join_1000", |b| {
        b.iter(|| {
            let host = ManualTickHost::new();
            let (tracker, channel) = tracker(&host);
            let world = WorldId::new_v4();
            for _ in 0..1000 {
                let entity: EntityRef = SimEntity::spawn(world);
                tracker.entity_joined(&entity);
            }
            host.advance(3);
            black_box(channel.sent_count());
        })
    });
}

fn bench_poll_cycle_1000_entities(c: &mut Criterion) {
    let host = ManualTickHost::new();
    let (tracker, _channel) = tracker(&host);
    let worlds = [WorldId::new_v4(), WorldId::new_v4()];
    let entities: Vec<_> = (0..1000).map(|_| SimEntity::spawn(worlds[0])).collect();
    for entity in &entities {
        let handle: EntityRef = entity.clone();
        tracker.entity_joined(&handle);
    }
    host.advance(3);

    let mut flip = 0;
    c.bench_function("tracker_poll_cycle_1000", |b| {
        b.iter(|| {
            flip ^= 1;
            for entity in entities.iter().step_by(10) {
                entity.move_to(worlds[flip]);
            }
            host.advance(60);
            black_box(tracker.tracked_count());
        })
    });
}

criterion_group!(benches, bench_join_1000_entities, bench_poll_cycle_1000_entities);
criterion_main!(benches);
