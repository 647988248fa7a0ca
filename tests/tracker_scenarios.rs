use std::sync::Arc;
use worldsync::sim::{ManualTickHost, RecordingChannel, SimEntity, SimEventSource, StaticWorldIndex};
use worldsync::{
    Entity, EntityRef, GlobalSerialStrategy, RepeatConfig, TrackerConfig, TrackerContext,
    WorldChangeTracker, WorldId, WorldIndex, DEFAULT_CHANNEL,
};

fn encode(index: i32) -> Vec<u8> {
    index.to_be_bytes().to_vec()
}

struct Harness {
    host: Arc<ManualTickHost>,
    channel: Arc<RecordingChannel>,
    worlds: Arc<StaticWorldIndex>,
    events: Arc<SimEventSource>,
    tracker: WorldChangeTracker,
}

impl Harness {
    fn new(config: TrackerConfig) -> Self {
        let host = ManualTickHost::new();
        let channel = RecordingChannel::new();
        let worlds = StaticWorldIndex::new();
        let tracker = WorldChangeTracker::new(
            config,
            TrackerContext {
                scheduler: Arc::new(GlobalSerialStrategy::new(host.clone())),
                channel: channel.clone(),
                worlds: worlds.clone(),
                encoder: Arc::new(encode),
            },
        )
        .unwrap();
        let events = SimEventSource::new();
        tracker.init(&*events).unwrap();
        Self {
            host,
            channel,
            worlds,
            events,
            tracker,
        }
    }

    fn join(&self, world: WorldId) -> (Arc<SimEntity>, EntityRef) {
        let entity = SimEntity::spawn(world);
        let handle: EntityRef = entity.clone();
        self.events.join(&handle);
        (entity, handle)
    }
}

#[test]
fn test_join_sends_immediately_then_two_retries() {
    let h = Harness::new(TrackerConfig::default());
    let g1 = WorldId::new_v4();
    h.worlds.assign(g1, 0);
    let (_entity, handle) = h.join(g1);

    // Immediate send happened inline, the rest is queued
    assert_eq!(h.channel.payloads_for(handle.id()), vec![encode(0)]);
    assert_eq!(h.host.deadlines(), vec![1, 2, 60]);

    h.host.advance(1);
    assert_eq!(h.channel.sent_count(), 2);
    h.host.advance(1);
    assert_eq!(h.channel.payloads_for(handle.id()), vec![encode(0); 3]);

    let sent = h.channel.sent();
    assert!(sent.iter().all(|m| m.channel == DEFAULT_CHANNEL));
    assert_eq!(h.tracker.last_known(&handle.id()), Some(g1));
}

#[test]
fn test_poll_detects_change_and_reschedules() {
    let h = Harness::new(TrackerConfig::default());
    let (g1, g2) = (WorldId::new_v4(), WorldId::new_v4());
    h.worlds.assign(g1, 0);
    h.worlds.assign(g2, 7);
    let (entity, handle) = h.join(g1);
    h.host.advance(3);
    assert_eq!(h.channel.sent_count(), 3);

    entity.move_to(g2);
    h.host.advance(57);

    assert_eq!(h.host.now(), 60);
    assert_eq!(h.channel.sent_count(), 4);
    assert_eq!(h.channel.payloads_for(handle.id()).last(), Some(&encode(7)));
    assert_eq!(h.tracker.last_known(&handle.id()), Some(g2));
    assert_eq!(h.host.deadlines(), vec![120]);

    // No further change, no further notification
    h.host.advance(60);
    assert_eq!(h.channel.sent_count(), 4);
    assert_eq!(h.host.deadlines(), vec![180]);
}

#[test]
fn test_world_change_repeats_follow_config() {
    let mut config = TrackerConfig::default();
    config.events.world_change = RepeatConfig {
        repeat_times: 2,
        spacing_ticks: 5,
    };
    let h = Harness::new(config);
    let (g1, g2) = (WorldId::new_v4(), WorldId::new_v4());
    let (entity, handle) = h.join(g1);
    h.host.advance(3);

    entity.move_to(g2);
    h.host.advance(57);
    assert_eq!(h.host.deadlines(), vec![65, 120]);
    h.host.advance(5);

    let g2_index = h.worlds.index_of(g2);
    let payloads = h.channel.payloads_for(handle.id());
    assert_eq!(payloads[3..], [encode(g2_index), encode(g2_index)]);
}

#[test]
fn test_leave_before_delayed_notification() {
    let h = Harness::new(TrackerConfig::default());
    let (entity, handle) = h.join(WorldId::new_v4());
    assert_eq!(h.channel.sent_count(), 1);

    entity.go_offline();
    h.events.leave(handle.id());
    assert!(!h.tracker.is_tracked(&handle.id()));

    h.host.advance(60);
    assert_eq!(h.channel.sent_count(), 1);
    // Poll found the entity gone and did not resubmit
    assert_eq!(h.host.pending(), 0);
}

#[test]
fn test_offline_poll_ends_chain() {
    let h = Harness::new(TrackerConfig::default());
    let (entity, handle) = h.join(WorldId::new_v4());
    h.host.advance(60);
    assert!(h.tracker.is_tracked(&handle.id()));
    assert_eq!(h.host.pending(), 1);

    // Went offline without a leave event
    entity.go_offline();
    h.host.advance(60);
    assert!(!h.tracker.is_tracked(&handle.id()));
    assert_eq!(h.host.pending(), 0);
}

#[test]
fn test_leave_then_rejoin_single_chain() {
    let h = Harness::new(TrackerConfig::default());
    let (_entity, handle) = h.join(WorldId::new_v4());
    h.events.leave(handle.id());
    h.events.join(&handle);
    assert!(h.tracker.is_tracked(&handle.id()));

    h.host.advance(60);
    // Old chain ended on its first poll, the new one continues
    assert_eq!(h.host.pending(), 1);
    h.host.advance(60);
    assert_eq!(h.host.pending(), 1);
}

#[test]
fn test_stale_world_guard_skips_moved_entity() {
    let mut config = TrackerConfig::default();
    config.events.world_change = RepeatConfig {
        repeat_times: 2,
        spacing_ticks: 10,
    };
    let h = Harness::new(config);
    let (g1, g2, g3) = (WorldId::new_v4(), WorldId::new_v4(), WorldId::new_v4());
    let (entity, handle) = h.join(g1);
    h.host.advance(3);

    entity.move_to(g2);
    h.host.advance(57);
    assert_eq!(h.channel.sent_count(), 4);

    // Retry for g2 is due at 70; the entity is in g3 by then
    entity.move_to(g3);
    h.host.advance(10);
    assert_eq!(h.channel.sent_count(), 4);
    assert_eq!(h.tracker.last_known(&handle.id()), Some(g2));

    // Next poll catches up
    h.host.advance(50);
    assert_eq!(h.tracker.last_known(&handle.id()), Some(g3));
    assert_eq!(
        h.channel.payloads_for(handle.id()).last(),
        Some(&encode(h.worlds.index_of(g3)))
    );
}

#[test]
fn test_send_failure_keeps_tracking() {
    let h = Harness::new(TrackerConfig::default());
    h.channel.fail_sends(true);
    let (_entity, handle) = h.join(WorldId::new_v4());
    h.host.advance(60);

    assert_eq!(h.channel.sent_count(), 0);
    assert!(h.tracker.is_tracked(&handle.id()));
    assert_eq!(h.host.pending(), 1);
}

#[test]
fn test_join_retry_records_world_change() {
    let h = Harness::new(TrackerConfig::default());
    let (g1, g2) = (WorldId::new_v4(), WorldId::new_v4());
    h.worlds.assign(g1, 0);
    h.worlds.assign(g2, 1);
    let (entity, handle) = h.join(g1);

    entity.move_to(g2);
    h.host.advance(2);
    assert_eq!(
        h.channel.payloads_for(handle.id()),
        vec![encode(0), encode(1), encode(1)]
    );
    assert_eq!(h.tracker.last_known(&handle.id()), Some(g2));

    // First poll already agrees with what the client was sent
    h.host.advance(58);
    assert_eq!(h.channel.sent_count(), 3);
    assert_eq!(h.host.deadlines(), vec![120]);
}

#[test]
fn test_leave_while_live_ends_chain() {
    let h = Harness::new(TrackerConfig::default());
    let (entity, handle) = h.join(WorldId::new_v4());
    assert_eq!(h.channel.sent_count(), 1);

    h.events.leave(handle.id());
    assert!(entity.is_live());

    h.host.advance(60);
    // Retries and the poll found no entry: nothing sent, nothing resubmitted
    assert_eq!(h.channel.sent_count(), 1);
    assert_eq!(h.host.pending(), 0);
    assert!(!h.tracker.is_tracked(&handle.id()));
}
