//! Drives the world-change tracker on the isolated worker thread with a
//! handful of simulated entities hopping between worlds, and writes the
//! trace to `simulate.log`.
//!
//! `RUST_LOG=worldsync=trace cargo run --features profiling --bin simulate`

use std::fs::File;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing_subscriber::EnvFilter;
use worldsync::sim::{RecordingChannel, SimEntity, SimEventSource, StaticWorldIndex};
use worldsync::{
    select_strategy, ticks_to_duration, Entity, EntityRef, ExecutionStrategy, HostEnvironment,
    Result, TrackerConfig, TrackerContext, WorldChangeTracker, WorldId,
};

const ENTITIES: usize = 8;
const ROUNDS: usize = 6;
const POLL_INTERVAL_TICKS: u64 = 10;

fn main() -> Result<()> {
    let file = File::create("simulate.log")?;
    let (non_blocking, _guard) = tracing_appender::non_blocking(file);
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("worldsync=debug")),
        )
        .init();

    // No tick host and no region entry points: isolated thread
    let scheduler = select_strategy(&HostEnvironment::new())?;
    println!("Strategy: {}", scheduler.name());

    let worlds: Vec<WorldId> = (0..3).map(|_| WorldId::new_v4()).collect();
    let index = StaticWorldIndex::new();
    for (i, world) in worlds.iter().enumerate() {
        index.assign(*world, i as i32 - 1);
    }

    let channel = RecordingChannel::new();
    let config = TrackerConfig {
        poll_interval_ticks: POLL_INTERVAL_TICKS,
        ..TrackerConfig::default()
    };
    let tracker = WorldChangeTracker::new(
        config,
        TrackerContext {
            scheduler: scheduler.clone(),
            channel: channel.clone(),
            worlds: index,
            encoder: Arc::new(|world_index: i32| world_index.to_be_bytes().to_vec()),
        },
    )?;
    let events = SimEventSource::new();
    tracker.init(&*events)?;

    let entities: Vec<Arc<SimEntity>> = (0..ENTITIES).map(|_| SimEntity::spawn(worlds[1])).collect();
    for entity in &entities {
        let handle: EntityRef = entity.clone();
        events.join(&handle);
    }

    let start = Instant::now();
    let round = ticks_to_duration(POLL_INTERVAL_TICKS * 2);
    for r in 0..ROUNDS {
        thread::sleep(round);
        for (i, entity) in entities.iter().enumerate() {
            if (i + r) % 3 == 0 {
                entity.move_to(worlds[(i + r) % worlds.len()]);
            }
        }
        if r == ROUNDS / 2 {
            entities[0].go_offline();
            events.leave(entities[0].id());
        }
        tracing::info!(round = r, tracked = tracker.tracked_count(), "Round complete");
    }
    thread::sleep(Duration::from_millis(200));

    tracker.cleanup(&*events);
    scheduler.dispose_all();

    println!(
        "Sent {} notifications for {} entities in {:?}",
        channel.sent_count(),
        ENTITIES,
        start.elapsed()
    );
    Ok(())
}
