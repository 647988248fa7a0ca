//! In-process simulated host.
//!
//! Deterministic stand-ins for the host collaborators: a manually advanced
//! tick clock acting as the primary thread, a region host publishing the
//! region entry points, simulated entities, an event dispatcher and a
//! recording message channel. Used by the tests, benches and the `simulate`
//! binary.
//!
//! ```
//! use std::sync::Arc;
//! use worldsync::sim::ManualTickHost;
//! use worldsync::{ExecutionStrategy, GlobalSerialStrategy};
//!
//! let host = ManualTickHost::new();
//! let strategy = GlobalSerialStrategy::new(host.clone());
//! strategy.submit_global_delayed(2, Box::new(|| println!("two ticks later")));
//! host.advance(2);
//! assert_eq!(host.pending(), 0);
//! ```

use crate::capability::{
    CapabilityRegistry, EntityExecuteFn, EntityRunDelayedFn, EntitySchedulerFn, GlobalRunFn,
    GlobalSchedulerFn, HandleTask, HostObject, HostTaskHandle, ENTITY_EXECUTE, ENTITY_RUN_DELAYED,
    ENTITY_SCHEDULER, GLOBAL_REGION_SCHEDULER, GLOBAL_RUN,
};
use crate::entity::{Entity, EntityId, EntityRef, WorldId};
use crate::error::{Result, SyncError};
use crate::global_serial::TickHost;
use crate::messaging::{EntityListener, EventSource, ListenerId, MessageChannel, WorldIndex};
use crate::queue::TimedQueue;
use crate::task::Task;
use crate::time::MIN_ENTITY_DELAY_TICKS;
use parking_lot::{Mutex, RwLock};
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};

// ============================================================================
// Entities
// ============================================================================

/// Entity whose liveness and world the test controls
pub struct SimEntity {
    id: EntityId,
    name: String,
    live: AtomicBool,
    world: RwLock<WorldId>,
}

impl SimEntity {
    pub fn spawn(world: WorldId) -> Arc<Self> {
        let id = EntityId::new_v4();
        Arc::new(Self {
            id,
            name: format!("sim-{}", &id.to_string()[..8]),
            live: AtomicBool::new(true),
            world: RwLock::new(world),
        })
    }

    pub fn move_to(&self, world: WorldId) {
        *self.world.write() = world;
    }

    pub fn go_offline(&self) {
        self.live.store(false, Ordering::Release);
    }
}

impl Entity for SimEntity {
    fn id(&self) -> EntityId {
        self.id
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    fn world(&self) -> WorldId {
        *self.world.read()
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

// ============================================================================
// Tick clock
// ============================================================================

/// Tick counter plus the work due at each tick
struct TickClock<T> {
    state: Mutex<ClockState<T>>,
}

struct ClockState<T> {
    now: u64,
    queue: TimedQueue<u64, T>,
}

impl<T> TickClock<T> {
    fn new() -> Self {
        Self {
            state: Mutex::new(ClockState {
                now: 0,
                queue: TimedQueue::new(),
            }),
        }
    }

    /// Queue `item` for `delay` ticks from now; delay 0 means next tick
    fn schedule(&self, delay: u64, item: T) -> u64 {
        let mut state = self.state.lock();
        let due = state.now + delay.max(1);
        state.queue.push(due, item);
        due
    }

    /// Step the clock one tick at a time, handing every due item to `run`.
    /// The lock is released while `run` executes so items can schedule more work.
    fn advance(&self, ticks: u64, mut run: impl FnMut(T)) {
        for _ in 0..ticks {
            let now = {
                let mut state = self.state.lock();
                state.now += 1;
                state.now
            };
            loop {
                let next = self.state.lock().queue.pop_due(now);
                match next {
                    Some(item) => run(item),
                    None => break,
                }
            }
        }
    }

    fn now(&self) -> u64 {
        self.state.lock().now
    }

    fn pending(&self) -> usize {
        self.state.lock().queue.len()
    }

    fn deadlines(&self) -> Vec<u64> {
        self.state.lock().queue.deadlines()
    }
}

// ============================================================================
// Single-thread tick host
// ============================================================================

/// Single-thread tick host. The thread that created it is the primary thread;
/// queued tasks run on whichever thread calls [`ManualTickHost::advance`].
pub struct ManualTickHost {
    primary: ThreadId,
    clock: TickClock<Task>,
    reject: AtomicBool,
}

impl ManualTickHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            primary: thread::current().id(),
            clock: TickClock::new(),
            reject: AtomicBool::new(false),
        })
    }

    /// Run `ticks` ticks worth of queued work
    pub fn advance(&self, ticks: u64) {
        self.clock.advance(ticks, |task| task());
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    pub fn pending(&self) -> usize {
        self.clock.pending()
    }

    /// Absolute ticks at which queued tasks are due
    pub fn deadlines(&self) -> Vec<u64> {
        self.clock.deadlines()
    }

    /// Make every further submission fail
    pub fn reject_submissions(&self, reject: bool) {
        self.reject.store(reject, Ordering::Release);
    }
}

impl TickHost for ManualTickHost {
    fn is_primary_thread(&self) -> bool {
        thread::current().id() == self.primary
    }

    fn schedule_sync_delayed(&self, task: Task, delay_ticks: u64) -> Result<()> {
        if self.reject.load(Ordering::Acquire) {
            return Err(SyncError::Host("scheduler is shutting down".to_string()));
        }
        self.clock.schedule(delay_ticks, task);
        Ok(())
    }
}

// ============================================================================
// Region host
// ============================================================================

/// One call into a region entry point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub entry: &'static str,
    pub entity: Option<EntityId>,
    pub delay_ticks: u64,
}

enum RegionJob {
    Entity {
        entity: EntityRef,
        run: Box<dyn FnOnce() + Send>,
        retired: Option<Task>,
    },
    Global(Box<dyn FnOnce() + Send>),
}

/// Per-entity scheduler object handed out by `Entity::scheduler`
struct SimEntityScheduler {
    entity: EntityRef,
}

/// The global region scheduler object
struct SimGlobalScheduler;

/// Handle passed to running tasks
#[derive(Debug)]
pub struct SimTaskHandle {
    pub id: u64,
}

/// Region host publishing the five region entry points.
///
/// Like a real region host it refuses entity-affine delays below one tick and
/// retires an entity task, instead of running it, when the entity is offline
/// at fire time.
pub struct SimRegionHost {
    clock: TickClock<RegionJob>,
    submissions: Mutex<Vec<Submission>>,
    next_handle: AtomicU64,
    executed: AtomicUsize,
    retired: AtomicUsize,
}

impl SimRegionHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            clock: TickClock::new(),
            submissions: Mutex::new(Vec::new()),
            next_handle: AtomicU64::new(1),
            executed: AtomicUsize::new(0),
            retired: AtomicUsize::new(0),
        })
    }

    /// Registry with every entry point published
    pub fn capabilities(self: &Arc<Self>) -> CapabilityRegistry {
        let mut registry = CapabilityRegistry::new();

        let scheduler: EntitySchedulerFn = Arc::new(|entity: &EntityRef| {
            Ok(Arc::new(SimEntityScheduler {
                entity: entity.clone(),
            }) as HostObject)
        });
        registry.register(ENTITY_SCHEDULER, scheduler);

        let host = Arc::downgrade(self);
        let execute: EntityExecuteFn = Arc::new(
            move |scheduler: &HostObject, run: Task, retired: Option<Task>, delay: u64| {
                upgrade(&host)?.entity_execute(scheduler, run, retired, delay)
            },
        );
        registry.register(ENTITY_EXECUTE, execute);

        let host = Arc::downgrade(self);
        let run_delayed: EntityRunDelayedFn = Arc::new(
            move |scheduler: &HostObject, run: HandleTask, retired: Option<Task>, delay: u64| {
                upgrade(&host)?.entity_run_delayed(scheduler, run, retired, delay)
            },
        );
        registry.register(ENTITY_RUN_DELAYED, run_delayed);

        let global: GlobalSchedulerFn = Arc::new(|| Ok(Arc::new(SimGlobalScheduler) as HostObject));
        registry.register(GLOBAL_REGION_SCHEDULER, global);

        let host = Arc::downgrade(self);
        let global_run: GlobalRunFn = Arc::new(move |scheduler: &HostObject, run: HandleTask| {
            upgrade(&host)?.global_run(scheduler, run)
        });
        registry.register(GLOBAL_RUN, global_run);

        registry
    }

    /// Registry with `name` left out
    pub fn capabilities_without(self: &Arc<Self>, name: &str) -> CapabilityRegistry {
        let mut registry = self.capabilities();
        registry.remove(name);
        registry
    }

    /// Registry where `name` is published with the wrong shape
    pub fn capabilities_misshaped(self: &Arc<Self>, name: &'static str) -> CapabilityRegistry {
        let mut registry = self.capabilities();
        registry.register(name, format!("{name} (wrong shape)"));
        registry
    }

    pub fn advance(&self, ticks: u64) {
        self.clock.advance(ticks, |job| match job {
            RegionJob::Entity {
                entity,
                run,
                retired,
            } => {
                if entity.is_live() {
                    self.executed.fetch_add(1, Ordering::Relaxed);
                    run();
                } else {
                    self.retired.fetch_add(1, Ordering::Relaxed);
                    if let Some(retired) = retired {
                        retired();
                    }
                }
            }
            RegionJob::Global(run) => {
                self.executed.fetch_add(1, Ordering::Relaxed);
                run();
            }
        });
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    pub fn pending(&self) -> usize {
        self.clock.pending()
    }

    pub fn deadlines(&self) -> Vec<u64> {
        self.clock.deadlines()
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.submissions.lock().clone()
    }

    pub fn executed_count(&self) -> usize {
        self.executed.load(Ordering::Relaxed)
    }

    pub fn retired_count(&self) -> usize {
        self.retired.load(Ordering::Relaxed)
    }

    fn record(&self, entry: &'static str, entity: Option<EntityId>, delay_ticks: u64) {
        self.submissions.lock().push(Submission {
            entry,
            entity,
            delay_ticks,
        });
    }

    fn entity_scheduler(scheduler: &HostObject) -> Result<&SimEntityScheduler> {
        scheduler
            .downcast_ref::<SimEntityScheduler>()
            .ok_or_else(|| SyncError::Host("not an entity scheduler".to_string()))
    }

    fn check_delay(delay: u64) -> Result<()> {
        if delay < MIN_ENTITY_DELAY_TICKS {
            return Err(SyncError::Host(format!(
                "delay must be at least {MIN_ENTITY_DELAY_TICKS} tick, got {delay}"
            )));
        }
        Ok(())
    }

    fn entity_execute(
        &self,
        scheduler: &HostObject,
        run: Task,
        retired: Option<Task>,
        delay: u64,
    ) -> Result<bool> {
        let entity = Self::entity_scheduler(scheduler)?.entity.clone();
        self.record(ENTITY_EXECUTE, Some(entity.id()), delay);
        Self::check_delay(delay)?;
        if !entity.is_live() {
            return Ok(false);
        }
        self.clock.schedule(
            delay,
            RegionJob::Entity {
                entity,
                run,
                retired,
            },
        );
        Ok(true)
    }

    fn entity_run_delayed(
        &self,
        scheduler: &HostObject,
        run: HandleTask,
        retired: Option<Task>,
        delay: u64,
    ) -> Result<()> {
        let entity = Self::entity_scheduler(scheduler)?.entity.clone();
        self.record(ENTITY_RUN_DELAYED, Some(entity.id()), delay);
        Self::check_delay(delay)?;
        let handle = self.new_handle();
        self.clock.schedule(
            delay,
            RegionJob::Entity {
                entity,
                run: Box::new(move || run(handle)),
                retired,
            },
        );
        Ok(())
    }

    fn global_run(&self, scheduler: &HostObject, run: HandleTask) -> Result<()> {
        if scheduler.downcast_ref::<SimGlobalScheduler>().is_none() {
            return Err(SyncError::Host("not the global region scheduler".to_string()));
        }
        self.record(GLOBAL_RUN, None, 0);
        let handle = self.new_handle();
        self.clock
            .schedule(0, RegionJob::Global(Box::new(move || run(handle))));
        Ok(())
    }

    fn new_handle(&self) -> HostTaskHandle {
        Arc::new(SimTaskHandle {
            id: self.next_handle.fetch_add(1, Ordering::Relaxed),
        })
    }
}

fn upgrade(host: &Weak<SimRegionHost>) -> Result<Arc<SimRegionHost>> {
    host.upgrade()
        .ok_or_else(|| SyncError::Host("region host shut down".to_string()))
}

// ============================================================================
// Messaging collaborators
// ============================================================================

/// One message handed to the channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub entity: EntityId,
    pub channel: String,
    pub payload: Vec<u8>,
}

/// Message channel that remembers everything it was asked to send
#[derive(Default)]
pub struct RecordingChannel {
    registered: Mutex<FxHashSet<String>>,
    sent: Mutex<Vec<SentMessage>>,
    fail: AtomicBool,
}

impl RecordingChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn is_registered(&self, channel: &str) -> bool {
        self.registered.lock().contains(channel)
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }

    /// Payloads sent to `entity`, oldest first
    pub fn payloads_for(&self, entity: EntityId) -> Vec<Vec<u8>> {
        self.sent
            .lock()
            .iter()
            .filter(|message| message.entity == entity)
            .map(|message| message.payload.clone())
            .collect()
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail.store(fail, Ordering::Release);
    }
}

impl MessageChannel for RecordingChannel {
    fn register_outgoing(&self, channel: &str) -> Result<()> {
        self.registered.lock().insert(channel.to_string());
        Ok(())
    }

    fn unregister_outgoing(&self, channel: &str) {
        self.registered.lock().remove(channel);
    }

    fn send(&self, entity: EntityId, channel: &str, payload: &[u8]) -> Result<()> {
        if self.fail.load(Ordering::Acquire) {
            return Err(SyncError::Host("client connection closed".to_string()));
        }
        self.sent.lock().push(SentMessage {
            entity,
            channel: channel.to_string(),
            payload: payload.to_vec(),
        });
        Ok(())
    }
}

/// Numbers worlds in order of first appearance, unless assigned explicitly
#[derive(Default)]
pub struct StaticWorldIndex {
    indices: Mutex<FxHashMap<WorldId, i32>>,
}

impl StaticWorldIndex {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn assign(&self, world: WorldId, index: i32) {
        self.indices.lock().insert(world, index);
    }
}

impl WorldIndex for StaticWorldIndex {
    fn index_of(&self, world: WorldId) -> i32 {
        let mut indices = self.indices.lock();
        let next = indices.len() as i32;
        *indices.entry(world).or_insert(next)
    }
}

/// Event dispatcher delivering join/leave synchronously on the calling thread
#[derive(Default)]
pub struct SimEventSource {
    listeners: RwLock<FxHashMap<ListenerId, Arc<dyn EntityListener>>>,
    next_id: AtomicU64,
}

impl SimEventSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn join(&self, entity: &EntityRef) {
        let listeners: Vec<_> = self.listeners.read().values().cloned().collect();
        for listener in listeners {
            listener.on_entity_join(entity);
        }
    }

    pub fn leave(&self, entity: EntityId) {
        let listeners: Vec<_> = self.listeners.read().values().cloned().collect();
        for listener in listeners {
            listener.on_entity_leave(entity);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }
}

impl EventSource for SimEventSource {
    fn register(&self, listener: Arc<dyn EntityListener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().insert(id, listener);
        id
    }

    fn unregister(&self, id: ListenerId) {
        self.listeners.write().remove(&id);
    }
}
