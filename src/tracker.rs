//! Per-entity world tracking with self-rescheduling polls.
//!
//! On join an entity is recorded with its current world, a notification is
//! sent right away plus the configured delayed repeats, and a poll chain is
//! started. Each poll re-reads the entity: an offline entity is dropped and
//! its chain ends, a changed world is recorded and announced, and in every
//! other case the poll submits a fresh copy of itself. There is no timer
//! handle to cancel; leaving (or a newer join) is what stops a chain.
//! Join retries announce whatever world the entity is in when they fire and
//! record it, so the next poll does not announce the same move again.
//!
//! Scheduled closures capture the entity handle, the join epoch and, for
//! targeted notifications, the world they were computed for. Liveness and
//! world are always re-read when the closure runs.

use crate::config::{RepeatConfig, TrackerConfig};
use crate::entity::{EntityId, EntityRef, WorldId};
use crate::error::{Result, SyncError};
use crate::messaging::{EntityListener, EventSource, ListenerId, MessageChannel, PayloadEncoder, WorldIndex};
use crate::strategy::ExecutionStrategy;
use crate::task::Task;
use crate::tracked::{TrackedEntry, TrackedWorlds, WorldUpdate};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Which world a notification announces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    /// Whatever world the entity is in when the notification fires
    Current,
    /// A specific world; skipped if the entity is elsewhere by then
    World(WorldId),
}

/// Host collaborators the tracker talks to
#[derive(Clone)]
pub struct TrackerContext {
    pub scheduler: Arc<dyn ExecutionStrategy>,
    pub channel: Arc<dyn MessageChannel>,
    pub worlds: Arc<dyn WorldIndex>,
    pub encoder: Arc<dyn PayloadEncoder>,
}

/// Watches joined entities and notifies their clients whenever their world changes
#[derive(Clone)]
pub struct WorldChangeTracker {
    inner: Arc<TrackerInner>,
}

struct TrackerInner {
    config: TrackerConfig,
    ctx: TrackerContext,
    tracked: TrackedWorlds,
    next_epoch: AtomicU64,
    disposed: AtomicBool,
    registration: Mutex<Option<ListenerId>>,
}

impl WorldChangeTracker {
    /// Fails if the feature is disabled or the config is invalid
    pub fn new(config: TrackerConfig, ctx: TrackerContext) -> Result<Self> {
        if !config.enabled {
            return Err(SyncError::FeatureDisabled(config.channel.clone()));
        }
        config.validate()?;
        Ok(Self {
            inner: Arc::new(TrackerInner {
                config,
                ctx,
                tracked: TrackedWorlds::new(),
                next_epoch: AtomicU64::new(1),
                disposed: AtomicBool::new(false),
                registration: Mutex::new(None),
            }),
        })
    }

    /// Register the outgoing channel and subscribe to entity events
    pub fn init(&self, events: &dyn EventSource) -> Result<()> {
        let inner = &self.inner;
        inner.ctx.channel.register_outgoing(&inner.config.channel)?;
        let id = events.register(Arc::new(self.clone()));
        *inner.registration.lock() = Some(id);
        tracing::debug!(
            channel = %inner.config.channel,
            strategy = inner.ctx.scheduler.name(),
            "Event listener has been registered"
        );
        Ok(())
    }

    /// Unsubscribe, release the channel and forget every entity.
    ///
    /// Tasks still queued on the host become no-ops when they fire.
    pub fn cleanup(&self, events: &dyn EventSource) {
        let inner = &self.inner;
        if inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(id) = inner.registration.lock().take() {
            events.unregister(id);
        }
        inner.ctx.channel.unregister_outgoing(&inner.config.channel);
        inner.tracked.clear();
        tracing::debug!(channel = %inner.config.channel, "Event listener has been unregistered");
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    pub fn is_tracked(&self, id: &EntityId) -> bool {
        self.inner.tracked.contains(id)
    }

    pub fn last_known(&self, id: &EntityId) -> Option<WorldId> {
        self.inner.tracked.world(id)
    }

    pub fn tracked_count(&self) -> usize {
        self.inner.tracked.len()
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.inner.config
    }

    /// Entity came online
    pub fn entity_joined(&self, entity: &EntityRef) {
        self.inner.join(entity);
    }

    /// Entity went offline
    pub fn entity_left(&self, id: EntityId) {
        self.inner.leave(id);
    }
}

impl EntityListener for WorldChangeTracker {
    fn on_entity_join(&self, entity: &EntityRef) {
        self.entity_joined(entity);
    }

    fn on_entity_leave(&self, entity: EntityId) {
        self.entity_left(entity);
    }
}

impl TrackerInner {
    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn join(self: &Arc<Self>, entity: &EntityRef) {
        if self.is_disposed() {
            return;
        }
        let id = entity.id();
        let world = entity.world();
        let epoch = self.next_epoch.fetch_add(1, Ordering::Relaxed);
        self.tracked.insert(id, TrackedEntry { world, epoch });
        tracing::debug!(entity = %id, world = %world, epoch, "Tracking entity");

        self.schedule_notifications(entity, epoch, self.config.events.join, Target::Current);
        self.schedule_poll(entity, epoch);
    }

    fn leave(&self, id: EntityId) {
        if self.tracked.remove(&id).is_some() {
            tracing::debug!(entity = %id, "Stopped tracking entity");
        }
    }

    /// One poll cycle. Resubmits itself unless the chain has to end.
    fn poll(self: &Arc<Self>, entity: &EntityRef, epoch: u64) {
        if self.is_disposed() {
            return;
        }
        let id = entity.id();
        if !entity.is_live() {
            if self.tracked.remove_epoch(&id, epoch) {
                tracing::debug!(entity = %id, "Entity offline, stopped tracking");
            }
            return;
        }

        let current = entity.world();
        match self.tracked.update(id, epoch, current) {
            WorldUpdate::Untracked | WorldUpdate::Superseded => {
                tracing::trace!(entity = %id, epoch, "Poll chain ended");
                return;
            }
            WorldUpdate::Unchanged => {}
            WorldUpdate::Changed { previous } => {
                tracing::debug!(entity = %id, from = %previous, to = %current, "World changed");
                self.schedule_notifications(
                    entity,
                    epoch,
                    self.config.events.world_change,
                    Target::World(current),
                );
            }
        }

        self.schedule_poll(entity, epoch);
    }

    fn schedule_poll(self: &Arc<Self>, entity: &EntityRef, epoch: u64) {
        let weak = Arc::downgrade(self);
        let handle = entity.clone();
        let task: Task = Box::new(move || {
            if let Some(inner) = Weak::upgrade(&weak) {
                inner.poll(&handle, epoch);
            }
        });
        self.ctx
            .scheduler
            .submit_for_entity_delayed(entity, task, self.config.poll_interval_ticks);
    }

    fn schedule_notifications(
        self: &Arc<Self>,
        entity: &EntityRef,
        epoch: u64,
        repeat: RepeatConfig,
        target: Target,
    ) {
        for delay in repeat.offsets() {
            let weak = Arc::downgrade(self);
            let handle = entity.clone();
            let task: Task = Box::new(move || {
                if let Some(inner) = Weak::upgrade(&weak) {
                    inner.notify(&handle, epoch, target);
                }
            });
            if delay == 0 {
                self.ctx.scheduler.submit_for_entity(entity, task);
            } else {
                self.ctx.scheduler.submit_for_entity_delayed(entity, task, delay);
            }
        }
    }

    /// Fires one scheduled notification. Only the join that scheduled it may
    /// send; join retries also record the world they observe.
    fn notify(&self, entity: &EntityRef, epoch: u64, target: Target) {
        if self.is_disposed() || !entity.is_live() {
            return;
        }
        let id = entity.id();
        let world = match target {
            Target::Current => {
                let current = entity.world();
                match self.tracked.update(id, epoch, current) {
                    WorldUpdate::Untracked | WorldUpdate::Superseded => {
                        tracing::trace!(entity = %id, name = %entity.name(), epoch, "Skipping notification: no longer tracked");
                        return;
                    }
                    WorldUpdate::Unchanged => {}
                    WorldUpdate::Changed { previous } => {
                        tracing::debug!(entity = %id, from = %previous, to = %current, "World changed before join retry");
                    }
                }
                current
            }
            Target::World(world) => {
                let owned = self
                    .tracked
                    .get(&id)
                    .is_some_and(|entry| entry.epoch == epoch);
                if !owned {
                    tracing::trace!(entity = %id, name = %entity.name(), epoch, "Skipping notification: no longer tracked");
                    return;
                }
                world
            }
        };
        self.send(entity, world);
    }

    /// Send the notification for `expected`, unless the entity has left it
    fn send(&self, entity: &EntityRef, expected: WorldId) {
        if !entity.is_live() {
            return;
        }
        let id = entity.id();
        let current = entity.world();
        if current != expected {
            tracing::trace!(
                entity = %id,
                name = %entity.name(),
                expected = %expected,
                current = %current,
                "Skipping notification: unexpected world"
            );
            return;
        }

        let index = self.ctx.worlds.index_of(expected);
        let payload = self.ctx.encoder.encode(index);
        tracing::debug!(
            entity = %id,
            name = %entity.name(),
            world = %expected,
            index,
            payload = ?payload,
            "Sending world notification"
        );
        if let Err(err) = self.ctx.channel.send(id, &self.config.channel, &payload) {
            tracing::error!(entity = %id, error = %err, "Failed to send world notification");
        }
    }
}
