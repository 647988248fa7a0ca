//! Named host entry points.
//!
//! A host that supports region-affine scheduling publishes its scheduling
//! primitives into a [`CapabilityRegistry`] under well-known names. Strategies
//! resolve the names they need once, at construction time, and downcast each
//! entry to the typed shape they expect. A missing name and a wrongly shaped
//! entry are reported as distinct errors.

use crate::entity::EntityRef;
use crate::error::{Result, SyncError};
use crate::task::Task;
use ahash::AHashMap;
use std::any::{type_name, Any};
use std::sync::Arc;

/// Opaque host-owned object (a scheduler instance)
pub type HostObject = Arc<dyn Any + Send + Sync>;

/// Opaque handle the host passes to a running task
pub type HostTaskHandle = Arc<dyn Any + Send + Sync>;

/// Task that receives the host's handle for itself
pub type HandleTask = Box<dyn FnOnce(HostTaskHandle) + Send + 'static>;

/// `Entity::scheduler` - per-entity scheduler accessor
pub type EntitySchedulerFn = Arc<dyn Fn(&EntityRef) -> Result<HostObject> + Send + Sync>;

/// `EntityScheduler::execute(run, retired, delay)` - returns `false` if the entity is already retired
pub type EntityExecuteFn =
    Arc<dyn Fn(&HostObject, Task, Option<Task>, u64) -> Result<bool> + Send + Sync>;

/// `EntityScheduler::run_delayed(run, retired, delay)`
pub type EntityRunDelayedFn =
    Arc<dyn Fn(&HostObject, HandleTask, Option<Task>, u64) -> Result<()> + Send + Sync>;

/// `Server::global_region_scheduler` - cross-region scheduler accessor
pub type GlobalSchedulerFn = Arc<dyn Fn() -> Result<HostObject> + Send + Sync>;

/// `GlobalRegionScheduler::run(task)`
pub type GlobalRunFn = Arc<dyn Fn(&HostObject, HandleTask) -> Result<()> + Send + Sync>;

pub const ENTITY_SCHEDULER: &str = "Entity::scheduler";
pub const ENTITY_EXECUTE: &str = "EntityScheduler::execute";
pub const ENTITY_RUN_DELAYED: &str = "EntityScheduler::run_delayed";
pub const GLOBAL_REGION_SCHEDULER: &str = "Server::global_region_scheduler";
pub const GLOBAL_RUN: &str = "GlobalRegionScheduler::run";

/// Every name a region host must publish
pub const REGION_ENTRY_POINTS: [&str; 5] = [
    ENTITY_SCHEDULER,
    ENTITY_EXECUTE,
    ENTITY_RUN_DELAYED,
    GLOBAL_REGION_SCHEDULER,
    GLOBAL_RUN,
];

/// Registry of host entry points keyed by name
#[derive(Default)]
pub struct CapabilityRegistry {
    entries: AHashMap<&'static str, Box<dyn Any + Send + Sync>>,
}

impl CapabilityRegistry {
    /// Create empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish an entry point, replacing any previous one with the same name
    pub fn register<T: Any + Send + Sync>(&mut self, name: &'static str, entry: T) -> &mut Self {
        self.entries.insert(name, Box::new(entry));
        self
    }

    /// Withdraw an entry point
    pub fn remove(&mut self, name: &str) -> bool {
        self.entries.remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the host advertises region scheduling at all
    pub fn advertises_regions(&self) -> bool {
        REGION_ENTRY_POINTS.iter().any(|name| self.contains(name))
    }

    /// Look up `name` and downcast it to `T`
    pub fn resolve<T: Any + Clone>(&self, name: &'static str) -> Result<T> {
        let entry = self
            .entries
            .get(name)
            .ok_or(SyncError::CapabilityMissing { name })?;
        entry
            .downcast_ref::<T>()
            .cloned()
            .ok_or(SyncError::CapabilityShape {
                name,
                expected: type_name::<T>(),
            })
    }
}

/// The full set of resolved region entry points.
///
/// Either every entry point resolves or construction fails; there is no
/// partially resolved value.
#[derive(Clone)]
pub struct RegionEntryPoints {
    pub entity_scheduler: EntitySchedulerFn,
    pub execute: EntityExecuteFn,
    pub run_delayed: EntityRunDelayedFn,
    pub global_scheduler: GlobalSchedulerFn,
    pub global_run: GlobalRunFn,
}

impl RegionEntryPoints {
    pub fn resolve(registry: &CapabilityRegistry) -> Result<Self> {
        Ok(Self {
            entity_scheduler: registry.resolve(ENTITY_SCHEDULER)?,
            execute: registry.resolve(ENTITY_EXECUTE)?,
            run_delayed: registry.resolve(ENTITY_RUN_DELAYED)?,
            global_scheduler: registry.resolve(GLOBAL_REGION_SCHEDULER)?,
            global_run: registry.resolve(GLOBAL_RUN)?,
        })
    }
}
