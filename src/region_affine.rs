//! Strategy for hosts where entities live on concurrently ticking region threads.
//!
//! Entity-affine work goes to the scheduler of the region that owns the entity
//! when the task fires; everything else goes to the host's global region
//! scheduler. The host may retire an entity task (entity removed, region
//! unloaded) instead of running it. Our task is then simply never invoked, so
//! callers have to tolerate silent non-execution.

use crate::capability::{CapabilityRegistry, HandleTask, HostTaskHandle, RegionEntryPoints};
use crate::entity::EntityRef;
use crate::error::Result;
use crate::strategy::ExecutionStrategy;
use crate::task::{run_guarded, Task};
use crate::time::MIN_ENTITY_DELAY_TICKS;
use std::fmt;

const NAME: &str = "region-affine";

/// Delay actually requested from the host for entity-affine work
pub fn effective_delay(requested_ticks: u64) -> u64 {
    requested_ticks.max(MIN_ENTITY_DELAY_TICKS)
}

pub struct RegionAffineStrategy {
    entry: RegionEntryPoints,
}

impl RegionAffineStrategy {
    /// Resolve every region entry point from `capabilities`.
    ///
    /// Fails with the first missing or mis-shaped entry point.
    pub fn new(capabilities: &CapabilityRegistry) -> Result<Self> {
        let entry = RegionEntryPoints::resolve(capabilities)?;
        tracing::debug!(strategy = NAME, "Region entry points resolved");
        Ok(Self { entry })
    }

    fn execute_for_entity(&self, entity: &EntityRef, task: Task) -> Result<bool> {
        let scheduler = (self.entry.entity_scheduler)(entity)?;
        let run: Task = Box::new(move || {
            run_guarded(NAME, task);
        });
        (self.entry.execute)(&scheduler, run, None, MIN_ENTITY_DELAY_TICKS)
    }

    fn run_delayed_for_entity(&self, entity: &EntityRef, task: Task, delay_ticks: u64) -> Result<()> {
        let scheduler = (self.entry.entity_scheduler)(entity)?;
        let run: HandleTask = Box::new(move |_handle: HostTaskHandle| {
            run_guarded(NAME, task);
        });
        (self.entry.run_delayed)(&scheduler, run, None, effective_delay(delay_ticks))
    }

    fn run_global(&self, task: Task) -> Result<()> {
        let scheduler = (self.entry.global_scheduler)()?;
        let run: HandleTask = Box::new(move |_handle: HostTaskHandle| {
            run_guarded(NAME, task);
        });
        (self.entry.global_run)(&scheduler, run)
    }
}

impl ExecutionStrategy for RegionAffineStrategy {
    fn name(&self) -> &'static str {
        NAME
    }

    fn submit_global(&self, task: Task) {
        if let Err(err) = self.run_global(task) {
            tracing::error!(strategy = NAME, error = %err, "Failed to schedule task via global region scheduler");
        }
    }

    fn submit_for_entity(&self, entity: &EntityRef, task: Task) {
        match self.execute_for_entity(entity, task) {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(strategy = NAME, entity = %entity.id(), "Entity already retired, task dropped");
            }
            Err(err) => {
                tracing::error!(strategy = NAME, entity = %entity.id(), error = %err, "Failed to schedule entity task");
            }
        }
    }

    fn submit_for_entity_delayed(&self, entity: &EntityRef, task: Task, delay_ticks: u64) {
        if let Err(err) = self.run_delayed_for_entity(entity, task, delay_ticks) {
            tracing::error!(
                strategy = NAME,
                entity = %entity.id(),
                delay_ticks,
                error = %err,
                "Failed to schedule delayed entity task"
            );
        }
    }

    fn dispose_all(&self) {
        // Entry points reference host-owned schedulers
    }
}

impl fmt::Debug for RegionAffineStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RegionAffineStrategy")
    }
}
