//! Execution strategy contract and host-capability based selection.

use crate::capability::CapabilityRegistry;
use crate::entity::EntityRef;
use crate::error::{Result, SyncError};
use crate::global_serial::{GlobalSerialStrategy, TickHost};
use crate::isolated::IsolatedThreadStrategy;
use crate::region_affine::RegionAffineStrategy;
use crate::task::{Affinity, ScheduledTask, Task};
use std::sync::Arc;

/// Capability contract every host concurrency model satisfies.
///
/// All submissions are fire-and-forget: nothing is returned, submission
/// failures are logged by the strategy, and a panicking task is contained and
/// logged without affecting later submissions.
pub trait ExecutionStrategy: Send + Sync {
    /// Strategy name for logging
    fn name(&self) -> &'static str;

    /// Run `task` on the host's canonical context
    fn submit_global(&self, task: Task);

    /// Run `task` on whatever context owns `entity`
    fn submit_for_entity(&self, entity: &EntityRef, task: Task);

    /// Like [`ExecutionStrategy::submit_for_entity`], deferred by at least `delay_ticks`
    fn submit_for_entity_delayed(&self, entity: &EntityRef, task: Task, delay_ticks: u64);

    /// Release owned resources. Idempotent.
    fn dispose_all(&self);

    /// Route a [`ScheduledTask`] to the matching submission call
    fn submit(&self, scheduled: ScheduledTask) {
        let ScheduledTask {
            task,
            affinity,
            delay_ticks,
        } = scheduled;
        match (affinity, delay_ticks) {
            (Affinity::Entity(entity), Some(delay)) => {
                self.submit_for_entity_delayed(&entity, task, delay)
            }
            (Affinity::Entity(entity), None) => self.submit_for_entity(&entity, task),
            (Affinity::Global, None) => self.submit_global(task),
            (Affinity::Global, Some(delay)) => self.submit_global_delayed(delay, task),
        }
    }

    /// Global work with a delay. Strategies without a global delayed primitive
    /// may override; the default runs immediately.
    fn submit_global_delayed(&self, _delay_ticks: u64, task: Task) {
        self.submit_global(task)
    }
}

/// Which strategy to build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    GlobalSerial,
    RegionAffine,
    IsolatedThread,
}

/// What the host offers, detected once at startup
#[derive(Default)]
pub struct HostEnvironment {
    /// Region scheduling entry points, if the host publishes any
    pub capabilities: CapabilityRegistry,
    /// Single-thread tick scheduler, if the host has one
    pub tick_host: Option<Arc<dyn TickHost>>,
}

impl HostEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capabilities(mut self, capabilities: CapabilityRegistry) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_tick_host(mut self, host: Arc<dyn TickHost>) -> Self {
        self.tick_host = Some(host);
        self
    }

    /// Most capable model the host advertises
    pub fn detect(&self) -> StrategyKind {
        if self.capabilities.advertises_regions() {
            StrategyKind::RegionAffine
        } else if self.tick_host.is_some() {
            StrategyKind::GlobalSerial
        } else {
            StrategyKind::IsolatedThread
        }
    }
}

/// Build exactly the requested strategy, failing if the host cannot support it.
pub fn build_strategy(
    env: &HostEnvironment,
    kind: StrategyKind,
) -> Result<Arc<dyn ExecutionStrategy>> {
    let strategy: Arc<dyn ExecutionStrategy> = match kind {
        StrategyKind::RegionAffine => Arc::new(RegionAffineStrategy::new(&env.capabilities)?),
        StrategyKind::GlobalSerial => {
            let host = env.tick_host.clone().ok_or_else(|| {
                SyncError::StrategyUnavailable("host has no tick scheduler".to_string())
            })?;
            Arc::new(GlobalSerialStrategy::new(host))
        }
        StrategyKind::IsolatedThread => Arc::new(IsolatedThreadStrategy::new()?),
    };
    Ok(strategy)
}

/// Detect the host model and build its strategy, stepping down to a simpler
/// model when construction fails.
///
/// Order: region-affine, global-serial, isolated thread.
pub fn select_strategy(env: &HostEnvironment) -> Result<Arc<dyn ExecutionStrategy>> {
    let mut kind = env.detect();
    loop {
        match build_strategy(env, kind) {
            Ok(strategy) => {
                tracing::debug!(strategy = strategy.name(), "Execution strategy selected");
                return Ok(strategy);
            }
            Err(err) => {
                let next = match kind {
                    StrategyKind::RegionAffine if env.tick_host.is_some() => {
                        StrategyKind::GlobalSerial
                    }
                    StrategyKind::RegionAffine | StrategyKind::GlobalSerial => {
                        StrategyKind::IsolatedThread
                    }
                    StrategyKind::IsolatedThread => return Err(err),
                };
                tracing::warn!(
                    failed = ?kind,
                    fallback = ?next,
                    error = %err,
                    "Execution strategy unavailable, falling back"
                );
                kind = next;
            }
        }
    }
}
