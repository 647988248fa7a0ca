//! Fire-and-forget task units

use crate::entity::EntityRef;
use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// A unit of work. Runs at most once, returns nothing.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Where a task has to run
#[derive(Clone, Default)]
pub enum Affinity {
    /// Host's canonical (global) context
    #[default]
    Global,
    /// Whatever thread owns the entity's region when the task fires
    Entity(EntityRef),
}

impl fmt::Debug for Affinity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Affinity::Global => write!(f, "Global"),
            Affinity::Entity(entity) => write!(f, "Entity({})", entity.id()),
        }
    }
}

/// Task plus its routing. Consumed by [`crate::ExecutionStrategy::submit`].
pub struct ScheduledTask {
    pub task: Task,
    pub affinity: Affinity,
    /// Lower bound in ticks; `None` means "as soon as possible"
    pub delay_ticks: Option<u64>,
}

impl ScheduledTask {
    pub fn global(task: impl FnOnce() + Send + 'static) -> Self {
        Self {
            task: Box::new(task),
            affinity: Affinity::Global,
            delay_ticks: None,
        }
    }

    pub fn for_entity(entity: EntityRef, task: impl FnOnce() + Send + 'static) -> Self {
        Self {
            task: Box::new(task),
            affinity: Affinity::Entity(entity),
            delay_ticks: None,
        }
    }

    /// Defer by at least `ticks`
    pub fn after(mut self, ticks: u64) -> Self {
        self.delay_ticks = Some(ticks);
        self
    }
}

impl fmt::Debug for ScheduledTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledTask")
            .field("affinity", &self.affinity)
            .field("delay_ticks", &self.delay_ticks)
            .finish_non_exhaustive()
    }
}

/// Run `task`, containing any panic so the executing thread survives.
///
/// Returns `false` when the task panicked.
pub fn run_guarded(strategy: &'static str, task: Task) -> bool {
    match catch_unwind(AssertUnwindSafe(task)) {
        Ok(()) => true,
        Err(payload) => {
            tracing::error!(
                strategy,
                cause = %panic_message(payload.as_ref()),
                "Failed to execute the task"
            );
            false
        }
    }
}

/// Wrap `task` so that running it goes through [`run_guarded`]
pub fn guarded(strategy: &'static str, task: Task) -> Task {
    Box::new(move || {
        run_guarded(strategy, task);
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
