//! Strategy for hosts that serialize all work on one logical thread.

use crate::entity::EntityRef;
use crate::error::Result;
use crate::strategy::ExecutionStrategy;
use crate::task::{guarded, run_guarded, Task};
use std::fmt;
use std::sync::Arc;

/// Host primitive: the single logical execution thread and its tick queue
pub trait TickHost: Send + Sync {
    /// Whether the caller is on the host's canonical thread
    fn is_primary_thread(&self) -> bool;

    /// Queue `task` to run on the canonical thread after `delay_ticks`
    /// (0 = next tick). Tasks with the same due tick run in submission order.
    fn schedule_sync_delayed(&self, task: Task, delay_ticks: u64) -> Result<()>;
}

const NAME: &str = "global-serial";

/// Everything runs on the host's primary thread; entity affinity is meaningless
/// here and collapses to global submission.
pub struct GlobalSerialStrategy {
    host: Arc<dyn TickHost>,
}

impl GlobalSerialStrategy {
    pub fn new(host: Arc<dyn TickHost>) -> Self {
        Self { host }
    }

    fn enqueue(&self, task: Task, delay_ticks: u64) {
        if let Err(err) = self.host.schedule_sync_delayed(guarded(NAME, task), delay_ticks) {
            tracing::error!(strategy = NAME, delay_ticks, error = %err, "Failed to schedule task");
        }
    }
}

impl ExecutionStrategy for GlobalSerialStrategy {
    fn name(&self) -> &'static str {
        NAME
    }

    fn submit_global(&self, task: Task) {
        if self.host.is_primary_thread() {
            run_guarded(NAME, task);
        } else {
            self.enqueue(task, 0);
        }
    }

    fn submit_for_entity(&self, _entity: &EntityRef, task: Task) {
        self.submit_global(task)
    }

    fn submit_for_entity_delayed(&self, _entity: &EntityRef, task: Task, delay_ticks: u64) {
        self.enqueue(task, delay_ticks)
    }

    fn submit_global_delayed(&self, delay_ticks: u64, task: Task) {
        self.enqueue(task, delay_ticks)
    }

    fn dispose_all(&self) {
        // The host's executor is shared, nothing here is ours to release
    }
}

impl fmt::Debug for GlobalSerialStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("GlobalSerialStrategy")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{ManualTickHost, SimEntity};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_inline_on_primary_thread() {
        let host = ManualTickHost::new();
        let strategy = GlobalSerialStrategy::new(host.clone());
        let ran = Arc::new(AtomicUsize::new(0));

        let r = ran.clone();
        strategy.submit_global(Box::new(move || {
            r.fetch_add(1, Ordering::SeqCst);
        }));

        // Ran before submit_global returned, nothing queued
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert_eq!(host.pending(), 0);
    }

    #[test]
    fn test_queued_from_other_thread() {
        let host = ManualTickHost::new();
        let strategy = Arc::new(GlobalSerialStrategy::new(host.clone()));
        let ran = Arc::new(AtomicUsize::new(0));

        let s = strategy.clone();
        let r = ran.clone();
        std::thread::spawn(move || {
            s.submit_global(Box::new(move || {
                r.fetch_add(1, Ordering::SeqCst);
            }));
        })
        .join()
        .unwrap();

        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(host.pending(), 1);
        host.advance(1);
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_entity_delay_maps_to_tick_queue() {
        let host = ManualTickHost::new();
        let strategy = GlobalSerialStrategy::new(host.clone());
        let entity: EntityRef = SimEntity::spawn(crate::WorldId::new_v4());
        let order = Arc::new(Mutex::new(Vec::new()));

        for (label, delay) in [("b", 2u64), ("a", 1u64)] {
            let order = order.clone();
            strategy.submit_for_entity_delayed(
                &entity,
                Box::new(move || order.lock().push(label)),
                delay,
            );
        }

        host.advance(1);
        assert_eq!(*order.lock(), vec!["a"]);
        host.advance(1);
        assert_eq!(*order.lock(), vec!["a", "b"]);
    }

    #[test]
    fn test_panicking_task_does_not_stop_queue() {
        let host = ManualTickHost::new();
        let strategy = GlobalSerialStrategy::new(host.clone());
        let entity: EntityRef = SimEntity::spawn(crate::WorldId::new_v4());
        let ran = Arc::new(AtomicUsize::new(0));

        strategy.submit_for_entity_delayed(&entity, Box::new(|| panic!("task failure")), 1);
        let r = ran.clone();
        strategy.submit_for_entity_delayed(
            &entity,
            Box::new(move || {
                r.fetch_add(1, Ordering::SeqCst);
            }),
            1,
        );

        host.advance(1);
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_host_rejection_is_logged_not_raised() {
        let host = ManualTickHost::new();
        host.reject_submissions(true);
        let strategy = GlobalSerialStrategy::new(host.clone());
        let entity: EntityRef = SimEntity::spawn(crate::WorldId::new_v4());

        strategy.submit_for_entity_delayed(&entity, Box::new(|| {}), 3);
        assert_eq!(host.pending(), 0);
    }
}
