//! Fallback strategy: one dedicated background thread with a delay queue.
//!
//! Used when the host offers no usable concurrency model. Affinity is ignored.
//! Disposing stops the worker after it has run the immediate tasks already
//! handed to it; delayed tasks that have not fired yet are discarded.

use crate::entity::EntityRef;
use crate::error::{Result, SyncError};
use crate::queue::TimedQueue;
use crate::strategy::ExecutionStrategy;
use crate::task::{run_guarded, Task};
use crate::time::ticks_to_duration;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Instant;

const NAME: &str = "isolated-thread";

/// Default worker thread name
pub const WORKER_THREAD_NAME: &str = "worldsync-isolated";

enum Command {
    Run(Task),
    RunAt(Instant, Task),
    Shutdown,
}

pub struct IsolatedThreadStrategy {
    sender: Sender<Command>,
    disposed: AtomicBool,
    thread_name: String,
}

impl IsolatedThreadStrategy {
    /// Start the worker thread
    pub fn new() -> Result<Self> {
        Self::with_thread_name(WORKER_THREAD_NAME)
    }

    pub fn with_thread_name(name: impl Into<String>) -> Result<Self> {
        let thread_name = name.into();
        let (sender, receiver) = channel::unbounded();
        thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || Worker::new(receiver).run())
            .map_err(|e| SyncError::WorkerSpawn(e.to_string()))?;
        tracing::debug!(strategy = NAME, thread = %thread_name, "Worker thread started");
        Ok(Self {
            sender,
            disposed: AtomicBool::new(false),
            thread_name,
        })
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn send(&self, command: Command) {
        if self.is_disposed() {
            let err = SyncError::Rejected("strategy disposed".to_string());
            tracing::error!(strategy = NAME, error = %err, "Failed to schedule task");
            return;
        }
        if self.sender.send(command).is_err() {
            let err = SyncError::Rejected("worker thread gone".to_string());
            tracing::error!(strategy = NAME, error = %err, "Failed to schedule task");
        }
    }

    fn send_delayed(&self, task: Task, delay_ticks: u64) {
        if delay_ticks == 0 {
            self.send(Command::Run(task));
        } else {
            let due = Instant::now() + ticks_to_duration(delay_ticks);
            self.send(Command::RunAt(due, task));
        }
    }
}

impl ExecutionStrategy for IsolatedThreadStrategy {
    fn name(&self) -> &'static str {
        NAME
    }

    fn submit_global(&self, task: Task) {
        self.send(Command::Run(task));
    }

    fn submit_for_entity(&self, _entity: &EntityRef, task: Task) {
        self.send(Command::Run(task));
    }

    fn submit_for_entity_delayed(&self, _entity: &EntityRef, task: Task, delay_ticks: u64) {
        self.send_delayed(task, delay_ticks);
    }

    fn submit_global_delayed(&self, delay_ticks: u64, task: Task) {
        self.send_delayed(task, delay_ticks);
    }

    fn dispose_all(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        // Worker may already be gone; nothing left to stop then
        let _ = self.sender.send(Command::Shutdown);
        tracing::debug!(strategy = NAME, thread = %self.thread_name, "Worker shutdown requested");
    }
}

impl Drop for IsolatedThreadStrategy {
    fn drop(&mut self) {
        self.dispose_all();
    }
}

impl fmt::Debug for IsolatedThreadStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IsolatedThreadStrategy")
            .field("thread", &self.thread_name)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

struct Worker {
    receiver: Receiver<Command>,
    delayed: TimedQueue<Instant, Task>,
}

impl Worker {
    fn new(receiver: Receiver<Command>) -> Self {
        Self {
            receiver,
            delayed: TimedQueue::new(),
        }
    }

    fn run(mut self) {
        loop {
            self.run_due();

            let command = match self.delayed.next_due() {
                Some(due) => {
                    let wait = due.saturating_duration_since(Instant::now());
                    match self.receiver.recv_timeout(wait) {
                        Ok(command) => command,
                        Err(RecvTimeoutError::Timeout) => continue,
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                None => match self.receiver.recv() {
                    Ok(command) => command,
                    Err(_) => break,
                },
            };

            match command {
                Command::Run(task) => {
                    run_guarded(NAME, task);
                }
                Command::RunAt(due, task) => self.delayed.push(due, task),
                Command::Shutdown => break,
            }
        }

        if !self.delayed.is_empty() {
            tracing::debug!(
                strategy = NAME,
                discarded = self.delayed.len(),
                "Discarding delayed tasks on shutdown"
            );
        }
    }

    fn run_due(&mut self) {
        let now = Instant::now();
        while let Some(task) = self.delayed.pop_due(now) {
            run_guarded(NAME, task);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_runs_on_named_worker_thread() {
        let strategy = IsolatedThreadStrategy::with_thread_name("isolated-test").unwrap();
        let (tx, rx) = channel::bounded(1);
        strategy.submit_global(Box::new(move || {
            let name = thread::current().name().map(str::to_string);
            tx.send(name).unwrap();
        }));
        let name = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(name.as_deref(), Some("isolated-test"));
    }

    #[test]
    fn test_delayed_order() {
        let strategy = IsolatedThreadStrategy::new().unwrap();
        let (tx, rx) = channel::unbounded();
        for (label, delay) in [("late", 4u64), ("early", 1u64)] {
            let tx = tx.clone();
            strategy.submit_global_delayed(delay, Box::new(move || tx.send(label).unwrap()));
        }
        let first = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        let second = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!((first, second), ("early", "late"));
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let strategy = IsolatedThreadStrategy::new().unwrap();
        strategy.dispose_all();
        strategy.dispose_all();
        assert!(strategy.is_disposed());
    }
}
