//! Switch bus: the only path by which other threads reach the display thread.
//!
//! Any number of [`SwitchBus`] handles may submit commands. Exactly one
//! [`SwitchConsumer`] exists per bus and it drains commands in the order the
//! producers acquired the queue lock. The consumer parks on a condition
//! variable while the queue is empty; producers only ever hold the lock long
//! enough to push a command.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Request to make the surface bound to `key` the visible one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchCommand {
    key: String,
}

impl SwitchCommand {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn into_key(self) -> String {
        self.key
    }
}

#[derive(Debug, Default)]
struct BusState {
    queue: VecDeque<SwitchCommand>,
    shut_down: bool,
}

#[derive(Debug, Default)]
struct BusInner {
    state: Mutex<BusState>,
    ready: Condvar,
}

impl BusInner {
    // Nothing panics while holding the queue lock, so a poisoned guard still
    // holds a consistent queue.
    fn lock(&self) -> MutexGuard<'_, BusState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Create a bus and its single consumer.
pub fn switch_bus() -> (SwitchBus, SwitchConsumer) {
    let inner = Arc::new(BusInner::default());
    (
        SwitchBus {
            inner: Arc::clone(&inner),
        },
        SwitchConsumer { inner },
    )
}

/// Producer handle. Cheap to clone and safe to share across threads.
#[derive(Debug, Clone)]
pub struct SwitchBus {
    inner: Arc<BusInner>,
}

impl SwitchBus {
    /// Enqueue a switch command. Fire-and-forget: the key is not validated
    /// here and nothing is reported back. Submissions after shutdown are
    /// discarded.
    pub fn submit(&self, key: impl Into<String>) {
        let command = SwitchCommand::new(key);
        {
            let mut state = self.inner.lock();
            if state.shut_down {
                return;
            }
            state.queue.push_back(command);
        }
        self.inner.ready.notify_one();
    }

    /// Wake the consumer and stop accepting commands. Commands already queued
    /// are still delivered before the consumer observes the shutdown.
    pub fn shutdown(&self) {
        self.inner.lock().shut_down = true;
        self.inner.ready.notify_all();
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.lock().shut_down
    }

    /// Number of commands waiting for the consumer.
    pub fn pending(&self) -> usize {
        self.inner.lock().queue.len()
    }
}

/// The single consuming end of a [`SwitchBus`]. Not `Clone`.
#[derive(Debug)]
pub struct SwitchConsumer {
    inner: Arc<BusInner>,
}

impl SwitchConsumer {
    /// Block until a command is available. Returns `None` once the bus has
    /// been shut down and the queue is drained.
    pub fn recv(&self) -> Option<SwitchCommand> {
        let mut state = self.inner.lock();
        loop {
            if let Some(command) = state.queue.pop_front() {
                return Some(command);
            }
            if state.shut_down {
                return None;
            }
            state = self
                .inner
                .ready
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Like [`recv`](Self::recv) but gives up after `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<SwitchCommand> {
        let deadline = Instant::now() + timeout;
        let mut state = self.inner.lock();
        loop {
            if let Some(command) = state.queue.pop_front() {
                return Some(command);
            }
            if state.shut_down {
                return None;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            state = self
                .inner
                .ready
                .wait_timeout(state, remaining)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner().0);
        }
    }

    pub fn try_recv(&self) -> Option<SwitchCommand> {
        self.inner.lock().queue.pop_front()
    }

    /// A producer handle for the same bus.
    pub fn bus(&self) -> SwitchBus {
        SwitchBus {
            inner: Arc::clone(&self.inner),
        }
    }
}
