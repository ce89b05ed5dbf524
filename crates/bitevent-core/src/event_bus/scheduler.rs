//! Priority scheduling seam.
//!
//! The bus never decides on its own when deferred deliveries run. It hands
//! them to a [`PriorityScheduler`] tagged with [`Priority::Normal`], and the
//! host decides what that lane means. Two implementations ship with the
//! crate:
//! - [`InlineScheduler`] runs every task immediately (the default, and the
//!   synchronous stand-in for tests and hosts without a render loop)
//! - [`QueuedScheduler`] holds tasks until the host calls
//!   [`run_pending`](QueuedScheduler::run_pending) from its commit phase

use parking_lot::Mutex;
use std::collections::VecDeque;

use crate::types::Task;

/// Host scheduling lanes, most urgent first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    /// Must run before anything else.
    Immediate,
    /// Direct responses to user input.
    UserBlocking,
    /// Ordinary work; event delivery runs here.
    Normal,
    /// Work that can wait behind ordinary updates.
    Low,
    /// Only when nothing else is pending.
    Idle,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Immediate => write!(f, "Immediate"),
            Priority::UserBlocking => write!(f, "UserBlocking"),
            Priority::Normal => write!(f, "Normal"),
            Priority::Low => write!(f, "Low"),
            Priority::Idle => write!(f, "Idle"),
        }
    }
}

/// Runs a batch of work at a given priority
pub trait PriorityScheduler: Send + Sync {
    /// Run `task` in the `priority` lane, now or later
    fn run_with_priority(&self, priority: Priority, task: Task);
}

/// Runs every task synchronously on the calling thread
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineScheduler;

impl PriorityScheduler for InlineScheduler {
    fn run_with_priority(&self, _priority: Priority, task: Task) {
        task();
    }
}

/// Holds tasks until the host drains them.
///
/// [`run_pending`](Self::run_pending) runs the most urgent lane first and
/// keeps submission order within a lane.
#[derive(Default)]
pub struct QueuedScheduler {
    queue: Mutex<VecDeque<(Priority, Task)>>,
}

impl QueuedScheduler {
    /// Create an empty scheduler
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued tasks
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Run queued tasks until the queue is empty, returning how many ran.
    ///
    /// Tasks queued by running tasks are picked up in the same call.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while let Some(task) = self.next() {
            task();
            ran += 1;
        }
        ran
    }

    fn next(&self) -> Option<Task> {
        let mut queue = self.queue.lock();
        let urgent = queue.iter().map(|(priority, _)| *priority).min()?;
        let index = queue.iter().position(|(priority, _)| *priority == urgent)?;
        queue.remove(index).map(|(_, task)| task)
    }
}

impl PriorityScheduler for QueuedScheduler {
    fn run_with_priority(&self, priority: Priority, task: Task) {
        self.queue.lock().push_back((priority, task));
    }
}

impl std::fmt::Debug for QueuedScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueuedScheduler")
            .field("pending", &self.pending())
            .finish()
    }
}
