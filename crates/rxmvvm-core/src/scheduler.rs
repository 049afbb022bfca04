//! Virtual-time scheduler for deterministic stream tests.
//!
//! [`TestScheduler`] keeps a virtual clock and a priority queue of tasks
//! ordered by their due time. Nothing runs on its own: time only moves when
//! the test calls [`TestScheduler::advance_to`] or [`TestScheduler::start`],
//! at which point due tasks run in time order (and in scheduling order among
//! tasks due at the same instant) with the clock set to each task's due
//! time.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use parking_lot::Mutex;
//! use rxmvvm_core::TestScheduler;
//!
//! let scheduler = TestScheduler::new(0);
//! let log = Arc::new(Mutex::new(Vec::new()));
//!
//! for at in [300, 100, 200] {
//!     let log = log.clone();
//!     let clock = scheduler.clone();
//!     scheduler.schedule_at(at, move || log.lock().push(clock.clock()));
//! }
//!
//! scheduler.start();
//! assert_eq!(*log.lock(), vec![100, 200, 300]);
//! ```

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};

use crate::error::{Result, SchedulerError};
use crate::logging::{span_names, targets};

/// A point on the virtual clock, in abstract ticks.
pub type VirtualTime = u64;

new_key_type! {
    /// A unique identifier for a scheduled task.
    pub struct ScheduledTaskId;
}

/// A boxed task closure.
type BoxedTask = Box<dyn FnOnce() + Send + 'static>;

/// Internal scheduled task data.
struct ScheduledTaskData {
    /// When this task should execute.
    run_time: VirtualTime,
    /// The task closure to execute.
    task: BoxedTask,
}

/// An entry in the scheduler queue (min-heap by execution time, then by
/// scheduling order).
#[derive(Debug, Clone, Copy)]
struct SchedulerQueueEntry {
    id: ScheduledTaskId,
    run_time: VirtualTime,
    sequence: u64,
}

impl PartialEq for SchedulerQueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.run_time == other.run_time && self.sequence == other.sequence
    }
}

impl Eq for SchedulerQueueEntry {}

impl PartialOrd for SchedulerQueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SchedulerQueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap (BinaryHeap is max-heap by default).
        other
            .run_time
            .cmp(&self.run_time)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

struct SchedulerState {
    clock: VirtualTime,
    tasks: SlotMap<ScheduledTaskId, ScheduledTaskData>,
    queue: BinaryHeap<SchedulerQueueEntry>,
    next_sequence: u64,
}

impl SchedulerState {
    /// Pop the next live task due at or before `limit`.
    fn pop_due(&mut self, limit: VirtualTime) -> Option<(ScheduledTaskId, ScheduledTaskData)> {
        while let Some(entry) = self.queue.peek().copied() {
            if entry.run_time > limit {
                return None;
            }
            self.queue.pop();
            // Cancelled tasks leave their queue entry behind.
            if let Some(task) = self.tasks.remove(entry.id) {
                return Some((entry.id, task));
            }
        }
        None
    }
}

/// A deterministic scheduler driven by a virtual clock.
///
/// Cloning yields another handle to the same clock and queue, so tasks can
/// capture the scheduler to schedule follow-up work or read the clock.
#[derive(Clone)]
pub struct TestScheduler {
    state: Arc<Mutex<SchedulerState>>,
}

impl Default for TestScheduler {
    fn default() -> Self {
        Self::new(0)
    }
}

impl TestScheduler {
    /// Create a scheduler whose clock starts at `initial_clock`.
    pub fn new(initial_clock: VirtualTime) -> Self {
        Self {
            state: Arc::new(Mutex::new(SchedulerState {
                clock: initial_clock,
                tasks: SlotMap::with_key(),
                queue: BinaryHeap::new(),
                next_sequence: 0,
            })),
        }
    }

    /// The current virtual time.
    pub fn clock(&self) -> VirtualTime {
        self.state.lock().clock
    }

    /// Schedule a task at an absolute virtual time.
    ///
    /// A time in the past is treated as "now": the task runs on the next
    /// processing pass without moving the clock backwards.
    pub fn schedule_at<F>(&self, time: VirtualTime, task: F) -> ScheduledTaskId
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.state.lock();
        let run_time = time.max(state.clock);
        let id = state.tasks.insert(ScheduledTaskData {
            run_time,
            task: Box::new(task),
        });
        let sequence = state.next_sequence;
        state.next_sequence += 1;
        state.queue.push(SchedulerQueueEntry {
            id,
            run_time,
            sequence,
        });
        id
    }

    /// Schedule a task `delay` ticks after the current virtual time.
    pub fn schedule_after<F>(&self, delay: VirtualTime, task: F) -> ScheduledTaskId
    where
        F: FnOnce() + Send + 'static,
    {
        let now = self.clock();
        self.schedule_at(now.saturating_add(delay), task)
    }

    /// Cancel a pending task.
    ///
    /// Returns an error if the task has already run or was already
    /// cancelled.
    pub fn cancel(&self, id: ScheduledTaskId) -> Result<()> {
        match self.state.lock().tasks.remove(id) {
            Some(_) => Ok(()),
            None => Err(SchedulerError::InvalidTaskId.into()),
        }
    }

    /// Whether a task is still waiting to run.
    pub fn is_pending(&self, id: ScheduledTaskId) -> bool {
        self.state.lock().tasks.contains_key(id)
    }

    /// Number of tasks waiting to run.
    pub fn pending_count(&self) -> usize {
        self.state.lock().tasks.len()
    }

    /// The due time of the earliest pending task.
    pub fn next_due(&self) -> Option<VirtualTime> {
        let state = self.state.lock();
        state
            .tasks
            .values()
            .map(|task| task.run_time)
            .min()
    }

    /// Run every task due at or before `time`, then set the clock to `time`
    /// (or leave it where it is if it is already later).
    ///
    /// Tasks scheduled by running tasks are picked up in the same pass when
    /// they fall within the limit. Returns the number of tasks executed.
    pub fn advance_to(&self, time: VirtualTime) -> usize {
        let executed = self.run_until(time);
        let mut state = self.state.lock();
        state.clock = state.clock.max(time);
        executed
    }

    /// Advance the clock by `delta` ticks, running due tasks.
    pub fn advance_by(&self, delta: VirtualTime) -> usize {
        let target = self.clock().saturating_add(delta);
        self.advance_to(target)
    }

    /// Run tasks until the queue is empty. The clock ends at the due time
    /// of the last executed task.
    pub fn start(&self) -> usize {
        let _span =
            tracing::trace_span!(target: targets::SCHEDULER, span_names::SCHEDULER).entered();
        self.run_until(VirtualTime::MAX)
    }

    fn run_until(&self, limit: VirtualTime) -> usize {
        let mut executed_count = 0;
        loop {
            // Take the task out and release the lock: tasks schedule more work.
            let next = {
                let mut state = self.state.lock();
                let next = state.pop_due(limit);
                if let Some((_, task)) = &next {
                    state.clock = state.clock.max(task.run_time);
                }
                next
            };
            let Some((id, task)) = next else {
                break;
            };

            tracing::trace!(
                target: targets::SCHEDULER,
                ?id,
                time = task.run_time,
                "executing scheduled task"
            );
            (task.task)();
            executed_count += 1;
        }
        executed_count
    }
}

static_assertions::assert_impl_all!(TestScheduler: Send, Sync);
