//! The controller's owner queue.
//!
//! Deferred work (pre-draw animation starts, the keyboard negotiation
//! timeout, deferred show requests) is kept as explicit [`Task`]s with
//! cancellable [`TaskHandle`]s instead of ambient handler posts. Work from
//! other threads arrives as [`OwnerEvent`]s on an unbounded channel and is
//! drained by the same loop.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::animation::{AnimationId, FrameSample};
use crate::types::InsetTypes;

// ============================================================================
// Clocks
// ============================================================================

/// Source of the current time for timers and in-process animations.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> Instant;
}

/// Wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant { Instant::now() }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    #[must_use]
    pub fn new() -> Arc<Self> { Arc::new(Self { now: Mutex::new(Instant::now()) }) }

    pub fn advance(&self, by: Duration) { *self.now.lock() += by; }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant { *self.now.lock() }
}

// ============================================================================
// Tasks
// ============================================================================

/// Identifier of a parked keyboard control request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

impl RequestId {
    #[must_use]
    pub const fn new(id: u64) -> Self { Self(id) }
}

/// Deferred work run on the owner queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Task {
    /// Dispatch the start of an animation before the next draw.
    DispatchStart(AnimationId),
    /// The keyboard service did not answer in time.
    PendingControlTimeout(RequestId),
    /// Show types whose user animation was cancelled by an uncontrollable frame.
    Show(InsetTypes),
    /// Tell controllable-insets listeners the controllable set changed.
    InvokeControllableListeners,
}

/// Handle to a scheduled task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskHandle(u64);

#[derive(Debug)]
struct Scheduled {
    handle: TaskHandle,
    due: Instant,
    task: Task,
}

/// Tasks ordered by due time, then by posting order.
#[derive(Debug, Default)]
pub struct TaskQueue {
    next_handle: u64,
    tasks: Vec<Scheduled>,
}

impl TaskQueue {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Schedules a task to run as soon as possible.
    pub fn post(&mut self, now: Instant, task: Task) -> TaskHandle {
        self.post_delayed(now, Duration::ZERO, task)
    }

    /// Schedules a task to run once `delay` has elapsed.
    pub fn post_delayed(&mut self, now: Instant, delay: Duration, task: Task) -> TaskHandle {
        let handle = TaskHandle(self.next_handle);
        self.next_handle += 1;
        self.tasks.push(Scheduled { handle, due: now + delay, task });
        handle
    }

    /// Removes a scheduled task. Returns `false` if it already ran.
    pub fn cancel(&mut self, handle: TaskHandle) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|scheduled| scheduled.handle != handle);
        self.tasks.len() != before
    }

    /// Removes every scheduled occurrence of `task`.
    pub fn remove(&mut self, task: Task) { self.tasks.retain(|scheduled| scheduled.task != task); }

    /// Pops the earliest task due at `now`.
    pub fn pop_due(&mut self, now: Instant) -> Option<Task> {
        let index = self
            .tasks
            .iter()
            .enumerate()
            .filter(|(_, scheduled)| scheduled.due <= now)
            .min_by_key(|(_, scheduled)| (scheduled.due, scheduled.handle))
            .map(|(index, _)| index)?;
        Some(self.tasks.remove(index).task)
    }

    /// When the next task becomes due.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.tasks.iter().map(|scheduled| scheduled.due).min()
    }

    #[must_use]
    pub fn len(&self) -> usize { self.tasks.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.tasks.is_empty() }
}

// ============================================================================
// Owner Events
// ============================================================================

/// Work posted to the owner queue from other threads.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum OwnerEvent {
    /// A frame computed by the off-thread driver.
    Frame { id: AnimationId, sample: FrameSample },
    /// The off-thread driver reached the end of its animation.
    Finished { id: AnimationId, shown: bool },
    /// A caller cancelled a running animation.
    CancelAnimation(AnimationId),
    /// A caller cancelled a parked keyboard request.
    CancelPending(RequestId),
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::new();
        let start = clock.now();
        clock.advance(Duration::from_millis(16));
        assert_eq!(clock.now() - start, Duration::from_millis(16));
    }

    #[test]
    fn test_tasks_run_in_due_then_post_order() {
        let clock = ManualClock::new();
        let mut queue = TaskQueue::new();
        let now = clock.now();
        queue.post_delayed(now, Duration::from_millis(10), Task::Show(InsetTypes::IME));
        queue.post(now, Task::InvokeControllableListeners);
        queue.post(now, Task::Show(InsetTypes::STATUS_BARS));

        assert_eq!(queue.pop_due(now), Some(Task::InvokeControllableListeners));
        assert_eq!(queue.pop_due(now), Some(Task::Show(InsetTypes::STATUS_BARS)));
        assert_eq!(queue.pop_due(now), None);
        assert_eq!(queue.next_deadline(), Some(now + Duration::from_millis(10)));

        clock.advance(Duration::from_millis(10));
        assert_eq!(queue.pop_due(clock.now()), Some(Task::Show(InsetTypes::IME)));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_cancel_task() {
        let now = Instant::now();
        let mut queue = TaskQueue::new();
        let handle = queue.post(now, Task::PendingControlTimeout(RequestId::new(1)));
        assert!(queue.cancel(handle));
        assert!(!queue.cancel(handle));
        assert_eq!(queue.pop_due(now), None);
    }

    #[test]
    fn test_remove_task_kind() {
        let now = Instant::now();
        let mut queue = TaskQueue::new();
        queue.post(now, Task::InvokeControllableListeners);
        queue.post(now, Task::InvokeControllableListeners);
        queue.post(now, Task::Show(InsetTypes::IME));
        queue.remove(Task::InvokeControllableListeners);
        assert_eq!(queue.len(), 1);
    }
}
