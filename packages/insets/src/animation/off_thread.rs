//! Secondary-thread animation driver.
//!
//! Default animations for hosts without per-frame callbacks are sampled on a
//! dedicated thread. The thread never touches the controller: every frame and
//! the final "finished" notice are posted to the owner queue as
//! [`OwnerEvent`]s, which the owner applies in order.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use tokio::sync::mpsc::UnboundedSender;

use super::AnimationId;
use super::evaluator::InsetsAnimator;
use crate::scheduler::OwnerEvent;

/// Spawns a named thread, returning `false` if the OS refused.
pub(crate) fn spawn_named_thread<F>(name: &str, task: F) -> bool
where F: FnOnce() + Send + 'static {
    let thread_name = format!("insets-{name}");

    match thread::Builder::new().name(thread_name.clone()).spawn(task) {
        Ok(_) => true,
        Err(err) => {
            tracing::error!("Failed to spawn {thread_name}: {err}");
            false
        }
    }
}

/// Handle to an animation sampled on its own thread.
///
/// Dropping the handle stops the thread after its current frame.
#[derive(Debug)]
pub struct OffThreadDriver {
    cancelled: Arc<AtomicBool>,
}

impl OffThreadDriver {
    /// Starts sampling `animator` every `frame_interval`.
    ///
    /// If the thread cannot be spawned the animation is reported finished
    /// right away, so the owner still lands on the end state.
    #[must_use]
    pub fn spawn(
        id: AnimationId,
        animator: InsetsAnimator,
        frame_interval: Duration,
        events: UnboundedSender<OwnerEvent>,
    ) -> Self {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let fallback = events.clone();

        let spawned = spawn_named_thread("anim", move || {
            run(id, &animator, frame_interval, &events, &flag);
        });
        if !spawned {
            let _ = fallback.send(OwnerEvent::Finished { id, shown: animator.show });
        }

        Self { cancelled }
    }

    /// Stops the thread after its current frame.
    pub fn cancel(&self) { self.cancelled.store(true, Ordering::Release); }

    #[must_use]
    pub fn is_cancelled(&self) -> bool { self.cancelled.load(Ordering::Acquire) }
}

impl Drop for OffThreadDriver {
    fn drop(&mut self) { self.cancel(); }
}

fn run(
    id: AnimationId,
    animator: &InsetsAnimator,
    frame_interval: Duration,
    events: &UnboundedSender<OwnerEvent>,
    cancelled: &AtomicBool,
) {
    let started_at = Instant::now();
    loop {
        if cancelled.load(Ordering::Acquire) {
            tracing::trace!(animation = %id, "off-thread animation stopped");
            return;
        }
        let elapsed = started_at.elapsed();
        let sample = animator.sample(elapsed);
        if events.send(OwnerEvent::Frame { id, sample }).is_err() {
            return;
        }
        if animator.is_complete(elapsed) {
            let _ = events.send(OwnerEvent::Finished { id, shown: animator.show });
            return;
        }
        thread::sleep(frame_interval);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;
    use crate::animation::{AlphaCurve, Interpolator};
    use crate::types::Insets;

    fn animator(duration: Duration) -> InsetsAnimator {
        InsetsAnimator {
            start: Insets::NONE,
            end: Insets::new(0, 0, 0, 400),
            duration,
            interpolator: Interpolator::Linear,
            alpha: AlphaCurve::Opaque,
            show: true,
        }
    }

    #[test]
    fn test_spawn_named_thread_uses_prefix() {
        let (tx, rx) = std::sync::mpsc::channel();
        assert!(spawn_named_thread("name-test", move || {
            let name = thread::current().name().unwrap_or("").to_string();
            tx.send(name).unwrap();
        }));
        let name = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(name, "insets-name-test");
    }

    #[test]
    fn test_driver_runs_to_completion() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = AnimationId::new(3);
        let driver = OffThreadDriver::spawn(id, animator(Duration::from_millis(40)), Duration::from_millis(5), tx);

        let mut frames = 0;
        let mut last = None;
        loop {
            match rx.blocking_recv() {
                Some(OwnerEvent::Frame { id: frame_id, sample }) => {
                    assert_eq!(frame_id, id);
                    frames += 1;
                    last = Some(sample);
                }
                Some(OwnerEvent::Finished { id: finished, shown }) => {
                    assert_eq!(finished, id);
                    assert!(shown);
                    break;
                }
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert!(frames >= 2);
        assert_eq!(last.map(|sample| sample.insets), Some(Insets::new(0, 0, 0, 400)));
        drop(driver);
    }

    #[test]
    fn test_dropping_driver_stops_frames() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let driver = OffThreadDriver::spawn(
            AnimationId::new(1),
            animator(Duration::from_secs(10)),
            Duration::from_millis(5),
            tx,
        );
        assert!(matches!(rx.blocking_recv(), Some(OwnerEvent::Frame { .. })));
        drop(driver);

        // The thread exits and drops its sender, closing the channel without
        // ever reporting completion.
        while let Some(event) = rx.blocking_recv() {
            assert!(matches!(event, OwnerEvent::Frame { .. }));
        }
    }
}
