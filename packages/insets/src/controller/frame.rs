//! Animation drivers, frame ticks and host dispatch.
//!
//! Frames from every animation are coalesced: each runner records its next
//! frame, and one animation callback per host frame applies all of them to a
//! copy of the live snapshot and dispatches a single progress update. The
//! live snapshot itself only ever holds shown or hidden targets.

use std::time::{Duration, Instant};

use smallvec::SmallVec;
use tokio::sync::mpsc::UnboundedReceiver;

use super::{Driver, InsetsController, ListenerCall};
use crate::animation::evaluator::InsetsAnimator;
use crate::animation::off_thread::OffThreadDriver;
use crate::animation::{AnimationId, InsetsAnimation};
use crate::error::{InsetsError, InsetsResult};
use crate::scheduler::{OwnerEvent, Task};
use crate::types::{AnimationKind, InsetTypes};

type AnimationList = SmallVec<[InsetsAnimation; 4]>;

impl InsetsController {
    // ========================================================================
    // Drivers
    // ========================================================================

    /// Drives a ready animation with a time-based animator.
    ///
    /// Animations created for hosts without animation callbacks are sampled
    /// on a secondary thread; all others are sampled on each
    /// [`Self::on_animation_frame`]. The first frame is applied right away.
    ///
    /// # Errors
    ///
    /// Returns [`InsetsError::UnknownAnimation`] if the animation is gone.
    pub fn drive_animation(&mut self, id: AnimationId, animator: InsetsAnimator) -> InsetsResult<()> {
        let now = self.clock.now();
        let frame_interval = self.config.frame_interval();
        let events = self.events_tx.clone();
        let entry = self.entry_mut(id).ok_or(InsetsError::UnknownAnimation(id))?;

        if entry.runner.uses_off_thread() {
            entry.driver = Some(Driver::OffThread {
                _handle: OffThreadDriver::spawn(id, animator, frame_interval, events),
            });
            return Ok(());
        }

        entry.driver = Some(Driver::InProcess { animator, started_at: now });
        let sample = animator.sample(Duration::ZERO);
        self.set_insets_and_alpha(id, sample.insets, sample.alpha, sample.fraction)?;
        if !self.in_animation_frame {
            self.host.post_animation_callback();
        }
        Ok(())
    }

    /// Whether the owner should call [`Self::on_animation_frame`] soon.
    #[must_use]
    pub fn wants_animation_frame(&self) -> bool {
        self.anim_callback_scheduled || self.runners.iter().any(super::RunningEntry::has_in_process_driver)
    }

    /// Advances in-process animations and applies every pending frame.
    ///
    /// Hosts call this once per frame after
    /// [`crate::Host::post_animation_callback`].
    pub fn on_animation_frame(&mut self) {
        let now = self.clock.now();
        self.in_animation_frame = true;

        let driven: SmallVec<[(AnimationId, InsetsAnimator, Instant); 4]> = self
            .runners
            .iter()
            .filter_map(|entry| match entry.driver {
                Some(Driver::InProcess { animator, started_at }) => {
                    Some((entry.runner.id(), animator, started_at))
                }
                _ => None,
            })
            .collect();

        for (id, animator, started_at) in driven {
            let elapsed = now.saturating_duration_since(started_at);
            let sample = animator.sample(elapsed);
            if self.set_insets_and_alpha(id, sample.insets, sample.alpha, sample.fraction).is_err() {
                continue;
            }
            if animator.is_complete(elapsed) {
                let _ = self.finish_animation(id, animator.show);
            }
        }

        self.in_animation_frame = false;
        if self.anim_callback_scheduled {
            self.run_anim_callback();
        }
        if self.runners.iter().any(super::RunningEntry::has_in_process_driver) {
            self.host.post_animation_callback();
        }
    }

    /// Applies pending frames now or on the next animation callback.
    ///
    /// User-driven frames and frames set while an animation starts are
    /// applied synchronously.
    pub(crate) fn schedule_apply_change_insets(&mut self, kind: AnimationKind) {
        if self.starting_animation || kind == AnimationKind::User {
            self.run_anim_callback();
            return;
        }
        if !self.anim_callback_scheduled {
            self.anim_callback_scheduled = true;
            if !self.in_animation_frame {
                self.host.post_animation_callback();
            }
        }
    }

    /// Applies every runner's pending frame to a copy of the live snapshot
    /// and dispatches one progress update.
    fn run_anim_callback(&mut self) {
        self.anim_callback_scheduled = false;
        if self.runners.is_empty() {
            return;
        }

        let mut state = self.store.local().clone();
        let mut running = AnimationList::new();
        let mut finished: SmallVec<[(AnimationId, bool, bool); 4]> = SmallVec::new();
        for entry in &mut self.runners {
            if entry.runner.apply_change_insets(&mut state) {
                let shown = entry.runner.shown_on_finish().unwrap_or(false);
                finished.push((entry.runner.id(), shown, entry.start_dispatched));
            }
            if entry.start_dispatched {
                running.push(entry.runner.animation());
            }
        }

        let mut ended = AnimationList::new();
        for &(id, shown, start_dispatched) in &finished {
            if start_dispatched && let Some(entry) = self.entry(id) {
                ended.push(entry.runner.animation());
            }
            self.notify_finished(id, shown);
        }

        let insets = state.calculate_insets(&self.frame, InsetTypes::all());
        tracing::trace!(running = running.len(), ?insets, "dispatching animation progress");
        self.host.dispatch_animation_progress(&state, insets, &running);
        for animation in &ended {
            self.host.dispatch_animation_end(animation);
        }
    }

    /// Dispatches an animation's start and makes it ready.
    fn dispatch_start(&mut self, id: AnimationId) {
        let Some(entry) = self.entry_mut(id) else {
            return;
        };
        if entry.runner.is_cancelled() {
            return;
        }
        entry.start_dispatched = true;
        let animation = entry.runner.animation();
        let bounds = entry.runner.bounds();

        let host_bounds = self.host.dispatch_animation_start(&animation, bounds);
        let Some(entry) = self.entry_mut(id) else {
            return;
        };
        entry.runner.mark_ready(host_bounds);
        let types = entry.runner.types();
        let listener = entry.runner.take_listener();
        tracing::debug!(animation = %id, types = %types, "animation ready");

        let was_starting = self.starting_animation;
        self.starting_animation = true;
        self.dispatch_listener(id, listener, ListenerCall::Ready(types));
        self.starting_animation = was_starting;
    }

    // ========================================================================
    // Owner Queue
    // ========================================================================

    /// Hands the owner-event receiver to an external event loop.
    ///
    /// Once taken, [`Self::run_scheduled`] no longer drains events; the
    /// loop must feed them to [`Self::handle_owner_event`].
    pub fn take_event_receiver(&mut self) -> Option<UnboundedReceiver<OwnerEvent>> {
        self.events_rx.take()
    }

    /// When the next scheduled task becomes due.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> { self.tasks.next_deadline() }

    /// Runs posted events and every task that is due.
    pub fn run_scheduled(&mut self) {
        loop {
            let mut progressed = false;
            while let Some(event) = self.events_rx.as_mut().and_then(|rx| rx.try_recv().ok()) {
                self.handle_owner_event(event);
                progressed = true;
            }
            let now = self.clock.now();
            while let Some(task) = self.tasks.pop_due(now) {
                self.run_task(task);
                progressed = true;
            }
            if !progressed {
                break;
            }
        }
    }

    /// Applies an event posted from another thread.
    pub fn handle_owner_event(&mut self, event: OwnerEvent) {
        match event {
            OwnerEvent::Frame { id, sample } => {
                if self.set_insets_and_alpha(id, sample.insets, sample.alpha, sample.fraction).is_err() {
                    tracing::trace!(animation = %id, "dropping frame for ended animation");
                }
            }
            OwnerEvent::Finished { id, shown } => {
                let _ = self.finish_animation(id, shown);
            }
            OwnerEvent::CancelAnimation(id) => self.cancel_animation(id, true),
            OwnerEvent::CancelPending(request) => {
                if self.pending.as_ref().is_some_and(|pending| pending.id() == request) {
                    self.abort_pending_ime_request();
                }
            }
        }
    }

    fn run_task(&mut self, task: Task) {
        match task {
            Task::DispatchStart(id) => self.dispatch_start(id),
            Task::PendingControlTimeout(request) => {
                if self.pending.as_ref().is_some_and(|pending| pending.id() == request) {
                    tracing::debug!("keyboard did not answer in time");
                    self.abort_pending_ime_request();
                }
            }
            Task::Show(types) => {
                if let Err(err) = self.show(types) {
                    tracing::error!("deferred show of {types} failed: {err}");
                }
            }
            Task::InvokeControllableListeners => {
                self.invoke_controllable_listeners();
            }
        }
    }
}
