//! Show, hide and user-driven animation entry points.

use std::fmt;
use std::time::Duration;

use super::{InsetsController, ListenerCall, RunningEntry};
use crate::animation::runner::RunnerOptions;
use crate::animation::{
    AnimationControlListener, AnimationId, AnimationRunner, DefaultAnimationListener, Interpolator,
};
use crate::cancellation::CancellationSignal;
use crate::consumer::ShowResult;
use crate::error::{InsetsError, InsetsResult};
use crate::scheduler::{OwnerEvent, RequestId, Task, TaskHandle};
use crate::types::{AnimationKind, InsetType, InsetTypes, Insets, LayoutDuringAnimation, Rect};

/// Everything needed to start an animation.
struct AnimationRequest {
    types: InsetTypes,
    cancellation: Option<CancellationSignal>,
    listener: Box<dyn AnimationControlListener>,
    frame: Rect,
    from_ime: bool,
    duration: Duration,
    interpolator: Interpolator,
    kind: AnimationKind,
    layout: LayoutDuringAnimation,
    use_off_thread: bool,
}

/// A request parked until the input method is ready to show.
pub(crate) struct PendingControlRequest {
    id: RequestId,
    types: InsetTypes,
    listener: Box<dyn AnimationControlListener>,
    duration: Duration,
    interpolator: Interpolator,
    kind: AnimationKind,
    layout: LayoutDuringAnimation,
    cancellation: Option<CancellationSignal>,
    use_off_thread: bool,
    timeout: TaskHandle,
}

impl PendingControlRequest {
    pub(crate) const fn types(&self) -> InsetTypes { self.types }

    pub(crate) const fn id(&self) -> RequestId { self.id }

    fn into_request(self, frame: Rect) -> AnimationRequest {
        AnimationRequest {
            types: self.types,
            cancellation: self.cancellation,
            listener: self.listener,
            frame,
            from_ime: true,
            duration: self.duration,
            interpolator: self.interpolator,
            kind: self.kind,
            layout: self.layout,
            use_off_thread: self.use_off_thread,
        }
    }
}

impl fmt::Debug for PendingControlRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingControlRequest")
            .field("id", &self.id)
            .field("types", &self.types)
            .field("kind", &self.kind)
            .field("duration", &self.duration)
            .finish_non_exhaustive()
    }
}

impl InsetsController {
    // ========================================================================
    // Show / Hide
    // ========================================================================

    /// Shows `types` with the default animation.
    ///
    /// Types already shown, or already animating in, are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`InsetsError::CancellationInProgress`] when called from a
    /// cancellation callback for the same types.
    pub fn show(&mut self, types: InsetTypes) -> InsetsResult<()> { self.show_internal(types, false) }

    /// Shows `types` on behalf of the input method.
    ///
    /// A parked keyboard request is replayed instead, and user animations
    /// are never preempted.
    ///
    /// # Errors
    ///
    /// See [`Self::show`].
    pub fn show_from_ime(&mut self, types: InsetTypes) -> InsetsResult<()> {
        self.show_internal(types, true)
    }

    /// Hides `types` with the default animation.
    ///
    /// # Errors
    ///
    /// See [`Self::show`].
    pub fn hide(&mut self, types: InsetTypes) -> InsetsResult<()> { self.hide_internal(types, false) }

    /// Hides `types` on behalf of the input method.
    ///
    /// # Errors
    ///
    /// See [`Self::show`].
    pub fn hide_from_ime(&mut self, types: InsetTypes) -> InsetsResult<()> {
        self.hide_internal(types, true)
    }

    fn show_internal(&mut self, types: InsetTypes, from_ime: bool) -> InsetsResult<()> {
        if from_ime && let Some(pending) = self.pending.take() {
            self.tasks.cancel(pending.timeout);
            tracing::debug!(types = %pending.types, "replaying parked keyboard request");
            let frame = self.frame;
            return self.control_animation_unchecked(pending.into_request(frame));
        }

        let mut ready = InsetTypes::empty();
        for ty in types.internal_types() {
            let kind = self.animation_kind(ty);
            let requested_visible = self.consumers.get_mut(ty).is_requested_visible();
            if (requested_visible && kind.is_none()) || kind == Some(AnimationKind::Show) {
                continue;
            }
            if from_ime && kind == Some(AnimationKind::User) {
                continue;
            }
            ready |= ty.to_public();
        }
        self.apply_animation(ready, true, from_ime)
    }

    fn hide_internal(&mut self, types: InsetTypes, from_ime: bool) -> InsetsResult<()> {
        let mut ready = InsetTypes::empty();
        for ty in types.internal_types() {
            let kind = self.animation_kind(ty);
            let requested_visible = self.consumers.get_mut(ty).is_requested_visible();
            if (!requested_visible && kind.is_none()) || kind == Some(AnimationKind::Hide) {
                continue;
            }
            ready |= ty.to_public();
        }
        self.apply_animation(ready, false, from_ime)
    }

    /// Starts the default show or hide animation for `types`.
    pub(crate) fn apply_animation(
        &mut self,
        types: InsetTypes,
        show: bool,
        from_ime: bool,
    ) -> InsetsResult<()> {
        if types.is_empty() {
            return Ok(());
        }
        let has_callbacks = self.host.has_animation_callbacks();
        let floating_ime_bottom = self.host.dip_to_px(self.config.floating_ime_bottom_inset_dp);
        let listener = DefaultAnimationListener::new(
            show,
            has_callbacks,
            types,
            self.animations_disabled,
            floating_ime_bottom,
        );

        self.control_animation_unchecked(AnimationRequest {
            types,
            cancellation: None,
            duration: listener.duration(&self.config),
            interpolator: listener.interpolator(),
            listener: Box::new(listener),
            frame: self.store.local().display_frame,
            from_ime,
            kind: if show { AnimationKind::Show } else { AnimationKind::Hide },
            layout: if show { LayoutDuringAnimation::Shown } else { LayoutDuringAnimation::Hidden },
            use_off_thread: !has_callbacks,
        })
    }

    // ========================================================================
    // User Animations
    // ========================================================================

    /// Lets `listener` drive `types` frame by frame.
    ///
    /// The listener is cancelled right away when any type cannot be
    /// controlled from the current window frame. Otherwise it receives
    /// `on_ready` once the host has started the animation, or `on_cancelled`
    /// if nothing could be controlled.
    ///
    /// # Errors
    ///
    /// Returns [`InsetsError::CancellationInProgress`] when called from a
    /// cancellation callback for the same types. The listener has already
    /// been cancelled by then.
    pub fn control_animation(
        &mut self,
        types: InsetTypes,
        duration: Duration,
        interpolator: Interpolator,
        cancellation: Option<CancellationSignal>,
        mut listener: Box<dyn AnimationControlListener>,
    ) -> InsetsResult<()> {
        let uncontrollable = self.store.local().calculate_uncontrollable_types_from_frame(&self.frame);
        if uncontrollable.intersects(types) {
            tracing::debug!(types = %types, uncontrollable = %uncontrollable, "frame cannot control types");
            listener.on_cancelled(self, None);
            return Ok(());
        }

        let layout = self.layout_during_animation(types);
        let frame = self.frame;
        self.control_animation_unchecked(AnimationRequest {
            types,
            cancellation,
            listener,
            frame,
            from_ime: false,
            duration,
            interpolator,
            kind: AnimationKind::User,
            layout,
            use_off_thread: false,
        })
    }

    /// Lays out as shown if any of `types` is requested hidden, as hidden
    /// otherwise.
    fn layout_during_animation(&self, types: InsetTypes) -> LayoutDuringAnimation {
        let any_hidden = types.internal_types().any(|ty| !self.is_requested_visible(ty));
        if any_hidden { LayoutDuringAnimation::Shown } else { LayoutDuringAnimation::Hidden }
    }

    fn control_animation_unchecked(&mut self, request: AnimationRequest) -> InsetsResult<()> {
        let AnimationRequest {
            mut types,
            cancellation,
            mut listener,
            frame,
            from_ime,
            duration,
            interpolator,
            kind,
            layout,
            use_off_thread,
        } = request;

        if types.intersects(self.types_being_cancelled) {
            let cancelling = self.types_being_cancelled;
            tracing::error!(requested = %types, cancelling = %cancelling, "animation started during its own cancellation");
            listener.on_cancelled(self, None);
            return Err(InsetsError::CancellationInProgress { requested: types, cancelling });
        }

        if kind == AnimationKind::User {
            let disabled = types & self.disabled_user_animation_types;
            types &= !self.disabled_user_animation_types;
            if from_ime
                && disabled.contains(InsetTypes::IME)
                && !self.store.local().source_or_default_visibility(InsetType::Ime)
            {
                // The keyboard cannot be controlled; withdraw its show request.
                self.hide_directly(InsetTypes::IME, true, kind);
            }
        }
        if types.is_empty() {
            tracing::debug!("nothing to animate");
            listener.on_cancelled(self, None);
            return Ok(());
        }

        self.cancel_existing_controllers(types);
        self.last_started_anim_types |= types;

        let (ready, ime_ready) = self.collect_source_controls(from_ime, types, kind);
        if !ime_ready {
            self.abort_pending_ime_request();
            let id = RequestId::new(self.next_request_id);
            self.next_request_id += 1;
            let timeout = self.tasks.post_delayed(
                self.clock.now(),
                self.config.pending_control_timeout(),
                Task::PendingControlTimeout(id),
            );
            if let Some(signal) = &cancellation {
                let events = self.events_tx.clone();
                signal.set_on_cancel(move || {
                    let _ = events.send(OwnerEvent::CancelPending(id));
                });
            }
            tracing::debug!(types = %types, "keyboard not ready, parking request");
            self.pending = Some(PendingControlRequest {
                id,
                types,
                listener,
                duration,
                interpolator,
                kind,
                layout,
                cancellation,
                use_off_thread,
                timeout,
            });
            return Ok(());
        }

        if ready.is_empty() {
            tracing::debug!(types = %types, "no types ready to animate");
            listener.on_cancelled(self, None);
            return Ok(());
        }

        let id = self.next_animation_id();
        let runner = AnimationRunner::new(
            RunnerOptions {
                id,
                types: ready,
                kind,
                layout,
                duration,
                interpolator,
                use_off_thread,
                frame,
            },
            self.store.local(),
            listener,
        );
        let animation = runner.animation();
        if let Some(signal) = &cancellation {
            let events = self.events_tx.clone();
            signal.set_on_cancel(move || {
                let _ = events.send(OwnerEvent::CancelAnimation(id));
            });
        }
        self.runners.push(RunningEntry::new(runner, cancellation));
        tracing::debug!(animation = %id, types = %ready, ?kind, ?layout, "animation created");

        self.host.dispatch_animation_prepare(&animation);
        self.tasks.post(self.clock.now(), Task::DispatchStart(id));

        match layout {
            LayoutDuringAnimation::Shown => self.show_directly(types),
            LayoutDuringAnimation::Hidden => self.hide_directly(types, false, kind),
        }
        Ok(())
    }

    /// Asks each consumer whether its type can run.
    ///
    /// Returns the types that can be animated and whether the keyboard is
    /// ready. Types that can run but are not controlled still record the
    /// requested visibility so a later grant picks it up.
    fn collect_source_controls(
        &mut self,
        from_ime: bool,
        types: InsetTypes,
        kind: AnimationKind,
    ) -> (InsetTypes, bool) {
        let mut ready = InsetTypes::empty();
        let mut ime_ready = true;

        for ty in types.internal_types() {
            let consumer = self.consumers.get_mut(ty);
            let can_run = if kind.requests_show() {
                match consumer.request_show(from_ime, self.store.local(), self.ime.as_mut()) {
                    ShowResult::ShowImmediately => true,
                    ShowResult::ShowDelayed => {
                        ime_ready = false;
                        false
                    }
                    ShowResult::ShowFailed => {
                        tracing::warn!(ty = %ty, from_ime, "cannot show type");
                        false
                    }
                }
            } else {
                if !from_ime {
                    consumer.notify_hidden(self.ime.as_mut());
                }
                true
            };
            if !can_run {
                continue;
            }

            if consumer.has_control() {
                ready |= ty.to_public();
            } else if kind == AnimationKind::Show {
                consumer.show(from_ime, self.store.local_mut());
            } else if kind == AnimationKind::Hide {
                consumer.hide(self.store.local_mut());
            }
        }
        (ready, ime_ready)
    }

    // ========================================================================
    // Cancellation
    // ========================================================================

    /// Cancels every running animation and the parked keyboard request.
    pub fn cancel_existing_animations(&mut self) { self.cancel_existing_controllers(InsetTypes::all()); }

    /// Cancels animations overlapping `types`.
    ///
    /// While this runs, starting an animation of `types` is an error.
    fn cancel_existing_controllers(&mut self, types: InsetTypes) {
        let original = self.types_being_cancelled;
        self.types_being_cancelled |= types;
        for id in self.ids_overlapping(types) {
            self.cancel_animation(id, true);
        }
        if types.contains(InsetTypes::IME) {
            self.abort_pending_ime_request();
        }
        self.types_being_cancelled = original;
    }

    /// Cancels every animation controlling `ty` after its grant was revoked.
    pub(crate) fn notify_control_revoked(&mut self, ty: InsetType) {
        for id in self.ids_overlapping(ty.to_public()) {
            self.cancel_animation(id, true);
        }
        if ty == InsetType::Ime {
            self.abort_pending_ime_request();
        }
    }

    /// Drops the parked keyboard request, telling its listener.
    pub(crate) fn abort_pending_ime_request(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        self.tasks.cancel(pending.timeout);
        if let Some(signal) = &pending.cancellation {
            signal.clear_on_cancel();
        }
        tracing::debug!(types = %pending.types, "parked keyboard request aborted");
        let mut listener = pending.listener;
        listener.on_cancelled(self, None);
    }

    // ========================================================================
    // Frames From the Listener
    // ========================================================================

    /// Sets the next frame of a running animation.
    ///
    /// Insets are clamped between the animation's hidden and shown bounds.
    /// Frames for a finished animation are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`InsetsError::UnknownAnimation`] if the animation is gone.
    pub fn set_insets_and_alpha(
        &mut self,
        id: AnimationId,
        insets: Insets,
        alpha: f64,
        fraction: f64,
    ) -> InsetsResult<()> {
        let entry = self.entry_mut(id).ok_or(InsetsError::UnknownAnimation(id))?;
        if entry.runner.set_insets_and_alpha(insets, alpha, fraction) {
            let kind = entry.runner.kind();
            self.schedule_apply_change_insets(kind);
        }
        Ok(())
    }

    /// Jumps a running animation to its shown or hidden end state.
    ///
    /// # Errors
    ///
    /// Returns [`InsetsError::UnknownAnimation`] if the animation is gone.
    pub fn finish_animation(&mut self, id: AnimationId, shown: bool) -> InsetsResult<()> {
        let entry = self.entry_mut(id).ok_or(InsetsError::UnknownAnimation(id))?;
        if !entry.runner.finish(shown) {
            return Ok(());
        }
        entry.driver = None;
        let kind = entry.runner.kind();
        let listener = entry.runner.take_listener();
        self.schedule_apply_change_insets(kind);
        self.dispatch_listener(id, listener, ListenerCall::Finished);
        Ok(())
    }
}
