//! Reconciliation with the remote authority and the input method.

use super::{InsetsController, ListenerId};
use crate::animation::ControllableInsetsListener;
use crate::consumer::{ControlGrant, ControlUpdate};
use crate::error::InsetsResult;
use crate::scheduler::Task;
use crate::state::InsetsState;
use crate::types::{AnimationKind, InsetType, InsetTypes, Rect};

impl InsetsController {
    // ========================================================================
    // State Pushes
    // ========================================================================

    /// Merges a snapshot pushed by the remote authority.
    ///
    /// Returns `false` when the push carries nothing new.
    pub fn on_state_changed(&mut self, state: &InsetsState) -> bool {
        let caption_unchanged = self.caption_insets_unchanged();
        if !self.store.is_new_push(state, caption_unchanged) {
            return false;
        }
        tracing::debug!("state pushed by authority");

        self.update_state(state);
        let local_changed = self.store.local_diverges_from_dispatched();
        self.store.record_dispatched(state);
        for consumer in self.consumers.iter() {
            consumer.apply_local_visibility_override(self.store.local_mut());
        }
        if local_changed {
            self.host.notify_insets_changed();
            self.update_requested_state();
        }
        true
    }

    fn update_state(&mut self, pushed: &InsetsState) {
        self.store.local_mut().display_frame = pushed.display_frame;

        let mut disabled = InsetTypes::empty();
        let mut cancelled = InsetTypes::empty();
        for source in pushed.sources() {
            let ty = source.ty;
            let mut animating = self.animation_kind(ty);
            if !source.is_user_controllable() {
                disabled |= ty.to_public();
                if animating == Some(AnimationKind::User) {
                    cancelled |= ty.to_public();
                    animating = None;
                }
            }
            self.consumers.get_mut(ty).update_source(self.store.local_mut(), *source, animating);
        }
        for ty in InsetType::ALL {
            if pushed.peek_source(ty).is_none() {
                self.store.local_mut().remove_source(ty);
            }
        }
        if self.caption_insets_height != 0 {
            let frame = self.frame;
            self.store.local_mut().source_mut(InsetType::CaptionBar).frame =
                Rect::new(frame.left, frame.top, frame.right, frame.top + self.caption_insets_height);
        }

        self.update_disabled_user_animation_types(disabled);
        if !cancelled.is_empty() {
            tracing::debug!(types = %cancelled, "user animation lost controllable frame");
            self.tasks.post(self.clock.now(), Task::Show(cancelled));
        }
    }

    fn update_disabled_user_animation_types(&mut self, disabled: InsetTypes) {
        let diff = self.disabled_user_animation_types ^ disabled;
        if diff.is_empty() {
            return;
        }
        let touches_control = self
            .consumers
            .iter()
            .any(|consumer| consumer.has_control() && diff.has(consumer.ty()));
        if touches_control {
            self.tasks.remove(Task::InvokeControllableListeners);
            self.tasks.post(self.clock.now(), Task::InvokeControllableListeners);
        }
        self.disabled_user_animation_types = disabled;
    }

    fn caption_insets_unchanged(&self) -> bool {
        self.store
            .local()
            .peek_source(InsetType::CaptionBar)
            .map_or(self.caption_insets_height == 0, |source| {
                source.frame.height() == self.caption_insets_height
            })
    }

    /// Tracks the caption bar height locally. A non-zero height overrides
    /// whatever caption frame the authority pushes.
    pub const fn set_caption_insets_height(&mut self, height: i32) { self.caption_insets_height = height; }

    /// Updates the window frame, notifying the host on change.
    pub fn on_frame_changed(&mut self, frame: Rect) {
        if self.frame == frame {
            return;
        }
        self.frame = frame;
        self.host.notify_insets_changed();
    }

    /// Makes default animations jump straight to their end state.
    pub const fn set_animations_disabled(&mut self, disabled: bool) { self.animations_disabled = disabled; }

    // ========================================================================
    // Control Grants
    // ========================================================================

    /// Applies the full set of control grants held by this window.
    ///
    /// Types missing from `grants` lose control, cancelling their
    /// animations. Consumers are all updated before any animation starts,
    /// and animations start before requested state is resent.
    ///
    /// # Errors
    ///
    /// Propagates [`crate::InsetsError::CancellationInProgress`] from the
    /// animations started for visibility requested while ungranted.
    pub fn on_controls_changed(&mut self, grants: &[ControlGrant]) -> InsetsResult<()> {
        let mut granted = [None; InsetType::COUNT];
        for grant in grants {
            granted[grant.ty.index()] = Some(*grant);
        }

        let mut update = ControlUpdate::default();
        for ty in self.consumers.types().internal_types() {
            let grant = granted[ty.index()];
            if grant.is_none() && self.has_control(ty) {
                self.notify_control_revoked(ty);
            }
            update.absorb(self.set_consumer_control(ty, grant));
        }

        let mut requested_state_stale = false;
        for grant in granted.into_iter().flatten() {
            let ty = grant.ty;
            update.absorb(self.set_consumer_control(ty, Some(grant)));
            if !requested_state_stale {
                let requested_visible = self.is_requested_visible(ty);
                let visibility_changed =
                    requested_visible != self.store.requested().source_or_default_visibility(ty);
                let ime_requested_visible = ty == InsetType::Ime && requested_visible;
                requested_state_stale = visibility_changed || ime_requested_visible;
            }
        }

        // Listeners may start their own animations; those win over the
        // default ones.
        let animating = self.invoke_controllable_listeners();
        update.show &= !animating;
        update.hide &= !animating;

        if update.visibility_changed {
            self.host.notify_insets_changed();
        }
        self.apply_animation(update.show, true, false)?;
        self.apply_animation(update.hide, false, false)?;
        if requested_state_stale || update.visibility_changed {
            self.update_requested_state();
        }
        Ok(())
    }

    fn set_consumer_control(&mut self, ty: InsetType, grant: Option<ControlGrant>) -> ControlUpdate {
        let (local, last_dispatched) = self.store.local_and_dispatched_mut();
        self.consumers.get_mut(ty).set_control(grant, local, last_dispatched)
    }

    // ========================================================================
    // Controllable-Insets Listeners
    // ========================================================================

    /// Registers a listener and tells it the current controllable types.
    pub fn add_controllable_insets_listener(
        &mut self,
        mut listener: Box<dyn ControllableInsetsListener>,
    ) -> ListenerId {
        let id = ListenerId(self.next_listener_id);
        self.next_listener_id += 1;
        let types = self.controllable_types();
        listener.on_controllable_changed(self, types);
        self.controllable_listeners.push((id, listener));
        id
    }

    /// Unregisters a listener. Returns `false` if it was not registered.
    pub fn remove_controllable_insets_listener(&mut self, id: ListenerId) -> bool {
        let before = self.controllable_listeners.len();
        self.controllable_listeners.retain(|(listener_id, _)| *listener_id != id);
        if self.controllable_listeners.len() != before {
            return true;
        }
        // The listener may be mid-invocation and temporarily detached.
        self.removed_listeners.push(id);
        false
    }

    /// Tells every listener the controllable types. Returns the types the
    /// listeners started animating.
    pub(crate) fn invoke_controllable_listeners(&mut self) -> InsetTypes {
        self.tasks.remove(Task::InvokeControllableListeners);
        self.last_started_anim_types = InsetTypes::empty();
        let types = self.controllable_types();

        let mut listeners = std::mem::take(&mut self.controllable_listeners);
        for (_, listener) in &mut listeners {
            listener.on_controllable_changed(self, types);
        }
        let added = std::mem::replace(&mut self.controllable_listeners, listeners);
        self.controllable_listeners.extend(added);
        if !self.removed_listeners.is_empty() {
            let removed = std::mem::take(&mut self.removed_listeners);
            self.controllable_listeners.retain(|(id, _)| !removed.contains(id));
        }
        self.last_started_anim_types
    }

    // ========================================================================
    // Input Method
    // ========================================================================

    pub fn on_window_focus_gained(&mut self) {
        self.consumers.get_mut(InsetType::Ime).on_window_focus_gained(self.ime.as_mut());
    }

    /// Losing focus also drops a keyboard request still waiting on the
    /// input method.
    pub fn on_window_focus_lost(&mut self) {
        self.consumers.get_mut(InsetType::Ime).on_window_focus_lost(self.ime.as_mut());
        self.abort_pending_ime_request();
    }

    /// The input method decided to show or hide the keyboard.
    ///
    /// # Errors
    ///
    /// See [`Self::show`].
    pub fn apply_ime_visibility(&mut self, visible: bool) -> InsetsResult<()> {
        if visible { self.show_from_ime(InsetTypes::IME) } else { self.hide(InsetTypes::IME) }
    }
}
