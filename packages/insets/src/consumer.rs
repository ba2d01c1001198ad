//! Per-type source consumers.
//!
//! A consumer is the single source of truth for one inset type's requested
//! visibility and its control grant. The keyboard variant additionally
//! negotiates with the input method service before it can show.
//!
//! Consumers never call back into the controller. Every operation mutates
//! the live snapshot it is handed and reports what the controller has to do
//! next through its return value.

use serde::{Deserialize, Serialize};

use crate::host::InputMethodService;
use crate::state::InsetsState;
use crate::types::{AnimationKind, InsetType, InsetTypes, Rect};

// ============================================================================
// Control Grants
// ============================================================================

/// Delegated permission to drive one inset type locally.
///
/// `surface` identifies the animation surface that came with the grant. A
/// grant may arrive before its surface is ready, in which case animations
/// are postponed until a grant with a surface shows up.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlGrant {
    pub ty: InsetType,
    #[serde(default)]
    pub surface: Option<u64>,
}

impl ControlGrant {
    /// A grant with an attached surface.
    #[must_use]
    pub const fn new(ty: InsetType, surface: u64) -> Self { Self { ty, surface: Some(surface) } }

    /// A grant whose surface is not ready yet.
    #[must_use]
    pub const fn without_surface(ty: InsetType) -> Self { Self { ty, surface: None } }

    #[must_use]
    pub const fn has_surface(&self) -> bool { self.surface.is_some() }
}

/// Outcome of asking a consumer whether its type may be shown.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShowResult {
    /// The type can be shown right away.
    ShowImmediately,
    /// The input method service accepted the request but has not produced
    /// geometry yet.
    ShowDelayed,
    /// The input method service refused, typically because nothing has focus.
    ShowFailed,
}

/// What the controller has to do after a control grant changed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ControlUpdate {
    /// Types that should now animate in.
    pub show: InsetTypes,
    /// Types that should now animate out.
    pub hide: InsetTypes,
    /// Whether the live visibility changed and needs to be redispatched.
    pub visibility_changed: bool,
}

impl ControlUpdate {
    /// Folds another update into this one.
    pub fn absorb(&mut self, other: Self) {
        self.show |= other.show;
        self.hide |= other.hide;
        self.visibility_changed |= other.visibility_changed;
    }
}

// ============================================================================
// Consumer
// ============================================================================

/// Keyboard negotiation state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ImeNegotiation {
    /// Visibility was requested while no control was held.
    pub requested_visible_awaiting_control: bool,
}

/// Behavior variant of a consumer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsumerKind {
    Standard,
    Ime(ImeNegotiation),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct PendingFrame {
    frame: Rect,
    visible_frame: Option<Rect>,
}

/// Owner of one inset type's requested visibility and control grant.
#[derive(Clone, Debug)]
pub struct InsetsSourceConsumer {
    ty: InsetType,
    kind: ConsumerKind,
    requested_visible: bool,
    control: Option<ControlGrant>,
    animation_pending: bool,
    pending_frame: Option<PendingFrame>,
}

impl InsetsSourceConsumer {
    #[must_use]
    pub const fn new(ty: InsetType) -> Self {
        let kind = match ty {
            InsetType::Ime => ConsumerKind::Ime(ImeNegotiation {
                requested_visible_awaiting_control: false,
            }),
            _ => ConsumerKind::Standard,
        };
        Self {
            ty,
            kind,
            requested_visible: ty.default_visibility(),
            control: None,
            animation_pending: false,
            pending_frame: None,
        }
    }

    #[must_use]
    pub const fn ty(&self) -> InsetType { self.ty }

    #[must_use]
    pub const fn kind(&self) -> ConsumerKind { self.kind }

    #[must_use]
    pub const fn control(&self) -> Option<ControlGrant> { self.control }

    #[must_use]
    pub const fn has_control(&self) -> bool { self.control.is_some() }

    #[must_use]
    pub const fn is_requested_visible(&self) -> bool { self.requested_visible }

    /// Whether an animation is waiting for a grant with a surface.
    #[must_use]
    pub const fn is_animation_pending(&self) -> bool { self.animation_pending }

    /// Requested visibility, including a keyboard show that is still waiting
    /// for control.
    #[must_use]
    pub const fn is_requested_visible_awaiting_control(&self) -> bool {
        match self.kind {
            ConsumerKind::Ime(negotiation) => {
                negotiation.requested_visible_awaiting_control || self.requested_visible
            }
            ConsumerKind::Standard => self.requested_visible,
        }
    }

    fn set_awaiting_control(&mut self, awaiting: bool) {
        if let ConsumerKind::Ime(negotiation) = &mut self.kind {
            negotiation.requested_visible_awaiting_control = awaiting;
        }
    }

    /// Asks whether this type can be shown now.
    ///
    /// Standard types always can. The keyboard shows immediately when the
    /// request comes from the input method itself or when it is already
    /// visible under our control; otherwise the service is asked and the
    /// outcome is delayed or failed. A failed request leaves the requested
    /// visibility untouched.
    pub fn request_show(
        &mut self,
        from_ime: bool,
        state: &InsetsState,
        ime: &mut dyn InputMethodService,
    ) -> ShowResult {
        if matches!(self.kind, ConsumerKind::Standard) {
            return ShowResult::ShowImmediately;
        }
        if self.control.is_none() {
            self.set_awaiting_control(true);
        }
        if from_ime || (state.source_or_default_visibility(self.ty) && self.control.is_some()) {
            return ShowResult::ShowImmediately;
        }
        if ime.request_show() {
            tracing::debug!("input method acknowledged show request");
            ShowResult::ShowDelayed
        } else {
            tracing::warn!("input method refused show request");
            ShowResult::ShowFailed
        }
    }

    /// Merges a pushed source into the live snapshot.
    ///
    /// A frame change arriving while the type animates is held back and
    /// applied by [`Self::notify_animation_finished`].
    pub fn update_source(
        &mut self,
        state: &mut InsetsState,
        mut source: crate::state::InsetsSource,
        animating: Option<AnimationKind>,
    ) {
        let current = state.peek_source(self.ty).copied();
        match current {
            Some(current) if animating.is_some() && current.frame != source.frame => {
                self.pending_frame =
                    Some(PendingFrame { frame: source.frame, visible_frame: source.visible_frame });
                source.frame = current.frame;
                source.visible_frame = current.visible_frame;
                state.add_source(source);
            }
            _ => {
                self.pending_frame = None;
                state.add_source(source);
            }
        }
    }

    /// Applies a held-back frame. Returns whether the live snapshot changed.
    pub fn notify_animation_finished(&mut self, state: &mut InsetsState) -> bool {
        let Some(pending) = self.pending_frame.take() else {
            return false;
        };
        let source = state.source_mut(self.ty);
        source.frame = pending.frame;
        source.visible_frame = pending.visible_frame;
        true
    }

    /// Accepts or revokes a control grant.
    ///
    /// On revoke the live visibility falls back to what the authority last
    /// dispatched. On grant, a visibility requested while ungranted turns into
    /// a show or hide request once the grant carries a surface.
    pub fn set_control(
        &mut self,
        control: Option<ControlGrant>,
        state: &mut InsetsState,
        last_dispatched: &InsetsState,
    ) -> ControlUpdate {
        if self.control == control {
            return ControlUpdate::default();
        }
        self.control = control;

        let Some(grant) = control else {
            let server_visible = last_dispatched.source_or_default_visibility(self.ty);
            let source = state.source_mut(self.ty);
            let mut update = ControlUpdate {
                visibility_changed: source.visible != server_visible,
                ..ControlUpdate::default()
            };
            source.visible = server_visible;
            if let ConsumerKind::Ime(negotiation) = self.kind
                && !negotiation.requested_visible_awaiting_control
            {
                update.visibility_changed |= self.hide(state);
            }
            tracing::debug!(ty = %self.ty, "control revoked");
            return update;
        };

        let requested_visible = self.is_requested_visible_awaiting_control();
        let need_animation = requested_visible != state.source_or_default_visibility(self.ty);
        if grant.has_surface() && (need_animation || self.animation_pending) {
            self.animation_pending = false;
            let types = InsetTypes::from(self.ty);
            return if requested_visible {
                ControlUpdate { show: types, ..ControlUpdate::default() }
            } else {
                ControlUpdate { hide: types, ..ControlUpdate::default() }
            };
        }
        if need_animation {
            self.animation_pending = true;
        }
        ControlUpdate {
            visibility_changed: self.apply_local_visibility_override(state),
            ..ControlUpdate::default()
        }
    }

    /// Requests the type visible without animating. Returns whether the live
    /// visibility changed.
    pub fn show(&mut self, from_ime: bool, state: &mut InsetsState) -> bool {
        let changed = self.set_requested_visible(true, state);
        if from_ime {
            self.set_awaiting_control(true);
        }
        changed
    }

    /// Requests the type hidden without animating. Returns whether the live
    /// visibility changed.
    pub fn hide(&mut self, state: &mut InsetsState) -> bool {
        let changed = self.set_requested_visible(false, state);
        self.set_awaiting_control(false);
        changed
    }

    /// Hides as the final or initial step of an animation.
    ///
    /// Once a keyboard hide animation has finished the service is told that
    /// the keyboard is gone.
    pub fn hide_after_animation(
        &mut self,
        animation_finished: bool,
        kind: AnimationKind,
        state: &mut InsetsState,
        ime: &mut dyn InputMethodService,
    ) -> bool {
        let changed = self.hide(state);
        if animation_finished && matches!(self.kind, ConsumerKind::Ime(_)) {
            tracing::trace!(?kind, "keyboard hide finished");
            ime.notify_hidden();
        }
        changed
    }

    /// Tells the input method service the keyboard is being hidden.
    pub fn notify_hidden(&self, ime: &mut dyn InputMethodService) {
        if matches!(self.kind, ConsumerKind::Ime(_)) {
            ime.notify_hidden();
        }
    }

    /// Pushes the requested visibility into the live snapshot when we hold
    /// control. Returns whether the live visibility changed.
    pub fn apply_local_visibility_override(&self, state: &mut InsetsState) -> bool {
        if self.control.is_none() {
            return false;
        }
        if state.source_or_default_visibility(self.ty) == self.requested_visible {
            return false;
        }
        state.source_mut(self.ty).visible = self.requested_visible;
        true
    }

    pub fn on_window_focus_gained(&self, ime: &mut dyn InputMethodService) {
        if matches!(self.kind, ConsumerKind::Ime(_)) {
            ime.on_focus_gained();
        }
    }

    pub fn on_window_focus_lost(&mut self, ime: &mut dyn InputMethodService) {
        if matches!(self.kind, ConsumerKind::Ime(_)) {
            self.set_awaiting_control(false);
            ime.on_focus_lost();
        }
    }

    fn set_requested_visible(&mut self, requested_visible: bool, state: &mut InsetsState) -> bool {
        if self.requested_visible != requested_visible {
            self.requested_visible = requested_visible;
            self.animation_pending = false;
        }
        self.apply_local_visibility_override(state)
    }
}

// ============================================================================
// Consumer Set
// ============================================================================

/// Consumers indexed by internal type, created on first use.
#[derive(Clone, Debug, Default)]
pub struct ConsumerSet {
    slots: [Option<InsetsSourceConsumer>; InsetType::COUNT],
}

impl ConsumerSet {
    #[must_use]
    pub const fn get(&self, ty: InsetType) -> Option<&InsetsSourceConsumer> {
        self.slots[ty.index()].as_ref()
    }

    /// Returns the consumer for `ty`, creating it if needed.
    pub fn get_mut(&mut self, ty: InsetType) -> &mut InsetsSourceConsumer {
        self.slots[ty.index()].get_or_insert_with(|| InsetsSourceConsumer::new(ty))
    }

    /// Types that currently have a consumer.
    #[must_use]
    pub fn types(&self) -> InsetTypes { self.iter().map(InsetsSourceConsumer::ty).collect() }

    pub fn iter(&self) -> impl Iterator<Item = &InsetsSourceConsumer> { self.slots.iter().flatten() }
}

// ============================================================================
// Tests
// ============================================================================
