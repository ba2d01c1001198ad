//! The state machine of one running animation.
//!
//! ```text
//! Created ──ready──▶ Ready ──first frame──▶ Running ──▶ Finished
//!    │                 │                       │
//!    └─────────────────┴───────cancel──────────┴──────▶ Cancelled
//! ```
//!
//! A runner owns the shown/hidden bounds of its types, sanitizes every
//! requested frame, and applies the latest frame to a snapshot copy by
//! offsetting each controlled source along the edge it is attached to.

use std::fmt;
use std::time::Duration;

use super::easing::Interpolator;
use super::listener::AnimationControlListener;
use super::{AnimationBounds, AnimationId, InsetsAnimation};
use crate::state::InsetsState;
use crate::types::{
    AnimationKind, InsetSide, InsetType, InsetTypes, Insets, LayoutDuringAnimation, Rect,
};

/// Lifecycle state of a runner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunnerState {
    Created,
    Ready,
    Running,
    Finished { shown: bool },
    Cancelled,
}

/// Parameters a runner is created with.
#[derive(Clone, Copy, Debug)]
pub struct RunnerOptions {
    pub id: AnimationId,
    pub types: InsetTypes,
    pub kind: AnimationKind,
    pub layout: LayoutDuringAnimation,
    pub duration: Duration,
    pub interpolator: Interpolator,
    pub use_off_thread: bool,
    /// Frame the insets are calculated against.
    pub frame: Rect,
}

/// One running animation over a set of inset types.
pub struct AnimationRunner {
    options: RunnerOptions,
    listener: Option<Box<dyn AnimationControlListener>>,
    initial: InsetsState,
    sides: [InsetSide; InsetType::COUNT],
    shown: Insets,
    hidden: Insets,
    has_zero_insets_ime: bool,
    current: Insets,
    current_alpha: f64,
    current_fraction: f64,
    pending: Insets,
    pending_alpha: f64,
    pending_fraction: f64,
    host_bounds: Option<AnimationBounds>,
    ready_dispatched: bool,
    state: RunnerState,
}

fn with_visibility(state: &InsetsState, types: InsetTypes, visible: bool) -> InsetsState {
    let mut copy = state.clone();
    for ty in types.internal_types() {
        copy.source_mut(ty).visible = visible;
    }
    copy
}

impl AnimationRunner {
    /// Creates a runner from a copy of the live snapshot.
    #[must_use]
    pub fn new(
        options: RunnerOptions,
        state: &InsetsState,
        listener: Box<dyn AnimationControlListener>,
    ) -> Self {
        let frame = options.frame;
        let types = options.types;

        let shown_state = with_visibility(state, types, true);
        let shown = shown_state.calculate_insets(&frame, types);
        let hidden = with_visibility(state, types, false).calculate_insets(&frame, types);
        let current = state.calculate_insets(&frame, types);

        let has_zero_insets_ime = shown.bottom == 0 && types.has(InsetType::Ime);
        let mut sides = [InsetSide::Floating; InsetType::COUNT];
        for ty in types.internal_types() {
            sides[ty.index()] = shown_state
                .peek_source(ty)
                .map_or(InsetSide::Floating, |source| source.calculate_insets(&frame, false).side());
        }
        // A zero-insets keyboard still slides in from the bottom edge.
        if has_zero_insets_ime {
            sides[InsetType::Ime.index()] = InsetSide::Bottom;
        }

        Self {
            options,
            listener: Some(listener),
            initial: state.clone(),
            sides,
            shown,
            hidden,
            has_zero_insets_ime,
            current,
            current_alpha: 1.0,
            current_fraction: 0.0,
            pending: current,
            pending_alpha: 1.0,
            pending_fraction: 0.0,
            host_bounds: None,
            ready_dispatched: false,
            state: RunnerState::Created,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[must_use]
    pub const fn id(&self) -> AnimationId { self.options.id }

    #[must_use]
    pub const fn types(&self) -> InsetTypes { self.options.types }

    #[must_use]
    pub const fn kind(&self) -> AnimationKind { self.options.kind }

    #[must_use]
    pub const fn layout(&self) -> LayoutDuringAnimation { self.options.layout }

    #[must_use]
    pub const fn duration(&self) -> Duration { self.options.duration }

    #[must_use]
    pub const fn interpolator(&self) -> Interpolator { self.options.interpolator }

    #[must_use]
    pub const fn uses_off_thread(&self) -> bool { self.options.use_off_thread }

    #[must_use]
    pub const fn state(&self) -> RunnerState { self.state }

    /// Insets with every animated type fully shown.
    #[must_use]
    pub const fn shown_insets(&self) -> Insets { self.shown }

    /// Insets with every animated type fully hidden.
    #[must_use]
    pub const fn hidden_insets(&self) -> Insets { self.hidden }

    #[must_use]
    pub const fn current_insets(&self) -> Insets { self.current }

    #[must_use]
    pub const fn current_alpha(&self) -> f64 { self.current_alpha }

    #[must_use]
    pub const fn current_fraction(&self) -> f64 { self.current_fraction }

    /// Whether this animation controls a keyboard that has no insets when shown.
    #[must_use]
    pub const fn has_zero_insets_ime(&self) -> bool { self.has_zero_insets_ime }

    /// The edge a controlled type is attached to.
    #[must_use]
    pub const fn side(&self, ty: InsetType) -> InsetSide { self.sides[ty.index()] }

    #[must_use]
    pub const fn bounds(&self) -> AnimationBounds {
        AnimationBounds { lower: self.hidden, upper: self.shown }
    }

    /// Bounds the host chose when the animation started.
    #[must_use]
    pub const fn host_bounds(&self) -> Option<AnimationBounds> { self.host_bounds }

    /// Whether `on_ready` has been dispatched.
    #[must_use]
    pub const fn is_ready(&self) -> bool { self.ready_dispatched }

    #[must_use]
    pub const fn is_finished(&self) -> bool { matches!(self.state, RunnerState::Finished { .. }) }

    #[must_use]
    pub const fn is_cancelled(&self) -> bool { matches!(self.state, RunnerState::Cancelled) }

    /// The value the animation will end with.
    #[must_use]
    pub const fn shown_on_finish(&self) -> Option<bool> {
        match self.state {
            RunnerState::Finished { shown } => Some(shown),
            _ => None,
        }
    }

    #[must_use]
    pub fn animation(&self) -> InsetsAnimation {
        InsetsAnimation {
            id: self.options.id,
            types: self.options.types,
            interpolator: self.options.interpolator,
            duration: self.options.duration,
            fraction: self.current_fraction,
            alpha: self.current_alpha,
        }
    }

    // ========================================================================
    // Listener slot
    // ========================================================================

    pub(crate) fn take_listener(&mut self) -> Option<Box<dyn AnimationControlListener>> {
        self.listener.take()
    }

    pub(crate) fn restore_listener(&mut self, listener: Box<dyn AnimationControlListener>) {
        self.listener = Some(listener);
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    pub(crate) fn mark_ready(&mut self, host_bounds: AnimationBounds) {
        self.ready_dispatched = true;
        self.host_bounds = Some(host_bounds);
        if self.state == RunnerState::Created {
            self.state = RunnerState::Ready;
        }
    }

    /// Records the next frame. Returns `false` once the runner is finished or
    /// cancelled.
    pub fn set_insets_and_alpha(&mut self, insets: Insets, alpha: f64, fraction: f64) -> bool {
        if self.is_finished() || self.is_cancelled() {
            return false;
        }
        self.set_pending(insets, alpha, fraction);
        if self.state == RunnerState::Ready {
            self.state = RunnerState::Running;
        }
        true
    }

    /// Jumps to the shown or hidden end state. Returns `false` if the runner
    /// had already ended.
    pub fn finish(&mut self, shown: bool) -> bool {
        if self.is_finished() || self.is_cancelled() {
            return false;
        }
        let target = if shown { self.shown } else { self.hidden };
        self.set_pending(target, 1.0, 1.0);
        self.state = RunnerState::Finished { shown };
        true
    }

    /// Cancels the runner. Returns `false` if it had already ended.
    pub fn cancel(&mut self) -> bool {
        if self.is_finished() || self.is_cancelled() {
            return false;
        }
        self.state = RunnerState::Cancelled;
        true
    }

    fn set_pending(&mut self, insets: Insets, alpha: f64, fraction: f64) {
        self.pending = self.sanitize(insets);
        self.pending_alpha = alpha.clamp(0.0, 1.0);
        self.pending_fraction = fraction.clamp(0.0, 1.0);
    }

    fn sanitize(&self, insets: Insets) -> Insets {
        if self.has_zero_insets_ime {
            return insets;
        }
        insets.min(self.shown).max(self.hidden)
    }

    /// Applies the pending frame to `state`. Returns whether the runner has
    /// finished.
    ///
    /// Every controlled source attached to an edge is moved along that edge
    /// by `shown - pending` and made visible while it still covers part of
    /// the window.
    pub fn apply_change_insets(&mut self, state: &mut InsetsState) -> bool {
        if self.is_cancelled() {
            return false;
        }
        for ty in self.options.types.internal_types() {
            let side = self.sides[ty.index()];
            if side == InsetSide::Floating {
                continue;
            }
            let offset = self.shown.on_side(side) - self.pending.on_side(side);
            let frame = translate(self.initial.source_or_default(ty).frame, side, offset);
            let visible = if self.has_zero_insets_ime && side == InsetSide::Bottom {
                self.options.kind == AnimationKind::Show || !self.is_finished()
            } else {
                self.pending.on_side(side) != 0
            };
            let source = state.source_mut(ty);
            source.frame = frame;
            source.visible = visible;
        }
        self.current = self.pending;
        self.current_alpha = self.pending_alpha;
        self.current_fraction = self.pending_fraction;
        tracing::trace!(
            animation = %self.options.id,
            fraction = self.current_fraction,
            "applied animation frame"
        );
        self.is_finished()
    }
}

const fn translate(frame: Rect, side: InsetSide, offset: i32) -> Rect {
    match side {
        InsetSide::Left => frame.offset(-offset, 0),
        InsetSide::Top => frame.offset(0, -offset),
        InsetSide::Right => frame.offset(offset, 0),
        InsetSide::Bottom => frame.offset(0, offset),
        InsetSide::Floating => frame,
    }
}

impl fmt::Debug for AnimationRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimationRunner")
            .field("id", &self.options.id)
            .field("types", &self.options.types)
            .field("kind", &self.options.kind)
            .field("state", &self.state)
            .field("current", &self.current)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::InsetsController;
    use crate::state::InsetsSource;

    struct Silent;

    impl AnimationControlListener for Silent {
        fn on_ready(&mut self, _: &mut InsetsController, _: AnimationId, _: InsetTypes) {}

        fn on_cancelled(&mut self, _: &mut InsetsController, _: Option<AnimationId>) {}
    }

    const DISPLAY: Rect = Rect::new(0, 0, 1080, 2340);

    fn state() -> InsetsState {
        InsetsState::with_sources(DISPLAY, [
            InsetsSource::new(InsetType::StatusBars).with_frame(Rect::new(0, 0, 1080, 80)),
            InsetsSource::new(InsetType::NavigationBars).with_frame(Rect::new(0, 2214, 1080, 2340)),
        ])
    }

    fn runner(types: InsetTypes, kind: AnimationKind, state: &InsetsState) -> AnimationRunner {
        AnimationRunner::new(
            RunnerOptions {
                id: AnimationId::new(1),
                types,
                kind,
                layout: LayoutDuringAnimation::Hidden,
                duration: Duration::from_millis(300),
                interpolator: Interpolator::Linear,
                use_off_thread: false,
                frame: DISPLAY,
            },
            state,
            Box::new(Silent),
        )
    }

    #[test]
    fn test_bounds_and_sides() {
        let runner = runner(InsetTypes::SYSTEM_BARS, AnimationKind::Hide, &state());
        assert_eq!(runner.shown_insets(), Insets::new(0, 80, 0, 126));
        assert_eq!(runner.hidden_insets(), Insets::NONE);
        assert_eq!(runner.current_insets(), Insets::new(0, 80, 0, 126));
        assert_eq!(runner.side(InsetType::StatusBars), InsetSide::Top);
        assert_eq!(runner.side(InsetType::NavigationBars), InsetSide::Bottom);
        assert!(!runner.has_zero_insets_ime());
    }

    #[test]
    fn test_frames_are_sanitized() {
        let mut runner = runner(InsetTypes::STATUS_BARS, AnimationKind::User, &state());
        runner.mark_ready(runner.bounds());
        assert!(runner.set_insets_and_alpha(Insets::new(0, 500, 0, 0), 3.0, -1.0));
        assert_eq!(runner.state(), RunnerState::Running);

        let mut copy = state();
        runner.apply_change_insets(&mut copy);
        assert_eq!(runner.current_insets(), Insets::new(0, 80, 0, 0));
        assert!((runner.current_alpha() - 1.0).abs() < f64::EPSILON);
        assert!(runner.current_fraction().abs() < f64::EPSILON);
    }

    #[test]
    fn test_apply_offsets_sources_along_their_side() {
        let mut runner = runner(InsetTypes::SYSTEM_BARS, AnimationKind::Hide, &state());
        runner.set_insets_and_alpha(Insets::new(0, 30, 0, 100), 1.0, 0.5);

        let mut copy = state();
        assert!(!runner.apply_change_insets(&mut copy));
        let status = copy.source_or_default(InsetType::StatusBars);
        assert_eq!(status.frame, Rect::new(0, -50, 1080, 30));
        assert!(status.visible);
        let nav = copy.source_or_default(InsetType::NavigationBars);
        assert_eq!(nav.frame, Rect::new(0, 2240, 1080, 2366));
    }

    #[test]
    fn test_finish_lands_on_target() {
        let mut runner = runner(InsetTypes::STATUS_BARS, AnimationKind::Hide, &state());
        assert!(runner.finish(false));
        assert!(!runner.finish(true));
        assert!(!runner.set_insets_and_alpha(Insets::new(0, 80, 0, 0), 1.0, 1.0));

        let mut copy = state();
        assert!(runner.apply_change_insets(&mut copy));
        assert_eq!(runner.current_insets(), Insets::NONE);
        assert!(!copy.source_or_default(InsetType::StatusBars).visible);
        assert_eq!(runner.shown_on_finish(), Some(false));
    }

    #[test]
    fn test_cancel_stops_frames() {
        let mut runner = runner(InsetTypes::STATUS_BARS, AnimationKind::Hide, &state());
        assert!(runner.cancel());
        assert!(!runner.cancel());
        assert!(!runner.finish(true));
        assert!(!runner.is_ready());

        let mut copy = state();
        assert!(!runner.apply_change_insets(&mut copy));
        assert_eq!(copy, state());
    }

    #[test]
    fn test_zero_insets_ime_maps_to_bottom() {
        let mut with_ime = state();
        with_ime.add_source(InsetsSource::new(InsetType::Ime).with_visible(false));
        let mut runner = runner(InsetTypes::IME, AnimationKind::Show, &with_ime);
        assert!(runner.has_zero_insets_ime());
        assert_eq!(runner.side(InsetType::Ime), InsetSide::Bottom);

        // Negative insets pass through unsanitized for a floating keyboard.
        runner.set_insets_and_alpha(Insets::new(0, 0, 0, -80), 0.0, 0.0);
        let mut copy = with_ime.clone();
        runner.apply_change_insets(&mut copy);
        assert_eq!(runner.current_insets(), Insets::new(0, 0, 0, -80));
        assert!(copy.source_or_default(InsetType::Ime).visible);
    }
}
