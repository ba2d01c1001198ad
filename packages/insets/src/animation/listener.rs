//! Listener traits and the default system animation.

use std::time::Duration;

use super::evaluator::{AlphaCurve, InsetsAnimator};
use super::{AnimationId, Interpolator};
use crate::config::ControllerConfig;
use crate::controller::InsetsController;
use crate::types::InsetTypes;

// ============================================================================
// Listener Traits
// ============================================================================

/// Receives the lifecycle of one animation.
///
/// Every callback gets the controller, so a listener can drive frames, finish
/// the animation or start a new one from inside the callback.
pub trait AnimationControlListener: Send {
    /// The animation is ready to receive frames.
    fn on_ready(&mut self, controller: &mut InsetsController, id: AnimationId, types: InsetTypes);

    /// The animation reached its end state.
    fn on_finished(&mut self, _controller: &mut InsetsController, _id: AnimationId) {}

    /// The request or animation was cancelled.
    ///
    /// `id` is `None` when the request never became ready.
    fn on_cancelled(&mut self, controller: &mut InsetsController, id: Option<AnimationId>);
}

/// Notified whenever the set of user-controllable types changes.
pub trait ControllableInsetsListener: Send {
    fn on_controllable_changed(&mut self, controller: &mut InsetsController, types: InsetTypes);
}

impl<F> ControllableInsetsListener for F
where F: FnMut(&mut InsetsController, InsetTypes) + Send
{
    fn on_controllable_changed(&mut self, controller: &mut InsetsController, types: InsetTypes) {
        self(controller, types);
    }
}

// ============================================================================
// Default Animation Policy
// ============================================================================

/// Duration of a default show or hide animation.
#[must_use]
pub const fn animation_duration(
    config: &ControllerConfig,
    types: InsetTypes,
    show: bool,
    has_callbacks: bool,
) -> Duration {
    let ms = if types.contains(InsetTypes::IME) {
        if has_callbacks { config.sync_ime_duration_ms } else { config.unsync_ime_duration_ms }
    } else if show {
        config.show_duration_ms
    } else {
        config.hide_duration_ms
    };
    Duration::from_millis(ms)
}

/// Interpolator of a default show or hide animation.
#[must_use]
pub const fn animation_interpolator(types: InsetTypes, show: bool, has_callbacks: bool) -> Interpolator {
    if !types.contains(InsetTypes::IME) {
        return Interpolator::SYSTEM_BARS;
    }
    if has_callbacks {
        Interpolator::SYNC_IME
    } else if show {
        Interpolator::LINEAR_OUT_SLOW_IN
    } else {
        Interpolator::FAST_OUT_LINEAR_IN
    }
}

/// Alpha curve of a default show or hide animation.
///
/// Only a keyboard animated without host callbacks fades.
#[must_use]
pub const fn alpha_curve(types: InsetTypes, show: bool, has_callbacks: bool) -> AlphaCurve {
    if !types.contains(InsetTypes::IME) || has_callbacks {
        AlphaCurve::Opaque
    } else if show {
        AlphaCurve::FadeIn
    } else {
        AlphaCurve::FadeOut
    }
}

// ============================================================================
// Default Animation Listener
// ============================================================================

/// Drives a system show or hide animation to completion.
#[derive(Clone, Copy, Debug)]
pub struct DefaultAnimationListener {
    show: bool,
    has_callbacks: bool,
    types: InsetTypes,
    disabled: bool,
    floating_ime_bottom_inset: i32,
}

impl DefaultAnimationListener {
    /// `floating_ime_bottom_inset` is in pixels.
    #[must_use]
    pub const fn new(
        show: bool,
        has_callbacks: bool,
        types: InsetTypes,
        disabled: bool,
        floating_ime_bottom_inset: i32,
    ) -> Self {
        Self { show, has_callbacks, types, disabled, floating_ime_bottom_inset }
    }

    #[must_use]
    pub const fn duration(&self, config: &ControllerConfig) -> Duration {
        animation_duration(config, self.types, self.show, self.has_callbacks)
    }

    #[must_use]
    pub const fn interpolator(&self) -> Interpolator {
        animation_interpolator(self.types, self.show, self.has_callbacks)
    }

    #[must_use]
    pub const fn alpha_curve(&self) -> AlphaCurve { alpha_curve(self.types, self.show, self.has_callbacks) }
}

impl AnimationControlListener for DefaultAnimationListener {
    fn on_ready(&mut self, controller: &mut InsetsController, id: AnimationId, _types: InsetTypes) {
        if self.disabled {
            if let Err(err) = controller.finish_animation(id, self.show) {
                tracing::warn!("failed to finish disabled animation {id}: {err}");
            }
            return;
        }
        let Some(runner) = controller.runner(id) else {
            return;
        };

        let shown = runner.shown_insets();
        let mut hidden = runner.hidden_insets();
        if runner.has_zero_insets_ime() {
            hidden = hidden.with_bottom(self.floating_ime_bottom_inset);
        }
        let (start, end) = if self.show { (hidden, shown) } else { (shown, hidden) };
        let animator = InsetsAnimator {
            start,
            end,
            duration: self.duration(controller.config()),
            interpolator: self.interpolator(),
            alpha: self.alpha_curve(),
            show: self.show,
        };

        if let Err(err) = controller.drive_animation(id, animator) {
            tracing::warn!("failed to drive animation {id}: {err}");
        }
    }

    fn on_cancelled(&mut self, _controller: &mut InsetsController, id: Option<AnimationId>) {
        if let Some(id) = id {
            tracing::debug!(animation = %id, types = %self.types, "default animation cancelled");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_durations() {
        let config = ControllerConfig::default();
        let ms = |types, show, callbacks| animation_duration(&config, types, show, callbacks).as_millis();
        assert_eq!(ms(InsetTypes::STATUS_BARS, true, true), 275);
        assert_eq!(ms(InsetTypes::STATUS_BARS, false, false), 340);
        assert_eq!(ms(InsetTypes::IME, true, true), 285);
        assert_eq!(ms(InsetTypes::IME, false, false), 200);
    }

    #[test]
    fn test_default_interpolators() {
        assert_eq!(animation_interpolator(InsetTypes::SYSTEM_BARS, true, false), Interpolator::SYSTEM_BARS);
        assert_eq!(animation_interpolator(InsetTypes::IME, false, true), Interpolator::SYNC_IME);
        assert_eq!(animation_interpolator(InsetTypes::IME, true, false), Interpolator::LINEAR_OUT_SLOW_IN);
        assert_eq!(animation_interpolator(InsetTypes::IME, false, false), Interpolator::FAST_OUT_LINEAR_IN);
    }

    #[test]
    fn test_only_unsynchronized_keyboard_fades() {
        assert_eq!(alpha_curve(InsetTypes::IME, true, false), AlphaCurve::FadeIn);
        assert_eq!(alpha_curve(InsetTypes::IME, false, false), AlphaCurve::FadeOut);
        assert_eq!(alpha_curve(InsetTypes::IME, true, true), AlphaCurve::Opaque);
        assert_eq!(alpha_curve(InsetTypes::STATUS_BARS, true, false), AlphaCurve::Opaque);
    }
}
