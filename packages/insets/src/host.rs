//! Outbound interfaces of the controller.
//!
//! [`Host`] covers both the UI tree that receives animation callbacks and the
//! channel back to the remote authority. [`InputMethodService`] is the
//! keyboard service's show/hide acknowledgement protocol.

use crate::animation::{AnimationBounds, InsetsAnimation};
use crate::state::InsetsState;
use crate::types::Insets;

/// The process hosting the controller.
///
/// Every animation that reaches the ready state receives exactly one
/// `prepare`, one `start` and one `end`, in that order, with any number of
/// `progress` calls between `start` and `end`.
pub trait Host: Send {
    /// The live snapshot changed and the host should re-run layout.
    fn notify_insets_changed(&mut self);

    /// The locally requested visibility diverged from what the authority
    /// last acknowledged. `requested` must be sent to the authority.
    fn on_insets_modified(&mut self, requested: &InsetsState);

    /// Whether the host has per-frame animation callbacks to keep in sync.
    ///
    /// Hosts without callbacks get their default animations driven off the
    /// owner thread with keyboard curves tuned for that case.
    fn has_animation_callbacks(&self) -> bool;

    /// Asks the host to call [`crate::InsetsController::on_animation_frame`]
    /// on its next frame.
    fn post_animation_callback(&mut self);

    fn dispatch_animation_prepare(&mut self, _animation: &InsetsAnimation) {}

    /// Starts an animation. The returned bounds are the ones the host chose
    /// to animate between.
    fn dispatch_animation_start(
        &mut self,
        _animation: &InsetsAnimation,
        bounds: AnimationBounds,
    ) -> AnimationBounds {
        bounds
    }

    /// Publishes one frame: the merged snapshot, its insets and every
    /// animation whose start has been dispatched.
    fn dispatch_animation_progress(
        &mut self,
        _state: &InsetsState,
        _insets: Insets,
        _running: &[InsetsAnimation],
    ) {
    }

    fn dispatch_animation_end(&mut self, _animation: &InsetsAnimation) {}

    /// Converts density-independent pixels to pixels.
    fn dip_to_px(&self, dips: i32) -> i32 { dips }
}

/// The keyboard service as seen by the keyboard consumer.
pub trait InputMethodService: Send {
    /// Asks the service to show the keyboard.
    ///
    /// Returns `true` when the service accepted and will report readiness
    /// later through [`crate::InsetsController::apply_ime_visibility`].
    fn request_show(&mut self) -> bool;

    /// The keyboard has been hidden by the client.
    fn notify_hidden(&mut self);

    fn on_focus_gained(&mut self) {}

    fn on_focus_lost(&mut self) {}
}

/// An input method service for windows that never host a keyboard.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoInputMethod;

impl InputMethodService for NoInputMethod {
    fn request_show(&mut self) -> bool { false }

    fn notify_hidden(&mut self) {}
}
