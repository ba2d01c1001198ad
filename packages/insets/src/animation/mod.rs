//! Inset animations.
//!
//! - `easing`: interpolation curves
//! - `evaluator`: per-frame math shared by both drivers
//! - `runner`: the state machine of one running animation
//! - `off_thread`: the secondary-thread driver
//! - `listener`: listener traits and the default system animation

pub mod easing;
pub mod evaluator;
pub mod listener;
pub mod off_thread;
pub mod runner;

use std::fmt;
use std::time::Duration;

pub use easing::{CubicBezier, Interpolator};
pub use evaluator::{AlphaCurve, FrameSample, InsetsAnimator};
pub use listener::{AnimationControlListener, ControllableInsetsListener, DefaultAnimationListener};
pub use runner::{AnimationRunner, RunnerState};

use crate::types::{Insets, InsetTypes};

/// Identifier of a running animation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnimationId(u64);

impl AnimationId {
    #[must_use]
    pub const fn new(id: u64) -> Self { Self(id) }

    #[must_use]
    pub const fn get(self) -> u64 { self.0 }
}

impl fmt::Display for AnimationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "#{}", self.0) }
}

/// The inset range an animation moves through.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AnimationBounds {
    /// Insets with the animated types fully hidden.
    pub lower: Insets,
    /// Insets with the animated types fully shown.
    pub upper: Insets,
}

/// Public view of a running animation, handed to the host.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InsetsAnimation {
    pub id: AnimationId,
    pub types: InsetTypes,
    pub interpolator: Interpolator,
    pub duration: Duration,
    /// Linear time fraction.
    pub fraction: f64,
    pub alpha: f64,
}

impl InsetsAnimation {
    /// Fraction after applying the animation's interpolator.
    #[must_use]
    pub fn interpolated_fraction(&self) -> f64 { self.interpolator.interpolate(self.fraction) }
}
