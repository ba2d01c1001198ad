//! Frame math shared by the in-process and off-thread drivers.

use std::time::Duration;

use super::easing::{Interpolator, lerp};
use crate::types::Insets;

/// Evaluates insets between `start` and `end` at `fraction`.
///
/// Each edge is truncated toward zero, not rounded.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn evaluate_insets(fraction: f64, start: Insets, end: Insets) -> Insets {
    let edge = |from: i32, to: i32| lerp(f64::from(from), f64::from(to), fraction) as i32;
    Insets::new(
        edge(start.left, end.left),
        edge(start.top, end.top),
        edge(start.right, end.right),
        edge(start.bottom, end.bottom),
    )
}

/// How the alpha channel follows the raw animation fraction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AlphaCurve {
    /// Fully opaque for the whole animation.
    Opaque,
    /// Fades in over the first half of the animation.
    FadeIn,
    /// Fades out along a fast-out-linear-in curve.
    FadeOut,
}

impl AlphaCurve {
    /// Alpha at the given alpha fraction.
    #[must_use]
    pub fn alpha(self, fraction: f64) -> f64 {
        match self {
            Self::Opaque => 1.0,
            Self::FadeIn => (2.0 * fraction).min(1.0),
            Self::FadeOut => Interpolator::FAST_OUT_LINEAR_IN.interpolate(fraction),
        }
    }
}

/// One computed animation frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameSample {
    pub insets: Insets,
    pub alpha: f64,
    /// Raw (linear) time fraction.
    pub fraction: f64,
}

/// A time-based animation between two inset values.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InsetsAnimator {
    pub start: Insets,
    pub end: Insets,
    pub duration: Duration,
    pub interpolator: Interpolator,
    pub alpha: AlphaCurve,
    /// Whether the animation ends with the types shown.
    pub show: bool,
}

impl InsetsAnimator {
    /// Raw fraction after `elapsed`, clamped to `[0, 1]`.
    #[must_use]
    pub fn fraction(&self, elapsed: Duration) -> f64 {
        if self.duration.is_zero() {
            return 1.0;
        }
        (elapsed.as_secs_f64() / self.duration.as_secs_f64()).clamp(0.0, 1.0)
    }

    /// Computes the frame after `elapsed`.
    ///
    /// Insets follow the interpolator; alpha follows its own curve, running
    /// backwards when hiding.
    #[must_use]
    pub fn sample(&self, elapsed: Duration) -> FrameSample {
        let raw = self.fraction(elapsed);
        let alpha_fraction = if self.show { raw } else { 1.0 - raw };
        FrameSample {
            insets: evaluate_insets(self.interpolator.interpolate(raw), self.start, self.end),
            alpha: self.alpha.alpha(alpha_fraction),
            fraction: raw,
        }
    }

    #[must_use]
    pub fn is_complete(&self, elapsed: Duration) -> bool { elapsed >= self.duration }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluate_truncates() {
        let start = Insets::new(0, 0, 0, 0);
        let end = Insets::new(0, 0, 0, 99);
        assert_eq!(evaluate_insets(0.5, start, end), Insets::new(0, 0, 0, 49));
        // Negative values truncate toward zero as well.
        assert_eq!(evaluate_insets(0.5, Insets::new(0, 0, 0, -80), end), Insets::new(0, 0, 0, 9));
        assert_eq!(evaluate_insets(0.25, Insets::new(0, 0, 0, -81), Insets::NONE), Insets::new(0, 0, 0, -60));
    }

    #[test]
    fn test_alpha_curves() {
        assert!((AlphaCurve::Opaque.alpha(0.2) - 1.0).abs() < f64::EPSILON);
        assert!((AlphaCurve::FadeIn.alpha(0.25) - 0.5).abs() < f64::EPSILON);
        assert!((AlphaCurve::FadeIn.alpha(0.75) - 1.0).abs() < f64::EPSILON);
        assert!(AlphaCurve::FadeOut.alpha(0.0).abs() < 1e-6);
    }

    #[test]
    fn test_animator_show_samples() {
        let animator = InsetsAnimator {
            start: Insets::NONE,
            end: Insets::new(0, 0, 0, 800),
            duration: Duration::from_millis(200),
            interpolator: Interpolator::Linear,
            alpha: AlphaCurve::FadeIn,
            show: true,
        };
        let first = animator.sample(Duration::ZERO);
        assert_eq!(first.insets, Insets::NONE);
        assert!(first.alpha.abs() < f64::EPSILON);

        let mid = animator.sample(Duration::from_millis(100));
        assert_eq!(mid.insets, Insets::new(0, 0, 0, 400));
        assert!((mid.alpha - 1.0).abs() < f64::EPSILON);

        let last = animator.sample(Duration::from_millis(500));
        assert_eq!(last.insets, Insets::new(0, 0, 0, 800));
        assert!((last.fraction - 1.0).abs() < f64::EPSILON);
        assert!(animator.is_complete(Duration::from_millis(200)));
    }

    #[test]
    fn test_animator_hide_runs_alpha_backwards() {
        let animator = InsetsAnimator {
            start: Insets::new(0, 0, 0, 800),
            end: Insets::NONE,
            duration: Duration::from_millis(200),
            interpolator: Interpolator::Linear,
            alpha: AlphaCurve::FadeOut,
            show: false,
        };
        assert!((animator.sample(Duration::ZERO).alpha - 1.0).abs() < 1e-6);
        assert!(animator.sample(Duration::from_millis(200)).alpha.abs() < 1e-6);
    }

    #[test]
    fn test_zero_duration_completes_immediately() {
        let animator = InsetsAnimator {
            start: Insets::NONE,
            end: Insets::new(0, 80, 0, 0),
            duration: Duration::ZERO,
            interpolator: Interpolator::SYSTEM_BARS,
            alpha: AlphaCurve::Opaque,
            show: true,
        };
        assert_eq!(animator.sample(Duration::ZERO).insets, Insets::new(0, 80, 0, 0));
        assert!(animator.is_complete(Duration::ZERO));
    }
}
