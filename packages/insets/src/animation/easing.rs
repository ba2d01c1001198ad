//! Interpolation curves.
//!
//! Provides linear interpolation and cubic-bezier path curves anchored at
//! `(0, 0)` and `(1, 1)`, the shape used by every default inset animation.

// ============================================================================
// Easing Functions
// ============================================================================

/// Linear interpolation between two values.
#[inline]
pub fn lerp(start: f64, end: f64, t: f64) -> f64 { (end - start).mul_add(t, start) }

/// A cubic-bezier timing curve through `(0, 0)`, `(x1, y1)`, `(x2, y2)`, `(1, 1)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CubicBezier {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
}

const NEWTON_ITERATIONS: usize = 8;
const BISECTION_ITERATIONS: usize = 64;
const EPSILON: f64 = 1e-7;

impl CubicBezier {
    #[must_use]
    pub const fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self { Self { x1, y1, x2, y2 } }

    /// One coordinate of the curve at parameter `t`.
    #[inline]
    fn sample(a1: f64, a2: f64, t: f64) -> f64 {
        let u = 1.0 - t;
        (3.0 * u * u * t).mul_add(a1, (3.0 * u * t * t).mul_add(a2, t * t * t))
    }

    #[inline]
    fn sample_derivative(a1: f64, a2: f64, t: f64) -> f64 {
        let u = 1.0 - t;
        (3.0 * u * u).mul_add(a1, (6.0 * u * t).mul_add(a2 - a1, 3.0 * t * t * (1.0 - a2)))
    }

    /// Finds the curve parameter whose x coordinate is `x`.
    fn solve_t(&self, x: f64) -> f64 {
        let mut t = x;
        for _ in 0..NEWTON_ITERATIONS {
            let error = Self::sample(self.x1, self.x2, t) - x;
            if error.abs() < EPSILON {
                return t;
            }
            let slope = Self::sample_derivative(self.x1, self.x2, t);
            if slope.abs() < 1e-6 {
                break;
            }
            t = (t - error / slope).clamp(0.0, 1.0);
        }

        let (mut low, mut high) = (0.0, 1.0);
        t = x;
        for _ in 0..BISECTION_ITERATIONS {
            let value = Self::sample(self.x1, self.x2, t);
            if (value - x).abs() < EPSILON {
                break;
            }
            if value < x {
                low = t;
            } else {
                high = t;
            }
            t = f64::midpoint(low, high);
        }
        t
    }

    /// Eased value at input fraction `x`.
    #[must_use]
    pub fn ease(&self, x: f64) -> f64 {
        if x <= 0.0 {
            return 0.0;
        }
        if x >= 1.0 {
            return 1.0;
        }
        Self::sample(self.y1, self.y2, self.solve_t(x))
    }
}

// ============================================================================
// Interpolators
// ============================================================================

/// Maps a linear time fraction in `[0, 1]` to an eased fraction.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Interpolator {
    #[default]
    Linear,
    Cubic(CubicBezier),
}

impl Interpolator {
    /// Standard curve for system bars.
    pub const SYSTEM_BARS: Self = Self::Cubic(CubicBezier::new(0.4, 0.0, 0.2, 1.0));

    /// Keyboard curve when the host synchronizes with animation callbacks.
    pub const SYNC_IME: Self = Self::Cubic(CubicBezier::new(0.2, 0.0, 0.0, 1.0));

    pub const LINEAR_OUT_SLOW_IN: Self = Self::Cubic(CubicBezier::new(0.0, 0.0, 0.2, 1.0));

    pub const FAST_OUT_LINEAR_IN: Self = Self::Cubic(CubicBezier::new(0.4, 0.0, 1.0, 1.0));

    /// Applies the curve to `t`, clamped to `[0, 1]`.
    #[must_use]
    pub fn interpolate(&self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::Cubic(curve) => curve.ease(t),
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
    fn test_lerp() {
        assert!((lerp(0.0, 100.0, 0.5) - 50.0).abs() < f64::EPSILON);
        assert!((lerp(50.0, 150.0, 0.25) - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_interpolators_hit_endpoints() {
        for interpolator in [
            Interpolator::Linear,
            Interpolator::SYSTEM_BARS,
            Interpolator::SYNC_IME,
            Interpolator::LINEAR_OUT_SLOW_IN,
            Interpolator::FAST_OUT_LINEAR_IN,
        ] {
            assert!(interpolator.interpolate(0.0).abs() < 1e-6);
            assert!((interpolator.interpolate(1.0) - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_interpolate_clamps_input() {
        assert!((Interpolator::Linear.interpolate(-0.5)).abs() < f64::EPSILON);
        assert!((Interpolator::SYSTEM_BARS.interpolate(2.0) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_curve_shapes() {
        // Decelerating curves are ahead of linear at the midpoint.
        assert!(Interpolator::LINEAR_OUT_SLOW_IN.interpolate(0.5) > 0.5);
        assert!(Interpolator::SYSTEM_BARS.interpolate(0.5) > 0.5);
        // Accelerating curves lag behind.
        assert!(Interpolator::FAST_OUT_LINEAR_IN.interpolate(0.5) < 0.5);
    }

    #[test]
    fn test_linear_bezier_matches_identity() {
        let curve = CubicBezier::new(1.0 / 3.0, 1.0 / 3.0, 2.0 / 3.0, 2.0 / 3.0);
        for step in 1..10 {
            let x = f64::from(step) / 10.0;
            assert!((curve.ease(x) - x).abs() < 1e-5);
        }
    }

    #[test]
    fn test_curve_is_monotonic() {
        let mut previous = 0.0;
        for step in 0..=100 {
            let value = Interpolator::SYSTEM_BARS.interpolate(f64::from(step) / 100.0);
            assert!(value + 1e-9 >= previous);
            previous = value;
        }
    }
}
