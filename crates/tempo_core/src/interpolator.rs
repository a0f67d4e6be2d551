//! Fraction interpolators
//!
//! An interpolator reshapes a linear fraction in `[0, 1]` into another
//! fraction in `[0, 1]`. Animators apply one to the overall cycle fraction and
//! keyframe segments apply one to their local fraction.
//!
//! Callers rely on `interpolate(0.0) == 0.0` and `interpolate(1.0) == 1.0`.
//! The stock interpolators honor this; custom ones are expected to as well.

use crate::error::{ConfigError, Result};
use std::fmt;
use std::sync::Arc;

/// Maps a linear fraction to a (possibly non-linear) fraction
pub trait Interpolator: Send + Sync {
    /// Interpolate `fraction`, which the caller has clamped to `[0, 1]`
    fn interpolate(&self, fraction: f64) -> f64;
}

/// Shared, type-erased interpolator
pub type SharedInterpolator = Arc<dyn Interpolator>;

impl<F> Interpolator for F
where
    F: Fn(f64) -> f64 + Send + Sync,
{
    fn interpolate(&self, fraction: f64) -> f64 {
        self(fraction)
    }
}

/// Clamp a fraction to `[0, 1]`, mapping NaN to 0
#[inline]
pub fn clamp_fraction(fraction: f64) -> f64 {
    if fraction.is_nan() {
        0.0
    } else {
        fraction.clamp(0.0, 1.0)
    }
}

/// Shared instance of the identity interpolator
pub fn linear() -> SharedInterpolator {
    Arc::new(LinearInterpolator)
}

// ============================================================================
// Linear
// ============================================================================

/// The identity interpolator, the default everywhere
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LinearInterpolator;

impl Interpolator for LinearInterpolator {
    fn interpolate(&self, fraction: f64) -> f64 {
        fraction
    }
}

// ============================================================================
// Discrete
// ============================================================================

/// Holds the start until the very end of the segment, then jumps
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DiscreteInterpolator;

impl Interpolator for DiscreteInterpolator {
    fn interpolate(&self, fraction: f64) -> f64 {
        if fraction < 1.0 {
            0.0
        } else {
            1.0
        }
    }
}

// ============================================================================
// Acceleration
// ============================================================================

/// Accelerates from rest, cruises, then decelerates to rest
///
/// `acceleration` and `deceleration` are the fractions of the cycle spent
/// speeding up and slowing down. The cruise speed is chosen so the total
/// distance covered is exactly 1.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AccelerationInterpolator {
    acceleration: f64,
    deceleration: f64,
}

impl AccelerationInterpolator {
    /// Create a new acceleration interpolator
    ///
    /// Both phases must lie in `[0, 1]` and together must not exceed 1.
    pub fn new(acceleration: f64, deceleration: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&acceleration) {
            return Err(ConfigError::InvalidInterpolator(format!(
                "acceleration must be in [0, 1], got {acceleration}"
            )));
        }
        if !(0.0..=1.0).contains(&deceleration) {
            return Err(ConfigError::InvalidInterpolator(format!(
                "deceleration must be in [0, 1], got {deceleration}"
            )));
        }
        if acceleration + deceleration > 1.0 {
            return Err(ConfigError::InvalidInterpolator(format!(
                "acceleration + deceleration must not exceed 1, got {}",
                acceleration + deceleration
            )));
        }
        Ok(Self {
            acceleration,
            deceleration,
        })
    }

    pub fn acceleration(&self) -> f64 {
        self.acceleration
    }

    pub fn deceleration(&self) -> f64 {
        self.deceleration
    }
}

impl Interpolator for AccelerationInterpolator {
    fn interpolate(&self, fraction: f64) -> f64 {
        let a = self.acceleration;
        let d = self.deceleration;
        if a == 0.0 && d == 0.0 {
            return fraction;
        }
        // Peak velocity so that the area under the trapezoid is 1
        let run_rate = 1.0 / (1.0 - a / 2.0 - d / 2.0);
        if fraction < a {
            let avg = run_rate * (fraction / a) / 2.0;
            fraction * avg
        } else if fraction > 1.0 - d {
            let t_left = fraction - (1.0 - d);
            let pct_decel = t_left / d;
            let final_rate = run_rate * (1.0 - pct_decel);
            let avg = (run_rate + final_rate) / 2.0;
            let before = run_rate * (a / 2.0) + run_rate * (1.0 - a - d);
            (before + t_left * avg).min(1.0)
        } else {
            run_rate * (a / 2.0) + (fraction - a) * run_rate
        }
    }
}

// ============================================================================
// Spline
// ============================================================================

/// Cubic Bézier easing curve from `(0, 0)` to `(1, 1)`
///
/// The two control points must lie inside the unit square, which keeps the
/// curve a function of `x`.
#[derive(Clone, Copy, PartialEq)]
pub struct SplineInterpolator {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
}

impl SplineInterpolator {
    const SOLVE_ITERATIONS: usize = 24;
    const SOLVE_EPSILON: f64 = 1e-7;

    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Result<Self> {
        for (name, v) in [("x1", x1), ("y1", y1), ("x2", x2), ("y2", y2)] {
            if !(0.0..=1.0).contains(&v) {
                return Err(ConfigError::InvalidInterpolator(format!(
                    "spline control point {name} must be in [0, 1], got {v}"
                )));
            }
        }
        Ok(Self { x1, y1, x2, y2 })
    }

    /// The classic CSS `ease-in-out` curve
    pub fn ease_in_out() -> Self {
        Self {
            x1: 0.42,
            y1: 0.0,
            x2: 0.58,
            y2: 1.0,
        }
    }

    fn bezier(t: f64, p1: f64, p2: f64) -> f64 {
        let inv = 1.0 - t;
        3.0 * inv * inv * t * p1 + 3.0 * inv * t * t * p2 + t * t * t
    }

    fn bezier_slope(t: f64, p1: f64, p2: f64) -> f64 {
        let inv = 1.0 - t;
        3.0 * inv * inv * p1 + 6.0 * inv * t * (p2 - p1) + 3.0 * t * t * (1.0 - p2)
    }

    /// Find the curve parameter whose x coordinate is `x`
    fn solve_t(&self, x: f64) -> f64 {
        // Newton first, bisection when the slope flattens out
        let mut t = x;
        for _ in 0..8 {
            let err = Self::bezier(t, self.x1, self.x2) - x;
            if err.abs() < Self::SOLVE_EPSILON {
                return t;
            }
            let slope = Self::bezier_slope(t, self.x1, self.x2);
            if slope.abs() < 1e-6 {
                break;
            }
            t = (t - err / slope).clamp(0.0, 1.0);
        }

        let (mut lo, mut hi) = (0.0, 1.0);
        t = x;
        for _ in 0..Self::SOLVE_ITERATIONS {
            let guess = Self::bezier(t, self.x1, self.x2);
            if (guess - x).abs() < Self::SOLVE_EPSILON {
                break;
            }
            if guess < x {
                lo = t;
            } else {
                hi = t;
            }
            t = (lo + hi) / 2.0;
        }
        t
    }
}

impl Interpolator for SplineInterpolator {
    fn interpolate(&self, fraction: f64) -> f64 {
        if fraction <= 0.0 {
            return 0.0;
        }
        if fraction >= 1.0 {
            return 1.0;
        }
        let t = self.solve_t(fraction);
        clamp_fraction(Self::bezier(t, self.y1, self.y2))
    }
}

impl fmt::Debug for SplineInterpolator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SplineInterpolator({}, {}, {}, {})",
            self.x1, self.y1, self.x2, self.y2
        )
    }
}
