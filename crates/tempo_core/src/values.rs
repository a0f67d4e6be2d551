//! Animatable value types
//!
//! Provides the [`Interpolate`] trait for values that know how to blend
//! themselves, with implementations for the primitive numeric types, 2D/3D
//! points and RGBA colors stored as float arrays.

/// Trait for values that can be linearly interpolated
pub trait Interpolate: Clone + Send + Sync + 'static {
    /// Linearly interpolate between self and other by factor t (0.0 to 1.0)
    fn lerp(&self, other: &Self, t: f64) -> Self;

    /// Check if two values are approximately equal
    fn approx_eq(&self, other: &Self, epsilon: f64) -> bool;
}

// ============================================================================
// Floats
// ============================================================================

impl Interpolate for f64 {
    fn lerp(&self, other: &Self, t: f64) -> Self {
        self + (other - self) * t
    }

    fn approx_eq(&self, other: &Self, epsilon: f64) -> bool {
        (self - other).abs() < epsilon
    }
}

impl Interpolate for f32 {
    fn lerp(&self, other: &Self, t: f64) -> Self {
        let (a, b) = (*self as f64, *other as f64);
        (a + (b - a) * t) as f32
    }

    fn approx_eq(&self, other: &Self, epsilon: f64) -> bool {
        ((self - other).abs() as f64) < epsilon
    }
}

// ============================================================================
// Integers
// ============================================================================

// Integers offset the start value by the rounded delta in i128, so 64-bit
// values beyond f64 precision keep exact endpoints.
macro_rules! impl_interpolate_int {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Interpolate for $ty {
                fn lerp(&self, other: &Self, t: f64) -> Self {
                    if t <= 0.0 {
                        return *self;
                    }
                    if t >= 1.0 {
                        return *other;
                    }
                    let (a, b) = (*self as i128, *other as i128);
                    let delta = ((b - a) as f64 * t).round() as i128;
                    (a + delta).clamp(a.min(b), a.max(b)) as $ty
                }

                fn approx_eq(&self, other: &Self, epsilon: f64) -> bool {
                    ((*self as f64) - (*other as f64)).abs() < epsilon
                }
            }
        )*
    };
}

impl_interpolate_int!(i8, i16, i32, i64, u8, u16, u32, u64, isize, usize);

// ============================================================================
// Points
// ============================================================================

impl Interpolate for (f32, f32) {
    fn lerp(&self, other: &Self, t: f64) -> Self {
        (self.0.lerp(&other.0, t), self.1.lerp(&other.1, t))
    }

    fn approx_eq(&self, other: &Self, epsilon: f64) -> bool {
        self.0.approx_eq(&other.0, epsilon) && self.1.approx_eq(&other.1, epsilon)
    }
}

impl Interpolate for (f64, f64) {
    fn lerp(&self, other: &Self, t: f64) -> Self {
        (self.0.lerp(&other.0, t), self.1.lerp(&other.1, t))
    }

    fn approx_eq(&self, other: &Self, epsilon: f64) -> bool {
        self.0.approx_eq(&other.0, epsilon) && self.1.approx_eq(&other.1, epsilon)
    }
}

// ============================================================================
// Fixed-size arrays (vectors, RGBA colors)
// ============================================================================

impl<T, const N: usize> Interpolate for [T; N]
where
    T: Interpolate + Copy,
{
    fn lerp(&self, other: &Self, t: f64) -> Self {
        let mut out = *self;
        for (slot, (a, b)) in out.iter_mut().zip(self.iter().zip(other.iter())) {
            *slot = a.lerp(b, t);
        }
        out
    }

    fn approx_eq(&self, other: &Self, epsilon: f64) -> bool {
        self.iter()
            .zip(other.iter())
            .all(|(a, b)| a.approx_eq(b, epsilon))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_interpolation() {
        assert!((0.0_f64.lerp(&1.0, 0.5) - 0.5).abs() < 1e-12);
        assert!((10.0_f32.lerp(&20.0, 0.25) - 12.5).abs() < 1e-6);
    }

    #[test]
    fn test_integer_interpolation_rounds() {
        assert_eq!(0_i32.lerp(&10, 0.26), 3);
        assert_eq!(0_i32.lerp(&10, 0.0), 0);
        assert_eq!(0_i32.lerp(&10, 1.0), 10);
        assert_eq!(200_u8.lerp(&100, 0.5), 150);
        assert_eq!((-5_i64).lerp(&5, 0.5), 0);
    }

    #[test]
    fn test_wide_integers_keep_exact_endpoints() {
        let big = 9_007_199_254_740_993_i64;
        assert_eq!(big.lerp(&0, 0.0), big);
        assert_eq!(0_i64.lerp(&big, 1.0), big);
        assert_eq!(u64::MAX.lerp(&(u64::MAX - 10), 0.5), u64::MAX - 5);
        assert_eq!(big.lerp(&(big + 2), 0.5), big + 1);
        assert_eq!(i64::MIN.lerp(&i64::MAX, 0.5), 0);
    }

    #[test]
    fn test_point_interpolation() {
        let a = (0.0_f64, 10.0_f64);
        let b = (10.0_f64, 20.0_f64);
        let mid = a.lerp(&b, 0.5);
        assert!(mid.approx_eq(&(5.0, 15.0), 1e-9));
    }

    #[test]
    fn test_color_interpolation() {
        let black = [0.0_f32, 0.0, 0.0, 1.0];
        let white = [1.0_f32, 1.0, 1.0, 1.0];
        let grey = black.lerp(&white, 0.5);
        assert!(grey.approx_eq(&[0.5, 0.5, 0.5, 1.0], 1e-6));
    }
}
