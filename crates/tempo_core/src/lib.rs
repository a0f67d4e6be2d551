//! Tempo Core
//!
//! Value-level building blocks for the Tempo animation engine:
//!
//! - **Interpolators**: reshape a linear cycle fraction (linear, discrete,
//!   acceleration, cubic spline, or any closure)
//! - **Animatable values**: the [`Interpolate`] trait for types that blend themselves
//! - **Evaluators**: per-type blending functions with an exact-type [`EvaluatorRegistry`]
//! - **Keyframes**: validated `(time, value, interpolator)` sequences evaluated at any fraction
//!
//! Everything here is pure and immutable once built; timing and scheduling
//! live in `tempo_animation`.
//!
//! # Example
//!
//! ```rust
//! use tempo_core::{KeyFramesBuilder, SplineInterpolator};
//!
//! let opacity = KeyFramesBuilder::with_start(0.0_f32)
//!     .add_frame_with(1.0, 0.25, SplineInterpolator::ease_in_out())
//!     .add_frame_at(0.0, 1.0)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(opacity.interpolated_value_at(0.25), 1.0);
//! ```

pub mod error;
pub mod evaluator;
pub mod interpolator;
pub mod keyframes;
pub mod values;

pub use error::{ConfigError, Result};
pub use evaluator::{Evaluator, EvaluatorRegistry, LerpEvaluator, SharedEvaluator};
pub use interpolator::{
    clamp_fraction, linear, AccelerationInterpolator, DiscreteInterpolator, Interpolator,
    LinearInterpolator, SharedInterpolator, SplineInterpolator,
};
pub use keyframes::{KeyFrames, KeyFramesBuilder};
pub use values::Interpolate;
