//! Configuration error types

use thiserror::Error;

/// Errors raised while building keyframes, interpolators or animators
///
/// These are always raised at construction time. Nothing that successfully
/// builds can produce one of these later during evaluation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A keyframe sequence needs a start and an end frame
    #[error("at least 2 keyframes are required, got {count}")]
    TooFewFrames { count: usize },

    /// A key time was NaN or infinite
    #[error("key time at index {index} is not a finite number: {time}")]
    InvalidTime { index: usize, time: f64 },

    /// Key times went backwards
    #[error("key times must be non-decreasing: {times:?}")]
    NonMonotonicTimes { times: Vec<f64> },

    /// No evaluator was supplied and none is registered for the value type
    #[error("no evaluator registered for type `{type_name}`")]
    MissingEvaluator { type_name: &'static str },

    /// An interpolator was constructed with out-of-range parameters
    #[error("invalid interpolator: {0}")]
    InvalidInterpolator(String),

    /// A duration or period was zero or otherwise unusable
    #[error("invalid duration: {0}")]
    InvalidDuration(String),

    /// A repeat count was zero
    #[error("repeat count must be at least 1")]
    InvalidRepeatCount,

    /// Generic invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Result type for configuration-time operations
pub type Result<T> = std::result::Result<T, ConfigError>;
