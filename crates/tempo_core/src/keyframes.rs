//! Keyframe sequences
//!
//! A [`KeyFrames`] holds an ordered set of `(time, value, interpolator)`
//! anchors and evaluates a value of any type at any fraction of a cycle.
//! Instances are immutable and built through [`KeyFramesBuilder`], which
//! performs all validation up front.
//!
//! # Example
//!
//! ```
//! use tempo_core::KeyFramesBuilder;
//!
//! let frames = KeyFramesBuilder::with_start(0.0_f64)
//!     .add_frame_at(50.0, 0.3)
//!     .add_frame(100.0)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(frames.times(), &[0.0, 0.3, 1.0]);
//! assert_eq!(frames.interpolated_value_at(1.0), 100.0);
//! ```

use crate::error::{ConfigError, Result};
use crate::evaluator::{Evaluator, EvaluatorRegistry, SharedEvaluator};
use crate::interpolator::{clamp_fraction, linear, Interpolator, SharedInterpolator};
use std::fmt;
use std::sync::Arc;

/// An immutable, validated keyframe sequence
pub struct KeyFrames<T> {
    values: Vec<T>,
    times: Vec<f64>,
    /// Index 0 is always `None`; segment `i` uses `interpolators[i + 1]`
    interpolators: Vec<Option<SharedInterpolator>>,
    evaluator: SharedEvaluator<T>,
}

impl<T: Clone + 'static> KeyFrames<T> {
    /// Start a builder whose first frame is `start` at time 0
    pub fn builder(start: T) -> KeyFramesBuilder<T> {
        KeyFramesBuilder::with_start(start)
    }

    /// Build keyframes from values alone, auto-distributing their times
    pub fn from_values<I>(values: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
    {
        KeyFramesBuilder::new().add_frames(values).build()
    }

    /// Number of frames (always at least 2)
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Always false; kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn value(&self, index: usize) -> Option<&T> {
        self.values.get(index)
    }

    pub fn time(&self, index: usize) -> Option<f64> {
        self.times.get(index).copied()
    }

    /// Interpolator used for the segment ending at `index` (`None` for index 0)
    pub fn interpolator(&self, index: usize) -> Option<&SharedInterpolator> {
        self.interpolators.get(index).and_then(Option::as_ref)
    }

    pub fn evaluator(&self) -> &SharedEvaluator<T> {
        &self.evaluator
    }

    /// Index `i` of the segment `[times[i], times[i + 1]]` containing `fraction`
    ///
    /// A fraction that falls exactly on a key time selects the segment ending
    /// there, except 0 which selects the first segment and 1 which selects
    /// the last.
    pub fn segment_at(&self, fraction: f64) -> usize {
        let fraction = clamp_fraction(fraction);
        let last = self.times.len() - 2;
        if fraction >= 1.0 {
            return last;
        }
        // First index whose time is >= fraction
        let upper = self.times.partition_point(|&t| t < fraction);
        upper.clamp(1, self.times.len() - 1) - 1
    }

    /// Evaluate the animated value at `fraction` of the cycle
    pub fn interpolated_value_at(&self, fraction: f64) -> T {
        let fraction = clamp_fraction(fraction);
        let i = self.segment_at(fraction);
        if fraction >= 1.0 {
            return self
                .evaluator
                .evaluate(&self.values[i], &self.values[i + 1], 1.0);
        }
        let (t0, t1) = (self.times[i], self.times[i + 1]);
        let width = t1 - t0;
        let local = if width > 0.0 {
            clamp_fraction((fraction - t0) / width)
        } else {
            0.0
        };
        let eased = match &self.interpolators[i + 1] {
            Some(interpolator) => clamp_fraction(interpolator.interpolate(local)),
            None => local,
        };
        self.evaluator
            .evaluate(&self.values[i], &self.values[i + 1], eased)
    }
}

impl<T: Clone> Clone for KeyFrames<T> {
    fn clone(&self) -> Self {
        Self {
            values: self.values.clone(),
            times: self.times.clone(),
            interpolators: self.interpolators.clone(),
            evaluator: Arc::clone(&self.evaluator),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for KeyFrames<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyFrames")
            .field("values", &self.values)
            .field("times", &self.times)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Builder
// ============================================================================

/// One pending frame; `None` interpolator means "use the builder default"
struct PendingFrame<T> {
    value: T,
    time: f64,
    interpolator: Option<SharedInterpolator>,
}

/// Builder for [`KeyFrames`]
///
/// Frames added without a time are placed halfway into the interval remaining
/// after the previous frame. Frames added without an interpolator use the
/// builder's default interpolator (linear unless changed with
/// [`set_interpolator`](Self::set_interpolator)).
pub struct KeyFramesBuilder<T> {
    frames: Vec<PendingFrame<T>>,
    default_interpolator: Option<SharedInterpolator>,
    evaluator: Option<SharedEvaluator<T>>,
}

impl<T: Clone + 'static> KeyFramesBuilder<T> {
    /// Create an empty builder
    pub fn new() -> Self {
        Self {
            frames: Vec::new(),
            default_interpolator: None,
            evaluator: None,
        }
    }

    /// Create a builder whose first frame is `start` at time 0
    pub fn with_start(start: T) -> Self {
        let mut builder = Self::new();
        builder.frames.push(PendingFrame {
            value: start,
            time: 0.0,
            interpolator: None,
        });
        builder
    }

    fn next_auto_time(&self) -> f64 {
        match self.frames.last() {
            Some(prev) => prev.time + (1.0 - prev.time) / 2.0,
            None => 0.0,
        }
    }

    /// Add a frame halfway into the remaining interval
    pub fn add_frame(mut self, value: T) -> Self {
        let time = self.next_auto_time();
        self.frames.push(PendingFrame {
            value,
            time,
            interpolator: None,
        });
        self
    }

    /// Add a frame at an explicit time
    pub fn add_frame_at(mut self, value: T, time: f64) -> Self {
        self.frames.push(PendingFrame {
            value,
            time,
            interpolator: None,
        });
        self
    }

    /// Add a frame at an explicit time with its own segment interpolator
    pub fn add_frame_with<I>(mut self, value: T, time: f64, interpolator: I) -> Self
    where
        I: Interpolator + 'static,
    {
        self.frames.push(PendingFrame {
            value,
            time,
            interpolator: Some(Arc::new(interpolator)),
        });
        self
    }

    /// Add a frame at an explicit time with a shared interpolator
    pub fn add_frame_shared(mut self, value: T, time: f64, interpolator: SharedInterpolator) -> Self {
        self.frames.push(PendingFrame {
            value,
            time,
            interpolator: Some(interpolator),
        });
        self
    }

    /// Add several untimed frames
    pub fn add_frames<I>(self, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        values.into_iter().fold(self, |b, value| b.add_frame(value))
    }

    /// Set the interpolator used by frames that don't specify one
    pub fn set_interpolator(mut self, interpolator: SharedInterpolator) -> Self {
        self.default_interpolator = Some(interpolator);
        self
    }

    /// Use `evaluator` instead of looking one up by type
    pub fn set_evaluator<E>(mut self, evaluator: E) -> Self
    where
        E: Evaluator<T> + 'static,
    {
        self.evaluator = Some(Arc::new(evaluator));
        self
    }

    /// Use a shared evaluator instead of looking one up by type
    pub fn set_shared_evaluator(mut self, evaluator: SharedEvaluator<T>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    /// Number of frames added so far
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Validate and build, resolving the evaluator from the built-in registry
    pub fn build(self) -> Result<KeyFrames<T>> {
        self.build_with(EvaluatorRegistry::builtin())
    }

    /// Validate and build, resolving the evaluator from `registry`
    pub fn build_with(self, registry: &EvaluatorRegistry) -> Result<KeyFrames<T>> {
        let count = self.frames.len();
        if count < 2 {
            return Err(ConfigError::TooFewFrames { count });
        }

        if let Some((index, frame)) = self
            .frames
            .iter()
            .enumerate()
            .find(|(_, f)| !f.time.is_finite())
        {
            return Err(ConfigError::InvalidTime {
                index,
                time: frame.time,
            });
        }

        let mut times: Vec<f64> = self.frames.iter().map(|f| f.time).collect();
        times[0] = 0.0;
        times[count - 1] = 1.0;

        if times.windows(2).any(|w| w[1] < w[0]) {
            return Err(ConfigError::NonMonotonicTimes { times });
        }

        let evaluator = match self.evaluator {
            Some(evaluator) => evaluator,
            None => registry.resolve::<T>()?,
        };

        let default_interpolator = self.default_interpolator.unwrap_or_else(linear);
        let mut values = Vec::with_capacity(count);
        let mut interpolators = Vec::with_capacity(count);
        for (index, frame) in self.frames.into_iter().enumerate() {
            values.push(frame.value);
            interpolators.push(if index == 0 {
                None
            } else {
                Some(
                    frame
                        .interpolator
                        .unwrap_or_else(|| Arc::clone(&default_interpolator)),
                )
            });
        }

        tracing::trace!("KeyFrames built: {} frames, times {:?}", count, times);

        Ok(KeyFrames {
            values,
            times,
            interpolators,
            evaluator,
        })
    }
}

impl<T: Clone + 'static> Default for KeyFramesBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}
