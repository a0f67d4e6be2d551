//! Configuration presets and TOML loading
//!
//! [`AnimatorConfig`] and [`PulseConfig`] mirror the builder options in plain
//! serializable form, so animations can be tuned from a file:
//!
//! ```toml
//! duration_ms = 250
//! repeat_count = "infinite"
//! repeat_behavior = "reverse"
//!
//! [interpolator]
//! kind = "spline"
//! x1 = 0.42
//! y1 = 0.0
//! x2 = 0.58
//! y2 = 1.0
//! ```

use crate::animator::{AnimatorBuilder, Direction, EndBehavior, RepeatBehavior, RepeatCount};
use crate::error::Result;
use crate::pulse::{PulseSource, ThreadPulseSource};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tempo_core::{
    AccelerationInterpolator, ConfigError, DiscreteInterpolator, LinearInterpolator,
    SharedInterpolator, SplineInterpolator,
};

/// Serializable choice of stock interpolator
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InterpolatorKind {
    #[default]
    Linear,
    Discrete,
    Acceleration {
        acceleration: f64,
        deceleration: f64,
    },
    Spline {
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
    },
}

impl InterpolatorKind {
    /// Standard ease-in-out curve
    pub fn ease_in_out() -> Self {
        InterpolatorKind::Spline {
            x1: 0.42,
            y1: 0.0,
            x2: 0.58,
            y2: 1.0,
        }
    }

    /// Validate parameters and build the interpolator
    pub fn build(&self) -> std::result::Result<SharedInterpolator, ConfigError> {
        let interpolator: SharedInterpolator = match *self {
            InterpolatorKind::Linear => Arc::new(LinearInterpolator),
            InterpolatorKind::Discrete => Arc::new(DiscreteInterpolator),
            InterpolatorKind::Acceleration {
                acceleration,
                deceleration,
            } => Arc::new(AccelerationInterpolator::new(acceleration, deceleration)?),
            InterpolatorKind::Spline { x1, y1, x2, y2 } => {
                Arc::new(SplineInterpolator::new(x1, y1, x2, y2)?)
            }
        };
        Ok(interpolator)
    }
}

/// Configuration for one animator
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimatorConfig {
    /// Length of one cycle (ms)
    pub duration_ms: u64,
    /// Delay before the first cycle (ms)
    pub start_delay_ms: u64,
    pub repeat_count: RepeatCount,
    pub repeat_behavior: RepeatBehavior,
    pub end_behavior: EndBehavior,
    pub start_direction: Direction,
    pub interpolator: InterpolatorKind,
    /// Reject durations shorter than one pulse period
    pub disable_degenerate_durations: bool,
    pub debug_name: Option<String>,
}

impl Default for AnimatorConfig {
    fn default() -> Self {
        Self::standard()
    }
}

impl AnimatorConfig {
    /// One second, single cycle, linear
    pub fn standard() -> Self {
        Self {
            duration_ms: 1_000,
            start_delay_ms: 0,
            repeat_count: RepeatCount::Times(1),
            repeat_behavior: RepeatBehavior::Reverse,
            end_behavior: EndBehavior::Hold,
            start_direction: Direction::Forward,
            interpolator: InterpolatorKind::Linear,
            disable_degenerate_durations: false,
            debug_name: None,
        }
    }

    /// Short eased transition
    pub fn quick() -> Self {
        Self {
            duration_ms: 200,
            interpolator: InterpolatorKind::ease_in_out(),
            ..Self::standard()
        }
    }

    /// Endless back-and-forth, e.g. a pulsing highlight
    pub fn looping() -> Self {
        Self {
            repeat_count: RepeatCount::Infinite,
            repeat_behavior: RepeatBehavior::Reverse,
            interpolator: InterpolatorKind::ease_in_out(),
            ..Self::standard()
        }
    }

    /// Parse from TOML; missing fields take their standard values
    pub fn from_toml(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    pub fn start_delay(&self) -> Duration {
        Duration::from_millis(self.start_delay_ms)
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_ms = duration.as_millis() as u64;
        self
    }

    pub fn with_start_delay(mut self, delay: Duration) -> Self {
        self.start_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn with_repeat_count(mut self, count: RepeatCount) -> Self {
        self.repeat_count = count;
        self
    }

    pub fn with_repeat_behavior(mut self, behavior: RepeatBehavior) -> Self {
        self.repeat_behavior = behavior;
        self
    }

    pub fn with_end_behavior(mut self, behavior: EndBehavior) -> Self {
        self.end_behavior = behavior;
        self
    }

    pub fn with_interpolator(mut self, interpolator: InterpolatorKind) -> Self {
        self.interpolator = interpolator;
        self
    }

    pub fn with_debug_name(mut self, name: impl Into<String>) -> Self {
        self.debug_name = Some(name.into());
        self
    }

    /// Apply every setting to `builder`
    pub fn apply(&self, builder: AnimatorBuilder) -> std::result::Result<AnimatorBuilder, ConfigError> {
        let mut builder = builder
            .duration(self.duration())
            .start_delay(self.start_delay())
            .repeat_count(self.repeat_count)
            .repeat_behavior(self.repeat_behavior)
            .end_behavior(self.end_behavior)
            .start_direction(self.start_direction)
            .interpolator(self.interpolator.build()?)
            .disable_degenerate_durations(self.disable_degenerate_durations);
        if let Some(name) = &self.debug_name {
            builder = builder.debug_name(name.clone());
        }
        Ok(builder)
    }

    /// Builder for an animator on `source` with these settings
    pub fn builder(&self, source: Arc<dyn PulseSource>) -> std::result::Result<AnimatorBuilder, ConfigError> {
        self.apply(AnimatorBuilder::new(source))
    }
}

/// Configuration for the threaded pulse source
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PulseConfig {
    /// Time between pulses (µs)
    pub period_micros: u64,
    pub thread_name: String,
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self::standard()
    }
}

impl PulseConfig {
    /// 120 pulses per second
    pub fn standard() -> Self {
        Self {
            period_micros: 8_333,
            thread_name: ThreadPulseSource::DEFAULT_THREAD_NAME.to_string(),
        }
    }

    /// Pulse `rate` times per second
    pub fn fps(rate: u32) -> Self {
        Self {
            period_micros: 1_000_000 / u64::from(rate.max(1)),
            ..Self::standard()
        }
    }

    pub fn from_toml(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    pub fn period(&self) -> Duration {
        Duration::from_micros(self.period_micros)
    }

    pub fn with_period(mut self, period: Duration) -> Self {
        self.period_micros = period.as_micros() as u64;
        self
    }

    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Build an uninitialized threaded source
    pub fn build_source(&self) -> std::result::Result<ThreadPulseSource, ConfigError> {
        ThreadPulseSource::with_name(self.period(), self.thread_name.clone())
    }
}
