//! Tempo Animation
//!
//! Time-driven animation scheduling on top of `tempo_core`.
//!
//! # Features
//!
//! - **Pulse Sources**: a periodic clock delivering pulses on one execution
//!   context, threaded ([`ThreadPulseSource`]) or caller-driven ([`ManualPulseSource`])
//! - **Animators**: start/stop/pause/resume/reverse state machine with start
//!   delay, repeat counts, repeat and end behaviors
//! - **Timing Targets**: ordered receivers of `begin`, `end`, `repeat`,
//!   `reverse` and `timing_event` notifications
//! - **Property Setters**: keyframe-driven targets writing into [`Property`] accessors
//! - **Triggers**: event-driven start and auto-reverse, including
//!   animator-to-animator chaining with [`TimingTrigger`]
//! - **Runtime & Config**: [`AnimationRuntime`] composition root and
//!   TOML-loadable [`AnimatorConfig`] / [`PulseConfig`]
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tempo_animation::prelude::*;
//!
//! let runtime = AnimationRuntime::threaded(Duration::from_millis(8)).unwrap();
//! runtime.init().unwrap();
//!
//! let opacity = SharedValue::new("opacity", 0.0_f32);
//! let fade = PropertySetter::to(opacity.as_property(), [1.0]).unwrap();
//!
//! let animator = runtime
//!     .animator(Duration::from_millis(250))
//!     .target(Arc::new(fade))
//!     .build()
//!     .unwrap();
//! animator.start().unwrap();
//! animator.wait_until_stopped(Duration::from_secs(1));
//! ```

pub mod animator;
pub mod clock;
pub mod config;
pub mod error;
pub mod property;
pub mod pulse;
pub mod runtime;
pub mod setter;
pub mod target;
pub mod trigger;

pub use animator::{
    Animator, AnimatorBuilder, AnimatorState, Direction, EndBehavior, RepeatBehavior, RepeatCount,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AnimatorConfig, InterpolatorKind, PulseConfig};
pub use error::{
    AnimationError, NotificationError, NotificationKind, PulseError, Result, TargetError,
    TargetResult, UsageError,
};
pub use property::{property, setter_property, FnProperty, Property, PropertyError, SharedValue};
pub use pulse::{
    tick_listener, ContextTask, ErrorHandler, ManualPulseSource, PulseDispatcher, PulseSource,
    SourcePhase, ThreadPulseSource, TickListener, TickListenerId,
};
pub use runtime::AnimationRuntime;
pub use setter::PropertySetter;
pub use target::{timing_event_target, Notification, TargetId, TargetList, TimingTarget};
pub use trigger::{TimingTrigger, TimingTriggerEvent, Trigger, TriggerEvent};

/// Commonly used items
pub mod prelude {
    pub use crate::{
        AnimationRuntime, Animator, AnimatorConfig, Direction, EndBehavior, ManualPulseSource,
        Property, PropertySetter, PulseSource, RepeatBehavior, RepeatCount, SharedValue,
        ThreadPulseSource, TimingTarget, Trigger, TriggerEvent,
    };
    pub use tempo_core::{KeyFrames, KeyFramesBuilder, SharedInterpolator, SplineInterpolator};
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Recording target shared by the unit tests

    use crate::animator::{Animator, Direction};
    use crate::error::TargetResult;
    use crate::target::TimingTarget;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Clone, Copy, Debug, PartialEq)]
    pub enum Event {
        Begin,
        End,
        Repeat,
        Reverse,
        Timing(f64, Direction),
    }

    pub type SharedLog = Arc<Mutex<Vec<(&'static str, Event)>>>;

    /// Timing target that records every notification it receives
    pub struct Recorder {
        name: &'static str,
        events: Mutex<Vec<Event>>,
        log: Option<SharedLog>,
    }

    impl Recorder {
        pub fn new() -> Arc<Self> {
            Arc::new(Self {
                name: "recorder",
                events: Mutex::new(Vec::new()),
                log: None,
            })
        }

        /// Recorder that also appends `(name, event)` to a log shared with others
        pub fn with_log(name: &'static str, log: &SharedLog) -> Arc<Self> {
            Arc::new(Self {
                name,
                events: Mutex::new(Vec::new()),
                log: Some(Arc::clone(log)),
            })
        }

        pub fn shared_log() -> SharedLog {
            Arc::new(Mutex::new(Vec::new()))
        }

        fn record(&self, event: Event) -> TargetResult {
            self.events.lock().push(event);
            if let Some(log) = &self.log {
                log.lock().push((self.name, event));
            }
            Ok(())
        }

        pub fn events(&self) -> Vec<Event> {
            self.events.lock().clone()
        }

        /// Every event except timing events
        pub fn lifecycle(&self) -> Vec<Event> {
            self.events
                .lock()
                .iter()
                .filter(|event| !matches!(event, Event::Timing(..)))
                .copied()
                .collect()
        }

        pub fn last_timing(&self) -> Option<(f64, Direction)> {
            self.events.lock().iter().rev().find_map(|event| match *event {
                Event::Timing(fraction, direction) => Some((fraction, direction)),
                _ => None,
            })
        }

        pub fn count(&self, event: &Event) -> usize {
            self.events.lock().iter().filter(|e| *e == event).count()
        }
    }

    impl TimingTarget for Recorder {
        fn begin(&self, _source: &Animator) -> TargetResult {
            self.record(Event::Begin)
        }

        fn end(&self, _source: &Animator) -> TargetResult {
            self.record(Event::End)
        }

        fn repeat(&self, _source: &Animator) -> TargetResult {
            self.record(Event::Repeat)
        }

        fn reverse(&self, _source: &Animator) -> TargetResult {
            self.record(Event::Reverse)
        }

        fn timing_event(&self, _source: &Animator, fraction: f64, direction: Direction) -> TargetResult {
            self.record(Event::Timing(fraction, direction))
        }
    }
}
