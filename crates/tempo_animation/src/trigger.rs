//! Triggers
//!
//! A [`Trigger`] starts, restarts or reverses an animator in response to
//! events. Events come in opposing pairs (press/release, start/stop); with
//! auto-reverse enabled, the opposite event plays the animation backwards
//! from wherever it currently is.
//!
//! [`TimingTrigger`] is a ready-made event source: it listens to one animator
//! and fires a trigger on another, for chaining animations.

use crate::animator::{Animator, Direction};
use crate::error::{TargetResult, UsageError};
use crate::target::{TargetId, TimingTarget};
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Event kind a trigger reacts to
pub trait TriggerEvent: Copy + PartialEq + Debug + Send + Sync + 'static {
    /// The paired event that plays the animation in reverse
    fn opposite(self) -> Self;
}

/// Drives an animator from events
pub struct Trigger<E: TriggerEvent> {
    animator: Animator,
    event: E,
    auto_reverse: bool,
    armed: AtomicBool,
}

impl<E: TriggerEvent> Trigger<E> {
    pub fn new(animator: Animator, event: E, auto_reverse: bool) -> Self {
        Self {
            animator,
            event,
            auto_reverse,
            armed: AtomicBool::new(true),
        }
    }

    pub fn animator(&self) -> &Animator {
        &self.animator
    }

    pub fn event(&self) -> E {
        self.event
    }

    pub fn auto_reverse(&self) -> bool {
        self.auto_reverse
    }

    /// Stop reacting to events; idempotent
    pub fn disarm(&self) {
        self.armed.store(false, Ordering::Release);
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    /// React to `event`
    ///
    /// - matching event: with auto-reverse, turn a backward run around or
    ///   start if stopped; otherwise restart from the beginning
    /// - opposite event with auto-reverse: turn a forward run around or
    ///   start in reverse if stopped
    /// - anything else is ignored
    pub fn fire(&self, event: E) -> Result<(), UsageError> {
        if !self.is_armed() {
            return Ok(());
        }

        if event == self.event {
            if !self.auto_reverse {
                tracing::debug!(animator = %self.animator.debug_name(), ?event, "trigger restart");
                return self.animator.restart();
            }
            self.play(Direction::Forward)
        } else if self.auto_reverse && event == self.event.opposite() {
            self.play(Direction::Backward)
        } else {
            Ok(())
        }
    }

    /// Run toward `target` relative to the animator's start direction
    fn play(&self, target: Direction) -> Result<(), UsageError> {
        let animator = &self.animator;
        let wanted = match target {
            Direction::Forward => animator.start_direction(),
            Direction::Backward => animator.start_direction().flip(),
        };

        if animator.is_running() {
            if animator.direction() != wanted {
                if animator.is_paused() {
                    animator.resume()?;
                }
                animator.reverse_now()?;
            }
            Ok(())
        } else if target == Direction::Forward {
            animator.start()
        } else {
            animator.start_reverse()
        }
    }
}

/// Events raised by an animator's lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimingTriggerEvent {
    Start,
    Stop,
    Repeat,
    Reverse,
}

impl TriggerEvent for TimingTriggerEvent {
    fn opposite(self) -> Self {
        match self {
            TimingTriggerEvent::Start => TimingTriggerEvent::Stop,
            TimingTriggerEvent::Stop => TimingTriggerEvent::Start,
            other => other,
        }
    }
}

/// Trigger fired by another animator's notifications
pub struct TimingTrigger {
    trigger: Trigger<TimingTriggerEvent>,
}

impl TimingTrigger {
    pub fn new(target: Animator, event: TimingTriggerEvent, auto_reverse: bool) -> Self {
        Self {
            trigger: Trigger::new(target, event, auto_reverse),
        }
    }

    /// Fire `target` from the notifications of `source`
    ///
    /// Returns the trigger and its registration on `source`.
    pub fn attach(
        source: &Animator,
        target: Animator,
        event: TimingTriggerEvent,
        auto_reverse: bool,
    ) -> (Arc<TimingTrigger>, TargetId) {
        let trigger = Arc::new(Self::new(target, event, auto_reverse));
        let id = source.add_target(trigger.clone());
        (trigger, id)
    }

    pub fn trigger(&self) -> &Trigger<TimingTriggerEvent> {
        &self.trigger
    }

    pub fn disarm(&self) {
        self.trigger.disarm();
    }

    fn forward(&self, event: TimingTriggerEvent) -> TargetResult {
        self.trigger.fire(event)?;
        Ok(())
    }
}

impl TimingTarget for TimingTrigger {
    fn begin(&self, _source: &Animator) -> TargetResult {
        self.forward(TimingTriggerEvent::Start)
    }

    fn end(&self, _source: &Animator) -> TargetResult {
        self.forward(TimingTriggerEvent::Stop)
    }

    fn repeat(&self, _source: &Animator) -> TargetResult {
        self.forward(TimingTriggerEvent::Repeat)
    }

    fn reverse(&self, _source: &Animator) -> TargetResult {
        self.forward(TimingTriggerEvent::Reverse)
    }
}
