//! Animator state machine
//!
//! An [`Animator`] turns pulses from a [`PulseSource`] into timing
//! notifications for its targets. It is a cheap cloneable handle; every clone
//! controls the same animation.
//!
//! ```text
//!            start / start_reverse
//!   Stopped ───────────────────────▶ Running ◀──── resume ──┐
//!      ▲                               │  │                 │
//!      │     stop / cancel / natural   │  └──── pause ──▶ Paused
//!      └───────────────────────────────┘                    │
//!      └──────────────────── stop / cancel ─────────────────┘
//! ```
//!
//! Control operations validate and commit synchronously. The notifications
//! they cause are queued onto the pulse context, so targets are only ever
//! called from there, one at a time.

use crate::error::{PulseError, UsageError};
use crate::pulse::{ContextTask, PulseSource, SourcePhase, TickListener, TickListenerId};
use crate::target::{Notification, TargetId, TargetList, TimingTarget};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempo_core::interpolator::{clamp_fraction, linear};
use tempo_core::{ConfigError, SharedInterpolator};

/// Upper bound on `repeat` notifications emitted by a single pulse
const MAX_REPEATS_PER_PULSE: u64 = 256;

static NEXT_ANIMATOR_ID: AtomicU64 = AtomicU64::new(1);

/// Lifecycle state of an animator
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AnimatorState {
    Stopped,
    Running,
    Paused,
}

impl fmt::Display for AnimatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AnimatorState::Stopped => "stopped",
            AnimatorState::Running => "running",
            AnimatorState::Paused => "paused",
        };
        f.write_str(name)
    }
}

/// Direction of travel through a cycle
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Fraction moves from 0 to 1
    #[default]
    Forward,
    /// Fraction moves from 1 to 0
    Backward,
}

impl Direction {
    pub fn flip(self) -> Self {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }

    /// Fraction at which a cycle in this direction starts
    pub fn initial_fraction(self) -> f64 {
        match self {
            Direction::Forward => 0.0,
            Direction::Backward => 1.0,
        }
    }

    /// Fraction at which a cycle in this direction ends
    pub fn terminal_fraction(self) -> f64 {
        1.0 - self.initial_fraction()
    }
}

/// What happens at a cycle boundary
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatBehavior {
    /// Keep the direction; the fraction jumps back to the start
    Restart,
    /// Flip the direction
    #[default]
    Reverse,
}

/// Fraction reported when an animation runs to completion
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndBehavior {
    /// Report the terminal fraction of the final direction
    #[default]
    Hold,
    /// Report the fraction the run started from
    Reset,
}

/// Number of cycles an animator runs for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatCount {
    Times(u64),
    Infinite,
}

impl Default for RepeatCount {
    fn default() -> Self {
        RepeatCount::Times(1)
    }
}

/// Immutable configuration
struct Settings {
    duration: Duration,
    start_delay: Duration,
    repeat_count: RepeatCount,
    repeat_behavior: RepeatBehavior,
    end_behavior: EndBehavior,
    start_direction: Direction,
    interpolator: SharedInterpolator,
    debug_name: String,
}

/// Mutable timing state, guarded by the animator's lock
struct Timing {
    state: AnimatorState,
    /// Current direction of travel
    direction: Direction,
    /// Direction the current run started with
    run_direction: Direction,
    /// Source time the current run counts from, in nanoseconds; moved by
    /// `resume` and `reverse_now`, so it may go negative
    start_ref: i128,
    paused_at: Duration,
    /// Index of the cycle reported by the last pulse
    cycle: u64,
    begun: bool,
    /// Bumped on every start so pulses from a previous run are ignored
    generation: u64,
    listener: Option<TickListenerId>,
    /// `end` notifications committed but not yet delivered
    pending_ends: u32,
}

struct AnimatorInner {
    settings: Settings,
    source: Arc<dyn PulseSource>,
    timing: Mutex<Timing>,
    stopped: Condvar,
    targets: TargetList,
}

fn nanos(duration: Duration) -> i128 {
    duration.as_nanos() as i128
}

/// Handle to an animation driven by a pulse source
#[derive(Clone)]
pub struct Animator {
    inner: Arc<AnimatorInner>,
}

impl Animator {
    /// Start configuring an animator driven by `source`
    pub fn builder(source: Arc<dyn PulseSource>) -> AnimatorBuilder {
        AnimatorBuilder::new(source)
    }

    // ========================================================================
    // Control
    // ========================================================================

    /// Start in the configured start direction
    pub fn start(&self) -> Result<(), UsageError> {
        self.start_in(self.inner.settings.start_direction)
    }

    /// Start opposite to the configured start direction
    pub fn start_reverse(&self) -> Result<(), UsageError> {
        self.start_in(self.inner.settings.start_direction.flip())
    }

    fn start_in(&self, direction: Direction) -> Result<(), UsageError> {
        let mut timing = self.inner.timing.lock();
        self.begin_run(&mut timing, direction)
    }

    fn begin_run(&self, timing: &mut Timing, direction: Direction) -> Result<(), UsageError> {
        let source = &self.inner.source;
        if timing.state != AnimatorState::Stopped {
            return Err(UsageError::AlreadyRunning(timing.state));
        }
        if source.phase() == SourcePhase::Disposed {
            return Err(UsageError::SourceDisposed);
        }

        timing.state = AnimatorState::Running;
        timing.direction = direction;
        timing.run_direction = direction;
        timing.start_ref = nanos(source.now());
        timing.cycle = 0;
        timing.begun = false;
        timing.generation += 1;
        let id = source.add_tick_listener(Arc::new(PulseHook {
            animator: self.clone(),
            generation: timing.generation,
        }));

        // Disposed between the check above and the registration
        if source.phase() == SourcePhase::Disposed {
            source.remove_tick_listener(id);
            timing.state = AnimatorState::Stopped;
            return Err(UsageError::SourceDisposed);
        }
        timing.listener = Some(id);

        tracing::debug!(animator = %self.debug_name(), ?direction, "start");
        Ok(())
    }

    /// Stop, notifying targets with `end`
    ///
    /// Returns false if the animator was already stopped.
    pub fn stop(&self) -> bool {
        self.halt(true)
    }

    /// Stop without notifying targets
    pub fn cancel(&self) -> bool {
        self.halt(false)
    }

    fn halt(&self, notify_end: bool) -> bool {
        let halted = {
            let mut timing = self.inner.timing.lock();
            self.halt_run(&mut timing, notify_end)
        };
        if halted {
            self.finish_halt(notify_end);
        }
        halted
    }

    /// Commit the stop under the lock; returns false if already stopped
    fn halt_run(&self, timing: &mut Timing, notify_end: bool) -> bool {
        if timing.state == AnimatorState::Stopped {
            return false;
        }
        timing.state = AnimatorState::Stopped;
        if let Some(id) = timing.listener.take() {
            self.inner.source.remove_tick_listener(id);
        }
        if notify_end {
            timing.pending_ends += 1;
        }
        true
    }

    /// Queue the committed `end`, or wake waiters if there is none
    fn finish_halt(&self, notify_end: bool) {
        if notify_end {
            // The guard settles the pending end whether the task runs or is dropped
            let guard = PendingEnd(self.clone());
            let task: ContextTask = Box::new(move || {
                let animator = &guard.0;
                animator.inner.targets.notify(animator, &[Notification::End])
            });
            if let Err(err) = self.inner.source.run_in_context(task) {
                tracing::warn!(animator = %self.debug_name(), "end notification dropped: {}", err);
            }
        } else {
            self.inner.stopped.notify_all();
        }

        tracing::debug!(animator = %self.debug_name(), notify_end, "stop");
    }

    /// Freeze elapsed time
    pub fn pause(&self) -> Result<(), UsageError> {
        let mut timing = self.inner.timing.lock();
        if timing.state != AnimatorState::Running {
            return Err(UsageError::NotRunning(timing.state));
        }
        timing.state = AnimatorState::Paused;
        timing.paused_at = self.inner.source.now();
        tracing::debug!(animator = %self.debug_name(), "pause");
        Ok(())
    }

    /// Continue from where `pause` left off
    pub fn resume(&self) -> Result<(), UsageError> {
        let mut timing = self.inner.timing.lock();
        if timing.state != AnimatorState::Paused {
            return Err(UsageError::NotPaused(timing.state));
        }
        let paused_for = nanos(self.inner.source.now()) - nanos(timing.paused_at);
        timing.start_ref += paused_for.max(0);
        timing.state = AnimatorState::Running;
        tracing::debug!(animator = %self.debug_name(), "resume");
        Ok(())
    }

    /// Flip direction mid-cycle, continuing from the current fraction
    pub fn reverse_now(&self) -> Result<(), UsageError> {
        let direction = {
            let mut timing = self.inner.timing.lock();
            if timing.state != AnimatorState::Running {
                return Err(UsageError::NotRunning(timing.state));
            }

            let now = nanos(self.inner.source.now());
            let delay = nanos(self.inner.settings.start_delay);
            let elapsed = now - timing.start_ref;
            if elapsed >= delay {
                // Mirror the position inside the current cycle so that
                // `1 - raw` after the flip equals `raw` before it
                let duration = nanos(self.inner.settings.duration);
                let run = elapsed - delay;
                let cycle_start = (run / duration) * duration;
                let in_cycle = run % duration;
                let mirrored = if in_cycle == 0 {
                    duration - 1
                } else {
                    duration - in_cycle
                };
                timing.start_ref = now - delay - (cycle_start + mirrored);
            }
            timing.direction = timing.direction.flip();
            timing.direction
        };

        let animator = self.clone();
        let task: ContextTask =
            Box::new(move || animator.inner.targets.notify(&animator, &[Notification::Reverse]));
        if let Err(err) = self.inner.source.run_in_context(task) {
            tracing::warn!(animator = %self.debug_name(), "reverse notification dropped: {}", err);
        }

        tracing::debug!(animator = %self.debug_name(), ?direction, "reverse");
        Ok(())
    }

    /// Stop (with `end` if it was running) and start again
    pub fn restart(&self) -> Result<(), UsageError> {
        self.restart_in(self.inner.settings.start_direction)
    }

    /// Stop (with `end` if it was running) and start again in reverse
    pub fn restart_reverse(&self) -> Result<(), UsageError> {
        self.restart_in(self.inner.settings.start_direction.flip())
    }

    // Stop and start under one lock so no other start can slip in between
    fn restart_in(&self, direction: Direction) -> Result<(), UsageError> {
        let (halted, result) = {
            let mut timing = self.inner.timing.lock();
            let halted = self.halt_run(&mut timing, true);
            (halted, self.begin_run(&mut timing, direction))
        };
        if halted {
            self.finish_halt(true);
        }
        result
    }

    /// Block until the animator has stopped and its `end` was delivered
    ///
    /// Returns false on timeout. Must not be called from the pulse context.
    pub fn wait_until_stopped(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut timing = self.inner.timing.lock();
        loop {
            if timing.state == AnimatorState::Stopped && timing.pending_ends == 0 {
                return true;
            }
            if self.inner.stopped.wait_until(&mut timing, deadline).timed_out() {
                return timing.state == AnimatorState::Stopped && timing.pending_ends == 0;
            }
        }
    }

    // ========================================================================
    // Targets
    // ========================================================================

    pub fn add_target(&self, target: Arc<dyn TimingTarget>) -> TargetId {
        self.inner.targets.add(target)
    }

    pub fn remove_target(&self, id: TargetId) -> bool {
        self.inner.targets.remove(id)
    }

    pub fn remove_all_targets(&self) {
        self.inner.targets.clear();
    }

    pub fn targets_len(&self) -> usize {
        self.inner.targets.len()
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn state(&self) -> AnimatorState {
        self.inner.timing.lock().state
    }

    pub fn is_running(&self) -> bool {
        self.state() != AnimatorState::Stopped
    }

    pub fn is_paused(&self) -> bool {
        self.state() == AnimatorState::Paused
    }

    pub fn direction(&self) -> Direction {
        self.inner.timing.lock().direction
    }

    pub fn cycle_index(&self) -> u64 {
        self.inner.timing.lock().cycle
    }

    pub fn duration(&self) -> Duration {
        self.inner.settings.duration
    }

    pub fn start_delay(&self) -> Duration {
        self.inner.settings.start_delay
    }

    pub fn repeat_count(&self) -> RepeatCount {
        self.inner.settings.repeat_count
    }

    pub fn repeat_behavior(&self) -> RepeatBehavior {
        self.inner.settings.repeat_behavior
    }

    pub fn end_behavior(&self) -> EndBehavior {
        self.inner.settings.end_behavior
    }

    pub fn start_direction(&self) -> Direction {
        self.inner.settings.start_direction
    }

    pub fn interpolator(&self) -> &SharedInterpolator {
        &self.inner.settings.interpolator
    }

    pub fn debug_name(&self) -> &str {
        &self.inner.settings.debug_name
    }

    pub fn pulse_source(&self) -> &Arc<dyn PulseSource> {
        &self.inner.source
    }

    /// Start delay plus every cycle; None when repeating forever
    pub fn total_duration(&self) -> Option<Duration> {
        let settings = &self.inner.settings;
        match settings.repeat_count {
            RepeatCount::Infinite => None,
            RepeatCount::Times(n) => u32::try_from(n)
                .ok()
                .and_then(|n| settings.duration.checked_mul(n))
                .and_then(|total| total.checked_add(settings.start_delay)),
        }
    }

    /// Whether both handles control the same animation
    pub fn ptr_eq(&self, other: &Animator) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // ========================================================================
    // Pulse handling
    // ========================================================================

    fn handle_pulse(&self, generation: u64, now: Duration) -> Result<(), PulseError> {
        let settings = &self.inner.settings;
        let mut notifications: SmallVec<[Notification; 4]> = SmallVec::new();
        let mut finished_listener = None;
        let finished;

        {
            let mut timing = self.inner.timing.lock();
            if timing.state != AnimatorState::Running || timing.generation != generation {
                return Ok(());
            }

            let elapsed = nanos(now) - timing.start_ref;
            let delay = nanos(settings.start_delay);
            if elapsed < delay {
                return Ok(());
            }

            let duration = nanos(settings.duration);
            let run = elapsed - delay;
            let cycle = u64::try_from(run / duration).unwrap_or(u64::MAX);
            let in_cycle = run % duration;

            if !timing.begun {
                timing.begun = true;
                notifications.push(Notification::Begin);
            }

            let last_cycle = match settings.repeat_count {
                RepeatCount::Times(count) => cycle.min(count.saturating_sub(1)),
                RepeatCount::Infinite => cycle,
            };
            let crossed = last_cycle.saturating_sub(timing.cycle);
            if crossed > 0 {
                if settings.repeat_behavior == RepeatBehavior::Reverse && crossed % 2 == 1 {
                    timing.direction = timing.direction.flip();
                }
                if crossed > MAX_REPEATS_PER_PULSE {
                    tracing::warn!(
                        animator = %settings.debug_name,
                        "{} cycle boundaries crossed in one pulse, notifying {}",
                        crossed,
                        MAX_REPEATS_PER_PULSE
                    );
                }
                for _ in 0..crossed.min(MAX_REPEATS_PER_PULSE) {
                    notifications.push(Notification::Repeat);
                }
                timing.cycle = last_cycle;
            }

            let direction = timing.direction;
            finished = matches!(settings.repeat_count, RepeatCount::Times(count) if cycle >= count);
            if finished {
                let fraction = match settings.end_behavior {
                    EndBehavior::Hold => direction.terminal_fraction(),
                    EndBehavior::Reset => timing.run_direction.initial_fraction(),
                };
                notifications.push(Notification::Timing {
                    fraction: settings.interpolator.interpolate(fraction),
                    direction,
                });
                notifications.push(Notification::End);

                timing.state = AnimatorState::Stopped;
                timing.pending_ends += 1;
                finished_listener = timing.listener.take();
            } else {
                let raw = in_cycle as f64 / duration as f64;
                let fraction = match direction {
                    Direction::Forward => raw,
                    Direction::Backward => 1.0 - raw,
                };
                notifications.push(Notification::Timing {
                    fraction: settings
                        .interpolator
                        .interpolate(clamp_fraction(fraction)),
                    direction,
                });
            }

            tracing::trace!(
                animator = %settings.debug_name,
                cycle,
                notifications = notifications.len(),
                "pulse"
            );
        }

        if let Some(id) = finished_listener {
            self.inner.source.remove_tick_listener(id);
        }

        let result = self.inner.targets.notify(self, &notifications);

        if finished {
            self.settle_end();
            tracing::debug!(animator = %settings.debug_name, "finished");
        }
        result
    }

    /// The source was disposed under this run; no notification can follow
    fn source_detached(&self, generation: u64) {
        {
            let mut timing = self.inner.timing.lock();
            if timing.state == AnimatorState::Stopped || timing.generation != generation {
                return;
            }
            timing.state = AnimatorState::Stopped;
            timing.listener = None;
        }
        self.inner.stopped.notify_all();
        tracing::debug!(animator = %self.debug_name(), "stopped by source disposal");
    }

    fn settle_end(&self) {
        {
            let mut timing = self.inner.timing.lock();
            timing.pending_ends = timing.pending_ends.saturating_sub(1);
        }
        self.inner.stopped.notify_all();
    }
}

impl fmt::Debug for Animator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let timing = self.inner.timing.lock();
        f.debug_struct("Animator")
            .field("name", &self.inner.settings.debug_name)
            .field("state", &timing.state)
            .field("direction", &timing.direction)
            .field("cycle", &timing.cycle)
            .field("duration", &self.inner.settings.duration)
            .field("targets", &self.inner.targets.len())
            .finish()
    }
}

/// Tick listener registered for one run of an animator
struct PulseHook {
    animator: Animator,
    generation: u64,
}

impl TickListener for PulseHook {
    fn tick(&self, now: Duration) -> Result<(), PulseError> {
        self.animator.handle_pulse(self.generation, now)
    }

    fn detached(&self) {
        self.animator.source_detached(self.generation);
    }
}

/// Settles one pending `end` when dropped
struct PendingEnd(Animator);

impl Drop for PendingEnd {
    fn drop(&mut self) {
        self.0.settle_end();
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`Animator`]
///
/// Defaults: 1 second, one cycle, reverse on repeat, hold at end, forward,
/// linear interpolation, no start delay.
pub struct AnimatorBuilder {
    source: Arc<dyn PulseSource>,
    duration: Duration,
    start_delay: Duration,
    repeat_count: RepeatCount,
    repeat_behavior: RepeatBehavior,
    end_behavior: EndBehavior,
    start_direction: Direction,
    interpolator: SharedInterpolator,
    disable_degenerate_durations: bool,
    targets: Vec<Arc<dyn TimingTarget>>,
    debug_name: Option<String>,
}

impl AnimatorBuilder {
    pub fn new(source: Arc<dyn PulseSource>) -> Self {
        Self {
            source,
            duration: Duration::from_secs(1),
            start_delay: Duration::ZERO,
            repeat_count: RepeatCount::default(),
            repeat_behavior: RepeatBehavior::default(),
            end_behavior: EndBehavior::default(),
            start_direction: Direction::default(),
            interpolator: linear(),
            disable_degenerate_durations: false,
            targets: Vec::new(),
            debug_name: None,
        }
    }

    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = delay;
        self
    }

    pub fn repeat_count(mut self, count: RepeatCount) -> Self {
        self.repeat_count = count;
        self
    }

    pub fn repeat_behavior(mut self, behavior: RepeatBehavior) -> Self {
        self.repeat_behavior = behavior;
        self
    }

    pub fn end_behavior(mut self, behavior: EndBehavior) -> Self {
        self.end_behavior = behavior;
        self
    }

    pub fn start_direction(mut self, direction: Direction) -> Self {
        self.start_direction = direction;
        self
    }

    pub fn interpolator(mut self, interpolator: SharedInterpolator) -> Self {
        self.interpolator = interpolator;
        self
    }

    /// Reject durations shorter than one pulse period
    pub fn disable_degenerate_durations(mut self, disable: bool) -> Self {
        self.disable_degenerate_durations = disable;
        self
    }

    pub fn pulse_source(mut self, source: Arc<dyn PulseSource>) -> Self {
        self.source = source;
        self
    }

    pub fn target(mut self, target: Arc<dyn TimingTarget>) -> Self {
        self.targets.push(target);
        self
    }

    pub fn targets(mut self, targets: impl IntoIterator<Item = Arc<dyn TimingTarget>>) -> Self {
        self.targets.extend(targets);
        self
    }

    pub fn debug_name(mut self, name: impl Into<String>) -> Self {
        self.debug_name = Some(name.into());
        self
    }

    pub fn build(self) -> Result<Animator, ConfigError> {
        if self.duration.is_zero() {
            return Err(ConfigError::InvalidDuration(
                "animation duration must be positive".to_string(),
            ));
        }
        let period = self.source.period();
        if self.disable_degenerate_durations && self.duration < period {
            return Err(ConfigError::InvalidDuration(format!(
                "duration {:?} is shorter than the pulse period {:?}",
                self.duration, period
            )));
        }
        if self.repeat_count == RepeatCount::Times(0) {
            return Err(ConfigError::InvalidRepeatCount);
        }

        let debug_name = self.debug_name.unwrap_or_else(|| {
            format!("animator-{}", NEXT_ANIMATOR_ID.fetch_add(1, Ordering::Relaxed))
        });

        let targets = TargetList::new();
        for target in self.targets {
            targets.add(target);
        }

        Ok(Animator {
            inner: Arc::new(AnimatorInner {
                settings: Settings {
                    duration: self.duration,
                    start_delay: self.start_delay,
                    repeat_count: self.repeat_count,
                    repeat_behavior: self.repeat_behavior,
                    end_behavior: self.end_behavior,
                    start_direction: self.start_direction,
                    interpolator: self.interpolator,
                    debug_name,
                },
                source: self.source,
                timing: Mutex::new(Timing {
                    state: AnimatorState::Stopped,
                    direction: self.start_direction,
                    run_direction: self.start_direction,
                    start_ref: 0,
                    paused_at: Duration::ZERO,
                    cycle: 0,
                    begun: false,
                    generation: 0,
                    listener: None,
                    pending_ends: 0,
                }),
                stopped: Condvar::new(),
                targets,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pulse::{ManualPulseSource, ThreadPulseSource};
    use crate::target::TimingTarget;
    use crate::test_support::{Event, Recorder};
    use tempo_core::interpolator::DiscreteInterpolator;

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    fn source() -> Arc<ManualPulseSource> {
        let source = Arc::new(ManualPulseSource::new(ms(10)).unwrap());
        source.init().unwrap();
        source
    }

    fn animator_for(source: &Arc<ManualPulseSource>, recorder: &Arc<Recorder>) -> AnimatorBuilder {
        Animator::builder(source.clone())
            .duration(ms(100))
            .target(recorder.clone())
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    #[test]
    fn test_builder_validation() {
        let source = source();
        assert!(matches!(
            Animator::builder(source.clone()).duration(Duration::ZERO).build(),
            Err(ConfigError::InvalidDuration(_))
        ));
        assert!(matches!(
            Animator::builder(source.clone())
                .repeat_count(RepeatCount::Times(0))
                .build(),
            Err(ConfigError::InvalidRepeatCount)
        ));
        assert!(Animator::builder(source.clone()).duration(ms(5)).build().is_ok());
        assert!(matches!(
            Animator::builder(source.clone())
                .duration(ms(5))
                .disable_degenerate_durations(true)
                .build(),
            Err(ConfigError::InvalidDuration(_))
        ));
    }

    #[test]
    fn test_builder_defaults() {
        let animator = Animator::builder(source()).build().unwrap();
        assert_eq!(animator.duration(), Duration::from_secs(1));
        assert_eq!(animator.repeat_count(), RepeatCount::Times(1));
        assert_eq!(animator.repeat_behavior(), RepeatBehavior::Reverse);
        assert_eq!(animator.end_behavior(), EndBehavior::Hold);
        assert_eq!(animator.start_direction(), Direction::Forward);
        assert_eq!(animator.state(), AnimatorState::Stopped);
        assert!(animator.debug_name().starts_with("animator-"));
        assert_eq!(animator.total_duration(), Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_begin_fires_on_first_pulse() {
        let source = source();
        let recorder = Recorder::new();
        let animator = animator_for(&source, &recorder).build().unwrap();

        animator.start().unwrap();
        assert!(recorder.events().is_empty());
        assert_eq!(animator.state(), AnimatorState::Running);

        assert!(source.advance(ms(10)).is_empty());
        let events = recorder.events();
        assert_eq!(events[0], Event::Begin);
        assert_eq!(events.len(), 2);
        let (fraction, direction) = recorder.last_timing().unwrap();
        assert_close(fraction, 0.1);
        assert_eq!(direction, Direction::Forward);
    }

    #[test]
    fn test_start_twice_is_rejected() {
        let source = source();
        let animator = Animator::builder(source.clone()).build().unwrap();
        animator.start().unwrap();
        assert_eq!(
            animator.start(),
            Err(UsageError::AlreadyRunning(AnimatorState::Running))
        );
        animator.pause().unwrap();
        assert_eq!(
            animator.start_reverse(),
            Err(UsageError::AlreadyRunning(AnimatorState::Paused))
        );
    }

    #[test]
    fn test_invalid_transitions() {
        let source = source();
        let animator = Animator::builder(source.clone()).build().unwrap();
        assert_eq!(
            animator.pause(),
            Err(UsageError::NotRunning(AnimatorState::Stopped))
        );
        assert_eq!(
            animator.reverse_now(),
            Err(UsageError::NotRunning(AnimatorState::Stopped))
        );
        animator.start().unwrap();
        assert_eq!(
            animator.resume(),
            Err(UsageError::NotPaused(AnimatorState::Running))
        );
        assert_eq!(animator.state(), AnimatorState::Running);
    }

    #[test]
    fn test_start_on_disposed_source() {
        let source = source();
        let animator = Animator::builder(source.clone()).build().unwrap();
        source.dispose();
        assert_eq!(animator.start(), Err(UsageError::SourceDisposed));
        assert_eq!(animator.state(), AnimatorState::Stopped);
    }

    #[test]
    fn test_dispose_stops_running_animators() {
        let source = source();
        let recorder = Recorder::new();
        let running = animator_for(&source, &recorder).build().unwrap();
        let paused = animator_for(&source, &recorder).build().unwrap();

        running.start().unwrap();
        paused.start().unwrap();
        source.advance(ms(20));
        paused.pause().unwrap();

        source.dispose();
        assert_eq!(running.state(), AnimatorState::Stopped);
        assert_eq!(paused.state(), AnimatorState::Stopped);
        assert!(running.wait_until_stopped(Duration::ZERO));
        assert!(!running.stop());
        assert!(!paused.cancel());
        assert_eq!(recorder.count(&Event::End), 0);
        assert_eq!(running.start(), Err(UsageError::SourceDisposed));
    }

    #[test]
    fn test_repeat_count_two() {
        let source = source();
        let recorder = Recorder::new();
        let animator = animator_for(&source, &recorder)
            .repeat_count(RepeatCount::Times(2))
            .build()
            .unwrap();

        animator.start().unwrap();
        source.advance_periods(25);

        assert_eq!(
            recorder.lifecycle(),
            vec![Event::Begin, Event::Repeat, Event::End]
        );
        assert_eq!(animator.state(), AnimatorState::Stopped);
        assert_eq!(source.tick_listener_count(), 0);

        // Nothing after the natural end
        let count = recorder.events().len();
        source.advance_periods(5);
        assert_eq!(recorder.events().len(), count);
    }

    #[test]
    fn test_end_fraction_hold_and_reset() {
        let source = source();

        let hold = Recorder::new();
        let animator = animator_for(&source, &hold)
            .repeat_behavior(RepeatBehavior::Restart)
            .build()
            .unwrap();
        animator.start().unwrap();
        source.advance(ms(150));
        assert_eq!(hold.last_timing(), Some((1.0, Direction::Forward)));

        let reset = Recorder::new();
        let animator = animator_for(&source, &reset)
            .end_behavior(EndBehavior::Reset)
            .build()
            .unwrap();
        animator.start_reverse().unwrap();
        source.advance(ms(150));
        assert_eq!(reset.last_timing(), Some((1.0, Direction::Backward)));
        assert_eq!(reset.lifecycle(), vec![Event::Begin, Event::End]);
    }

    #[test]
    fn test_reverse_behavior_alternates_direction() {
        let source = source();
        let recorder = Recorder::new();
        let animator = animator_for(&source, &recorder)
            .repeat_count(RepeatCount::Infinite)
            .repeat_behavior(RepeatBehavior::Reverse)
            .build()
            .unwrap();
        assert_eq!(animator.total_duration(), None);

        animator.start().unwrap();
        let mut directions = Vec::new();
        for _ in 0..4 {
            source.advance(ms(100));
            directions.push(recorder.last_timing().unwrap().1);
        }
        source.advance(ms(50));
        let (fraction, direction) = recorder.last_timing().unwrap();

        assert_eq!(
            directions,
            vec![
                Direction::Backward,
                Direction::Forward,
                Direction::Backward,
                Direction::Forward
            ]
        );
        assert_eq!(direction, Direction::Forward);
        assert_close(fraction, 0.5);
        assert_eq!(animator.cycle_index(), 4);
        assert_eq!(recorder.count(&Event::Repeat), 4);
    }

    #[test]
    fn test_restart_behavior_keeps_direction() {
        let source = source();
        let recorder = Recorder::new();
        let animator = animator_for(&source, &recorder)
            .repeat_count(RepeatCount::Times(3))
            .repeat_behavior(RepeatBehavior::Restart)
            .build()
            .unwrap();

        animator.start().unwrap();
        source.advance(ms(120));
        let (fraction, direction) = recorder.last_timing().unwrap();
        assert_close(fraction, 0.2);
        assert_eq!(direction, Direction::Forward);
    }

    #[test]
    fn test_start_delay() {
        let source = source();
        let recorder = Recorder::new();
        let animator = animator_for(&source, &recorder)
            .start_delay(ms(50))
            .build()
            .unwrap();

        animator.start().unwrap();
        source.advance(ms(40));
        assert!(recorder.events().is_empty());

        source.advance(ms(20));
        assert_eq!(recorder.lifecycle(), vec![Event::Begin]);
        assert_close(recorder.last_timing().unwrap().0, 0.1);
        assert_eq!(animator.total_duration(), Some(ms(150)));
    }

    #[test]
    fn test_pause_resume_continuity() {
        let source = source();
        let recorder = Recorder::new();
        let animator = animator_for(&source, &recorder).build().unwrap();

        animator.start().unwrap();
        source.advance(ms(30));
        let before = recorder.last_timing().unwrap().0;
        assert_close(before, 0.3);

        animator.pause().unwrap();
        assert!(animator.is_paused());
        let count = recorder.events().len();
        source.advance(ms(500));
        assert_eq!(recorder.events().len(), count);

        animator.resume().unwrap();
        source.pulse();
        assert_close(recorder.last_timing().unwrap().0, before);

        source.advance(ms(10));
        assert_close(recorder.last_timing().unwrap().0, 0.4);
    }

    #[test]
    fn test_stop_twice_delivers_one_end() {
        let source = source();
        let recorder = Recorder::new();
        let animator = animator_for(&source, &recorder).build().unwrap();

        animator.start().unwrap();
        source.advance(ms(10));
        assert!(animator.stop());
        assert!(!animator.stop());
        assert_eq!(animator.state(), AnimatorState::Stopped);

        // End is queued onto the pulse context
        assert_eq!(recorder.count(&Event::End), 0);
        source.run_pending();
        source.advance_periods(3);
        assert_eq!(recorder.lifecycle(), vec![Event::Begin, Event::End]);
    }

    #[test]
    fn test_cancel_skips_end() {
        let source = source();
        let recorder = Recorder::new();
        let animator = animator_for(&source, &recorder).build().unwrap();

        animator.start().unwrap();
        source.advance(ms(10));
        assert!(animator.cancel());
        assert!(!animator.cancel());
        source.advance_periods(3);
        assert_eq!(recorder.lifecycle(), vec![Event::Begin]);
        assert!(animator.wait_until_stopped(ms(1)));
    }

    #[test]
    fn test_reverse_now_continues_from_current_fraction() {
        let source = source();
        let recorder = Recorder::new();
        let animator = animator_for(&source, &recorder)
            .repeat_behavior(RepeatBehavior::Restart)
            .build()
            .unwrap();

        animator.start().unwrap();
        source.advance(ms(30));
        animator.reverse_now().unwrap();
        assert_eq!(animator.direction(), Direction::Backward);

        source.pulse();
        let events = recorder.events();
        assert_eq!(events[events.len() - 2], Event::Reverse);
        let (fraction, direction) = recorder.last_timing().unwrap();
        assert_close(fraction, 0.3);
        assert_eq!(direction, Direction::Backward);

        source.advance(ms(10));
        assert_close(recorder.last_timing().unwrap().0, 0.2);

        // Runs down to 0 and ends there
        source.advance(ms(100));
        assert_eq!(recorder.last_timing(), Some((0.0, Direction::Backward)));
        assert_eq!(animator.state(), AnimatorState::Stopped);
    }

    #[test]
    fn test_restart_from_running() {
        let source = source();
        let recorder = Recorder::new();
        let animator = animator_for(&source, &recorder).build().unwrap();

        animator.start().unwrap();
        source.advance(ms(50));
        animator.restart().unwrap();
        source.advance(ms(10));

        assert_eq!(
            recorder.lifecycle(),
            vec![Event::Begin, Event::End, Event::Begin]
        );
        assert_close(recorder.last_timing().unwrap().0, 0.1);
        assert_eq!(source.tick_listener_count(), 1);
    }

    #[test]
    fn test_concurrent_restarts_never_collide() {
        let source = source();
        let animator = Animator::builder(source.clone()).build().unwrap();
        animator.start().unwrap();

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let animator = animator.clone();
                std::thread::spawn(move || {
                    for _ in 0..200 {
                        animator.restart().unwrap();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(animator.state(), AnimatorState::Running);
        assert_eq!(source.tick_listener_count(), 1);
    }

    #[test]
    fn test_wait_until_stopped_waits_for_end_delivery() {
        let source = source();
        let animator = Animator::builder(source.clone()).build().unwrap();

        animator.start().unwrap();
        assert!(!animator.wait_until_stopped(ms(1)));

        animator.stop();
        assert!(!animator.wait_until_stopped(ms(1)));
        source.run_pending();
        assert!(animator.wait_until_stopped(ms(1)));
    }

    #[test]
    fn test_dropped_end_task_settles_waiters() {
        let source = source();
        let animator = Animator::builder(source.clone()).build().unwrap();

        animator.start().unwrap();
        animator.stop();
        source.dispose();
        assert!(animator.wait_until_stopped(ms(1)));
    }

    #[test]
    fn test_failing_target_reported_and_others_notified() {
        struct Failing;

        impl TimingTarget for Failing {
            fn timing_event(
                &self,
                _source: &Animator,
                _fraction: f64,
                _direction: Direction,
            ) -> crate::error::TargetResult {
                Err("cannot apply".into())
            }
        }

        let source = source();
        let recorder = Recorder::new();
        let animator = Animator::builder(source.clone())
            .duration(ms(100))
            .target(Arc::new(Failing))
            .target(recorder.clone())
            .build()
            .unwrap();

        animator.start().unwrap();
        let errors = source.advance(ms(10));

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].notification_errors().len(), 1);
        assert_eq!(recorder.lifecycle(), vec![Event::Begin]);
        assert_close(recorder.last_timing().unwrap().0, 0.1);
        assert_eq!(animator.state(), AnimatorState::Running);
    }

    #[test]
    fn test_animator_interpolator_applied() {
        let source = source();
        let recorder = Recorder::new();
        let animator = animator_for(&source, &recorder)
            .interpolator(Arc::new(DiscreteInterpolator))
            .build()
            .unwrap();

        animator.start().unwrap();
        source.advance(ms(90));
        assert_eq!(recorder.last_timing(), Some((0.0, Direction::Forward)));
        source.advance(ms(20));
        assert_eq!(recorder.last_timing(), Some((1.0, Direction::Forward)));
    }

    #[test]
    fn test_threaded_run_end_to_end() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("tempo_animation=debug")
            .with_test_writer()
            .try_init();

        let source = Arc::new(ThreadPulseSource::new(ms(2)).unwrap());
        source.init().unwrap();
        let recorder = Recorder::new();
        let animator = Animator::builder(source.clone())
            .duration(ms(40))
            .repeat_count(RepeatCount::Times(2))
            .target(recorder.clone())
            .debug_name("threaded")
            .build()
            .unwrap();

        animator.start().unwrap();
        assert!(animator.wait_until_stopped(Duration::from_secs(10)));

        assert_eq!(
            recorder.lifecycle(),
            vec![Event::Begin, Event::Repeat, Event::End]
        );
        assert_eq!(recorder.last_timing(), Some((0.0, Direction::Backward)));
        source.dispose();
    }
}
