//! Pulse sources
//!
//! A pulse source emits evenly spaced pulses from one execution context and
//! lets other threads queue work onto that same context. Animators subscribe
//! as tick listeners and route every target notification through
//! [`PulseSource::run_in_context`], so listeners are always called serially.
//!
//! Two backends are provided:
//!
//! - [`ThreadPulseSource`]: a dedicated background thread pulsing at a fixed rate
//! - [`ManualPulseSource`]: pulses only when the caller asks, over a [`ManualClock`]
//!
//! # Example
//!
//! ```ignore
//! let source = Arc::new(ThreadPulseSource::new(Duration::from_millis(15))?);
//! source.init()?;          // starts the pulse thread
//!
//! let id = source.add_tick_listener(listener);
//! source.remove_tick_listener(id);
//!
//! source.dispose();        // stops the pulse thread
//! ```

use crate::clock::{Clock, ManualClock, SystemClock};
use crate::error::{PulseError, UsageError};
use parking_lot::{Condvar, Mutex, RwLock};
use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;
use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tempo_core::ConfigError;

new_key_type! {
    /// Handle to a registered tick listener
    pub struct TickListenerId;
}

/// Receives raw pulses
pub trait TickListener: Send + Sync {
    /// Called once per pulse with the source's current time
    fn tick(&self, now: Duration) -> Result<(), PulseError>;

    /// Called once if the source is disposed while this listener is registered
    fn detached(&self) {}
}

impl<F> TickListener for F
where
    F: Fn(Duration) -> Result<(), PulseError> + Send + Sync,
{
    fn tick(&self, now: Duration) -> Result<(), PulseError> {
        self(now)
    }
}

/// Wrap a closure as a shared tick listener
pub fn tick_listener<F>(f: F) -> Arc<dyn TickListener>
where
    F: Fn(Duration) -> Result<(), PulseError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Unit of work queued onto the pulse-delivery context
pub type ContextTask = Box<dyn FnOnce() -> Result<(), PulseError> + Send>;

/// Error channel for failures raised on the pulse-delivery context
pub type ErrorHandler = Arc<dyn Fn(&PulseError) + Send + Sync>;

/// Lifecycle of a pulse source
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourcePhase {
    /// Constructed, `init` not called yet
    Created,
    /// Emitting pulses
    Running,
    /// Disposed; terminal
    Disposed,
}

/// A periodic clock that delivers pulses on one execution context
pub trait PulseSource: Send + Sync {
    /// Start emitting pulses
    fn init(&self) -> Result<(), UsageError>;

    /// Stop emitting pulses; idempotent
    ///
    /// No new pulse starts after this returns. A pulse already in flight
    /// still reaches every listener in its snapshot. Queued context tasks are
    /// dropped, and every tick listener is unsubscribed and told through
    /// [`TickListener::detached`] once no delivery is running.
    fn dispose(&self);

    /// Time between pulses
    fn period(&self) -> Duration;

    /// Current time of this source's clock
    fn now(&self) -> Duration;

    /// Shared listener/task bookkeeping
    fn dispatcher(&self) -> &PulseDispatcher;

    /// Hook for backends that need to be woken when work is queued
    fn wake(&self) {}

    fn phase(&self) -> SourcePhase {
        self.dispatcher().phase()
    }

    fn is_running(&self) -> bool {
        self.phase() == SourcePhase::Running
    }

    fn add_tick_listener(&self, listener: Arc<dyn TickListener>) -> TickListenerId {
        self.dispatcher().add_listener(listener)
    }

    fn remove_tick_listener(&self, id: TickListenerId) -> bool {
        self.dispatcher().remove_listener(id)
    }

    fn tick_listener_count(&self) -> usize {
        self.dispatcher().listener_count()
    }

    /// Queue `task` to run on the pulse-delivery context before the next pulse
    fn run_in_context(&self, task: ContextTask) -> Result<(), UsageError> {
        self.dispatcher().enqueue(task)?;
        self.wake();
        Ok(())
    }

    /// Route pulse-context failures to `handler` instead of the log
    fn set_error_handler(&self, handler: ErrorHandler) {
        self.dispatcher().set_error_handler(handler);
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Listener registry, task queue and error channel shared by all backends
///
/// Delivery snapshots the listener list, then re-checks membership before each
/// call: a listener removed mid-pulse is skipped, one added mid-pulse waits for
/// the next pulse. No lock is held while listeners or tasks run.
///
/// Disposal never empties the listener list under a running delivery; the
/// last delivery to finish releases the listeners instead.
pub struct PulseDispatcher {
    listeners: RwLock<SlotMap<TickListenerId, Arc<dyn TickListener>>>,
    tasks: Mutex<VecDeque<ContextTask>>,
    /// Signalled when tasks are queued or the source is disposed
    wakeup: Condvar,
    phase: Mutex<SourcePhase>,
    /// Number of deliveries currently running
    delivering: Mutex<usize>,
    error_handler: RwLock<Option<ErrorHandler>>,
}

impl PulseDispatcher {
    /// Upper bound on task-drain rounds per call, so a task that keeps
    /// re-queueing itself cannot starve pulses
    const MAX_TASK_ROUNDS: usize = 64;

    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(SlotMap::with_key()),
            tasks: Mutex::new(VecDeque::new()),
            wakeup: Condvar::new(),
            phase: Mutex::new(SourcePhase::Created),
            delivering: Mutex::new(0),
            error_handler: RwLock::new(None),
        }
    }

    pub fn phase(&self) -> SourcePhase {
        *self.phase.lock()
    }

    /// Move from `Created` to `Running`
    pub fn begin(&self) -> Result<(), UsageError> {
        let mut phase = self.phase.lock();
        match *phase {
            SourcePhase::Created => {
                *phase = SourcePhase::Running;
                Ok(())
            }
            SourcePhase::Running => Err(UsageError::AlreadyInitialized),
            SourcePhase::Disposed => Err(UsageError::SourceDisposed),
        }
    }

    /// Move to `Disposed`, dropping queued tasks and releasing all listeners
    ///
    /// If a delivery is running, its listeners are released when it finishes.
    /// Returns false if already disposed.
    pub fn shutdown(&self) -> bool {
        {
            let mut phase = self.phase.lock();
            if *phase == SourcePhase::Disposed {
                return false;
            }
            *phase = SourcePhase::Disposed;
        }

        let dropped = {
            let mut tasks = self.tasks.lock();
            let dropped = tasks.len();
            tasks.clear();
            self.wakeup.notify_all();
            dropped
        };
        if dropped > 0 {
            tracing::warn!("PulseSource disposed with {} queued task(s) dropped", dropped);
        }

        let released = {
            let delivering = self.delivering.lock();
            if *delivering == 0 {
                self.take_listeners()
            } else {
                Vec::new()
            }
        };
        Self::detach_all(released);
        true
    }

    // Listeners may hold the source alive; callers drop them outside all locks
    fn take_listeners(&self) -> Vec<Arc<dyn TickListener>> {
        self.listeners
            .write()
            .drain()
            .map(|(_, listener)| listener)
            .collect()
    }

    fn detach_all(listeners: Vec<Arc<dyn TickListener>>) {
        if !listeners.is_empty() {
            tracing::debug!("Releasing {} tick listener(s) on dispose", listeners.len());
        }
        for listener in listeners {
            listener.detached();
        }
    }

    pub fn add_listener(&self, listener: Arc<dyn TickListener>) -> TickListenerId {
        self.listeners.write().insert(listener)
    }

    pub fn remove_listener(&self, id: TickListenerId) -> bool {
        self.listeners.write().remove(id).is_some()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn enqueue(&self, task: ContextTask) -> Result<(), UsageError> {
        let mut tasks = self.tasks.lock();
        if self.phase() == SourcePhase::Disposed {
            return Err(UsageError::SourceDisposed);
        }
        tasks.push_back(task);
        self.wakeup.notify_one();
        Ok(())
    }

    pub fn pending_tasks(&self) -> usize {
        self.tasks.lock().len()
    }

    pub fn set_error_handler(&self, handler: ErrorHandler) {
        *self.error_handler.write() = Some(handler);
    }

    /// Run queued tasks, including tasks they queue, collecting failures
    pub fn run_pending(&self) -> Vec<PulseError> {
        let mut errors = Vec::new();
        for _ in 0..Self::MAX_TASK_ROUNDS {
            let batch = std::mem::take(&mut *self.tasks.lock());
            if batch.is_empty() {
                break;
            }
            for task in batch {
                if let Err(err) = task() {
                    errors.push(err);
                }
            }
        }
        errors
    }

    /// Deliver one pulse to every listener, collecting failures
    ///
    /// Does nothing unless the source is running.
    pub fn deliver(&self, now: Duration) -> Vec<PulseError> {
        {
            let mut delivering = self.delivering.lock();
            if self.phase() != SourcePhase::Running {
                return Vec::new();
            }
            *delivering += 1;
        }
        let _delivery = Delivery(self);

        let snapshot: SmallVec<[(TickListenerId, Arc<dyn TickListener>); 8]> = self
            .listeners
            .read()
            .iter()
            .map(|(id, listener)| (id, Arc::clone(listener)))
            .collect();

        let mut errors = Vec::new();
        for (id, listener) in snapshot {
            if !self.listeners.read().contains_key(id) {
                continue;
            }
            if let Err(err) = listener.tick(now) {
                errors.push(err);
            }
        }
        errors
    }

    /// Hand failures to the error handler, or log them
    pub fn report(&self, errors: Vec<PulseError>) {
        if errors.is_empty() {
            return;
        }
        let handler = self.error_handler.read().clone();
        for err in &errors {
            match &handler {
                Some(handler) => handler(err),
                None => {
                    tracing::error!("Unhandled pulse error: {}", err);
                    for cause in err.notification_errors() {
                        tracing::error!("  {}", cause);
                    }
                }
            }
        }
    }

    /// Block until tasks are queued, `deadline` passes, or the source is disposed
    ///
    /// Returns false once disposed.
    fn wait_for_work(&self, deadline: Instant) -> bool {
        let mut tasks = self.tasks.lock();
        loop {
            if self.phase() == SourcePhase::Disposed {
                return false;
            }
            if !tasks.is_empty() || Instant::now() >= deadline {
                return true;
            }
            self.wakeup.wait_until(&mut tasks, deadline);
        }
    }
}

/// Marks one running delivery; the last one out after disposal releases
/// the listeners
struct Delivery<'a>(&'a PulseDispatcher);

impl Drop for Delivery<'_> {
    fn drop(&mut self) {
        let dispatcher = self.0;
        let released = {
            let mut delivering = dispatcher.delivering.lock();
            *delivering -= 1;
            if *delivering == 0 && dispatcher.phase() == SourcePhase::Disposed {
                dispatcher.take_listeners()
            } else {
                Vec::new()
            }
        };
        PulseDispatcher::detach_all(released);
    }
}

impl Default for PulseDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_period(period: Duration) -> Result<Duration, ConfigError> {
    if period.is_zero() {
        return Err(ConfigError::InvalidDuration(
            "pulse period must be positive".to_string(),
        ));
    }
    Ok(period)
}

// ============================================================================
// Thread-backed source
// ============================================================================

struct ThreadShared {
    dispatcher: PulseDispatcher,
    clock: SystemClock,
    period: Duration,
}

/// Pulse source running on its own background thread
///
/// Pulses are scheduled at a fixed rate from `init`; if a pulse overruns, the
/// missed slots are skipped rather than delivered in a burst. Queued tasks
/// wake the thread immediately and run before the next pulse.
pub struct ThreadPulseSource {
    shared: Arc<ThreadShared>,
    thread_name: String,
    thread_handle: Mutex<Option<JoinHandle<()>>>,
}

impl ThreadPulseSource {
    pub const DEFAULT_THREAD_NAME: &'static str = "tempo-pulse";

    pub fn new(period: Duration) -> Result<Self, ConfigError> {
        Self::with_name(period, Self::DEFAULT_THREAD_NAME)
    }

    /// Create a source whose pulse thread carries `name`
    pub fn with_name(period: Duration, name: impl Into<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            shared: Arc::new(ThreadShared {
                dispatcher: PulseDispatcher::new(),
                clock: SystemClock::new(),
                period: validate_period(period)?,
            }),
            thread_name: name.into(),
            thread_handle: Mutex::new(None),
        })
    }

    pub fn thread_name(&self) -> &str {
        &self.thread_name
    }

    fn run_loop(shared: Arc<ThreadShared>) {
        let period = shared.period;
        let mut next_pulse = Instant::now();
        let mut pulses: u64 = 0;

        while shared.dispatcher.wait_for_work(next_pulse) {
            let errors = shared.dispatcher.run_pending();
            shared.dispatcher.report(errors);

            let now = Instant::now();
            if now < next_pulse {
                continue;
            }

            let errors = shared.dispatcher.deliver(shared.clock.now());
            shared.dispatcher.report(errors);
            pulses += 1;

            next_pulse += period;
            let after = Instant::now();
            if next_pulse <= after {
                // Overran at least one slot; resume the cadence from here
                next_pulse = after + period;
            }
        }

        tracing::debug!("Pulse thread exiting after {} pulse(s)", pulses);
    }
}

impl PulseSource for ThreadPulseSource {
    fn init(&self) -> Result<(), UsageError> {
        self.shared.dispatcher.begin()?;

        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name(self.thread_name.clone())
            .spawn(move || Self::run_loop(shared))
            .map_err(|err| {
                self.shared.dispatcher.shutdown();
                UsageError::Spawn(err.to_string())
            })?;

        tracing::debug!(
            "ThreadPulseSource '{}' started (period {:?})",
            self.thread_name,
            self.shared.period
        );
        *self.thread_handle.lock() = Some(handle);
        Ok(())
    }

    fn dispose(&self) {
        if !self.shared.dispatcher.shutdown() {
            return;
        }

        if let Some(handle) = self.thread_handle.lock().take() {
            // Disposing from a listener on the pulse thread: the loop exits
            // on its own once the current pulse returns
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
        tracing::debug!("ThreadPulseSource '{}' disposed", self.thread_name);
    }

    fn period(&self) -> Duration {
        self.shared.period
    }

    fn now(&self) -> Duration {
        self.shared.clock.now()
    }

    fn dispatcher(&self) -> &PulseDispatcher {
        &self.shared.dispatcher
    }
}

impl Drop for ThreadPulseSource {
    fn drop(&mut self) {
        self.dispose();
    }
}

// ============================================================================
// Manual source
// ============================================================================

/// Pulse source driven explicitly by the caller
///
/// The calling thread is the pulse-delivery context. Each call returns the
/// failures raised while it ran, which makes this source the natural choice
/// for deterministic tests and for hosts that already own a frame loop.
pub struct ManualPulseSource {
    dispatcher: PulseDispatcher,
    clock: ManualClock,
    period: Duration,
}

impl ManualPulseSource {
    pub fn new(period: Duration) -> Result<Self, ConfigError> {
        Self::with_clock(period, ManualClock::new())
    }

    /// Create a source reading time from an existing manual clock
    pub fn with_clock(period: Duration, clock: ManualClock) -> Result<Self, ConfigError> {
        Ok(Self {
            dispatcher: PulseDispatcher::new(),
            clock,
            period: validate_period(period)?,
        })
    }

    pub fn clock(&self) -> &ManualClock {
        &self.clock
    }

    /// Run queued tasks without pulsing
    pub fn run_pending(&self) -> Vec<PulseError> {
        self.dispatcher.run_pending()
    }

    /// Run queued tasks, then deliver one pulse at the current time
    pub fn pulse(&self) -> Vec<PulseError> {
        let mut errors = self.dispatcher.run_pending();
        errors.extend(self.dispatcher.deliver(self.clock.now()));
        errors
    }

    /// Advance the clock by `delta`, then pulse
    pub fn advance(&self, delta: Duration) -> Vec<PulseError> {
        self.clock.advance(delta);
        self.pulse()
    }

    /// Pulse `count` times, one period apart
    pub fn advance_periods(&self, count: u32) -> Vec<PulseError> {
        let mut errors = Vec::new();
        for _ in 0..count {
            errors.extend(self.advance(self.period));
        }
        errors
    }
}

impl PulseSource for ManualPulseSource {
    fn init(&self) -> Result<(), UsageError> {
        self.dispatcher.begin()
    }

    fn dispose(&self) {
        self.dispatcher.shutdown();
    }

    fn period(&self) -> Duration {
        self.period
    }

    fn now(&self) -> Duration {
        self.clock.now()
    }

    fn dispatcher(&self) -> &PulseDispatcher {
        &self.dispatcher
    }
}
