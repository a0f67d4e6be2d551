//! Monotonic clocks
//!
//! Pulse sources and animators read time as a [`Duration`] since an arbitrary
//! per-clock origin. [`SystemClock`] follows wall time; [`ManualClock`] only
//! moves when told to, which makes timing behavior reproducible in tests.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A monotonic time source
pub trait Clock: Send + Sync {
    /// Time elapsed since this clock's origin
    fn now(&self) -> Duration;
}

/// Clock backed by [`Instant`]
#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// A clock that only advances when asked to
///
/// Clones share the same underlying time.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Arc<Mutex<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward by `delta`
    pub fn advance(&self, delta: Duration) -> Duration {
        let mut now = self.now.lock();
        *now += delta;
        *now
    }

    /// Jump to an absolute time; moving backwards is ignored
    pub fn set(&self, time: Duration) {
        let mut now = self.now.lock();
        if time > *now {
            *now = time;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.now.lock()
    }
}
