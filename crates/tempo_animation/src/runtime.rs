//! Animation runtime
//!
//! [`AnimationRuntime`] owns the pulse source an application's animators
//! share. It has an explicit lifecycle: create, [`init`](AnimationRuntime::init),
//! build animators, [`shutdown`](AnimationRuntime::shutdown). Dropping the
//! runtime shuts it down.

use crate::animator::AnimatorBuilder;
use crate::config::{AnimatorConfig, PulseConfig};
use crate::error::{Result, UsageError};
use crate::pulse::{ErrorHandler, PulseSource, SourcePhase, ThreadPulseSource};
use std::sync::Arc;
use std::time::Duration;
use tempo_core::ConfigError;

/// Composition root for animators sharing one pulse source
pub struct AnimationRuntime {
    source: Arc<dyn PulseSource>,
}

impl AnimationRuntime {
    /// Wrap an existing pulse source
    pub fn new(source: Arc<dyn PulseSource>) -> Self {
        Self { source }
    }

    /// Runtime backed by a pulse thread with the given period
    pub fn threaded(period: Duration) -> std::result::Result<Self, ConfigError> {
        Ok(Self::new(Arc::new(ThreadPulseSource::new(period)?)))
    }

    pub fn from_config(config: &PulseConfig) -> std::result::Result<Self, ConfigError> {
        Ok(Self::new(Arc::new(config.build_source()?)))
    }

    /// Start pulsing
    pub fn init(&self) -> std::result::Result<(), UsageError> {
        self.source.init()?;
        tracing::debug!("AnimationRuntime initialized (period {:?})", self.source.period());
        Ok(())
    }

    /// Stop pulsing; animators still running are stopped without `end`
    pub fn shutdown(&self) {
        if self.source.phase() != SourcePhase::Disposed {
            self.source.dispose();
            tracing::debug!("AnimationRuntime shut down");
        }
    }

    pub fn is_running(&self) -> bool {
        self.source.is_running()
    }

    pub fn source(&self) -> &Arc<dyn PulseSource> {
        &self.source
    }

    pub fn set_error_handler(&self, handler: ErrorHandler) {
        self.source.set_error_handler(handler);
    }

    /// Builder for an animator on this runtime's source
    pub fn animator(&self, duration: Duration) -> AnimatorBuilder {
        AnimatorBuilder::new(Arc::clone(&self.source)).duration(duration)
    }

    /// Builder for an animator on this runtime's source, configured by `config`
    pub fn animator_from_config(&self, config: &AnimatorConfig) -> Result<AnimatorBuilder> {
        Ok(config.builder(Arc::clone(&self.source))?)
    }
}

impl Drop for AnimationRuntime {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animator::RepeatCount;
    use crate::error::PulseError;
    use crate::pulse::ManualPulseSource;
    use crate::target::TimingTarget;
    use crate::test_support::{Event, Recorder};
    use crate::Animator;
    use parking_lot::Mutex;

    fn manual_runtime() -> (Arc<ManualPulseSource>, AnimationRuntime) {
        let source = Arc::new(ManualPulseSource::new(Duration::from_millis(10)).unwrap());
        let runtime = AnimationRuntime::new(source.clone());
        (source, runtime)
    }

    #[test]
    fn test_lifecycle() {
        let (source, runtime) = manual_runtime();
        assert!(!runtime.is_running());
        runtime.init().unwrap();
        assert!(runtime.is_running());
        assert_eq!(runtime.init(), Err(UsageError::AlreadyInitialized));

        runtime.shutdown();
        runtime.shutdown();
        assert!(!runtime.is_running());
        assert_eq!(source.phase(), SourcePhase::Disposed);
    }

    #[test]
    fn test_drop_disposes_source() {
        let (source, runtime) = manual_runtime();
        runtime.init().unwrap();
        drop(runtime);
        assert_eq!(source.phase(), SourcePhase::Disposed);
    }

    #[test]
    fn test_animators_share_the_source() {
        let (source, runtime) = manual_runtime();
        runtime.init().unwrap();
        let recorder = Recorder::new();
        let animator = runtime
            .animator(Duration::from_millis(50))
            .target(recorder.clone())
            .build()
            .unwrap();
        let looping = runtime
            .animator_from_config(&AnimatorConfig::looping())
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(looping.repeat_count(), RepeatCount::Infinite);

        animator.start().unwrap();
        looping.start().unwrap();
        assert_eq!(source.tick_listener_count(), 2);

        source.advance_periods(6);
        assert_eq!(recorder.lifecycle(), vec![Event::Begin, Event::End]);
        assert_eq!(source.tick_listener_count(), 1);
    }

    #[test]
    fn test_shutdown_stops_pulses_to_running_animators() {
        let (source, runtime) = manual_runtime();
        runtime.init().unwrap();
        let recorder = Recorder::new();
        let animator = runtime
            .animator(Duration::from_millis(100))
            .target(recorder.clone())
            .build()
            .unwrap();

        animator.start().unwrap();
        source.advance(Duration::from_millis(10));
        let count = recorder.events().len();

        runtime.shutdown();
        source.advance(Duration::from_millis(10));
        assert_eq!(recorder.events().len(), count);
        assert_eq!(animator.state(), crate::AnimatorState::Stopped);
        assert!(!animator.is_running());
        assert!(!animator.stop());
        assert_eq!(recorder.count(&Event::End), 0);
        assert_eq!(animator.start(), Err(UsageError::SourceDisposed));
    }

    #[test]
    fn test_error_handler_receives_target_failures() {
        struct Broken;

        impl TimingTarget for Broken {
            fn begin(&self, _source: &Animator) -> crate::error::TargetResult {
                Err("no".into())
            }
        }

        let runtime = AnimationRuntime::threaded(Duration::from_millis(2)).unwrap();
        let (tx, rx) = std::sync::mpsc::channel();
        let tx = Mutex::new(tx);
        runtime.set_error_handler(Arc::new(move |err: &PulseError| {
            let _ = tx.lock().send(err.to_string());
        }));
        runtime.init().unwrap();

        let animator = runtime
            .animator(Duration::from_millis(20))
            .target(Arc::new(Broken))
            .build()
            .unwrap();
        animator.start().unwrap();

        let message = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(message.contains("1 timing target notification(s) failed"), "{}", message);
        assert!(animator.wait_until_stopped(Duration::from_secs(5)));
        runtime.shutdown();
    }
}
