//! Error types for tempo_animation
//!
//! - [`UsageError`]: an operation was called in a state that doesn't allow it.
//!   Returned synchronously to the caller; nothing is changed.
//! - [`TargetError`]: raised by a timing target while handling a notification.
//! - [`PulseError`]: failures surfacing on the pulse-delivery context, routed
//!   to the pulse source's error channel.

use crate::animator::AnimatorState;
use std::fmt;
use tempo_core::ConfigError;
use thiserror::Error;

/// Error raised by a timing target
pub type TargetError = Box<dyn std::error::Error + Send + Sync>;

/// Result returned by timing target callbacks
pub type TargetResult = std::result::Result<(), TargetError>;

/// Invalid state transitions and pulse source lifecycle misuse
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UsageError {
    /// `start` on an animator that is running or paused
    #[error("animator is already {0}")]
    AlreadyRunning(AnimatorState),

    /// `pause` or `reverse_now` on an animator that isn't running
    #[error("animator is not running (currently {0})")]
    NotRunning(AnimatorState),

    /// `resume` on an animator that isn't paused
    #[error("animator is not paused (currently {0})")]
    NotPaused(AnimatorState),

    /// `init` on a pulse source that was already initialized
    #[error("pulse source is already initialized")]
    AlreadyInitialized,

    /// The pulse source has been disposed
    #[error("pulse source has been disposed")]
    SourceDisposed,

    /// The pulse thread could not be spawned
    #[error("failed to spawn pulse thread: {0}")]
    Spawn(String),
}

/// Which notification a timing target was handling
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotificationKind {
    Begin,
    End,
    Repeat,
    Reverse,
    TimingEvent,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NotificationKind::Begin => "begin",
            NotificationKind::End => "end",
            NotificationKind::Repeat => "repeat",
            NotificationKind::Reverse => "reverse",
            NotificationKind::TimingEvent => "timing_event",
        };
        f.write_str(name)
    }
}

/// A timing target failed while handling one notification
#[derive(Error, Debug)]
#[error("timing target of `{animator}` failed during {kind}: {source}")]
pub struct NotificationError {
    /// Debug name of the animator that sent the notification
    pub animator: String,
    pub kind: NotificationKind,
    #[source]
    pub source: TargetError,
}

/// Failures raised on the pulse-delivery context
#[derive(Error, Debug)]
pub enum PulseError {
    /// One or more timing targets failed during a single delivery
    #[error("{} timing target notification(s) failed", .0.len())]
    Targets(Vec<NotificationError>),

    /// A raw tick listener failed
    #[error("tick listener failed: {0}")]
    Listener(#[source] TargetError),
}

impl PulseError {
    /// Individual target failures, if this is a [`PulseError::Targets`]
    pub fn notification_errors(&self) -> &[NotificationError] {
        match self {
            PulseError::Targets(errors) => errors,
            PulseError::Listener(_) => &[],
        }
    }
}

/// Umbrella error for configuration loading and runtime setup
#[derive(Error, Debug)]
pub enum AnimationError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Usage(#[from] UsageError),

    #[error("failed to parse configuration: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result type for tempo_animation operations
pub type Result<T> = std::result::Result<T, AnimationError>;
