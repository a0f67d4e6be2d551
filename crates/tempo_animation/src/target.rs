//! Timing targets
//!
//! A [`TimingTarget`] receives lifecycle and progress notifications from an
//! [`Animator`]. Targets are kept in insertion order; that order is the order
//! in which every notification is delivered.

use crate::animator::{Animator, Direction};
use crate::error::{NotificationError, NotificationKind, PulseError, TargetResult};
use indexmap::IndexMap;
use parking_lot::RwLock;
use smallvec::SmallVec;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Receiver of animator notifications
///
/// Every method runs on the pulse-delivery context of the animator's pulse
/// source. Returning an error doesn't stop other targets from being notified;
/// the failure is reported through the source's error channel.
pub trait TimingTarget: Send + Sync {
    /// The animator's first pulse after its start delay
    fn begin(&self, _source: &Animator) -> TargetResult {
        Ok(())
    }

    /// The animator stopped, either naturally or through `stop`
    fn end(&self, _source: &Animator) -> TargetResult {
        Ok(())
    }

    /// A cycle boundary was crossed
    fn repeat(&self, _source: &Animator) -> TargetResult {
        Ok(())
    }

    /// `reverse_now` flipped the direction mid-cycle
    fn reverse(&self, _source: &Animator) -> TargetResult {
        Ok(())
    }

    /// Progress through the current cycle, after the animator's interpolator
    fn timing_event(&self, _source: &Animator, _fraction: f64, _direction: Direction) -> TargetResult {
        Ok(())
    }
}

/// Handle to a target registered on an animator
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(u64);

/// A notification queued for delivery to every target
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Notification {
    Begin,
    End,
    Repeat,
    Reverse,
    Timing { fraction: f64, direction: Direction },
}

impl Notification {
    pub fn kind(&self) -> NotificationKind {
        match self {
            Notification::Begin => NotificationKind::Begin,
            Notification::End => NotificationKind::End,
            Notification::Repeat => NotificationKind::Repeat,
            Notification::Reverse => NotificationKind::Reverse,
            Notification::Timing { .. } => NotificationKind::TimingEvent,
        }
    }

    fn send(&self, target: &dyn TimingTarget, animator: &Animator) -> TargetResult {
        match *self {
            Notification::Begin => target.begin(animator),
            Notification::End => target.end(animator),
            Notification::Repeat => target.repeat(animator),
            Notification::Reverse => target.reverse(animator),
            Notification::Timing {
                fraction,
                direction,
            } => target.timing_event(animator, fraction, direction),
        }
    }
}

/// Ordered, concurrently mutable list of timing targets
pub struct TargetList {
    targets: RwLock<IndexMap<TargetId, Arc<dyn TimingTarget>>>,
    next_id: AtomicU64,
}

impl TargetList {
    pub fn new() -> Self {
        Self {
            targets: RwLock::new(IndexMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn add(&self, target: Arc<dyn TimingTarget>) -> TargetId {
        let id = TargetId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.targets.write().insert(id, target);
        id
    }

    /// Remove a target, keeping the order of the rest; unknown ids are ignored
    pub fn remove(&self, id: TargetId) -> bool {
        self.targets.write().shift_remove(&id).is_some()
    }

    pub fn clear(&self) {
        self.targets.write().clear();
    }

    pub fn len(&self) -> usize {
        self.targets.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.read().is_empty()
    }

    pub fn contains(&self, id: TargetId) -> bool {
        self.targets.read().contains_key(&id)
    }

    fn snapshot(&self) -> SmallVec<[(TargetId, Arc<dyn TimingTarget>); 4]> {
        self.targets
            .read()
            .iter()
            .map(|(id, target)| (*id, Arc::clone(target)))
            .collect()
    }

    /// Deliver `notifications` in order to every target
    ///
    /// Each notification snapshots the list, then skips targets removed in
    /// the meantime. Failures are collected, never short-circuited.
    pub fn notify(&self, animator: &Animator, notifications: &[Notification]) -> Result<(), PulseError> {
        let mut errors = Vec::new();

        for notification in notifications {
            for (id, target) in self.snapshot() {
                if !self.contains(id) {
                    continue;
                }
                if let Err(source) = notification.send(target.as_ref(), animator) {
                    errors.push(NotificationError {
                        animator: animator.debug_name().to_string(),
                        kind: notification.kind(),
                        source,
                    });
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(PulseError::Targets(errors))
        }
    }
}

impl Default for TargetList {
    fn default() -> Self {
        Self::new()
    }
}

/// Target that only handles `timing_event`
pub struct TimingEventTarget<F> {
    callback: F,
}

impl<F> TimingTarget for TimingEventTarget<F>
where
    F: Fn(&Animator, f64, Direction) + Send + Sync,
{
    fn timing_event(&self, source: &Animator, fraction: f64, direction: Direction) -> TargetResult {
        (self.callback)(source, fraction, direction);
        Ok(())
    }
}

/// Wrap a progress callback as a timing target
pub fn timing_event_target<F>(callback: F) -> Arc<dyn TimingTarget>
where
    F: Fn(&Animator, f64, Direction) + Send + Sync + 'static,
{
    Arc::new(TimingEventTarget { callback })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pulse::{ManualPulseSource, PulseSource};
    use crate::test_support::{Event, Recorder};
    use std::time::Duration;

    fn animator() -> (Arc<ManualPulseSource>, Animator) {
        let source = Arc::new(ManualPulseSource::new(Duration::from_millis(10)).unwrap());
        source.init().unwrap();
        let animator = Animator::builder(source.clone())
            .duration(Duration::from_millis(100))
            .debug_name("targets")
            .build()
            .unwrap();
        (source, animator)
    }

    struct Failing;

    impl TimingTarget for Failing {
        fn begin(&self, _source: &Animator) -> TargetResult {
            Err("begin refused".into())
        }
    }

    #[test]
    fn test_notify_in_insertion_order() {
        let (_source, animator) = animator();
        let list = TargetList::new();
        let log = Recorder::shared_log();
        list.add(Recorder::with_log("a", &log));
        list.add(Recorder::with_log("b", &log));
        list.add(Recorder::with_log("c", &log));

        list.notify(&animator, &[Notification::Begin, Notification::End]).unwrap();

        let names: Vec<_> = log.lock().iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec!["a", "b", "c", "a", "b", "c"]);
    }

    #[test]
    fn test_remove_keeps_order() {
        let list = TargetList::new();
        let a = list.add(Recorder::new());
        let b = list.add(Recorder::new());
        let c = list.add(Recorder::new());

        assert!(list.remove(b));
        assert!(!list.remove(b));
        assert_eq!(list.len(), 2);
        let ids: Vec<_> = list.snapshot().iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![a, c]);
    }

    #[test]
    fn test_failing_target_does_not_block_others() {
        let (_source, animator) = animator();
        let list = TargetList::new();
        let recorder = Recorder::new();
        list.add(Arc::new(Failing));
        list.add(recorder.clone());

        let err = list.notify(&animator, &[Notification::Begin]).unwrap_err();
        let failures = err.notification_errors();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].kind, NotificationKind::Begin);
        assert_eq!(failures[0].animator, "targets");
        assert!(failures[0].to_string().contains("begin refused"));
        assert_eq!(recorder.events(), vec![Event::Begin]);
    }

    #[test]
    fn test_target_removed_during_delivery_is_skipped() {
        struct Remover {
            list: Arc<TargetList>,
            victim: parking_lot::Mutex<Option<TargetId>>,
        }

        impl TimingTarget for Remover {
            fn begin(&self, _source: &Animator) -> TargetResult {
                if let Some(id) = self.victim.lock().take() {
                    self.list.remove(id);
                }
                Ok(())
            }
        }

        let (_source, animator) = animator();
        let list = Arc::new(TargetList::new());
        let victim = Recorder::new();
        let remover = Arc::new(Remover {
            list: Arc::clone(&list),
            victim: parking_lot::Mutex::new(None),
        });
        list.add(remover.clone());
        let victim_id = list.add(victim.clone());
        *remover.victim.lock() = Some(victim_id);

        list.notify(&animator, &[Notification::Begin]).unwrap();
        assert!(victim.events().is_empty());
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_timing_event_target_wraps_closure() {
        let (_source, animator) = animator();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        let target = timing_event_target(move |_animator, fraction, direction| {
            s.lock().push((fraction, direction));
        });

        target.begin(&animator).unwrap();
        target
            .timing_event(&animator, 0.25, Direction::Backward)
            .unwrap();
        assert_eq!(*seen.lock(), vec![(0.25, Direction::Backward)]);
    }
}
