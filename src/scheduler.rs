//! Recompute scheduling: coalescing, frame timing, reentrancy guard
//!
//! Triggers only record pending work. The work runs once, on the next
//! animation frame, no matter how many triggers arrived in between.
//! Triggers that arrive while a frame is running (typically caused by
//! the frame's own overlay writes) are dropped.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// External reasons to recompute
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Trigger {
    TextChanged,
    Scrolled,
    Resized,
    FontsReady,
    /// Explicit request, e.g. after the pattern set changed
    Forced,
}

/// Work a frame has to do; merged across coalesced triggers
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PendingWork {
    /// Capture a new snapshot and re-run the matcher
    pub rematch: bool,
    /// Rebuild the mirror and re-measure every match
    pub remeasure: bool,
    /// Drop every cache and overlay first
    pub reset: bool,
}

impl PendingWork {
    pub fn for_trigger(trigger: Trigger) -> Self {
        match trigger {
            Trigger::TextChanged => Self {
                rematch: true,
                ..Self::default()
            },
            // Window and compositor are recomputed on every frame anyway
            Trigger::Scrolled => Self::default(),
            Trigger::Resized | Trigger::FontsReady => Self {
                remeasure: true,
                ..Self::default()
            },
            Trigger::Forced => Self {
                rematch: true,
                remeasure: true,
                reset: true,
            },
        }
    }

    pub fn merge(self, other: Self) -> Self {
        Self {
            rematch: self.rematch || other.rematch,
            remeasure: self.remeasure || other.remeasure,
            reset: self.reset || other.reset,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub frames: u64,
    /// Triggers folded into an already pending frame
    pub coalesced: u64,
    /// Triggers dropped because a frame was running
    pub suppressed: u64,
    pub polls: u64,
}

#[derive(Default)]
struct Inbox {
    pending: Option<PendingWork>,
    recomputing: bool,
    stats: SchedulerStats,
}

/// Cloneable sender side of the scheduler, safe to move into callbacks
#[derive(Clone)]
pub struct TriggerHandle {
    inbox: Arc<Mutex<Inbox>>,
}

impl TriggerHandle {
    /// Record a trigger; returns false when it was suppressed
    pub fn notify(&self, trigger: Trigger) -> bool {
        let mut inbox = self.inbox.lock();
        if inbox.recomputing {
            inbox.stats.suppressed += 1;
            tracing::trace!(?trigger, "trigger suppressed during recompute");
            return false;
        }

        let work = PendingWork::for_trigger(trigger);
        let merged = match inbox.pending.take() {
            Some(pending) => {
                inbox.stats.coalesced += 1;
                pending.merge(work)
            }
            None => work,
        };
        inbox.pending = Some(merged);
        true
    }
}

/// Marks a frame in progress; dropping it re-opens the inbox
pub struct FrameGuard {
    inbox: Arc<Mutex<Inbox>>,
    work: PendingWork,
}

impl FrameGuard {
    pub fn work(&self) -> PendingWork {
        self.work
    }
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        self.inbox.lock().recomputing = false;
    }
}

pub struct ChangeScheduler {
    inbox: Arc<Mutex<Inbox>>,
    poll_interval: Option<Duration>,
    last_poll: Option<Instant>,
}

impl ChangeScheduler {
    /// `poll_interval` enables the text polling fallback
    pub fn new(poll_interval: Option<Duration>) -> Self {
        Self {
            inbox: Arc::new(Mutex::new(Inbox::default())),
            poll_interval,
            last_poll: None,
        }
    }

    pub fn handle(&self) -> TriggerHandle {
        TriggerHandle {
            inbox: self.inbox.clone(),
        }
    }

    pub fn notify(&self, trigger: Trigger) -> bool {
        self.handle().notify(trigger)
    }

    /// Whether the host should schedule an animation frame
    pub fn frame_requested(&self) -> bool {
        self.inbox.lock().pending.is_some()
    }

    pub fn is_recomputing(&self) -> bool {
        self.inbox.lock().recomputing
    }

    /// Take the pending work and close the inbox until the guard drops
    pub fn begin_frame(&self) -> Option<FrameGuard> {
        let mut inbox = self.inbox.lock();
        if inbox.recomputing {
            return None;
        }
        let work = inbox.pending.take()?;
        inbox.recomputing = true;
        inbox.stats.frames += 1;
        Some(FrameGuard {
            inbox: self.inbox.clone(),
            work,
        })
    }

    /// Whether the polling fallback should compare text now
    pub fn poll_due(&mut self, now: Instant) -> bool {
        let Some(interval) = self.poll_interval else {
            return false;
        };
        let due = self
            .last_poll
            .map_or(true, |last| now.saturating_duration_since(last) >= interval);
        if due {
            self.last_poll = Some(now);
            self.inbox.lock().stats.polls += 1;
        }
        due
    }

    pub fn poll_interval(&self) -> Option<Duration> {
        self.poll_interval
    }

    pub fn stats(&self) -> SchedulerStats {
        self.inbox.lock().stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triggers_coalesce_into_one_frame() {
        let scheduler = ChangeScheduler::new(None);
        scheduler.notify(Trigger::Scrolled);
        scheduler.notify(Trigger::Scrolled);
        scheduler.notify(Trigger::TextChanged);

        let frame = scheduler.begin_frame().unwrap();
        assert_eq!(
            frame.work(),
            PendingWork {
                rematch: true,
                remeasure: false,
                reset: false
            }
        );
        drop(frame);

        assert!(scheduler.begin_frame().is_none());
        assert_eq!(scheduler.stats().frames, 1);
        assert_eq!(scheduler.stats().coalesced, 2);
    }

    #[test]
    fn test_resize_and_text_both_survive_merge() {
        let scheduler = ChangeScheduler::new(None);
        scheduler.notify(Trigger::TextChanged);
        scheduler.notify(Trigger::Resized);

        let work = scheduler.begin_frame().unwrap().work();
        assert!(work.rematch && work.remeasure && !work.reset);
    }

    #[test]
    fn test_forced_implies_everything() {
        let work = PendingWork::for_trigger(Trigger::Forced);
        assert!(work.rematch && work.remeasure && work.reset);
    }

    #[test]
    fn test_triggers_during_frame_are_suppressed() {
        let scheduler = ChangeScheduler::new(None);
        let handle = scheduler.handle();
        handle.notify(Trigger::TextChanged);

        let frame = scheduler.begin_frame().unwrap();
        assert!(scheduler.is_recomputing());
        assert!(!handle.notify(Trigger::TextChanged));
        assert!(scheduler.begin_frame().is_none());
        drop(frame);

        assert!(!scheduler.is_recomputing());
        assert!(!scheduler.frame_requested());
        assert_eq!(scheduler.stats().suppressed, 1);

        assert!(handle.notify(Trigger::Scrolled));
        assert!(scheduler.frame_requested());
    }

    #[test]
    fn test_poll_interval() {
        let start = Instant::now();
        let mut scheduler = ChangeScheduler::new(Some(Duration::from_millis(500)));

        assert!(scheduler.poll_due(start));
        assert!(!scheduler.poll_due(start + Duration::from_millis(100)));
        assert!(scheduler.poll_due(start + Duration::from_millis(500)));
        assert_eq!(scheduler.stats().polls, 2);

        let mut disabled = ChangeScheduler::new(None);
        assert!(!disabled.poll_due(start));
    }
}
