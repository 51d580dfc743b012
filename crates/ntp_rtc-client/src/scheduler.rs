// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Retry timers for the synchronization session.
//!
//! A session runs two independent retry loops: one re-issues the hostname
//! lookup, the other re-sends the request datagram. Each loop is driven by a
//! timer from an [`Alarm`] facility. [`RetryScheduler`] wraps that facility
//! with the session's retry interval and the arm / rearm / cancel idioms the
//! state machine needs.
//!
//! Cancellation is best effort. A timer can fire and have its event queued
//! for dispatch at the moment it is cancelled, so cancelling a stale id is a
//! no-op and the session compares every fired id against the handle it
//! currently holds.

use std::fmt;
use std::time::Duration;

use tracing::trace;

/// Which retry loop a timer belongs to.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum TimerKind {
    /// Re-issues the hostname lookup.
    Resolution,
    /// Sends (and re-sends) the request datagram.
    Request,
}

impl fmt::Display for TimerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerKind::Resolution => write!(f, "resolution"),
            TimerKind::Request => write!(f, "request"),
        }
    }
}

/// Handle to a scheduled timer.
///
/// Ids are never reused within one [`Alarm`], so a stale id can always be
/// told apart from the one currently armed.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub struct TimerId {
    kind: TimerKind,
    seq: u64,
}

impl TimerId {
    /// Create an id. Alarm implementations must hand out unique `seq` values.
    pub fn new(kind: TimerKind, seq: u64) -> Self {
        TimerId { kind, seq }
    }

    /// The retry loop this timer drives.
    pub fn kind(&self) -> TimerKind {
        self.kind
    }

    /// The alarm-assigned sequence number.
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

/// A one-shot timer facility.
///
/// When a scheduled timer expires the facility delivers
/// [`Event::TimerFired`](crate::session::Event::TimerFired) with its id to
/// the session.
pub trait Alarm {
    /// Schedule a timer of `kind` to fire after `delay`.
    fn schedule(&mut self, kind: TimerKind, delay: Duration) -> TimerId;

    /// Cancel a pending timer.
    ///
    /// Returns `true` if the timer was still pending. Cancelling an id that
    /// already fired, was already cancelled, or was never issued does nothing
    /// and returns `false`.
    fn cancel(&mut self, id: TimerId) -> bool;
}

/// Arms, rearms and cancels the session's retry timers.
#[derive(Debug)]
pub struct RetryScheduler<A> {
    alarm: A,
    interval: Duration,
}

impl<A: Alarm> RetryScheduler<A> {
    /// Wrap `alarm`, using `interval` for every retry.
    pub fn new(alarm: A, interval: Duration) -> Self {
        RetryScheduler { alarm, interval }
    }

    /// The retry interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Schedule a timer of `kind` after the retry interval.
    ///
    /// Nothing stops a second timer of the same kind being armed while the
    /// first is outstanding; the caller owns that invariant.
    pub fn arm(&mut self, kind: TimerKind) -> TimerId {
        self.arm_after(kind, self.interval)
    }

    /// Schedule a timer of `kind` after an explicit delay.
    pub fn arm_after(&mut self, kind: TimerKind, delay: Duration) -> TimerId {
        let id = self.alarm.schedule(kind, delay);
        trace!(timer = ?id, delay_ms = delay.as_millis() as u64, "armed");
        id
    }

    /// Re-arm a timer that just fired so its loop keeps repeating.
    ///
    /// The returned id replaces `fired` as the outstanding handle for that kind.
    pub fn rearm(&mut self, fired: TimerId) -> TimerId {
        // Usually a no-op: the timer has already fired.
        self.alarm.cancel(fired);
        self.arm(fired.kind())
    }

    /// Cancel `id` if it is still pending. Safe with stale ids.
    pub fn cancel(&mut self, id: TimerId) {
        if self.alarm.cancel(id) {
            trace!(timer = ?id, "cancelled");
        }
    }

    /// The wrapped alarm facility.
    pub fn alarm(&self) -> &A {
        &self.alarm
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct ManualAlarm {
        next: u64,
        pending: HashMap<TimerId, Duration>,
    }

    impl Alarm for ManualAlarm {
        fn schedule(&mut self, kind: TimerKind, delay: Duration) -> TimerId {
            self.next += 1;
            let id = TimerId::new(kind, self.next);
            self.pending.insert(id, delay);
            id
        }

        fn cancel(&mut self, id: TimerId) -> bool {
            self.pending.remove(&id).is_some()
        }
    }

    #[test]
    fn arm_uses_retry_interval() {
        let mut sched = RetryScheduler::new(ManualAlarm::default(), Duration::from_secs(10));
        let id = sched.arm(TimerKind::Resolution);
        assert_eq!(id.kind(), TimerKind::Resolution);
        assert_eq!(sched.alarm().pending[&id], Duration::from_secs(10));
    }

    #[test]
    fn arm_after_uses_explicit_delay() {
        let mut sched = RetryScheduler::new(ManualAlarm::default(), Duration::from_secs(10));
        let id = sched.arm_after(TimerKind::Request, Duration::from_millis(1));
        assert_eq!(sched.alarm().pending[&id], Duration::from_millis(1));
    }

    #[test]
    fn rearm_replaces_fired_id_with_same_kind() {
        let mut sched = RetryScheduler::new(ManualAlarm::default(), Duration::from_secs(10));
        let first = sched.arm(TimerKind::Request);
        // Simulate the timer firing.
        sched.alarm.pending.remove(&first);
        let second = sched.rearm(first);
        assert_ne!(first, second);
        assert_eq!(second.kind(), TimerKind::Request);
        assert_eq!(sched.alarm().pending.len(), 1);
    }

    #[test]
    fn cancel_is_idempotent() {
        let mut sched = RetryScheduler::new(ManualAlarm::default(), Duration::from_secs(10));
        let resolution = sched.arm(TimerKind::Resolution);
        let request = sched.arm(TimerKind::Request);
        sched.cancel(resolution);
        sched.cancel(resolution);
        // Never issued by this alarm.
        sched.cancel(TimerId::new(TimerKind::Request, 999));
        assert_eq!(sched.alarm().pending.len(), 1);
        assert!(sched.alarm().pending.contains_key(&request));
    }
}
