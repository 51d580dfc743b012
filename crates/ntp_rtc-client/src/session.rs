// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! The synchronization session state machine.
//!
//! A [`Session`] owns all mutable state for one synchronization attempt and
//! is driven entirely by [`Event`]s: lookup results, timer firings, and
//! received datagrams. Events are delivered one at a time, in whatever order
//! the runtime produces them, to [`Session::handle`]. Each event kind has a
//! single handler that matches on the current [`SessionState`] and ignores
//! anything that is not valid for it.
//!
//! ```text
//!   Idle ──start──▶ Resolving ──address──▶ AwaitingResponse ──valid reply──▶ Completed
//!                    ▲     │                 ▲        │
//!                    └─────┘                 └────────┘
//!              resolution timer            request timer
//!             (re-issue lookup)              (re-send)
//! ```
//!
//! Both retry loops run forever unless an attempt cap is configured, in which
//! case the session ends in [`SessionState::Exhausted`].
//!
//! The session performs no I/O of its own. It talks to the outside world
//! through three collaborators: a [`Resolver`], a [`Transport`], and an
//! [`Alarm`]. The tokio implementations live in [`crate::runtime`]; tests
//! drive the session with in-memory fakes.

use std::io;
use std::net::{IpAddr, SocketAddr};

use tracing::{debug, info, trace, warn};

use crate::calendar::{self, CalendarTimestamp};
use crate::config::SyncConfig;
use crate::protocol;
use crate::scheduler::{Alarm, RetryScheduler, TimerId, TimerKind};

/// Immediate outcome of asking a [`Resolver`] for an address.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Lookup {
    /// The lookup is in flight; the answer arrives later as [`Event::Resolved`].
    Pending,
    /// The address was known already (cache hit or IP literal).
    Cached(IpAddr),
    /// The lookup could not even be started. The retry timer will try again.
    Failed,
}

/// Hostname resolution service.
pub trait Resolver {
    /// Begin resolving `hostname`.
    fn resolve(&mut self, hostname: &str) -> Lookup;
}

/// An open datagram endpoint.
///
/// Received datagrams are delivered to the session as [`Event::Datagram`].
pub trait Transport {
    /// Send `payload` to `target` without blocking.
    fn send_to(&mut self, payload: &[u8], target: SocketAddr) -> io::Result<()>;

    /// Release the endpoint. Called once, when the session ends.
    fn close(&mut self);
}

/// Something that happened outside the session.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Event {
    /// A lookup finished; `None` means it failed.
    Resolved(Option<IpAddr>),
    /// A retry timer expired.
    TimerFired(TimerId),
    /// A datagram arrived on the session's endpoint.
    Datagram {
        /// Sender address and port.
        source: SocketAddr,
        /// The raw payload.
        payload: Vec<u8>,
    },
}

/// Where a session is in its lifecycle.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SessionState {
    /// Created, not started.
    Idle,
    /// Waiting for the server address.
    Resolving,
    /// Address known; sending requests and waiting for a valid reply.
    AwaitingResponse,
    /// A valid reply was converted and stored.
    Completed,
    /// A configured attempt cap ran out.
    Exhausted(TimerKind),
}

impl SessionState {
    /// Whether the session will make no further progress.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Exhausted(_))
    }
}

/// Per-session counters.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct SessionStats {
    /// Lookups issued, including the first.
    pub resolution_attempts: u32,
    /// Request datagrams attempted, including failed sends.
    pub request_attempts: u32,
    /// Datagrams received and thrown away.
    pub responses_discarded: u32,
}

/// State for one synchronization attempt.
pub struct Session<R: Resolver, T: Transport, A: Alarm> {
    config: SyncConfig,
    resolver: R,
    transport: T,
    scheduler: RetryScheduler<A>,
    state: SessionState,
    resolved_address: Option<IpAddr>,
    resolution_timer: Option<TimerId>,
    request_timer: Option<TimerId>,
    request_sent: bool,
    result: Option<CalendarTimestamp>,
    stats: SessionStats,
    closed: bool,
}

impl<R: Resolver, T: Transport, A: Alarm> Session<R, T, A> {
    /// Create an idle session around an already-open `transport`.
    pub fn new(config: SyncConfig, resolver: R, transport: T, alarm: A) -> Self {
        let scheduler = RetryScheduler::new(alarm, config.retry_interval);
        Session {
            config,
            resolver,
            transport,
            scheduler,
            state: SessionState::Idle,
            resolved_address: None,
            resolution_timer: None,
            request_timer: None,
            request_sent: false,
            result: None,
            stats: SessionStats::default(),
            closed: false,
        }
    }

    /// Arm the resolution-retry timer and issue the first lookup.
    ///
    /// Does nothing unless the session is idle.
    pub fn start(&mut self) -> SessionState {
        if self.state != SessionState::Idle {
            return self.state;
        }
        debug!(server = %self.config.server, "starting time synchronization");
        self.state = SessionState::Resolving;
        self.resolution_timer = Some(self.scheduler.arm(TimerKind::Resolution));
        self.issue_lookup();
        self.state
    }

    /// Dispatch one event and return the resulting state.
    pub fn handle(&mut self, event: Event) -> SessionState {
        match event {
            Event::Resolved(address) => self.on_resolved(address),
            Event::TimerFired(id) => self.on_timer(id),
            Event::Datagram { source, payload } => self.on_datagram(source, &payload),
        }
        self.state
    }

    fn on_resolved(&mut self, address: Option<IpAddr>) {
        match (self.state, address) {
            (SessionState::Resolving, Some(ip)) => {
                info!(server = %self.config.server, address = %ip, "resolved time server");
                self.resolved_address = Some(ip);
                if let Some(id) = self.resolution_timer.take() {
                    self.scheduler.cancel(id);
                }
                debug_assert!(self.request_timer.is_none());
                self.request_timer = Some(
                    self.scheduler
                        .arm_after(TimerKind::Request, self.config.first_send_delay),
                );
                self.state = SessionState::AwaitingResponse;
            }
            (SessionState::Resolving, None) => {
                debug!(
                    server = %self.config.server,
                    attempt = self.stats.resolution_attempts,
                    "lookup failed, waiting for retry"
                );
            }
            (state, _) => trace!(?state, "ignoring late lookup result"),
        }
    }

    fn on_timer(&mut self, id: TimerId) {
        let kind = id.kind();
        let slot = match kind {
            TimerKind::Resolution => self.resolution_timer,
            TimerKind::Request => self.request_timer,
        };
        if slot != Some(id) {
            trace!(timer = ?id, "ignoring stale timer");
            return;
        }

        let active = match kind {
            TimerKind::Resolution => {
                self.state == SessionState::Resolving && self.resolved_address.is_none()
            }
            TimerKind::Request => self.state == SessionState::AwaitingResponse,
        };
        if !active {
            trace!(timer = ?id, state = ?self.state, "timer fired outside its state");
            self.scheduler.cancel(id);
            self.set_timer(kind, None);
            return;
        }

        if self.cap_reached(kind) {
            self.exhaust(kind);
            return;
        }

        // Store the new handle before acting: a cached lookup can complete
        // resolution synchronously and cancel it.
        let next = self.scheduler.rearm(id);
        self.set_timer(kind, Some(next));
        match kind {
            TimerKind::Resolution => self.issue_lookup(),
            TimerKind::Request => self.send_request(),
        }
    }

    fn on_datagram(&mut self, source: SocketAddr, payload: &[u8]) {
        if self.state != SessionState::AwaitingResponse {
            trace!(%source, state = ?self.state, "ignoring datagram");
            return;
        }
        let Some(ip) = self.resolved_address else {
            return;
        };
        if !self.request_sent {
            self.stats.responses_discarded += 1;
            debug!(%source, "discarding unsolicited datagram");
            return;
        }

        let expected = SocketAddr::new(ip, self.config.port);
        let seconds = match protocol::decode_response(payload, source, expected) {
            Ok(seconds) => seconds,
            Err(e) => {
                self.stats.responses_discarded += 1;
                debug!(%source, error = %e, "discarding response");
                return;
            }
        };
        let timestamp = match calendar::ntp_seconds_to_calendar(seconds, self.config.local_offset)
        {
            Ok(timestamp) => timestamp,
            Err(e) => {
                self.stats.responses_discarded += 1;
                warn!(%source, seconds, error = %e, "discarding unconvertible timestamp");
                return;
            }
        };

        self.cancel_timers();
        self.result = Some(timestamp);
        self.state = SessionState::Completed;
        info!(
            server = %expected,
            time = %timestamp,
            requests = self.stats.request_attempts,
            "time synchronized"
        );
    }

    fn issue_lookup(&mut self) {
        self.stats.resolution_attempts += 1;
        let attempt = self.stats.resolution_attempts;
        match self.resolver.resolve(&self.config.server) {
            Lookup::Pending => {
                debug!(server = %self.config.server, attempt, "lookup queued");
            }
            Lookup::Cached(ip) => {
                debug!(server = %self.config.server, attempt, "lookup answered from cache");
                self.on_resolved(Some(ip));
            }
            Lookup::Failed => {
                warn!(server = %self.config.server, attempt, "lookup could not be started");
            }
        }
    }

    fn send_request(&mut self) {
        let Some(ip) = self.resolved_address else {
            return;
        };
        let target = SocketAddr::new(ip, self.config.port);
        self.stats.request_attempts += 1;
        let attempt = self.stats.request_attempts;
        match self.transport.send_to(&protocol::encode_request(), target) {
            Ok(()) => {
                self.request_sent = true;
                debug!(server = %target, attempt, "sent request");
            }
            Err(e) => warn!(server = %target, attempt, error = %e, "send failed, will retry"),
        }
    }

    fn cap_reached(&self, kind: TimerKind) -> bool {
        let made = match kind {
            TimerKind::Resolution => self.stats.resolution_attempts,
            TimerKind::Request => self.stats.request_attempts,
        };
        self.config.attempt_cap(kind).is_some_and(|cap| made >= cap)
    }

    fn exhaust(&mut self, kind: TimerKind) {
        let attempts = match kind {
            TimerKind::Resolution => self.stats.resolution_attempts,
            TimerKind::Request => self.stats.request_attempts,
        };
        warn!(server = %self.config.server, %kind, attempts, "giving up");
        self.cancel_timers();
        self.state = SessionState::Exhausted(kind);
    }

    fn set_timer(&mut self, kind: TimerKind, id: Option<TimerId>) {
        match kind {
            TimerKind::Resolution => self.resolution_timer = id,
            TimerKind::Request => self.request_timer = id,
        }
    }

    fn cancel_timers(&mut self) {
        if let Some(id) = self.resolution_timer.take() {
            self.scheduler.cancel(id);
        }
        if let Some(id) = self.request_timer.take() {
            self.scheduler.cancel(id);
        }
    }

    /// Cancel outstanding timers and close the transport.
    ///
    /// Idempotent; also runs on drop, so abandoning a session mid-flight
    /// releases everything it holds.
    pub fn shutdown(&mut self) {
        self.cancel_timers();
        if !self.closed {
            if !self.state.is_terminal() {
                debug!(state = ?self.state, "session abandoned");
            }
            self.transport.close();
            self.closed = true;
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether a valid reply has been committed.
    pub fn is_completed(&self) -> bool {
        self.state == SessionState::Completed
    }

    /// The synchronized time, once completed.
    pub fn result(&self) -> Option<CalendarTimestamp> {
        self.result
    }

    /// The server address, once resolved.
    pub fn resolved_address(&self) -> Option<IpAddr> {
        self.resolved_address
    }

    /// Whether a request has been transmitted to the resolved address.
    pub fn request_sent(&self) -> bool {
        self.request_sent
    }

    /// The outstanding resolution-retry timer, if any.
    pub fn resolution_timer(&self) -> Option<TimerId> {
        self.resolution_timer
    }

    /// The outstanding request-retry timer, if any.
    pub fn request_timer(&self) -> Option<TimerId> {
        self.request_timer
    }

    /// Attempt and discard counters.
    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// The session configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// The resolver collaborator.
    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// The transport collaborator.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The alarm collaborator.
    pub fn alarm(&self) -> &A {
        self.scheduler.alarm()
    }
}

impl<R: Resolver, T: Transport, A: Alarm> Drop for Session<R, T, A> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashSet, VecDeque};
    use std::time::Duration;

    #[derive(Default)]
    struct ScriptedResolver {
        answers: VecDeque<Lookup>,
        queries: Vec<String>,
    }

    impl Resolver for ScriptedResolver {
        fn resolve(&mut self, hostname: &str) -> Lookup {
            self.queries.push(hostname.to_string());
            self.answers.pop_front().unwrap_or(Lookup::Pending)
        }
    }

    #[derive(Default)]
    struct RecordingTransport {
        sent: Vec<(SocketAddr, Vec<u8>)>,
        fail_sends: bool,
        closes: u32,
    }

    impl Transport for RecordingTransport {
        fn send_to(&mut self, payload: &[u8], target: SocketAddr) -> io::Result<()> {
            if self.fail_sends {
                return Err(io::Error::new(io::ErrorKind::WouldBlock, "full"));
            }
            self.sent.push((target, payload.to_vec()));
            Ok(())
        }

        fn close(&mut self) {
            self.closes += 1;
        }
    }

    #[derive(Default)]
    struct ManualAlarm {
        next: u64,
        pending: HashSet<TimerId>,
    }

    impl Alarm for ManualAlarm {
        fn schedule(&mut self, kind: TimerKind, _delay: Duration) -> TimerId {
            self.next += 1;
            let id = TimerId::new(kind, self.next);
            self.pending.insert(id);
            id
        }

        fn cancel(&mut self, id: TimerId) -> bool {
            self.pending.remove(&id)
        }
    }

    type TestSession = Session<ScriptedResolver, RecordingTransport, ManualAlarm>;

    const SERVER_IP: [u8; 4] = [192, 0, 2, 10];

    fn server_ip() -> IpAddr {
        IpAddr::from(SERVER_IP)
    }

    fn server_addr() -> SocketAddr {
        SocketAddr::new(server_ip(), 123)
    }

    fn session_with(config: SyncConfig, answers: Vec<Lookup>) -> TestSession {
        let resolver = ScriptedResolver {
            answers: answers.into(),
            ..Default::default()
        };
        Session::new(
            config,
            resolver,
            RecordingTransport::default(),
            ManualAlarm::default(),
        )
    }

    fn session() -> TestSession {
        session_with(SyncConfig::builder().build().unwrap(), Vec::new())
    }

    fn reply(mode: u8, stratum: u8, receive: u32) -> Vec<u8> {
        let mut buf = vec![0u8; 48];
        buf[0] = (4 << 3) | mode;
        buf[1] = stratum;
        buf[40..44].copy_from_slice(&receive.to_be_bytes());
        buf
    }

    fn fire_request(s: &mut TestSession) -> SessionState {
        let id = s.request_timer().expect("request timer armed");
        s.handle(Event::TimerFired(id))
    }

    fn awaiting(s: &mut TestSession) {
        s.start();
        s.handle(Event::Resolved(Some(server_ip())));
        fire_request(s);
    }

    #[test]
    fn start_arms_resolution_timer_and_looks_up() {
        let mut s = session();
        assert_eq!(s.start(), SessionState::Resolving);
        assert!(s.resolution_timer().is_some());
        assert!(s.request_timer().is_none());
        assert_eq!(s.resolver().queries, vec!["pool.ntp.org".to_string()]);
        assert_eq!(s.stats().resolution_attempts, 1);
    }

    #[test]
    fn start_twice_is_a_no_op() {
        let mut s = session();
        s.start();
        s.start();
        assert_eq!(s.resolver().queries.len(), 1);
        assert_eq!(s.alarm().pending.len(), 1);
    }

    #[test]
    fn resolution_swaps_timers() {
        let mut s = session();
        s.start();
        let resolution = s.resolution_timer().unwrap();
        assert_eq!(
            s.handle(Event::Resolved(Some(server_ip()))),
            SessionState::AwaitingResponse
        );
        assert!(s.resolution_timer().is_none());
        assert!(!s.alarm().pending.contains(&resolution));
        let request = s.request_timer().unwrap();
        assert_eq!(request.kind(), TimerKind::Request);
        assert!(!s.request_sent());
    }

    #[test]
    fn cached_lookup_resolves_immediately() {
        let mut s = session_with(
            SyncConfig::builder().build().unwrap(),
            vec![Lookup::Cached(server_ip())],
        );
        assert_eq!(s.start(), SessionState::AwaitingResponse);
        assert!(s.resolution_timer().is_none());
        assert_eq!(s.alarm().pending.len(), 1);
    }

    #[test]
    fn failed_lookup_waits_for_timer() {
        let mut s = session();
        s.start();
        assert_eq!(s.handle(Event::Resolved(None)), SessionState::Resolving);
        let id = s.resolution_timer().unwrap();
        s.handle(Event::TimerFired(id));
        assert_eq!(s.resolver().queries.len(), 2);
        let rearmed = s.resolution_timer().unwrap();
        assert_ne!(rearmed, id);
        assert_eq!(s.alarm().pending.len(), 1);
    }

    #[test]
    fn first_request_fires_and_rearms() {
        let mut s = session();
        awaiting(&mut s);
        assert!(s.request_sent());
        assert_eq!(s.transport().sent.len(), 1);
        let (target, payload) = &s.transport().sent[0];
        assert_eq!(*target, server_addr());
        assert_eq!(payload[0], 0x1B);
        assert!(s.request_timer().is_some());
        assert_eq!(s.alarm().pending.len(), 1);
    }

    #[test]
    fn valid_reply_completes() {
        let mut s = session();
        awaiting(&mut s);
        let state = s.handle(Event::Datagram {
            source: server_addr(),
            payload: reply(4, 2, 3_913_056_000),
        });
        assert_eq!(state, SessionState::Completed);
        assert!(s.is_completed());
        let ts = s.result().unwrap();
        assert_eq!((ts.year, ts.month, ts.day), (2024, 1, 1));
        assert!(s.request_timer().is_none());
        assert!(s.alarm().pending.is_empty());
    }

    #[test]
    fn invalid_reply_keeps_waiting_without_timer_change() {
        let mut s = session();
        awaiting(&mut s);
        let timer = s.request_timer();
        for payload in [reply(3, 2, 1), reply(4, 0, 1), vec![0x24; 47]] {
            let state = s.handle(Event::Datagram {
                source: server_addr(),
                payload,
            });
            assert_eq!(state, SessionState::AwaitingResponse);
        }
        assert_eq!(s.request_timer(), timer);
        assert_eq!(s.stats().responses_discarded, 3);
        assert!(s.result().is_none());
    }

    #[test]
    fn datagram_before_first_send_is_unsolicited() {
        let mut s = session();
        s.start();
        s.handle(Event::Resolved(Some(server_ip())));
        let state = s.handle(Event::Datagram {
            source: server_addr(),
            payload: reply(4, 2, 3_913_056_000),
        });
        assert_eq!(state, SessionState::AwaitingResponse);
        assert_eq!(s.stats().responses_discarded, 1);
    }

    #[test]
    fn send_failure_is_retried_by_timer() {
        let mut s = session();
        s.start();
        s.handle(Event::Resolved(Some(server_ip())));
        s.transport.fail_sends = true;
        fire_request(&mut s);
        assert!(!s.request_sent());
        assert!(s.request_timer().is_some());
        s.transport.fail_sends = false;
        fire_request(&mut s);
        assert!(s.request_sent());
        assert_eq!(s.stats().request_attempts, 2);
    }

    #[test]
    fn stale_timer_is_ignored() {
        let mut s = session();
        s.start();
        let resolution = s.resolution_timer().unwrap();
        s.handle(Event::Resolved(Some(server_ip())));
        // The resolution timer was queued before its cancellation took effect.
        assert_eq!(
            s.handle(Event::TimerFired(resolution)),
            SessionState::AwaitingResponse
        );
        assert_eq!(s.resolver().queries.len(), 1);
        assert!(s.resolution_timer().is_none());
    }

    #[test]
    fn late_events_after_completion_change_nothing() {
        let mut s = session();
        awaiting(&mut s);
        let last_request = s.request_timer().unwrap();
        s.handle(Event::Datagram {
            source: server_addr(),
            payload: reply(4, 2, 3_913_056_000),
        });
        let result = s.result();
        let pending = s.alarm().pending.len();

        s.handle(Event::TimerFired(last_request));
        s.handle(Event::Resolved(Some(IpAddr::from([10, 0, 0, 1]))));
        s.handle(Event::Datagram {
            source: server_addr(),
            payload: reply(4, 2, 4_000_000_000),
        });

        assert_eq!(s.state(), SessionState::Completed);
        assert_eq!(s.result(), result);
        assert_eq!(s.alarm().pending.len(), pending);
        assert_eq!(s.transport().sent.len(), 1);
        assert!(s.request_timer().is_none());
    }

    #[test]
    fn resolution_cap_exhausts() {
        let config = SyncConfig::builder()
            .max_resolution_attempts(2)
            .build()
            .unwrap();
        let mut s = session_with(config, Vec::new());
        s.start();
        let id = s.resolution_timer().unwrap();
        s.handle(Event::TimerFired(id));
        let id = s.resolution_timer().unwrap();
        assert_eq!(
            s.handle(Event::TimerFired(id)),
            SessionState::Exhausted(TimerKind::Resolution)
        );
        assert_eq!(s.resolver().queries.len(), 2);
        assert!(s.alarm().pending.is_empty());
    }

    #[test]
    fn request_cap_exhausts() {
        let config = SyncConfig::builder().max_requests(1).build().unwrap();
        let mut s = session_with(config, Vec::new());
        awaiting(&mut s);
        assert_eq!(
            fire_request(&mut s),
            SessionState::Exhausted(TimerKind::Request)
        );
        assert_eq!(s.transport().sent.len(), 1);
        assert!(s.alarm().pending.is_empty());
    }

    #[test]
    fn shutdown_is_idempotent() {
        let mut s = session();
        awaiting(&mut s);
        s.shutdown();
        s.shutdown();
        assert_eq!(s.transport().closes, 1);
        assert!(s.alarm().pending.is_empty());
        assert!(s.request_timer().is_none());
    }
}
