// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Tokio implementations of the session collaborators.
//!
//! Every collaborator reports back through one unbounded channel of
//! [`Event`]s, and [`drive`] is the only consumer: it pulls events off the
//! channel and hands them to [`Session::handle`] one at a time. Spawned tasks
//! never touch session state directly.
//!
//! # Runtime Requirements
//!
//! Everything here spawns tasks, so it must run inside a Tokio runtime.
//! [`crate::synchronize_time`] builds a current-thread runtime for callers
//! that do not have one.

use std::collections::HashMap;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::calendar::CalendarTimestamp;
use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::scheduler::{Alarm, TimerId, TimerKind};
use crate::session::{Event, Lookup, Resolver, Session, SessionState, Transport};

/// Receive buffer size. Anything longer than a reply is rejected on length
/// anyway, so truncation is harmless.
const RECV_BUFFER_LEN: usize = 1024;

/// A session wired to the tokio collaborators.
pub type TokioSession = Session<TokioResolver, TokioTransport, TokioAlarm>;

/// Open the datagram endpoint and build a session around it.
///
/// Returns the session and the receiving end of its event channel, ready for
/// [`drive`].
///
/// # Errors
///
/// Returns [`SyncError::Transport`] if the endpoint cannot be bound.
pub async fn open(
    config: SyncConfig,
) -> Result<(TokioSession, UnboundedReceiver<Event>), SyncError> {
    let (tx, rx) = mpsc::unbounded_channel();
    let transport = TokioTransport::open(config.bind, tx.clone())
        .await
        .map_err(SyncError::Transport)?;
    let resolver = TokioResolver::new(tx.clone(), config.bind);
    let alarm = TokioAlarm::new(tx);
    Ok((Session::new(config, resolver, transport, alarm), rx))
}

/// Start `session` and feed it events until it reaches a terminal state.
///
/// # Errors
///
/// Returns [`SyncError::Exhausted`] when an attempt cap runs out and
/// [`SyncError::Abandoned`] if every event sender is dropped first.
pub async fn drive<R, T, A>(
    session: &mut Session<R, T, A>,
    events: &mut UnboundedReceiver<Event>,
) -> Result<CalendarTimestamp, SyncError>
where
    R: Resolver,
    T: Transport,
    A: Alarm,
{
    session.start();
    loop {
        match session.state() {
            SessionState::Completed => return session.result().ok_or(SyncError::Abandoned),
            SessionState::Exhausted(kind) => {
                let stats = session.stats();
                let attempts = match kind {
                    TimerKind::Resolution => stats.resolution_attempts,
                    TimerKind::Request => stats.request_attempts,
                };
                return Err(SyncError::Exhausted { kind, attempts });
            }
            _ => {}
        }
        let Some(event) = events.recv().await else {
            return Err(SyncError::Abandoned);
        };
        trace!(?event, "dispatching");
        session.handle(event);
    }
}

/// Resolves hostnames with [`tokio::net::lookup_host`].
///
/// IP literals are answered immediately. At most one lookup runs at a time;
/// a retry while the previous lookup is still running just waits for it.
#[derive(Debug)]
pub struct TokioResolver {
    events: UnboundedSender<Event>,
    want_ipv4: bool,
    in_flight: Option<JoinHandle<()>>,
}

impl TokioResolver {
    /// Create a resolver that only returns addresses usable from `bind`.
    pub fn new(events: UnboundedSender<Event>, bind: SocketAddr) -> Self {
        TokioResolver {
            events,
            want_ipv4: bind.is_ipv4(),
            in_flight: None,
        }
    }
}

impl Resolver for TokioResolver {
    fn resolve(&mut self, hostname: &str) -> Lookup {
        if let Ok(ip) = hostname.parse::<IpAddr>() {
            return Lookup::Cached(ip);
        }
        if let Some(handle) = &self.in_flight
            && !handle.is_finished()
        {
            trace!(server = hostname, "lookup already in flight");
            return Lookup::Pending;
        }

        let events = self.events.clone();
        let host = hostname.to_string();
        let want_ipv4 = self.want_ipv4;
        self.in_flight = Some(tokio::spawn(async move {
            let address = match tokio::net::lookup_host((host.as_str(), 0)).await {
                Ok(addrs) => addrs
                    .map(|addr| addr.ip())
                    .find(|ip| ip.is_ipv4() == want_ipv4),
                Err(e) => {
                    debug!(server = %host, error = %e, "lookup failed");
                    None
                }
            };
            // The session may already be gone.
            let _ = events.send(Event::Resolved(address));
        }));
        Lookup::Pending
    }
}

impl Drop for TokioResolver {
    fn drop(&mut self) {
        if let Some(handle) = self.in_flight.take() {
            handle.abort();
        }
    }
}

/// A UDP endpoint with a background receive task.
#[derive(Debug)]
pub struct TokioTransport {
    socket: Arc<UdpSocket>,
    recv_task: Option<JoinHandle<()>>,
}

impl TokioTransport {
    /// Bind to `bind` and start forwarding received datagrams to `events`.
    pub async fn open(bind: SocketAddr, events: UnboundedSender<Event>) -> io::Result<Self> {
        let socket = Arc::new(UdpSocket::bind(bind).await?);
        debug!(local = ?socket.local_addr(), "bound datagram endpoint");
        let reader = Arc::clone(&socket);
        let recv_task = tokio::spawn(async move {
            let mut buf = [0u8; RECV_BUFFER_LEN];
            loop {
                match reader.recv_from(&mut buf).await {
                    Ok((len, source)) => {
                        trace!(%source, len, "received datagram");
                        let event = Event::Datagram {
                            source,
                            payload: buf[..len].to_vec(),
                        };
                        if events.send(event).is_err() {
                            break;
                        }
                    }
                    // ICMP errors from earlier sends surface here on some
                    // platforms; the socket is still usable.
                    Err(e) => warn!(error = %e, "receive failed"),
                }
            }
        });
        Ok(TokioTransport {
            socket,
            recv_task: Some(recv_task),
        })
    }

    /// The bound local address.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

impl Transport for TokioTransport {
    fn send_to(&mut self, payload: &[u8], target: SocketAddr) -> io::Result<()> {
        let sent = self.socket.try_send_to(payload, target)?;
        if sent != payload.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("short send: {sent} of {} bytes", payload.len()),
            ));
        }
        Ok(())
    }

    fn close(&mut self) {
        if let Some(task) = self.recv_task.take() {
            task.abort();
            debug!("closed datagram endpoint");
        }
    }
}

impl Drop for TokioTransport {
    fn drop(&mut self) {
        self.close();
    }
}

/// One-shot timers backed by `tokio::time::sleep` tasks.
#[derive(Debug)]
pub struct TokioAlarm {
    events: UnboundedSender<Event>,
    next: u64,
    pending: HashMap<TimerId, JoinHandle<()>>,
}

impl TokioAlarm {
    /// Create an alarm that delivers firings to `events`.
    pub fn new(events: UnboundedSender<Event>) -> Self {
        TokioAlarm {
            events,
            next: 0,
            pending: HashMap::new(),
        }
    }

    /// Timers scheduled and not yet finished or cancelled.
    pub fn pending(&self) -> usize {
        self.pending.values().filter(|h| !h.is_finished()).count()
    }
}

impl Alarm for TokioAlarm {
    fn schedule(&mut self, kind: TimerKind, delay: Duration) -> TimerId {
        self.next += 1;
        let id = TimerId::new(kind, self.next);
        self.pending.retain(|_, handle| !handle.is_finished());

        let events = self.events.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(Event::TimerFired(id));
        });
        self.pending.insert(id, handle);
        id
    }

    fn cancel(&mut self, id: TimerId) -> bool {
        match self.pending.remove(&id) {
            Some(handle) => {
                let live = !handle.is_finished();
                handle.abort();
                live
            }
            None => false,
        }
    }
}

impl Drop for TokioAlarm {
    fn drop(&mut self) {
        for (_, handle) in self.pending.drain() {
            handle.abort();
        }
    }
}
