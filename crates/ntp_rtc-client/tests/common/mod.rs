// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Shared helpers for integration tests.

// Integration test helpers are `pub` so each `tests/*.rs` file can import them
// via `mod common`, but not every file uses every helper.
#![allow(unreachable_pub, dead_code)]

use std::collections::{HashSet, VecDeque};
use std::io;
use std::net::{IpAddr, SocketAddr, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use ntp_rtc_client::config::SyncConfig;
use ntp_rtc_client::scheduler::{Alarm, TimerId, TimerKind};
use ntp_rtc_client::session::{Lookup, Resolver, Session, Transport};

/// 2024-01-01 00:00:00 UTC in NTP seconds.
pub const NTP_2024: u32 = 3_913_056_000;

pub const SERVER_IP: [u8; 4] = [192, 0, 2, 10];

pub fn server_ip() -> IpAddr {
    IpAddr::from(SERVER_IP)
}

pub fn server_addr() -> SocketAddr {
    SocketAddr::new(server_ip(), 123)
}

/// A 48-byte reply with VN=4 and the given mode, stratum, and receive seconds.
pub fn reply(mode: u8, stratum: u8, receive_seconds: u32) -> Vec<u8> {
    let mut buf = vec![0u8; 48];
    buf[0] = (4 << 3) | (mode & 0b111);
    buf[1] = stratum;
    buf[40..44].copy_from_slice(&receive_seconds.to_be_bytes());
    buf
}

/// Resolver that answers from a script, then reports `Pending` forever.
#[derive(Default)]
pub struct FakeResolver {
    pub answers: VecDeque<Lookup>,
    pub queries: Vec<String>,
}

impl Resolver for FakeResolver {
    fn resolve(&mut self, hostname: &str) -> Lookup {
        self.queries.push(hostname.to_string());
        self.answers.pop_front().unwrap_or(Lookup::Pending)
    }
}

/// Transport that records sends.
#[derive(Default)]
pub struct FakeTransport {
    pub sent: Vec<(SocketAddr, Vec<u8>)>,
    pub closes: u32,
}

impl Transport for FakeTransport {
    fn send_to(&mut self, payload: &[u8], target: SocketAddr) -> io::Result<()> {
        self.sent.push((target, payload.to_vec()));
        Ok(())
    }

    fn close(&mut self) {
        self.closes += 1;
    }
}

/// Alarm that only tracks which timers are pending; tests fire them by hand.
#[derive(Default)]
pub struct FakeAlarm {
    next: u64,
    pub pending: HashSet<TimerId>,
    pub scheduled: Vec<(TimerId, Duration)>,
}

impl FakeAlarm {
    pub fn pending_of(&self, kind: TimerKind) -> usize {
        self.pending.iter().filter(|id| id.kind() == kind).count()
    }
}

impl Alarm for FakeAlarm {
    fn schedule(&mut self, kind: TimerKind, delay: Duration) -> TimerId {
        self.next += 1;
        let id = TimerId::new(kind, self.next);
        self.pending.insert(id);
        self.scheduled.push((id, delay));
        id
    }

    fn cancel(&mut self, id: TimerId) -> bool {
        self.pending.remove(&id)
    }
}

pub type FakeSession = Session<FakeResolver, FakeTransport, FakeAlarm>;

pub fn fake_session(config: SyncConfig, answers: Vec<Lookup>) -> FakeSession {
    let resolver = FakeResolver {
        answers: answers.into(),
        ..Default::default()
    };
    Session::new(
        config,
        resolver,
        FakeTransport::default(),
        FakeAlarm::default(),
    )
}

/// An NTP server on loopback, answering on a background thread.
///
/// Ignores the first `ignore_first` requests, then answers every client
/// request with a valid stratum-2 reply carrying `receive_seconds`.
pub struct Responder {
    pub addr: SocketAddr,
    requests: Arc<AtomicUsize>,
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Responder {
    pub fn start(receive_seconds: u32, ignore_first: usize) -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").expect("bind responder");
        socket
            .set_read_timeout(Some(Duration::from_millis(20)))
            .expect("set read timeout");
        let addr = socket.local_addr().expect("responder address");
        let requests = Arc::new(AtomicUsize::new(0));
        let stop = Arc::new(AtomicBool::new(false));

        let handle = {
            let requests = Arc::clone(&requests);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let mut buf = [0u8; 1024];
                while !stop.load(Ordering::Relaxed) {
                    let Ok((len, peer)) = socket.recv_from(&mut buf) else {
                        continue;
                    };
                    if len != 48 || buf[0] & 0b111 != 3 {
                        continue;
                    }
                    let seen = requests.fetch_add(1, Ordering::SeqCst) + 1;
                    if seen > ignore_first {
                        let _ = socket.send_to(&reply(4, 2, receive_seconds), peer);
                    }
                }
            })
        };

        Responder {
            addr,
            requests,
            stop,
            handle: Some(handle),
        }
    }

    /// A responder that never answers.
    pub fn silent() -> Self {
        Self::start(0, usize::MAX)
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Configuration pointing at this responder with short retries.
    pub fn config(&self) -> ntp_rtc_client::config::SyncConfigBuilder {
        SyncConfig::builder()
            .server(self.addr.ip().to_string())
            .port(self.addr.port())
            .bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .retry_interval(Duration::from_millis(50))
    }
}

impl Drop for Responder {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
