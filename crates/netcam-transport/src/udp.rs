//! NCAM-framed envelopes over UDP.
//!
//! # Tasks
//!
//! ```text
//! send() ──► outbound queue (queue_depth) ──► writer task ──► socket
//! socket ──► reader task ──► codec::decode ──► inbound channel ──► driver
//! ```
//!
//! Destination 0, and any peer without a known address, goes to the hub.
//! The reader learns the address of every peer it hears from, so replies
//! find their way back without a static route. A learned address follows
//! the peer when it reappears on another port; configured routes stay put.
//!
//! A failed `send_to` is logged and the datagram is lost, as with any other
//! UDP loss. The bus reports itself connected for as long as its writer task
//! runs, so roles keep heartbeating through transient send errors.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{bail, Context};
use bytes::Bytes;
use netcam_core::codec::{self, HEADER_SIZE};
use netcam_core::envelope::ROUTE_VIA_OVERLAY;
use netcam_core::{Bus, BusError, Envelope, NetcamConfig, PeerId, TimerSettings};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Largest payload the 16-bit length field can describe.
pub const MAX_PAYLOAD_CAPACITY: usize = u16::MAX as usize - HEADER_SIZE;

/// First pause after a failed `recv_from`; doubles per consecutive failure.
const RECV_BACKOFF_MIN: Duration = Duration::from_millis(10);
const RECV_BACKOFF_MAX: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PeerRoute {
    addr: SocketAddr,
    /// Configured or added explicitly; never replaced by a learned address.
    pinned: bool,
}

type Routes = Arc<Mutex<HashMap<PeerId, PeerRoute>>>;

pub struct UdpBus {
    local_addr: SocketAddr,
    outbound: mpsc::Sender<(SocketAddr, Bytes)>,
    routes: Routes,
    hub: Option<SocketAddr>,
    payload_capacity: usize,
    timer: Option<TimerSettings>,
    connected: Arc<AtomicBool>,
    tasks: Vec<JoinHandle<()>>,
}

impl UdpBus {
    /// Bind the local socket and start the reader and writer tasks.
    ///
    /// Returns the bus and the channel decoded inbound envelopes arrive on.
    pub async fn bind(
        config: &NetcamConfig,
        timer: TimerSettings,
    ) -> anyhow::Result<(Self, mpsc::Receiver<Envelope>)> {
        if config.payload_capacity == 0 || config.payload_capacity > MAX_PAYLOAD_CAPACITY {
            bail!(
                "payload capacity {} outside 1..={}",
                config.payload_capacity,
                MAX_PAYLOAD_CAPACITY
            );
        }
        let hub = match config.hub.as_deref() {
            Some(addr) => Some(
                addr.parse::<SocketAddr>()
                    .with_context(|| format!("Parsing hub address {addr}"))?,
            ),
            None => None,
        };
        let mut table = HashMap::with_capacity(config.peers.len());
        for (id, addr) in &config.peers {
            let addr: SocketAddr = addr
                .parse()
                .with_context(|| format!("Parsing address {addr} of peer {id}"))?;
            table.insert(*id, PeerRoute { addr, pinned: true });
        }

        let socket = UdpSocket::bind(config.bind.as_str())
            .await
            .with_context(|| format!("Binding UDP socket {}", config.bind))?;
        let local_addr = socket.local_addr().context("Reading local address")?;
        let socket = Arc::new(socket);
        info!("UDP bus listening on {}", local_addr);

        let depth = config.queue_depth.max(1);
        let (outbound, outbound_rx) = mpsc::channel(depth);
        let (inbound_tx, inbound) = mpsc::channel(depth);
        let routes: Routes = Arc::new(Mutex::new(table));
        let connected = Arc::new(AtomicBool::new(true));

        let writer = tokio::spawn(write_loop(
            Arc::clone(&socket),
            outbound_rx,
            Arc::clone(&connected),
        ));
        let reader = tokio::spawn(read_loop(
            socket,
            inbound_tx,
            Arc::clone(&routes),
            config.payload_capacity,
        ));

        let bus = Self {
            local_addr,
            outbound,
            routes,
            hub,
            payload_capacity: config.payload_capacity,
            timer: Some(timer),
            connected,
            tasks: vec![writer, reader],
        };
        Ok((bus, inbound))
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Add or replace the address of `peer`. Learned addresses never
    /// override it.
    pub fn add_route(&self, peer: PeerId, addr: SocketAddr) {
        lock(&self.routes).insert(peer, PeerRoute { addr, pinned: true });
    }

    fn resolve(&self, destination: PeerId) -> Option<SocketAddr> {
        if destination == ROUTE_VIA_OVERLAY {
            return self.hub;
        }
        lock(&self.routes)
            .get(&destination)
            .map(|route| route.addr)
            .or(self.hub)
    }
}

impl Drop for UdpBus {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

impl Bus for UdpBus {
    fn payload_capacity(&self) -> usize {
        self.payload_capacity
    }

    /// True while the writer task is running.
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Free slots in the outbound queue.
    fn available(&self, count: usize) -> bool {
        self.outbound.capacity() >= count
    }

    fn send(&mut self, envelope: Envelope) -> Result<(), BusError> {
        let destination = envelope.header().destination;
        let addr = self
            .resolve(destination)
            .ok_or(BusError::Unreachable(destination))?;
        self.outbound
            .try_send((addr, codec::encode(&envelope)))
            .map_err(|e| match e {
                TrySendError::Full(_) => BusError::QueueFull,
                TrySendError::Closed(_) => BusError::Closed,
            })
    }

    fn timer_settings(&self) -> Option<TimerSettings> {
        self.timer
    }
}

fn lock(routes: &Routes) -> MutexGuard<'_, HashMap<PeerId, PeerRoute>> {
    routes.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ── Tasks ─────────────────────────────────────────────────────────────────────

async fn write_loop(
    socket: Arc<UdpSocket>,
    mut outbound: mpsc::Receiver<(SocketAddr, Bytes)>,
    connected: Arc<AtomicBool>,
) {
    let mut errors: u64 = 0;
    let mut failing = false;
    while let Some((addr, datagram)) = outbound.recv().await {
        match socket.send_to(&datagram, addr).await {
            Ok(_) => {
                if failing {
                    failing = false;
                    info!("UDP send to {} recovered", addr);
                }
            }
            Err(e) => {
                errors += 1;
                if !failing {
                    failing = true;
                    warn!("UDP send to {} failed: {}", addr, e);
                }
                debug!("UDP send errors: {}", errors);
            }
        }
    }
    connected.store(false, Ordering::Relaxed);
    debug!("UDP writer exiting");
}

/// Pause before retrying after `failures` consecutive receive errors.
fn recv_backoff(failures: u32) -> Duration {
    let doublings = failures.saturating_sub(1).min(16);
    RECV_BACKOFF_MIN
        .saturating_mul(1_u32 << doublings)
        .min(RECV_BACKOFF_MAX)
}

/// Remember where `origin` was last heard from unless its route is pinned.
fn learn_route(routes: &Routes, origin: PeerId, from: SocketAddr) {
    let mut routes = lock(routes);
    match routes.get(&origin) {
        Some(route) if route.pinned || route.addr == from => {}
        _ => {
            debug!("Peer {} reachable at {}", origin, from);
            routes.insert(origin, PeerRoute { addr: from, pinned: false });
        }
    }
}

async fn read_loop(
    socket: Arc<UdpSocket>,
    inbound: mpsc::Sender<Envelope>,
    routes: Routes,
    capacity: usize,
) {
    let mut buf = vec![0u8; HEADER_SIZE + capacity];
    let mut failures: u32 = 0;
    loop {
        let (len, from) = match socket.recv_from(&mut buf).await {
            Ok(received) => {
                failures = 0;
                received
            }
            Err(e) => {
                // ICMP port-unreachable surfaces here on some platforms
                failures = failures.saturating_add(1);
                if failures == 1 {
                    debug!("UDP recv error: {}", e);
                } else {
                    trace!("UDP recv error ({} in a row): {}", failures, e);
                }
                tokio::time::sleep(recv_backoff(failures)).await;
                continue;
            }
        };
        let envelope = match codec::decode(&buf[..len], capacity) {
            Ok(envelope) => envelope,
            Err(e) => {
                trace!("Dropping datagram from {}: {}", from, e);
                continue;
            }
        };

        let origin = envelope.header().origin;
        if origin != ROUTE_VIA_OVERLAY {
            learn_route(&routes, origin, from);
        }
        if inbound.send(envelope).await.is_err() {
            debug!("UDP reader exiting: inbound closed");
            return;
        }
    }
}
