//! In-process bus: every attached peer gets a bounded inbox.
//!
//! Used by the tests and for running a source and a sink in one process.
//! Delivery is immediate and lossless unless an inbox is full.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use netcam_core::envelope::{PAYLOAD_CAPACITY, ROUTE_VIA_OVERLAY};
use netcam_core::{Bus, BusError, Envelope, PeerId, TimerSettings};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, trace};

#[derive(Default)]
struct Registry {
    inboxes: HashMap<PeerId, mpsc::Sender<Envelope>>,
    default_peer: Option<PeerId>,
}

/// Shared switchboard the loopback buses attach to.
#[derive(Clone, Default)]
pub struct LoopbackNetwork {
    registry: Arc<Mutex<Registry>>,
}

impl LoopbackNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Peer that receives envelopes addressed to destination 0.
    pub fn set_default_peer(&self, peer: PeerId) {
        self.lock().default_peer = Some(peer);
    }

    /// Attach `id` with an inbox of `depth` envelopes. Re-attaching an id
    /// replaces its inbox.
    pub fn attach(&self, id: PeerId, depth: usize) -> (LoopbackBus, mpsc::Receiver<Envelope>) {
        let (tx, rx) = mpsc::channel(depth.max(1));
        self.lock().inboxes.insert(id, tx);
        debug!("Loopback peer {} attached (depth {})", id, depth);
        let bus = LoopbackBus {
            id,
            registry: Arc::clone(&self.registry),
            payload_capacity: PAYLOAD_CAPACITY,
            timer: None,
            connected: true,
        };
        (bus, rx)
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        lock(&self.registry)
    }
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ── LoopbackBus ───────────────────────────────────────────────────────────────

pub struct LoopbackBus {
    id: PeerId,
    registry: Arc<Mutex<Registry>>,
    payload_capacity: usize,
    timer: Option<TimerSettings>,
    connected: bool,
}

impl LoopbackBus {
    pub fn with_timer(mut self, timer: TimerSettings) -> Self {
        self.timer = Some(timer);
        self
    }

    pub fn with_payload_capacity(mut self, capacity: usize) -> Self {
        self.payload_capacity = capacity;
        self
    }

    pub fn id(&self) -> PeerId {
        self.id
    }

    /// Simulate losing (or regaining) the connection.
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    fn resolve(&self, registry: &Registry, destination: PeerId) -> Option<PeerId> {
        match destination {
            ROUTE_VIA_OVERLAY => registry.default_peer,
            peer => Some(peer),
        }
    }
}

impl Bus for LoopbackBus {
    fn payload_capacity(&self) -> usize {
        self.payload_capacity
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    /// True when every other peer's inbox has room for `count` more.
    fn available(&self, count: usize) -> bool {
        if !self.connected {
            return false;
        }
        lock(&self.registry)
            .inboxes
            .iter()
            .filter(|(id, _)| **id != self.id)
            .all(|(_, inbox)| inbox.capacity() >= count)
    }

    fn send(&mut self, envelope: Envelope) -> Result<(), BusError> {
        if !self.connected {
            return Err(BusError::Closed);
        }
        let destination = envelope.header().destination;
        let registry = lock(&self.registry);
        let target = self
            .resolve(&registry, destination)
            .ok_or(BusError::Unreachable(destination))?;
        let inbox = registry
            .inboxes
            .get(&target)
            .ok_or(BusError::Unreachable(target))?;

        trace!("Loopback {} → {} ({:?})", self.id, target, envelope.route());
        inbox.try_send(envelope).map_err(|e| match e {
            TrySendError::Full(_) => BusError::QueueFull,
            TrySendError::Closed(_) => BusError::Unreachable(target),
        })
    }

    fn timer_settings(&self) -> Option<TimerSettings> {
        self.timer
    }
}

#[cfg(test)]
mod tests {
    use netcam_core::{Header, Route};

    use super::*;

    fn envelope(origin: PeerId, destination: PeerId) -> Envelope {
        Envelope::new(Header::for_route(Route::PairingRequest, origin, destination, 1))
    }

    #[test]
    fn delivers_to_addressed_peer() {
        let network = LoopbackNetwork::new();
        let (mut a, _rx_a) = network.attach(1, 4);
        let (_b, mut rx_b) = network.attach(2, 4);

        a.send(envelope(1, 2)).unwrap();

        let received = rx_b.try_recv().unwrap();
        assert_eq!(received.header().origin, 1);
    }

    #[test]
    fn destination_zero_uses_default_peer() {
        let network = LoopbackNetwork::new();
        let (mut a, _rx_a) = network.attach(1, 4);
        let (_b, mut rx_b) = network.attach(2, 4);

        assert_eq!(a.send(envelope(1, 0)), Err(BusError::Unreachable(0)));
        network.set_default_peer(2);
        a.send(envelope(1, 0)).unwrap();
        assert!(rx_b.try_recv().is_ok());
    }

    #[test]
    fn unknown_peer_is_unreachable() {
        let network = LoopbackNetwork::new();
        let (mut a, _rx_a) = network.attach(1, 4);
        assert_eq!(a.send(envelope(1, 9)), Err(BusError::Unreachable(9)));
    }

    #[test]
    fn full_inbox_limits_availability() {
        let network = LoopbackNetwork::new();
        let (mut a, _rx_a) = network.attach(1, 8);
        let (_b, _rx_b) = network.attach(2, 3);

        assert!(a.available(3));
        assert!(!a.available(4));
        for _ in 0..3 {
            a.send(envelope(1, 2)).unwrap();
        }
        assert!(!a.available(1));
        assert_eq!(a.send(envelope(1, 2)), Err(BusError::QueueFull));
    }

    #[test]
    fn envelopes_take_the_bus_payload_capacity() {
        let network = LoopbackNetwork::new();
        let (a, _rx_a) = network.attach(1, 4);
        assert_eq!(a.id(), 1);
        assert_eq!(a.payload_capacity(), PAYLOAD_CAPACITY);

        let a = a.with_payload_capacity(256);
        let env = a.create_envelope(Header::for_route(Route::FrameData, a.id(), 2, 1));
        assert_eq!(env.capacity(), 256);
    }

    #[test]
    fn disconnected_bus_refuses_to_send() {
        let network = LoopbackNetwork::new();
        let (mut a, _rx_a) = network.attach(1, 4);
        let (_b, mut rx_b) = network.attach(2, 4);

        a.set_connected(false);
        assert!(!a.is_connected());
        assert!(!a.available(1));
        assert_eq!(a.send(envelope(1, 2)), Err(BusError::Closed));
        assert!(rx_b.try_recv().is_err());
    }
}
