use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::envelope::{Envelope, Header, PAYLOAD_CAPACITY};
use crate::errors::{BusError, SessionError};

// MARK: - TimerSettings

/// Periodic timer driving a role: first expiry, then a fixed interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSettings {
    #[serde(alias = "expirationMs")]
    pub expiration_ms: u32,
    #[serde(alias = "intervalMs")]
    pub interval_ms: u32,
}

impl TimerSettings {
    pub fn new(expiration_ms: u32, interval_ms: u32) -> Self {
        Self { expiration_ms, interval_ms }
    }

    /// Tick interval, or `None` when no periodic timer is configured.
    pub fn interval(&self) -> Option<Duration> {
        (self.interval_ms > 0).then(|| Duration::from_millis(u64::from(self.interval_ms)))
    }

    pub fn expiration(&self) -> Duration {
        Duration::from_millis(u64::from(self.expiration_ms))
    }

    /// Ticks per second, rounded down; 0 without a timer.
    pub fn frame_rate(&self) -> u32 {
        match self.interval_ms {
            0 => 0,
            interval => 1_000 / interval,
        }
    }
}

// MARK: - Bus

/// Store-and-forward message bus a role sends through.
///
/// Delivery is unicast and best-effort: no ordering, deduplication or
/// retransmission is promised.
///
/// Implementations:
/// - `LoopbackBus`: in-process, for tests and single-process demos
/// - `UdpBus`: NCAM-framed datagrams over UDP
pub trait Bus {
    /// Payload capacity `C` of envelopes created by this bus.
    fn payload_capacity(&self) -> usize {
        PAYLOAD_CAPACITY
    }

    /// Whether the bus currently has a live connection.
    fn is_connected(&self) -> bool;

    /// Whether `count` more envelopes can be accepted right now.
    fn available(&self, count: usize) -> bool;

    /// Hand one envelope to the bus.
    fn send(&mut self, envelope: Envelope) -> Result<(), BusError>;

    /// Timer currently driving this role.
    fn timer_settings(&self) -> Option<TimerSettings>;

    /// Empty envelope sized for this bus.
    fn create_envelope(&self, header: Header) -> Envelope {
        Envelope::with_capacity(header, self.payload_capacity())
    }
}

// MARK: - Role

/// A protocol role driven by the runtime.
///
/// The runtime never calls these concurrently or reentrantly: inbound
/// envelopes and timer ticks are serialised onto one dispatch sequence.
pub trait Role {
    fn on_envelope<B: Bus>(&mut self, envelope: Envelope, bus: &mut B);

    /// Periodic tick. An `Err` ends the session.
    fn on_tick<B: Bus>(&mut self, bus: &mut B) -> Result<(), SessionError>;
}

#[cfg(test)]
mod tests {
    use super::TimerSettings;

    #[test]
    fn frame_rate_from_interval() {
        assert_eq!(TimerSettings::new(0, 100).frame_rate(), 10);
        assert_eq!(TimerSettings::new(0, 300).frame_rate(), 3);
        assert_eq!(TimerSettings::new(0, 0).frame_rate(), 0);
        assert!(TimerSettings::new(0, 0).interval().is_none());
    }
}
