use thiserror::Error;

use crate::envelope::{PeerId, Route};

/// Errors raised while filling or reading an envelope payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("Payload overflow: {requested} bytes requested, {remaining} remaining")]
    Overflow { requested: usize, remaining: usize },

    #[error("Payload truncated: need {needed} bytes at offset {offset}, have {len}")]
    Truncated { offset: usize, needed: usize, len: usize },
}

/// Errors raised by the datagram codec.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Datagram too short: {len} bytes")]
    Short { len: usize },

    #[error("Bad magic: {0:#010x}")]
    BadMagic(u32),

    #[error("Length mismatch: header says {declared}, datagram has {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("Payload of {len} bytes exceeds capacity {capacity}")]
    Oversized { len: usize, capacity: usize },

    #[error("Unknown status code {0}")]
    UnknownStatus(u8),
}

/// Errors raised by the message bus when an envelope cannot be handed over.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    #[error("Destination {0} is unreachable")]
    Unreachable(PeerId),

    #[error("Outbound queue full")]
    QueueFull,

    #[error("Bus closed")]
    Closed,
}

/// Failures reported by the external devices (camera, gimbal, display).
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("Capture failed: {reason}")]
    Capture { reason: String },

    #[error("Actuator failed: {reason}")]
    Actuator { reason: String },

    #[error("Display failed: {reason}")]
    Display { reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why an inbound envelope was ignored.
///
/// Handlers never reply with these; the role logs them at `debug` and moves
/// on. They are returned so that callers (and tests) can tell a drop apart
/// from a handled envelope.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    #[error("Session {0} is not handled by this role")]
    WrongSession(u8),

    #[error("No handler for {0:?}")]
    Unrouted(Route),

    #[error("Malformed envelope: {0}")]
    Malformed(#[from] EnvelopeError),

    #[error("Origin {origin} is not the bound source {bound}")]
    UnboundSource { origin: PeerId, bound: PeerId },

    #[error("Sequence {got} does not belong to the open window {expected}")]
    SequenceMismatch { expected: u32, got: u32 },

    #[error("Chunk of {len} bytes overflows window ({accumulated}/{declared})")]
    WindowOverflow { len: usize, accumulated: usize, declared: usize },

    #[error("Stale acknowledgement from {origin} (sequence {sequence})")]
    StaleAck { origin: PeerId, sequence: u32 },

    #[error("Position ({pan}, {tilt}) out of range")]
    PositionOutOfRange { pan: u32, tilt: u32 },
}

/// Errors that end a role's session.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The capture device died; the runtime must shut the process down.
    #[error("Capture device lost, terminating session: {0}")]
    Fatal(#[source] DeviceError),
}
