//! Envelope model shared by both roles.
//!
//! An envelope is a header plus a bounded payload. The payload capacity is
//! fixed when the envelope is created (normally by the bus) and appends past
//! it fail instead of truncating.
//!
//! # Dispatch
//!
//! ```text
//! session  command  qualifier  status     route
//! 0        0        0          REQUEST    PairingRequest   sink → source
//! 0        0        0          ACCEPTED   PairingAck       source → sink
//! 0        0        1          REQUEST    PositionRequest  sink → source
//! 1        0        0          REQUEST    FrameMetadata    source → sink
//! 1        0        1          REQUEST    FrameData        source → sink
//! ```
//!
//! Multi-byte payload fields are big-endian.

use bytes::{Buf, BufMut, BytesMut};

use crate::errors::EnvelopeError;

/// Numeric peer identifier on the bus.
pub type PeerId = u64;

/// Destination 0 lets the bus pick the route through its overlay.
pub const ROUTE_VIA_OVERLAY: PeerId = 0;

/// Default payload capacity `C` of one envelope.
pub const PAYLOAD_CAPACITY: usize = 1_024;

/// Pairing and pan/tilt control channel.
pub const SESSION_CONTROL: u8 = 0;
/// Image transfer channel.
pub const SESSION_IMAGE: u8 = 1;

// MARK: - Status

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Status {
    Rejected = 0,
    Accepted = 1,
    Request = 127,
}

impl TryFrom<u8> for Status {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Rejected),
            1 => Ok(Self::Accepted),
            127 => Ok(Self::Request),
            other => Err(other),
        }
    }
}

// MARK: - Route

/// Handler selected by the (session, command, qualifier, status) key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    PairingRequest,
    PairingAck,
    PositionRequest,
    FrameMetadata,
    FrameData,
    Unknown,
}

impl Route {
    pub fn classify(session: u8, command: u8, qualifier: u8, status: Status) -> Self {
        match (session, command, qualifier, status) {
            (SESSION_CONTROL, 0, 0, Status::Request) => Self::PairingRequest,
            (SESSION_CONTROL, 0, 0, Status::Accepted) => Self::PairingAck,
            (SESSION_CONTROL, 0, 1, Status::Request) => Self::PositionRequest,
            (SESSION_IMAGE, 0, 0, Status::Request) => Self::FrameMetadata,
            (SESSION_IMAGE, 0, 1, Status::Request) => Self::FrameData,
            _ => Self::Unknown,
        }
    }

    /// Header context `(session, command, qualifier, status)` for this route.
    ///
    /// `Unknown` maps to a rejected control context.
    pub fn context(self) -> (u8, u8, u8, Status) {
        match self {
            Self::PairingRequest => (SESSION_CONTROL, 0, 0, Status::Request),
            Self::PairingAck => (SESSION_CONTROL, 0, 0, Status::Accepted),
            Self::PositionRequest => (SESSION_CONTROL, 0, 1, Status::Request),
            Self::FrameMetadata => (SESSION_IMAGE, 0, 0, Status::Request),
            Self::FrameData => (SESSION_IMAGE, 0, 1, Status::Request),
            Self::Unknown => (SESSION_CONTROL, 0, 0, Status::Rejected),
        }
    }
}

// MARK: - Header

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub origin: PeerId,
    pub destination: PeerId,
    pub sequence: u32,
    pub session: u8,
    pub command: u8,
    pub qualifier: u8,
    pub status: Status,
}

impl Header {
    pub fn for_route(route: Route, origin: PeerId, destination: PeerId, sequence: u32) -> Self {
        let (session, command, qualifier, status) = route.context();
        Self {
            origin,
            destination,
            sequence,
            session,
            command,
            qualifier,
            status,
        }
    }

    pub fn route(&self) -> Route {
        Route::classify(self.session, self.command, self.qualifier, self.status)
    }
}

// MARK: - Envelope

#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    header: Header,
    payload: BytesMut,
    capacity: usize,
}

impl Envelope {
    /// Empty envelope with the default payload capacity.
    pub fn new(header: Header) -> Self {
        Self::with_capacity(header, PAYLOAD_CAPACITY)
    }

    pub fn with_capacity(header: Header, capacity: usize) -> Self {
        Self {
            header,
            payload: BytesMut::with_capacity(capacity),
            capacity,
        }
    }

    /// Reply addressed back to this envelope's origin.
    ///
    /// Keeps the sequence number and channel context so the requester can
    /// match the reply to its request; only origin, destination and status
    /// change. The payload starts empty.
    pub fn reply(&self, origin: PeerId, status: Status) -> Self {
        let header = Header {
            origin,
            destination: self.header.origin,
            status,
            ..self.header
        };
        Self::with_capacity(header, self.capacity)
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn header_mut(&mut self) -> &mut Header {
        &mut self.header
    }

    pub fn route(&self) -> Route {
        self.header.route()
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Free payload bytes left before the capacity is reached.
    pub fn remaining(&self) -> usize {
        self.capacity - self.payload.len()
    }

    /// Header plus payload length on the wire.
    pub fn total_length(&self) -> usize {
        crate::codec::HEADER_SIZE + self.payload.len()
    }

    // ── Writing ───────────────────────────────────────────────────────────────

    pub fn put_u32(&mut self, value: u32) -> Result<(), EnvelopeError> {
        self.reserve(4)?;
        self.payload.put_u32(value);
        Ok(())
    }

    pub fn put_f64(&mut self, value: f64) -> Result<(), EnvelopeError> {
        self.reserve(8)?;
        self.payload.put_f64(value);
        Ok(())
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) -> Result<(), EnvelopeError> {
        self.reserve(bytes.len())?;
        self.payload.put_slice(bytes);
        Ok(())
    }

    fn reserve(&self, requested: usize) -> Result<(), EnvelopeError> {
        let remaining = self.remaining();
        if requested > remaining {
            return Err(EnvelopeError::Overflow { requested, remaining });
        }
        Ok(())
    }

    // ── Reading ───────────────────────────────────────────────────────────────

    pub fn get_u32(&self, offset: usize) -> Result<u32, EnvelopeError> {
        let mut field = self.field(offset, 4)?;
        Ok(field.get_u32())
    }

    pub fn get_f64(&self, offset: usize) -> Result<f64, EnvelopeError> {
        let mut field = self.field(offset, 8)?;
        Ok(field.get_f64())
    }

    fn field(&self, offset: usize, needed: usize) -> Result<&[u8], EnvelopeError> {
        let len = self.payload.len();
        match offset.checked_add(needed) {
            Some(end) if end <= len => Ok(&self.payload[offset..end]),
            _ => Err(EnvelopeError::Truncated { offset, needed, len }),
        }
    }
}
