//! Location fixes piggybacked on pairing acknowledgements.
//!
//! # Acknowledgement payload
//!
//! ```text
//! [0..4]    frame_rate  u32  always present
//! [4..8]    mode        u32  2 = 2D fix, 3 = 3D fix
//! [8..16]   timestamp   f64  unix seconds
//! [16..24]  latitude    f64
//! [24..32]  longitude   f64
//! [32..40]  altitude    f64  metres above mean sea level
//! [40..48]  speed       f64  metres / second
//! [48..56]  heading     f64  degrees from true north
//! [56..64]  climb       f64  metres / second
//! ```

use chrono::DateTime;
use serde::{Deserialize, Serialize};

use crate::envelope::Envelope;
use crate::errors::EnvelopeError;

pub const MODE_2D: u32 = 2;
pub const MODE_3D: u32 = 3;

/// Bytes taken by the telemetry block (mode + seven doubles).
pub const FIX_WIRE_LEN: usize = 4 + 7 * 8;

/// Payload offset of the telemetry block inside an acknowledgement.
pub const FIX_OFFSET: usize = 4;

// MARK: - Fix

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Fix {
    pub mode: u32,
    pub timestamp: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub speed: f64,
    pub heading: f64,
    pub climb: f64,
}

impl Fix {
    /// Whether the receiver had a 2D or 3D lock.
    pub fn is_locked(&self) -> bool {
        self.mode == MODE_2D || self.mode == MODE_3D
    }

    /// Replace non-finite readings with 0.0.
    pub fn sanitized(mut self) -> Self {
        for value in [
            &mut self.timestamp,
            &mut self.latitude,
            &mut self.longitude,
            &mut self.altitude,
            &mut self.speed,
            &mut self.heading,
            &mut self.climb,
        ] {
            if !value.is_finite() {
                *value = 0.0;
            }
        }
        self
    }

    /// Append the telemetry block; writes nothing unless all of it fits.
    pub fn write_to(&self, envelope: &mut Envelope) -> Result<(), EnvelopeError> {
        let remaining = envelope.remaining();
        if remaining < FIX_WIRE_LEN {
            return Err(EnvelopeError::Overflow {
                requested: FIX_WIRE_LEN,
                remaining,
            });
        }
        envelope.put_u32(self.mode)?;
        for value in [
            self.timestamp,
            self.latitude,
            self.longitude,
            self.altitude,
            self.speed,
            self.heading,
            self.climb,
        ] {
            envelope.put_f64(value)?;
        }
        Ok(())
    }
}

// MARK: - Location

/// The subset of a fix the sink keeps for its overlay.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Location {
    pub timestamp: f64,
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    /// Read the geodetic fields from an acknowledgement, if it carries the
    /// full telemetry block.
    pub fn read_from(envelope: &Envelope) -> Option<Self> {
        if envelope.payload_len() < FIX_OFFSET + FIX_WIRE_LEN {
            return None;
        }
        Some(Self {
            timestamp: envelope.get_f64(8).ok()?,
            latitude: envelope.get_f64(16).ok()?,
            longitude: envelope.get_f64(24).ok()?,
        })
    }
}

// MARK: - Timestamps

/// Render unix seconds as `YYYY-MM-DDTHH:MM:SS.mmmZ`.
///
/// Non-finite or unrepresentable input renders as `NaN`.
pub fn format_iso8601(unix_seconds: f64) -> String {
    if !unix_seconds.is_finite() {
        return "NaN".to_owned();
    }
    let mut secs = unix_seconds.floor();
    let mut fractional = unix_seconds - secs;
    if fractional > 0.999_499_999 {
        // would print as .1000 otherwise
        secs += 1.0;
        fractional = 0.0;
    }
    let millis = ((fractional * 1_000.0).round() as u32).min(999);

    match DateTime::from_timestamp(secs as i64, millis * 1_000_000) {
        Some(time) => time.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
        None => "NaN".to_owned(),
    }
}
