//! Source role: answers pairing requests with a frame credit and streams
//! one JPEG frame per timer tick while credit remains.
//!
//! # Frame burst
//!
//! ```text
//! tick ──► FrameMetadata { size, width, height }   session 1, qualifier 0
//!          FrameData     { bytes[0..C] }           session 1, qualifier 1
//!          FrameData     { bytes[C..2C] }
//!          …             ceil(size / C) data envelopes, one sequence number
//! ```
//!
//! Only one sink is served at a time: every accepted pairing request
//! replaces the previous peer and its credit.

use netcam_core::envelope::SESSION_CONTROL;
use netcam_core::gimbal::ACTUATOR_MAX;
use netcam_core::{
    Bus, DropReason, Envelope, Fix, Header, PeerId, Role, Route, Sequencer, SessionError,
    SourceConfig, Status,
};
use tracing::{debug, error, info, warn};

use crate::devices::{Actuator, Capture, Telemetry};

// ── PeerCredit ────────────────────────────────────────────────────────────────

/// The paired sink and how many more frames it asked for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeerCredit {
    pub id: PeerId,
    pub frames: u32,
}

impl PeerCredit {
    pub fn is_active(&self) -> bool {
        self.id != 0 && self.frames > 0
    }
}

// ── Streamer ──────────────────────────────────────────────────────────────────

pub struct Streamer {
    uid: PeerId,
    config: SourceConfig,
    camera: Box<dyn Capture + Send>,
    gps: Option<Box<dyn Telemetry + Send>>,
    gimbal: Option<Box<dyn Actuator + Send>>,
    peer: PeerCredit,
    location: Option<Fix>,
    flow: Sequencer,
}

impl Streamer {
    pub fn new(uid: PeerId, config: SourceConfig, camera: Box<dyn Capture + Send>) -> Self {
        debug!(
            "Streamer settings: JPEGQUALITY={}, GPS={}, SERVO={}",
            config.quality(),
            config.gps,
            config.servo
        );
        Self {
            uid,
            config,
            camera,
            gps: None,
            gimbal: None,
            peer: PeerCredit::default(),
            location: None,
            flow: Sequencer::new(),
        }
    }

    /// Attach a location receiver. Ignored unless `gps` is enabled.
    pub fn with_telemetry(mut self, gps: Box<dyn Telemetry + Send>) -> Self {
        if self.config.gps {
            self.gps = Some(gps);
        }
        self
    }

    /// Attach a gimbal. Ignored unless `servo` is enabled.
    pub fn with_actuator(mut self, gimbal: Box<dyn Actuator + Send>) -> Self {
        if self.config.servo {
            self.gimbal = Some(gimbal);
        }
        self
    }

    pub fn uid(&self) -> PeerId {
        self.uid
    }

    pub fn peer(&self) -> PeerCredit {
        self.peer
    }

    /// Fix waiting to be piggybacked on the next acknowledgement.
    pub fn location(&self) -> Option<Fix> {
        self.location
    }

    pub fn has_actuator(&self) -> bool {
        self.gimbal.is_some()
    }

    // ── Dispatch ──────────────────────────────────────────────────────────────

    /// Handle one inbound envelope, reporting why it was dropped if it was.
    pub fn route<B: Bus>(&mut self, envelope: &Envelope, bus: &mut B) -> Result<(), DropReason> {
        let session = envelope.header().session;
        if session != SESSION_CONTROL {
            return Err(DropReason::WrongSession(session));
        }
        match envelope.route() {
            Route::PairingRequest => self.handle_pairing_request(envelope, bus),
            Route::PositionRequest => self.handle_position_request(envelope),
            other => Err(DropReason::Unrouted(other)),
        }
    }

    fn handle_pairing_request<B: Bus>(
        &mut self,
        request: &Envelope,
        bus: &mut B,
    ) -> Result<(), DropReason> {
        let frames = request.get_u32(0)?;
        self.peer = PeerCredit {
            id: request.header().origin,
            frames,
        };
        debug!("Node {} requested {} jpeg frames", self.peer.id, frames);

        let frame_rate = bus.timer_settings().map_or(0, |timer| timer.frame_rate());
        let mut ack = request.reply(self.uid, Status::Accepted);
        ack.put_u32(frame_rate)?;

        let with_fix = match self.location {
            Some(fix) if fix.is_locked() => fix.write_to(&mut ack).is_ok(),
            _ => false,
        };

        match bus.send(ack) {
            Ok(()) => {
                if with_fix {
                    self.location = None;
                }
            }
            Err(e) => warn!("Pairing ack to {} not sent: {}", self.peer.id, e),
        }
        Ok(())
    }

    fn handle_position_request(&mut self, request: &Envelope) -> Result<(), DropReason> {
        let pan = request.get_u32(0)?;
        let tilt = request.get_u32(4)?;
        debug!("PAN: {}, TILT: {}", pan, tilt);

        if pan > ACTUATOR_MAX || tilt > ACTUATOR_MAX {
            return Err(DropReason::PositionOutOfRange { pan, tilt });
        }
        let Some(gimbal) = self.gimbal.as_mut() else {
            return Ok(());
        };
        if let Err(e) = gimbal.set_pan(pan).and_then(|()| gimbal.set_tilt(tilt)) {
            warn!("Gimbal failed, disabling pan/tilt for this session: {}", e);
            self.gimbal = None;
        }
        Ok(())
    }

    // ── Streaming ─────────────────────────────────────────────────────────────

    /// Send the last captured frame to the paired peer.
    ///
    /// Returns `false` (credit untouched) when there is nothing to send or
    /// the bus cannot take the whole burst right now. Once the metadata is
    /// out the frame counts against the credit, even if a later chunk fails
    /// to send and `false` is returned.
    pub fn send_image<B: Bus>(&mut self, bus: &mut B) -> bool {
        let Some(frame) = self.camera.frame() else {
            return false;
        };
        let capacity = bus.payload_capacity();
        let Ok(size) = u32::try_from(frame.bytes.len()) else {
            warn!("Frame of {} bytes cannot be described", frame.bytes.len());
            return false;
        };
        if capacity == 0 {
            return false;
        }
        let count = frame.bytes.len().div_ceil(capacity);
        if count == 0 || !bus.available(count + 1) {
            debug!("Skipping frame: {} envelopes not available", count + 1);
            return false;
        }

        let sequence = self.flow.next();
        let header = Header::for_route(Route::FrameMetadata, self.uid, self.peer.id, sequence);
        let mut metadata = bus.create_envelope(header);
        let described = metadata
            .put_u32(size)
            .and_then(|()| metadata.put_u32(frame.width))
            .and_then(|()| metadata.put_u32(frame.height));
        if let Err(e) = described {
            warn!("Frame metadata does not fit: {}", e);
            return false;
        }
        if let Err(e) = bus.send(metadata) {
            warn!("Frame {} metadata not sent: {}", sequence, e);
            return false;
        }
        self.peer.frames = self.peer.frames.saturating_sub(1);

        let header = Header::for_route(Route::FrameData, self.uid, self.peer.id, sequence);
        for (index, chunk) in frame.bytes.chunks(capacity).enumerate() {
            let mut data = bus.create_envelope(header);
            if let Err(e) = data.put_bytes(chunk) {
                warn!("Frame {} chunk {} does not fit: {}", sequence, index, e);
                return false;
            }
            if let Err(e) = bus.send(data) {
                warn!("Frame {} chunk {}/{} not sent: {}", sequence, index + 1, count, e);
                return false;
            }
        }

        debug!(
            "Sent frame seq={} chunks={} bytes={} credit={}",
            sequence, count, size, self.peer.frames
        );
        true
    }

    fn update_geo_location(&mut self) {
        if let Some(fix) = self.gps.as_mut().and_then(|gps| gps.read()) {
            self.location = Some(fix);
        }
    }

    fn reset_gps(&mut self) {
        if let Some(gps) = self.gps.as_mut() {
            gps.reset();
        }
        self.location = None;
    }
}

impl Role for Streamer {
    fn on_envelope<B: Bus>(&mut self, envelope: Envelope, bus: &mut B) {
        if let Err(reason) = self.route(&envelope, bus) {
            debug!("Dropped envelope from {}: {}", envelope.header().origin, reason);
        }
    }

    fn on_tick<B: Bus>(&mut self, bus: &mut B) -> Result<(), SessionError> {
        if !(bus.is_connected() && self.peer.is_active()) {
            self.reset_gps();
            return Ok(());
        }

        // send first: keeps emission aligned with the tick
        self.send_image(bus);
        if let Err(e) = self.camera.capture(self.config.quality()) {
            error!("Capture device not ready: {}", e);
            return Err(SessionError::Fatal(e));
        }
        self.update_geo_location();
        if self.peer.frames == 0 {
            info!("Credit for {} exhausted", self.peer.id);
        }
        Ok(())
    }
}
