//! Sink role: keeps one source paired through periodic heartbeats and
//! reassembles the frames it streams back.
//!
//! # Cycle
//!
//! ```text
//! tick ──► PairingRequest { frames }  ──────────────► source
//!      ◄── PairingAck { frame_rate [, fix] }   (origin, sequence must match)
//!      ◄── FrameMetadata { size, width, height }  finish previous, open next
//!      ◄── FrameData × ceil(size / C)             append while sequence matches
//! ```
//!
//! A change of source or frame rate resets the window, re-centres the
//! gimbal and schedules a display reinit before the next rendered frame.

use netcam_core::envelope::{SESSION_CONTROL, SESSION_IMAGE};
use netcam_core::{
    Bus, Direction, DropReason, Envelope, Header, Location, PanTilt, PeerId, Role, Route,
    Sequencer, SessionError, SinkConfig,
};
use tracing::{debug, info, warn};

use crate::control::KeyCommand;
use crate::display::{window_title, Caption, Display};
use crate::reassembly::{Opening, ReassemblyWindow};

/// The source this sink keeps asking for frames and the sequence number of
/// the last heartbeat sent to it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Heartbeat {
    pub source: PeerId,
    pub sequence: u32,
}

pub struct Viewer {
    uid: PeerId,
    config: SinkConfig,
    display: Box<dyn Display + Send>,
    heartbeat: Heartbeat,
    window: ReassemblyWindow,
    gimbal: PanTilt,
    location: Option<Location>,
    show_location: bool,
    reinit: bool,
    flow: Sequencer,
}

impl Viewer {
    pub fn new(
        uid: PeerId,
        source: PeerId,
        config: SinkConfig,
        display: Box<dyn Display + Send>,
    ) -> Self {
        debug!(
            "Viewer settings: SOURCE={}, BUFFER={}, SCALE={}",
            source, config.buffer_capacity, config.heartbeat_scale
        );
        let window = ReassemblyWindow::new(config.buffer_capacity);
        Self {
            uid,
            config,
            display,
            heartbeat: Heartbeat { source, sequence: 0 },
            window,
            gimbal: PanTilt::default(),
            location: None,
            show_location: false,
            reinit: false,
            flow: Sequencer::new(),
        }
    }

    pub fn uid(&self) -> PeerId {
        self.uid
    }

    pub fn heartbeat(&self) -> Heartbeat {
        self.heartbeat
    }

    pub fn window(&self) -> &ReassemblyWindow {
        &self.window
    }

    pub fn pan_tilt(&self) -> PanTilt {
        self.gimbal
    }

    pub fn location(&self) -> Option<Location> {
        self.location
    }

    pub fn shows_location(&self) -> bool {
        self.show_location
    }

    /// Whether the display is rebuilt before the next frame is shown.
    pub fn needs_reinit(&self) -> bool {
        self.reinit
    }

    /// Frames to ask for in the next heartbeat:
    /// `round(frame_rate × interval_ms / heartbeat_scale)`.
    pub fn requested_frames(&self, interval_ms: u32) -> u32 {
        let scale = if self.config.heartbeat_scale > 0.0 {
            self.config.heartbeat_scale
        } else {
            netcam_core::config::HEARTBEAT_SCALE
        };
        let frames = f64::from(self.window.frame_rate()) * f64::from(interval_ms) / scale;
        frames.round() as u32
    }

    // MARK: - Dispatch

    /// Handle one inbound envelope, reporting why it was dropped if it was.
    pub fn route<B: Bus>(&mut self, envelope: &Envelope, bus: &mut B) -> Result<(), DropReason> {
        match envelope.header().session {
            SESSION_CONTROL => match envelope.route() {
                Route::PairingAck => self.handle_pairing_ack(envelope),
                other => Err(DropReason::Unrouted(other)),
            },
            SESSION_IMAGE => {
                let origin = envelope.header().origin;
                let bound = self.window.source();
                if bound == 0 || origin != bound {
                    return Err(DropReason::UnboundSource { origin, bound });
                }
                match envelope.route() {
                    Route::FrameMetadata => self.handle_frame_metadata(envelope, bus),
                    Route::FrameData => self.handle_frame_data(envelope),
                    other => Err(DropReason::Unrouted(other)),
                }
            }
            other => Err(DropReason::WrongSession(other)),
        }
    }

    fn handle_pairing_ack(&mut self, ack: &Envelope) -> Result<(), DropReason> {
        let frame_rate = ack.get_u32(0)?;
        let Header { origin, sequence, .. } = *ack.header();
        if self.heartbeat.sequence == 0
            || origin != self.heartbeat.source
            || sequence != self.heartbeat.sequence
        {
            return Err(DropReason::StaleAck { origin, sequence });
        }

        if self.window.bind(origin, frame_rate) {
            info!("Source {} streaming at {} frames/s", origin, frame_rate);
            self.gimbal = PanTilt::default();
            self.reinit = true;
        }
        if let Some(location) = Location::read_from(ack) {
            debug!(
                "Source {} reported TS:{}, LAT:{}, LONG:{}",
                origin, location.timestamp, location.latitude, location.longitude
            );
            self.location = Some(location);
        }
        Ok(())
    }

    fn handle_frame_metadata<B: Bus>(
        &mut self,
        metadata: &Envelope,
        bus: &mut B,
    ) -> Result<(), DropReason> {
        let size = metadata.get_u32(0)?;
        let width = metadata.get_u32(4)?;
        let height = metadata.get_u32(8)?;

        self.process_image(bus);
        match self.window.open(size, width, height, metadata.header().sequence) {
            Opening::Invalid => debug!(
                "Invalid frame: {} bytes (capacity {}), sequence {}",
                size,
                self.window.capacity(),
                metadata.header().sequence
            ),
            Opening::Resized => self.reinit = true,
            Opening::Ready => {}
        }
        Ok(())
    }

    fn handle_frame_data(&mut self, data: &Envelope) -> Result<(), DropReason> {
        self.window.append(data.header().sequence, data.payload())
    }

    // MARK: - Rendering

    /// Show the window's frame if it is complete and not yet shown.
    fn process_image<B: Bus>(&mut self, bus: &mut B) {
        if !self.window.is_complete() {
            return;
        }
        if self.reinit && !self.reinit_display() {
            self.window.discard();
            return;
        }

        let caption = self.caption();
        let Some(frame) = self.window.take_complete() else {
            return;
        };
        match self.display.render(frame, &caption) {
            Ok(Some(key)) => self.on_key(key, bus),
            Ok(None) => {}
            Err(e) => debug!("Failed to process the image: {}", e),
        }
    }

    fn reinit_display(&mut self) -> bool {
        let (width, height) = self.window.dimensions();
        let title = window_title(self.window.source(), width, height, self.window.frame_rate());
        self.display.hide();
        match self.display.reinit(&title, width, height, self.window.frame_rate()) {
            Ok(()) => {
                self.reinit = false;
                true
            }
            Err(e) => {
                warn!("Display reinit failed, dropping frame: {}", e);
                false
            }
        }
    }

    fn caption(&self) -> Caption {
        if self.show_location {
            return Caption::Location(self.location.unwrap_or_default());
        }
        let (width, height) = self.window.dimensions();
        Caption::Stream {
            source: self.window.source(),
            frame_rate: self.window.frame_rate(),
            width,
            height,
        }
    }

    // MARK: - Control

    /// Apply a key read back from the display.
    pub fn on_key<B: Bus>(&mut self, key: char, bus: &mut B) {
        match KeyCommand::from_key(key) {
            Some(KeyCommand::Move(direction)) => {
                self.on_actuator_input(direction, bus);
            }
            Some(KeyCommand::ToggleLocation) => self.show_location = !self.show_location,
            None => {}
        }
    }

    /// Step the gimbal target and ask the source to follow.
    ///
    /// Returns `false` when the step saturates at the axis bound; nothing is
    /// sent then.
    pub fn on_actuator_input<B: Bus>(&mut self, direction: Direction, bus: &mut B) -> bool {
        if !self.gimbal.step(direction) {
            return false;
        }
        let (pan, tilt) = self.gimbal.to_wire();
        let header = Header::for_route(
            Route::PositionRequest,
            self.uid,
            self.heartbeat.source,
            self.flow.next(),
        );
        let mut request = bus.create_envelope(header);
        if let Err(e) = request.put_u32(pan).and_then(|()| request.put_u32(tilt)) {
            warn!("Position request does not fit: {}", e);
            return false;
        }
        if let Err(e) = bus.send(request) {
            warn!("Position request not sent: {}", e);
            return false;
        }
        true
    }

    fn send_heartbeat<B: Bus>(&mut self, bus: &mut B, frames: u32) {
        self.heartbeat.sequence = self.flow.next();
        let header = Header::for_route(
            Route::PairingRequest,
            self.uid,
            self.heartbeat.source,
            self.heartbeat.sequence,
        );
        let mut request = bus.create_envelope(header);
        if let Err(e) = request.put_u32(frames) {
            warn!("Heartbeat does not fit: {}", e);
            return;
        }
        if let Err(e) = bus.send(request) {
            warn!("Heartbeat to {} not sent: {}", self.heartbeat.source, e);
        }
    }
}

impl Role for Viewer {
    fn on_envelope<B: Bus>(&mut self, envelope: Envelope, bus: &mut B) {
        if let Err(reason) = self.route(&envelope, bus) {
            debug!("Dropped envelope from {}: {}", envelope.header().origin, reason);
        }
    }

    fn on_tick<B: Bus>(&mut self, bus: &mut B) -> Result<(), SessionError> {
        if !bus.is_connected() {
            self.display.hide();
            return Ok(());
        }

        let interval_ms = bus.timer_settings().map_or(0, |timer| timer.interval_ms);
        if interval_ms > 0 {
            let frames = self.window.take_frame_count();
            debug!(
                "Current frame rate: {:.2} frames/s",
                f64::from(frames) * 1_000.0 / f64::from(interval_ms)
            );
            if frames == 0 {
                self.display.hide();
            }
        }

        let frames = self.requested_frames(interval_ms);
        self.send_heartbeat(bus, frames);
        Ok(())
    }
}
