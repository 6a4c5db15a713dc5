//! Device contracts the source role drives.
//!
//! Capture, location and actuation hardware live outside this crate; the
//! streamer only sees these traits. Calls are synchronous and may block.

use netcam_core::{DeviceError, Fix};

/// Most recently encoded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRef<'a> {
    pub bytes: &'a [u8],
    pub width: u32,
    pub height: u32,
}

/// Camera plus JPEG encoder.
pub trait Capture {
    /// Grab and encode a new frame at `quality` (0..=100).
    ///
    /// A failure means the device is gone; the session cannot continue.
    fn capture(&mut self, quality: u8) -> Result<(), DeviceError>;

    /// Frame produced by the last successful capture, if any.
    fn frame(&self) -> Option<FrameRef<'_>>;
}

/// Location receiver.
pub trait Telemetry {
    /// Latest fix, or `None` when no fix is available right now.
    fn read(&mut self) -> Option<Fix>;

    /// Drop the connection to the receiver until the next read.
    fn reset(&mut self);
}

/// Pan/tilt gimbal. Angles are in degrees, 0..=180 with 90 centred.
pub trait Actuator {
    fn set_pan(&mut self, degrees: u32) -> Result<(), DeviceError>;
    fn set_tilt(&mut self, degrees: u32) -> Result<(), DeviceError>;
}
