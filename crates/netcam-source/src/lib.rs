//! Capture side of the netcam protocol.
//!
//! [`Streamer`] is the source role: a sink pairs with it by requesting a
//! number of frames, and each timer tick sends one JPEG frame until that
//! credit is spent. The capture, location and gimbal hardware are reached
//! through the traits in [`devices`].

pub mod devices;
pub mod gimbal;
pub mod streamer;

pub use devices::{Actuator, Capture, FrameRef, Telemetry};
pub use gimbal::{PwmOutput, ServoGimbal};
pub use streamer::{PeerCredit, Streamer};
