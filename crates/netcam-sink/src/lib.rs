//! Display side of the netcam protocol.
//!
//! [`Viewer`] is the sink role: every timer tick it sends a heartbeat asking
//! its source for more frames, and it rebuilds each frame from the chunks the
//! source streams back in a bounded [`ReassemblyWindow`]. Frames are shown
//! through the [`Display`] trait.

pub mod control;
pub mod display;
pub mod reassembly;
pub mod viewer;

pub use control::KeyCommand;
pub use display::{window_title, Caption, Display};
pub use reassembly::{FrameView, Opening, ReassemblyWindow};
pub use viewer::{Heartbeat, Viewer};
