//! Runtime side of netcam: drives a role and carries its envelopes.
//!
//! - [`drive`]: serialises timer ticks and inbound envelopes for one role
//! - [`LoopbackNetwork`]: in-process bus for tests and single-process runs
//! - [`UdpBus`]: NCAM datagrams over UDP

pub mod driver;
pub mod loopback;
pub mod udp;

pub use driver::drive;
pub use loopback::{LoopbackBus, LoopbackNetwork};
pub use udp::UdpBus;
