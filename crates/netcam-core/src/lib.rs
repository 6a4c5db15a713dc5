pub mod bus;
pub mod codec;
pub mod config;
pub mod envelope;
pub mod errors;
pub mod gimbal;
pub mod sequence;
pub mod telemetry;

pub use bus::{Bus, Role, TimerSettings};
pub use config::{NetcamConfig, SinkConfig, SourceConfig};
pub use envelope::{Envelope, Header, PeerId, Route, Status};
pub use errors::{BusError, CodecError, DeviceError, DropReason, EnvelopeError, SessionError};
pub use gimbal::{Direction, PanTilt};
pub use sequence::Sequencer;
pub use telemetry::{Fix, Location};
