//! Canonical data model and protocol normalization for MMDVM telemetry.
//!
//! Everything in this crate is pure: no I/O, no shared state. The engine
//! crate feeds normalized output into session tracking and fanout.

pub mod errors;
pub mod format;
pub mod normalize;
pub mod packet;
pub mod status;

pub use errors::NormalizeError;
pub use normalize::{normalize, normalize_sensor, Normalized, RawMessage, SensorKind};
pub use packet::{timestamp_now, Action, ChannelType, Metric, Packet, Quality};
pub use status::{StatusFragment, StatusSnapshot, IDLE_MODE};
