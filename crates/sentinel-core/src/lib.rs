//! # sentinel-core
//!
//! Wire frames, sample model and ids shared by the relay and its clients.

/// Error types.
pub mod errors;
/// Inbound and outbound wire frames.
pub mod frames;
/// Typed ids.
pub mod ids;
/// Sample model.
pub mod telemetry;

pub use errors::FrameError;
pub use frames::{OutboundFrame, TelemetryFrame};
pub use ids::{ConnectionId, SessionId};
pub use telemetry::{FlexReading, ImuReading, SensorPayload, Vector3, FLEX_SENSOR_COUNT};
