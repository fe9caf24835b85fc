//! # sentinel-client
//!
//! Subscriber side of the telemetry relay.
//!
//! [`TelemetryClient`] keeps a WebSocket open, reconnecting with a linear
//! delay after unexpected loss and giving up after a bounded number of
//! attempts. Decoded frames and connection changes are published on a
//! typed [`EventBus`]. [`LiveView`] folds those events into the latest
//! sample, a bounded [`HistoryBuffer`], and the running session.

#![deny(unsafe_code)]

/// Reconnecting client handle and its connection task.
pub mod client;
/// Transport seam for tests and the WebSocket implementation.
pub mod connector;
/// Error type.
pub mod error;
/// Event kinds and the handler registry.
pub mod events;
/// Bounded sample history.
pub mod history;
/// Folded view of the live session.
pub mod live;
/// Reconnection state machine.
pub mod supervisor;

pub use client::{ClientConfig, TelemetryClient};
pub use connector::{Connector, Transport, WsConnector};
pub use error::ClientError;
pub use events::{ClientEvent, EventBus, EventKind, SubscriptionId};
pub use history::HistoryBuffer;
pub use live::{format_duration, LiveView};
pub use supervisor::{ConnectionState, NextStep, ReconnectPolicy, Supervisor};
