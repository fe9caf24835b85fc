//! # sentinel-server
//!
//! Real-time telemetry relay over WebSocket.
//!
//! - Connection registry with snapshot iteration
//! - Single active-session pointer, recording into a [`SessionStore`](sentinel_store::SessionStore)
//! - Frame dispatch and best-effort broadcast fan-out with slow-consumer eviction
//! - REST routes to create, inspect and end session records
//! - Heartbeat, health and Prometheus endpoints, graceful shutdown

#![deny(unsafe_code)]

/// REST routes for session records.
pub mod api;
/// Server configuration.
pub mod config;
/// Health check payload.
pub mod health;
/// Wiring of registry, tracker, broadcast and dispatcher.
pub mod hub;
/// Prometheus metric names.
pub mod metrics;
/// Router, listener and server handle.
pub mod server;
/// Graceful shutdown coordination.
pub mod shutdown;
/// Single active-session pointer.
pub mod tracker;
/// WebSocket connection handling.
pub mod websocket;

pub use config::ServerConfig;
pub use hub::Hub;
pub use server::{build_router, start, AppState, ServerHandle};
pub use tracker::{RecordOutcome, SessionTracker};
pub use websocket::dispatcher::DispatchOutcome;
