//! WebSocket connection management, heartbeat, frame dispatch, and broadcasting.

/// Best-effort fan-out to every open connection.
pub mod broadcast;
/// Per-connection state and outbound queue.
pub mod connection;
/// Inbound frame routing.
pub mod dispatcher;
/// Liveness sweep over the registry.
pub mod heartbeat;
/// Connection registry.
pub mod registry;
/// Socket lifecycle: reader, writer and ping tasks.
pub mod session;
