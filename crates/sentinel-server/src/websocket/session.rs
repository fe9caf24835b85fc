//! Per-connection socket lifecycle: register, pump frames, tear down.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use sentinel_core::ids::ConnectionId;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::connection::ClientConnection;
use super::heartbeat::{run_heartbeat, HeartbeatResult};
use crate::config::ServerConfig;
use crate::hub::Hub;
use crate::metrics::{WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_DISCONNECTIONS_TOTAL};

/// Drive one upgraded socket until it closes, errors, stops answering
/// pings, is evicted, or the server shuts down.
///
/// Inbound frames are dispatched in the order they arrive.
pub async fn run_connection(
    socket: WebSocket,
    hub: Arc<Hub>,
    config: Arc<ServerConfig>,
    shutdown: CancellationToken,
) {
    let (tx, rx) = mpsc::channel(config.send_queue_capacity);
    let conn = Arc::new(ClientConnection::new(
        ConnectionId::new(),
        tx,
        shutdown.child_token(),
    ));
    let _ = hub.registry().add(Arc::clone(&conn));
    metrics::counter!(WS_CONNECTIONS_TOTAL).increment(1);
    metrics::gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);
    info!(conn_id = %conn.id, connections = hub.registry().count(), "websocket client connected");

    let (ws_tx, mut ws_rx) = socket.split();

    let writer = tokio::spawn(write_loop(
        ws_tx,
        rx,
        Arc::clone(&conn),
        config.heartbeat_interval(),
        config.send_timeout(),
    ));

    let heartbeat_conn = Arc::clone(&conn);
    let heartbeat = tokio::spawn(async move {
        let result = run_heartbeat(
            Arc::clone(&heartbeat_conn),
            config.heartbeat_interval(),
            config.heartbeat_timeout(),
            heartbeat_conn.cancel_token(),
        )
        .await;
        if result == HeartbeatResult::TimedOut {
            warn!(conn_id = %heartbeat_conn.id, "heartbeat timed out, closing connection");
            heartbeat_conn.close();
        }
    });

    loop {
        tokio::select! {
            () = conn.closed() => break,
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(WsMessage::Text(text))) => {
                        conn.mark_alive();
                        let _ = hub.dispatch(text.as_str(), &conn.id);
                    }
                    Some(Ok(WsMessage::Pong(_))) => conn.mark_alive(),
                    // axum answers pings itself
                    Some(Ok(WsMessage::Ping(_))) => conn.mark_alive(),
                    Some(Ok(WsMessage::Binary(bytes))) => {
                        debug!(conn_id = %conn.id, len = bytes.len(), "ignoring binary frame");
                    }
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Err(e)) => {
                        debug!(conn_id = %conn.id, error = %e, "websocket read error");
                        break;
                    }
                }
            }
        }
    }

    let _ = hub.registry().remove(&conn.id);
    conn.close();
    let _ = writer.await;
    let _ = heartbeat.await;
    conn.mark_closed();

    metrics::counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    metrics::gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    info!(
        conn_id = %conn.id,
        age_secs = conn.age().as_secs(),
        dropped = conn.drop_count(),
        "websocket client disconnected"
    );
}

/// Forward queued frames to the socket and send periodic pings.
///
/// Any single write that takes longer than `send_timeout` ends the
/// connection. On cancellation a Close frame is sent before exiting.
async fn write_loop(
    mut ws_tx: SplitSink<WebSocket, WsMessage>,
    mut rx: mpsc::Receiver<Arc<str>>,
    conn: Arc<ClientConnection>,
    ping_every: Duration,
    send_timeout: Duration,
) {
    let cancel = conn.cancel_token();
    let mut ping_interval = tokio::time::interval(ping_every);
    let _ = ping_interval.tick().await;

    loop {
        let outgoing = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                let _ = tokio::time::timeout(send_timeout, ws_tx.send(WsMessage::Close(None))).await;
                break;
            }
            msg = rx.recv() => match msg {
                Some(text) => WsMessage::Text(text.to_string().into()),
                None => break,
            },
            _ = ping_interval.tick() => {
                trace!(conn_id = %conn.id, "sent ping");
                WsMessage::Ping(Vec::new().into())
            }
        };

        match tokio::time::timeout(send_timeout, ws_tx.send(outgoing)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!(conn_id = %conn.id, error = %e, "websocket write failed");
                break;
            }
            Err(_) => {
                warn!(conn_id = %conn.id, timeout_ms = send_timeout.as_millis() as u64, "websocket write timed out");
                break;
            }
        }
    }

    conn.close();
}
