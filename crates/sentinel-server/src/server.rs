//! Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post, put};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use sentinel_store::SessionStore;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::api;
use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::hub::Hub;
use crate::metrics::WS_CONNECTIONS_REJECTED_TOTAL;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::session::run_connection;

/// Shared state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Registry, tracker and broadcast wiring.
    pub hub: Arc<Hub>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Graceful shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// Process start, for uptime.
    pub start_time: Instant,
    /// Prometheus handle; `/metrics` answers 404 without one.
    pub metrics: Option<PrometheusHandle>,
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    let ws_path = state.config.ws_path.clone();
    Router::new()
        .route(&ws_path, get(ws_handler))
        .route("/api/health", get(health_handler))
        .route("/api/sessions", post(api::create_session))
        .route("/api/sessions/{id}", get(api::get_session))
        .route("/api/sessions/{id}/end", put(api::end_session))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

/// Bind, start serving, and return a handle that owns the server task.
pub async fn start(
    config: ServerConfig,
    store: Arc<dyn SessionStore>,
    metrics: Option<PrometheusHandle>,
) -> Result<ServerHandle, std::io::Error> {
    let hub = Arc::new(Hub::new(store));
    let shutdown = Arc::new(ShutdownCoordinator::new());
    let config = Arc::new(config);

    let state = AppState {
        hub: Arc::clone(&hub),
        config: Arc::clone(&config),
        shutdown: Arc::clone(&shutdown),
        start_time: Instant::now(),
        metrics,
    };
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    let local_addr = listener.local_addr()?;

    info!(addr = %local_addr, ws_path = %config.ws_path, "sentinel relay started");

    let token = shutdown.token();
    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router)
            .with_graceful_shutdown(token.cancelled_owned())
            .await
        {
            warn!(error = %e, "server exited with error");
        }
    });

    Ok(ServerHandle {
        addr: local_addr,
        ws_path: config.ws_path.clone(),
        hub,
        shutdown,
        server,
    })
}

/// Handle returned by [`start`]. Keeps the server task alive.
pub struct ServerHandle {
    /// Bound listener address.
    pub addr: SocketAddr,
    ws_path: String,
    hub: Arc<Hub>,
    shutdown: Arc<ShutdownCoordinator>,
    server: tokio::task::JoinHandle<()>,
}

impl ServerHandle {
    /// Bound port.
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// `ws://host:port/ws` for this server, using loopback for wildcard binds.
    pub fn ws_url(&self) -> String {
        let host = if self.addr.ip().is_unspecified() {
            "127.0.0.1".to_string()
        } else {
            self.addr.ip().to_string()
        };
        format!("ws://{host}:{}{}", self.addr.port(), self.ws_path)
    }

    /// The hub serving this relay.
    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    /// Close every connection and stop accepting new ones, waiting up to
    /// the default shutdown timeout.
    pub async fn shutdown(self) -> bool {
        let closed = self.hub.registry().close_all();
        info!(connections = closed, "shutting down relay");
        self.shutdown.graceful_shutdown(vec![self.server], None).await
    }
}

/// WebSocket upgrade handler. Refuses upgrades past the connection cap.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let connections = state.hub.connection_count();
    if connections >= state.config.max_connections {
        warn!(
            connections,
            max = state.config.max_connections,
            "connection limit reached, refusing upgrade"
        );
        metrics::counter!(WS_CONNECTIONS_REJECTED_TOTAL).increment(1);
        return (StatusCode::SERVICE_UNAVAILABLE, "too many connections").into_response();
    }

    let hub = Arc::clone(&state.hub);
    let config = Arc::clone(&state.config);
    let token = state.shutdown.token();
    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| run_connection(socket, hub, config, token))
}

/// GET /api/health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.hub.connection_count(),
        state.hub.active_session().map(|id| id.to_string()),
    ))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}
