//! Prometheus metrics recorder and `/metrics` endpoint support.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the handle used to render the `/metrics` endpoint. Fails if a
/// global recorder is already installed.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

// Metric name constants to avoid typos across modules.

/// WebSocket connections opened total (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket disconnections total (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Active WebSocket connections (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Upgrades refused at the connection cap (counter).
pub const WS_CONNECTIONS_REJECTED_TOTAL: &str = "ws_connections_rejected_total";
/// Frames queued to a subscriber by broadcast (counter).
pub const WS_BROADCAST_DELIVERIES_TOTAL: &str = "ws_broadcast_deliveries_total";
/// Subscribers evicted during broadcast (counter, labels: reason).
pub const WS_BROADCAST_EVICTIONS_TOTAL: &str = "ws_broadcast_evictions_total";
/// Inbound frames decoded (counter, labels: type).
pub const TELEMETRY_FRAMES_TOTAL: &str = "telemetry_frames_total";
/// Inbound frames rejected by the decoder (counter, labels: kind).
pub const TELEMETRY_DECODE_ERRORS_TOTAL: &str = "telemetry_decode_errors_total";
/// Samples appended to the active session (counter).
pub const TELEMETRY_SAMPLES_RECORDED_TOTAL: &str = "telemetry_samples_recorded_total";
/// Samples relayed but not recorded (counter, labels: reason).
pub const TELEMETRY_SAMPLES_DISCARDED_TOTAL: &str = "telemetry_samples_discarded_total";
