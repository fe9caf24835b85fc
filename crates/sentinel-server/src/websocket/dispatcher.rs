//! Inbound frame routing: decode once, then record and fan out.

use std::sync::Arc;

use sentinel_core::errors::FrameError;
use sentinel_core::frames::{OutboundFrame, TelemetryFrame};
use sentinel_core::ids::{ConnectionId, SessionId};
use tracing::{debug, instrument, warn};

use super::broadcast::{BroadcastManager, BroadcastReport};
use crate::metrics::{TELEMETRY_DECODE_ERRORS_TOTAL, TELEMETRY_FRAMES_TOTAL};
use crate::tracker::{RecordOutcome, SessionTracker};

/// Result of dispatching one inbound frame. Never an error: failures are
/// local to the frame and leave the sender's connection open.
#[derive(Clone, Debug, PartialEq)]
pub enum DispatchOutcome {
    Relayed {
        recorded: RecordOutcome,
        broadcast: BroadcastReport,
    },
    SessionStarted {
        session_id: SessionId,
        replaced: Option<SessionId>,
        broadcast: BroadcastReport,
    },
    SessionEnded {
        previous: Option<SessionId>,
        broadcast: BroadcastReport,
    },
    /// Well-formed frame with a discriminant this relay does not handle.
    Ignored { frame_type: String },
    /// Malformed frame; dropped with no state change.
    Rejected(FrameError),
}

/// Routes decoded inbound frames to the tracker and the broadcaster.
pub struct MessageDispatcher {
    tracker: Arc<SessionTracker>,
    broadcast: Arc<BroadcastManager>,
}

impl MessageDispatcher {
    /// Create an empty instance.
    pub fn new(tracker: Arc<SessionTracker>, broadcast: Arc<BroadcastManager>) -> Self {
        Self { tracker, broadcast }
    }

    /// Decode and route one raw text frame.
    #[instrument(skip_all, fields(conn_id = %from, frame_type))]
    pub fn dispatch(&self, raw: &str, from: &ConnectionId) -> DispatchOutcome {
        let frame = match TelemetryFrame::decode(raw) {
            Ok(frame) => frame,
            Err(FrameError::UnknownType(frame_type)) => {
                debug!(frame_type = %frame_type, "ignoring frame with unknown type");
                metrics::counter!(TELEMETRY_DECODE_ERRORS_TOTAL, "kind" => "unknown_type")
                    .increment(1);
                return DispatchOutcome::Ignored { frame_type };
            }
            Err(e) => {
                warn!(error = %e, kind = e.error_kind(), "dropping malformed frame");
                metrics::counter!(TELEMETRY_DECODE_ERRORS_TOTAL, "kind" => e.error_kind())
                    .increment(1);
                return DispatchOutcome::Rejected(e);
            }
        };

        let frame_type = frame.frame_type();
        let _ = tracing::Span::current().record("frame_type", frame_type);
        metrics::counter!(TELEMETRY_FRAMES_TOTAL, "type" => frame_type).increment(1);

        match frame {
            TelemetryFrame::SensorData(payload) => {
                let recorded = self.tracker.record(&payload);
                let broadcast = self
                    .broadcast
                    .broadcast(&OutboundFrame::LiveSensorData { data: payload });
                DispatchOutcome::Relayed {
                    recorded,
                    broadcast,
                }
            }
            TelemetryFrame::StartSession(session_id) => {
                let replaced = self.tracker.start(session_id.clone());
                let broadcast = self.broadcast.broadcast(&OutboundFrame::SessionStarted {
                    session_id: session_id.clone(),
                });
                DispatchOutcome::SessionStarted {
                    session_id,
                    replaced,
                    broadcast,
                }
            }
            TelemetryFrame::EndSession => {
                let previous = self.tracker.end();
                let broadcast = self.broadcast.broadcast(&OutboundFrame::SessionEnded);
                DispatchOutcome::SessionEnded {
                    previous,
                    broadcast,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::connection::ClientConnection;
    use crate::websocket::registry::ConnectionRegistry;
    use sentinel_store::{MemorySessionStore, NewSession, SessionStore};
    use serde_json::json;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    struct Fixture {
        dispatcher: MessageDispatcher,
        registry: Arc<ConnectionRegistry>,
        store: Arc<MemorySessionStore>,
        tracker: Arc<SessionTracker>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemorySessionStore::new());
        let registry = Arc::new(ConnectionRegistry::new());
        let tracker = Arc::new(SessionTracker::new(store.clone()));
        let broadcast = Arc::new(BroadcastManager::new(registry.clone()));
        Fixture {
            dispatcher: MessageDispatcher::new(tracker.clone(), broadcast),
            registry,
            store,
            tracker,
        }
    }

    fn subscribe(registry: &ConnectionRegistry) -> mpsc::Receiver<Arc<str>> {
        let (tx, rx) = mpsc::channel(64);
        let _ = registry.add(Arc::new(ClientConnection::new(
            ConnectionId::new(),
            tx,
            CancellationToken::new(),
        )));
        rx
    }

    fn sensor_frame(v: f64) -> String {
        json!({
            "type": "sensor_data",
            "payload": {
                "imu": {
                    "acceleration": {"x": v, "y": 0.0, "z": 9.8},
                    "gyroscope": {"x": 0.0, "y": 0.0, "z": 0.0}
                },
                "flexSensors": [{"value": v}, {"value": v}, {"value": v}, {"value": v}, {"value": v}]
            }
        })
        .to_string()
    }

    fn drain(rx: &mut mpsc::Receiver<Arc<str>>) -> Vec<serde_json::Value> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(serde_json::from_str(&msg).unwrap());
        }
        out
    }

    #[test]
    fn sensor_data_relays_without_active_session() {
        let fx = fixture();
        let mut rx = subscribe(&fx.registry);
        let outcome = fx.dispatcher.dispatch(&sensor_frame(0.5), &ConnectionId::new());

        let DispatchOutcome::Relayed {
            recorded,
            broadcast,
        } = outcome
        else {
            panic!("expected relay, got {outcome:?}");
        };
        assert_eq!(recorded, RecordOutcome::NoActiveSession);
        assert_eq!(broadcast.delivered, 1);

        let frames = drain(&mut rx);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["type"], "live_sensor_data");
        assert_eq!(frames[0]["data"]["imu"]["acceleration"]["x"], 0.5);
    }

    #[test]
    fn start_record_end_sequence() {
        let fx = fixture();
        let _ = fx.store.create(NewSession::with_id("s1")).unwrap();
        let mut rx = subscribe(&fx.registry);
        let from = ConnectionId::new();

        let _ = fx
            .dispatcher
            .dispatch(r#"{"type":"start_session","sessionId":"s1"}"#, &from);
        for i in 0..4 {
            let _ = fx.dispatcher.dispatch(&sensor_frame(i as f64), &from);
        }
        let ended = fx.dispatcher.dispatch(r#"{"type":"end_session"}"#, &from);
        assert!(matches!(
            ended,
            DispatchOutcome::SessionEnded { previous: Some(ref id), .. } if id.as_str() == "s1"
        ));

        let samples = fx.store.samples(&SessionId::from_raw("s1")).unwrap();
        let xs: Vec<f64> = samples.iter().map(|s| s.imu.acceleration.x).collect();
        assert_eq!(xs, vec![0.0, 1.0, 2.0, 3.0]);

        let types: Vec<String> = drain(&mut rx)
            .iter()
            .map(|f| f["type"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(types.first().map(String::as_str), Some("session_started"));
        assert_eq!(types.last().map(String::as_str), Some("session_ended"));
        assert_eq!(types.iter().filter(|t| *t == "live_sensor_data").count(), 4);
    }

    #[test]
    fn session_started_echoes_id() {
        let fx = fixture();
        let mut rx = subscribe(&fx.registry);
        let outcome = fx.dispatcher.dispatch(
            r#"{"type":"start_session","payload":{"sessionId":12}}"#,
            &ConnectionId::new(),
        );
        assert!(matches!(outcome, DispatchOutcome::SessionStarted { replaced: None, .. }));
        assert_eq!(fx.tracker.active(), Some(SessionId::from_raw("12")));
        assert_eq!(
            drain(&mut rx),
            vec![json!({"type": "session_started", "sessionId": "12"})]
        );
    }

    #[test]
    fn unknown_type_is_ignored_without_side_effects() {
        let fx = fixture();
        let mut rx = subscribe(&fx.registry);
        let outcome = fx
            .dispatcher
            .dispatch(r#"{"type":"unknown_type"}"#, &ConnectionId::new());
        assert_eq!(
            outcome,
            DispatchOutcome::Ignored {
                frame_type: "unknown_type".into()
            }
        );
        assert_eq!(fx.registry.count(), 1);
        assert!(drain(&mut rx).is_empty());
        assert!(fx.tracker.active().is_none());
    }

    #[test]
    fn malformed_frames_are_rejected_without_side_effects() {
        let fx = fixture();
        let mut rx = subscribe(&fx.registry);
        let from = ConnectionId::new();
        for raw in ["{oops", "[]", r#"{"payload":{}}"#, r#"{"type":"start_session"}"#] {
            let outcome = fx.dispatcher.dispatch(raw, &from);
            assert!(matches!(outcome, DispatchOutcome::Rejected(_)), "{raw}: {outcome:?}");
        }
        assert!(drain(&mut rx).is_empty());
        assert!(fx.tracker.active().is_none());
        assert_eq!(fx.registry.count(), 1);
    }
}
