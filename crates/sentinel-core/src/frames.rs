//! Wire frames exchanged over the live telemetry socket.
//!
//! Inbound frames come from the producer (sensor node or trainer UI) and are
//! validated once here, at the boundary. Outbound frames are what every
//! subscriber receives.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::errors::FrameError;
use crate::ids::SessionId;
use crate::telemetry::SensorPayload;

/// `type` of an inbound sample frame.
pub const SENSOR_DATA: &str = "sensor_data";
/// Moves the active-session pointer.
pub const START_SESSION: &str = "start_session";
/// Clears the active-session pointer.
pub const END_SESSION: &str = "end_session";

/// A decoded inbound frame.
#[derive(Clone, Debug, PartialEq)]
pub enum TelemetryFrame {
    SensorData(SensorPayload),
    StartSession(SessionId),
    EndSession,
}

impl TelemetryFrame {
    /// Decode one raw text frame.
    ///
    /// `start_session` accepts the identifier either at the top level
    /// (`{"type","sessionId"}`) or nested (`{"type","payload":{"sessionId"}}`),
    /// as a string or a number.
    pub fn decode(raw: &str) -> Result<Self, FrameError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| FrameError::Malformed(e.to_string()))?;
        let Value::Object(mut obj) = value else {
            return Err(FrameError::NotAnObject);
        };

        let frame_type = match obj.get("type") {
            Some(Value::String(s)) => s.clone(),
            _ => return Err(FrameError::MissingType),
        };

        match frame_type.as_str() {
            SENSOR_DATA => {
                let payload = obj
                    .remove("payload")
                    .filter(|p| !p.is_null())
                    .ok_or(FrameError::MissingPayload {
                        frame_type: SENSOR_DATA,
                    })?;
                let payload = serde_json::from_value(payload).map_err(|e| {
                    FrameError::InvalidPayload {
                        frame_type: SENSOR_DATA,
                        detail: e.to_string(),
                    }
                })?;
                Ok(Self::SensorData(payload))
            }
            START_SESSION => {
                let raw_id = take_session_id(&mut obj).ok_or(FrameError::InvalidSessionId)?;
                Ok(Self::StartSession(session_id_from_value(&raw_id)?))
            }
            END_SESSION => Ok(Self::EndSession),
            _ => Err(FrameError::UnknownType(frame_type)),
        }
    }

    /// Encode in the canonical producer shape.
    pub fn encode(&self) -> Result<String, FrameError> {
        let value = match self {
            Self::SensorData(payload) => json!({ "type": SENSOR_DATA, "payload": payload }),
            Self::StartSession(id) => json!({ "type": START_SESSION, "sessionId": id }),
            Self::EndSession => json!({ "type": END_SESSION }),
        };
        serde_json::to_string(&value).map_err(|e| FrameError::Encode(e.to_string()))
    }

    /// The wire `type` tag.
    pub fn frame_type(&self) -> &'static str {
        match self {
            Self::SensorData(_) => SENSOR_DATA,
            Self::StartSession(_) => START_SESSION,
            Self::EndSession => END_SESSION,
        }
    }
}

fn take_session_id(obj: &mut Map<String, Value>) -> Option<Value> {
    if let Some(id) = obj.remove("sessionId").filter(|v| !v.is_null()) {
        return Some(id);
    }
    obj.get_mut("payload")
        .and_then(Value::as_object_mut)
        .and_then(|p| p.remove("sessionId"))
        .filter(|v| !v.is_null())
}

fn session_id_from_value(value: &Value) -> Result<SessionId, FrameError> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Ok(SessionId::from_raw(s.clone())),
        Value::Number(n) => Ok(SessionId::from_raw(n.to_string())),
        _ => Err(FrameError::InvalidSessionId),
    }
}

/// A frame fanned out to every subscriber.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    LiveSensorData {
        data: SensorPayload,
    },
    SessionStarted {
        #[serde(rename = "sessionId")]
        session_id: SessionId,
    },
    SessionEnded,
}

impl OutboundFrame {
    /// Serialise to the JSON text sent on the socket.
    pub fn encode(&self) -> Result<String, FrameError> {
        serde_json::to_string(self).map_err(|e| FrameError::Encode(e.to_string()))
    }

    /// Decode a frame received by a subscriber.
    pub fn decode(raw: &str) -> Result<Self, FrameError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| FrameError::Malformed(e.to_string()))?;
        let frame_type = match value.get("type") {
            Some(Value::String(s)) => s.clone(),
            Some(_) | None if value.is_object() => return Err(FrameError::MissingType),
            _ => return Err(FrameError::NotAnObject),
        };
        if !matches!(
            frame_type.as_str(),
            "live_sensor_data" | "session_started" | "session_ended"
        ) {
            return Err(FrameError::UnknownType(frame_type));
        }
        serde_json::from_value(value).map_err(|e| FrameError::Malformed(e.to_string()))
    }

    /// The wire `type` tag.
    pub fn frame_type(&self) -> &'static str {
        match self {
            Self::LiveSensorData { .. } => "live_sensor_data",
            Self::SessionStarted { .. } => "session_started",
            Self::SessionEnded => "session_ended",
        }
    }
}
