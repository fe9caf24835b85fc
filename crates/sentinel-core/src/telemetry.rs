//! Motion and hand-tracking sample model.

use serde::{Deserialize, Serialize};

/// Number of flex sensors on the glove, thumb to pinky.
pub const FLEX_SENSOR_COUNT: usize = 5;

/// Three-axis reading.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    /// X axis.
    pub x: f64,
    /// Y axis.
    pub y: f64,
    /// Z axis.
    pub z: f64,
}

impl Vector3 {
    /// Create an empty instance.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean norm.
    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// Inertial measurement: linear acceleration (m/s²) and angular rate (rad/s).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ImuReading {
    /// m/s².
    pub acceleration: Vector3,
    /// rad/s.
    pub gyroscope: Vector3,
}

/// One normalised flex-sensor reading (0.0 straight, 1.0 fully bent).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FlexReading {
    /// Normalised bend, 0.0 to 1.0.
    pub value: f64,
    /// Finger index, thumb = 0, when the node reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finger: Option<u8>,
}

impl FlexReading {
    /// Create an empty instance.
    pub fn new(value: f64) -> Self {
        Self {
            value,
            finger: None,
        }
    }
}

/// A single telemetry sample as produced by the sensor node.
///
/// `timestamp` and `device_id` are optional passthrough fields; they are
/// preserved through relay and recording but never required.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorPayload {
    /// Inertial reading.
    pub imu: ImuReading,
    /// Thumb to pinky.
    pub flex_sensors: [FlexReading; FLEX_SENSOR_COUNT],
    /// Producer clock, milliseconds since the epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
    /// Sensor node identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

impl SensorPayload {
    /// Sample from raw flex values, without timestamp or device id.
    pub fn new(imu: ImuReading, flex: [f64; FLEX_SENSOR_COUNT]) -> Self {
        Self {
            imu,
            flex_sensors: flex.map(FlexReading::new),
            timestamp: None,
            device_id: None,
        }
    }

    /// Flex values in finger order.
    pub fn flex_values(&self) -> [f64; FLEX_SENSOR_COUNT] {
        self.flex_sensors.map(|f| f.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_hardware_shape() {
        let raw = json!({
            "timestamp": 1234,
            "deviceId": "ESP32_001",
            "imu": {
                "acceleration": {"x": 0.1, "y": 9.8, "z": -0.2},
                "gyroscope": {"x": 0.0, "y": 0.5, "z": 1.0}
            },
            "flexSensors": [
                {"finger": 0, "value": 0.1},
                {"finger": 1, "value": 0.2},
                {"finger": 2, "value": 0.3},
                {"finger": 3, "value": 0.4},
                {"finger": 4, "value": 0.5}
            ]
        });
        let payload: SensorPayload = serde_json::from_value(raw).unwrap();
        assert_eq!(payload.imu.acceleration.y, 9.8);
        assert_eq!(payload.flex_values(), [0.1, 0.2, 0.3, 0.4, 0.5]);
        assert_eq!(payload.flex_sensors[2].finger, Some(2));
        assert_eq!(payload.device_id.as_deref(), Some("ESP32_001"));
    }

    #[test]
    fn rejects_wrong_flex_count() {
        let raw = json!({
            "imu": {
                "acceleration": {"x": 0, "y": 0, "z": 0},
                "gyroscope": {"x": 0, "y": 0, "z": 0}
            },
            "flexSensors": [{"value": 0.1}, {"value": 0.2}]
        });
        assert!(serde_json::from_value::<SensorPayload>(raw).is_err());
    }

    #[test]
    fn optional_fields_omitted_when_absent() {
        let payload = SensorPayload::new(ImuReading::default(), [0.0; 5]);
        let value = serde_json::to_value(&payload).unwrap();
        assert!(value.get("timestamp").is_none());
        assert!(value.get("deviceId").is_none());
        assert!(value["flexSensors"][0].get("finger").is_none());
    }

    #[test]
    fn magnitude() {
        assert_eq!(Vector3::new(3.0, 4.0, 0.0).magnitude(), 5.0);
    }
}
