//! Wire types shared across modules

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Timestamp layout the backend expects: UTC, second precision, trailing Z.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// One water-level reading, POSTed to the backend once per cycle.
///
/// Field order matters: the serialized body is part of the backend contract.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WaterLevelReading {
    pub sensor_device_id: i64,
    pub raw_distance_cm: f64,
    pub signal_strength: i32,
    pub timestamp: String,
}

impl WaterLevelReading {
    /// Build a reading stamped with the current UTC time.
    pub fn now(sensor_device_id: i64, raw_distance_cm: f64) -> Self {
        Self {
            sensor_device_id,
            raw_distance_cm,
            // No RSSI source on this hardware revision; the backend still
            // requires the field.
            signal_strength: 100,
            timestamp: Utc::now().format(TIMESTAMP_FORMAT).to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_format() {
        let reading = WaterLevelReading::now(1, 12.5);
        let ts = &reading.timestamp;
        // YYYY-MM-DDTHH:MM:SSZ, nothing more
        assert_eq!(ts.len(), 20);
        assert_eq!(&ts[4..5], "-");
        assert_eq!(&ts[7..8], "-");
        assert_eq!(&ts[10..11], "T");
        assert_eq!(&ts[13..14], ":");
        assert_eq!(&ts[16..17], ":");
        assert!(ts.ends_with('Z'));
        assert!(chrono::NaiveDateTime::parse_from_str(ts, TIMESTAMP_FORMAT).is_ok());
    }

    #[test]
    fn test_payload_shape() {
        let reading = WaterLevelReading {
            sensor_device_id: 1,
            raw_distance_cm: 12.5,
            signal_strength: 100,
            timestamp: "2024-06-01T10:30:00Z".to_string(),
        };

        let body = serde_json::to_string(&reading).unwrap();
        assert_eq!(
            body,
            r#"{"sensor_device_id":1,"raw_distance_cm":12.5,"signal_strength":100,"timestamp":"2024-06-01T10:30:00Z"}"#
        );
    }

    #[test]
    fn test_signal_strength_placeholder() {
        let reading = WaterLevelReading::now(7, 0.0);
        assert_eq!(reading.sensor_device_id, 7);
        assert_eq!(reading.signal_strength, 100);
    }
}
