use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorRecord {
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accel_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accel_y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accel_z: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accel_magnitude: Option<f64>,
}

#[cfg(test)]
impl SensorRecord {
    pub fn at(timestamp: i64) -> Self {
        Self {
            timestamp,
            latitude: None,
            longitude: None,
            altitude: None,
            speed: None,
            accuracy: None,
            heading: None,
            accel_x: None,
            accel_y: None,
            accel_z: None,
            accel_magnitude: None,
        }
    }
}

/// Epoch milliseconds; whole-valued floats such as `1700000000000.0` are
/// accepted as the same instant.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawTimestamp {
        Integer(i64),
        Float(f64),
    }

    match RawTimestamp::deserialize(deserializer)? {
        RawTimestamp::Integer(value) => Ok(value),
        RawTimestamp::Float(value)
            if value.fract() == 0.0 && value >= i64::MIN as f64 && value < i64::MAX as f64 =>
        {
            Ok(value as i64)
        }
        RawTimestamp::Float(value) => Err(D::Error::custom(format!(
            "timestamp must be whole milliseconds, got {value}"
        ))),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Position {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationRecord {
    pub station_number: i64,
    pub station_name: String,
    pub address: String,
    pub position: Position,
    pub banking: bool,
    pub bonus: bool,
    pub bike_stands: i64,
    pub available_bike_stands: i64,
    pub available_bikes: i64,
    pub status: String,
    pub last_update: Option<String>,
}

/// Station object as returned by the upstream availability API. Every field
/// may be missing; defaults are applied when normalizing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpstreamStation {
    pub number: Option<i64>,
    pub name: Option<String>,
    pub address: Option<String>,
    pub position: Option<Position>,
    pub banking: Option<bool>,
    pub bonus: Option<bool>,
    pub bike_stands: Option<i64>,
    pub available_bike_stands: Option<i64>,
    pub available_bikes: Option<i64>,
    pub status: Option<String>,
    pub last_update: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchStats {
    pub fetch_count: u64,
    pub last_fetch_time: Option<String>,
    pub last_fetch_status: String,
}

impl Default for FetchStats {
    fn default() -> Self {
        Self {
            fetch_count: 0,
            last_fetch_time: None,
            last_fetch_status: "Not started".to_string(),
        }
    }
}
