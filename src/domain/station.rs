use serde::Serialize;

use crate::domain::clock::TimestampMs;
use crate::domain::models::{StationRecord, UpstreamStation};

pub const DEFAULT_STATION_STATUS: &str = "UNKNOWN";

pub fn normalize_station(upstream: UpstreamStation) -> StationRecord {
    StationRecord {
        station_number: upstream.number.unwrap_or(0),
        station_name: upstream.name.unwrap_or_default(),
        address: upstream.address.unwrap_or_default(),
        position: upstream.position.unwrap_or_default(),
        banking: upstream.banking.unwrap_or(false),
        bonus: upstream.bonus.unwrap_or(false),
        bike_stands: upstream.bike_stands.unwrap_or(0),
        available_bike_stands: upstream.available_bike_stands.unwrap_or(0),
        available_bikes: upstream.available_bikes.unwrap_or(0),
        status: upstream
            .status
            .unwrap_or_else(|| DEFAULT_STATION_STATUS.to_string()),
        last_update: upstream
            .last_update
            .and_then(|millis| TimestampMs(millis).to_iso8601()),
    }
}

/// A station record as committed to the durable sink: all records of one poll
/// share the same `fetched_at`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationDocument {
    #[serde(flatten)]
    pub record: StationRecord,
    pub fetched_at: String,
}

pub fn stamp_fetch(records: Vec<StationRecord>, fetched_at: TimestampMs) -> Vec<StationDocument> {
    let fetched_at = fetched_at.to_iso8601().unwrap_or_default();
    records
        .into_iter()
        .map(|record| StationDocument {
            record,
            fetched_at: fetched_at.clone(),
        })
        .collect()
}
