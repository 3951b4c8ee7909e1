use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Last known position of a vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fix {
    pub jeep_id: String,
    pub latitude: f64,
    pub longitude: f64,

    /// Unix time in milliseconds.
    pub timestamp: i64,

    pub nearest_stop: String,
}

impl Fix {
    pub fn reported_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.timestamp).unwrap_or_default()
    }
}

/// Body of `GET /positions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionsResponse {
    pub items: Vec<Fix>,
}

/// Payload of the `locationRemove` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovedVehicle {
    pub jeep_id: String,
}

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
