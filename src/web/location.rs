//! Location endpoints: updates from GPS clients, lookups and polling for viewers.

use std::collections::HashMap;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::geo::{nearest_stop, UNKNOWN_STOP};
use crate::hub::LocationEvent;
use crate::models::{now_millis, Fix, PositionsResponse};
use crate::stops::StopSet;
use crate::web::error::ApiError;
use crate::web::state::AppState;

const INVALID_DATA: &str = "Invalid data: jeepId, latitude, and longitude required";

/// Validated body of `POST /api/location/update`.
#[derive(Debug, PartialEq)]
pub struct LocationUpdate {
    pub jeep_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: Option<i64>,
    pub nearest_stop: Option<String>,
}

impl LocationUpdate {
    pub fn parse(body: &Value) -> Result<Self, ApiError> {
        let invalid = || ApiError::BadRequest(INVALID_DATA.to_string());
        let object = body.as_object().ok_or_else(invalid)?;

        let jeep_id = match object.get("jeepId") {
            Some(Value::String(jeep_id)) if !jeep_id.trim().is_empty() => jeep_id.clone(),
            _ => return Err(invalid()),
        };
        let latitude = object.get("latitude").and_then(Value::as_f64).ok_or_else(invalid)?;
        let longitude = object.get("longitude").and_then(Value::as_f64).ok_or_else(invalid)?;
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(ApiError::BadRequest("Invalid data: latitude must be within [-90, 90]".into()));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(ApiError::BadRequest("Invalid data: longitude must be within [-180, 180]".into()));
        }

        let timestamp = object
            .get("timestamp")
            .and_then(|timestamp| timestamp.as_i64().or_else(|| timestamp.as_f64().map(|millis| millis as i64)))
            .filter(|&millis| millis > 0);
        let nearest_stop = object
            .get("nearestStop")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|name| !name.is_empty() && *name != UNKNOWN_STOP)
            .map(str::to_string);

        Ok(Self {
            jeep_id,
            latitude,
            longitude,
            timestamp,
            nearest_stop,
        })
    }

    /// Fills the optional fields in: the current time and the closest configured stop.
    pub fn into_fix(self, stops: &StopSet, now: i64) -> Fix {
        let nearest_stop = self
            .nearest_stop
            .unwrap_or_else(|| nearest_stop(self.latitude, self.longitude, stops).to_string());
        Fix {
            jeep_id: self.jeep_id,
            latitude: self.latitude,
            longitude: self.longitude,
            timestamp: self.timestamp.unwrap_or(now),
            nearest_stop,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UpdateResponse {
    pub success: bool,
    pub data: Fix,
}

/// The store is updated and the event published before responding; everything else happens on subscribers.
pub async fn update(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<UpdateResponse>, ApiError> {
    let Json(body) = body.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    let now = now_millis();
    let fix = LocationUpdate::parse(&body)?.into_fix(&state.stops, now);
    debug!(
        jeep_id = %fix.jeep_id,
        latitude = fix.latitude,
        longitude = fix.longitude,
        nearest_stop = %fix.nearest_stop,
        "location update",
    );

    state
        .store
        .upsert_with(fix.clone(), now, |fix| {
            state.hub.publish(LocationEvent::Updated(fix.clone()));
        })
        .await;
    Ok(Json(UpdateResponse { success: true, data: fix }))
}

pub async fn get(State(state): State<AppState>, Path(jeep_id): Path<String>) -> Result<Json<Fix>, ApiError> {
    state
        .store
        .get(&jeep_id)
        .await
        .map(Json)
        .ok_or(ApiError::NotFound("Jeep not found"))
}

pub async fn list(State(state): State<AppState>) -> Json<HashMap<String, Fix>> {
    Json(state.store.snapshot().await)
}

/// Prefers the shared cache and falls back to memory when it has nothing or fails.
pub async fn positions(State(state): State<AppState>) -> Json<PositionsResponse> {
    if let Some(cache) = &state.cache {
        match cache.load_positions().await {
            Ok(items) if !items.is_empty() => return Json(PositionsResponse { items }),
            Ok(_) => debug!("the cache is empty, serving positions from memory"),
            Err(error) => warn!("failed to load cached positions: {:#}", error),
        }
    }
    Json(PositionsResponse {
        items: state.store.fixes().await,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn parse(body: Value) -> Result<LocationUpdate, ApiError> {
        LocationUpdate::parse(&body)
    }

    #[test]
    fn parse_minimal_update() {
        let update = parse(json!({"jeepId": "J1", "latitude": 14.64, "longitude": 121.08})).unwrap();
        assert_eq!(
            update,
            LocationUpdate {
                jeep_id: "J1".into(),
                latitude: 14.64,
                longitude: 121.08,
                timestamp: None,
                nearest_stop: None,
            }
        );
    }

    #[test]
    fn parse_rejects_missing_or_non_numeric_fields() {
        for body in [
            json!({"latitude": 14.64, "longitude": 121.08}),
            json!({"jeepId": "", "latitude": 14.64, "longitude": 121.08}),
            json!({"jeepId": 7, "latitude": 14.64, "longitude": 121.08}),
            json!({"jeepId": "J1", "longitude": 121.08}),
            json!({"jeepId": "J1", "latitude": "14.64", "longitude": 121.08}),
            json!({"jeepId": "J1", "latitude": 14.64, "longitude": null}),
            json!({"jeepId": "J1", "latitude": 91.0, "longitude": 121.08}),
            json!({"jeepId": "J1", "latitude": 14.64, "longitude": -180.5}),
            json!(["J1", 14.64, 121.08]),
        ] {
            assert!(matches!(parse(body.clone()), Err(ApiError::BadRequest(_))), "{body}");
        }
    }

    #[test]
    fn optional_fields_are_normalised() {
        let update = parse(json!({
            "jeepId": "J1",
            "latitude": 14.64,
            "longitude": 121.08,
            "timestamp": 0,
            "nearestStop": "Unknown",
        }))
        .unwrap();
        assert_eq!(update.timestamp, None);
        assert_eq!(update.nearest_stop, None);

        let update = parse(json!({
            "jeepId": "J1",
            "latitude": 14.64,
            "longitude": 121.08,
            "timestamp": 1.7e12,
            "nearestStop": " Arete E-Jeep Station ",
        }))
        .unwrap();
        assert_eq!(update.timestamp, Some(1_700_000_000_000));
        assert_eq!(update.nearest_stop.as_deref(), Some("Arete E-Jeep Station"));
    }

    #[test]
    fn into_fix_defaults() {
        let update = parse(json!({"jeepId": "J1", "latitude": 14.640339, "longitude": 121.077142})).unwrap();
        let fix = update.into_fix(&StopSet::default(), 42);
        assert_eq!(fix.timestamp, 42);
        assert_eq!(fix.nearest_stop, "Old Rizal Library E-Jeep Station");

        let update = parse(json!({"jeepId": "J1", "latitude": 14.64, "longitude": 121.08})).unwrap();
        assert_eq!(update.into_fix(&StopSet::new(Vec::new()), 42).nearest_stop, UNKNOWN_STOP);
    }

    #[test]
    fn reported_stop_is_kept() {
        let update = parse(json!({
            "jeepId": "J1",
            "latitude": 14.64,
            "longitude": 121.08,
            "timestamp": 7,
            "nearestStop": "Somewhere",
        }))
        .unwrap();
        let fix = update.into_fix(&StopSet::default(), 42);
        assert_eq!(fix.timestamp, 7);
        assert_eq!(fix.nearest_stop, "Somewhere");
    }
}
