use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Json;
use axum::Router;
use serde::Deserialize;
use serde_json::json;

use crate::api::rest::auth::{CurrentUser, DISPATCHERS};
use crate::api::rest::params::{missing_fields, parse_timestamp, text, IdQuery, Numeric};
use crate::engine::assignment::{assign_trip, AssignmentRequest};
use crate::engine::trips::{delete_trip, update_trip};
use crate::error::AppError;
use crate::models::trip::{TripPatch, TripStatus};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route(
        "/api/trips",
        get(get_trips)
            .post(create_trip)
            .put(update_trip_handler)
            .delete(delete_trip_handler),
    )
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripRequest {
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub distance: Option<Numeric>,
    pub deadline: Option<String>,
    pub finish_date: Option<String>,
    pub driver_id: Option<String>,
    pub vehicle_id: Option<Numeric>,
    pub cargo_weight: Option<Numeric>,
    pub status: Option<TripStatus>,
}

fn positive_distance(distance: &Numeric) -> Result<i32, AppError> {
    let distance = distance.to_i32("distance")?;
    if distance <= 0 {
        return Err(AppError::BadRequest("distance must be > 0".to_string()));
    }
    Ok(distance)
}

async fn get_trips(
    _user: CurrentUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<IdQuery>,
) -> Result<Response, AppError> {
    match query.int()? {
        Some(id) => {
            let trip = state
                .store
                .get_trip(id)
                .await?
                .ok_or_else(|| AppError::NotFound("Trip not found".to_string()))?;
            Ok(Json(trip).into_response())
        }
        None => Ok(Json(state.store.list_trips().await?).into_response()),
    }
}

async fn create_trip(
    user: CurrentUser,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<TripRequest>,
) -> Result<impl IntoResponse, AppError> {
    user.require(&state, DISPATCHERS)?;

    let (Some(origin), Some(destination), Some(distance), Some(deadline), Some(driver_id), Some(vehicle_id)) = (
        text(payload.origin),
        text(payload.destination),
        payload.distance,
        text(payload.deadline),
        text(payload.driver_id),
        payload.vehicle_id,
    ) else {
        return Err(missing_fields(
            "origin, destination, distance, deadline, driverId, vehicleId",
        ));
    };

    let cargo_weight = payload
        .cargo_weight
        .as_ref()
        .map(|weight| weight.to_i32("cargoWeight"))
        .transpose()?;
    if cargo_weight.is_some_and(|weight| weight < 0) {
        return Err(AppError::BadRequest("cargoWeight must be >= 0".to_string()));
    }

    let request = AssignmentRequest {
        driver_id,
        vehicle_id: vehicle_id.to_i32("vehicleId")?,
        origin,
        destination,
        distance: positive_distance(&distance)?,
        deadline: parse_timestamp(&deadline, "deadline")?,
        cargo_weight,
    };

    let trip = assign_trip(&state, request).await?;
    Ok((StatusCode::CREATED, Json(trip)))
}

async fn update_trip_handler(
    user: CurrentUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<IdQuery>,
    Json(payload): Json<TripRequest>,
) -> Result<impl IntoResponse, AppError> {
    user.require(&state, DISPATCHERS)?;
    let id = query.required_int("Trip")?;

    let patch = TripPatch {
        origin: text(payload.origin),
        destination: text(payload.destination),
        distance: payload.distance.as_ref().map(positive_distance).transpose()?,
        deadline: text(payload.deadline)
            .map(|raw| parse_timestamp(&raw, "deadline"))
            .transpose()?,
        finish_date: text(payload.finish_date)
            .map(|raw| parse_timestamp(&raw, "finishDate"))
            .transpose()?,
        driver_id: text(payload.driver_id),
        vehicle_id: payload
            .vehicle_id
            .as_ref()
            .map(|id| id.to_i32("vehicleId"))
            .transpose()?,
        status: payload.status,
    };

    let trip = update_trip(&state, id, patch).await?;
    Ok(Json(trip))
}

async fn delete_trip_handler(
    user: CurrentUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<IdQuery>,
) -> Result<impl IntoResponse, AppError> {
    user.require(&state, DISPATCHERS)?;
    let id = query.required_int("Trip")?;

    delete_trip(&state, id).await?;
    Ok(Json(json!({ "message": "Trip deleted successfully" })))
}
