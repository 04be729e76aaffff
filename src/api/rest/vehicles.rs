use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Json;
use axum::Router;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::api::rest::auth::{CurrentUser, MANAGERS};
use crate::api::rest::params::{missing_fields, text, IdQuery, Numeric};
use crate::error::AppError;
use crate::models::vehicle::{NewVehicle, VehiclePatch, VehicleStatus};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route(
        "/api/vehicles",
        get(get_vehicles)
            .post(create_vehicle)
            .put(update_vehicle)
            .delete(delete_vehicle),
    )
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleRequest {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub capacity: Option<Numeric>,
    pub plate: Option<String>,
    pub status: Option<VehicleStatus>,
}

fn positive_capacity(capacity: &Numeric) -> Result<i32, AppError> {
    let capacity = capacity.to_i32("capacity")?;
    if capacity <= 0 {
        return Err(AppError::BadRequest("capacity must be > 0".to_string()));
    }
    Ok(capacity)
}

async fn get_vehicles(
    _user: CurrentUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<IdQuery>,
) -> Result<Response, AppError> {
    match query.int()? {
        Some(id) => {
            let vehicle = state
                .store
                .get_vehicle(id)
                .await?
                .ok_or_else(|| AppError::NotFound("Vehicle not found".to_string()))?;
            Ok(Json(vehicle).into_response())
        }
        None => Ok(Json(state.store.list_vehicles().await?).into_response()),
    }
}

async fn create_vehicle(
    user: CurrentUser,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<VehicleRequest>,
) -> Result<impl IntoResponse, AppError> {
    user.require(&state, MANAGERS)?;

    let (Some(name), Some(kind), Some(capacity), Some(plate)) = (
        text(payload.name),
        text(payload.kind),
        payload.capacity,
        text(payload.plate),
    ) else {
        return Err(missing_fields("name, type, capacity, plate"));
    };

    let vehicle = state
        .store
        .create_vehicle(NewVehicle {
            name,
            kind,
            capacity: positive_capacity(&capacity)?,
            plate,
            status: payload.status.unwrap_or(VehicleStatus::Available),
        })
        .await?;

    info!(vehicle_id = vehicle.id, plate = %vehicle.plate, "vehicle created");
    Ok((StatusCode::CREATED, Json(vehicle)))
}

async fn update_vehicle(
    user: CurrentUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<IdQuery>,
    Json(payload): Json<VehicleRequest>,
) -> Result<impl IntoResponse, AppError> {
    user.require(&state, MANAGERS)?;
    let id = query.required_int("Vehicle")?;

    let patch = VehiclePatch {
        name: text(payload.name),
        kind: text(payload.kind),
        capacity: payload.capacity.as_ref().map(positive_capacity).transpose()?,
        plate: text(payload.plate),
        status: payload.status,
    };

    let vehicle = state.store.update_vehicle(id, patch).await?;
    info!(vehicle_id = vehicle.id, status = %vehicle.status, "vehicle updated");
    Ok(Json(vehicle))
}

async fn delete_vehicle(
    user: CurrentUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<IdQuery>,
) -> Result<impl IntoResponse, AppError> {
    user.require(&state, MANAGERS)?;
    let id = query.required_int("Vehicle")?;

    state.store.delete_vehicle(id).await?;
    info!(vehicle_id = id, "vehicle deleted");
    Ok(Json(json!({ "message": "Vehicle deleted successfully" })))
}
