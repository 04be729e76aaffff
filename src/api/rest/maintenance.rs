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
use crate::engine::maintenance::{open_service, MaintenanceRequest};
use crate::error::AppError;
use crate::models::service::ServicePatch;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route(
        "/api/maintenance",
        get(get_services)
            .post(create_service)
            .put(update_service)
            .delete(delete_service),
    )
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRequest {
    pub vehicle_id: Option<Numeric>,
    pub issue: Option<String>,
    pub cost: Option<Numeric>,
}

fn cost(value: &Numeric) -> Result<i32, AppError> {
    let cost = value.to_i32("cost")?;
    if cost < 0 {
        return Err(AppError::BadRequest("cost must be >= 0".to_string()));
    }
    Ok(cost)
}

async fn get_services(
    _user: CurrentUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<IdQuery>,
) -> Result<Response, AppError> {
    match query.int()? {
        Some(id) => {
            let service = state
                .store
                .get_service(id)
                .await?
                .ok_or_else(|| AppError::NotFound("Service record not found".to_string()))?;
            Ok(Json(service).into_response())
        }
        None => Ok(Json(state.store.list_services().await?).into_response()),
    }
}

async fn create_service(
    user: CurrentUser,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ServiceRequest>,
) -> Result<impl IntoResponse, AppError> {
    user.require(&state, MANAGERS)?;

    let (Some(vehicle_id), Some(issue), Some(raw_cost)) =
        (payload.vehicle_id, text(payload.issue), payload.cost)
    else {
        return Err(missing_fields("vehicleId, issue, cost"));
    };

    let request = MaintenanceRequest {
        vehicle_id: vehicle_id.to_i32("vehicleId")?,
        issue,
        cost: cost(&raw_cost)?,
    };

    let service = open_service(&state, request).await?;
    Ok((StatusCode::CREATED, Json(service)))
}

async fn update_service(
    user: CurrentUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<IdQuery>,
    Json(payload): Json<ServiceRequest>,
) -> Result<impl IntoResponse, AppError> {
    user.require(&state, MANAGERS)?;
    let id = query.required_int("Service")?;

    let patch = ServicePatch {
        issue: text(payload.issue),
        cost: payload.cost.as_ref().map(cost).transpose()?,
    };

    let service = state.store.update_service(id, patch).await?;
    info!(service_id = service.id, cost = service.cost, "service record updated");
    Ok(Json(service))
}

async fn delete_service(
    user: CurrentUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<IdQuery>,
) -> Result<impl IntoResponse, AppError> {
    user.require(&state, MANAGERS)?;
    let id = query.required_int("Service")?;

    state.store.delete_service(id).await?;
    info!(service_id = id, "service record deleted");
    Ok(Json(json!({ "message": "Service record deleted successfully" })))
}
