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
use crate::api::rest::params::{missing_fields, parse_timestamp, text, IdQuery};
use crate::error::AppError;
use crate::models::driver::{DriverPatch, DriverStatus, NewDriver};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/drivers",
            get(get_drivers)
                .post(create_driver)
                .put(update_driver)
                .delete(delete_driver),
        )
        .route("/api/drivers/users", get(driver_candidates))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverRequest {
    pub user_id: Option<String>,
    pub license_num: Option<String>,
    pub license_category: Option<String>,
    pub expires_at: Option<String>,
    pub status: Option<DriverStatus>,
}

async fn get_drivers(
    _user: CurrentUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<IdQuery>,
) -> Result<Response, AppError> {
    match text(query.id) {
        Some(id) => {
            let driver = state
                .store
                .get_driver(&id)
                .await?
                .ok_or_else(|| AppError::NotFound("Driver not found".to_string()))?;
            Ok(Json(driver).into_response())
        }
        None => Ok(Json(state.store.list_drivers().await?).into_response()),
    }
}

async fn create_driver(
    user: CurrentUser,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<DriverRequest>,
) -> Result<impl IntoResponse, AppError> {
    user.require(&state, MANAGERS)?;

    let (Some(user_id), Some(license_num), Some(license_category), Some(expires_at)) = (
        text(payload.user_id),
        text(payload.license_num),
        text(payload.license_category),
        text(payload.expires_at),
    ) else {
        return Err(missing_fields(
            "userId, licenseNum, licenseCategory, expiresAt",
        ));
    };

    let (driver, owner) = state
        .store
        .create_driver(NewDriver {
            user_id,
            license_num,
            license_category,
            expires_at: parse_timestamp(&expires_at, "expiresAt")?,
        })
        .await?;

    info!(driver_id = %driver.id, "driver profile created");
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Driver created successfully",
            "driver": driver,
            "user": owner,
        })),
    ))
}

async fn update_driver(
    user: CurrentUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<IdQuery>,
    Json(payload): Json<DriverRequest>,
) -> Result<impl IntoResponse, AppError> {
    user.require(&state, MANAGERS)?;
    let id = query.required_text("Driver")?;

    let patch = DriverPatch {
        license_num: text(payload.license_num),
        license_category: text(payload.license_category),
        status: payload.status,
        expires_at: text(payload.expires_at)
            .map(|raw| parse_timestamp(&raw, "expiresAt"))
            .transpose()?,
    };

    let driver = state.store.update_driver(&id, patch).await?;
    info!(driver_id = %driver.id, status = %driver.status, "driver updated");
    Ok(Json(driver))
}

async fn delete_driver(
    user: CurrentUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<IdQuery>,
) -> Result<impl IntoResponse, AppError> {
    user.require(&state, MANAGERS)?;
    let id = query.required_text("Driver")?;

    state.store.delete_driver(&id).await?;
    info!(driver_id = %id, "driver deleted");
    Ok(Json(json!({ "message": "Driver deleted successfully" })))
}

async fn driver_candidates(
    user: CurrentUser,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    user.require(&state, MANAGERS)?;
    Ok(Json(state.store.driver_candidates().await?))
}
