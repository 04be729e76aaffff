use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::engine::assignment::AssignmentError;
use crate::engine::transitions::TransitionError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Assignment(#[from] AssignmentError),

    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),

    #[error("store error: {0}")]
    Store(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(msg) => AppError::NotFound(msg),
            StoreError::Duplicate(msg) => AppError::BadRequest(msg),
            StoreError::Conflict(msg) => AppError::Conflict(msg),
            StoreError::Assignment(err) => AppError::Assignment(err),
            StoreError::Transition(err) => AppError::InvalidTransition(err),
            err @ (StoreError::Database(_) | StoreError::Migrate(_)) => {
                AppError::Store(err.to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, json!({ "error": "Unauthorized" })),
            AppError::Forbidden => (StatusCode::FORBIDDEN, json!({ "error": "Forbidden" })),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, json!({ "error": msg })),
            AppError::Assignment(err) => {
                let status = if err.is_not_found() {
                    StatusCode::NOT_FOUND
                } else {
                    StatusCode::BAD_REQUEST
                };
                let mut body = json!({ "error": err.to_string(), "code": err.code() });
                if let AssignmentError::CargoExceedsCapacity { max_capacity, .. } = err {
                    body["maxCapacity"] = json!(max_capacity);
                }
                (status, body)
            }
            AppError::InvalidTransition(err) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": err.to_string(), "code": "INVALID_STATUS_TRANSITION" }),
            ),
            AppError::Store(details) | AppError::Internal(details) => {
                error!(error = %details, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal server error", "details": details }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::trip::TripStatus;
    use crate::models::vehicle::VehicleStatus;

    async fn body_of(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn capacity_error_carries_max_capacity() {
        let (status, body) = body_of(AppError::Assignment(AssignmentError::CargoExceedsCapacity {
            cargo_weight: 1500,
            max_capacity: 1000,
        }))
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "CARGO_EXCEEDS_CAPACITY");
        assert_eq!(body["maxCapacity"], 1000);
    }

    #[tokio::test]
    async fn missing_entities_are_404() {
        let (status, body) =
            body_of(AppError::Assignment(AssignmentError::VehicleNotFound(3))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "VEHICLE_NOT_FOUND");

        let (status, _) = body_of(AppError::from(StoreError::NotFound("Trip not found".into()))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn store_errors_map_to_status_codes() {
        let (status, _) = body_of(StoreError::Duplicate("plate".into()).into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = body_of(StoreError::Conflict("in use".into()).into()).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = body_of(
            StoreError::Assignment(AssignmentError::VehicleNotAvailable(VehicleStatus::Trip)).into(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VEHICLE_NOT_AVAILABLE");

        let (status, body) = body_of(
            StoreError::Transition(TransitionError {
                from: TripStatus::Completed,
                to: TripStatus::Started,
            })
            .into(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_STATUS_TRANSITION");
    }

    #[tokio::test]
    async fn internal_errors_expose_details() {
        let (status, body) = body_of(AppError::Internal("boom".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["details"], "boom");
    }
}
