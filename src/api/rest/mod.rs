pub mod auth;
pub mod dashboard;
pub mod drivers;
pub mod expenses;
pub mod logs;
pub mod maintenance;
pub mod params;
pub mod trips;
pub mod users;
pub mod vehicles;
pub mod ws;

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Json;
use axum::Router;
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(vehicles::router())
        .merge(trips::router())
        .merge(drivers::router())
        .merge(maintenance::router())
        .merge(expenses::router())
        .merge(users::router())
        .merge(logs::router())
        .merge(dashboard::router())
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/ws/logs", get(ws::ws_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    store: &'static str,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let store = state.store.backend();
    match state.store.ping().await {
        Ok(()) => (StatusCode::OK, Json(HealthResponse { status: "ok", store })),
        Err(err) => {
            error!(error = %err, store, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unavailable",
                    store,
                }),
            )
        }
    }
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err).into_response(),
    }
}
