use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::Json;
use axum::Router;

use crate::api::rest::auth::{CurrentUser, MANAGERS};
use crate::error::AppError;
use crate::models::user::User;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/api/users", get(list_users))
}

async fn list_users(
    user: CurrentUser,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<User>>, AppError> {
    user.require(&state, MANAGERS)?;
    Ok(Json(state.store.list_users().await?))
}
