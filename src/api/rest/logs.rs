use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::Json;
use axum::Router;
use serde::Deserialize;

use crate::api::rest::auth::CurrentUser;
use crate::error::AppError;
use crate::models::log::LogEntry;
use crate::state::AppState;

pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 100;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/api/logs", get(list_logs))
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl PageQuery {
    fn window(&self) -> (i64, i64) {
        let limit = self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let offset = self.offset.unwrap_or(0).max(0);
        (limit, offset)
    }
}

async fn list_logs(
    _user: CurrentUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<LogEntry>>, AppError> {
    let (limit, offset) = query.window();
    Ok(Json(state.store.list_logs(limit, offset).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_defaults_and_clamps() {
        assert_eq!(PageQuery::default().window(), (10, 0));

        let page = PageQuery {
            limit: Some(500),
            offset: Some(-3),
        };
        assert_eq!(page.window(), (100, 0));

        let page = PageQuery {
            limit: Some(0),
            offset: Some(20),
        };
        assert_eq!(page.window(), (1, 20));
    }
}
