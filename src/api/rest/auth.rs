use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use tracing::warn;

use crate::error::AppError;
use crate::models::user::{Role, User};
use crate::state::AppState;

pub const MANAGERS: &[Role] = &[Role::Admin, Role::Manager];
pub const DISPATCHERS: &[Role] = &[Role::Admin, Role::Manager, Role::Dispatcher];
pub const EXPENSE_LOGGERS: &[Role] = &[Role::Admin, Role::Manager, Role::Driver];

/// The user behind a valid, unexpired session.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl CurrentUser {
    pub fn require(&self, state: &AppState, allowed: &[Role]) -> Result<(), AppError> {
        match self.0.role() {
            Some(role) if allowed.contains(&role) => Ok(()),
            _ => {
                warn!(user_id = %self.0.id, role = %self.0.role, "forbidden");
                state
                    .metrics
                    .auth_rejections_total
                    .with_label_values(&["forbidden"])
                    .inc();
                Err(AppError::Forbidden)
            }
        }
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let reject = |reason: &str| {
            warn!(reason, path = %parts.uri.path(), "unauthorized");
            state
                .metrics
                .auth_rejections_total
                .with_label_values(&[reason])
                .inc();
            AppError::Unauthorized
        };

        let Some(token) = session_token(&parts.headers, &state.session_cookie) else {
            return Err(reject("missing_session"));
        };

        match state.store.session_user(&token).await? {
            Some(user) => Ok(CurrentUser(user)),
            None => Err(reject("invalid_session")),
        }
    }
}

/// Reads the session token from the session cookie or a bearer header. Signed
/// cookie values look like `token.signature`; only the token is looked up.
pub fn session_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let from_cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == cookie_name)
        .map(|(_, value)| value.split('.').next().unwrap_or(value).to_string())
        .filter(|token| !token.is_empty());

    from_cookie.or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
    })
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    const COOKIE: &str = "fleetflow.session_token";

    #[test]
    fn signed_cookie_yields_the_token_part() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; fleetflow.session_token=abc123.c2lnbmF0dXJl"),
        );
        assert_eq!(session_token(&headers, COOKIE).as_deref(), Some("abc123"));
    }

    #[test]
    fn bearer_header_is_accepted() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer tok-1"));
        assert_eq!(session_token(&headers, COOKIE).as_deref(), Some("tok-1"));
    }

    #[test]
    fn other_cookies_and_empty_values_are_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("session=abc"));
        assert_eq!(session_token(&headers, COOKIE), None);

        headers.insert(header::COOKIE, HeaderValue::from_static("fleetflow.session_token="));
        assert_eq!(session_token(&headers, COOKIE), None);
    }
}
