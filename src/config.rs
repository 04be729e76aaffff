use std::env;

use crate::error::AppError;

pub const DEFAULT_SESSION_COOKIE: &str = "fleetflow.session_token";

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    /// Unset runs the service on the in-process store.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub db_connect_timeout_secs: u64,
    pub session_cookie: String,
    pub event_buffer_size: usize,
    pub cors_origin: Option<String>,
    /// Seeds an admin session with this token into the in-process store.
    pub dev_admin_token: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            database_url: non_empty("DATABASE_URL"),
            db_max_connections: parse_or_default("DB_MAX_CONNECTIONS", 10)?,
            db_connect_timeout_secs: parse_or_default("DB_CONNECT_TIMEOUT_SECS", 30)?,
            session_cookie: non_empty("SESSION_COOKIE")
                .unwrap_or_else(|| DEFAULT_SESSION_COOKIE.to_string()),
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            cors_origin: non_empty("CORS_ORIGIN"),
            dev_admin_token: non_empty("DEV_ADMIN_TOKEN"),
        })
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Keys are unique per test so parallel tests never share an env var.

    #[test]
    fn missing_key_falls_back_to_default() {
        let port: u16 = parse_or_default("FLEETFLOW_TEST_UNSET_PORT", 3000).unwrap();
        assert_eq!(port, 3000);
    }

    #[test]
    fn present_key_is_parsed() {
        unsafe { env::set_var("FLEETFLOW_TEST_POOL", "25") };
        let size: u32 = parse_or_default("FLEETFLOW_TEST_POOL", 10).unwrap();
        assert_eq!(size, 25);
    }

    #[test]
    fn invalid_number_is_an_error() {
        unsafe { env::set_var("FLEETFLOW_TEST_BAD_PORT", "eighty") };
        let err = parse_or_default::<u16>("FLEETFLOW_TEST_BAD_PORT", 3000).unwrap_err();
        assert!(err.to_string().contains("FLEETFLOW_TEST_BAD_PORT"));
    }

    #[test]
    fn blank_values_count_as_unset() {
        unsafe { env::set_var("FLEETFLOW_TEST_BLANK", "  ") };
        assert_eq!(non_empty("FLEETFLOW_TEST_BLANK"), None);
    }
}
