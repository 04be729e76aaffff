use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderValue;
use chrono::Utc;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::EnvFilter;

use fleetflow::api;
use fleetflow::config::Config;
use fleetflow::error::AppError;
use fleetflow::models::user::User;
use fleetflow::state::AppState;
use fleetflow::store::{FleetStore, MemoryStore, PgStore};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    let store = open_store(&config).await?;
    let app_state = AppState::new(store, config.event_buffer_size, config.session_cookie.clone());
    let shared_state = Arc::new(app_state);

    let app = api::rest::router(shared_state.clone()).layer(cors_layer(&config)?);

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(
        http_port = config.http_port,
        store = shared_state.store.backend(),
        "http server started"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

async fn open_store(config: &Config) -> Result<Arc<dyn FleetStore>, AppError> {
    match &config.database_url {
        Some(url) => {
            let store = PgStore::connect(
                url,
                config.db_max_connections,
                Duration::from_secs(config.db_connect_timeout_secs),
            )
            .await?;
            store.migrate().await?;
            tracing::info!(max_connections = config.db_max_connections, "postgres store ready");
            Ok(Arc::new(store))
        }
        None => {
            let store = MemoryStore::new();
            match &config.dev_admin_token {
                Some(token) => {
                    store.register_user(User {
                        id: "dev-admin".to_string(),
                        name: "Development Admin".to_string(),
                        email: "admin@fleetflow.local".to_string(),
                        role: "admin".to_string(),
                        created_at: Utc::now(),
                    });
                    store.open_session(token.clone(), "dev-admin", Utc::now() + chrono::Duration::days(365));
                    tracing::warn!("DATABASE_URL not set, using in-memory store with a development admin session");
                }
                None => tracing::warn!("DATABASE_URL not set, using empty in-memory store"),
            }
            Ok(Arc::new(store))
        }
    }
}

fn cors_layer(config: &Config) -> Result<CorsLayer, AppError> {
    let Some(origin) = &config.cors_origin else {
        return Ok(CorsLayer::permissive());
    };

    let origin = origin
        .parse::<HeaderValue>()
        .map_err(|err| AppError::Internal(format!("invalid CORS_ORIGIN: {err}")))?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
