use std::sync::Arc;

use tokio::sync::broadcast;

use crate::models::log::LogEntry;
use crate::observability::metrics::Metrics;
use crate::store::FleetStore;

pub struct AppState {
    pub store: Arc<dyn FleetStore>,
    pub log_events_tx: broadcast::Sender<LogEntry>,
    pub metrics: Metrics,
    pub session_cookie: String,
}

impl AppState {
    pub fn new(
        store: Arc<dyn FleetStore>,
        event_buffer_size: usize,
        session_cookie: impl Into<String>,
    ) -> Self {
        let (log_events_tx, _unused_rx) = broadcast::channel(event_buffer_size);

        Self {
            store,
            log_events_tx,
            metrics: Metrics::new(),
            session_cookie: session_cookie.into(),
        }
    }
}
