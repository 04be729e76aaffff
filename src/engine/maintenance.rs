use std::time::Instant;

use tracing::{info, warn};

use crate::engine::record_outcome;
use crate::error::AppError;
use crate::models::log::LogEntry;
use crate::models::service::ServiceRecord;
use crate::state::AppState;

#[derive(Debug, Clone)]
pub struct MaintenanceRequest {
    pub vehicle_id: i32,
    pub issue: String,
    pub cost: i32,
}

#[derive(Debug, Clone)]
pub struct ServiceOpening {
    pub service: ServiceRecord,
    pub log: LogEntry,
}

/// Records a service for a vehicle and sends it to the shop. The vehicle may
/// be mid-trip; the trip keeps running.
pub async fn open_service(
    state: &AppState,
    request: MaintenanceRequest,
) -> Result<ServiceRecord, AppError> {
    let start = Instant::now();
    let vehicle_id = request.vehicle_id;

    let result = state.store.open_service(request).await;
    record_outcome(state, "maintenance", start, result.is_ok());

    match result {
        Ok(ServiceOpening { service, log }) => {
            info!(service_id = service.id, vehicle_id, cost = service.cost, "vehicle sent to maintenance");
            let _ = state.log_events_tx.send(log);
            Ok(service)
        }
        Err(err) => {
            warn!(vehicle_id, error = %err, "maintenance request rejected");
            Err(err.into())
        }
    }
}
