use std::time::Instant;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, warn};

use crate::engine::record_outcome;
use crate::error::AppError;
use crate::models::driver::{Driver, DriverStatus};
use crate::models::log::LogEntry;
use crate::models::trip::Trip;
use crate::models::vehicle::{Vehicle, VehicleStatus};
use crate::state::AppState;

#[derive(Debug, Clone)]
pub struct AssignmentRequest {
    pub driver_id: String,
    pub vehicle_id: i32,
    pub origin: String,
    pub destination: String,
    pub distance: i32,
    pub deadline: DateTime<Utc>,
    pub cargo_weight: Option<i32>,
}

/// Result of a committed assignment: the new trip and the audit row written
/// alongside it.
#[derive(Debug, Clone)]
pub struct TripAssignment {
    pub trip: Trip,
    pub log: LogEntry,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssignmentError {
    #[error("Vehicle not found")]
    VehicleNotFound(i32),

    #[error("Cargo weight ({cargo_weight}kg) exceeds vehicle capacity ({max_capacity}kg)")]
    CargoExceedsCapacity { cargo_weight: i32, max_capacity: i32 },

    #[error("Vehicle is not available. Current status: {0}")]
    VehicleNotAvailable(VehicleStatus),

    #[error("Driver not found")]
    DriverNotFound(String),

    #[error("Driver is not available. Current status: {0}")]
    DriverNotAvailable(DriverStatus),
}

impl AssignmentError {
    pub fn code(&self) -> &'static str {
        match self {
            AssignmentError::VehicleNotFound(_) => "VEHICLE_NOT_FOUND",
            AssignmentError::CargoExceedsCapacity { .. } => "CARGO_EXCEEDS_CAPACITY",
            AssignmentError::VehicleNotAvailable(_) => "VEHICLE_NOT_AVAILABLE",
            AssignmentError::DriverNotFound(_) => "DRIVER_NOT_FOUND",
            AssignmentError::DriverNotAvailable(_) => "DRIVER_NOT_AVAILABLE",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            AssignmentError::VehicleNotFound(_) | AssignmentError::DriverNotFound(_)
        )
    }
}

/// Vehicle half of the availability check. Must run while the vehicle row is
/// locked for the rest of the workflow.
pub fn check_vehicle(
    vehicle: Option<&Vehicle>,
    vehicle_id: i32,
    cargo_weight: Option<i32>,
) -> Result<&Vehicle, AssignmentError> {
    let vehicle = vehicle.ok_or(AssignmentError::VehicleNotFound(vehicle_id))?;

    if let Some(cargo_weight) = cargo_weight {
        if cargo_weight > vehicle.capacity {
            return Err(AssignmentError::CargoExceedsCapacity {
                cargo_weight,
                max_capacity: vehicle.capacity,
            });
        }
    }

    if vehicle.status != VehicleStatus::Available {
        return Err(AssignmentError::VehicleNotAvailable(vehicle.status));
    }

    Ok(vehicle)
}

pub fn check_driver<'a>(
    driver: Option<&'a Driver>,
    driver_id: &str,
) -> Result<&'a Driver, AssignmentError> {
    let driver = driver.ok_or_else(|| AssignmentError::DriverNotFound(driver_id.to_string()))?;

    if driver.status != DriverStatus::Available {
        return Err(AssignmentError::DriverNotAvailable(driver.status));
    }

    Ok(driver)
}

pub async fn assign_trip(state: &AppState, request: AssignmentRequest) -> Result<Trip, AppError> {
    let start = Instant::now();
    let driver_id = request.driver_id.clone();
    let vehicle_id = request.vehicle_id;

    let result = state.store.assign_trip(request).await;
    record_outcome(state, "assignment", start, result.is_ok());

    match result {
        Ok(TripAssignment { trip, log }) => {
            info!(
                trip_id = trip.id,
                driver_id = %trip.driver_id,
                vehicle_id = trip.vehicle_id,
                "trip assigned"
            );
            let _ = state.log_events_tx.send(log);
            Ok(trip)
        }
        Err(err) => {
            warn!(driver_id = %driver_id, vehicle_id, error = %err, "trip assignment rejected");
            Err(err.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn vehicle(capacity: i32, status: VehicleStatus) -> Vehicle {
        Vehicle {
            id: 7,
            name: "Ford Transit".to_string(),
            kind: "van".to_string(),
            capacity,
            plate: "AB-123".to_string(),
            status,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn driver(status: DriverStatus) -> Driver {
        Driver {
            id: "driver-1".to_string(),
            license_num: "L-1".to_string(),
            license_category: "C".to_string(),
            expires_at: Utc::now(),
            status,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn missing_vehicle_is_reported_first() {
        let err = check_vehicle(None, 42, Some(10)).unwrap_err();
        assert_eq!(err, AssignmentError::VehicleNotFound(42));
        assert!(err.is_not_found());
    }

    #[test]
    fn cargo_over_capacity_is_rejected() {
        let v = vehicle(1000, VehicleStatus::Available);
        let err = check_vehicle(Some(&v), v.id, Some(1500)).unwrap_err();
        assert_eq!(
            err,
            AssignmentError::CargoExceedsCapacity {
                cargo_weight: 1500,
                max_capacity: 1000
            }
        );
        assert_eq!(err.code(), "CARGO_EXCEEDS_CAPACITY");
    }

    #[test]
    fn cargo_equal_to_capacity_fits() {
        let v = vehicle(1000, VehicleStatus::Available);
        assert!(check_vehicle(Some(&v), v.id, Some(1000)).is_ok());
        assert!(check_vehicle(Some(&v), v.id, None).is_ok());
    }

    #[test]
    fn capacity_is_checked_before_availability() {
        let v = vehicle(1000, VehicleStatus::Maintenance);
        let err = check_vehicle(Some(&v), v.id, Some(2000)).unwrap_err();
        assert_eq!(err.code(), "CARGO_EXCEEDS_CAPACITY");
    }

    #[test]
    fn busy_vehicle_is_rejected() {
        let v = vehicle(1000, VehicleStatus::Trip);
        let err = check_vehicle(Some(&v), v.id, None).unwrap_err();
        assert_eq!(err, AssignmentError::VehicleNotAvailable(VehicleStatus::Trip));
        assert_eq!(err.to_string(), "Vehicle is not available. Current status: trip");
    }

    #[test]
    fn driver_must_exist_and_be_available() {
        assert_eq!(
            check_driver(None, "ghost").unwrap_err(),
            AssignmentError::DriverNotFound("ghost".to_string())
        );

        let on_break = driver(DriverStatus::Break);
        assert_eq!(
            check_driver(Some(&on_break), "driver-1").unwrap_err().code(),
            "DRIVER_NOT_AVAILABLE"
        );

        let ready = driver(DriverStatus::Available);
        assert!(check_driver(Some(&ready), "driver-1").is_ok());
    }
}
