use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::engine::record_outcome;
use crate::engine::transitions::{StatusEvent, TransitionError, trip_transition};
use crate::error::AppError;
use crate::models::trip::{Trip, TripPatch, TripStatus};
use crate::state::AppState;

/// What a store has to do, besides writing the patched fields, to apply a
/// trip update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripUpdatePlan {
    pub status: TripStatus,
    pub finish_date: Option<DateTime<Utc>>,
    /// Release the trip's current driver and vehicle.
    pub release: bool,
    /// A started trip moves to this driver; the old one is released.
    pub new_driver: Option<String>,
    /// A started trip moves to this vehicle; the old one is released.
    pub new_vehicle: Option<i32>,
}

pub fn plan_update(
    trip: &Trip,
    patch: &TripPatch,
    now: DateTime<Utc>,
) -> Result<TripUpdatePlan, TransitionError> {
    let status = patch.status.unwrap_or(trip.status);
    let event = trip_transition(trip.status, status)?;
    let stays_open = status.is_open();

    let new_driver = patch
        .driver_id
        .as_ref()
        .filter(|id| stays_open && **id != trip.driver_id)
        .cloned();
    let new_vehicle = patch
        .vehicle_id
        .filter(|id| stays_open && *id != trip.vehicle_id);

    let finish_date = match patch.finish_date.or(trip.finish_date) {
        Some(date) => Some(date),
        None if status == TripStatus::Completed => Some(now),
        None => None,
    };

    Ok(TripUpdatePlan {
        status,
        finish_date,
        release: event == Some(StatusEvent::TripClosed),
        new_driver,
        new_vehicle,
    })
}

impl Trip {
    pub fn apply(&mut self, patch: TripPatch, plan: &TripUpdatePlan, now: DateTime<Utc>) {
        if let Some(origin) = patch.origin {
            self.origin = origin;
        }
        if let Some(destination) = patch.destination {
            self.destination = destination;
        }
        if let Some(distance) = patch.distance {
            self.distance = distance;
        }
        if let Some(deadline) = patch.deadline {
            self.deadline = deadline;
        }
        // A closing trip keeps the driver and vehicle that ran it.
        if let Some(driver_id) = &plan.new_driver {
            self.driver_id = driver_id.clone();
        }
        if let Some(vehicle_id) = plan.new_vehicle {
            self.vehicle_id = vehicle_id;
        }
        self.status = plan.status;
        self.finish_date = plan.finish_date;
        self.updated_at = now;
    }
}

pub async fn update_trip(state: &AppState, id: i32, patch: TripPatch) -> Result<Trip, AppError> {
    let start = Instant::now();
    let result = state.store.update_trip(id, patch).await;
    record_outcome(state, "trip_update", start, result.is_ok());

    match result {
        Ok(trip) => {
            info!(trip_id = trip.id, status = %trip.status, "trip updated");
            Ok(trip)
        }
        Err(err) => {
            warn!(trip_id = id, error = %err, "trip update rejected");
            Err(err.into())
        }
    }
}

pub async fn delete_trip(state: &AppState, id: i32) -> Result<Trip, AppError> {
    let trip = state.store.delete_trip(id).await?;
    info!(
        trip_id = trip.id,
        released = trip.status.is_open(),
        "trip deleted"
    );
    Ok(trip)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;

    fn started_trip() -> Trip {
        Trip {
            id: 1,
            origin: "London".to_string(),
            destination: "Manchester".to_string(),
            distance: 200,
            deadline: Utc::now() + Duration::days(1),
            finish_date: None,
            driver_id: "driver-1".to_string(),
            vehicle_id: 2,
            cargo_weight: None,
            status: TripStatus::Started,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn completing_stamps_finish_date_and_releases() {
        let now = Utc::now();
        let patch = TripPatch {
            status: Some(TripStatus::Completed),
            ..TripPatch::default()
        };
        let plan = plan_update(&started_trip(), &patch, now).unwrap();

        assert_eq!(plan.status, TripStatus::Completed);
        assert_eq!(plan.finish_date, Some(now));
        assert!(plan.release);
    }

    #[test]
    fn explicit_finish_date_wins() {
        let now = Utc::now();
        let finished = now - Duration::hours(3);
        let patch = TripPatch {
            status: Some(TripStatus::Completed),
            finish_date: Some(finished),
            ..TripPatch::default()
        };
        let plan = plan_update(&started_trip(), &patch, now).unwrap();
        assert_eq!(plan.finish_date, Some(finished));
    }

    #[test]
    fn cancelling_releases_without_finish_date() {
        let patch = TripPatch {
            status: Some(TripStatus::Cancelled),
            ..TripPatch::default()
        };
        let plan = plan_update(&started_trip(), &patch, Utc::now()).unwrap();
        assert!(plan.release);
        assert_eq!(plan.finish_date, None);
    }

    #[test]
    fn reassignment_only_applies_to_open_trips() {
        let patch = TripPatch {
            driver_id: Some("driver-2".to_string()),
            vehicle_id: Some(9),
            ..TripPatch::default()
        };
        let plan = plan_update(&started_trip(), &patch, Utc::now()).unwrap();
        assert_eq!(plan.new_driver.as_deref(), Some("driver-2"));
        assert_eq!(plan.new_vehicle, Some(9));
        assert!(!plan.release);

        let mut closed = started_trip();
        closed.status = TripStatus::Completed;
        let plan = plan_update(&closed, &patch, Utc::now()).unwrap();
        assert_eq!(plan.new_driver, None);
        assert_eq!(plan.new_vehicle, None);
    }

    #[test]
    fn same_driver_is_not_a_reassignment() {
        let patch = TripPatch {
            driver_id: Some("driver-1".to_string()),
            ..TripPatch::default()
        };
        let plan = plan_update(&started_trip(), &patch, Utc::now()).unwrap();
        assert_eq!(plan.new_driver, None);
    }

    #[test]
    fn reopening_is_rejected() {
        let mut trip = started_trip();
        trip.status = TripStatus::Cancelled;
        let patch = TripPatch {
            status: Some(TripStatus::Started),
            ..TripPatch::default()
        };
        assert!(plan_update(&trip, &patch, Utc::now()).is_err());
    }

    #[test]
    fn apply_writes_patch_and_plan() {
        let now = Utc::now();
        let mut trip = started_trip();
        let patch = TripPatch {
            destination: Some("Leeds".to_string()),
            status: Some(TripStatus::Completed),
            ..TripPatch::default()
        };
        let plan = plan_update(&trip, &patch, now).unwrap();
        trip.apply(patch, &plan, now);

        assert_eq!(trip.destination, "Leeds");
        assert_eq!(trip.origin, "London");
        assert_eq!(trip.status, TripStatus::Completed);
        assert_eq!(trip.finish_date, Some(now));
        assert_eq!(trip.updated_at, now);
    }

    #[test]
    fn closing_ignores_a_new_driver_and_vehicle() {
        let now = Utc::now();
        let mut trip = started_trip();
        let patch = TripPatch {
            status: Some(TripStatus::Completed),
            driver_id: Some("driver-2".to_string()),
            vehicle_id: Some(9),
            ..TripPatch::default()
        };
        let plan = plan_update(&trip, &patch, now).unwrap();
        assert!(plan.release);
        assert_eq!(plan.new_driver, None);

        trip.apply(patch, &plan, now);
        assert_eq!(trip.driver_id, "driver-1");
        assert_eq!(trip.vehicle_id, 2);
        assert_eq!(trip.status, TripStatus::Completed);
    }
}
