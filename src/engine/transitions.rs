use thiserror::Error;

use crate::models::driver::DriverStatus;
use crate::models::trip::TripStatus;
use crate::models::vehicle::VehicleStatus;

/// Fleet events that move vehicle and driver statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusEvent {
    TripStarted,
    /// A started trip was completed, cancelled or deleted.
    TripClosed,
    ServiceOpened,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot move trip from {from} to {to}")]
pub struct TransitionError {
    pub from: TripStatus,
    pub to: TripStatus,
}

impl VehicleStatus {
    pub fn on(self, event: StatusEvent) -> VehicleStatus {
        match (event, self) {
            (StatusEvent::TripStarted, _) => VehicleStatus::Trip,
            (StatusEvent::TripClosed, VehicleStatus::Trip) => VehicleStatus::Available,
            (StatusEvent::TripClosed, current) => current,
            (StatusEvent::ServiceOpened, _) => VehicleStatus::Maintenance,
        }
    }
}

impl DriverStatus {
    pub fn on(self, event: StatusEvent) -> DriverStatus {
        match (event, self) {
            (StatusEvent::TripStarted, _) => DriverStatus::Trip,
            (StatusEvent::TripClosed, DriverStatus::Trip) => DriverStatus::Available,
            (StatusEvent::TripClosed, current) => current,
            (StatusEvent::ServiceOpened, current) => current,
        }
    }
}

impl TripStatus {
    pub fn can_become(self, to: TripStatus) -> bool {
        match (self, to) {
            (from, to) if from == to => true,
            (TripStatus::Started, TripStatus::Completed) => true,
            (TripStatus::Started, TripStatus::Cancelled) => true,
            _ => false,
        }
    }
}

/// Validates a trip status change and reports the event it triggers for the
/// trip's driver and vehicle, if any.
pub fn trip_transition(
    from: TripStatus,
    to: TripStatus,
) -> Result<Option<StatusEvent>, TransitionError> {
    if !from.can_become(to) {
        return Err(TransitionError { from, to });
    }

    if from.is_open() && !to.is_open() {
        Ok(Some(StatusEvent::TripClosed))
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trip_start_puts_vehicle_and_driver_on_trip() {
        assert_eq!(
            VehicleStatus::Available.on(StatusEvent::TripStarted),
            VehicleStatus::Trip
        );
        assert_eq!(
            DriverStatus::Available.on(StatusEvent::TripStarted),
            DriverStatus::Trip
        );
    }

    #[test]
    fn trip_close_only_releases_what_is_on_trip() {
        assert_eq!(
            VehicleStatus::Trip.on(StatusEvent::TripClosed),
            VehicleStatus::Available
        );
        assert_eq!(
            VehicleStatus::Maintenance.on(StatusEvent::TripClosed),
            VehicleStatus::Maintenance
        );
        assert_eq!(
            VehicleStatus::Retired.on(StatusEvent::TripClosed),
            VehicleStatus::Retired
        );
        assert_eq!(
            DriverStatus::Trip.on(StatusEvent::TripClosed),
            DriverStatus::Available
        );
        assert_eq!(
            DriverStatus::Break.on(StatusEvent::TripClosed),
            DriverStatus::Break
        );
    }

    #[test]
    fn service_sends_vehicle_to_maintenance_from_any_state() {
        for status in [
            VehicleStatus::Available,
            VehicleStatus::Trip,
            VehicleStatus::Retired,
        ] {
            assert_eq!(
                status.on(StatusEvent::ServiceOpened),
                VehicleStatus::Maintenance
            );
        }
        assert_eq!(
            DriverStatus::Trip.on(StatusEvent::ServiceOpened),
            DriverStatus::Trip
        );
    }

    #[test]
    fn closing_a_started_trip_emits_trip_closed() {
        assert_eq!(
            trip_transition(TripStatus::Started, TripStatus::Completed),
            Ok(Some(StatusEvent::TripClosed))
        );
        assert_eq!(
            trip_transition(TripStatus::Started, TripStatus::Cancelled),
            Ok(Some(StatusEvent::TripClosed))
        );
    }

    #[test]
    fn same_state_is_a_no_op() {
        assert_eq!(
            trip_transition(TripStatus::Completed, TripStatus::Completed),
            Ok(None)
        );
        assert_eq!(trip_transition(TripStatus::Started, TripStatus::Started), Ok(None));
    }

    #[test]
    fn closed_trips_are_final() {
        assert!(trip_transition(TripStatus::Completed, TripStatus::Started).is_err());
        assert!(trip_transition(TripStatus::Cancelled, TripStatus::Completed).is_err());
        assert!(trip_transition(TripStatus::Completed, TripStatus::Cancelled).is_err());
    }
}
