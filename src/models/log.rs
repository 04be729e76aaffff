use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::driver::{Driver, DriverStatus};
use crate::models::service::ServiceRecord;
use crate::models::trip::Trip;
use crate::models::vehicle::{Vehicle, VehicleStatus};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "log_type", rename_all = "lowercase")]
pub enum LogKind {
    Trip,
    Service,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    pub id: i32,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub kind: LogKind,
    pub trip_id: Option<i32>,
    pub service_id: Option<i32>,
    pub created_at: DateTime<Utc>,
}

/// One row of the history feed: a log entry joined with the service it
/// records, or with the trip plus its driver and vehicle.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub log_id: i32,
    pub log_type: LogKind,
    pub log_created_at: DateTime<Utc>,
    pub service_id: Option<i32>,
    pub service_cost: Option<i32>,
    pub service_issue: Option<String>,
    pub trip_id: Option<i32>,
    pub trip_origin: Option<String>,
    pub trip_destination: Option<String>,
    pub trip_distance: Option<i32>,
    pub trip_deadline: Option<DateTime<Utc>>,
    pub trip_finish_date: Option<DateTime<Utc>>,
    pub driver_id: Option<String>,
    pub driver_name: Option<String>,
    pub driver_status: Option<DriverStatus>,
    pub vehicle_id: Option<i32>,
    pub vehicle_name: Option<String>,
    pub vehicle_status: Option<VehicleStatus>,
}

impl LogEntry {
    pub fn bare(log: &LogRecord) -> Self {
        Self {
            log_id: log.id,
            log_type: log.kind,
            log_created_at: log.created_at,
            service_id: None,
            service_cost: None,
            service_issue: None,
            trip_id: None,
            trip_origin: None,
            trip_destination: None,
            trip_distance: None,
            trip_deadline: None,
            trip_finish_date: None,
            driver_id: None,
            driver_name: None,
            driver_status: None,
            vehicle_id: None,
            vehicle_name: None,
            vehicle_status: None,
        }
    }

    pub fn with_service(mut self, service: &ServiceRecord) -> Self {
        self.service_id = Some(service.id);
        self.service_cost = Some(service.cost);
        self.service_issue = Some(service.issue.clone());
        self
    }

    pub fn with_trip(mut self, trip: &Trip) -> Self {
        self.trip_id = Some(trip.id);
        self.trip_origin = Some(trip.origin.clone());
        self.trip_destination = Some(trip.destination.clone());
        self.trip_distance = Some(trip.distance);
        self.trip_deadline = Some(trip.deadline);
        self.trip_finish_date = trip.finish_date;
        self
    }

    pub fn with_driver(mut self, driver: &Driver, name: Option<String>) -> Self {
        self.driver_id = Some(driver.id.clone());
        self.driver_name = name;
        self.driver_status = Some(driver.status);
        self
    }

    pub fn with_vehicle(mut self, vehicle: &Vehicle) -> Self {
        self.vehicle_id = Some(vehicle.id);
        self.vehicle_name = Some(vehicle.name.clone());
        self.vehicle_status = Some(vehicle.status);
        self
    }
}
