//! Persistence for the fleet entities.
//!
//! Both backends implement [`FleetStore`]. Workflow methods (`assign_trip`,
//! `open_service`, `update_trip`, `delete_trip`) are atomic: their checks and
//! writes happen under one lock or one transaction, so a driver or vehicle
//! can never be booked twice.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use crate::engine::assignment::{AssignmentError, AssignmentRequest, TripAssignment};
use crate::engine::maintenance::{MaintenanceRequest, ServiceOpening};
use crate::engine::transitions::TransitionError;
use crate::models::driver::{Driver, DriverPatch, DriverProfile, NewDriver};
use crate::models::expense::{Expense, NewExpense};
use crate::models::log::LogEntry;
use crate::models::service::{ServicePatch, ServiceRecord};
use crate::models::trip::{Trip, TripPatch};
use crate::models::user::User;
use crate::models::vehicle::{NewVehicle, Vehicle, VehiclePatch};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Duplicate(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Assignment(#[from] AssignmentError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

#[async_trait]
pub trait FleetStore: Send + Sync {
    fn backend(&self) -> &'static str;

    async fn ping(&self) -> Result<(), StoreError>;

    /// Resolves an unexpired session token to its user.
    async fn session_user(&self, token: &str) -> Result<Option<User>, StoreError>;
    async fn list_users(&self) -> Result<Vec<User>, StoreError>;
    /// Users with the driver role that have no driver profile yet.
    async fn driver_candidates(&self) -> Result<Vec<User>, StoreError>;

    async fn list_vehicles(&self) -> Result<Vec<Vehicle>, StoreError>;
    async fn get_vehicle(&self, id: i32) -> Result<Option<Vehicle>, StoreError>;
    async fn create_vehicle(&self, new: NewVehicle) -> Result<Vehicle, StoreError>;
    async fn update_vehicle(&self, id: i32, patch: VehiclePatch) -> Result<Vehicle, StoreError>;
    async fn delete_vehicle(&self, id: i32) -> Result<Vehicle, StoreError>;

    async fn list_drivers(&self) -> Result<Vec<DriverProfile>, StoreError>;
    async fn get_driver(&self, id: &str) -> Result<Option<Driver>, StoreError>;
    async fn create_driver(&self, new: NewDriver) -> Result<(Driver, User), StoreError>;
    async fn update_driver(&self, id: &str, patch: DriverPatch) -> Result<Driver, StoreError>;
    async fn delete_driver(&self, id: &str) -> Result<Driver, StoreError>;

    async fn list_trips(&self) -> Result<Vec<Trip>, StoreError>;
    async fn get_trip(&self, id: i32) -> Result<Option<Trip>, StoreError>;
    async fn assign_trip(&self, request: AssignmentRequest) -> Result<TripAssignment, StoreError>;
    async fn update_trip(&self, id: i32, patch: TripPatch) -> Result<Trip, StoreError>;
    /// Deletes a trip and its log rows, releasing driver and vehicle when the
    /// trip was still started.
    async fn delete_trip(&self, id: i32) -> Result<Trip, StoreError>;

    async fn list_services(&self) -> Result<Vec<ServiceRecord>, StoreError>;
    async fn get_service(&self, id: i32) -> Result<Option<ServiceRecord>, StoreError>;
    async fn open_service(&self, request: MaintenanceRequest)
    -> Result<ServiceOpening, StoreError>;
    async fn update_service(
        &self,
        id: i32,
        patch: ServicePatch,
    ) -> Result<ServiceRecord, StoreError>;
    async fn delete_service(&self, id: i32) -> Result<ServiceRecord, StoreError>;

    async fn list_logs(&self, limit: i64, offset: i64) -> Result<Vec<LogEntry>, StoreError>;

    async fn list_expenses(&self) -> Result<Vec<Expense>, StoreError>;
    async fn create_expense(&self, new: NewExpense) -> Result<Expense, StoreError>;
    async fn delete_expense(&self, id: i32) -> Result<Expense, StoreError>;
}
