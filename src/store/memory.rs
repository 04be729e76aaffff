use std::sync::atomic::{AtomicI32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::engine::assignment::{
    AssignmentRequest, TripAssignment, check_driver, check_vehicle,
};
use crate::engine::maintenance::{MaintenanceRequest, ServiceOpening};
use crate::engine::transitions::StatusEvent;
use crate::engine::trips::plan_update;
use crate::models::driver::{Driver, DriverPatch, DriverProfile, DriverStatus, NewDriver};
use crate::models::expense::{Expense, NewExpense};
use crate::models::log::{LogEntry, LogKind, LogRecord};
use crate::models::service::{ServicePatch, ServiceRecord};
use crate::models::trip::{Trip, TripPatch, TripStatus};
use crate::models::user::{Session, User};
use crate::models::vehicle::{NewVehicle, Vehicle, VehiclePatch};
use crate::store::{FleetStore, StoreError};

#[derive(Default)]
struct Sequence(AtomicI32);

impl Sequence {
    fn next(&self) -> i32 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// In-process store. Reads go straight to the maps; every write takes the
/// `writer` lock first, so a workflow's checks and writes see no interleaved
/// mutation.
#[derive(Default)]
pub struct MemoryStore {
    users: DashMap<String, User>,
    sessions: DashMap<String, Session>,
    drivers: DashMap<String, Driver>,
    vehicles: DashMap<i32, Vehicle>,
    trips: DashMap<i32, Trip>,
    services: DashMap<i32, ServiceRecord>,
    logs: DashMap<i32, LogRecord>,
    expenses: DashMap<i32, Expense>,
    vehicle_ids: Sequence,
    trip_ids: Sequence,
    service_ids: Sequence,
    log_ids: Sequence,
    expense_ids: Sequence,
    writer: Mutex<()>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stands in for the session provider's sign-up.
    pub fn register_user(&self, user: User) {
        self.users.insert(user.id.clone(), user);
    }

    /// Stands in for the session provider's sign-in.
    pub fn open_session(
        &self,
        token: impl Into<String>,
        user_id: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) {
        let token = token.into();
        self.sessions.insert(
            token.clone(),
            Session {
                token,
                user_id: user_id.into(),
                expires_at,
            },
        );
    }

    fn shift_driver(&self, id: &str, event: StatusEvent, now: DateTime<Utc>) {
        if let Some(mut driver) = self.drivers.get_mut(id) {
            driver.status = driver.status.on(event);
            driver.updated_at = now;
        }
    }

    fn shift_vehicle(&self, id: i32, event: StatusEvent, now: DateTime<Utc>) {
        if let Some(mut vehicle) = self.vehicles.get_mut(&id) {
            vehicle.status = vehicle.status.on(event);
            vehicle.updated_at = now;
        }
    }

    fn append_log(
        &self,
        kind: LogKind,
        trip_id: Option<i32>,
        service_id: Option<i32>,
        now: DateTime<Utc>,
    ) -> LogRecord {
        let log = LogRecord {
            id: self.log_ids.next(),
            kind,
            trip_id,
            service_id,
            created_at: now,
        };
        self.logs.insert(log.id, log.clone());
        log
    }

    fn user_name(&self, id: &str) -> Option<String> {
        self.users.get(id).map(|user| user.name.clone())
    }

    fn join_log(&self, log: &LogRecord) -> LogEntry {
        let mut entry = LogEntry::bare(log);

        if let Some(service) = log.service_id.and_then(|id| self.services.get(&id)) {
            entry = entry.with_service(&service);
        }

        if let Some(trip) = log.trip_id.and_then(|id| self.trips.get(&id)) {
            entry = entry.with_trip(&trip);
            if let Some(driver) = self.drivers.get(&trip.driver_id) {
                entry = entry.with_driver(&driver, self.user_name(&driver.id));
            }
            if let Some(vehicle) = self.vehicles.get(&trip.vehicle_id) {
                entry = entry.with_vehicle(&vehicle);
            }
        }

        entry
    }

    fn plate_taken(&self, plate: &str, except: Option<i32>) -> bool {
        self.vehicles
            .iter()
            .any(|entry| entry.plate == plate && Some(entry.id) != except)
    }
}

fn not_found(what: &str) -> StoreError {
    StoreError::NotFound(format!("{what} not found"))
}

#[async_trait]
impl FleetStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn session_user(&self, token: &str) -> Result<Option<User>, StoreError> {
        let Some(user_id) = self
            .sessions
            .get(token)
            .filter(|session| session.expires_at > Utc::now())
            .map(|session| session.user_id.clone())
        else {
            return Ok(None);
        };

        Ok(self.users.get(&user_id).map(|user| user.clone()))
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let mut users: Vec<User> = self.users.iter().map(|entry| entry.value().clone()).collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(users)
    }

    async fn driver_candidates(&self) -> Result<Vec<User>, StoreError> {
        let users = self.list_users().await?;
        Ok(users
            .into_iter()
            .filter(|user| user.role == "driver" && !self.drivers.contains_key(&user.id))
            .collect())
    }

    async fn list_vehicles(&self) -> Result<Vec<Vehicle>, StoreError> {
        let mut vehicles: Vec<Vehicle> =
            self.vehicles.iter().map(|entry| entry.value().clone()).collect();
        vehicles.sort_by_key(|vehicle| vehicle.id);
        Ok(vehicles)
    }

    async fn get_vehicle(&self, id: i32) -> Result<Option<Vehicle>, StoreError> {
        Ok(self.vehicles.get(&id).map(|vehicle| vehicle.clone()))
    }

    async fn create_vehicle(&self, new: NewVehicle) -> Result<Vehicle, StoreError> {
        let _guard = self.writer.lock().await;

        if self.plate_taken(&new.plate, None) {
            return Err(StoreError::Duplicate(format!(
                "Vehicle with plate {} already exists",
                new.plate
            )));
        }

        let now = Utc::now();
        let vehicle = Vehicle {
            id: self.vehicle_ids.next(),
            name: new.name,
            kind: new.kind,
            capacity: new.capacity,
            plate: new.plate,
            status: new.status,
            created_at: now,
            updated_at: now,
        };
        self.vehicles.insert(vehicle.id, vehicle.clone());
        Ok(vehicle)
    }

    async fn update_vehicle(&self, id: i32, patch: VehiclePatch) -> Result<Vehicle, StoreError> {
        let _guard = self.writer.lock().await;

        if let Some(plate) = &patch.plate {
            if self.plate_taken(plate, Some(id)) {
                return Err(StoreError::Duplicate(format!(
                    "Vehicle with plate {plate} already exists"
                )));
            }
        }

        let mut vehicle = self.vehicles.get_mut(&id).ok_or_else(|| not_found("Vehicle"))?;
        if let Some(name) = patch.name {
            vehicle.name = name;
        }
        if let Some(kind) = patch.kind {
            vehicle.kind = kind;
        }
        if let Some(capacity) = patch.capacity {
            vehicle.capacity = capacity;
        }
        if let Some(plate) = patch.plate {
            vehicle.plate = plate;
        }
        if let Some(status) = patch.status {
            vehicle.status = status;
        }
        vehicle.updated_at = Utc::now();

        Ok(vehicle.clone())
    }

    async fn delete_vehicle(&self, id: i32) -> Result<Vehicle, StoreError> {
        let _guard = self.writer.lock().await;

        if self.trips.iter().any(|trip| trip.vehicle_id == id) {
            return Err(StoreError::Conflict(
                "Vehicle has trips and cannot be deleted".to_string(),
            ));
        }

        let (_, vehicle) = self.vehicles.remove(&id).ok_or_else(|| not_found("Vehicle"))?;
        for mut service in self.services.iter_mut() {
            if service.vehicle_id == Some(id) {
                service.vehicle_id = None;
            }
        }

        Ok(vehicle)
    }

    async fn list_drivers(&self) -> Result<Vec<DriverProfile>, StoreError> {
        let mut drivers: Vec<DriverProfile> = self
            .drivers
            .iter()
            .map(|entry| {
                let user = self.users.get(entry.key());
                DriverProfile {
                    driver: entry.value().clone(),
                    name: user.as_ref().map(|user| user.name.clone()),
                    email: user.as_ref().map(|user| user.email.clone()),
                }
            })
            .collect();
        drivers.sort_by(|a, b| {
            a.driver
                .created_at
                .cmp(&b.driver.created_at)
                .then_with(|| a.driver.id.cmp(&b.driver.id))
        });
        Ok(drivers)
    }

    async fn get_driver(&self, id: &str) -> Result<Option<Driver>, StoreError> {
        Ok(self.drivers.get(id).map(|driver| driver.clone()))
    }

    async fn create_driver(&self, new: NewDriver) -> Result<(Driver, User), StoreError> {
        let _guard = self.writer.lock().await;

        let user = self
            .users
            .get(&new.user_id)
            .map(|user| user.clone())
            .ok_or_else(|| not_found("User"))?;

        if self.drivers.contains_key(&new.user_id) {
            return Err(StoreError::Duplicate(
                "Driver profile already exists for this user".to_string(),
            ));
        }

        let now = Utc::now();
        let driver = Driver {
            id: new.user_id,
            license_num: new.license_num,
            license_category: new.license_category,
            expires_at: new.expires_at,
            status: DriverStatus::Available,
            created_at: now,
            updated_at: now,
        };
        self.drivers.insert(driver.id.clone(), driver.clone());
        Ok((driver, user))
    }

    async fn update_driver(&self, id: &str, patch: DriverPatch) -> Result<Driver, StoreError> {
        let _guard = self.writer.lock().await;

        let mut driver = self.drivers.get_mut(id).ok_or_else(|| not_found("Driver"))?;
        if let Some(license_num) = patch.license_num {
            driver.license_num = license_num;
        }
        if let Some(license_category) = patch.license_category {
            driver.license_category = license_category;
        }
        if let Some(status) = patch.status {
            driver.status = status;
        }
        if let Some(expires_at) = patch.expires_at {
            driver.expires_at = expires_at;
        }
        driver.updated_at = Utc::now();

        Ok(driver.clone())
    }

    async fn delete_driver(&self, id: &str) -> Result<Driver, StoreError> {
        let _guard = self.writer.lock().await;

        if self.trips.iter().any(|trip| trip.driver_id == id) {
            return Err(StoreError::Conflict(
                "Driver has trips and cannot be deleted".to_string(),
            ));
        }

        let (_, driver) = self.drivers.remove(id).ok_or_else(|| not_found("Driver"))?;
        for mut expense in self.expenses.iter_mut() {
            if expense.driver_id.as_deref() == Some(id) {
                expense.driver_id = None;
            }
        }

        Ok(driver)
    }

    async fn list_trips(&self) -> Result<Vec<Trip>, StoreError> {
        let mut trips: Vec<Trip> = self.trips.iter().map(|entry| entry.value().clone()).collect();
        trips.sort_by_key(|trip| trip.id);
        Ok(trips)
    }

    async fn get_trip(&self, id: i32) -> Result<Option<Trip>, StoreError> {
        Ok(self.trips.get(&id).map(|trip| trip.clone()))
    }

    async fn assign_trip(&self, request: AssignmentRequest) -> Result<TripAssignment, StoreError> {
        let _guard = self.writer.lock().await;

        let vehicle = self.vehicles.get(&request.vehicle_id).map(|v| v.clone());
        let driver = self.drivers.get(&request.driver_id).map(|d| d.clone());
        let mut vehicle =
            check_vehicle(vehicle.as_ref(), request.vehicle_id, request.cargo_weight)?.clone();
        let mut driver = check_driver(driver.as_ref(), &request.driver_id)?.clone();

        let now = Utc::now();
        let trip = Trip {
            id: self.trip_ids.next(),
            origin: request.origin,
            destination: request.destination,
            distance: request.distance,
            deadline: request.deadline,
            finish_date: None,
            driver_id: request.driver_id,
            vehicle_id: request.vehicle_id,
            cargo_weight: request.cargo_weight,
            status: TripStatus::Started,
            created_at: now,
            updated_at: now,
        };
        self.trips.insert(trip.id, trip.clone());

        driver.status = driver.status.on(StatusEvent::TripStarted);
        driver.updated_at = now;
        self.drivers.insert(driver.id.clone(), driver.clone());

        vehicle.status = vehicle.status.on(StatusEvent::TripStarted);
        vehicle.updated_at = now;
        self.vehicles.insert(vehicle.id, vehicle.clone());

        let log = self.append_log(LogKind::Trip, Some(trip.id), None, now);
        let log = LogEntry::bare(&log)
            .with_trip(&trip)
            .with_driver(&driver, self.user_name(&driver.id))
            .with_vehicle(&vehicle);

        Ok(TripAssignment { trip, log })
    }

    async fn update_trip(&self, id: i32, patch: TripPatch) -> Result<Trip, StoreError> {
        let _guard = self.writer.lock().await;

        let current = self
            .trips
            .get(&id)
            .map(|trip| trip.clone())
            .ok_or_else(|| not_found("Trip"))?;
        let now = Utc::now();
        let plan = plan_update(&current, &patch, now)?;

        if let Some(driver_id) = &plan.new_driver {
            let candidate = self.drivers.get(driver_id).map(|d| d.clone());
            check_driver(candidate.as_ref(), driver_id)?;
        }
        if let Some(vehicle_id) = plan.new_vehicle {
            let candidate = self.vehicles.get(&vehicle_id).map(|v| v.clone());
            check_vehicle(candidate.as_ref(), vehicle_id, current.cargo_weight)?;
        }

        if plan.release {
            self.shift_driver(&current.driver_id, StatusEvent::TripClosed, now);
            self.shift_vehicle(current.vehicle_id, StatusEvent::TripClosed, now);
        }
        if let Some(driver_id) = &plan.new_driver {
            self.shift_driver(&current.driver_id, StatusEvent::TripClosed, now);
            self.shift_driver(driver_id, StatusEvent::TripStarted, now);
        }
        if let Some(vehicle_id) = plan.new_vehicle {
            self.shift_vehicle(current.vehicle_id, StatusEvent::TripClosed, now);
            self.shift_vehicle(vehicle_id, StatusEvent::TripStarted, now);
        }

        let mut trip = self.trips.get_mut(&id).ok_or_else(|| not_found("Trip"))?;
        trip.apply(patch, &plan, now);
        Ok(trip.clone())
    }

    async fn delete_trip(&self, id: i32) -> Result<Trip, StoreError> {
        let _guard = self.writer.lock().await;

        let (_, trip) = self.trips.remove(&id).ok_or_else(|| not_found("Trip"))?;
        if trip.status.is_open() {
            let now = Utc::now();
            self.shift_driver(&trip.driver_id, StatusEvent::TripClosed, now);
            self.shift_vehicle(trip.vehicle_id, StatusEvent::TripClosed, now);
        }

        self.logs.retain(|_, log| log.trip_id != Some(id));
        for mut expense in self.expenses.iter_mut() {
            if expense.trip_id == Some(id) {
                expense.trip_id = None;
            }
        }

        Ok(trip)
    }

    async fn list_services(&self) -> Result<Vec<ServiceRecord>, StoreError> {
        let mut services: Vec<ServiceRecord> =
            self.services.iter().map(|entry| entry.value().clone()).collect();
        services.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(services)
    }

    async fn get_service(&self, id: i32) -> Result<Option<ServiceRecord>, StoreError> {
        Ok(self.services.get(&id).map(|service| service.clone()))
    }

    async fn open_service(
        &self,
        request: MaintenanceRequest,
    ) -> Result<ServiceOpening, StoreError> {
        let _guard = self.writer.lock().await;

        if !self.vehicles.contains_key(&request.vehicle_id) {
            return Err(not_found("Vehicle"));
        }

        let now = Utc::now();
        let service = ServiceRecord {
            id: self.service_ids.next(),
            vehicle_id: Some(request.vehicle_id),
            issue: request.issue,
            cost: request.cost,
            created_at: now,
            updated_at: now,
        };
        self.services.insert(service.id, service.clone());

        let log = self.append_log(LogKind::Service, None, Some(service.id), now);
        self.shift_vehicle(request.vehicle_id, StatusEvent::ServiceOpened, now);

        Ok(ServiceOpening {
            log: LogEntry::bare(&log).with_service(&service),
            service,
        })
    }

    async fn update_service(
        &self,
        id: i32,
        patch: ServicePatch,
    ) -> Result<ServiceRecord, StoreError> {
        let _guard = self.writer.lock().await;

        let mut service = self
            .services
            .get_mut(&id)
            .ok_or_else(|| not_found("Service record"))?;
        if let Some(issue) = patch.issue {
            service.issue = issue;
        }
        if let Some(cost) = patch.cost {
            service.cost = cost;
        }
        service.updated_at = Utc::now();

        Ok(service.clone())
    }

    async fn delete_service(&self, id: i32) -> Result<ServiceRecord, StoreError> {
        let _guard = self.writer.lock().await;

        let (_, service) = self
            .services
            .remove(&id)
            .ok_or_else(|| not_found("Service record"))?;
        self.logs.retain(|_, log| log.service_id != Some(id));

        Ok(service)
    }

    async fn list_logs(&self, limit: i64, offset: i64) -> Result<Vec<LogEntry>, StoreError> {
        let mut logs: Vec<LogRecord> = self.logs.iter().map(|entry| entry.value().clone()).collect();
        logs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));

        let skip = usize::try_from(offset).unwrap_or(0);
        let take = usize::try_from(limit).unwrap_or(0);

        Ok(logs
            .iter()
            .skip(skip)
            .take(take)
            .map(|log| self.join_log(log))
            .collect())
    }

    async fn list_expenses(&self) -> Result<Vec<Expense>, StoreError> {
        let mut expenses: Vec<Expense> =
            self.expenses.iter().map(|entry| entry.value().clone()).collect();
        expenses.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| b.id.cmp(&a.id)));
        Ok(expenses)
    }

    async fn create_expense(&self, new: NewExpense) -> Result<Expense, StoreError> {
        let _guard = self.writer.lock().await;

        if let Some(trip_id) = new.trip_id {
            if !self.trips.contains_key(&trip_id) {
                return Err(not_found("Trip"));
            }
        }
        if let Some(driver_id) = &new.driver_id {
            if !self.drivers.contains_key(driver_id) {
                return Err(not_found("Driver"));
            }
        }

        let expense = Expense {
            id: self.expense_ids.next(),
            kind: new.kind,
            amount: new.amount,
            description: new.description,
            date: new.date,
            trip_id: new.trip_id,
            driver_id: new.driver_id,
            created_at: Utc::now(),
        };
        self.expenses.insert(expense.id, expense.clone());
        Ok(expense)
    }

    async fn delete_expense(&self, id: i32) -> Result<Expense, StoreError> {
        let _guard = self.writer.lock().await;

        self.expenses
            .remove(&id)
            .map(|(_, expense)| expense)
            .ok_or_else(|| not_found("Expense"))
    }
}
