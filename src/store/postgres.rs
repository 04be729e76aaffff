use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions};

use crate::engine::assignment::{
    AssignmentRequest, TripAssignment, check_driver, check_vehicle,
};
use crate::engine::maintenance::{MaintenanceRequest, ServiceOpening};
use crate::engine::transitions::StatusEvent;
use crate::engine::trips::plan_update;
use crate::models::driver::{Driver, DriverPatch, DriverProfile, NewDriver};
use crate::models::expense::{Expense, NewExpense};
use crate::models::log::{LogEntry, LogKind, LogRecord};
use crate::models::service::{ServicePatch, ServiceRecord};
use crate::models::trip::{Trip, TripPatch};
use crate::models::user::User;
use crate::models::vehicle::{NewVehicle, Vehicle, VehiclePatch};
use crate::store::{FleetStore, StoreError};

const LOG_FEED: &str = r#"
    SELECT
        l.id AS log_id, l."type" AS log_type, l.created_at AS log_created_at,
        s.id AS service_id, s.cost AS service_cost, s.issue AS service_issue,
        t.id AS trip_id, t.origin AS trip_origin, t.destination AS trip_destination,
        t.distance AS trip_distance, t.deadline AS trip_deadline,
        t.finish_date AS trip_finish_date,
        d.id AS driver_id, u.name AS driver_name, d.status AS driver_status,
        v.id AS vehicle_id, v.name AS vehicle_name, v.status AS vehicle_status
    FROM log l
    LEFT JOIN service s ON s.id = l.service_id
    LEFT JOIN trip t ON t.id = l.trip_id
    LEFT JOIN driver d ON d.id = t.driver_id
    LEFT JOIN "user" u ON u.id = d.id
    LEFT JOIN vehicle v ON v.id = t.vehicle_id
    ORDER BY l.created_at DESC, l.id DESC
    LIMIT $1 OFFSET $2
"#;

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await?;

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// Maps constraint violations onto store errors; everything else stays a
/// database error.
fn classify(err: sqlx::Error, duplicate: &str, conflict: &str) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        match db.code().as_deref() {
            Some("23505") => return StoreError::Duplicate(duplicate.to_string()),
            Some("23503") => return StoreError::Conflict(conflict.to_string()),
            _ => {}
        }
    }
    StoreError::Database(err)
}

fn not_found(what: &str) -> StoreError {
    StoreError::NotFound(format!("{what} not found"))
}

async fn lock_driver(conn: &mut PgConnection, id: &str) -> Result<Option<Driver>, StoreError> {
    let driver = sqlx::query_as::<_, Driver>("SELECT * FROM driver WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(driver)
}

async fn lock_vehicle(conn: &mut PgConnection, id: i32) -> Result<Option<Vehicle>, StoreError> {
    let vehicle = sqlx::query_as::<_, Vehicle>("SELECT * FROM vehicle WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(vehicle)
}

/// Rows a trip update has to lock: the current holder when it is released or
/// replaced, plus the incoming one, sorted and deduplicated.
fn touched<'a, T: Ord>(current: &'a T, release: bool, incoming: Option<&'a T>) -> Vec<&'a T> {
    let mut ids: Vec<&T> = incoming.into_iter().collect();
    if release || !ids.is_empty() {
        ids.push(current);
    }
    ids.sort();
    ids.dedup();
    ids
}

async fn shift_driver(
    conn: &mut PgConnection,
    id: &str,
    event: StatusEvent,
) -> Result<Option<Driver>, StoreError> {
    let Some(driver) = lock_driver(conn, id).await? else {
        return Ok(None);
    };

    let driver = sqlx::query_as::<_, Driver>(
        "UPDATE driver SET status = $2, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(driver.status.on(event))
    .fetch_one(&mut *conn)
    .await?;
    Ok(Some(driver))
}

async fn shift_vehicle(
    conn: &mut PgConnection,
    id: i32,
    event: StatusEvent,
) -> Result<Option<Vehicle>, StoreError> {
    let Some(vehicle) = lock_vehicle(conn, id).await? else {
        return Ok(None);
    };

    let vehicle = sqlx::query_as::<_, Vehicle>(
        "UPDATE vehicle SET status = $2, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(vehicle.status.on(event))
    .fetch_one(&mut *conn)
    .await?;
    Ok(Some(vehicle))
}

#[async_trait]
impl FleetStore for PgStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn session_user(&self, token: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT u.id, u.name, u.email, u.role, u.created_at
            FROM session s
            JOIN "user" u ON u.id = s.user_id
            WHERE s.token = $1 AND s.expires_at > now()
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let users = sqlx::query_as::<_, User>(
            r#"SELECT id, name, email, role, created_at FROM "user" ORDER BY created_at, id"#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn driver_candidates(&self) -> Result<Vec<User>, StoreError> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT u.id, u.name, u.email, u.role, u.created_at
            FROM "user" u
            LEFT JOIN driver d ON d.id = u.id
            WHERE u.role = 'driver' AND d.id IS NULL
            ORDER BY u.created_at, u.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn list_vehicles(&self) -> Result<Vec<Vehicle>, StoreError> {
        let vehicles = sqlx::query_as::<_, Vehicle>("SELECT * FROM vehicle ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(vehicles)
    }

    async fn get_vehicle(&self, id: i32) -> Result<Option<Vehicle>, StoreError> {
        let vehicle = sqlx::query_as::<_, Vehicle>("SELECT * FROM vehicle WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(vehicle)
    }

    async fn create_vehicle(&self, new: NewVehicle) -> Result<Vehicle, StoreError> {
        let duplicate = format!("Vehicle with plate {} already exists", new.plate);
        sqlx::query_as::<_, Vehicle>(
            r#"
            INSERT INTO vehicle (name, "type", capacity, plate, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(new.name)
        .bind(new.kind)
        .bind(new.capacity)
        .bind(new.plate)
        .bind(new.status)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| classify(err, &duplicate, "Vehicle could not be created"))
    }

    async fn update_vehicle(&self, id: i32, patch: VehiclePatch) -> Result<Vehicle, StoreError> {
        let duplicate = format!(
            "Vehicle with plate {} already exists",
            patch.plate.as_deref().unwrap_or_default()
        );
        sqlx::query_as::<_, Vehicle>(
            r#"
            UPDATE vehicle SET
                name = COALESCE($2, name),
                "type" = COALESCE($3, "type"),
                capacity = COALESCE($4, capacity),
                plate = COALESCE($5, plate),
                status = COALESCE($6, status),
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(patch.name)
        .bind(patch.kind)
        .bind(patch.capacity)
        .bind(patch.plate)
        .bind(patch.status)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| classify(err, &duplicate, "Vehicle could not be updated"))?
        .ok_or_else(|| not_found("Vehicle"))
    }

    async fn delete_vehicle(&self, id: i32) -> Result<Vehicle, StoreError> {
        sqlx::query_as::<_, Vehicle>("DELETE FROM vehicle WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| {
                classify(
                    err,
                    "Vehicle could not be deleted",
                    "Vehicle has trips and cannot be deleted",
                )
            })?
            .ok_or_else(|| not_found("Vehicle"))
    }

    async fn list_drivers(&self) -> Result<Vec<DriverProfile>, StoreError> {
        let drivers = sqlx::query_as::<_, DriverProfile>(
            r#"
            SELECT d.*, u.name, u.email
            FROM driver d
            LEFT JOIN "user" u ON u.id = d.id
            ORDER BY d.created_at, d.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(drivers)
    }

    async fn get_driver(&self, id: &str) -> Result<Option<Driver>, StoreError> {
        let driver = sqlx::query_as::<_, Driver>("SELECT * FROM driver WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(driver)
    }

    async fn create_driver(&self, new: NewDriver) -> Result<(Driver, User), StoreError> {
        let mut tx = self.pool.begin().await?;

        let user = sqlx::query_as::<_, User>(
            r#"SELECT id, name, email, role, created_at FROM "user" WHERE id = $1"#,
        )
        .bind(&new.user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| not_found("User"))?;

        let driver = sqlx::query_as::<_, Driver>(
            r#"
            INSERT INTO driver (id, license_num, license_category, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(new.user_id)
        .bind(new.license_num)
        .bind(new.license_category)
        .bind(new.expires_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|err| {
            classify(
                err,
                "Driver profile already exists for this user",
                "User not found",
            )
        })?;

        tx.commit().await?;
        Ok((driver, user))
    }

    async fn update_driver(&self, id: &str, patch: DriverPatch) -> Result<Driver, StoreError> {
        let driver = sqlx::query_as::<_, Driver>(
            r#"
            UPDATE driver SET
                license_num = COALESCE($2, license_num),
                license_category = COALESCE($3, license_category),
                status = COALESCE($4, status),
                expires_at = COALESCE($5, expires_at),
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(patch.license_num)
        .bind(patch.license_category)
        .bind(patch.status)
        .bind(patch.expires_at)
        .fetch_optional(&self.pool)
        .await?;

        driver.ok_or_else(|| not_found("Driver"))
    }

    async fn delete_driver(&self, id: &str) -> Result<Driver, StoreError> {
        sqlx::query_as::<_, Driver>("DELETE FROM driver WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| {
                classify(
                    err,
                    "Driver could not be deleted",
                    "Driver has trips and cannot be deleted",
                )
            })?
            .ok_or_else(|| not_found("Driver"))
    }

    async fn list_trips(&self) -> Result<Vec<Trip>, StoreError> {
        let trips = sqlx::query_as::<_, Trip>("SELECT * FROM trip ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(trips)
    }

    async fn get_trip(&self, id: i32) -> Result<Option<Trip>, StoreError> {
        let trip = sqlx::query_as::<_, Trip>("SELECT * FROM trip WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(trip)
    }

    async fn assign_trip(&self, request: AssignmentRequest) -> Result<TripAssignment, StoreError> {
        let mut tx = self.pool.begin().await?;

        let driver = lock_driver(&mut tx, &request.driver_id).await?;
        let vehicle = lock_vehicle(&mut tx, request.vehicle_id).await?;
        check_vehicle(vehicle.as_ref(), request.vehicle_id, request.cargo_weight)?;
        check_driver(driver.as_ref(), &request.driver_id)?;

        let trip = sqlx::query_as::<_, Trip>(
            r#"
            INSERT INTO trip
                (origin, destination, distance, deadline, driver_id, vehicle_id, cargo_weight)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(request.origin)
        .bind(request.destination)
        .bind(request.distance)
        .bind(request.deadline)
        .bind(&request.driver_id)
        .bind(request.vehicle_id)
        .bind(request.cargo_weight)
        .fetch_one(&mut *tx)
        .await?;

        let driver = shift_driver(&mut tx, &trip.driver_id, StatusEvent::TripStarted)
            .await?
            .ok_or_else(|| not_found("Driver"))?;
        let vehicle = shift_vehicle(&mut tx, trip.vehicle_id, StatusEvent::TripStarted)
            .await?
            .ok_or_else(|| not_found("Vehicle"))?;

        let log = sqlx::query_as::<_, LogRecord>(
            r#"INSERT INTO log ("type", trip_id) VALUES ($1, $2) RETURNING *"#,
        )
        .bind(LogKind::Trip)
        .bind(trip.id)
        .fetch_one(&mut *tx)
        .await?;

        let driver_name: Option<String> =
            sqlx::query_scalar(r#"SELECT name FROM "user" WHERE id = $1"#)
                .bind(&driver.id)
                .fetch_optional(&mut *tx)
                .await?;

        tx.commit().await?;

        let log = LogEntry::bare(&log)
            .with_trip(&trip)
            .with_driver(&driver, driver_name)
            .with_vehicle(&vehicle);
        Ok(TripAssignment { trip, log })
    }

    async fn update_trip(&self, id: i32, patch: TripPatch) -> Result<Trip, StoreError> {
        let mut tx = self.pool.begin().await?;

        let mut trip = sqlx::query_as::<_, Trip>("SELECT * FROM trip WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| not_found("Trip"))?;
        let now = Utc::now();
        let plan = plan_update(&trip, &patch, now)?;

        // Every driver row is locked before any vehicle row, each group in id
        // order, so this never waits in the opposite order to `assign_trip`.
        let mut drivers = BTreeMap::new();
        for driver_id in touched(&trip.driver_id, plan.release, plan.new_driver.as_ref()) {
            let driver = lock_driver(&mut tx, driver_id).await?;
            drivers.insert(driver_id.clone(), driver);
        }
        let mut vehicles = BTreeMap::new();
        for vehicle_id in touched(&trip.vehicle_id, plan.release, plan.new_vehicle.as_ref()) {
            let vehicle = lock_vehicle(&mut tx, *vehicle_id).await?;
            vehicles.insert(*vehicle_id, vehicle);
        }

        if let Some(driver_id) = &plan.new_driver {
            let candidate = drivers.get(driver_id).and_then(Option::as_ref);
            check_driver(candidate, driver_id)?;
        }
        if let Some(vehicle_id) = plan.new_vehicle {
            let candidate = vehicles.get(&vehicle_id).and_then(Option::as_ref);
            check_vehicle(candidate, vehicle_id, trip.cargo_weight)?;
        }

        if plan.release {
            shift_driver(&mut tx, &trip.driver_id, StatusEvent::TripClosed).await?;
            shift_vehicle(&mut tx, trip.vehicle_id, StatusEvent::TripClosed).await?;
        }
        if let Some(driver_id) = &plan.new_driver {
            shift_driver(&mut tx, &trip.driver_id, StatusEvent::TripClosed).await?;
            shift_driver(&mut tx, driver_id, StatusEvent::TripStarted).await?;
        }
        if let Some(vehicle_id) = plan.new_vehicle {
            shift_vehicle(&mut tx, trip.vehicle_id, StatusEvent::TripClosed).await?;
            shift_vehicle(&mut tx, vehicle_id, StatusEvent::TripStarted).await?;
        }

        trip.apply(patch, &plan, now);
        let trip = sqlx::query_as::<_, Trip>(
            r#"
            UPDATE trip SET
                origin = $2, destination = $3, distance = $4, deadline = $5,
                finish_date = $6, driver_id = $7, vehicle_id = $8, status = $9,
                updated_at = $10
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(trip.id)
        .bind(&trip.origin)
        .bind(&trip.destination)
        .bind(trip.distance)
        .bind(trip.deadline)
        .bind(trip.finish_date)
        .bind(&trip.driver_id)
        .bind(trip.vehicle_id)
        .bind(trip.status)
        .bind(trip.updated_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(trip)
    }

    async fn delete_trip(&self, id: i32) -> Result<Trip, StoreError> {
        let mut tx = self.pool.begin().await?;

        let trip = sqlx::query_as::<_, Trip>("DELETE FROM trip WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| not_found("Trip"))?;

        if trip.status.is_open() {
            shift_driver(&mut tx, &trip.driver_id, StatusEvent::TripClosed).await?;
            shift_vehicle(&mut tx, trip.vehicle_id, StatusEvent::TripClosed).await?;
        }

        tx.commit().await?;
        Ok(trip)
    }

    async fn list_services(&self) -> Result<Vec<ServiceRecord>, StoreError> {
        let services =
            sqlx::query_as::<_, ServiceRecord>("SELECT * FROM service ORDER BY created_at, id")
                .fetch_all(&self.pool)
                .await?;
        Ok(services)
    }

    async fn get_service(&self, id: i32) -> Result<Option<ServiceRecord>, StoreError> {
        let service = sqlx::query_as::<_, ServiceRecord>("SELECT * FROM service WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(service)
    }

    async fn open_service(
        &self,
        request: MaintenanceRequest,
    ) -> Result<ServiceOpening, StoreError> {
        let mut tx = self.pool.begin().await?;

        if lock_vehicle(&mut tx, request.vehicle_id).await?.is_none() {
            return Err(not_found("Vehicle"));
        }

        let service = sqlx::query_as::<_, ServiceRecord>(
            "INSERT INTO service (vehicle_id, issue, cost) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(request.vehicle_id)
        .bind(request.issue)
        .bind(request.cost)
        .fetch_one(&mut *tx)
        .await?;

        let log = sqlx::query_as::<_, LogRecord>(
            r#"INSERT INTO log ("type", service_id) VALUES ($1, $2) RETURNING *"#,
        )
        .bind(LogKind::Service)
        .bind(service.id)
        .fetch_one(&mut *tx)
        .await?;

        shift_vehicle(&mut tx, request.vehicle_id, StatusEvent::ServiceOpened).await?;

        tx.commit().await?;

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
        let service = sqlx::query_as::<_, ServiceRecord>(
            r#"
            UPDATE service SET
                issue = COALESCE($2, issue),
                cost = COALESCE($3, cost),
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(patch.issue)
        .bind(patch.cost)
        .fetch_optional(&self.pool)
        .await?;

        service.ok_or_else(|| not_found("Service record"))
    }

    async fn delete_service(&self, id: i32) -> Result<ServiceRecord, StoreError> {
        let service =
            sqlx::query_as::<_, ServiceRecord>("DELETE FROM service WHERE id = $1 RETURNING *")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        service.ok_or_else(|| not_found("Service record"))
    }

    async fn list_logs(&self, limit: i64, offset: i64) -> Result<Vec<LogEntry>, StoreError> {
        let logs = sqlx::query_as::<_, LogEntry>(LOG_FEED)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        Ok(logs)
    }

    async fn list_expenses(&self) -> Result<Vec<Expense>, StoreError> {
        let expenses =
            sqlx::query_as::<_, Expense>("SELECT * FROM expense ORDER BY date DESC, id DESC")
                .fetch_all(&self.pool)
                .await?;
        Ok(expenses)
    }

    async fn create_expense(&self, new: NewExpense) -> Result<Expense, StoreError> {
        sqlx::query_as::<_, Expense>(
            r#"
            INSERT INTO expense ("type", amount, description, date, trip_id, driver_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(new.kind)
        .bind(new.amount)
        .bind(new.description)
        .bind(new.date)
        .bind(new.trip_id)
        .bind(new.driver_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| match classify(err, "Expense already exists", "") {
            StoreError::Conflict(_) => StoreError::NotFound("Trip or driver not found".to_string()),
            other => other,
        })
    }

    async fn delete_expense(&self, id: i32) -> Result<Expense, StoreError> {
        let expense = sqlx::query_as::<_, Expense>("DELETE FROM expense WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        expense.ok_or_else(|| not_found("Expense"))
    }
}

#[cfg(test)]
mod tests {
    use super::touched;

    #[test]
    fn reassignment_locks_both_holders_in_id_order() {
        let current = "driver-b".to_string();
        let incoming = "driver-a".to_string();
        assert_eq!(
            touched(&current, false, Some(&incoming)),
            vec![&incoming, &current]
        );
    }

    #[test]
    fn release_locks_only_the_current_holder() {
        assert_eq!(touched(&7, true, None), vec![&7]);
        assert_eq!(touched(&7, true, Some(&7)), vec![&7]);
    }

    #[test]
    fn plain_edits_lock_nothing() {
        assert!(touched(&7, false, None).is_empty());
    }
}
