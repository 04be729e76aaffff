use serde::Serialize;

use crate::models::expense::{Expense, ExpenseEntry, ExpenseKind, ExpenseSource};
use crate::models::service::ServiceRecord;
use crate::models::trip::Trip;

/// Fuel estimate ids are shifted so they do not collide with service ids.
pub const FUEL_ID_OFFSET: i32 = 10_000;

/// Estimated fuel cost is half a currency unit per kilometre, rounded half up.
pub fn fuel_estimate(distance: i32) -> i64 {
    (i64::from(distance.max(0)) + 1) / 2
}

/// Merges service costs, per-trip fuel estimates and manually logged expenses
/// into one feed, newest first, optionally restricted to one expense type.
pub fn expense_feed(
    services: &[ServiceRecord],
    trips: &[Trip],
    manual: &[Expense],
    filter: Option<ExpenseKind>,
) -> Vec<ExpenseEntry> {
    let wanted = |kind: ExpenseKind| filter.is_none_or(|f| f == kind);
    let mut feed = Vec::new();

    if wanted(ExpenseKind::Maintenance) {
        feed.extend(services.iter().map(|service| ExpenseEntry {
            id: service.id,
            kind: ExpenseKind::Maintenance,
            amount: i64::from(service.cost),
            description: service.issue.clone(),
            date: service.created_at,
            trip_id: None,
            driver_id: None,
            source: ExpenseSource::Service,
        }));
    }

    if wanted(ExpenseKind::Fuel) {
        feed.extend(trips.iter().map(|trip| ExpenseEntry {
            id: trip.id.saturating_add(FUEL_ID_OFFSET),
            kind: ExpenseKind::Fuel,
            amount: fuel_estimate(trip.distance),
            description: format!("Trip #{} - Fuel estimate", trip.id),
            date: trip.deadline,
            trip_id: Some(trip.id),
            driver_id: Some(trip.driver_id.clone()),
            source: ExpenseSource::Trip,
        }));
    }

    feed.extend(
        manual
            .iter()
            .filter(|expense| wanted(expense.kind))
            .map(|expense| ExpenseEntry {
                id: expense.id,
                kind: expense.kind,
                amount: i64::from(expense.amount),
                description: expense.description.clone(),
                date: expense.date,
                trip_id: expense.trip_id,
                driver_id: expense.driver_id.clone(),
                source: ExpenseSource::Manual,
            }),
    );

    feed.sort_by(|a, b| b.date.cmp(&a.date));
    feed
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardKpi {
    pub total_vehicles: usize,
    pub active_trips: usize,
    pub total_drivers: usize,
    pub maintenance_alerts: usize,
    pub total_expenses: i64,
    pub fuel_cost: i64,
    pub maintenance_cost: i64,
}

pub fn dashboard_kpi(
    total_vehicles: usize,
    trips: &[Trip],
    total_drivers: usize,
    services: &[ServiceRecord],
    feed: &[ExpenseEntry],
) -> DashboardKpi {
    let cost_of = |kind: ExpenseKind| -> i64 {
        feed.iter()
            .filter(|entry| entry.kind == kind)
            .map(|entry| entry.amount)
            .sum()
    };

    DashboardKpi {
        total_vehicles,
        active_trips: trips.iter().filter(|trip| trip.status.is_open()).count(),
        total_drivers,
        maintenance_alerts: services.len(),
        total_expenses: feed.iter().map(|entry| entry.amount).sum(),
        fuel_cost: cost_of(ExpenseKind::Fuel),
        maintenance_cost: cost_of(ExpenseKind::Maintenance),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::models::trip::TripStatus;

    fn service(id: i32, cost: i32, days_ago: i64) -> ServiceRecord {
        let at = Utc::now() - Duration::days(days_ago);
        ServiceRecord {
            id,
            vehicle_id: Some(1),
            issue: format!("issue {id}"),
            cost,
            created_at: at,
            updated_at: at,
        }
    }

    fn trip(id: i32, distance: i32, days_ago: i64, status: TripStatus) -> Trip {
        let at = Utc::now() - Duration::days(days_ago);
        Trip {
            id,
            origin: "A".to_string(),
            destination: "B".to_string(),
            distance,
            deadline: at,
            finish_date: None,
            driver_id: "driver-1".to_string(),
            vehicle_id: 1,
            cargo_weight: None,
            status,
            created_at: at,
            updated_at: at,
        }
    }

    fn manual(id: i32, kind: ExpenseKind, amount: i32, days_ago: i64) -> Expense {
        let at = Utc::now() - Duration::days(days_ago);
        Expense {
            id,
            kind,
            amount,
            description: "toll".to_string(),
            date: at,
            trip_id: None,
            driver_id: None,
            created_at: at,
        }
    }

    #[test]
    fn fuel_estimate_rounds_half_up() {
        assert_eq!(fuel_estimate(200), 100);
        assert_eq!(fuel_estimate(3), 2);
        assert_eq!(fuel_estimate(1), 1);
        assert_eq!(fuel_estimate(0), 0);
    }

    #[test]
    fn feed_merges_sources_newest_first() {
        let services = [service(1, 300, 5)];
        let trips = [trip(4, 150, 1, TripStatus::Started)];
        let others = [manual(2, ExpenseKind::Other, 40, 3)];

        let feed = expense_feed(&services, &trips, &others, None);

        assert_eq!(feed.len(), 3);
        assert_eq!(feed[0].source, ExpenseSource::Trip);
        assert_eq!(feed[0].id, 10_004);
        assert_eq!(feed[0].amount, 75);
        assert_eq!(feed[0].description, "Trip #4 - Fuel estimate");
        assert_eq!(feed[0].driver_id.as_deref(), Some("driver-1"));
        assert_eq!(feed[1].source, ExpenseSource::Manual);
        assert_eq!(feed[2].kind, ExpenseKind::Maintenance);
        assert_eq!(feed[2].description, "issue 1");
    }

    #[test]
    fn feed_filters_by_type() {
        let services = [service(1, 300, 5)];
        let trips = [trip(4, 150, 1, TripStatus::Started)];
        let others = [
            manual(2, ExpenseKind::Other, 40, 3),
            manual(3, ExpenseKind::Fuel, 60, 2),
        ];

        let fuel = expense_feed(&services, &trips, &others, Some(ExpenseKind::Fuel));
        assert_eq!(fuel.len(), 2);
        assert!(fuel.iter().all(|entry| entry.kind == ExpenseKind::Fuel));

        let maintenance =
            expense_feed(&services, &trips, &others, Some(ExpenseKind::Maintenance));
        assert_eq!(maintenance.len(), 1);
        assert_eq!(maintenance[0].amount, 300);
    }

    #[test]
    fn kpis_sum_the_feed() {
        let services = [service(1, 300, 5), service(2, 120, 4)];
        let trips = [
            trip(1, 100, 1, TripStatus::Started),
            trip(2, 40, 2, TripStatus::Completed),
        ];
        let feed = expense_feed(&services, &trips, &[], None);

        let kpi = dashboard_kpi(5, &trips, 3, &services, &feed);

        assert_eq!(kpi.total_vehicles, 5);
        assert_eq!(kpi.active_trips, 1);
        assert_eq!(kpi.total_drivers, 3);
        assert_eq!(kpi.maintenance_alerts, 2);
        assert_eq!(kpi.fuel_cost, 70);
        assert_eq!(kpi.maintenance_cost, 420);
        assert_eq!(kpi.total_expenses, 490);
    }
}
