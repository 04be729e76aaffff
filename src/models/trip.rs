use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "trip_status", rename_all = "lowercase")]
pub enum TripStatus {
    Started,
    Completed,
    Cancelled,
}

impl TripStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripStatus::Started => "started",
            TripStatus::Completed => "completed",
            TripStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_open(&self) -> bool {
        *self == TripStatus::Started
    }
}

impl fmt::Display for TripStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub id: i32,
    pub origin: String,
    pub destination: String,
    pub distance: i32,
    pub deadline: DateTime<Utc>,
    pub finish_date: Option<DateTime<Utc>>,
    pub driver_id: String,
    pub vehicle_id: i32,
    pub cargo_weight: Option<i32>,
    pub status: TripStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct TripPatch {
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub distance: Option<i32>,
    pub deadline: Option<DateTime<Utc>>,
    pub finish_date: Option<DateTime<Utc>>,
    pub driver_id: Option<String>,
    pub vehicle_id: Option<i32>,
    pub status: Option<TripStatus>,
}
