use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "driver_status", rename_all = "lowercase")]
pub enum DriverStatus {
    Available,
    Break,
    Trip,
}

impl DriverStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriverStatus::Available => "available",
            DriverStatus::Break => "break",
            DriverStatus::Trip => "trip",
        }
    }
}

impl fmt::Display for DriverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Driver profile keyed by the owning user's id.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Driver {
    pub id: String,
    pub license_num: String,
    pub license_category: String,
    pub expires_at: DateTime<Utc>,
    pub status: DriverStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// List view: the driver joined with its user's name and email.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DriverProfile {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub driver: Driver,
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewDriver {
    pub user_id: String,
    pub license_num: String,
    pub license_category: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct DriverPatch {
    pub license_num: Option<String>,
    pub license_category: Option<String>,
    pub status: Option<DriverStatus>,
    pub expires_at: Option<DateTime<Utc>>,
}
