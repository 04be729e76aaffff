use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maintenance record. `vehicle_id` is cleared when the vehicle is deleted.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRecord {
    pub id: i32,
    pub vehicle_id: Option<i32>,
    pub issue: String,
    pub cost: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct ServicePatch {
    pub issue: Option<String>,
    pub cost: Option<i32>,
}
