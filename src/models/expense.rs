use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "expense_type", rename_all = "lowercase")]
pub enum ExpenseKind {
    Fuel,
    Maintenance,
    Other,
}

impl ExpenseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpenseKind::Fuel => "fuel",
            ExpenseKind::Maintenance => "maintenance",
            ExpenseKind::Other => "other",
        }
    }
}

impl fmt::Display for ExpenseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExpenseKind {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "fuel" => Ok(ExpenseKind::Fuel),
            "maintenance" => Ok(ExpenseKind::Maintenance),
            "other" => Ok(ExpenseKind::Other),
            other => Err(format!("unknown expense type: {other}")),
        }
    }
}

/// Where an entry of the expense feed comes from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExpenseSource {
    Service,
    Trip,
    Manual,
}

/// Manually logged fuel or other cost.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub id: i32,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub kind: ExpenseKind,
    pub amount: i32,
    pub description: String,
    pub date: DateTime<Utc>,
    pub trip_id: Option<i32>,
    pub driver_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewExpense {
    pub kind: ExpenseKind,
    pub amount: i32,
    pub description: String,
    pub date: DateTime<Utc>,
    pub trip_id: Option<i32>,
    pub driver_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseEntry {
    pub id: i32,
    #[serde(rename = "type")]
    pub kind: ExpenseKind,
    pub amount: i64,
    pub description: String,
    pub date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trip_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver_id: Option<String>,
    pub source: ExpenseSource,
}
