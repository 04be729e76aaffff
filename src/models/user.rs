use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    Dispatcher,
    Driver,
    Safety,
    Analyst,
}

impl FromStr for Role {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "admin" => Ok(Role::Admin),
            "manager" => Ok(Role::Manager),
            "dispatcher" => Ok(Role::Dispatcher),
            "driver" => Ok(Role::Driver),
            "safety" => Ok(Role::Safety),
            "analyst" => Ok(Role::Analyst),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Account row owned by the session provider. The role is kept as written
/// there; unknown values simply grant nothing.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn role(&self) -> Option<Role> {
        self.role.parse().ok()
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::Role;

    #[test]
    fn parses_known_roles() {
        assert_eq!("dispatcher".parse::<Role>(), Ok(Role::Dispatcher));
        assert_eq!("analyst".parse::<Role>(), Ok(Role::Analyst));
    }

    #[test]
    fn rejects_unknown_and_miscased_roles() {
        assert!("Admin".parse::<Role>().is_err());
        assert!("superuser".parse::<Role>().is_err());
    }
}
