//! Lenient request inputs. Clients send numbers either as JSON numbers or as
//! numeric strings, and dates either as RFC 3339 timestamps or bare
//! `YYYY-MM-DD` days.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;

use crate::error::AppError;

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Numeric {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Numeric {
    pub fn to_i32(&self, field: &str) -> Result<i32, AppError> {
        let invalid = || AppError::BadRequest(format!("{field} must be a whole number"));
        let value = match self {
            Numeric::Int(value) => *value,
            Numeric::Float(value) if value.fract() == 0.0 => *value as i64,
            Numeric::Float(_) => return Err(invalid()),
            Numeric::Text(raw) => raw.trim().parse::<i64>().map_err(|_| invalid())?,
        };
        i32::try_from(value).map_err(|_| invalid())
    }
}

pub fn parse_timestamp(raw: &str, field: &str) -> Result<DateTime<Utc>, AppError> {
    let raw = raw.trim();

    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at.with_timezone(&Utc));
    }
    if let Ok(at) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(at.and_utc());
    }
    if let Ok(at) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M") {
        return Ok(at.and_utc());
    }
    if let Some(at) = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
    {
        return Ok(at.and_utc());
    }

    Err(AppError::BadRequest(format!("{field} is not a valid date")))
}

/// Empty or whitespace-only strings count as missing.
pub fn text(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

pub fn missing_fields(fields: &str) -> AppError {
    AppError::BadRequest(format!("Missing required fields: {fields}"))
}

/// `?id=` selector shared by every resource.
#[derive(Debug, Default, Deserialize)]
pub struct IdQuery {
    pub id: Option<String>,
}

impl IdQuery {
    pub fn int(&self) -> Result<Option<i32>, AppError> {
        match text(self.id.clone()) {
            Some(raw) => raw
                .trim()
                .parse::<i32>()
                .map(Some)
                .map_err(|_| AppError::BadRequest(format!("Invalid id: {raw}"))),
            None => Ok(None),
        }
    }

    pub fn required_int(&self, resource: &str) -> Result<i32, AppError> {
        self.int()?
            .ok_or_else(|| AppError::BadRequest(format!("{resource} ID required")))
    }

    pub fn required_text(&self, resource: &str) -> Result<String, AppError> {
        text(self.id.clone())
            .ok_or_else(|| AppError::BadRequest(format!("{resource} ID required")))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, Timelike};
    use serde_json::json;

    use super::*;

    #[test]
    fn numbers_arrive_as_numbers_or_strings() {
        let parsed: Numeric = serde_json::from_value(json!(1500)).unwrap();
        assert_eq!(parsed.to_i32("cargoWeight").unwrap(), 1500);

        let parsed: Numeric = serde_json::from_value(json!(" 42 ")).unwrap();
        assert_eq!(parsed.to_i32("distance").unwrap(), 42);

        let parsed: Numeric = serde_json::from_value(json!(12.0)).unwrap();
        assert_eq!(parsed.to_i32("cost").unwrap(), 12);
    }

    #[test]
    fn non_numeric_input_is_rejected() {
        let parsed: Numeric = serde_json::from_value(json!("heavy")).unwrap();
        assert!(parsed.to_i32("capacity").is_err());

        let parsed: Numeric = serde_json::from_value(json!(2.5)).unwrap();
        assert!(parsed.to_i32("capacity").is_err());

        let parsed: Numeric = serde_json::from_value(json!(10_000_000_000i64)).unwrap();
        assert!(parsed.to_i32("capacity").is_err());
    }

    #[test]
    fn timestamps_accept_days_and_rfc3339() {
        let day = parse_timestamp("2025-03-14", "deadline").unwrap();
        assert_eq!((day.year(), day.month(), day.day(), day.hour()), (2025, 3, 14, 0));

        let at = parse_timestamp("2025-03-14T09:30:00+02:00", "deadline").unwrap();
        assert_eq!(at.hour(), 7);

        let local = parse_timestamp("2025-03-14T09:30", "deadline").unwrap();
        assert_eq!(local.minute(), 30);

        assert!(parse_timestamp("next tuesday", "deadline").is_err());
    }

    #[test]
    fn id_query_reports_missing_and_invalid_ids() {
        let missing = IdQuery::default();
        assert_eq!(missing.int().unwrap(), None);
        assert_eq!(
            missing.required_int("Vehicle").unwrap_err().to_string(),
            "bad request: Vehicle ID required"
        );

        let invalid = IdQuery {
            id: Some("abc".to_string()),
        };
        assert!(invalid.int().is_err());

        let valid = IdQuery {
            id: Some("7".to_string()),
        };
        assert_eq!(valid.required_int("Trip").unwrap(), 7);
    }
}
