//! value and timestamp formatting for the dashboard views

use crate::config::SensorConfig;
use crate::domain::SensorKind;

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};

pub const MOTION_DETECTED: &str = "Detectado";
pub const MOTION_ABSENT: &str = "Ausente";
pub const INVALID_TIMESTAMP: &str = "invalid timestamp";

/// parse a stored timestamp; naive values are taken as utc
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// ISO-8601 in the display offset
pub fn to_local(raw: &str, offset: &FixedOffset) -> String {
    match parse_timestamp(raw) {
        Some(dt) => dt.with_timezone(offset).to_rfc3339(),
        None => INVALID_TIMESTAMP.to_string(),
    }
}

/// dd/mm/YYYY HH:MM:SS in the display offset
pub fn format_timestamp(raw: &str, offset: &FixedOffset) -> String {
    match parse_timestamp(raw) {
        Some(dt) => dt.with_timezone(offset).format("%d/%m/%Y %H:%M:%S").to_string(),
        None => INVALID_TIMESTAMP.to_string(),
    }
}

/// render a value the way its sensor wants it shown
///
/// unknown sensors get the plain value.
pub fn format_value(value: f64, sensor: Option<&SensorConfig>) -> String {
    match sensor {
        Some(s) if s.kind == SensorKind::Motion => {
            let label = if value >= 0.5 { MOTION_DETECTED } else { MOTION_ABSENT };
            label.to_string()
        }
        Some(s) => format!("{:.*}", s.precision, value),
        None => value.to_string(),
    }
}
