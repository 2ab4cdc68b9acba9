//! Value conversion for `DATETIME` target columns.
//!
//! SQLite has no date type; applications store timestamps as Unix epoch
//! integers or as text. Both are turned into a calendar timestamp here.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};

use crate::core::value::SqlValue;
use crate::error::{MigrateError, Result};
use crate::typemap::EPOCH_MILLIS_THRESHOLD;

const TEXT_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
];

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S %:z", "%Y-%m-%d %H:%M:%S%.f %:z"];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

/// Convert a value bound for a `DATETIME` column.
///
/// NULL stays NULL. Integers, reals and numeric text are read as Unix epoch
/// seconds in UTC, or milliseconds above 4,000,000,000; fractional seconds
/// are truncated. Text in a common date/time layout is parsed. Other text is
/// returned unchanged for the server to interpret, unless `strict` is set
/// (configured epoch columns), in which case it is an error. Errors make the
/// caller store NULL.
pub fn to_datetime(column: &str, value: SqlValue, strict: bool) -> Result<SqlValue> {
    match value {
        SqlValue::Null => Ok(SqlValue::Null),
        SqlValue::DateTime(_) => Ok(value),
        SqlValue::Integer(epoch) => from_epoch(column, epoch),
        SqlValue::Real(f) => from_real_epoch(column, f),
        SqlValue::Text(s) => from_text(column, s, strict),
        other => Err(MigrateError::ValueConversion {
            column: column.to_string(),
            message: format!("{} value is not a timestamp", other.kind()),
        }),
    }
}

fn from_epoch(column: &str, epoch: i64) -> Result<SqlValue> {
    let secs = if epoch > EPOCH_MILLIS_THRESHOLD {
        epoch / 1000
    } else {
        epoch
    };

    DateTime::from_timestamp(secs, 0)
        .map(|dt| dt.naive_utc())
        .filter(in_mysql_range)
        .map(SqlValue::DateTime)
        .ok_or_else(|| MigrateError::ValueConversion {
            column: column.to_string(),
            message: format!("epoch {} is outside the DATETIME range", epoch),
        })
}

fn from_real_epoch(column: &str, epoch: f64) -> Result<SqlValue> {
    if !epoch.is_finite() {
        return Err(MigrateError::ValueConversion {
            column: column.to_string(),
            message: format!("{} is not a timestamp", epoch),
        });
    }
    // Saturating cast; out-of-range values fail the DATETIME range check.
    from_epoch(column, epoch.floor() as i64)
}

fn from_text(column: &str, text: String, strict: bool) -> Result<SqlValue> {
    let trimmed = text.trim();

    if trimmed.is_empty() {
        return Err(MigrateError::ValueConversion {
            column: column.to_string(),
            message: "empty text is not a timestamp".to_string(),
        });
    }

    if is_epoch_text(trimmed) {
        return if trimmed.contains('.') {
            match trimmed.parse::<f64>() {
                Ok(f) => from_real_epoch(column, f),
                Err(e) => Err(MigrateError::ValueConversion {
                    column: column.to_string(),
                    message: format!("{:?}: {}", trimmed, e),
                }),
            }
        } else {
            match trimmed.parse::<i64>() {
                Ok(epoch) => from_epoch(column, epoch),
                Err(e) => Err(MigrateError::ValueConversion {
                    column: column.to_string(),
                    message: format!("{:?}: {}", trimmed, e),
                }),
            }
        };
    }

    match parse_datetime_text(trimmed) {
        Some(dt) if in_mysql_range(&dt) => Ok(SqlValue::DateTime(dt)),
        Some(_) => Err(MigrateError::ValueConversion {
            column: column.to_string(),
            message: format!("{:?} is outside the DATETIME range", trimmed),
        }),
        None if strict => Err(MigrateError::ValueConversion {
            column: column.to_string(),
            message: format!("{:?} is not a recognised date/time", trimmed),
        }),
        None => Ok(SqlValue::Text(text)),
    }
}

/// Optional `-`, digits, then optionally `.` and more digits.
fn is_epoch_text(text: &str) -> bool {
    let unsigned = text.strip_prefix('-').unwrap_or(text);
    let (whole, frac) = match unsigned.split_once('.') {
        Some((whole, frac)) => (whole, Some(frac)),
        None => (unsigned, None),
    };
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    all_digits(whole) && frac.map_or(true, all_digits)
}

fn parse_datetime_text(text: &str) -> Option<NaiveDateTime> {
    for fmt in TEXT_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(dt);
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }

    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(text, fmt) {
            return Some(dt.naive_utc());
        }
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// MySQL DATETIME supports years 1000 through 9999.
fn in_mysql_range(dt: &NaiveDateTime) -> bool {
    (1000..=9999).contains(&dt.year())
}
