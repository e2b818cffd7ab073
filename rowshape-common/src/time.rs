use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, VariantNames};

use crate::value::{Record, Value};

const SECOND_MS: f64 = 1000.0;
const MINUTE_MS: f64 = 60.0 * SECOND_MS;
const HOUR_MS: f64 = 60.0 * MINUTE_MS;
const DAY_MS: f64 = 24.0 * HOUR_MS;
const MONTH_MS: f64 = 30.0 * DAY_MS;

/// Target number of buckets used when inferring a unit for [`TimeUnit::Auto`]
const AUTO_TARGET_BUCKETS: f64 = 30.0;

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Granularity of a time bucket
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, VariantNames,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TimeUnit {
    Year,
    Month,
    /// Calendar day
    #[default]
    #[serde(alias = "day")]
    #[strum(to_string = "date", serialize = "day")]
    Date,
    Hour,
    Minute,
    Second,
    /// Pick a unit from the span of the data, see [`infer_time_unit`]
    Auto,
}

impl TimeUnit {
    /// Truncate a timestamp to the start of its bucket, in UTC.
    ///
    /// An unresolved `Auto` buckets by day.
    pub fn floor(&self, ts: &DateTime<Utc>) -> Option<DateTime<Utc>> {
        let naive = ts.naive_utc();
        let date = naive.date();
        let floored = match self {
            TimeUnit::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1)?.and_hms_opt(0, 0, 0)?,
            TimeUnit::Month => {
                NaiveDate::from_ymd_opt(date.year(), date.month(), 1)?.and_hms_opt(0, 0, 0)?
            }
            TimeUnit::Date | TimeUnit::Auto => date.and_hms_opt(0, 0, 0)?,
            TimeUnit::Hour => date.and_hms_opt(naive.hour(), 0, 0)?,
            TimeUnit::Minute => date.and_hms_opt(naive.hour(), naive.minute(), 0)?,
            TimeUnit::Second => date.and_hms_opt(naive.hour(), naive.minute(), naive.second())?,
        };
        Some(Utc.from_utc_datetime(&floored))
    }

    /// Replace `Auto` with a concrete unit inferred from `field` over `data`
    pub fn resolve(self, data: &[Record], field: &str) -> TimeUnit {
        match self {
            TimeUnit::Auto => infer_time_unit(data, field),
            unit => unit,
        }
    }
}

/// Parse a record value as a timestamp.
///
/// Numbers are epoch milliseconds. Strings may be RFC 3339, or naive
/// date-times/dates which are read as UTC.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Date(d) => Some(*d),
        Value::Number(n) if n.is_finite() => DateTime::from_timestamp_millis(n.trunc() as i64),
        Value::String(s) => parse_timestamp_str(s.trim()),
        _ => None,
    }
}

fn parse_timestamp_str(s: &str) -> Option<DateTime<Utc>> {
    if s.is_empty() {
        return None;
    }
    if let Ok(d) = DateTime::parse_from_rfc3339(s) {
        return Some(d.with_timezone(&Utc));
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Parse and bucket a value in one step
pub fn time_bucket(value: Option<&Value>, unit: TimeUnit) -> Option<DateTime<Utc>> {
    let ts = parse_timestamp(value?)?;
    unit.floor(&ts)
}

/// Choose a bucket unit so the span of `field` splits into roughly 30 buckets.
///
/// Falls back to [`TimeUnit::Date`] when no value of `field` parses as a timestamp.
pub fn infer_time_unit(data: &[Record], field: &str) -> TimeUnit {
    let span = data
        .iter()
        .filter_map(|row| row.get(field).and_then(parse_timestamp))
        .map(|ts| ts.timestamp_millis())
        .fold(None, |acc: Option<(i64, i64)>, t| match acc {
            None => Some((t, t)),
            Some((lo, hi)) => Some((lo.min(t), hi.max(t))),
        });
    let Some((first, last)) = span else {
        return TimeUnit::Date;
    };

    let interval = (last - first) as f64 / AUTO_TARGET_BUCKETS;
    if interval <= SECOND_MS {
        TimeUnit::Second
    } else if interval <= MINUTE_MS {
        TimeUnit::Minute
    } else if interval <= HOUR_MS {
        TimeUnit::Hour
    } else if interval <= DAY_MS {
        TimeUnit::Date
    } else if interval <= MONTH_MS {
        TimeUnit::Month
    } else {
        TimeUnit::Year
    }
}
