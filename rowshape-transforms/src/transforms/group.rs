//! Group keys shared by the aggregate and pivot transforms

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use rowshape_common::time::{time_bucket, TimeUnit};
use rowshape_common::value::key_of;
use rowshape_common::{Record, Value};

/// Identity of a group.
///
/// Time keys compare by bucket instant, so epoch millis and ISO strings that
/// fall in the same bucket share a group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GroupKey {
    Time(DateTime<Utc>),
    Category(String),
}

/// Derive the key of `row` and the value to emit for the group column.
///
/// Returns `None` when time bucketing is requested and the value does not
/// parse as a timestamp.
pub(crate) fn group_key(
    row: &Record,
    group_by: &str,
    time_unit: Option<TimeUnit>,
) -> Option<(GroupKey, Value)> {
    let value = row.get(group_by);
    match time_unit {
        Some(unit) => {
            let bucket = time_bucket(value, unit)?;
            Some((GroupKey::Time(bucket), Value::Date(bucket)))
        }
        None => Some((
            GroupKey::Category(key_of(value)),
            value.cloned().unwrap_or_default(),
        )),
    }
}

/// Order groups for output: ascending by bucket for time keys, first seen otherwise
pub(crate) fn order_groups<V>(groups: &mut IndexMap<GroupKey, V>, time_based: bool) {
    if time_based {
        groups.sort_keys();
    }
}
