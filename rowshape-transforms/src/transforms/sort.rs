//! Order rows by a time field

use rowshape_common::time::parse_timestamp;
use rowshape_common::{Dataset, Record};
use serde::{Deserialize, Serialize};

use super::core::{Transform, TransformOutput};

/// Stable ascending sort on the parsed timestamps of `field`.
///
/// Rows whose field does not parse keep their relative order after the rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortByTime {
    pub field: String,
}

impl SortByTime {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }

    pub fn run(&self, data: &[Record]) -> Dataset {
        let mut keyed: Vec<_> = data
            .iter()
            .map(|row| (row.get(&self.field).and_then(parse_timestamp), row))
            .collect();
        keyed.sort_by(|(a, _), (b, _)| match (a, b) {
            (Some(a), Some(b)) => a.cmp(b),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });
        keyed.into_iter().map(|(_, row)| row.clone()).collect()
    }
}

impl Transform for SortByTime {
    fn apply(&self, data: &[Record]) -> TransformOutput {
        TransformOutput::Data(self.run(data))
    }

    fn name(&self) -> &str {
        "sort_by_time"
    }
}
