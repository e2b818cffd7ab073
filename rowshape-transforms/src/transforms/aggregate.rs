//! Group-and-reduce transform

use indexmap::IndexMap;
use rowshape_common::time::TimeUnit;
use rowshape_common::value::number_of;
use rowshape_common::{Dataset, Record, Value};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::core::{Transform, TransformOutput};
use super::group::{group_key, order_groups};
use crate::ops::{reduce_with, AggregationType, CalculationMethod};

/// Groups rows by `group_by` and reduces the numeric `field` of each group.
///
/// Rows whose `field` is not a finite number never create a group, so a
/// group with no valid values is absent from the output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregate {
    pub group_by: String,
    pub field: String,
    #[serde(default)]
    pub aggregation_type: AggregationType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_unit: Option<TimeUnit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calculate_type: Option<CalculationMethod>,
}

struct GroupState {
    value: Value,
    values: Vec<f64>,
}

impl Aggregate {
    pub fn new(group_by: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            group_by: group_by.into(),
            field: field.into(),
            aggregation_type: AggregationType::default(),
            time_unit: None,
            calculate_type: None,
        }
    }

    pub fn with_aggregation_type(mut self, aggregation_type: AggregationType) -> Self {
        self.aggregation_type = aggregation_type;
        self
    }

    /// Bucket `group_by` by time instead of using its raw value as a key
    pub fn with_time_unit(mut self, time_unit: TimeUnit) -> Self {
        self.time_unit = Some(time_unit);
        self
    }

    pub fn with_calculate_type(mut self, calculate_type: CalculationMethod) -> Self {
        self.calculate_type = Some(calculate_type);
        self
    }

    #[tracing::instrument(skip_all, fields(group_by = %self.group_by, field = %self.field))]
    pub fn run(&self, data: &[Record]) -> Dataset {
        let time_unit = self.time_unit.map(|unit| unit.resolve(data, &self.group_by));
        let mut groups: IndexMap<_, GroupState> = IndexMap::new();
        let mut skipped = 0usize;

        for row in data {
            let Some((key, value)) = group_key(row, &self.group_by, time_unit) else {
                skipped += 1;
                continue;
            };
            let Some(n) = number_of(row.get(&self.field)) else {
                skipped += 1;
                continue;
            };
            groups
                .entry(key)
                .or_insert_with(|| GroupState {
                    value,
                    values: Vec::new(),
                })
                .values
                .push(n);
        }
        order_groups(&mut groups, time_unit.is_some());
        debug!(groups = groups.len(), skipped, "aggregated rows");

        groups
            .into_values()
            .filter_map(|group| {
                let reduced = reduce_with(self.aggregation_type, self.calculate_type, &group.values)?;
                let mut out = Record::with_capacity(2);
                out.insert(self.group_by.clone(), group.value);
                out.insert(self.field.clone(), Value::Number(reduced));
                Some(out)
            })
            .collect()
    }
}

impl Transform for Aggregate {
    fn apply(&self, data: &[Record]) -> TransformOutput {
        TransformOutput::Data(self.run(data))
    }

    fn name(&self) -> &str {
        "aggregate"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rowshape_common::record;

    fn sales() -> Dataset {
        vec![
            record! {"product" => "A", "sales" => 100},
            record! {"product" => "A", "sales" => 150},
            record! {"product" => "B", "sales" => 200},
        ]
    }

    #[test]
    fn test_sum_by_category() {
        let out = Aggregate::new("product", "sales").run(&sales());
        assert_eq!(
            out,
            vec![
                record! {"product" => "A", "sales" => 250},
                record! {"product" => "B", "sales" => 200},
            ]
        );
    }

    #[test]
    fn test_same_group_key_in_group_and_field() {
        // grouping by the reduced field keeps the reduced value
        let data = vec![record! {"v" => 2}, record! {"v" => 2}];
        let out = Aggregate::new("v", "v").run(&data);
        assert_eq!(out, vec![record! {"v" => 4}]);
    }

    #[test]
    fn test_invalid_values_do_not_create_groups() {
        let data = vec![
            record! {"product" => "A", "sales" => "n/a"},
            record! {"product" => "B", "sales" => 10},
            record! {"product" => "B"},
        ];
        let out = Aggregate::new("product", "sales")
            .with_aggregation_type(AggregationType::Count)
            .run(&data);
        assert_eq!(out, vec![record! {"product" => "B", "sales" => 1}]);
    }

    #[test]
    fn test_calculate_type_overrides() {
        let out = Aggregate::new("product", "sales")
            .with_aggregation_type(AggregationType::Max)
            .with_calculate_type(CalculationMethod::Last)
            .run(&sales());
        assert_eq!(out[0], record! {"product" => "A", "sales" => 150});
    }

    #[test]
    fn test_time_groups_sorted() {
        let data = vec![
            record! {"t" => "2024-01-02T10:00:00Z", "v" => 1},
            record! {"t" => "2024-01-01T10:00:00Z", "v" => 2},
            record! {"t" => "2024-01-02T23:00:00Z", "v" => 3},
        ];
        let out = Aggregate::new("t", "v")
            .with_time_unit(TimeUnit::Date)
            .run(&data);
        let day = |d| Value::Date(Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap());
        assert_eq!(
            out,
            vec![
                record! {"t" => day(1), "v" => 2},
                record! {"t" => day(2), "v" => 4},
            ]
        );
    }

    #[test]
    fn test_serde_defaults() {
        let agg: Aggregate =
            serde_json::from_str(r#"{"groupBy": "product", "field": "sales"}"#).unwrap();
        assert_eq!(agg, Aggregate::new("product", "sales"));
    }
}
