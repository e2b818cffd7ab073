//! Spread a categorical field into columns

use indexmap::{IndexMap, IndexSet};
use rowshape_common::time::TimeUnit;
use rowshape_common::value::{normalize_empty_value, number_of};
use rowshape_common::{Dataset, Record, Value};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::core::{Transform, TransformOutput};
use super::group::{group_key, order_groups};
use crate::ops::AggregationType;

/// Groups rows by `group_by` and emits one column per distinct value of `pivot`.
///
/// The column set is computed over the whole input, so every output row has
/// the same keys. Cells without values are `Null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pivot {
    pub group_by: String,
    pub pivot: String,
    pub field: String,
    /// When absent, cells hold the collected values; a single value is unwrapped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation_type: Option<AggregationType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_unit: Option<TimeUnit>,
}

struct PivotGroup {
    value: Value,
    cells: IndexMap<String, Vec<f64>>,
}

impl Pivot {
    pub fn new(
        group_by: impl Into<String>,
        pivot: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        Self {
            group_by: group_by.into(),
            pivot: pivot.into(),
            field: field.into(),
            aggregation_type: None,
            time_unit: None,
        }
    }

    pub fn with_aggregation_type(mut self, aggregation_type: AggregationType) -> Self {
        self.aggregation_type = Some(aggregation_type);
        self
    }

    pub fn with_time_unit(mut self, time_unit: TimeUnit) -> Self {
        self.time_unit = Some(time_unit);
        self
    }

    #[tracing::instrument(skip_all, fields(group_by = %self.group_by, pivot = %self.pivot))]
    pub fn run(&self, data: &[Record]) -> Dataset {
        let columns: IndexSet<String> = data
            .iter()
            .map(|row| normalize_empty_value(row.get(&self.pivot)))
            .collect();
        let time_unit = self.time_unit.map(|unit| unit.resolve(data, &self.group_by));

        let mut groups: IndexMap<_, PivotGroup> = IndexMap::new();
        for row in data {
            let Some((key, value)) = group_key(row, &self.group_by, time_unit) else {
                continue;
            };
            let group = groups.entry(key).or_insert_with(|| PivotGroup {
                value,
                cells: IndexMap::new(),
            });
            if let Some(n) = number_of(row.get(&self.field)) {
                group
                    .cells
                    .entry(normalize_empty_value(row.get(&self.pivot)))
                    .or_default()
                    .push(n);
            }
        }
        order_groups(&mut groups, time_unit.is_some());
        debug!(groups = groups.len(), columns = columns.len(), "pivoted rows");

        groups
            .into_values()
            .map(|group| {
                let mut out = Record::with_capacity(columns.len() + 1);
                out.insert(self.group_by.clone(), group.value);
                for column in &columns {
                    let values = group.cells.get(column).map(Vec::as_slice).unwrap_or_default();
                    out.insert(column.clone(), self.cell(values));
                }
                out
            })
            .collect()
    }

    fn cell(&self, values: &[f64]) -> Value {
        match self.aggregation_type {
            Some(op) => op.reduce(values).map(Value::Number).unwrap_or_default(),
            None => match values {
                [] => Value::Null,
                [single] => Value::Number(*single),
                many => Value::Array(many.iter().copied().map(Value::Number).collect()),
            },
        }
    }
}

impl Transform for Pivot {
    fn apply(&self, data: &[Record]) -> TransformOutput {
        TransformOutput::Data(self.run(data))
    }

    fn name(&self) -> &str {
        "pivot"
    }
}
