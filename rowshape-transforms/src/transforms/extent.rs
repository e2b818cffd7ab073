//! Axis extent byproduct

use rowshape_common::value::number_of;
use rowshape_common::{Options, Record, Value};
use serde::{Deserialize, Serialize};

use super::core::{Transform, TransformOutput};

/// Option key under which the y axis extent is published
pub const Y_AXIS_EXTENT_KEY: &str = "yAxisExtend";

/// Computes the largest per-row sum of `fields`, the top of a stacked y axis.
///
/// Emits a byproduct rather than rows, so the data chain passes through unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YAxisExtent {
    pub fields: Vec<String>,
}

impl YAxisExtent {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn extent(&self, data: &[Record]) -> Option<f64> {
        data.iter()
            .filter_map(|row| {
                let values: Vec<f64> = self
                    .fields
                    .iter()
                    .filter_map(|field| number_of(row.get(field)))
                    .collect();
                (!values.is_empty()).then(|| values.iter().sum::<f64>())
            })
            .reduce(f64::max)
    }
}

impl Transform for YAxisExtent {
    fn apply(&self, data: &[Record]) -> TransformOutput {
        let mut options = Options::new();
        if let Some(max) = self.extent(data) {
            options.insert(Y_AXIS_EXTENT_KEY.to_string(), Value::Number(max));
        }
        TransformOutput::Byproduct(options)
    }

    fn name(&self) -> &str {
        "y_axis_extent"
    }
}
