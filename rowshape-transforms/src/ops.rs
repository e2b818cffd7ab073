//! Reducers applied to the numeric values collected for a group, cell or bin

use std::collections::HashSet;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, VariantNames};

/// How the valid values of a group are combined
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, VariantNames,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum AggregationType {
    #[default]
    Sum,
    Mean,
    Max,
    Min,
    Count,
    /// Keep the first value in insertion order
    None,
}

impl AggregationType {
    /// Reduce `values`, returning `None` for an empty pool
    pub fn reduce(&self, values: &[f64]) -> Option<f64> {
        let first = *values.first()?;
        Some(match self {
            AggregationType::Sum => values.iter().sum(),
            AggregationType::Mean => values.iter().sum::<f64>() / values.len() as f64,
            AggregationType::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            AggregationType::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            AggregationType::Count => values.len() as f64,
            AggregationType::None => first,
        })
    }
}

/// Alternate reducers that take precedence over [`AggregationType`] when set
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, VariantNames,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum CalculationMethod {
    First,
    Last,
    Min,
    Max,
    Mean,
    Median,
    /// Population variance
    Variance,
    Count,
    DistinctCount,
    Total,
}

impl CalculationMethod {
    pub fn calculate(&self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        Some(match self {
            CalculationMethod::First => values[0],
            CalculationMethod::Last => values[values.len() - 1],
            CalculationMethod::Min => AggregationType::Min.reduce(values)?,
            CalculationMethod::Max => AggregationType::Max.reduce(values)?,
            CalculationMethod::Mean => AggregationType::Mean.reduce(values)?,
            CalculationMethod::Median => {
                let mut sorted = values.to_vec();
                sorted.sort_by(f64::total_cmp);
                let mid = sorted.len() / 2;
                if sorted.len() % 2 == 0 {
                    (sorted[mid - 1] + sorted[mid]) / 2.0
                } else {
                    sorted[mid]
                }
            }
            CalculationMethod::Variance => {
                let mean = values.iter().sum::<f64>() / n;
                values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
            }
            CalculationMethod::Count => n,
            CalculationMethod::DistinctCount => values
                .iter()
                .map(|v| OrderedFloat(*v))
                .collect::<HashSet<_>>()
                .len() as f64,
            CalculationMethod::Total => values.iter().sum(),
        })
    }
}

/// The reducer in effect for a transform: a calculation override wins over the aggregation type
pub(crate) fn reduce_with(
    aggregation_type: AggregationType,
    calculate_type: Option<CalculationMethod>,
    values: &[f64],
) -> Option<f64> {
    match calculate_type {
        Some(method) => method.calculate(values),
        None => aggregation_type.reduce(values),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::str::FromStr;

    const VALUES: &[f64] = &[4.0, 1.0, 3.0, 1.0];

    #[rstest]
    #[case(AggregationType::Sum, 9.0)]
    #[case(AggregationType::Mean, 2.25)]
    #[case(AggregationType::Max, 4.0)]
    #[case(AggregationType::Min, 1.0)]
    #[case(AggregationType::Count, 4.0)]
    #[case(AggregationType::None, 4.0)]
    fn test_reduce(#[case] op: AggregationType, #[case] expected: f64) {
        assert_eq!(op.reduce(VALUES), Some(expected));
    }

    #[test]
    fn test_reduce_empty() {
        assert_eq!(AggregationType::Sum.reduce(&[]), None);
        assert_eq!(AggregationType::Count.reduce(&[]), None);
        assert_eq!(CalculationMethod::Last.calculate(&[]), None);
    }

    #[rstest]
    #[case(CalculationMethod::First, 4.0)]
    #[case(CalculationMethod::Last, 1.0)]
    #[case(CalculationMethod::Min, 1.0)]
    #[case(CalculationMethod::Max, 4.0)]
    #[case(CalculationMethod::Mean, 2.25)]
    #[case(CalculationMethod::Median, 2.0)]
    #[case(CalculationMethod::Variance, 1.6875)]
    #[case(CalculationMethod::Count, 4.0)]
    #[case(CalculationMethod::DistinctCount, 3.0)]
    #[case(CalculationMethod::Total, 9.0)]
    fn test_calculate(#[case] method: CalculationMethod, #[case] expected: f64) {
        assert_eq!(method.calculate(VALUES), Some(expected));
    }

    #[test]
    fn test_median_odd() {
        assert_eq!(CalculationMethod::Median.calculate(&[5.0, 1.0, 3.0]), Some(3.0));
    }

    #[test]
    fn test_calculation_overrides_aggregation() {
        assert_eq!(
            reduce_with(AggregationType::Sum, Some(CalculationMethod::Last), VALUES),
            Some(1.0)
        );
        assert_eq!(reduce_with(AggregationType::Sum, None, VALUES), Some(9.0));
    }

    #[test]
    fn test_parse_names() {
        assert_eq!(AggregationType::from_str("SUM").unwrap(), AggregationType::Sum);
        assert_eq!(AggregationType::from_str("none").unwrap(), AggregationType::None);
        assert_eq!(
            CalculationMethod::from_str("distinct_count").unwrap(),
            CalculationMethod::DistinctCount
        );
        let op: AggregationType = serde_json::from_str("\"mean\"").unwrap();
        assert_eq!(op, AggregationType::Mean);
    }
}
