//! Binning transform for numeric histograms

use std::collections::BTreeMap;

use rowshape_common::value::number_of;
use rowshape_common::{Dataset, Record, Value};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::core::{Transform, TransformOutput};
use crate::ops::AggregationType;

/// Target bucket count when neither a size nor a count is configured
pub const DEFAULT_BIN_COUNT: usize = 30;

/// Bucket width configuration; `size` wins over `count` when both are set
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BinConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

impl BinConfig {
    pub fn size(size: f64) -> Self {
        Self {
            size: Some(size),
            count: None,
        }
    }

    pub fn count(count: usize) -> Self {
        Self {
            size: None,
            count: Some(count),
        }
    }

    /// Width of a bucket over `[min, max]`.
    ///
    /// An explicit size is used verbatim. Count-derived widths are rounded up
    /// to a nice number. A size that is not a positive finite number is ignored.
    pub fn step(&self, min: f64, max: f64) -> f64 {
        match self.size {
            Some(size) if size.is_finite() && size > 0.0 => size,
            _ => self.count_step(min, max),
        }
    }

    fn count_step(&self, min: f64, max: f64) -> f64 {
        let count = self.count.filter(|c| *c > 0).unwrap_or(DEFAULT_BIN_COUNT) as f64;
        let span = max - min;
        if span.is_finite() {
            nice_step(span / count)
        } else {
            nice_step(max / count - min / count)
        }
    }
}

/// Largest bucket index kept exact when converted to `f64` (2^53)
const MAX_BUCKET_INDEX: f64 = 9_007_199_254_740_992.0;

/// Whether `step` yields representable, distinct bucket edges over `[min, max]`
fn step_fits(step: f64, min: f64, max: f64) -> bool {
    let bin_start = (min / step).floor() * step;
    let magnitude = min.abs().max(max.abs());
    (max - bin_start) / step < MAX_BUCKET_INDEX && magnitude + step > magnitude
}

/// Index of the bucket holding `v`, where bucket `i` starts at `bin_start + i * step`
fn bucket_index(v: f64, bin_start: f64, step: f64) -> i64 {
    let edge = |i: i64| bin_start + i as f64 * step;
    let mut index = ((v - bin_start) / step).floor() as i64;
    // float error can land a value one bucket off its edges
    while index > i64::MIN && edge(index) > v {
        index -= 1;
    }
    while let Some(next) = index.checked_add(1) {
        if edge(next) > v {
            break;
        }
        index = next;
    }
    index
}

/// Round `raw` up to 1, 2, 5 or 10 times a power of ten
pub fn nice_step(raw: f64) -> f64 {
    if !raw.is_finite() || raw <= 0.0 {
        return 1.0;
    }
    let magnitude = 10f64.powf(raw.log10().floor());
    let fraction = raw / magnitude;
    let nice = if fraction <= 1.0 {
        1.0
    } else if fraction <= 2.0 {
        2.0
    } else if fraction <= 5.0 {
        5.0
    } else {
        10.0
    };
    nice * magnitude
}

/// One emitted bucket, covering `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BinBucket {
    pub start: f64,
    pub end: f64,
    pub value: f64,
}

impl BinBucket {
    pub fn contains(&self, v: f64) -> bool {
        self.start <= v && v < self.end
    }

    pub fn to_record(&self) -> Record {
        let mut out = Record::with_capacity(3);
        out.insert("start".to_string(), Value::Number(self.start));
        out.insert("end".to_string(), Value::Number(self.end));
        out.insert("value".to_string(), Value::Number(self.value));
        out
    }
}

/// Buckets rows by a numeric field and counts them, or reduces a value field per bucket.
///
/// Only buckets holding at least one row are emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bin {
    #[serde(default)]
    pub bin: BinConfig,
    pub bin_field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_field: Option<String>,
    /// Reducer for `value_field`; sums when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation_type: Option<AggregationType>,
}

#[derive(Default)]
struct Pool {
    rows: usize,
    values: Vec<f64>,
}

impl Bin {
    pub fn new(bin_field: impl Into<String>) -> Self {
        Self {
            bin: BinConfig::default(),
            bin_field: bin_field.into(),
            value_field: None,
            aggregation_type: None,
        }
    }

    pub fn size(mut self, size: f64) -> Self {
        self.bin.size = Some(size);
        self
    }

    pub fn count(mut self, count: usize) -> Self {
        self.bin.count = Some(count);
        self
    }

    pub fn value_field(mut self, field: impl Into<String>) -> Self {
        self.value_field = Some(field.into());
        self
    }

    pub fn aggregate(mut self, aggregation_type: AggregationType) -> Self {
        self.aggregation_type = Some(aggregation_type);
        self
    }

    fn pool_value(&self, pool: &Pool) -> Option<f64> {
        match &self.value_field {
            None => Some(pool.rows as f64),
            Some(_) => self.aggregation_type.unwrap_or_default().reduce(&pool.values),
        }
    }

    fn add(&self, pool: &mut Pool, row: &Record) {
        pool.rows += 1;
        if let Some(n) = self.value_field.as_ref().and_then(|f| number_of(row.get(f))) {
            pool.values.push(n);
        }
    }

    #[tracing::instrument(skip_all, fields(bin_field = %self.bin_field))]
    pub fn run(&self, data: &[Record]) -> Vec<BinBucket> {
        let points: Vec<(f64, &Record)> = data
            .iter()
            .filter_map(|row| number_of(row.get(&self.bin_field)).map(|v| (v, row)))
            .collect();
        let Some((min, max)) = points.iter().fold(None, |acc: Option<(f64, f64)>, (v, _)| {
            Some(match acc {
                None => (*v, *v),
                Some((lo, hi)) => (lo.min(*v), hi.max(*v)),
            })
        }) else {
            debug!("no numeric values to bin");
            return Vec::new();
        };

        if min == max {
            let mut pool = Pool::default();
            for (_, row) in &points {
                self.add(&mut pool, row);
            }
            return self
                .pool_value(&pool)
                .map(|value| vec![BinBucket { start: min, end: max, value }])
                .unwrap_or_default();
        }

        let mut step = self.bin.step(min, max);
        if !step_fits(step, min, max) {
            debug!(step, "bin size too fine for the value range, deriving it from the count");
            step = self.bin.count_step(min, max);
        }
        let bin_start = (min / step).floor() * step;
        let edge = |i: i64| bin_start + i as f64 * step;

        let mut pools: BTreeMap<i64, Pool> = BTreeMap::new();
        for (v, row) in &points {
            let index = bucket_index(*v, bin_start, step);
            self.add(pools.entry(index).or_default(), row);
        }
        debug!(step, bin_start, buckets = pools.len(), points = points.len(), "binned rows");

        pools
            .iter()
            .filter_map(|(index, pool)| {
                let value = self.pool_value(pool)?;
                Some(BinBucket {
                    start: edge(*index),
                    end: edge(index.saturating_add(1)),
                    value,
                })
            })
            .collect()
    }
}

impl Transform for Bin {
    fn apply(&self, data: &[Record]) -> TransformOutput {
        let rows: Dataset = self.run(data).iter().map(BinBucket::to_record).collect();
        TransformOutput::Data(rows)
    }

    fn name(&self) -> &str {
        "bin"
    }
}
