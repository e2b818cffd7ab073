//! Chaining transforms over a shared state, optionally once per facet

use indexmap::IndexMap;
use rowshape_common::value::key_of;
use rowshape_common::{Dataset, Options, Record};
use serde::Serialize;
use tracing::{debug, trace};

use crate::transforms::{Transform, TransformOutput};

/// Output of the last data-producing step
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TransformedData {
    Rows(Dataset),
    /// One dataset per facet, in first-seen facet order
    Facets(Vec<Dataset>),
}

impl Default for TransformedData {
    fn default() -> Self {
        TransformedData::Rows(Vec::new())
    }
}

/// State threaded through a pipeline run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineState {
    pub data: Dataset,
    pub options: Options,
    pub transformed_data: TransformedData,
}

impl PipelineState {
    pub fn new(data: Dataset) -> Self {
        Self {
            data,
            ..Default::default()
        }
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }
}

/// Steps applied left to right.
///
/// A step returning a byproduct has its options merged into the state; the
/// next step sees the previous data unchanged.
#[derive(Default)]
pub struct Pipeline {
    steps: Vec<Box<dyn Transform>>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.steps.iter().map(|step| step.name()))
            .finish()
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step
    pub fn step(mut self, step: impl Transform + 'static) -> Self {
        self.push(Box::new(step));
        self
    }

    pub fn push(&mut self, step: Box<dyn Transform>) {
        self.steps.push(step);
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run all steps over `data`, returning the final rows and the merged byproducts
    pub fn run_rows(&self, data: &[Record]) -> (Dataset, Options) {
        let mut current = data.to_vec();
        let mut options = Options::new();
        for step in &self.steps {
            match step.apply(&current) {
                TransformOutput::Data(rows) => {
                    trace!(step = step.name(), rows = rows.len(), "step produced rows");
                    current = rows;
                }
                TransformOutput::Byproduct(byproduct) => {
                    trace!(step = step.name(), keys = byproduct.len(), "merging byproduct");
                    options.extend(byproduct);
                }
            }
        }
        (current, options)
    }

    /// Run over `state.data`, merging byproducts into `state.options`
    #[tracing::instrument(skip_all, fields(steps = self.steps.len()))]
    pub fn run(&self, mut state: PipelineState) -> PipelineState {
        let (rows, options) = self.run_rows(&state.data);
        state.options.extend(options);
        state.transformed_data = TransformedData::Rows(rows);
        state
    }
}

/// A pipeline repeated independently for each distinct value of a facet column
#[derive(Debug)]
pub struct FacetPipeline {
    column: String,
    pipeline: Pipeline,
}

impl FacetPipeline {
    pub fn new(column: impl Into<String>, pipeline: Pipeline) -> Self {
        Self {
            column: column.into(),
            pipeline,
        }
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    /// Partition rows by the string form of the facet column, in first-seen order
    pub fn partition(&self, data: &[Record]) -> IndexMap<String, Dataset> {
        let mut facets: IndexMap<String, Dataset> = IndexMap::new();
        for row in data {
            facets
                .entry(key_of(row.get(&self.column)))
                .or_default()
                .push(row.clone());
        }
        facets
    }

    /// Run the pipeline per facet.
    ///
    /// With at most one facet this is a plain run. Otherwise byproducts are
    /// taken from the first facet only.
    #[tracing::instrument(skip_all, fields(column = %self.column))]
    pub fn run(&self, mut state: PipelineState) -> PipelineState {
        let facets = self.partition(&state.data);
        if facets.len() <= 1 {
            return self.pipeline.run(state);
        }
        debug!(facets = facets.len(), "running faceted pipeline");

        let mut outputs = Vec::with_capacity(facets.len());
        for (i, rows) in facets.values().enumerate() {
            let (rows, options) = self.pipeline.run_rows(rows);
            if i == 0 {
                state.options.extend(options);
            }
            outputs.push(rows);
        }
        state.transformed_data = TransformedData::Facets(outputs);
        state
    }
}

/// Build a pipeline from boxed steps
pub fn transform(steps: Vec<Box<dyn Transform>>) -> Pipeline {
    Pipeline { steps }
}

/// Build a faceted pipeline from boxed steps
pub fn facet_transform(column: impl Into<String>, steps: Vec<Box<dyn Transform>>) -> FacetPipeline {
    FacetPipeline::new(column, transform(steps))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::AggregationType;
    use crate::transforms::{Aggregate, YAxisExtent};
    use rowshape_common::{record, Value};

    fn byproduct(key: &'static str, value: f64) -> impl Fn(&[Record]) -> TransformOutput + Send + Sync {
        move |_: &[Record]| TransformOutput::Byproduct(record! {key => value})
    }

    #[test]
    fn test_steps_run_in_order() {
        let data = vec![record! {"x" => 1}, record! {"x" => 2}];
        let double = |rows: &[Record]| {
            TransformOutput::Data(
                rows.iter()
                    .map(|r| record! {"x" => r["x"].as_number().unwrap_or_default() * 2.0})
                    .collect(),
            )
        };
        let drop_first = |rows: &[Record]| TransformOutput::Data(rows[1..].to_vec());
        let state = Pipeline::new()
            .step(double)
            .step(drop_first)
            .run(PipelineState::new(data.clone()));
        assert_eq!(state.transformed_data, TransformedData::Rows(vec![record! {"x" => 4}]));
        assert_eq!(state.data, data);
    }

    #[test]
    fn test_byproduct_does_not_replace_data() {
        let data = vec![record! {"x" => 1}];
        let state = Pipeline::new()
            .step(byproduct("yAxisExtend", 10.0))
            .step(byproduct("other", 1.0))
            .step(byproduct("yAxisExtend", 20.0))
            .run(PipelineState::new(data.clone()));
        assert_eq!(state.transformed_data, TransformedData::Rows(data));
        assert_eq!(state.options, record! {"yAxisExtend" => 20.0, "other" => 1.0});
    }

    #[test]
    fn test_empty_pipeline_passes_data_through() {
        let data = vec![record! {"x" => 1}];
        let state = transform(vec![]).run(PipelineState::new(data.clone()));
        assert_eq!(state.transformed_data, TransformedData::Rows(data));
        assert!(state.options.is_empty());
    }

    #[test]
    fn test_existing_options_kept() {
        let state = PipelineState::new(vec![]).with_options(record! {"keep" => true});
        let state = Pipeline::new().step(byproduct("added", 1.0)).run(state);
        assert_eq!(state.options, record! {"keep" => true, "added" => 1.0});
    }

    #[test]
    fn test_single_facet_degenerates() {
        let data = vec![
            record! {"f" => "a", "g" => "x", "v" => 1},
            record! {"f" => "a", "g" => "x", "v" => 2},
        ];
        let state = facet_transform("f", vec![Box::new(Aggregate::new("g", "v"))])
            .run(PipelineState::new(data));
        assert_eq!(
            state.transformed_data,
            TransformedData::Rows(vec![record! {"g" => "x", "v" => 3}])
        );
    }

    #[test]
    fn test_facets_run_independently() {
        let data = vec![
            record! {"f" => "a", "g" => "x", "v" => 1},
            record! {"f" => "b", "g" => "x", "v" => 5},
            record! {"f" => "a", "g" => "x", "v" => 2},
        ];
        let state = facet_transform(
            "f",
            vec![
                Box::new(Aggregate::new("g", "v").with_aggregation_type(AggregationType::Sum)),
                Box::new(YAxisExtent::new(["v"])),
            ],
        )
        .run(PipelineState::new(data));
        assert_eq!(
            state.transformed_data,
            TransformedData::Facets(vec![
                vec![record! {"g" => "x", "v" => 3}],
                vec![record! {"g" => "x", "v" => 5}],
            ])
        );
        // only the first facet contributes byproducts
        assert_eq!(state.options, record! {"yAxisExtend" => 3});
        assert_eq!(state.options["yAxisExtend"], Value::Number(3.0));
    }
}
