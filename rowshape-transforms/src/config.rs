//! Declarative pipeline descriptions loaded from JSON

use std::path::Path;

use rowshape_common::{Dataset, Record};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::TransformError;
use crate::pipeline::{FacetPipeline, Pipeline, PipelineState};
use crate::transforms::{
    Aggregate, Bin, Flatten, Pivot, SortByTime, Transform, TransformOutput, YAxisExtent,
};

/// One configured pipeline step, tagged by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Step {
    Aggregate(Aggregate),
    Pivot(Pivot),
    Bin(Bin),
    Flatten(Flatten),
    SortByTime(SortByTime),
    YAxisExtent(YAxisExtent),
}

impl Step {
    fn validate(&self, index: usize) -> Result<(), TransformError> {
        let require = |name: &str, value: &str| {
            if value.trim().is_empty() {
                Err(TransformError::InvalidArgument(format!(
                    "step {index} ({}): `{name}` must not be empty",
                    self.name()
                )))
            } else {
                Ok(())
            }
        };
        match self {
            Step::Aggregate(agg) => {
                require("groupBy", &agg.group_by)?;
                require("field", &agg.field)
            }
            Step::Pivot(pivot) => {
                require("groupBy", &pivot.group_by)?;
                require("pivot", &pivot.pivot)?;
                require("field", &pivot.field)
            }
            Step::Bin(bin) => {
                require("binField", &bin.bin_field)?;
                if let Some(field) = &bin.value_field {
                    require("valueField", field)?;
                }
                if let Some(size) = bin.bin.size {
                    if !size.is_finite() || size <= 0.0 {
                        return Err(TransformError::InvalidArgument(format!(
                            "step {index} (bin): size must be a positive number, got {size}"
                        )));
                    }
                }
                if bin.bin.count == Some(0) {
                    return Err(TransformError::InvalidArgument(format!(
                        "step {index} (bin): count must be at least 1"
                    )));
                }
                Ok(())
            }
            Step::Flatten(flatten) => flatten
                .fields
                .iter()
                .flatten()
                .try_for_each(|field| require("fields", field)),
            Step::SortByTime(sort) => require("field", &sort.field),
            Step::YAxisExtent(extent) => {
                if extent.fields.is_empty() {
                    return Err(TransformError::InvalidArgument(format!(
                        "step {index} (y_axis_extent): `fields` must not be empty"
                    )));
                }
                extent
                    .fields
                    .iter()
                    .try_for_each(|field| require("fields", field))
            }
        }
    }
}

impl Transform for Step {
    fn apply(&self, data: &[Record]) -> TransformOutput {
        match self {
            Step::Aggregate(t) => t.apply(data),
            Step::Pivot(t) => t.apply(data),
            Step::Bin(t) => t.apply(data),
            Step::Flatten(t) => t.apply(data),
            Step::SortByTime(t) => t.apply(data),
            Step::YAxisExtent(t) => t.apply(data),
        }
    }

    fn name(&self) -> &str {
        match self {
            Step::Aggregate(t) => t.name(),
            Step::Pivot(t) => t.name(),
            Step::Bin(t) => t.name(),
            Step::Flatten(t) => t.name(),
            Step::SortByTime(t) => t.name(),
            Step::YAxisExtent(t) => t.name(),
        }
    }
}

/// A pipeline as written in a JSON file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PipelineConfig {
    /// Column to facet by; each distinct value runs the steps independently
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facet: Option<String>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl PipelineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, TransformError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, TransformError> {
        let path = path.as_ref();
        let config = Self::from_json_str(&std::fs::read_to_string(path)?)?;
        info!(path = %path.display(), steps = config.steps.len(), "loaded pipeline config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), TransformError> {
        if let Some(facet) = &self.facet {
            if facet.trim().is_empty() {
                return Err(TransformError::InvalidArgument(
                    "facet column must not be empty".to_string(),
                ));
            }
        }
        self.steps
            .iter()
            .enumerate()
            .try_for_each(|(index, step)| step.validate(index))
    }

    pub fn pipeline(&self) -> Pipeline {
        self.steps
            .iter()
            .cloned()
            .fold(Pipeline::new(), |pipeline, step| pipeline.step(step))
    }

    /// Validate and run the configured steps over `data`
    pub fn run(&self, data: Dataset) -> Result<PipelineState, TransformError> {
        self.validate()?;
        let state = PipelineState::new(data);
        Ok(match &self.facet {
            Some(column) => FacetPipeline::new(column.clone(), self.pipeline()).run(state),
            None => self.pipeline().run(state),
        })
    }
}
