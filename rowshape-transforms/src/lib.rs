pub mod config;
pub mod error;
pub mod ops;
pub mod pipeline;
pub mod transforms;
pub mod utils;

pub use config::{PipelineConfig, Step};
pub use ops::{AggregationType, CalculationMethod};
pub use pipeline::{facet_transform, transform, FacetPipeline, Pipeline, PipelineState, TransformedData};
pub use transforms::{Transform, TransformOutput};
