//! Core types and traits for the transform system

use rowshape_common::{Dataset, Options, Record};

/// What a transform step hands back to the pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum TransformOutput {
    /// Rows that become the input of the next step
    Data(Dataset),
    /// Side outputs merged into the pipeline options; the data chain is left untouched
    Byproduct(Options),
}

/// Base trait for all transforms
///
/// Implementations are pure: they read `data` and allocate fresh output.
pub trait Transform: Send + Sync {
    /// Apply the transform to a dataset
    fn apply(&self, data: &[Record]) -> TransformOutput;

    /// Short name used in log output
    fn name(&self) -> &str {
        "fn"
    }
}

impl<F> Transform for F
where
    F: Fn(&[Record]) -> TransformOutput + Send + Sync,
{
    fn apply(&self, data: &[Record]) -> TransformOutput {
        self(data)
    }
}
