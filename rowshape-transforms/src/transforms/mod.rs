//! Row transforms and the traits they share
//!
//! Each transform is a plain value with a `run` method returning its natural
//! output, and a [`Transform`] impl so it can be chained in a pipeline.

pub mod aggregate;
pub mod bin;
pub mod core;
pub mod extent;
pub mod flatten;
pub mod group;
pub mod pivot;
pub mod sort;

pub use aggregate::Aggregate;
pub use bin::{nice_step, Bin, BinBucket, BinConfig};
pub use core::{Transform, TransformOutput};
pub use extent::{YAxisExtent, Y_AXIS_EXTENT_KEY};
pub use flatten::Flatten;
pub use group::GroupKey;
pub use pivot::Pivot;
pub use sort::SortByTime;
