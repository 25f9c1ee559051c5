//! Normalization: staging tables -> dimension and fact tables

pub mod dimensions;
pub mod transformer;

pub use dimensions::{Dimension, DimensionResolver, DimensionStats};
pub use transformer::{ModelCounts, ModelTransformer, NormalizeReport, ACTIVE_STATUS};
