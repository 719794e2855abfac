//! Linear regression fitting, the JSON model artifact, and evaluation metrics.

pub mod linear;
pub mod metrics;

pub use linear::{LinearModel, TrainingMetadata};
pub use metrics::EvaluationReport;
