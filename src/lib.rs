pub mod adapters;
pub mod cli;
pub mod cloud;
pub mod config;
pub mod dataset;
pub mod error;
pub mod ml;
pub mod pipeline;

pub use adapters::{GcsClient, GoogleAuth, VertexClient};
pub use cloud::{ArtifactLocation, ModelPlatform, ObjectStore};
pub use config::AppConfig;
pub use error::{RegshipError, Result};
pub use ml::{EvaluationReport, LinearModel};
pub use pipeline::{deploy_model, train_and_upload, DeploymentReport, TrainingReport};
