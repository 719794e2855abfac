//! The two runbook steps: train-and-upload and deploy.

pub mod deployer;
pub mod trainer;

pub use deployer::{deploy_model, find_or_create_endpoint, register_model, DeploymentReport};
pub use trainer::{publish_artifact, train_and_upload, train_local, TrainingReport};
