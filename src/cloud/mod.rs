//! Cloud-facing seams: object storage for the artifact and the managed ML
//! platform that registers and serves it.

mod traits;
pub mod types;

#[cfg(test)]
pub use traits::MockModelPlatform;
pub use traits::{ModelPlatform, ObjectStore};
pub use types::{
    plan_traffic_split, ArtifactLocation, DeployRequest, DeployedModel, Endpoint,
    ModelUploadRequest, RegisteredModel, StoredObject,
};
