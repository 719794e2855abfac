use async_trait::async_trait;

use super::types::{
    DeployRequest, DeployedModel, Endpoint, ModelUploadRequest, RegisteredModel, StoredObject,
};
use crate::error::Result;

/// Blob storage holding the serialized model.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` verbatim at `bucket/object`, replacing any existing object.
    async fn upload(
        &self,
        bucket: &str,
        object: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<StoredObject>;
}

/// Model registry and serving operations of the managed ML platform.
///
/// Every call blocks until the platform has finished the work, including any
/// long-running operation it starts.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModelPlatform: Send + Sync {
    /// Models whose display name equals `display_name`, newest first.
    async fn list_models(&self, display_name: &str) -> Result<Vec<RegisteredModel>>;

    async fn upload_model(&self, request: &ModelUploadRequest) -> Result<RegisteredModel>;

    /// Endpoints whose display name equals `display_name`, newest first.
    async fn list_endpoints(&self, display_name: &str) -> Result<Vec<Endpoint>>;

    async fn create_endpoint(&self, display_name: &str) -> Result<Endpoint>;

    async fn deploy_model(&self, request: &DeployRequest) -> Result<DeployedModel>;
}
