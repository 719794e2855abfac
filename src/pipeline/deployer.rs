//! Register the uploaded artifact and deploy it behind an endpoint.

use tracing::info;

use crate::cloud::{
    plan_traffic_split, ArtifactLocation, DeployRequest, DeployedModel, Endpoint, ModelPlatform,
    ModelUploadRequest, RegisteredModel,
};
use crate::config::AppConfig;
use crate::error::Result;

/// Outcome of a deployment run.
#[derive(Debug, Clone)]
pub struct DeploymentReport {
    pub model: RegisteredModel,
    pub endpoint: Endpoint,
    /// `false` when an endpoint with the display name already existed
    pub endpoint_created: bool,
    pub deployed: DeployedModel,
}

/// Upload the artifact directory as a platform model. With
/// `deploy.version_existing_model` the newest model of the same display name
/// becomes the parent, so repeated runs stack versions instead of models.
pub async fn register_model(
    platform: &dyn ModelPlatform,
    cfg: &AppConfig,
    location: &ArtifactLocation,
) -> Result<RegisteredModel> {
    let display_name = &cfg.deploy.model_display_name;
    let serving_container_image = cfg.deploy.serving_container_image()?.to_string();

    let parent_model = if cfg.deploy.version_existing_model {
        platform
            .list_models(display_name)
            .await?
            .into_iter()
            .find(|m| &m.display_name == display_name)
            .map(|m| m.name)
    } else {
        None
    };

    match &parent_model {
        Some(parent) => info!("Registering a new version of {}", parent),
        None => info!("Registering new model '{}'", display_name),
    }

    let request = ModelUploadRequest {
        display_name: display_name.clone(),
        artifact_uri: location.directory_uri(),
        serving_container_image,
        parent_model,
        description: Some(format!(
            "Linear regression artifact {}",
            location.object_uri(&cfg.artifact.file_name)
        )),
    };

    let model = platform.upload_model(&request).await?;
    info!(
        "Model registered: {} (version {})",
        model.name,
        model.version_id.as_deref().unwrap_or("-")
    );
    Ok(model)
}

/// Reuse the newest endpoint whose display name matches exactly; otherwise
/// create one. Returns the endpoint and whether it was created.
pub async fn find_or_create_endpoint(
    platform: &dyn ModelPlatform,
    display_name: &str,
) -> Result<(Endpoint, bool)> {
    let existing = platform
        .list_endpoints(display_name)
        .await?
        .into_iter()
        .find(|e| e.display_name == display_name);

    if let Some(endpoint) = existing {
        info!("Using existing endpoint: {} ({})", endpoint.display_name, endpoint.name);
        return Ok((endpoint, false));
    }

    let endpoint = platform.create_endpoint(display_name).await?;
    info!("Created new endpoint: {} ({})", endpoint.display_name, endpoint.name);
    Ok((endpoint, true))
}

/// The deployer step.
pub async fn deploy_model(cfg: &AppConfig, platform: &dyn ModelPlatform) -> Result<DeploymentReport> {
    cfg.ensure_valid()?;
    let location = ArtifactLocation::new(cfg.gcp.bucket()?, &cfg.artifact.object_prefix)?;

    let model = register_model(platform, cfg, &location).await?;

    let (endpoint, endpoint_created) =
        find_or_create_endpoint(platform, &cfg.deploy.endpoint_display_name).await?;

    let traffic_split = plan_traffic_split(&endpoint.traffic_split, cfg.deploy.traffic_percentage)?;
    let request = DeployRequest {
        endpoint: endpoint.name.clone(),
        model: model.versioned_name(),
        display_name: cfg.deploy.model_display_name.clone(),
        machine_type: cfg.deploy.machine_type.clone(),
        min_replica_count: cfg.deploy.min_replica_count,
        max_replica_count: cfg.deploy.max_replica_count,
        traffic_split,
    };

    let deployed = platform.deploy_model(&request).await?;
    info!(
        "Deployed model {} to {} as {}",
        model.name, endpoint.name, deployed.id
    );

    Ok(DeploymentReport {
        model,
        endpoint,
        endpoint_created,
        deployed,
    })
}
