use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{RegshipError, Result};

/// Variables read directly from the environment for compatibility with the
/// deployment runbook, mapped to their configuration keys.
const COMPAT_ENV_KEYS: &[(&str, &str)] = &[
    ("PROJECT_ID", "gcp.project_id"),
    ("REGION", "gcp.region"),
    ("MODEL_BUCKET", "gcp.bucket"),
    ("MODEL_DISPLAY_NAME", "deploy.model_display_name"),
    ("ENDPOINT_DISPLAY_NAME", "deploy.endpoint_display_name"),
    ("GOOGLE_OAUTH_ACCESS_TOKEN", "gcp.access_token"),
];

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub gcp: GcpConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub training: TrainingConfig,
    #[serde(default)]
    pub artifact: ArtifactConfig,
    #[serde(default)]
    pub deploy: DeployConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GcpConfig {
    /// Google Cloud project id (required for upload and deploy)
    pub project_id: Option<String>,
    /// Vertex AI region, e.g. "us-central1"
    pub region: String,
    /// Bucket holding the model artifact (required for upload and deploy)
    pub bucket: Option<String>,
    /// Pre-issued OAuth access token; skips metadata server and gcloud lookup
    pub access_token: Option<String>,
    /// Cloud Storage JSON API base URL
    pub storage_base_url: String,
    /// Vertex AI base URL override; derived from the region when unset
    pub aiplatform_base_url: Option<String>,
}

impl Default for GcpConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            region: "us-central1".to_string(),
            bucket: None,
            access_token: None,
            storage_base_url: "https://storage.googleapis.com".to_string(),
            aiplatform_base_url: None,
        }
    }
}

impl GcpConfig {
    pub fn project_id(&self) -> Result<&str> {
        non_empty(self.project_id.as_deref())
            .ok_or_else(|| RegshipError::MissingConfig("PROJECT_ID (gcp.project_id)".to_string()))
    }

    pub fn bucket(&self) -> Result<&str> {
        non_empty(self.bucket.as_deref())
            .ok_or_else(|| RegshipError::MissingConfig("MODEL_BUCKET (gcp.bucket)".to_string()))
    }

    pub fn aiplatform_base_url(&self) -> String {
        self.aiplatform_base_url
            .clone()
            .unwrap_or_else(|| format!("https://{}-aiplatform.googleapis.com", self.region))
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Directory scanned for training CSV files
    pub dir: String,
    /// Zero-based position of the target column
    pub target_column: usize,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dir: "data".to_string(),
            target_column: 2,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Fraction of rows held out for evaluation (e.g., 0.2 = 20%)
    pub test_fraction: f64,
    /// Seed for the train/test shuffle
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    /// Local directory the artifact is written to
    pub model_dir: String,
    /// Artifact file name, used locally and in the bucket
    pub file_name: String,
    /// Object prefix inside the bucket; the platform reads `gs://<bucket>/<prefix>/`
    pub object_prefix: String,
    /// Also keep a timestamped copy under `<prefix>-history/`
    pub keep_history: bool,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            model_dir: "model".to_string(),
            file_name: "model.json".to_string(),
            object_prefix: "model".to_string(),
            keep_history: true,
        }
    }
}

impl ArtifactConfig {
    pub fn local_path(&self) -> PathBuf {
        Path::new(&self.model_dir).join(&self.file_name)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    pub model_display_name: String,
    pub endpoint_display_name: String,
    /// Serving container that can load the JSON artifact (required for deploy)
    pub serving_container_image: Option<String>,
    pub machine_type: String,
    pub min_replica_count: u32,
    pub max_replica_count: u32,
    /// Share of endpoint traffic routed to the newly deployed model
    pub traffic_percentage: u32,
    /// Register re-uploads as new versions of an existing model with the same name
    pub version_existing_model: bool,
    /// Polling interval for long-running operations in seconds
    pub poll_interval_secs: u64,
    /// Give up on a long-running operation after this many seconds
    pub operation_timeout_secs: u64,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            model_display_name: "csv-model".to_string(),
            endpoint_display_name: "csv-endpoint".to_string(),
            serving_container_image: None,
            machine_type: "n1-standard-2".to_string(),
            min_replica_count: 1,
            max_replica_count: 1,
            traffic_percentage: 100,
            version_existing_model: true,
            poll_interval_secs: 10,
            operation_timeout_secs: 1800,
        }
    }
}

impl DeployConfig {
    pub fn serving_container_image(&self) -> Result<&str> {
        non_empty(self.serving_container_image.as_deref()).ok_or_else(|| {
            RegshipError::MissingConfig(
                "REGSHIP_DEPLOY__SERVING_CONTAINER_IMAGE (deploy.serving_container_image)"
                    .to_string(),
            )
        })
    }
}

/// Prebuilt framework images only load these exact artifact names.
const PREBUILT_IMAGE_MARKER: &str = "vertex-ai/prediction/";
const PREBUILT_ARTIFACT_NAMES: &[&str] = &["model.joblib", "model.pkl", "model.bst"];

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_secs: 120 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Enable JSON formatted logs
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> std::result::Result<Self, ConfigError> {
        Self::load_with_env(config_dir, std::env::vars().collect())
    }

    /// Load configuration from a directory and an explicit variable map
    pub fn load_with_env<P: AsRef<Path>>(
        config_dir: P,
        vars: HashMap<String, String>,
    ) -> std::result::Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();
        let profile = vars
            .get("REGSHIP_ENV")
            .cloned()
            .unwrap_or_else(|| "development".to_string());

        let mut builder = Config::builder()
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(File::from(config_dir.join(format!("{profile}.toml"))).required(false))
            // Override with environment variables (REGSHIP_GCP__PROJECT_ID, etc.)
            .add_source(
                Environment::with_prefix("REGSHIP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .source(Some(vars.clone())),
            );

        // Runbook variables win over everything else
        for (var, key) in COMPAT_ENV_KEYS {
            let value = vars.get(*var).filter(|v| !v.trim().is_empty()).cloned();
            builder = builder.set_override_option(*key, value)?;
        }

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if !(self.training.test_fraction > 0.0 && self.training.test_fraction < 1.0) {
            errors.push("training.test_fraction must be between 0 and 1".to_string());
        }

        if self.artifact.file_name.trim().is_empty() || self.artifact.file_name.contains('/') {
            errors.push("artifact.file_name must be a plain file name".to_string());
        }

        if self.artifact.object_prefix.trim_matches('/').is_empty() {
            errors.push("artifact.object_prefix must not be empty".to_string());
        }

        if self.deploy.traffic_percentage == 0 || self.deploy.traffic_percentage > 100 {
            errors.push("deploy.traffic_percentage must be between 1 and 100".to_string());
        }

        if self.deploy.min_replica_count == 0 {
            errors.push("deploy.min_replica_count must be at least 1".to_string());
        }

        if self.deploy.max_replica_count < self.deploy.min_replica_count {
            errors.push("deploy.max_replica_count must be >= min_replica_count".to_string());
        }

        if self.deploy.model_display_name.trim().is_empty() {
            errors.push("deploy.model_display_name must not be empty".to_string());
        }

        if self.deploy.endpoint_display_name.trim().is_empty() {
            errors.push("deploy.endpoint_display_name must not be empty".to_string());
        }

        if let Some(image) = non_empty(self.deploy.serving_container_image.as_deref()) {
            if image.contains(PREBUILT_IMAGE_MARKER)
                && !PREBUILT_ARTIFACT_NAMES.contains(&self.artifact.file_name.as_str())
            {
                errors.push(format!(
                    "deploy.serving_container_image {image} is a prebuilt framework image \
                     and cannot load artifact.file_name {}",
                    self.artifact.file_name
                ));
            }
        }

        if self.deploy.poll_interval_secs == 0 {
            errors.push("deploy.poll_interval_secs must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// `validate` folded into the crate error type
    pub fn ensure_valid(&self) -> Result<()> {
        self.validate()
            .map_err(|errors| RegshipError::Validation(errors.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_match_runbook() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = AppConfig::load_with_env(dir.path(), HashMap::new()).unwrap();

        assert_eq!(cfg.gcp.region, "us-central1");
        assert_eq!(cfg.deploy.model_display_name, "csv-model");
        assert_eq!(cfg.deploy.endpoint_display_name, "csv-endpoint");
        assert_eq!(cfg.deploy.machine_type, "n1-standard-2");
        assert_eq!(cfg.deploy.traffic_percentage, 100);
        assert_eq!(cfg.data.target_column, 2);
        assert!(cfg.gcp.project_id().is_err());
        assert!(cfg.gcp.bucket().is_err());
        assert!(cfg.deploy.serving_container_image().is_err());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn prebuilt_framework_image_rejects_json_artifact() {
        let mut cfg = AppConfig::default();
        cfg.deploy.serving_container_image =
            Some("us-docker.pkg.dev/vertex-ai/prediction/sklearn-cpu.0-24:latest".to_string());

        let errors = cfg.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("model.json"), "{errors:?}");

        cfg.deploy.serving_container_image =
            Some("europe-docker.pkg.dev/my-project/serving/linear-json:1".to_string());
        assert!(cfg.validate().is_ok());
        assert_eq!(
            cfg.deploy.serving_container_image().unwrap(),
            "europe-docker.pkg.dev/my-project/serving/linear-json:1"
        );
    }

    #[test]
    fn serving_image_comes_from_prefixed_env() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = AppConfig::load_with_env(
            dir.path(),
            vars(&[(
                "REGSHIP_DEPLOY__SERVING_CONTAINER_IMAGE",
                "us-docker.pkg.dev/p/serving/linear-json:latest",
            )]),
        )
        .unwrap();
        assert_eq!(
            cfg.deploy.serving_container_image().unwrap(),
            "us-docker.pkg.dev/p/serving/linear-json:latest"
        );
    }

    #[test]
    fn runbook_variables_are_honoured() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = AppConfig::load_with_env(
            dir.path(),
            vars(&[
                ("PROJECT_ID", "my-project"),
                ("REGION", "europe-west4"),
                ("MODEL_BUCKET", "my-bucket"),
                ("MODEL_DISPLAY_NAME", "prices"),
                ("ENDPOINT_DISPLAY_NAME", "prices-endpoint"),
            ]),
        )
        .unwrap();

        assert_eq!(cfg.gcp.project_id().unwrap(), "my-project");
        assert_eq!(cfg.gcp.bucket().unwrap(), "my-bucket");
        assert_eq!(cfg.gcp.region, "europe-west4");
        assert_eq!(
            cfg.gcp.aiplatform_base_url(),
            "https://europe-west4-aiplatform.googleapis.com"
        );
        assert_eq!(cfg.deploy.model_display_name, "prices");
        assert_eq!(cfg.deploy.endpoint_display_name, "prices-endpoint");
    }

    #[test]
    fn file_and_prefixed_env_layer_in_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("default.toml"),
            "[deploy]\nmachine_type = \"n1-standard-4\"\n\n[training]\nseed = 7\n",
        )
        .unwrap();

        let cfg = AppConfig::load_with_env(
            dir.path(),
            vars(&[("REGSHIP_TRAINING__SEED", "9")]),
        )
        .unwrap();

        assert_eq!(cfg.deploy.machine_type, "n1-standard-4");
        assert_eq!(cfg.training.seed, 9);
    }

    #[test]
    fn validate_collects_every_problem() {
        let mut cfg = AppConfig::default();
        cfg.training.test_fraction = 1.5;
        cfg.deploy.traffic_percentage = 0;
        cfg.deploy.max_replica_count = 0;
        cfg.artifact.object_prefix = "/".to_string();

        let errors = cfg.validate().unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(cfg.ensure_valid().is_err());
    }

    #[test]
    fn blank_project_counts_as_missing() {
        let mut cfg = AppConfig::default();
        cfg.gcp.project_id = Some("  ".to_string());
        assert!(matches!(
            cfg.gcp.project_id(),
            Err(RegshipError::MissingConfig(_))
        ));
    }
}
