//! Train a linear model on the newest CSV and publish the artifact.

use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::cloud::{ArtifactLocation, ObjectStore, StoredObject};
use crate::config::AppConfig;
use crate::dataset::{find_latest_csv, train_test_split, Table};
use crate::error::Result;
use crate::ml::{EvaluationReport, LinearModel, TrainingMetadata};

const ARTIFACT_CONTENT_TYPE: &str = "application/json";

/// Outcome of a training run.
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub data_file: PathBuf,
    pub model: LinearModel,
    pub local_path: PathBuf,
    /// Empty when the artifact was only written locally
    pub uploaded: Vec<StoredObject>,
}

impl TrainingReport {
    pub fn evaluation(&self) -> Option<&EvaluationReport> {
        self.model.evaluation.as_ref()
    }
}

/// Find data, fit, evaluate, and write the artifact to local disk.
pub fn train_local(cfg: &AppConfig) -> Result<TrainingReport> {
    cfg.ensure_valid()?;

    // 1. Newest CSV in the data directory
    let data_file = find_latest_csv(&cfg.data.dir)?;
    info!("Using data file: {}", data_file.display());

    // 2. Load and separate the target column by position
    let table = Table::from_path(&data_file)?;
    let data = table.split_target(cfg.data.target_column)?;
    debug!(
        "target '{}', features {:?}",
        data.target_name, data.feature_names
    );

    // 3. Holdout split
    let split = train_test_split(data.len(), cfg.training.test_fraction, cfg.training.seed)?;
    let (x_train, y_train) = data.select(&split.train);
    let (x_test, y_test) = data.select(&split.test);

    // 4. Fit
    let mut model = LinearModel::fit(
        &x_train,
        &y_train,
        data.feature_names.clone(),
        data.target_name.clone(),
    )?;

    // 5. Evaluate on the holdout rows
    let y_pred = model.predict(x_test.view())?;
    let evaluation = EvaluationReport::compute(&y_test.to_vec(), &y_pred.to_vec())?;
    info!(
        "Model evaluation on {} rows: R2={:.4} MAE={:.4} RMSE={:.4}",
        evaluation.test_rows, evaluation.r2, evaluation.mae, evaluation.rmse
    );
    debug!(
        "exact-match accuracy {:.4} (reference only)",
        evaluation.exact_match_accuracy
    );

    model.evaluation = Some(evaluation);
    model.metadata = Some(TrainingMetadata {
        source_file: data_file.display().to_string(),
        train_rows: split.train.len(),
        test_rows: split.test.len(),
        seed: cfg.training.seed,
        trained_at: Utc::now(),
        trainer_version: env!("CARGO_PKG_VERSION").to_string(),
    });

    // 6. Save locally, replacing the previous artifact
    let local_path = cfg.artifact.local_path();
    model.save(&local_path)?;
    info!("Model saved locally at {}", local_path.display());

    Ok(TrainingReport {
        data_file,
        model,
        local_path,
        uploaded: Vec::new(),
    })
}

/// Upload the artifact file as-is to the current object and, when
/// `history_stamp` is given, to a timestamped copy. Both objects receive the
/// exact bytes of the local file.
pub async fn publish_artifact(
    store: &dyn ObjectStore,
    local_path: &Path,
    location: &ArtifactLocation,
    file_name: &str,
    history_stamp: Option<&str>,
) -> Result<Vec<StoredObject>> {
    let bytes = tokio::fs::read(local_path).await?;

    let mut stored = Vec::with_capacity(2);
    stored.push(
        store
            .upload(
                &location.bucket,
                &location.object_name(file_name),
                bytes.clone(),
                ARTIFACT_CONTENT_TYPE,
            )
            .await?,
    );

    if let Some(stamp) = history_stamp {
        stored.push(
            store
                .upload(
                    &location.bucket,
                    &location.history_object_name(stamp, file_name),
                    bytes,
                    ARTIFACT_CONTENT_TYPE,
                )
                .await?,
        );
    }

    Ok(stored)
}

/// The trainer step: train locally, then push the artifact to the bucket.
pub async fn train_and_upload(cfg: &AppConfig, store: &dyn ObjectStore) -> Result<TrainingReport> {
    let location = ArtifactLocation::new(cfg.gcp.bucket()?, &cfg.artifact.object_prefix)?;

    let mut report = train_local(cfg)?;

    let stamp = if cfg.artifact.keep_history {
        let trained_at = report
            .model
            .metadata
            .as_ref()
            .map(|m| m.trained_at)
            .unwrap_or_else(Utc::now);
        Some(trained_at.format("%Y%m%dT%H%M%SZ").to_string())
    } else {
        None
    };

    report.uploaded = publish_artifact(
        store,
        &report.local_path,
        &location,
        &cfg.artifact.file_name,
        stamp.as_deref(),
    )
    .await?;

    Ok(report)
}
