//! Ordinary least squares regression and its JSON artifact.
//!
//! The artifact is a self-describing JSON document so it can be inspected,
//! diffed, and served without a Python runtime.

use chrono::{DateTime, Utc};
use linfa::traits::Fit;
use linfa::Dataset;
use linfa_linear::LinearRegression;
use ndarray::{Array1, Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::metrics::EvaluationReport;
use crate::error::{RegshipError, Result};

/// Provenance recorded with a trained model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetadata {
    pub source_file: String,
    pub train_rows: usize,
    pub test_rows: usize,
    pub seed: u64,
    pub trained_at: DateTime<Utc>,
    pub trainer_version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub feature_names: Vec<String>,
    pub target_name: String,
    /// One coefficient per feature, in `feature_names` order.
    pub coefficients: Vec<f64>,
    pub intercept: f64,

    #[serde(default)]
    pub evaluation: Option<EvaluationReport>,
    #[serde(default)]
    pub metadata: Option<TrainingMetadata>,
}

impl LinearModel {
    /// Fit `target ~ features` with an intercept.
    pub fn fit(
        features: &Array2<f64>,
        target: &Array1<f64>,
        feature_names: Vec<String>,
        target_name: String,
    ) -> Result<Self> {
        if features.nrows() != target.len() {
            return Err(RegshipError::Validation(format!(
                "feature rows {} != target rows {}",
                features.nrows(),
                target.len()
            )));
        }
        if features.ncols() != feature_names.len() {
            return Err(RegshipError::Validation(format!(
                "feature columns {} != feature names {}",
                features.ncols(),
                feature_names.len()
            )));
        }

        let dataset = Dataset::new(features.clone(), target.clone());
        let fitted = LinearRegression::new()
            .fit(&dataset)
            .map_err(|e| RegshipError::Fit(e.to_string()))?;

        let model = Self {
            feature_names,
            target_name,
            coefficients: fitted.params().to_vec(),
            intercept: fitted.intercept(),
            evaluation: None,
            metadata: None,
        };
        model.validate().map_err(RegshipError::Fit)?;
        Ok(model)
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.feature_names.is_empty() {
            return Err("model must have at least one feature".to_string());
        }
        if self.coefficients.len() != self.feature_names.len() {
            return Err(format!(
                "coefficients len {} != feature count {}",
                self.coefficients.len(),
                self.feature_names.len()
            ));
        }
        if self.coefficients.iter().any(|v| !v.is_finite()) || !self.intercept.is_finite() {
            return Err("coefficients and intercept must be finite".to_string());
        }
        Ok(())
    }

    pub fn predict_row(&self, row: &[f64]) -> Result<f64> {
        if row.len() != self.n_features() {
            return Err(RegshipError::Validation(format!(
                "LinearModel input dim mismatch: got {}, expected {}",
                row.len(),
                self.n_features()
            )));
        }
        Ok(self.intercept
            + row
                .iter()
                .zip(&self.coefficients)
                .map(|(x, w)| x * w)
                .sum::<f64>())
    }

    pub fn predict(&self, rows: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        if rows.ncols() != self.n_features() {
            return Err(RegshipError::Validation(format!(
                "LinearModel input dim mismatch: got {}, expected {}",
                rows.ncols(),
                self.n_features()
            )));
        }
        let weights = Array1::from(self.coefficients.clone());
        Ok(rows.dot(&weights) + self.intercept)
    }

    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Write the artifact, creating parent directories and replacing any
    /// previous file at `path`.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json_bytes()?)?;
        Ok(())
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        let model: Self = serde_json::from_str(&content)?;
        model.validate().map_err(RegshipError::Validation)?;
        Ok(model)
    }
}
