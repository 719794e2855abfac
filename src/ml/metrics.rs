//! Evaluation metrics for continuous predictions.

use serde::{Deserialize, Serialize};

use crate::error::{RegshipError, Result};

fn check_lengths(y_true: &[f64], y_pred: &[f64]) -> Result<()> {
    if y_true.len() != y_pred.len() {
        return Err(RegshipError::Validation(format!(
            "metric input length mismatch: {} targets vs {} predictions",
            y_true.len(),
            y_pred.len()
        )));
    }
    if y_true.is_empty() {
        return Err(RegshipError::Validation(
            "metric inputs must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Coefficient of determination.
///
/// A constant target yields 1.0 for a perfect fit and 0.0 otherwise.
pub fn r2_score(y_true: &[f64], y_pred: &[f64]) -> Result<f64> {
    check_lengths(y_true, y_pred)?;
    let mean = y_true.iter().sum::<f64>() / y_true.len() as f64;
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).powi(2))
        .sum();
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();

    if ss_tot == 0.0 {
        return Ok(if ss_res == 0.0 { 1.0 } else { 0.0 });
    }
    Ok(1.0 - ss_res / ss_tot)
}

pub fn mean_absolute_error(y_true: &[f64], y_pred: &[f64]) -> Result<f64> {
    check_lengths(y_true, y_pred)?;
    let total: f64 = y_true.iter().zip(y_pred).map(|(t, p)| (t - p).abs()).sum();
    Ok(total / y_true.len() as f64)
}

pub fn root_mean_squared_error(y_true: &[f64], y_pred: &[f64]) -> Result<f64> {
    check_lengths(y_true, y_pred)?;
    let total: f64 = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).powi(2))
        .sum();
    Ok((total / y_true.len() as f64).sqrt())
}

/// Fraction of predictions that equal their target exactly.
///
/// This is a classification metric. On continuous output it is almost always
/// 0.0 and reaches 1.0 only when every prediction is bit-for-bit equal to its
/// target, so it is reported for reference and never used to judge a model.
pub fn exact_match_accuracy(y_true: &[f64], y_pred: &[f64]) -> Result<f64> {
    check_lengths(y_true, y_pred)?;
    let hits = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    Ok(hits as f64 / y_true.len() as f64)
}

/// Holdout evaluation stored alongside the model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub r2: f64,
    pub mae: f64,
    pub rmse: f64,
    pub exact_match_accuracy: f64,
    pub test_rows: usize,
}

impl EvaluationReport {
    pub fn compute(y_true: &[f64], y_pred: &[f64]) -> Result<Self> {
        Ok(Self {
            r2: r2_score(y_true, y_pred)?,
            mae: mean_absolute_error(y_true, y_pred)?,
            rmse: root_mean_squared_error(y_true, y_pred)?,
            exact_match_accuracy: exact_match_accuracy(y_true, y_pred)?,
            test_rows: y_true.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accuracy_is_one_only_for_exact_predictions() {
        let y = [1.5, 2.25, 300000.0];
        assert_eq!(exact_match_accuracy(&y, &y).unwrap(), 1.0);

        let nearly = [1.5, 2.25, 300000.0 + 1e-9];
        let acc = exact_match_accuracy(&y, &nearly).unwrap();
        assert!(acc < 1.0);
        assert!((acc - 2.0 / 3.0).abs() < 1e-12);

        let off = [1.6, 2.2, 299999.0];
        assert_eq!(exact_match_accuracy(&y, &off).unwrap(), 0.0);
    }

    #[test]
    fn regression_metrics_on_known_values() {
        let y_true = [3.0, -0.5, 2.0, 7.0];
        let y_pred = [2.5, 0.0, 2.0, 8.0];

        assert!((mean_absolute_error(&y_true, &y_pred).unwrap() - 0.5).abs() < 1e-12);
        assert!(
            (root_mean_squared_error(&y_true, &y_pred).unwrap() - 0.375_f64.sqrt()).abs() < 1e-12
        );
        let r2 = r2_score(&y_true, &y_pred).unwrap();
        assert!((r2 - 0.948_608_137_044_967_9).abs() < 1e-9);
    }

    #[test]
    fn constant_target_r2() {
        assert_eq!(r2_score(&[2.0, 2.0], &[2.0, 2.0]).unwrap(), 1.0);
        assert_eq!(r2_score(&[2.0, 2.0], &[2.0, 3.0]).unwrap(), 0.0);
    }

    #[test]
    fn length_mismatch_is_rejected() {
        assert!(r2_score(&[1.0, 2.0], &[1.0]).is_err());
        assert!(exact_match_accuracy(&[], &[]).is_err());
    }
}
