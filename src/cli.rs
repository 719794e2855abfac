use clap::{Parser, Subcommand};

use crate::config::AppConfig;
use crate::error::Result;
use crate::ml::LinearModel;
use crate::pipeline::{DeploymentReport, TrainingReport};

#[derive(Parser)]
#[command(name = "regship")]
#[command(author = "Regship Team")]
#[command(version = "0.1.0")]
#[command(about = "Train a CSV linear regression model and deploy it to Vertex AI", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config directory (default.toml, <REGSHIP_ENV>.toml)
    #[arg(short, long, default_value = "config", global = true)]
    pub config: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train on the newest CSV and upload the artifact to Cloud Storage
    Train {
        /// Only write the artifact locally
        #[arg(long)]
        no_upload: bool,
        /// Directory scanned for CSV files
        #[arg(long)]
        data_dir: Option<String>,
        /// Directory the artifact is written to
        #[arg(long)]
        model_dir: Option<String>,
    },
    /// Register the uploaded artifact and deploy it to an endpoint
    Deploy,
    /// Train, upload, and deploy in one go
    Run {
        /// Directory scanned for CSV files
        #[arg(long)]
        data_dir: Option<String>,
        /// Directory the artifact is written to
        #[arg(long)]
        model_dir: Option<String>,
    },
    /// Predict with a local artifact
    Predict {
        /// Artifact path (defaults to the configured local artifact)
        #[arg(short, long)]
        model: Option<String>,
        /// Feature values in artifact feature order
        #[arg(required = true, allow_hyphen_values = true)]
        values: Vec<f64>,
    },
}

impl Cli {
    /// Fold command-line directory overrides into the loaded configuration.
    pub fn apply_overrides(&self, cfg: &mut AppConfig) {
        let (data_dir, model_dir) = match &self.command {
            Commands::Train {
                data_dir,
                model_dir,
                ..
            }
            | Commands::Run {
                data_dir,
                model_dir,
            } => (data_dir, model_dir),
            _ => return,
        };

        if let Some(dir) = data_dir {
            cfg.data.dir = dir.clone();
        }
        if let Some(dir) = model_dir {
            cfg.artifact.model_dir = dir.clone();
        }
    }
}

pub fn print_training_report(report: &TrainingReport) {
    println!("📂 Data file: {}", report.data_file.display());
    if let Some(eval) = report.evaluation() {
        println!(
            "✅ Holdout ({} rows): R² {:.4} | MAE {:.4} | RMSE {:.4}",
            eval.test_rows, eval.r2, eval.mae, eval.rmse
        );
    }
    println!("💾 Model saved locally at {}", report.local_path.display());
    for object in &report.uploaded {
        println!("☁️  Model uploaded to {}", object.uri());
    }
}

pub fn print_deployment_report(report: &DeploymentReport) {
    if report.endpoint_created {
        println!("Created new endpoint: {}", report.endpoint.display_name);
    } else {
        println!("Using existing endpoint: {}", report.endpoint.display_name);
    }
    println!(
        "Model: {} | Endpoint: {} | Deployed model id: {}",
        report.model.versioned_name(),
        report.endpoint.name,
        report.deployed.id
    );
    println!("✅ Model deployed successfully.");
}

pub fn predict(model_path: &str, values: &[f64]) -> Result<f64> {
    let model = LinearModel::from_file(model_path)?;
    let prediction = model.predict_row(values)?;
    println!("{} = {:.6}", model.target_name, prediction);
    Ok(prediction)
}
