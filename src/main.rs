mod main_runtime;

use clap::Parser;
use regship::cli::{self, Cli, Commands};
use regship::config::AppConfig;
use regship::error::Result;
use regship::pipeline::{deploy_model, train_and_upload, train_local};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut cfg = AppConfig::load_from(&cli.config)?;
    cli.apply_overrides(&mut cfg);
    main_runtime::init_logging(&cfg.logging);

    match &cli.command {
        Commands::Train { no_upload, .. } => {
            run_train(&cfg, *no_upload).await?;
        }
        Commands::Deploy => {
            run_deploy(&cfg).await?;
        }
        Commands::Run { .. } => {
            // Fail before training when the deploy half cannot run
            cfg.deploy.serving_container_image()?;
            run_train(&cfg, false).await?;
            run_deploy(&cfg).await?;
        }
        Commands::Predict { model, values } => {
            let path = model
                .clone()
                .unwrap_or_else(|| cfg.artifact.local_path().display().to_string());
            cli::predict(&path, values)?;
        }
    }

    Ok(())
}

async fn run_train(cfg: &AppConfig, no_upload: bool) -> Result<()> {
    let report = if no_upload {
        info!("Training without upload");
        train_local(cfg)?
    } else {
        let http = main_runtime::http_client(cfg)?;
        let auth = main_runtime::google_auth(cfg, &http);
        let store = main_runtime::gcs_client(cfg, &http, auth);
        train_and_upload(cfg, &store).await?
    };

    cli::print_training_report(&report);
    Ok(())
}

async fn run_deploy(cfg: &AppConfig) -> Result<()> {
    let http = main_runtime::http_client(cfg)?;
    let auth = main_runtime::google_auth(cfg, &http);
    let platform = main_runtime::vertex_client(cfg, &http, auth)?;

    info!(
        "Deploying '{}' to endpoint '{}' in {}",
        cfg.deploy.model_display_name, cfg.deploy.endpoint_display_name, cfg.gcp.region
    );
    let report = deploy_model(cfg, &platform).await?;

    cli::print_deployment_report(&report);
    Ok(())
}
