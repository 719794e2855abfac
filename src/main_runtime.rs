use regship::adapters::{GcsClient, GoogleAuth, OperationPolicy, VertexClient};
use regship::config::{AppConfig, LoggingConfig};
use regship::error::{RegshipError, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

pub fn http_client(cfg: &AppConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("regship/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(cfg.http.timeout_secs))
        .build()
        .map_err(RegshipError::Http)
}

pub fn google_auth(cfg: &AppConfig, http: &reqwest::Client) -> Arc<GoogleAuth> {
    GoogleAuth::discover(http.clone(), cfg.gcp.access_token.clone())
}

pub fn gcs_client(cfg: &AppConfig, http: &reqwest::Client, auth: Arc<GoogleAuth>) -> GcsClient {
    GcsClient::new(http.clone(), &cfg.gcp.storage_base_url, auth)
}

pub fn vertex_client(
    cfg: &AppConfig,
    http: &reqwest::Client,
    auth: Arc<GoogleAuth>,
) -> Result<VertexClient> {
    let policy = OperationPolicy {
        poll_interval: Duration::from_secs(cfg.deploy.poll_interval_secs),
        timeout: Duration::from_secs(cfg.deploy.operation_timeout_secs),
    };
    Ok(VertexClient::new(
        http.clone(),
        &cfg.gcp.aiplatform_base_url(),
        cfg.gcp.project_id()?,
        &cfg.gcp.region,
        auth,
        policy,
    ))
}

/// Create `dir` if needed and confirm a file can be opened in it.
fn ensure_log_dir_writable(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let test_path = dir.join(".regship_write_test");
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&test_path)?;
    let _ = std::fs::remove_file(&test_path);
    Ok(())
}

pub fn init_logging(logging: &LoggingConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::Layer;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},regship=debug", logging.level)));

    // Optional daily-rotated file log. `rolling::daily` panics when it cannot
    // create its first file, so the directory must be writable beforehand.
    let file_layer = match std::env::var("REGSHIP_LOG_DIR") {
        Ok(log_dir) => match ensure_log_dir_writable(Path::new(&log_dir)) {
            Ok(()) => {
                let file_appender = tracing_appender::rolling::daily(&log_dir, "regship.log");
                let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

                // Keep the guard alive for the life of the process
                Box::leak(Box::new(guard));

                Some(
                    tracing_subscriber::fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_target(true),
                )
            }
            Err(e) => {
                eprintln!(
                    "Warning: Could not write to log directory {} ({}), file logging disabled",
                    log_dir, e
                );
                None
            }
        },
        Err(_) => None,
    };

    let console_layer = if logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed()
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();
}
