use thiserror::Error;

/// Main error type for the training and deployment pipeline
#[derive(Error, Debug)]
pub enum RegshipError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Missing configuration: {0}")]
    MissingConfig(String),

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} API {operation} failed: status={status} body={body}")]
    Api {
        service: &'static str,
        operation: String,
        status: u16,
        body: String,
    },

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    // Training data errors
    #[error("No CSV files found in data directory: {0}")]
    NoTrainingData(String),

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Model fitting failed: {0}")]
    Fit(String),

    // Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),

    // Authentication errors
    #[error("Authentication error: {0}")]
    Auth(String),

    // Long-running operation errors
    #[error("Operation {name} failed: {message}")]
    Operation { name: String, message: String },

    #[error("Timed out after {elapsed_secs}s waiting for {what}")]
    Timeout { what: String, elapsed_secs: u64 },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for RegshipError
pub type Result<T> = std::result::Result<T, RegshipError>;
