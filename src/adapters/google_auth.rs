//! Google OAuth access tokens for Cloud Storage and Vertex AI.
//!
//! Tokens come from, in order: an explicit token, the GCE metadata server,
//! and `gcloud auth print-access-token`. The first source that answers wins
//! and its token is cached until shortly before it expires.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{RegshipError, Result};

const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Refresh this long before the reported expiry.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// gcloud does not report a lifetime; assume a conservative one.
const GCLOUD_TOKEN_LIFETIME_SECS: i64 = 30 * 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    /// `None` means the token is used for the life of the process
    pub expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(at) => now + Duration::seconds(EXPIRY_MARGIN_SECS) < at,
            None => true,
        }
    }
}

#[async_trait]
pub trait TokenSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch(&self) -> Result<AccessToken>;
}

/// A token handed in through configuration or `GOOGLE_OAUTH_ACCESS_TOKEN`.
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn fetch(&self) -> Result<AccessToken> {
        Ok(AccessToken {
            token: self.0.clone(),
            expires_at: None,
        })
    }
}

#[derive(Deserialize)]
struct MetadataTokenResponse {
    access_token: String,
    expires_in: i64,
}

/// Default service account token from the GCE/GKE/Cloud Run metadata server.
pub struct MetadataServerToken {
    http: Client,
    url: String,
}

impl MetadataServerToken {
    pub fn new(http: Client) -> Self {
        Self {
            http,
            url: METADATA_TOKEN_URL.to_string(),
        }
    }

    pub fn with_url(http: Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }
}

#[async_trait]
impl TokenSource for MetadataServerToken {
    fn name(&self) -> &'static str {
        "metadata-server"
    }

    async fn fetch(&self) -> Result<AccessToken> {
        let resp = self
            .http
            .get(&self.url)
            .header("Metadata-Flavor", "Google")
            .timeout(std::time::Duration::from_secs(3))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RegshipError::Auth(format!(
                "metadata server returned {status}: {body}"
            )));
        }

        let parsed: MetadataTokenResponse = resp.json().await?;
        Ok(AccessToken {
            token: parsed.access_token,
            expires_at: Some(Utc::now() + Duration::seconds(parsed.expires_in)),
        })
    }
}

/// Token of the active gcloud account.
pub struct GcloudCliToken {
    program: String,
}

impl GcloudCliToken {
    pub fn new() -> Self {
        Self {
            program: "gcloud".to_string(),
        }
    }
}

impl Default for GcloudCliToken {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenSource for GcloudCliToken {
    fn name(&self) -> &'static str {
        "gcloud"
    }

    async fn fetch(&self) -> Result<AccessToken> {
        let output = tokio::process::Command::new(&self.program)
            .args(["auth", "print-access-token"])
            .output()
            .await
            .map_err(|e| RegshipError::Auth(format!("failed to run {}: {}", self.program, e)))?;

        if !output.status.success() {
            return Err(RegshipError::Auth(format!(
                "{} auth print-access-token failed: {}",
                self.program,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if token.is_empty() {
            return Err(RegshipError::Auth(format!(
                "{} printed an empty access token",
                self.program
            )));
        }

        Ok(AccessToken {
            token,
            expires_at: Some(Utc::now() + Duration::seconds(GCLOUD_TOKEN_LIFETIME_SECS)),
        })
    }
}

/// Ordered token sources with a shared cache.
pub struct GoogleAuth {
    sources: Vec<Box<dyn TokenSource>>,
    cached: Mutex<Option<AccessToken>>,
}

impl GoogleAuth {
    pub fn new(sources: Vec<Box<dyn TokenSource>>) -> Self {
        Self {
            sources,
            cached: Mutex::new(None),
        }
    }

    /// Explicit token when given, otherwise metadata server then gcloud.
    pub fn discover(http: Client, explicit: Option<String>) -> Arc<Self> {
        let mut sources: Vec<Box<dyn TokenSource>> = Vec::new();
        if let Some(token) = explicit.filter(|t| !t.trim().is_empty()) {
            sources.push(Box::new(StaticToken::new(token.trim())));
        }
        sources.push(Box::new(MetadataServerToken::new(http)));
        sources.push(Box::new(GcloudCliToken::new()));
        Arc::new(Self::new(sources))
    }

    /// A bearer token, fetched on first use and again once the cached one nears expiry.
    pub async fn bearer(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(Utc::now())) {
            return Ok(token.token.clone());
        }

        let mut failures = Vec::new();
        for source in &self.sources {
            match source.fetch().await {
                Ok(token) => {
                    info!("Using Google credentials from {}", source.name());
                    let value = token.token.clone();
                    *cached = Some(token);
                    return Ok(value);
                }
                Err(e) => {
                    debug!("credential source {} unavailable: {}", source.name(), e);
                    failures.push(format!("{}: {}", source.name(), e));
                }
            }
        }

        Err(RegshipError::Auth(format!(
            "no Google credentials available ({})",
            failures.join("; ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        calls: Arc<AtomicUsize>,
        lifetime_secs: i64,
    }

    #[async_trait]
    impl TokenSource for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn fetch(&self) -> Result<AccessToken> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(AccessToken {
                token: format!("token-{n}"),
                expires_at: Some(Utc::now() + Duration::seconds(self.lifetime_secs)),
            })
        }
    }

    struct Failing;

    #[async_trait]
    impl TokenSource for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn fetch(&self) -> Result<AccessToken> {
            Err(RegshipError::Auth("nope".to_string()))
        }
    }

    #[tokio::test]
    async fn falls_through_to_first_working_source() {
        let auth = GoogleAuth::new(vec![Box::new(Failing), Box::new(StaticToken::new("abc"))]);
        assert_eq!(auth.bearer().await.unwrap(), "abc");
    }

    #[tokio::test]
    async fn caches_until_near_expiry() {
        let calls = Arc::new(AtomicUsize::new(0));
        let auth = GoogleAuth::new(vec![Box::new(Counting {
            calls: calls.clone(),
            lifetime_secs: 3600,
        })]);
        assert_eq!(auth.bearer().await.unwrap(), "token-0");
        assert_eq!(auth.bearer().await.unwrap(), "token-0");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let short = Arc::new(AtomicUsize::new(0));
        let auth = GoogleAuth::new(vec![Box::new(Counting {
            calls: short.clone(),
            lifetime_secs: 30,
        })]);
        auth.bearer().await.unwrap();
        auth.bearer().await.unwrap();
        assert_eq!(short.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn reports_every_failure() {
        let auth = GoogleAuth::new(vec![Box::new(Failing), Box::new(Failing)]);
        let err = auth.bearer().await.unwrap_err();
        assert!(matches!(err, RegshipError::Auth(_)));
        assert_eq!(err.to_string().matches("failing").count(), 2);
    }
}
