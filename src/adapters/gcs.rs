//! Google Cloud Storage JSON API adapter (media uploads only).

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

use super::google_auth::GoogleAuth;
use crate::cloud::{ObjectStore, StoredObject};
use crate::error::{RegshipError, Result};

#[derive(Deserialize)]
struct ObjectResource {
    bucket: String,
    name: String,
    /// The JSON API reports sizes as decimal strings
    size: String,
    #[serde(default)]
    generation: Option<String>,
}

#[derive(Clone)]
pub struct GcsClient {
    http: Client,
    base_url: String,
    auth: Arc<GoogleAuth>,
}

impl GcsClient {
    pub fn new(http: Client, base_url: &str, auth: Arc<GoogleAuth>) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
        }
    }

    fn upload_url(&self, bucket: &str, object: &str) -> String {
        format!(
            "{}/upload/storage/v1/b/{}/o?uploadType=media&name={}",
            self.base_url,
            urlencoding::encode(bucket),
            urlencoding::encode(object)
        )
    }
}

#[async_trait]
impl ObjectStore for GcsClient {
    async fn upload(
        &self,
        bucket: &str,
        object: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<StoredObject> {
        let url = self.upload_url(bucket, object);
        let len = bytes.len();
        debug!("POST {} ({} bytes)", url, len);

        let token = self.auth.bearer().await?;
        let resp = self
            .http
            .post(&url)
            .bearer_auth(token)
            .header(CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(RegshipError::Api {
                service: "Cloud Storage",
                operation: format!("upload gs://{bucket}/{object}"),
                status: status.as_u16(),
                body: text,
            });
        }

        let resource: ObjectResource = serde_json::from_str(&text)?;
        let size = resource.size.parse::<u64>().map_err(|_| {
            RegshipError::Validation(format!(
                "Cloud Storage returned non-numeric size '{}'",
                resource.size
            ))
        })?;
        if size != len as u64 {
            return Err(RegshipError::Validation(format!(
                "gs://{bucket}/{object} stored {size} bytes, sent {len}"
            )));
        }

        let stored = StoredObject {
            bucket: resource.bucket,
            name: resource.name,
            size,
            generation: resource.generation,
        };
        info!("Uploaded {} ({} bytes)", stored.uri(), stored.size);
        Ok(stored)
    }
}
