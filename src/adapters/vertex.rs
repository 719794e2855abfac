//! Vertex AI REST adapter (v1 API, no client SDK).
//!
//! Mutating calls return long-running operations; this client polls each one
//! until it reports `done` and hands back the operation's response payload.

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::google_auth::GoogleAuth;
use crate::cloud::{
    DeployRequest, DeployedModel, Endpoint, ModelPlatform, ModelUploadRequest, RegisteredModel,
};
use crate::error::{RegshipError, Result};

const SERVICE: &str = "Vertex AI";

/// How long-running operations are awaited.
#[derive(Debug, Clone, Copy)]
pub struct OperationPolicy {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for OperationPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            timeout: Duration::from_secs(1800),
        }
    }
}

#[derive(Clone)]
pub struct VertexClient {
    http: Client,
    base_url: String,
    project: String,
    region: String,
    auth: Arc<GoogleAuth>,
    policy: OperationPolicy,
}

impl VertexClient {
    pub fn new(
        http: Client,
        base_url: &str,
        project: &str,
        region: &str,
        auth: Arc<GoogleAuth>,
        policy: OperationPolicy,
    ) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            project: project.to_string(),
            region: region.to_string(),
            auth,
            policy,
        }
    }

    /// `projects/<project>/locations/<region>`
    pub fn parent(&self) -> String {
        format!("projects/{}/locations/{}", self.project, self.region)
    }

    async fn request_json(
        &self,
        method: Method,
        resource: &str,
        query: Option<&[(&str, String)]>,
        body: Option<Value>,
    ) -> Result<Value> {
        let url = format!("{}/v1/{}", self.base_url, resource);
        debug!("{} {}", method, url);

        let token = self.auth.bearer().await?;
        let mut req = self.http.request(method.clone(), &url).bearer_auth(token);

        if let Some(query) = query {
            req = req.query(query);
        }

        if let Some(body) = body {
            req = req.json(&body);
        }

        let resp = req.send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(RegshipError::Api {
                service: SERVICE,
                operation: format!("{method} {resource}"),
                status: status.as_u16(),
                body: text,
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        Ok(serde_json::from_str(&text)?)
    }

    /// Poll an operation until it is done and return its `response` object.
    async fn wait_operation(&self, operation: Value, what: &str) -> Result<Value> {
        let started = Instant::now();
        let mut op = operation;

        loop {
            let name = op
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();

            if op.get("done").and_then(Value::as_bool).unwrap_or(false) {
                if let Some(error) = op.get("error") {
                    return Err(RegshipError::Operation {
                        name,
                        message: error
                            .get("message")
                            .and_then(Value::as_str)
                            .map(ToString::to_string)
                            .unwrap_or_else(|| error.to_string()),
                    });
                }
                debug!("operation {} finished after {:?}", name, started.elapsed());
                return Ok(op.get("response").cloned().unwrap_or(Value::Null));
            }

            if name.is_empty() {
                return Err(RegshipError::Validation(format!(
                    "{what}: operation without a name cannot be polled"
                )));
            }

            if started.elapsed() >= self.policy.timeout {
                return Err(RegshipError::Timeout {
                    what: format!("{what} ({name})"),
                    elapsed_secs: started.elapsed().as_secs(),
                });
            }

            info!("Waiting for {} ({})...", what, name);
            tokio::time::sleep(self.policy.poll_interval).await;
            op = self.request_json(Method::GET, &name, None, None).await?;
        }
    }

    /// GET a list resource, following `nextPageToken`, collecting `items_key` arrays.
    async fn list_all(
        &self,
        resource: &str,
        items_key: &str,
        display_name: &str,
    ) -> Result<Vec<Value>> {
        let mut out = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![
                ("filter", display_name_filter(display_name)),
                ("orderBy", "create_time desc".to_string()),
            ];
            if let Some(token) = page_token.take() {
                query.push(("pageToken", token));
            }

            let page = self
                .request_json(Method::GET, resource, Some(&query), None)
                .await?;
            if let Some(items) = page.get(items_key).and_then(Value::as_array) {
                out.extend(items.iter().cloned());
            }

            match page.get("nextPageToken").and_then(Value::as_str) {
                Some(token) if !token.is_empty() => page_token = Some(token.to_string()),
                _ => return Ok(out),
            }
        }
    }
}

/// Exact display-name match in the platform's filter syntax.
pub fn display_name_filter(display_name: &str) -> String {
    format!(
        "display_name=\"{}\"",
        display_name.replace('\\', "\\\\").replace('"', "\\\"")
    )
}

fn pick_str<'a>(root: &'a Value, key: &str) -> Option<&'a str> {
    root.get(key).and_then(Value::as_str)
}

fn parse_endpoint(value: &Value) -> Result<Endpoint> {
    let name = pick_str(value, "name").ok_or_else(|| {
        RegshipError::Validation(format!("endpoint without a resource name: {value}"))
    })?;

    let mut traffic_split = BTreeMap::new();
    if let Some(split) = value.get("trafficSplit").and_then(Value::as_object) {
        for (id, pct) in split {
            if let Some(pct) = pct.as_u64() {
                traffic_split.insert(id.clone(), pct as u32);
            }
        }
    }

    Ok(Endpoint {
        name: name.to_string(),
        display_name: pick_str(value, "displayName").unwrap_or_default().to_string(),
        traffic_split,
    })
}

fn parse_model(value: &Value) -> Result<RegisteredModel> {
    let name = pick_str(value, "name").ok_or_else(|| {
        RegshipError::Validation(format!("model without a resource name: {value}"))
    })?;

    Ok(RegisteredModel {
        name: name.to_string(),
        display_name: pick_str(value, "displayName").unwrap_or_default().to_string(),
        version_id: pick_str(value, "versionId").map(ToString::to_string),
    })
}

fn upload_body(request: &ModelUploadRequest) -> Value {
    let mut model = json!({
        "displayName": request.display_name,
        "artifactUri": request.artifact_uri,
        "containerSpec": { "imageUri": request.serving_container_image },
    });
    if let Some(description) = &request.description {
        model["description"] = json!(description);
    }

    let mut body = json!({ "model": model });
    if let Some(parent) = &request.parent_model {
        body["parentModel"] = json!(parent);
    }
    body
}

fn deploy_body(request: &DeployRequest) -> Value {
    json!({
        "deployedModel": {
            "model": request.model,
            "displayName": request.display_name,
            "dedicatedResources": {
                "machineSpec": { "machineType": request.machine_type },
                "minReplicaCount": request.min_replica_count,
                "maxReplicaCount": request.max_replica_count,
            },
        },
        "trafficSplit": request.traffic_split,
    })
}

#[async_trait]
impl ModelPlatform for VertexClient {
    async fn list_models(&self, display_name: &str) -> Result<Vec<RegisteredModel>> {
        let resource = format!("{}/models", self.parent());
        self.list_all(&resource, "models", display_name)
            .await?
            .iter()
            .map(parse_model)
            .collect()
    }

    async fn upload_model(&self, request: &ModelUploadRequest) -> Result<RegisteredModel> {
        let resource = format!("{}/models:upload", self.parent());
        let op = self
            .request_json(Method::POST, &resource, None, Some(upload_body(request)))
            .await?;
        let response = self.wait_operation(op, "model upload").await?;

        let name = pick_str(&response, "model").ok_or_else(|| {
            RegshipError::Validation(format!("model upload response without model: {response}"))
        })?;

        Ok(RegisteredModel {
            name: name.to_string(),
            display_name: request.display_name.clone(),
            version_id: pick_str(&response, "modelVersionId").map(ToString::to_string),
        })
    }

    async fn list_endpoints(&self, display_name: &str) -> Result<Vec<Endpoint>> {
        let resource = format!("{}/endpoints", self.parent());
        self.list_all(&resource, "endpoints", display_name)
            .await?
            .iter()
            .map(parse_endpoint)
            .collect()
    }

    async fn create_endpoint(&self, display_name: &str) -> Result<Endpoint> {
        let resource = format!("{}/endpoints", self.parent());
        let op = self
            .request_json(
                Method::POST,
                &resource,
                None,
                Some(json!({ "displayName": display_name })),
            )
            .await?;
        let response = self.wait_operation(op, "endpoint creation").await?;
        parse_endpoint(&response)
    }

    async fn deploy_model(&self, request: &DeployRequest) -> Result<DeployedModel> {
        let resource = format!("{}:deployModel", request.endpoint);
        let op = self
            .request_json(Method::POST, &resource, None, Some(deploy_body(request)))
            .await?;
        let response = self.wait_operation(op, "model deployment").await?;

        let id = response
            .get("deployedModel")
            .and_then(|m| pick_str(m, "id"))
            .ok_or_else(|| {
                RegshipError::Validation(format!(
                    "deploy response without deployed model id: {response}"
                ))
            })?;

        Ok(DeployedModel {
            id: id.to_string(),
            endpoint: request.endpoint.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_quotes_display_name() {
        assert_eq!(display_name_filter("csv-endpoint"), "display_name=\"csv-endpoint\"");
        assert_eq!(display_name_filter("a\"b"), "display_name=\"a\\\"b\"");
    }

    #[test]
    fn parses_endpoint_with_traffic() {
        let value = json!({
            "name": "projects/p/locations/us-central1/endpoints/123",
            "displayName": "csv-endpoint",
            "trafficSplit": { "456": 100 },
        });
        let endpoint = parse_endpoint(&value).unwrap();
        assert_eq!(endpoint.name, "projects/p/locations/us-central1/endpoints/123");
        assert_eq!(endpoint.display_name, "csv-endpoint");
        assert_eq!(endpoint.traffic_split.get("456"), Some(&100));
    }

    #[test]
    fn endpoint_without_name_is_rejected() {
        assert!(parse_endpoint(&json!({ "displayName": "x" })).is_err());
    }

    #[test]
    fn upload_body_carries_parent_model() {
        let body = upload_body(&ModelUploadRequest {
            display_name: "csv-model".to_string(),
            artifact_uri: "gs://b/model/".to_string(),
            serving_container_image: "image:latest".to_string(),
            parent_model: Some("projects/p/locations/r/models/9".to_string()),
            description: None,
        });
        assert_eq!(body["model"]["artifactUri"], "gs://b/model/");
        assert_eq!(body["model"]["containerSpec"]["imageUri"], "image:latest");
        assert_eq!(body["parentModel"], "projects/p/locations/r/models/9");
        assert!(body["model"].get("description").is_none());
    }

    #[test]
    fn deploy_body_matches_api_shape() {
        let mut split = BTreeMap::new();
        split.insert("0".to_string(), 100);
        let body = deploy_body(&DeployRequest {
            endpoint: "projects/p/locations/r/endpoints/1".to_string(),
            model: "projects/p/locations/r/models/9@2".to_string(),
            display_name: "csv-model".to_string(),
            machine_type: "n1-standard-2".to_string(),
            min_replica_count: 1,
            max_replica_count: 1,
            traffic_split: split,
        });
        assert_eq!(
            body["deployedModel"]["dedicatedResources"]["machineSpec"]["machineType"],
            "n1-standard-2"
        );
        assert_eq!(body["trafficSplit"]["0"], 100);
        assert_eq!(body["deployedModel"]["model"], "projects/p/locations/r/models/9@2");
    }
}
