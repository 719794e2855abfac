use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{RegshipError, Result};

/// Where the artifact lives in object storage.
///
/// The platform copies everything under `gs://<bucket>/<prefix>/` into each
/// model version, so history copies live under the sibling
/// `<prefix>-history/` prefix instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLocation {
    pub bucket: String,
    /// Object prefix without leading or trailing slashes, e.g. "model"
    pub prefix: String,
}

impl ArtifactLocation {
    pub fn new(bucket: &str, prefix: &str) -> Result<Self> {
        let bucket = bucket.trim().trim_start_matches("gs://").trim_end_matches('/');
        if bucket.is_empty() || bucket.contains('/') {
            return Err(RegshipError::Validation(format!(
                "invalid bucket name '{bucket}'"
            )));
        }
        let prefix = prefix.trim_matches('/');
        if prefix.is_empty() {
            return Err(RegshipError::Validation(
                "artifact prefix must not be empty".to_string(),
            ));
        }
        Ok(Self {
            bucket: bucket.to_string(),
            prefix: prefix.to_string(),
        })
    }

    /// Object name of the current artifact.
    pub fn object_name(&self, file_name: &str) -> String {
        format!("{}/{}", self.prefix, file_name)
    }

    /// Object name of a timestamped copy, e.g. `model-history/20260101T120000Z/model.json`.
    pub fn history_object_name(&self, stamp: &str, file_name: &str) -> String {
        format!("{}-history/{}/{}", self.prefix, stamp, file_name)
    }

    pub fn object_uri(&self, file_name: &str) -> String {
        format!("gs://{}/{}", self.bucket, self.object_name(file_name))
    }

    /// Directory URI handed to the platform as the model's artifact location.
    pub fn directory_uri(&self) -> String {
        format!("gs://{}/{}/", self.bucket, self.prefix)
    }
}

/// Result of a successful object upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    pub bucket: String,
    pub name: String,
    pub size: u64,
    #[serde(default)]
    pub generation: Option<String>,
}

impl StoredObject {
    pub fn uri(&self) -> String {
        format!("gs://{}/{}", self.bucket, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelUploadRequest {
    pub display_name: String,
    pub artifact_uri: String,
    pub serving_container_image: String,
    /// Existing model to add this upload to as a new version
    pub parent_model: Option<String>,
    pub description: Option<String>,
}

/// A model registered on the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredModel {
    /// Full resource name, `projects/../locations/../models/<id>`
    pub name: String,
    pub display_name: String,
    pub version_id: Option<String>,
}

impl RegisteredModel {
    /// Resource name pinned to this version when one is known.
    pub fn versioned_name(&self) -> String {
        match &self.version_id {
            Some(version) => format!("{}@{}", self.name, version),
            None => self.name.clone(),
        }
    }
}

/// An inference endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Endpoint {
    /// Full resource name, `projects/../locations/../endpoints/<id>`
    pub name: String,
    pub display_name: String,
    /// Deployed model id -> percentage of traffic
    pub traffic_split: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployRequest {
    pub endpoint: String,
    pub model: String,
    pub display_name: String,
    pub machine_type: String,
    pub min_replica_count: u32,
    pub max_replica_count: u32,
    /// Key "0" stands for the model being deployed
    pub traffic_split: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployedModel {
    pub id: String,
    pub endpoint: String,
}

/// Traffic split for deploying a new model with `new_share` percent of the
/// endpoint's traffic.
///
/// The new model is keyed "0". Models already on the endpoint share the
/// remainder in proportion to their current split (largest remainder
/// rounding). An endpoint with nothing deployed gives the new model 100%.
pub fn plan_traffic_split(
    existing: &BTreeMap<String, u32>,
    new_share: u32,
) -> Result<BTreeMap<String, u32>> {
    if new_share == 0 || new_share > 100 {
        return Err(RegshipError::Validation(format!(
            "traffic share must be between 1 and 100, got {new_share}"
        )));
    }

    let current: Vec<(&String, u32)> = existing
        .iter()
        .filter(|(_, pct)| **pct > 0)
        .map(|(id, pct)| (id, *pct))
        .collect();
    let current_total: u32 = current.iter().map(|(_, pct)| pct).sum();

    let mut split = BTreeMap::new();
    if new_share == 100 || current_total == 0 {
        split.insert("0".to_string(), 100);
        return Ok(split);
    }

    let remaining = 100 - new_share;
    let mut allotted = 0;
    let mut remainders = Vec::with_capacity(current.len());
    for (id, pct) in &current {
        let exact = pct * remaining;
        let share = exact / current_total;
        allotted += share;
        remainders.push((exact % current_total, (*id).clone()));
        split.insert((*id).clone(), share);
    }

    remainders.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    for (_, id) in remainders.into_iter().take((remaining - allotted) as usize) {
        if let Some(share) = split.get_mut(&id) {
            *share += 1;
        }
    }

    split.retain(|_, pct| *pct > 0);
    split.insert("0".to_string(), new_share);
    Ok(split)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(pairs: &[(&str, u32)]) -> BTreeMap<String, u32> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn location_builds_uris() {
        let loc = ArtifactLocation::new("gs://my-bucket/", "/model/").unwrap();
        assert_eq!(loc.bucket, "my-bucket");
        assert_eq!(loc.object_name("model.json"), "model/model.json");
        assert_eq!(loc.object_uri("model.json"), "gs://my-bucket/model/model.json");
        assert_eq!(loc.directory_uri(), "gs://my-bucket/model/");
        assert_eq!(
            loc.history_object_name("20260101T000000Z", "model.json"),
            "model-history/20260101T000000Z/model.json"
        );
    }

    #[test]
    fn history_stays_outside_the_artifact_directory() {
        for prefix in ["model", "models/prices", "m"] {
            let loc = ArtifactLocation::new("b", prefix).unwrap();
            let history = format!(
                "gs://b/{}",
                loc.history_object_name("20260101T000000Z", "model.json")
            );
            assert!(
                !history.starts_with(&loc.directory_uri()),
                "{history} is inside {}",
                loc.directory_uri()
            );
        }
    }

    #[test]
    fn location_requires_prefix() {
        assert!(ArtifactLocation::new("b", "").is_err());
        assert!(ArtifactLocation::new("b", "/").is_err());
    }

    #[test]
    fn location_rejects_paths_as_bucket() {
        assert!(ArtifactLocation::new("a/b", "model").is_err());
        assert!(ArtifactLocation::new("  ", "model").is_err());
    }

    #[test]
    fn versioned_name_pins_version() {
        let model = RegisteredModel {
            name: "projects/p/locations/r/models/42".to_string(),
            display_name: "csv-model".to_string(),
            version_id: Some("3".to_string()),
        };
        assert_eq!(model.versioned_name(), "projects/p/locations/r/models/42@3");
    }

    #[test]
    fn full_share_sends_everything_to_new_model() {
        let planned = plan_traffic_split(&split(&[("111", 100)]), 100).unwrap();
        assert_eq!(planned, split(&[("0", 100)]));
    }

    #[test]
    fn empty_endpoint_gets_full_share_regardless() {
        let planned = plan_traffic_split(&BTreeMap::new(), 30).unwrap();
        assert_eq!(planned, split(&[("0", 100)]));
    }

    #[test]
    fn partial_share_scales_existing_models() {
        let planned = plan_traffic_split(&split(&[("a", 50), ("b", 50)]), 25).unwrap();
        assert_eq!(planned.values().sum::<u32>(), 100);
        assert_eq!(planned["0"], 25);
        assert_eq!(planned["a"] + planned["b"], 75);
        assert_eq!(planned["a"], 38);
        assert_eq!(planned["b"], 37);
    }

    #[test]
    fn share_out_of_range_is_rejected() {
        assert!(plan_traffic_split(&BTreeMap::new(), 0).is_err());
        assert!(plan_traffic_split(&BTreeMap::new(), 101).is_err());
    }
}
