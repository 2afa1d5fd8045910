//! Wire types of the ingestion service

use crate::adapter::HashMapEntry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Device user agent announced when registering cameras
pub const DEVICE_USER_AGENT: &str = "import-video (batch importer)";

/// Entry of the camera discovery payload, keyed by local camera id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredCamera {
    pub device_id_discovering: Option<String>,
    pub acquisition_method: String,
    pub discovery_history: serde_json::Map<String, serde_json::Value>,
    pub device_user_agent: String,
    pub user_id: Option<String>,
    pub local_camera_id: String,
    pub name: String,
    pub mac_address: String,
    pub is_authenticated: bool,
    pub should_config: bool,
}

impl DiscoveredCamera {
    pub fn batch(
        name: &str,
        local_camera_id: &str,
        device_id: Option<&str>,
        user_id: Option<&str>,
    ) -> Self {
        Self {
            device_id_discovering: device_id.map(str::to_string),
            acquisition_method: "batch".to_string(),
            discovery_history: serde_json::Map::new(),
            device_user_agent: DEVICE_USER_AGENT.to_string(),
            user_id: user_id.map(str::to_string),
            local_camera_id: local_camera_id.to_string(),
            name: name.to_string(),
            mac_address: local_camera_id.to_string(),
            is_authenticated: false,
            should_config: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    pub device_id: Option<String>,
    pub item_count: usize,
    pub item_average_size_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardEntry {
    pub item_count: usize,
    pub upload_url: String,
}

/// Response of the job endpoint; shard ids iterate in sorted order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResponse {
    #[serde(deserialize_with = "string_or_number")]
    pub job_id: String,
    pub shard_map: BTreeMap<String, ShardEntry>,
}

/// Body sent to a shard's upload URL once its uploads are done
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizeRequest {
    pub job_id: String,
    pub shard_id: String,
    pub item_count: usize,
    pub hash_map: BTreeMap<String, HashMapEntry>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_job_response_orders_shards() {
        let response: JobResponse = serde_json::from_value(json!({
            "job_id": 42,
            "shard_map": {
                "s2": {"item_count": 6, "upload_url": "http://up/s2"},
                "s1": {"item_count": 4, "upload_url": "http://up/s1"}
            }
        }))
        .unwrap();

        assert_eq!(response.job_id, "42");
        let ids: Vec<&String> = response.shard_map.keys().collect();
        assert_eq!(ids, vec!["s1", "s2"]);
    }

    #[test]
    fn test_discovered_camera_payload() {
        let camera = DiscoveredCamera::batch("porch", "abc", Some("dev1"), None);
        let value = serde_json::to_value(&camera).unwrap();
        assert_eq!(value["acquisition_method"], "batch");
        assert_eq!(value["mac_address"], "abc");
        assert_eq!(value["is_authenticated"], false);
        assert_eq!(value["device_id_discovering"], "dev1");
        assert!(value["user_id"].is_null());
    }
}
