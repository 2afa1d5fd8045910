//! Remote adapters
//!
//! A [`RemoteAdapter`] is the backend the coordinator uploads to. Camera
//! registration and upload are required; job assignment, finalization and
//! hook data are optional capabilities with no-op defaults.
//!
//! Built-in adapters are selected by name:
//!
//! - `http`: ingestion service speaking the discovered-camera / jobs / shard
//!   upload protocol
//! - `copy`: copies files into a local directory tree

pub mod copy;
pub mod http;

use crate::error::{CliError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use vimport_common::{FileRecord, Location};

pub use copy::CopyAdapter;
pub use http::HttpAdapter;

/// Default bound on a single adapter request
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Operator-supplied adapter configuration
pub type HookData = Map<String, Value>;

/// Result of a successful camera registration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    pub camera_id: String,

    /// Adapter-defined extra fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CameraConfig {
    pub fn new(camera_id: impl Into<String>) -> Self {
        Self {
            camera_id: camera_id.into(),
            extra: Map::new(),
        }
    }
}

/// One shard of a job: the next `item_count` unscheduled records go to
/// `upload_url`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardSpec {
    pub shard_id: String,
    pub item_count: usize,
    pub upload_url: String,
}

/// Batch assignment returned by [`RemoteAdapter::assign_job`]. Shards are
/// consumed in vector order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobAssignment {
    pub job_id: String,
    pub shards: Vec<ShardSpec>,
}

impl JobAssignment {
    /// Total number of records the shards can take
    pub fn capacity(&self) -> usize {
        self.shards.iter().map(|s| s.item_count).sum()
    }
}

/// Everything an adapter needs to upload one file
#[derive(Debug, Clone)]
pub struct UploadRequest<'a> {
    pub camera_name: &'a str,
    /// `None` when registration failed under the best-effort policy
    pub camera_id: Option<&'a str>,
    pub path: &'a Path,
    pub timestamp: &'a str,
    pub location: &'a Location,
    pub key: &'a str,
    pub given_name: &'a str,
}

impl<'a> UploadRequest<'a> {
    pub fn for_record(record: &'a FileRecord, camera_id: Option<&'a str>) -> Self {
        Self {
            camera_name: &record.camera_name,
            camera_id,
            path: &record.filename,
            timestamp: &record.capture_timestamp,
            location: &record.location,
            key: &record.key,
            given_name: &record.given_name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HashMapEntry {
    pub original_filename: String,
    #[serde(rename = "size_MB")]
    pub size_mb: f64,
}

/// Shard contents passed to [`RemoteAdapter::finalize_job`]
#[derive(Debug, Clone)]
pub struct ShardManifest {
    pub job_id: String,
    pub shard_id: String,
    pub upload_url: String,
    pub records: Vec<FileRecord>,
    /// content key -> reconciliation metadata
    pub hash_map: BTreeMap<String, HashMapEntry>,
}

impl ShardManifest {
    pub fn new(
        job_id: impl Into<String>,
        shard_id: impl Into<String>,
        upload_url: impl Into<String>,
        records: Vec<FileRecord>,
    ) -> Self {
        let hash_map = records
            .iter()
            .map(|r| {
                (
                    r.key.clone(),
                    HashMapEntry {
                        original_filename: r.filename.to_string_lossy().to_string(),
                        size_mb: r.size_mb(),
                    },
                )
            })
            .collect();

        Self {
            job_id: job_id.into(),
            shard_id: shard_id.into(),
            upload_url: upload_url.into(),
            records,
            hash_map,
        }
    }

    pub fn item_count(&self) -> usize {
        self.records.len()
    }
}

/// Backend the pipeline uploads to
#[async_trait]
pub trait RemoteAdapter: Send + Sync {
    fn name(&self) -> &str;

    /// Receive operator configuration before discovery, and the registered
    /// cameras (`registered_cameras`) after registration
    fn set_hook_data(&mut self, _data: &HookData) -> Result<()> {
        Ok(())
    }

    async fn register_camera(&self, camera_name: &str, host: &str, port: u16) -> Result<CameraConfig>;

    /// `Ok(None)` means the adapter does not batch uploads into jobs
    async fn assign_job(&self, _item_count: usize, _avg_size_bytes: u64) -> Result<Option<JobAssignment>> {
        Ok(None)
    }

    /// `Ok(false)` and `Err` are both upload failures
    async fn upload_video(&self, request: &UploadRequest<'_>) -> Result<bool>;

    async fn finalize_job(&self, _manifest: &ShardManifest) -> Result<()> {
        Ok(())
    }
}

/// Built-in adapter names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AdapterKind {
    #[default]
    Http,
    Copy,
}

impl std::str::FromStr for AdapterKind {
    type Err = CliError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "http" => Ok(AdapterKind::Http),
            "copy" => Ok(AdapterKind::Copy),
            other => Err(CliError::UnknownAdapter(other.to_string())),
        }
    }
}

impl TryFrom<String> for AdapterKind {
    type Error = CliError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<AdapterKind> for String {
    fn from(kind: AdapterKind) -> Self {
        kind.to_string()
    }
}

impl std::fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdapterKind::Http => write!(f, "http"),
            AdapterKind::Copy => write!(f, "copy"),
        }
    }
}

/// Inputs shared by every adapter constructor
#[derive(Debug, Clone)]
pub struct AdapterSettings {
    pub host: String,
    pub port: u16,
    pub timeout: Duration,
    pub hook_data: HookData,
}

/// Construct the named adapter. Missing or invalid settings fail here,
/// before any file is touched.
pub fn build_adapter(kind: AdapterKind, settings: &AdapterSettings) -> Result<Box<dyn RemoteAdapter>> {
    let adapter: Box<dyn RemoteAdapter> = match kind {
        AdapterKind::Http => Box::new(HttpAdapter::from_settings(settings)?),
        AdapterKind::Copy => Box::new(CopyAdapter::from_settings(settings)?),
    };
    Ok(adapter)
}

/// Optional string entry of the hook data
pub(crate) fn hook_string(data: &HookData, key: &str) -> Result<Option<String>> {
    match data.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(CliError::config(format!(
            "hook data key '{}' must be a string, got {}",
            key, other
        ))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;

    #[test]
    fn test_adapter_kind_parsing() {
        assert_eq!("http".parse::<AdapterKind>().unwrap(), AdapterKind::Http);
        assert_eq!("COPY".parse::<AdapterKind>().unwrap(), AdapterKind::Copy);
        assert!(matches!(
            "camio_importer".parse::<AdapterKind>(),
            Err(CliError::UnknownAdapter(name)) if name == "camio_importer"
        ));
    }

    #[test]
    fn test_shard_manifest_hash_map() {
        let records = vec![
            FileRecord::new("k1", PathBuf::from("/v/a-x-1.mp4"), "a", "2017-03-08T19:06:40.000", "t")
                .with_size(2_500_000),
            FileRecord::new("k2", PathBuf::from("/v/a-x-2.mp4"), "a", "2017-03-08T19:06:41.000", "t")
                .with_size(1_000_000),
        ];
        let manifest = ShardManifest::new("job", "s1", "http://up/s1", records);

        assert_eq!(manifest.item_count(), 2);
        assert_eq!(manifest.hash_map["k1"].original_filename, "/v/a-x-1.mp4");
        assert!((manifest.hash_map["k1"].size_mb - 2.5).abs() < 1e-9);

        let wire = serde_json::to_value(&manifest.hash_map["k2"]).unwrap();
        assert_eq!(wire, json!({"original_filename": "/v/a-x-2.mp4", "size_MB": 1.0}));
    }

    #[test]
    fn test_job_capacity() {
        let job = JobAssignment {
            job_id: "j".to_string(),
            shards: vec![
                ShardSpec {
                    shard_id: "a".to_string(),
                    item_count: 4,
                    upload_url: "u".to_string(),
                },
                ShardSpec {
                    shard_id: "b".to_string(),
                    item_count: 6,
                    upload_url: "u".to_string(),
                },
            ],
        };
        assert_eq!(job.capacity(), 10);
    }

    #[test]
    fn test_hook_string() {
        let data = json!({"server": "http://x", "user_id": 7, "bad": [1]});
        let data = data.as_object().unwrap();
        assert_eq!(hook_string(data, "server").unwrap().as_deref(), Some("http://x"));
        assert_eq!(hook_string(data, "user_id").unwrap().as_deref(), Some("7"));
        assert_eq!(hook_string(data, "missing").unwrap(), None);
        assert!(hook_string(data, "bad").is_err());
    }
}
