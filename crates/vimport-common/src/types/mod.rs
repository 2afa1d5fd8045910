//! Common types used across the importer

pub mod timestamp;

use crate::error::{CommonError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Capture location parsed from a file path
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

impl Location {
    pub fn new(lat: Option<f64>, lng: Option<f64>) -> Self {
        Self { lat, lng }
    }

    /// Location with neither coordinate known
    pub fn unknown() -> Self {
        Self::default()
    }

    /// Both coordinates are present
    pub fn is_known(&self) -> bool {
        self.lat.is_some() && self.lng.is_some()
    }

    /// JSON description sent to ingestion services,
    /// e.g. `{"location": {"lat": 7.36, "lng": 134.70}}`
    pub fn to_json(&self) -> Option<serde_json::Value> {
        match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => Some(serde_json::json!({
                "location": { "lat": lat, "lng": lng }
            })),
            _ => None,
        }
    }
}

/// Job and shard a record was assigned to.
///
/// The three values are only ever set together.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShardAssignment {
    pub job_id: String,
    pub shard_id: String,
    pub upload_url: String,
}

impl ShardAssignment {
    pub fn new(
        job_id: impl Into<String>,
        shard_id: impl Into<String>,
        upload_url: impl Into<String>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            shard_id: shard_id.into(),
            upload_url: upload_url.into(),
        }
    }
}

/// Tracking record for one distinct file content, keyed by content key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Content key (hex SHA-256 of the file bytes)
    pub key: String,

    /// Absolute path at discovery time
    pub filename: PathBuf,

    pub camera_name: String,

    /// Capture time, ISO-8601 with millisecond precision
    pub capture_timestamp: String,

    /// `camera.timestamp.key.ext`
    pub given_name: String,

    /// Video duration, 0 when unknown
    #[serde(default)]
    pub duration_seconds: f64,

    pub size_bytes: u64,

    /// Set once, when the content is first seen
    pub discovered_on: String,

    /// Set only after the adapter reported a successful upload
    pub uploaded_on: Option<String>,

    /// Reserved for remote confirmation
    pub confirmed_on: Option<String>,

    pub assignment: Option<ShardAssignment>,

    #[serde(default)]
    pub location: Location,
}

impl FileRecord {
    /// Create a freshly discovered record
    pub fn new(
        key: impl Into<String>,
        filename: impl Into<PathBuf>,
        camera_name: impl Into<String>,
        capture_timestamp: impl Into<String>,
        discovered_on: impl Into<String>,
    ) -> Self {
        let key = key.into();
        let filename = filename.into();
        let camera_name = camera_name.into();
        let capture_timestamp = capture_timestamp.into();
        let given_name = given_name(&camera_name, &capture_timestamp, &key, &filename);

        Self {
            key,
            filename,
            camera_name,
            capture_timestamp,
            given_name,
            duration_seconds: 0.0,
            size_bytes: 0,
            discovered_on: discovered_on.into(),
            uploaded_on: None,
            confirmed_on: None,
            assignment: None,
            location: Location::unknown(),
        }
    }

    pub fn with_size(mut self, size_bytes: u64) -> Self {
        self.size_bytes = size_bytes;
        self
    }

    pub fn with_duration(mut self, duration_seconds: f64) -> Self {
        self.duration_seconds = duration_seconds;
        self
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = location;
        self
    }

    /// Uploaded means an explicit upload timestamp is present
    pub fn is_uploaded(&self) -> bool {
        self.uploaded_on.is_some()
    }

    pub fn is_assigned(&self) -> bool {
        self.assignment.is_some()
    }

    pub fn job_id(&self) -> Option<&str> {
        self.assignment.as_ref().map(|a| a.job_id.as_str())
    }

    pub fn shard_id(&self) -> Option<&str> {
        self.assignment.as_ref().map(|a| a.shard_id.as_str())
    }

    pub fn upload_url(&self) -> Option<&str> {
        self.assignment.as_ref().map(|a| a.upload_url.as_str())
    }

    /// Record the adapter-confirmed upload time
    pub fn mark_uploaded(&mut self, uploaded_on: impl Into<String>) {
        self.uploaded_on = Some(uploaded_on.into());
    }

    /// Size in (decimal) megabytes, as reported to ingestion services
    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / 1e6
    }

    /// Check the invariants a record must hold before it is persisted
    pub fn validate(&self) -> Result<()> {
        if self.key.is_empty() {
            return Err(CommonError::InvalidRecord("content key is empty".to_string()));
        }
        if self.camera_name.trim().is_empty() {
            return Err(CommonError::InvalidRecord(format!(
                "record {} has no camera name",
                self.key
            )));
        }
        if let Some(assignment) = &self.assignment {
            if assignment.job_id.is_empty()
                || assignment.shard_id.is_empty()
                || assignment.upload_url.is_empty()
            {
                return Err(CommonError::InvalidRecord(format!(
                    "record {} has an incomplete job/shard assignment",
                    self.key
                )));
            }
        }
        Ok(())
    }
}

/// Synthesize the name a file is known by remotely: `camera.timestamp.key.ext`
pub fn given_name(camera_name: &str, timestamp: &str, key: &str, path: &Path) -> String {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => format!("{}.{}.{}.{}", camera_name, timestamp, key, ext),
        None => format!("{}.{}.{}", camera_name, timestamp, key),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn sample() -> FileRecord {
        FileRecord::new(
            "abc123",
            "/videos/frontdoor-clip-1489000000.mp4",
            "frontdoor",
            "2017-03-08T19:06:40.000",
            "2024-01-01T00:00:00.000",
        )
    }

    #[test]
    fn test_given_name_synthesis() {
        let record = sample();
        assert_eq!(record.given_name, "frontdoor.2017-03-08T19:06:40.000.abc123.mp4");
    }

    #[test]
    fn test_new_record_is_unuploaded_and_unassigned() {
        let record = sample();
        assert!(!record.is_uploaded());
        assert!(!record.is_assigned());
        assert_eq!(record.job_id(), None);
        assert_eq!(record.confirmed_on, None);
        assert_eq!(record.duration_seconds, 0.0);
    }

    #[test]
    fn test_validate_rejects_missing_camera() {
        let mut record = sample();
        record.camera_name = "  ".to_string();
        assert!(matches!(record.validate(), Err(CommonError::InvalidRecord(_))));
    }

    #[test]
    fn test_validate_rejects_partial_assignment() {
        let mut record = sample();
        record.assignment = Some(ShardAssignment::new("job-1", "", "http://upload"));
        assert!(record.validate().is_err());

        record.assignment = Some(ShardAssignment::new("job-1", "s1", "http://upload"));
        assert!(record.validate().is_ok());
        assert_eq!(record.shard_id(), Some("s1"));
    }

    #[test]
    fn test_size_mb() {
        let record = sample().with_size(2_500_000);
        assert!((record.size_mb() - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_location_json() {
        assert!(Location::unknown().to_json().is_none());
        assert!(Location::new(Some(1.0), None).to_json().is_none());

        let json = Location::new(Some(7.5), Some(134.25)).to_json().unwrap();
        assert_eq!(json["location"]["lat"], 7.5);
        assert_eq!(json["location"]["lng"], 134.25);
    }
}
