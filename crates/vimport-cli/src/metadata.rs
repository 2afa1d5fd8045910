//! Capture metadata derived from file paths
//!
//! The file pattern is a regular expression matched against the start of the
//! full path. It names the capture groups `camera` and `epoch`, and may name
//! `lat` and `lng`:
//!
//! ```text
//! .*/(?P<camera>\w+?)-.*-(?P<epoch>\d+)\.mp4
//! /videos/frontdoor-motion-1489000000.mp4  ->  camera "frontdoor", epoch 1489000000
//! ```

use crate::error::{CliError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};
use vimport_common::types::timestamp::{
    format_epoch_fractional, format_epoch_seconds, format_system_time,
};
use vimport_common::Location;

/// Pattern used when none is configured
pub const DEFAULT_FILE_PATTERN: &str = r".*/(?P<camera>\w+?)-.*-(?P<epoch>\d+)\.mp4";

/// Camera name substituted under the permissive policy
pub const DEFAULT_CAMERA_NAME: &str = "unnamed";

/// What to do when a path yields no camera name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraNamePolicy {
    /// Reject the file
    Strict,
    /// Use the given name instead
    Default(String),
}

impl Default for CameraNamePolicy {
    fn default() -> Self {
        CameraNamePolicy::Strict
    }
}

/// Where a capture timestamp came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampSource {
    Path,
    StatusChange,
}

/// Metadata extracted for one file
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureMetadata {
    pub camera_name: String,
    /// ISO-8601, millisecond precision
    pub timestamp: String,
    pub timestamp_source: TimestampSource,
    pub location: Location,
}

/// Parses camera name, capture time and location out of file paths
#[derive(Debug, Clone)]
pub struct MetadataExtractor {
    regex: Regex,
    policy: CameraNamePolicy,
}

impl MetadataExtractor {
    /// Compile `pattern`, anchored at the start of the path
    pub fn new(pattern: &str, policy: CameraNamePolicy) -> Result<Self> {
        let regex = Regex::new(&format!("^(?:{})", pattern))?;
        if !regex.capture_names().flatten().any(|name| name == "camera") {
            warn!(pattern, "File pattern has no 'camera' capture group");
        }
        Ok(Self { regex, policy })
    }

    pub fn policy(&self) -> &CameraNamePolicy {
        &self.policy
    }

    /// Extract metadata for `path`.
    ///
    /// Fails with [`CliError::UnparsableMetadata`] when no camera name can be
    /// derived under the strict policy, or when no timestamp can be derived
    /// at all.
    pub fn extract(&self, path: &Path) -> Result<CaptureMetadata> {
        let path_str = path.to_string_lossy();
        let captures = self.regex.captures(&path_str);

        let group = |name: &str| {
            captures
                .as_ref()
                .and_then(|c| c.name(name))
                .map(|m| m.as_str().trim())
                .filter(|s| !s.is_empty())
        };

        let camera_name = match (group("camera"), &self.policy) {
            (Some(name), _) => name.to_string(),
            (None, CameraNamePolicy::Default(name)) => {
                warn!(path = %path.display(), camera = %name, "Did not detect camera name, using default");
                name.clone()
            },
            (None, CameraNamePolicy::Strict) => {
                return Err(CliError::unparsable(path, "no camera name in path"));
            },
        };

        let from_path = group("epoch").and_then(|epoch| {
            let parsed = match epoch.parse::<i64>() {
                Ok(secs) => format_epoch_seconds(secs),
                Err(_) => epoch
                    .parse::<f64>()
                    .map_err(|e| vimport_common::CommonError::InvalidTimestamp(e.to_string()))
                    .and_then(format_epoch_fractional),
            };
            match parsed {
                Ok(ts) => Some(ts),
                Err(e) => {
                    warn!(path = %path.display(), epoch, error = %e, "Unusable epoch in path");
                    None
                },
            }
        });

        let (timestamp, timestamp_source) = match from_path {
            Some(ts) => (ts, TimestampSource::Path),
            None => {
                let changed = status_change_time(path)
                    .map_err(|e| CliError::unparsable(path, format!("no epoch in path and {}", e)))?;
                let ts = format_system_time(changed);
                warn!(
                    path = %path.display(),
                    timestamp = %ts,
                    "Did not detect epoch, assuming the time the file was last changed"
                );
                (ts, TimestampSource::StatusChange)
            },
        };

        let location = Location::new(
            group("lat").and_then(|v| v.parse().ok()),
            group("lng").and_then(|v| v.parse().ok()),
        );

        debug!(path = %path.display(), camera = %camera_name, timestamp = %timestamp, "Extracted metadata");

        Ok(CaptureMetadata {
            camera_name,
            timestamp,
            timestamp_source,
            location,
        })
    }
}

/// Last status-change time of a file (ctime on unix, mtime elsewhere)
fn status_change_time(path: &Path) -> std::io::Result<SystemTime> {
    let meta = std::fs::metadata(path)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        if let (Ok(secs), Ok(nanos)) = (u64::try_from(meta.ctime()), u32::try_from(meta.ctime_nsec())) {
            return Ok(UNIX_EPOCH + Duration::new(secs, nanos));
        }
    }

    meta.modified()
}
