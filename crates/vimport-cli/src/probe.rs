//! Best-effort duration probing with ffprobe
//!
//! Runs `ffprobe -v quiet -print_format json -show_format <file>` and reads
//! `format.duration`. Any failure (binary missing, non-zero exit, bad output)
//! is logged and reported as a duration of 0.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Binary used when none is configured
pub const DEFAULT_FFPROBE: &str = "ffprobe";

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("ffprobe binary not available: {0}")]
    NotFound(std::io::Error),

    #[error("ffprobe exited with {exit_code:?}")]
    ExecutionFailed { exit_code: Option<i32> },

    #[error("failed to parse ffprobe output: {0}")]
    Parse(String),
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    format: ProbeFormat,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Duration prober; a disabled prober always answers 0
#[derive(Debug, Clone)]
pub struct DurationProbe {
    binary: Option<PathBuf>,
}

impl DurationProbe {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: Some(binary.into()),
        }
    }

    pub fn disabled() -> Self {
        Self { binary: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.binary.is_some()
    }

    /// Duration of `path` in seconds, 0 when unknown
    pub async fn duration_seconds(&self, path: &Path) -> f64 {
        let Some(binary) = &self.binary else {
            return 0.0;
        };

        match run_ffprobe(binary, path).await {
            Ok(duration) => {
                debug!(path = %path.display(), duration, "Probed duration");
                duration
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not probe duration, using 0");
                0.0
            },
        }
    }
}

impl Default for DurationProbe {
    fn default() -> Self {
        Self::new(DEFAULT_FFPROBE)
    }
}

async fn run_ffprobe(binary: &Path, path: &Path) -> Result<f64, ProbeError> {
    let output = tokio::process::Command::new(binary)
        .args(["-v", "quiet", "-print_format", "json", "-show_format"])
        .arg(path)
        .output()
        .await
        .map_err(ProbeError::NotFound)?;

    if !output.status.success() {
        return Err(ProbeError::ExecutionFailed {
            exit_code: output.status.code(),
        });
    }

    parse_duration(&String::from_utf8_lossy(&output.stdout))
}

fn parse_duration(stdout: &str) -> Result<f64, ProbeError> {
    let parsed: ProbeOutput =
        serde_json::from_str(stdout).map_err(|e| ProbeError::Parse(e.to_string()))?;
    let raw = parsed
        .format
        .duration
        .ok_or_else(|| ProbeError::Parse("no format.duration".to_string()))?;
    let duration: f64 = raw
        .trim()
        .parse()
        .map_err(|_| ProbeError::Parse(format!("bad duration '{}'", raw)))?;
    if duration.is_finite() && duration >= 0.0 {
        Ok(duration)
    } else {
        Err(ProbeError::Parse(format!("bad duration '{}'", raw)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        let json = r#"{"format": {"filename": "a.mp4", "duration": "12.480000"}}"#;
        assert!((parse_duration(json).unwrap() - 12.48).abs() < 1e-9);
    }

    #[test]
    fn test_parse_duration_missing_field() {
        assert!(parse_duration(r#"{"format": {}}"#).is_err());
        assert!(parse_duration("not json").is_err());
        assert!(parse_duration(r#"{"format": {"duration": "N/A"}}"#).is_err());
    }

    #[tokio::test]
    async fn test_disabled_probe_returns_zero() {
        let probe = DurationProbe::disabled();
        assert!(!probe.is_enabled());
        assert_eq!(probe.duration_seconds(Path::new("/nope.mp4")).await, 0.0);
    }

    #[tokio::test]
    async fn test_missing_binary_returns_zero() {
        let probe = DurationProbe::new("/nonexistent/ffprobe-for-tests");
        assert_eq!(probe.duration_seconds(Path::new("/nope.mp4")).await, 0.0);
    }
}
