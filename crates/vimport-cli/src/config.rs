//! Importer configuration
//!
//! Values are layered: built-in defaults, then an optional TOML file
//! (`--config`), then command-line flags and their environment variables.
//!
//! ```toml
//! host = "ingest.local"
//! port = 8080
//! storage = "/var/lib/import-video/.processes.db"
//! adapter = "http"
//! camera_policy = { default = "unnamed" }
//! registration_policy = "fail_fast"
//!
//! [hook_data]
//! server = "https://ingest.example.com"
//! auth_token = "..."
//! ```

use crate::adapter::{AdapterKind, HookData, DEFAULT_TIMEOUT_SECS};
use crate::error::{CliError, Result};
use crate::metadata::{CameraNamePolicy, DEFAULT_FILE_PATTERN};
use crate::probe::DEFAULT_FFPROBE;
use crate::scanner::DEFAULT_EXTENSIONS;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ============================================================================
// Configuration Constants
// ============================================================================

/// Ledger location when none is given
pub const DEFAULT_STORAGE: &str = ".processes.db";

/// Ingestion service host when none is given
pub const DEFAULT_HOST: &str = "localhost";

/// Ingestion service port when none is given
pub const DEFAULT_PORT: u16 = 8080;

/// What a camera registration failure does to the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationPolicy {
    /// Log it; the camera's files upload without a camera id
    #[default]
    BestEffort,
    /// Stop the run before any upload
    FailFast,
}

impl std::str::FromStr for RegistrationPolicy {
    type Err = CliError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "best_effort" => Ok(RegistrationPolicy::BestEffort),
            "fail_fast" => Ok(RegistrationPolicy::FailFast),
            other => Err(CliError::config(format!(
                "unknown registration policy '{}' (expected best-effort or fail-fast)",
                other
            ))),
        }
    }
}

/// Everything an upload run needs to know
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImporterConfig {
    /// Folder to scan
    pub root: Option<PathBuf>,

    /// Ingestion service host, passed to camera registration
    pub host: String,

    pub port: u16,

    /// Ledger file; its lock lives at `<storage>.lock`
    pub storage: PathBuf,

    /// Regular expression with `camera`, `epoch` and optional `lat`/`lng` groups
    pub pattern: String,

    pub extensions: Vec<String>,

    pub camera_policy: CameraNamePolicy,

    pub registration_policy: RegistrationPolicy,

    pub adapter: AdapterKind,

    /// Probe durations with ffprobe
    pub probe: bool,

    pub ffprobe: PathBuf,

    /// Bound on every adapter request
    pub timeout_secs: u64,

    /// Adapter-specific settings
    pub hook_data: HookData,
}

impl Default for ImporterConfig {
    fn default() -> Self {
        Self {
            root: None,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            storage: PathBuf::from(DEFAULT_STORAGE),
            pattern: DEFAULT_FILE_PATTERN.to_string(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            camera_policy: CameraNamePolicy::default(),
            registration_policy: RegistrationPolicy::default(),
            adapter: AdapterKind::default(),
            probe: true,
            ffprobe: PathBuf::from(DEFAULT_FFPROBE),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            hook_data: HookData::new(),
        }
    }
}

impl ImporterConfig {
    /// Load a TOML config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            CliError::config(format!("cannot read config file '{}': {}", path.display(), e))
        })?;
        let config: ImporterConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Defaults, or the file at `path` when given
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Root folder, which an upload run cannot do without
    pub fn root(&self) -> Result<&Path> {
        self.root
            .as_deref()
            .ok_or_else(|| CliError::config("no folder to import was given"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.pattern.trim().is_empty() {
            return Err(CliError::config("file pattern is empty"));
        }
        if self.extensions.is_empty() {
            return Err(CliError::config("no file extensions configured"));
        }
        if self.timeout_secs == 0 {
            return Err(CliError::config("timeout must be at least one second"));
        }
        if let CameraNamePolicy::Default(name) = &self.camera_policy {
            if name.trim().is_empty() {
                return Err(CliError::config("default camera name is empty"));
            }
        }
        Ok(())
    }
}

/// Parse an inline hook data blob; it must be a JSON object
pub fn parse_hook_data(json: &str) -> Result<HookData> {
    let value: Value = serde_json::from_str(json)
        .map_err(|e| CliError::hook_data(format!("hook data is not valid JSON: {}", e)))?;
    match value {
        Value::Object(map) => Ok(map),
        other => Err(CliError::hook_data(format!(
            "hook data must be a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

/// Read a hook data file; it must exist and hold a JSON object
pub fn read_hook_data_file(path: impl AsRef<Path>) -> Result<HookData> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
        CliError::hook_data(format!("cannot read hook data file '{}': {}", path.display(), e))
    })?;
    parse_hook_data(&content).map_err(|e| match e {
        CliError::HookData(msg) => CliError::hook_data(format!("{} ({})", msg, path.display())),
        other => other,
    })
}

/// Combine hook data sources; later layers override earlier keys
pub fn merge_hook_data(layers: impl IntoIterator<Item = HookData>) -> HookData {
    let mut merged = HookData::new();
    for layer in layers {
        merged.extend(layer);
    }
    merged
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = ImporterConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.storage, PathBuf::from(".processes.db"));
        assert_eq!(config.extensions, vec![".mp4".to_string()]);
        assert_eq!(config.camera_policy, CameraNamePolicy::Strict);
        assert_eq!(config.registration_policy, RegistrationPolicy::BestEffort);
        assert_eq!(config.adapter, AdapterKind::Http);
        assert_eq!(config.timeout(), Duration::from_secs(300));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("import.toml");
        std::fs::write(
            &path,
            r#"
host = "ingest.local"
port = 9000
adapter = "copy"
camera_policy = { default = "unnamed" }
registration_policy = "fail_fast"

[hook_data]
destination = "/srv/videos"
"#,
        )
        .unwrap();

        let config = ImporterConfig::load(&path).unwrap();
        assert_eq!(config.host, "ingest.local");
        assert_eq!(config.port, 9000);
        assert_eq!(config.adapter, AdapterKind::Copy);
        assert_eq!(config.camera_policy, CameraNamePolicy::Default("unnamed".to_string()));
        assert_eq!(config.registration_policy, RegistrationPolicy::FailFast);
        assert_eq!(config.hook_data["destination"], "/srv/videos");
        // untouched keys keep their defaults
        assert_eq!(config.storage, PathBuf::from(DEFAULT_STORAGE));
    }

    #[test]
    fn test_unknown_adapter_in_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("import.toml");
        std::fs::write(&path, "adapter = \"ftp\"\n").unwrap();
        assert!(ImporterConfig::load(&path).is_err());
    }

    #[test]
    fn test_missing_config_file() {
        let result = ImporterConfig::load("/nonexistent/import.toml");
        assert!(matches!(result, Err(CliError::Config(_))));
    }

    #[test]
    fn test_parse_hook_data() {
        let data = parse_hook_data(r#"{"server": "http://x"}"#).unwrap();
        assert_eq!(data["server"], "http://x");

        assert!(matches!(parse_hook_data("[1, 2]"), Err(CliError::HookData(_))));
        assert!(matches!(parse_hook_data("{nope"), Err(CliError::HookData(_))));
    }

    #[test]
    fn test_hook_data_file_errors() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            read_hook_data_file(dir.path().join("absent.json")),
            Err(CliError::HookData(_))
        ));

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "not json").unwrap();
        assert!(matches!(read_hook_data_file(&bad), Err(CliError::HookData(_))));
    }

    #[test]
    fn test_merge_hook_data_later_layers_win() {
        let inline = json!({"server": "inline", "user_id": "u1"}).as_object().unwrap().clone();
        let file = json!({"server": "file"}).as_object().unwrap().clone();

        let merged = merge_hook_data([inline, file]);
        assert_eq!(merged["server"], "file");
        assert_eq!(merged["user_id"], "u1");
    }

    #[test]
    fn test_registration_policy_from_str() {
        assert_eq!("fail-fast".parse::<RegistrationPolicy>().unwrap(), RegistrationPolicy::FailFast);
        assert_eq!(
            "best_effort".parse::<RegistrationPolicy>().unwrap(),
            RegistrationPolicy::BestEffort
        );
        assert!("sometimes".parse::<RegistrationPolicy>().is_err());
    }
}
