//! Error types for the importer CLI
//!
//! Messages are operator-facing: they say what went wrong and, where there is
//! one, what to do about it.

use std::path::PathBuf;
use thiserror::Error;
use vimport_common::CommonError;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// Error type for importer operations
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration is missing or invalid
    #[error("Configuration error: {0}. Check your flags, environment variables or config file.")]
    Config(String),

    /// Hook data blob or file could not be used
    #[error("Invalid hook data: {0}")]
    HookData(String),

    /// No adapter with that name is built in
    #[error("Unknown adapter '{0}'. Available adapters: http, copy.")]
    UnknownAdapter(String),

    /// Another live import holds the ledger
    #[error("Process {pid} is already running against this ledger (lock file '{}'). Wait for it to finish.", lock_path.display())]
    AlreadyRunning { pid: u32, lock_path: PathBuf },

    /// Camera name or timestamp could not be derived from a path
    #[error("Unparsable metadata for '{}': {reason}", path.display())]
    UnparsableMetadata { path: PathBuf, reason: String },

    /// The file pattern is not a valid regular expression
    #[error("Invalid file pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// Camera registration did not yield a camera id
    #[error("Camera registration failed for '{camera}': {reason}")]
    Registration { camera: String, reason: String },

    /// Remote adapter reported a failure
    #[error("Adapter error: {0}")]
    Adapter(String),

    /// Ledger contents violate an invariant
    #[error("Ledger error: {0}")]
    Ledger(String),

    /// Ledger database operation failed
    #[error("Ledger database error: {0}. The ledger file may be corrupted or locked by another tool.")]
    LedgerDb(#[from] rusqlite::Error),

    /// Hashing, timestamp or record validation failure
    #[error(transparent)]
    Common(#[from] CommonError),

    /// File system operation failed
    #[error("File operation failed: {0}. Check file permissions and disk space.")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("Network request failed: {0}. Check the service address and your connection.")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// TOML config parsing failed
    #[error("Failed to parse config file: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CliError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn hook_data(msg: impl Into<String>) -> Self {
        Self::HookData(msg.into())
    }

    pub fn adapter(msg: impl Into<String>) -> Self {
        Self::Adapter(msg.into())
    }

    pub fn ledger(msg: impl Into<String>) -> Self {
        Self::Ledger(msg.into())
    }

    pub fn unparsable(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::UnparsableMetadata {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn registration(camera: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Registration {
            camera: camera.into(),
            reason: reason.into(),
        }
    }

    /// Errors that must stop the process before any state is touched
    pub fn is_preflight(&self) -> bool {
        matches!(
            self,
            CliError::Config(_)
                | CliError::HookData(_)
                | CliError::UnknownAdapter(_)
                | CliError::AlreadyRunning { .. }
                | CliError::Pattern(_)
                | CliError::TomlParse(_)
        )
    }
}
