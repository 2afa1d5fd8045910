//! Video importer CLI library
//!
//! Uploads the video files accumulating in a folder to an ingestion service,
//! exactly once per distinct content, across any number of runs.
//!
//! # Overview
//!
//! - **Scanning**: recursive, extension-filtered enumeration ([`scanner`])
//! - **Metadata**: camera name, capture time and location from the path ([`metadata`])
//! - **Ledger**: durable per-content state in SQLite ([`ledger`])
//! - **Locking**: one run per ledger ([`instance`])
//! - **Adapters**: the backend uploads go to ([`adapter`])
//! - **Pipeline**: discovery, registration, assignment, upload, finalization ([`pipeline`])
//!
//! Commands: `import-video upload`, `import-video list`, `import-video status`.

pub mod adapter;
pub mod commands;
pub mod config;
pub mod error;
pub mod instance;
pub mod ledger;
pub mod metadata;
pub mod pipeline;
pub mod probe;
pub mod progress;
pub mod scanner;

// Re-export commonly used types
pub use config::{ImporterConfig, RegistrationPolicy};
pub use error::{CliError, Result};
pub use pipeline::{RunReport, UploadCoordinator};

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// import-video - upload new camera footage exactly once
#[derive(Parser, Debug)]
#[command(name = "import-video")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Errors only
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Ledger file [default: .processes.db]
    #[arg(short, long, env = "VIMPORT_STORAGE", global = true)]
    pub storage: Option<PathBuf>,

    /// TOML config file
    #[arg(short, long, env = "VIMPORT_CONFIG", global = true)]
    pub config: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Upload new files found under a folder
    Upload(UploadArgs),

    /// Export the ledger, one row per file
    List {
        /// Output format: csv, table or json
        #[arg(short, long, default_value = "csv")]
        format: String,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Summarize the ledger
    Status,
}

/// Options of `import-video upload`
#[derive(Args, Debug, Clone, Default)]
pub struct UploadArgs {
    /// Folder to scan recursively
    pub folder: PathBuf,

    /// Ingestion service host [default: localhost]
    pub host: Option<String>,

    /// Ingestion service port [default: 8080]
    #[arg(short = 'P', long, env = "VIMPORT_PORT")]
    pub port: Option<u16>,

    /// File pattern with named groups camera, epoch and optional lat, lng
    #[arg(short = 'r', long, env = "VIMPORT_PATTERN")]
    pub pattern: Option<String>,

    /// File extension to include (repeatable) [default: .mp4]
    #[arg(short = 'e', long = "extension")]
    pub extensions: Vec<String>,

    /// Adapter: http or copy [default: http]
    #[arg(short, long, env = "VIMPORT_ADAPTER")]
    pub adapter: Option<String>,

    /// Use this camera name for files whose path has none, instead of skipping them
    #[arg(long)]
    pub default_camera: Option<String>,

    /// Camera registration failure handling: best-effort or fail-fast
    #[arg(long, env = "VIMPORT_REGISTRATION_POLICY")]
    pub registration_policy: Option<String>,

    /// Adapter settings as a JSON object
    #[arg(long)]
    pub hook_data_json: Option<String>,

    /// File holding adapter settings as a JSON object; overrides --hook-data-json keys
    #[arg(long)]
    pub hook_data_json_file: Option<PathBuf>,

    /// Skip ffprobe duration probing
    #[arg(long)]
    pub no_probe: bool,

    /// ffprobe binary
    #[arg(long, env = "VIMPORT_FFPROBE")]
    pub ffprobe: Option<PathBuf>,

    /// Timeout for each adapter request, in seconds [default: 300]
    #[arg(long, env = "VIMPORT_TIMEOUT_SECS")]
    pub timeout_secs: Option<u64>,
}
