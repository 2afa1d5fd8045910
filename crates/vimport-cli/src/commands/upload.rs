//! `import-video upload` command implementation

use crate::adapter::{build_adapter, AdapterKind, AdapterSettings};
use crate::config::{merge_hook_data, parse_hook_data, read_hook_data_file, ImporterConfig};
use crate::error::{CliError, Result};
use crate::instance::InstanceGuard;
use crate::ledger::Ledger;
use crate::metadata::{CameraNamePolicy, MetadataExtractor};
use crate::pipeline::{CoordinatorOptions, RunReport, UploadCoordinator};
use crate::probe::DurationProbe;
use crate::progress::create_upload_progress;
use crate::scanner::DirectoryScanner;
use crate::UploadArgs;
use colored::Colorize;
use indicatif::ProgressBar;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Layer command-line arguments over the config file (or defaults)
pub fn resolve_config(
    args: &UploadArgs,
    storage: Option<&Path>,
    config_file: Option<&Path>,
) -> Result<ImporterConfig> {
    let mut config = ImporterConfig::load_or_default(config_file)?;

    config.root = Some(args.folder.clone());
    if let Some(host) = &args.host {
        config.host = host.clone();
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(storage) = storage {
        config.storage = storage.to_path_buf();
    }
    if let Some(pattern) = &args.pattern {
        config.pattern = pattern.clone();
    }
    if !args.extensions.is_empty() {
        config.extensions = args.extensions.clone();
    }
    if let Some(adapter) = &args.adapter {
        config.adapter = adapter.parse::<AdapterKind>()?;
    }
    if let Some(name) = &args.default_camera {
        config.camera_policy = CameraNamePolicy::Default(name.clone());
    }
    if let Some(policy) = &args.registration_policy {
        config.registration_policy = policy.parse()?;
    }
    if args.no_probe {
        config.probe = false;
    }
    if let Some(ffprobe) = &args.ffprobe {
        config.ffprobe = ffprobe.clone();
    }
    if let Some(timeout) = args.timeout_secs {
        config.timeout_secs = timeout;
    }

    let inline = match &args.hook_data_json {
        Some(json) => parse_hook_data(json)?,
        None => Default::default(),
    };
    let from_file = match &args.hook_data_json_file {
        Some(path) => read_hook_data_file(path)?,
        None => Default::default(),
    };
    config.hook_data = merge_hook_data([std::mem::take(&mut config.hook_data), inline, from_file]);

    config.validate()?;
    Ok(config)
}

/// Run one import. `show_progress` draws a progress bar on stderr.
pub async fn run(config: ImporterConfig, show_progress: bool) -> Result<RunReport> {
    let root: PathBuf = config.root()?.to_path_buf();

    // Pre-flight: nothing below touches the ledger until all of these pass
    let adapter = build_adapter(
        config.adapter,
        &AdapterSettings {
            host: config.host.clone(),
            port: config.port,
            timeout: config.timeout(),
            hook_data: config.hook_data.clone(),
        },
    )?;
    let extractor = MetadataExtractor::new(&config.pattern, config.camera_policy.clone())?;
    let scanner = DirectoryScanner::new(&root, &config.extensions).map_err(|e| {
        CliError::config(format!("cannot scan folder '{}': {}", root.display(), e))
    })?;
    let guard = InstanceGuard::acquire(&config.storage)?;

    let ledger = Ledger::open(&config.storage)?;
    let probe = if config.probe {
        DurationProbe::new(&config.ffprobe)
    } else {
        DurationProbe::disabled()
    };
    let progress = if show_progress {
        create_upload_progress(0, "Uploading")
    } else {
        ProgressBar::hidden()
    };

    info!(
        folder = %scanner.root().display(),
        adapter = %config.adapter,
        storage = %config.storage.display(),
        "Starting import"
    );

    let mut coordinator = UploadCoordinator::new(
        ledger,
        adapter,
        extractor,
        CoordinatorOptions {
            host: config.host.clone(),
            port: config.port,
            registration_policy: config.registration_policy,
        },
    )
    .with_probe(probe)
    .with_progress(progress);

    let report = coordinator.run(scanner.scan(), &config.hook_data).await;
    coordinator.finish()?;
    drop(guard);
    let report = report?;

    match &report.job_id {
        Some(job_id) => info!("Job ID: {}", job_id),
        None if report.found_new() => warn!("No Job ID found, did something go wrong?"),
        None => {},
    }

    Ok(report)
}

/// Print the end-of-run summary
pub fn print_summary(report: &RunReport) {
    if !report.found_new() {
        println!("No new files found.");
        return;
    }

    println!("{}", "Import Summary:".cyan().bold());
    println!("  Uploaded:  {}", report.uploaded().to_string().green());
    println!("  Skipped:   {}", report.skipped());
    if report.failed() > 0 {
        println!("  Failed:    {}", report.failed().to_string().red());
    }
    if report.pending() > 0 {
        println!("  Pending:   {}", report.pending().to_string().yellow());
    }
    if !report.shards.is_empty() {
        println!(
            "  Shards:    {} finalized, {} failed",
            report.shards_finalized(),
            report.shards_failed()
        );
    }
    if let Some(job_id) = &report.job_id {
        println!("  Job ID:    {}", job_id);
    }
    if let Some(reason) = &report.halted {
        println!("{} {}", "Stopped early:".yellow().bold(), reason);
        println!("Run the import again to resume.");
    }
}
