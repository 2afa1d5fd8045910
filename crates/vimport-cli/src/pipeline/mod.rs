//! Upload coordinator
//!
//! One run goes through five phases:
//!
//! 1. **Discovery**: extract metadata and content key for each candidate,
//!    skip duplicates and uploaded content, resume unfinished records,
//!    create and persist new ones
//! 2. **Registration**: register each camera seen in phase 1 once
//! 3. **Assignment**: ask the adapter for a job covering every scheduled
//!    record without one; shards are filled in list order
//! 4. **Upload**: upload in list order, persisting each success; the first
//!    failure stops the phase
//! 5. **Finalization**: finalize every shard that received an upload
//!
//! Every ledger write happens before the next remote call, so a crash at
//! any point loses at most the upload in flight. Rerunning the pipeline is
//! the retry mechanism.

pub mod context;
pub mod report;

use crate::adapter::{HookData, JobAssignment, RemoteAdapter, ShardManifest, UploadRequest};
use crate::config::RegistrationPolicy;
use crate::error::{CliError, Result};
use crate::ledger::Ledger;
use crate::metadata::{CaptureMetadata, MetadataExtractor};
use crate::probe::DurationProbe;
use indicatif::ProgressBar;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use vimport_common::checksum::compute_content_key;
use vimport_common::types::timestamp::now_iso;
use vimport_common::{FileRecord, ShardAssignment};

pub use context::{RunContext, Scheduled};
pub use report::{CameraOutcome, CameraReport, ItemOutcome, ItemReport, RunReport, ShardReport};

/// Run-wide settings of the coordinator
#[derive(Debug, Clone)]
pub struct CoordinatorOptions {
    /// Passed through to camera registration
    pub host: String,
    pub port: u16,
    pub registration_policy: RegistrationPolicy,
}

pub struct UploadCoordinator {
    ledger: Ledger,
    adapter: Box<dyn RemoteAdapter>,
    extractor: MetadataExtractor,
    probe: DurationProbe,
    options: CoordinatorOptions,
    progress: ProgressBar,
}

impl UploadCoordinator {
    pub fn new(
        ledger: Ledger,
        adapter: Box<dyn RemoteAdapter>,
        extractor: MetadataExtractor,
        options: CoordinatorOptions,
    ) -> Self {
        Self {
            ledger,
            adapter,
            extractor,
            probe: DurationProbe::disabled(),
            options,
            progress: ProgressBar::hidden(),
        }
    }

    pub fn with_probe(mut self, probe: DurationProbe) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Close the ledger
    pub fn finish(self) -> Result<()> {
        self.ledger.close()
    }

    /// Run the pipeline over `paths`.
    ///
    /// Only pre-flight problems (rejected hook data), ledger failures and a
    /// registration failure under [`RegistrationPolicy::FailFast`] return
    /// `Err`; everything else is recorded in the report.
    pub async fn run<I>(&mut self, paths: I, hook_data: &HookData) -> Result<RunReport>
    where
        I: IntoIterator<Item = PathBuf>,
    {
        self.adapter.set_hook_data(hook_data)?;

        let mut ctx = RunContext::new();
        self.discover(&mut ctx, paths).await?;

        if ctx.scheduled.is_empty() {
            info!("No new files found");
            return Ok(ctx.report);
        }

        self.register_cameras(&mut ctx, hook_data).await?;

        if self.assign_jobs(&mut ctx).await? {
            self.upload(&mut ctx).await?;
            self.finalize(&mut ctx).await?;
        }

        if ctx.report.job_id.is_none() {
            ctx.report.job_id = ctx.touched_shards.iter().next().map(|(job_id, _)| job_id.clone());
        }

        Ok(ctx.report)
    }

    // ------------------------------------------------------------------
    // Phase 1
    // ------------------------------------------------------------------

    async fn discover<I>(&self, ctx: &mut RunContext, paths: I) -> Result<()>
    where
        I: IntoIterator<Item = PathBuf>,
    {
        for path in paths {
            let meta = match self.extractor.extract(&path) {
                Ok(meta) => meta,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping file");
                    ctx.report.push(&path, None, ItemOutcome::SkippedError(e.to_string()));
                    continue;
                },
            };

            let key = match compute_content_key(&path) {
                Ok(key) => key,
                Err(e) => {
                    error!(path = %path.display(), error = %e, "Cannot hash file, skipping");
                    ctx.report.push(&path, None, ItemOutcome::SkippedError(e.to_string()));
                    continue;
                },
            };

            if ctx.seen.contains(&key) {
                info!(path = %path.display(), "Duplicate");
                ctx.report.push(&path, Some(key), ItemOutcome::SkippedDuplicate);
                continue;
            }

            let record = match self.ledger.get(&key)? {
                Some(existing) if existing.is_uploaded() => {
                    info!(path = %path.display(), "Already uploaded");
                    ctx.report.push(&path, Some(key), ItemOutcome::SkippedUploaded);
                    continue;
                },
                Some(mut existing) => {
                    if existing.filename != path && !existing.filename.exists() {
                        debug!(from = %existing.filename.display(), to = %path.display(), "Resumed file has moved");
                        existing.filename = path.clone();
                        self.ledger.put(&key, &existing)?;
                    }
                    existing
                },
                None => match self.new_record(&ctx.started_on, &path, &key, meta).await {
                    Ok(record) => {
                        self.ledger.put(&key, &record)?;
                        record
                    },
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Skipping file");
                        ctx.report.push(&path, Some(key), ItemOutcome::SkippedError(e.to_string()));
                        continue;
                    },
                },
            };

            info!(path = %path.display(), camera = %record.camera_name, "Scheduled for upload");
            let item = ctx.report.push(&path, Some(key), ItemOutcome::Pending);
            ctx.schedule(record, item);
        }

        Ok(())
    }

    async fn new_record(
        &self,
        started_on: &str,
        path: &Path,
        key: &str,
        meta: CaptureMetadata,
    ) -> Result<FileRecord> {
        let size = tokio::fs::metadata(path).await?.len();
        let duration = self.probe.duration_seconds(path).await;

        let record = FileRecord::new(key, path, meta.camera_name, meta.timestamp, started_on)
            .with_size(size)
            .with_duration(duration)
            .with_location(meta.location);
        record.validate()?;
        Ok(record)
    }

    // ------------------------------------------------------------------
    // Phase 2
    // ------------------------------------------------------------------

    async fn register_cameras(&mut self, ctx: &mut RunContext, hook_data: &HookData) -> Result<()> {
        let names: Vec<String> = ctx.cameras.keys().cloned().collect();

        for name in names {
            match self
                .adapter
                .register_camera(&name, &self.options.host, self.options.port)
                .await
            {
                Ok(config) => {
                    ctx.report.cameras.push(CameraReport {
                        name: name.clone(),
                        outcome: CameraOutcome::Registered {
                            camera_id: config.camera_id.clone(),
                        },
                    });
                    ctx.cameras.insert(name, Some(config));
                },
                Err(e) => {
                    warn!(camera = %name, error = %e, "Camera registration failed");
                    ctx.report.cameras.push(CameraReport {
                        name: name.clone(),
                        outcome: CameraOutcome::Failed {
                            reason: e.to_string(),
                        },
                    });
                    if self.options.registration_policy == RegistrationPolicy::FailFast {
                        return Err(match e {
                            CliError::Registration { .. } => e,
                            other => CliError::registration(name, other.to_string()),
                        });
                    }
                },
            }
        }

        let registered: Vec<Value> = ctx
            .cameras
            .iter()
            .filter_map(|(name, config)| {
                config.as_ref().map(|config| {
                    let mut entry = json!({ "camera_name": name, "camera_id": config.camera_id });
                    if let Some(fields) = entry.as_object_mut() {
                        for (k, v) in &config.extra {
                            fields.entry(k.clone()).or_insert_with(|| v.clone());
                        }
                    }
                    entry
                })
            })
            .collect();

        // Operator settings travel along so the adapter never loses them
        let mut data = hook_data.clone();
        data.insert("registered_cameras".to_string(), Value::Array(registered));
        if let Err(e) = self.adapter.set_hook_data(&data) {
            warn!(error = %e, "Adapter rejected registered camera data");
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Phase 3
    // ------------------------------------------------------------------

    /// Returns false when the run must stop before uploading
    async fn assign_jobs(&self, ctx: &mut RunContext) -> Result<bool> {
        let unscheduled = ctx.unscheduled();
        if unscheduled.is_empty() {
            return Ok(true);
        }

        let count = unscheduled.len();
        let total_bytes: u64 = unscheduled
            .iter()
            .map(|&pos| ctx.scheduled[pos].record.size_bytes)
            .sum();
        let avg_size = total_bytes / count as u64;

        let job = match self.adapter.assign_job(count, avg_size).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                debug!(adapter = self.adapter.name(), "Adapter does not assign jobs");
                return Ok(true);
            },
            Err(e) => {
                error!(error = %e, items = count, "Job assignment failed");
                ctx.report.halted = Some(format!("job assignment failed: {}", e));
                return Ok(false);
            },
        };

        info!(job_id = %job.job_id, shards = job.shards.len(), items = count, "Job assigned");

        let slots = shard_slots(&job, count);
        let mut unassigned = 0usize;
        for (&pos, slot) in unscheduled.iter().zip(slots) {
            let Some(shard) = slot.and_then(|i| job.shards.get(i)) else {
                unassigned += 1;
                continue;
            };
            let record = &mut ctx.scheduled[pos].record;
            record.assignment = Some(ShardAssignment::new(
                job.job_id.as_str(),
                shard.shard_id.as_str(),
                shard.upload_url.as_str(),
            ));
            self.ledger.put(&record.key, record)?;
        }

        if unassigned > 0 {
            warn!(
                job_id = %job.job_id,
                capacity = job.capacity(),
                unassigned,
                "Job has fewer slots than files, the rest upload without a shard"
            );
        }

        ctx.report.job_id = Some(job.job_id);
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Phase 4
    // ------------------------------------------------------------------

    async fn upload(&self, ctx: &mut RunContext) -> Result<()> {
        let total = ctx.scheduled.len();
        self.progress.set_length(total as u64);

        for pos in 0..total {
            let camera_id = ctx
                .camera_id(&ctx.scheduled[pos].record.camera_name)
                .map(str::to_string);
            let item = ctx.scheduled[pos].item;

            let result = {
                let record = &ctx.scheduled[pos].record;
                info!(
                    n = pos + 1,
                    total,
                    path = %record.filename.display(),
                    "Uploading"
                );
                self.progress.set_message(record.given_name.clone());
                let request = UploadRequest::for_record(record, camera_id.as_deref());
                self.adapter.upload_video(&request).await
            };

            let failure = match result {
                Ok(true) => None,
                Ok(false) => Some("upload rejected".to_string()),
                Err(e) => Some(e.to_string()),
            };

            let record = &mut ctx.scheduled[pos].record;
            if let Some(reason) = failure {
                error!(path = %record.filename.display(), reason = %reason, "Upload failed, stopping");
                ctx.report.halted = Some(format!("upload of {} failed", record.filename.display()));
                ctx.report.set_outcome(item, ItemOutcome::Failed(reason));
                break;
            }

            record.mark_uploaded(now_iso());
            self.ledger.put(&record.key, record)?;
            if let Some(assignment) = &record.assignment {
                ctx.touched_shards
                    .insert((assignment.job_id.clone(), assignment.shard_id.clone()));
            }
            ctx.report.set_outcome(item, ItemOutcome::Uploaded);
            self.progress.inc(1);
        }

        self.progress.finish_and_clear();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Phase 5
    // ------------------------------------------------------------------

    async fn finalize(&self, ctx: &mut RunContext) -> Result<()> {
        let touched: Vec<(String, String)> = ctx.touched_shards.iter().cloned().collect();

        for (job_id, shard_id) in touched {
            let records = self.ledger.records_for_shard(&job_id, &shard_id)?;
            let Some(upload_url) = records.first().and_then(|r| r.upload_url()).map(str::to_string)
            else {
                continue;
            };

            let manifest = ShardManifest::new(&job_id, &shard_id, upload_url, records);
            let error = match self.adapter.finalize_job(&manifest).await {
                Ok(()) => None,
                Err(e) => {
                    warn!(job_id = %job_id, shard_id = %shard_id, error = %e, "Shard finalization failed");
                    Some(e.to_string())
                },
            };

            ctx.report.shards.push(ShardReport {
                job_id,
                shard_id,
                item_count: manifest.item_count(),
                error,
            });
        }

        Ok(())
    }
}

/// Shard index for each of the first `count` unscheduled records, taking
/// shards in order and filling each to its item count. `None` past the
/// job's capacity.
pub fn shard_slots(job: &JobAssignment, count: usize) -> Vec<Option<usize>> {
    let mut slots: Vec<Option<usize>> = job
        .shards
        .iter()
        .enumerate()
        .flat_map(|(i, shard)| std::iter::repeat(Some(i)).take(shard.item_count))
        .take(count)
        .collect();
    slots.resize(count, None);
    slots
}
