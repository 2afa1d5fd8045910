//! Working state of a single pipeline run

use crate::adapter::CameraConfig;
use crate::pipeline::report::RunReport;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use vimport_common::types::timestamp::now_iso;
use vimport_common::FileRecord;

/// A record queued for upload, with its row in the report
#[derive(Debug, Clone)]
pub struct Scheduled {
    pub record: FileRecord,
    pub item: usize,
}

/// State threaded through the phases of one run
#[derive(Debug, Default)]
pub struct RunContext {
    /// `discovered_on` for records created this run
    pub started_on: String,

    /// Content keys scheduled so far
    pub seen: HashSet<String>,

    /// Camera name -> registration, `None` when registration failed
    pub cameras: BTreeMap<String, Option<CameraConfig>>,

    /// Upload order
    pub scheduled: Vec<Scheduled>,

    /// `(job_id, shard_id)` pairs with at least one upload this run
    pub touched_shards: BTreeSet<(String, String)>,

    pub report: RunReport,
}

impl RunContext {
    pub fn new() -> Self {
        Self {
            started_on: now_iso(),
            ..Self::default()
        }
    }

    pub fn schedule(&mut self, record: FileRecord, item: usize) {
        self.seen.insert(record.key.clone());
        self.cameras.entry(record.camera_name.clone()).or_insert(None);
        self.scheduled.push(Scheduled { record, item });
    }

    /// Positions in `scheduled` of records without a job, in upload order
    pub fn unscheduled(&self) -> Vec<usize> {
        self.scheduled
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.record.is_assigned())
            .map(|(i, _)| i)
            .collect()
    }

    pub fn camera_id(&self, camera_name: &str) -> Option<&str> {
        self.cameras
            .get(camera_name)
            .and_then(|c| c.as_ref())
            .map(|c| c.camera_id.as_str())
    }
}
