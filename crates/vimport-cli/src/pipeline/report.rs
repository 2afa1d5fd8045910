//! Per-run outcome report

use serde::Serialize;
use std::path::PathBuf;

/// What happened to one candidate file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum ItemOutcome {
    Uploaded,
    /// Same content already scheduled earlier in this run
    SkippedDuplicate,
    /// Ledger already holds an upload time for this content
    SkippedUploaded,
    /// Metadata or hashing failed; the file never entered the ledger
    SkippedError(String),
    Failed(String),
    /// Scheduled but not attempted because the run stopped early
    Pending,
}

impl ItemOutcome {
    /// Whether the file was scheduled for upload this run
    pub fn is_scheduled(&self) -> bool {
        matches!(
            self,
            ItemOutcome::Uploaded | ItemOutcome::Failed(_) | ItemOutcome::Pending
        )
    }
}

impl std::fmt::Display for ItemOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemOutcome::Uploaded => write!(f, "uploaded"),
            ItemOutcome::SkippedDuplicate => write!(f, "duplicate"),
            ItemOutcome::SkippedUploaded => write!(f, "already uploaded"),
            ItemOutcome::SkippedError(reason) => write!(f, "skipped: {}", reason),
            ItemOutcome::Failed(reason) => write!(f, "failed: {}", reason),
            ItemOutcome::Pending => write!(f, "pending"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemReport {
    pub path: PathBuf,
    pub key: Option<String>,
    #[serde(flatten)]
    pub outcome: ItemOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CameraOutcome {
    Registered { camera_id: String },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CameraReport {
    pub name: String,
    #[serde(flatten)]
    pub outcome: CameraOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShardReport {
    pub job_id: String,
    pub shard_id: String,
    pub item_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Everything one pipeline run did
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub items: Vec<ItemReport>,
    pub cameras: Vec<CameraReport>,
    /// Job assigned this run, else the first job an upload touched
    pub job_id: Option<String>,
    pub shards: Vec<ShardReport>,
    /// Why the run stopped before attempting every scheduled file
    pub halted: Option<String>,
}

impl RunReport {
    pub(crate) fn push(&mut self, path: impl Into<PathBuf>, key: Option<String>, outcome: ItemOutcome) -> usize {
        self.items.push(ItemReport {
            path: path.into(),
            key,
            outcome,
        });
        self.items.len() - 1
    }

    pub(crate) fn set_outcome(&mut self, index: usize, outcome: ItemOutcome) {
        if let Some(item) = self.items.get_mut(index) {
            item.outcome = outcome;
        }
    }

    /// At least one file was scheduled for upload
    pub fn found_new(&self) -> bool {
        self.items.iter().any(|i| i.outcome.is_scheduled())
    }

    pub fn count(&self, predicate: impl Fn(&ItemOutcome) -> bool) -> usize {
        self.items.iter().filter(|i| predicate(&i.outcome)).count()
    }

    pub fn uploaded(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Uploaded))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Failed(_)))
    }

    pub fn pending(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Pending))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| {
            matches!(
                o,
                ItemOutcome::SkippedDuplicate | ItemOutcome::SkippedUploaded | ItemOutcome::SkippedError(_)
            )
        })
    }

    pub fn shards_finalized(&self) -> usize {
        self.shards.iter().filter(|s| s.error.is_none()).count()
    }

    pub fn shards_failed(&self) -> usize {
        self.shards.iter().filter(|s| s.error.is_some()).count()
    }

    pub fn outcome_of(&self, path: &std::path::Path) -> Option<&ItemOutcome> {
        self.items.iter().find(|i| i.path == path).map(|i| &i.outcome)
    }

    /// Every scheduled file was uploaded
    pub fn is_complete(&self) -> bool {
        self.halted.is_none() && self.failed() == 0 && self.pending() == 0
    }
}
