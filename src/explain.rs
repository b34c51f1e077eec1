//! Explain records.
//!
//! Every operation returns an explain record next to its result. It pairs
//! execution statistics with the statistics of the underlying storage calls:
//!
//! ```json
//! {
//!   "executionStats": {
//!     "nReturned": 1,
//!     "executionTimeMillis": 3,
//!     "totalKeysExamined": 0,
//!     "totalDocsExamined": 3
//!   },
//!   "s3": {
//!     "IsTruncated": false,
//!     "KeyCount": 3,
//!     "MaxKeys": 100,
//!     "NextContinuationToken": null,
//!     "TimeMillis": 2
//!   }
//! }
//! ```
//!
//! `totalKeysExamined` is always 0: there are no indexes, every read is either a
//! point lookup or a scan.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::storage::{DeleteOutcome, DeletedObject, ObjectError, PageInfo};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStats {
    pub n_returned: usize,
    pub execution_time_millis: u64,
    pub total_keys_examined: usize,
    pub total_docs_examined: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StorageStats {
    pub is_truncated: bool,
    pub key_count: usize,
    pub max_keys: Option<usize>,
    pub next_continuation_token: Option<String>,
    pub time_millis: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<Vec<DeletedObject>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<ObjectError>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Explain {
    pub execution_stats: ExecutionStats,
    #[serde(rename = "s3")]
    pub storage: StorageStats,
}

/// Wall-clock time spent by an operation and by its storage calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timing {
    pub elapsed: Duration,
    pub storage_elapsed: Duration,
}

impl Timing {
    pub fn new(elapsed: Duration, storage_elapsed: Duration) -> Self {
        Self {
            elapsed,
            storage_elapsed,
        }
    }

    /// Timing for an operation that is nothing but one storage call.
    pub fn storage_only(elapsed: Duration) -> Self {
        Self::new(elapsed, elapsed)
    }
}

pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl Explain {
    /// Builds an explain record from a scan's page metadata.
    ///
    /// `totalDocsExamined` is the number of keys the scan touched; `nReturned`
    /// is whatever the operation handed back after filtering.
    pub fn new(page: &PageInfo, n_returned: usize, timing: Timing) -> Self {
        Self {
            execution_stats: ExecutionStats {
                n_returned,
                execution_time_millis: millis(timing.elapsed),
                total_keys_examined: 0,
                total_docs_examined: page.key_count,
            },
            storage: StorageStats {
                is_truncated: page.is_truncated,
                key_count: page.key_count,
                max_keys: page.max_keys,
                next_continuation_token: page.next_continuation_token.clone(),
                time_millis: millis(timing.storage_elapsed),
                deleted: None,
                errors: None,
            },
        }
    }

    /// Explain record for an operation that examined nothing (inserts).
    pub fn blank(timing: Timing) -> Self {
        Self::new(&PageInfo::default(), 0, timing)
    }

    /// Attaches per-key delete outcomes.
    pub fn with_deletions(mut self, outcome: DeleteOutcome) -> Self {
        self.storage.deleted = Some(outcome.deleted);
        self.storage.errors = Some(outcome.errors);
        self
    }

    /// Attaches per-key write failures.
    pub fn with_errors(mut self, errors: Vec<ObjectError>) -> Self {
        self.storage.errors = Some(errors);
        self
    }

    pub fn add_storage_time(&mut self, elapsed: Duration) {
        self.storage.time_millis = self.storage.time_millis.saturating_add(millis(elapsed));
    }

    pub fn set_execution_time(&mut self, elapsed: Duration) {
        self.execution_stats.execution_time_millis = millis(elapsed);
    }

    pub fn deleted_count(&self) -> usize {
        self.storage.deleted.as_ref().map_or(0, Vec::len)
    }
}
