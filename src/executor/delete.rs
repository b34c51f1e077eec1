use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, instrument, warn};

use super::{point_lookup_id, DropOptions, Executor};
use crate::document::Document;
use crate::error::Result;
use crate::explain::{Explain, Timing};
use crate::storage::{DeleteOutcome, PageInfo, ScanOptions};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeleteOptions {
    /// Delete at most this many matches. `None` and `Some(0)` mean no limit.
    pub limit: Option<usize>,
    pub max_keys: Option<usize>,
    pub continuation_token: Option<String>,
}

impl DeleteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn max_keys(mut self, max_keys: usize) -> Self {
        self.max_keys = Some(max_keys);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResult {
    /// Keys the store reported as deleted.
    pub deleted_count: usize,
    pub explain: Explain,
}

impl Executor {
    /// Deletes the documents matching `filter` within one scanned page.
    #[instrument(skip(self, filter, options), fields(filter = ?filter))]
    pub async fn delete_many(
        &self,
        prefix: &str,
        filter: Option<&Document>,
        options: &DeleteOptions,
    ) -> Result<DeleteResult> {
        if let Some(id) = point_lookup_id(filter) {
            return self.delete_by_id(prefix, id, options).await;
        }

        let started = Instant::now();
        let predicate = filter
            .map(|filter| self.engine.compile_filter(filter))
            .transpose()?;
        let scan = self
            .storage
            .get_prefix(
                prefix,
                &ScanOptions {
                    max_keys: options.max_keys,
                    continuation_token: options.continuation_token.clone(),
                },
            )
            .await?;
        let scan_elapsed = started.elapsed();

        let mut keys: Vec<String> = scan
            .contents
            .into_iter()
            .filter(|object| match (&object.body, &predicate) {
                (Some(body), Some(predicate)) => predicate(body),
                (Some(_), None) => true,
                (None, _) => false,
            })
            .map(|object| object.key)
            .collect();

        let mut explain = Explain::new(&scan.page, keys.len(), Timing::storage_only(scan_elapsed));
        if let Some(limit) = options.limit.filter(|limit| *limit > 0) {
            keys.truncate(limit);
        }

        let outcome = if keys.is_empty() {
            DeleteOutcome::default()
        } else {
            let delete_started = Instant::now();
            let outcome = self.storage.delete_multiple(&keys).await?;
            explain.add_storage_time(delete_started.elapsed());
            outcome
        };
        if !outcome.errors.is_empty() {
            warn!(errors = outcome.errors.len(), "Partial batch delete");
        }

        let deleted_count = outcome.deleted.len();
        let mut explain = explain.with_deletions(outcome);
        explain.set_execution_time(started.elapsed());
        debug!(prefix, deleted_count, "Delete complete");
        Ok(DeleteResult {
            deleted_count,
            explain,
        })
    }

    /// `delete_many` with a limit of one.
    pub async fn delete_one(
        &self,
        prefix: &str,
        filter: Option<&Document>,
        options: &DeleteOptions,
    ) -> Result<DeleteResult> {
        let options = options.clone().limit(1);
        self.delete_many(prefix, filter, &options).await
    }

    /// Deletes a single key. A missing key deletes nothing and is not an error.
    #[instrument(skip(self, options))]
    pub async fn delete_by_id(
        &self,
        prefix: &str,
        id: &str,
        options: &DeleteOptions,
    ) -> Result<DeleteResult> {
        let started = Instant::now();
        let outcome = self
            .storage
            .delete_one(&format!("{}{}", prefix, id))
            .await?;
        let deleted_count = outcome.deleted.len();

        let page = PageInfo {
            is_truncated: false,
            key_count: deleted_count,
            max_keys: options.max_keys,
            next_continuation_token: None,
        };
        let explain = Explain::new(
            &page,
            deleted_count,
            Timing::storage_only(started.elapsed()),
        )
        .with_deletions(outcome);
        Ok(DeleteResult {
            deleted_count,
            explain,
        })
    }

    /// Deletes one page of keys under `prefix`, whatever their contents.
    #[instrument(skip(self, options))]
    pub async fn delete_all(&self, prefix: &str, options: &DropOptions) -> Result<DeleteResult> {
        let started = Instant::now();
        let deletion = self
            .storage
            .delete_prefix(
                prefix,
                &ScanOptions {
                    max_keys: options.max_keys,
                    continuation_token: None,
                },
            )
            .await?;
        let storage_elapsed = started.elapsed();

        let deleted_count = deletion.deleted.len();
        let explain = Explain::new(
            &deletion.page,
            deletion.contents.len(),
            Timing::new(started.elapsed(), storage_elapsed),
        )
        .with_deletions(DeleteOutcome {
            deleted: deletion.deleted,
            errors: deletion.errors,
        });
        debug!(prefix, deleted_count, "Prefix delete complete");
        Ok(DeleteResult {
            deleted_count,
            explain,
        })
    }
}
