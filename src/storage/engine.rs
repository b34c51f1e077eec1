//! Object store trait

use crate::document::Document;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, instrument, warn};

/// Page size and resume point for a prefix scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScanOptions {
    /// Maximum number of keys to return; the store's default when unset.
    pub max_keys: Option<usize>,
    /// Opaque token from a previous truncated page.
    pub continuation_token: Option<String>,
}

/// Options for a (possibly delimiter-bounded) key listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListObjectsOptions {
    pub delimiter: Option<String>,
    pub max_keys: Option<usize>,
    pub continuation_token: Option<String>,
}

/// Pagination metadata shared by every scan-like response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageInfo {
    pub is_truncated: bool,
    /// Number of keys (and common prefixes) in this page.
    pub key_count: usize,
    pub max_keys: Option<usize>,
    pub next_continuation_token: Option<String>,
}

/// One object returned by a scan. `body` is absent for listings that don't
/// fetch object contents.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub key: String,
    pub body: Option<Document>,
}

/// One page of a prefix scan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanPage {
    pub contents: Vec<StoredObject>,
    pub page: PageInfo,
}

/// One page of a key listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Listing {
    /// Keys directly under the prefix (not rolled up into a common prefix).
    pub keys: Vec<String>,
    /// Rolled-up "folders", each ending with the delimiter.
    pub common_prefixes: Vec<String>,
    pub page: PageInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeletedObject {
    pub key: String,
}

/// Per-key failure inside a batch operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ObjectError {
    pub key: String,
    pub code: String,
    pub message: String,
}

impl ObjectError {
    pub fn from_error(key: impl Into<String>, err: &Error) -> Self {
        Self {
            key: key.into(),
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

/// Result of a single or batch delete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub deleted: Vec<DeletedObject>,
    pub errors: Vec<ObjectError>,
}

/// Result of a batch write. Writes are not atomic across keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub succeeded: Vec<String>,
    pub failed: Vec<ObjectError>,
}

/// Result of deleting one page of keys under a prefix.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrefixDeletion {
    pub contents: Vec<StoredObject>,
    pub deleted: Vec<DeletedObject>,
    pub errors: Vec<ObjectError>,
    pub page: PageInfo,
}

/// Object store trait
///
/// Every method is a single storage round trip from the caller's point of view.
/// Implementations decide their own retry and timeout behavior.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch one object; `None` when the key does not exist.
    async fn get_one(&self, key: &str) -> Result<Option<Document>>;

    /// Write one object, replacing any existing value.
    async fn put_one(&self, key: &str, document: &Document) -> Result<()>;

    /// Delete one object. Deleting a missing key is not an error.
    async fn delete_one(&self, key: &str) -> Result<DeleteOutcome>;

    /// Scan one page of objects (with bodies) under a prefix, in key order.
    async fn get_prefix(&self, prefix: &str, options: &ScanOptions) -> Result<ScanPage>;

    /// List one page of keys under a prefix, rolling keys up into common
    /// prefixes when a delimiter is given.
    async fn list(&self, prefix: &str, options: &ListObjectsOptions) -> Result<Listing>;

    /// Write many objects. Failures are reported per key.
    async fn put_multiple(&self, objects: Vec<(String, Document)>) -> Result<BatchOutcome> {
        let mut outcome = BatchOutcome::default();
        for (key, document) in objects {
            match self.put_one(&key, &document).await {
                Ok(()) => outcome.succeeded.push(key),
                Err(err) => outcome.failed.push(ObjectError::from_error(key, &err)),
            }
        }
        Ok(outcome)
    }

    /// Delete many objects. Failures are reported per key.
    async fn delete_multiple(&self, keys: &[String]) -> Result<DeleteOutcome> {
        let mut outcome = DeleteOutcome::default();
        for key in keys {
            match self.delete_one(key).await {
                Ok(single) => {
                    outcome.deleted.extend(single.deleted);
                    outcome.errors.extend(single.errors);
                }
                Err(err) => outcome.errors.push(ObjectError::from_error(key.clone(), &err)),
            }
        }
        Ok(outcome)
    }

    /// Delete one page of keys under a prefix.
    async fn delete_prefix(&self, prefix: &str, options: &ScanOptions) -> Result<PrefixDeletion> {
        let listing = self
            .list(
                prefix,
                &ListObjectsOptions {
                    delimiter: None,
                    max_keys: options.max_keys,
                    continuation_token: options.continuation_token.clone(),
                },
            )
            .await?;

        let outcome = if listing.keys.is_empty() {
            DeleteOutcome::default()
        } else {
            self.delete_multiple(&listing.keys).await?
        };

        Ok(PrefixDeletion {
            contents: listing
                .keys
                .into_iter()
                .map(|key| StoredObject { key, body: None })
                .collect(),
            deleted: outcome.deleted,
            errors: outcome.errors,
            page: listing.page,
        })
    }
}

/// Main storage interface
///
/// Cheap to clone; all clones share the same backend.
#[derive(Clone)]
pub struct Storage {
    store: Arc<dyn ObjectStore>,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage").finish()
    }
}

impl Storage {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    pub async fn get_one(&self, key: &str) -> Result<Option<Document>> {
        let document = self.store.get_one(key).await?;
        debug!(key, found = document.is_some(), "get_one");
        Ok(document)
    }

    pub async fn put_one(&self, key: &str, document: &Document) -> Result<()> {
        self.store.put_one(key, document).await?;
        debug!(key, "put_one");
        Ok(())
    }

    pub async fn put_multiple(&self, objects: Vec<(String, Document)>) -> Result<BatchOutcome> {
        let count = objects.len();
        let outcome = self.store.put_multiple(objects).await?;
        debug!(count, failed = outcome.failed.len(), "put_multiple");
        Ok(outcome)
    }

    /// Write each object with its own `put_one`, all in flight at once.
    ///
    /// There is no ordering guarantee between the writes and no rollback when
    /// one of them fails.
    #[instrument(skip(self, objects), fields(count = objects.len()))]
    pub async fn put_concurrent(&self, objects: Vec<(String, Document)>) -> Result<BatchOutcome> {
        let mut tasks = JoinSet::new();
        for (key, document) in objects {
            let store = Arc::clone(&self.store);
            tasks.spawn(async move {
                let result = store.put_one(&key, &document).await;
                (key, result)
            });
        }

        let mut outcome = BatchOutcome::default();
        while let Some(joined) = tasks.join_next().await {
            let (key, result) =
                joined.map_err(|e| Error::Internal(format!("Write task failed: {}", e)))?;
            match result {
                Ok(()) => outcome.succeeded.push(key),
                Err(err) => {
                    warn!(key = %key, error = %err, "Concurrent write failed");
                    outcome.failed.push(ObjectError::from_error(key, &err));
                }
            }
        }
        Ok(outcome)
    }

    pub async fn delete_one(&self, key: &str) -> Result<DeleteOutcome> {
        let outcome = self.store.delete_one(key).await?;
        debug!(key, deleted = outcome.deleted.len(), "delete_one");
        Ok(outcome)
    }

    pub async fn delete_multiple(&self, keys: &[String]) -> Result<DeleteOutcome> {
        let outcome = self.store.delete_multiple(keys).await?;
        debug!(
            requested = keys.len(),
            deleted = outcome.deleted.len(),
            errors = outcome.errors.len(),
            "delete_multiple"
        );
        Ok(outcome)
    }

    pub async fn get_prefix(&self, prefix: &str, options: &ScanOptions) -> Result<ScanPage> {
        let scan = self.store.get_prefix(prefix, options).await?;
        debug!(
            prefix,
            key_count = scan.page.key_count,
            truncated = scan.page.is_truncated,
            "get_prefix"
        );
        Ok(scan)
    }

    pub async fn list(&self, prefix: &str, options: &ListObjectsOptions) -> Result<Listing> {
        let listing = self.store.list(prefix, options).await?;
        debug!(
            prefix,
            common_prefixes = listing.common_prefixes.len(),
            "list"
        );
        Ok(listing)
    }

    pub async fn delete_prefix(&self, prefix: &str, options: &ScanOptions) -> Result<PrefixDeletion> {
        let deletion = self.store.delete_prefix(prefix, options).await?;
        debug!(
            prefix,
            deleted = deletion.deleted.len(),
            truncated = deletion.page.is_truncated,
            "delete_prefix"
        );
        Ok(deletion)
    }
}
