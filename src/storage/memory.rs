//! In-memory object store
//!
//! Keeps objects in an ordered map so that prefix scans and delimiter
//! listings behave like a real object store. Used by the test suite and by the
//! CLI's `memory` backend.

use crate::document::Document;
use crate::error::{Error, Result};
use crate::storage::engine::{
    BatchOutcome, DeleteOutcome, DeletedObject, ListObjectsOptions, Listing, ObjectError,
    ObjectStore, ScanOptions, ScanPage, StoredObject,
};
use crate::storage::page::{list_page, DEFAULT_MAX_KEYS};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// In-memory object store
#[derive(Clone)]
pub struct MemoryStore {
    objects: Arc<RwLock<BTreeMap<String, Document>>>,
    denied_prefixes: Arc<RwLock<Vec<String>>>,
    default_max_keys: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create a new, empty store
    pub fn new() -> Self {
        Self::with_max_keys(DEFAULT_MAX_KEYS)
    }

    /// Create a store with a custom default page size
    pub fn with_max_keys(default_max_keys: usize) -> Self {
        Self {
            objects: Arc::new(RwLock::new(BTreeMap::new())),
            denied_prefixes: Arc::new(RwLock::new(Vec::new())),
            default_max_keys,
        }
    }

    /// Get the number of objects stored
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    /// Check if storage is empty
    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    /// All keys, in order
    pub fn keys(&self) -> Vec<String> {
        self.objects.read().keys().cloned().collect()
    }

    /// Clear all data
    pub fn clear(&self) {
        self.objects.write().clear();
    }

    /// Make writes and deletes under `prefix` fail with `AccessDenied`.
    ///
    /// Reads are unaffected. Lets callers exercise partial batch failures.
    pub fn deny_prefix(&self, prefix: &str) {
        self.denied_prefixes.write().push(prefix.to_string());
    }

    fn check_writable(&self, key: &str) -> Result<()> {
        if self
            .denied_prefixes
            .read()
            .iter()
            .any(|prefix| key.starts_with(prefix.as_str()))
        {
            return Err(Error::Storage(format!("AccessDenied: {}", key)));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get_one(&self, key: &str) -> Result<Option<Document>> {
        Ok(self.objects.read().get(key).cloned())
    }

    async fn put_one(&self, key: &str, document: &Document) -> Result<()> {
        self.check_writable(key)?;
        self.objects.write().insert(key.to_string(), document.clone());
        Ok(())
    }

    async fn put_multiple(&self, objects: Vec<(String, Document)>) -> Result<BatchOutcome> {
        let mut outcome = BatchOutcome::default();
        let mut map = self.objects.write();
        for (key, document) in objects {
            match self.check_writable(&key) {
                Ok(()) => {
                    map.insert(key.clone(), document);
                    outcome.succeeded.push(key);
                }
                Err(err) => outcome.failed.push(ObjectError::from_error(key, &err)),
            }
        }
        Ok(outcome)
    }

    async fn delete_one(&self, key: &str) -> Result<DeleteOutcome> {
        self.check_writable(key)?;
        let removed = self.objects.write().remove(key);
        Ok(DeleteOutcome {
            deleted: removed
                .map(|_| DeletedObject {
                    key: key.to_string(),
                })
                .into_iter()
                .collect(),
            errors: Vec::new(),
        })
    }

    async fn delete_multiple(&self, keys: &[String]) -> Result<DeleteOutcome> {
        let mut outcome = DeleteOutcome::default();
        let mut map = self.objects.write();
        for key in keys {
            if let Err(err) = self.check_writable(key) {
                outcome.errors.push(ObjectError::from_error(key.clone(), &err));
                continue;
            }
            if map.remove(key).is_some() {
                outcome.deleted.push(DeletedObject { key: key.clone() });
            }
        }
        Ok(outcome)
    }

    async fn get_prefix(&self, prefix: &str, options: &ScanOptions) -> Result<ScanPage> {
        let map = self.objects.read();
        let listing = list_page(
            map.range(prefix.to_string()..).map(|(key, _)| key).take_while(|key| key.starts_with(prefix)),
            prefix,
            &ListObjectsOptions {
                delimiter: None,
                max_keys: options.max_keys,
                continuation_token: options.continuation_token.clone(),
            },
            self.default_max_keys,
        )?;

        let contents = listing
            .keys
            .into_iter()
            .map(|key| {
                let body = map.get(&key).cloned();
                StoredObject { key, body }
            })
            .collect();

        Ok(ScanPage {
            contents,
            page: listing.page,
        })
    }

    async fn list(&self, prefix: &str, options: &ListObjectsOptions) -> Result<Listing> {
        let map = self.objects.read();
        list_page(
            map.range(prefix.to_string()..).map(|(key, _)| key).take_while(|key| key.starts_with(prefix)),
            prefix,
            options,
            self.default_max_keys,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        crate::document::into_document(value).unwrap()
    }

    #[tokio::test]
    async fn test_memory_store_basic_ops() -> Result<()> {
        let storage = MemoryStore::new();

        let document = doc(json!({"_id": "1", "value": "test value"}));
        storage.put_one("k/1", &document).await?;

        let retrieved = storage.get_one("k/1").await?;
        assert_eq!(retrieved, Some(document));

        let outcome = storage.delete_one("k/1").await?;
        assert_eq!(outcome.deleted, vec![DeletedObject { key: "k/1".to_string() }]);
        assert_eq!(storage.get_one("k/1").await?, None);

        Ok(())
    }

    #[tokio::test]
    async fn test_delete_missing_key_reports_nothing_deleted() -> Result<()> {
        let storage = MemoryStore::new();
        let outcome = storage.delete_one("nope").await?;
        assert!(outcome.deleted.is_empty());
        assert!(outcome.errors.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_get_prefix_is_scoped_and_ordered() -> Result<()> {
        let storage = MemoryStore::new();
        for key in ["a/b/3", "a/b/1", "a/bc/1", "a/b/2", "z/1"] {
            storage.put_one(key, &doc(json!({"k": key}))).await?;
        }

        let scan = storage.get_prefix("a/b/", &ScanOptions::default()).await?;
        let keys: Vec<&str> = scan.contents.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["a/b/1", "a/b/2", "a/b/3"]);
        assert_eq!(scan.page.key_count, 3);
        assert_eq!(scan.page.max_keys, Some(DEFAULT_MAX_KEYS));
        assert!(!scan.page.is_truncated);
        assert!(scan.contents.iter().all(|o| o.body.is_some()));
        Ok(())
    }

    #[tokio::test]
    async fn test_denied_prefix_fails_writes_only() -> Result<()> {
        let storage = MemoryStore::new();
        storage.put_one("ro/1", &doc(json!({"_id": "1"}))).await?;
        storage.deny_prefix("ro/");

        assert!(storage.put_one("ro/2", &doc(json!({"_id": "2"}))).await.is_err());
        assert!(storage.get_one("ro/1").await?.is_some());

        let outcome = storage
            .delete_multiple(&["ro/1".to_string(), "rw/1".to_string()])
            .await?;
        assert!(outcome.deleted.is_empty());
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].code, "StorageError");
        Ok(())
    }

    #[tokio::test]
    async fn test_len_and_clear() -> Result<()> {
        let storage = MemoryStore::new();
        storage.put_one("a", &doc(json!({}))).await?;
        assert_eq!(storage.len(), 1);
        storage.clear();
        assert!(storage.is_empty());
        Ok(())
    }
}
