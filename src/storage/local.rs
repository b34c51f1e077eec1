//! Local directory object store
//!
//! This module provides an `ObjectStore` that keeps each object as a JSON file
//! in a single root directory. Keys are flattened into file names by escaping
//! `%` and `/`, so `prod/shop/orders/42` is stored as
//! `prod%2Fshop%2Forders%2F42.json`. Writes go to a temporary file first and are
//! renamed into place, so a reader never observes a half-written object.

use crate::document::Document;
use crate::error::{Error, Result};
use crate::storage::engine::{
    BatchOutcome, DeleteOutcome, DeletedObject, ListObjectsOptions, Listing, ObjectError,
    ObjectStore, ScanOptions, ScanPage, StoredObject,
};
use crate::storage::page::{list_page, DEFAULT_MAX_KEYS};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::task::JoinSet;
use tracing::{debug, info, instrument};
use uuid::Uuid;

const OBJECT_EXTENSION: &str = ".json";
const TEMP_EXTENSION: &str = ".tmp";

/// Local directory object store
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
    default_max_keys: usize,
}

impl LocalStore {
    /// Open (creating if needed) a store rooted at `root`.
    ///
    /// # Example
    /// ```rust,ignore
    /// let store = LocalStore::open("data/lumendb")?;
    /// ```
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        Self::with_max_keys(root, DEFAULT_MAX_KEYS)
    }

    /// Open a store with a custom default page size.
    pub fn with_max_keys<P: AsRef<Path>>(root: P, default_max_keys: usize) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)
            .map_err(|e| Error::Storage(format!("Failed to create {}: {}", root.display(), e)))?;
        info!(path = %root.display(), "Opened local object store");
        Ok(Self {
            root,
            default_max_keys,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, key: &str) -> PathBuf {
        self.root
            .join(format!("{}{}", encode_key(key), OBJECT_EXTENSION))
    }

    /// All keys in the store, sorted.
    async fn sorted_keys(&self) -> Result<Vec<String>> {
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(encoded) = name.strip_suffix(OBJECT_EXTENSION) {
                keys.push(decode_key(encoded));
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn read_object(path: &Path) -> Result<Option<Document>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Storage(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn write_object(path: PathBuf, document: &Document) -> Result<()> {
        let bytes = serde_json::to_vec(document)?;
        // Unique per write: concurrent writes to one key must not share a temp file.
        let mut temp = path.clone().into_os_string();
        temp.push(format!(".{}{}", Uuid::new_v4().simple(), TEMP_EXTENSION));
        tokio::fs::write(&temp, bytes).await?;
        if let Err(e) = tokio::fs::rename(&temp, &path).await {
            tokio::fs::remove_file(&temp).await.ok();
            return Err(e.into());
        }
        Ok(())
    }
}

/// Escapes a key into a single file name.
fn encode_key(key: &str) -> String {
    let mut encoded = String::with_capacity(key.len());
    for c in key.chars() {
        match c {
            '%' => encoded.push_str("%25"),
            '/' => encoded.push_str("%2F"),
            _ => encoded.push(c),
        }
    }
    encoded
}

fn decode_key(encoded: &str) -> String {
    encoded.replace("%2F", "/").replace("%25", "%")
}

#[async_trait]
impl ObjectStore for LocalStore {
    #[instrument(skip(self))]
    async fn get_one(&self, key: &str) -> Result<Option<Document>> {
        Self::read_object(&self.object_path(key)).await
    }

    #[instrument(skip(self, document))]
    async fn put_one(&self, key: &str, document: &Document) -> Result<()> {
        Self::write_object(self.object_path(key), document).await?;
        debug!(key, "Wrote object");
        Ok(())
    }

    #[instrument(skip(self, objects), fields(count = objects.len()))]
    async fn put_multiple(&self, objects: Vec<(String, Document)>) -> Result<BatchOutcome> {
        let mut tasks = JoinSet::new();
        for (key, document) in objects {
            let path = self.object_path(&key);
            tasks.spawn(async move {
                let result = Self::write_object(path, &document).await;
                (key, result)
            });
        }

        let mut outcome = BatchOutcome::default();
        while let Some(joined) = tasks.join_next().await {
            let (key, result) =
                joined.map_err(|e| Error::Internal(format!("Write task failed: {}", e)))?;
            match result {
                Ok(()) => outcome.succeeded.push(key),
                Err(err) => outcome.failed.push(ObjectError::from_error(key, &err)),
            }
        }
        Ok(outcome)
    }

    #[instrument(skip(self))]
    async fn delete_one(&self, key: &str) -> Result<DeleteOutcome> {
        match tokio::fs::remove_file(self.object_path(key)).await {
            Ok(()) => Ok(DeleteOutcome {
                deleted: vec![DeletedObject {
                    key: key.to_string(),
                }],
                errors: Vec::new(),
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(DeleteOutcome::default()),
            Err(e) => Err(Error::Storage(format!("Failed to delete {}: {}", key, e))),
        }
    }

    #[instrument(skip(self, options))]
    async fn get_prefix(&self, prefix: &str, options: &ScanOptions) -> Result<ScanPage> {
        let keys = self.sorted_keys().await?;
        let listing = list_page(
            &keys,
            prefix,
            &ListObjectsOptions {
                delimiter: None,
                max_keys: options.max_keys,
                continuation_token: options.continuation_token.clone(),
            },
            self.default_max_keys,
        )?;

        let mut contents = Vec::with_capacity(listing.keys.len());
        for key in listing.keys {
            // A concurrent delete between listing and reading just drops the key.
            if let Some(body) = Self::read_object(&self.object_path(&key)).await? {
                contents.push(StoredObject {
                    key,
                    body: Some(body),
                });
            }
        }

        Ok(ScanPage {
            contents,
            page: listing.page,
        })
    }

    #[instrument(skip(self, options))]
    async fn list(&self, prefix: &str, options: &ListObjectsOptions) -> Result<Listing> {
        let keys = self.sorted_keys().await?;
        list_page(&keys, prefix, options, self.default_max_keys)
    }
}
