use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, instrument, warn};

use super::{Executor, FindOptions};
use crate::document::{deep_equal, documents_equal, Document, ID_FIELD};
use crate::error::{Error, Result};
use crate::explain::Explain;
use crate::query::Updater;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateOptions {
    /// Insert a document built from the update when nothing matches.
    pub upsert: bool,
    pub skip: Option<usize>,
    /// Update at most this many matches. `None` and `Some(0)` mean no limit.
    pub limit: Option<usize>,
    pub max_keys: Option<usize>,
    pub continuation_token: Option<String>,
}

impl UpdateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options that insert when nothing matches.
    pub fn upsert() -> Self {
        Self {
            upsert: true,
            ..Self::default()
        }
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn max_keys(mut self, max_keys: usize) -> Self {
        self.max_keys = Some(max_keys);
        self
    }

    fn find_options(&self) -> FindOptions {
        FindOptions {
            skip: self.skip,
            limit: self.limit,
            max_keys: self.max_keys,
            continuation_token: self.continuation_token.clone(),
            ..FindOptions::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertedId {
    #[serde(rename = "_id")]
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResult {
    pub matched_count: usize,
    pub modified_count: usize,
    pub upserted_count: usize,
    pub upserted_id: Option<UpsertedId>,
    pub explain: Explain,
}

impl Executor {
    /// Applies `update` to every document matching `filter` in one scanned page.
    ///
    /// Matches are updated on a copy and compared with the original; only
    /// copies that actually changed are written back, concurrently. With
    /// `upsert` and no match, the update is applied to an empty document which
    /// is then inserted.
    #[instrument(skip(self, filter, update, options), fields(filter = ?filter))]
    pub async fn update_many(
        &self,
        prefix: &str,
        filter: Option<&Document>,
        update: &Document,
        options: &UpdateOptions,
    ) -> Result<UpdateResult> {
        let started = Instant::now();
        let updater = self.engine.compile_update(update)?;
        let (entries, mut explain) = self
            .find_entries(prefix, filter, &options.find_options())
            .await?;

        if entries.is_empty() && options.upsert {
            return self.upsert(prefix, &updater, explain, started).await;
        }

        let matched_count = entries.len();
        let mut changed = Vec::new();
        for (key, original) in entries {
            let mut copy = original.clone();
            updater(&mut copy)?;
            if !ids_equal(&original, &copy) {
                return Err(Error::InvalidArgument(format!(
                    "Update would modify the immutable field '{}' of {}",
                    ID_FIELD, key
                )));
            }
            if !documents_equal(&original, &copy) {
                changed.push((key, copy));
            }
        }

        let modified_count = if changed.is_empty() {
            0
        } else {
            let write_started = Instant::now();
            let outcome = self.storage.put_concurrent(changed).await?;
            explain.add_storage_time(write_started.elapsed());
            if !outcome.failed.is_empty() {
                warn!(failed = outcome.failed.len(), "Partial update rewrite");
                explain = explain.with_errors(outcome.failed);
            }
            outcome.succeeded.len()
        };

        explain.set_execution_time(started.elapsed());
        debug!(prefix, matched_count, modified_count, "Update complete");
        Ok(UpdateResult {
            matched_count,
            modified_count,
            upserted_count: 0,
            upserted_id: None,
            explain,
        })
    }

    /// `update_many` with a limit of one.
    pub async fn update_one(
        &self,
        prefix: &str,
        filter: Option<&Document>,
        update: &Document,
        options: &UpdateOptions,
    ) -> Result<UpdateResult> {
        let options = options.clone().limit(1);
        self.update_many(prefix, filter, update, &options).await
    }

    /// Replaces the first document matching `filter` wholesale.
    ///
    /// The replacement keeps the matched document's `_id`. With `upsert` and no
    /// match, the replacement is inserted as if by `{"$set": replacement}`.
    #[instrument(skip(self, filter, replacement, options), fields(filter = ?filter))]
    pub async fn replace_one(
        &self,
        prefix: &str,
        filter: Option<&Document>,
        mut replacement: Document,
        options: &UpdateOptions,
    ) -> Result<UpdateResult> {
        if let Some(operator) = replacement.keys().find(|key| key.starts_with('$')) {
            return Err(Error::InvalidArgument(format!(
                "Replacement document must not contain update operators, found '{}'",
                operator
            )));
        }

        let started = Instant::now();
        let find_options = FindOptions {
            limit: Some(1),
            max_keys: options.max_keys,
            continuation_token: options.continuation_token.clone(),
            ..FindOptions::default()
        };
        let (entries, mut explain) = self.find_entries(prefix, filter, &find_options).await?;

        let Some((key, matched)) = entries.into_iter().next() else {
            if options.upsert {
                let mut set = Document::new();
                set.insert("$set".to_string(), Value::Object(replacement));
                let updater = self.engine.compile_update(&set)?;
                return self.upsert(prefix, &updater, explain, started).await;
            }
            explain.set_execution_time(started.elapsed());
            return Ok(UpdateResult {
                matched_count: 0,
                modified_count: 0,
                upserted_count: 0,
                upserted_id: None,
                explain,
            });
        };

        let id = matched
            .get(ID_FIELD)
            .cloned()
            .unwrap_or_else(|| Value::String(key.strip_prefix(prefix).unwrap_or(&key).to_string()));
        replacement.insert(ID_FIELD.to_string(), id);

        let write_started = Instant::now();
        self.storage.put_one(&key, &replacement).await?;
        explain.add_storage_time(write_started.elapsed());
        explain.set_execution_time(started.elapsed());

        Ok(UpdateResult {
            matched_count: 1,
            modified_count: 1,
            upserted_count: 0,
            upserted_id: None,
            explain,
        })
    }

    /// Inserts the result of applying `updater` to an empty document.
    async fn upsert(
        &self,
        prefix: &str,
        updater: &Updater,
        mut explain: Explain,
        started: Instant,
    ) -> Result<UpdateResult> {
        let mut document = Document::new();
        updater(&mut document)?;

        let insert_started = Instant::now();
        let inserted = self.insert_one(prefix, document).await?;
        explain.add_storage_time(insert_started.elapsed());
        explain.set_execution_time(started.elapsed());
        debug!(prefix, id = %inserted.inserted_id, "Upserted document");

        Ok(UpdateResult {
            matched_count: 0,
            modified_count: 0,
            upserted_count: 1,
            upserted_id: Some(UpsertedId {
                id: inserted.inserted_id,
            }),
            explain,
        })
    }
}

fn ids_equal(a: &Document, b: &Document) -> bool {
    match (a.get(ID_FIELD), b.get(ID_FIELD)) {
        (Some(x), Some(y)) => deep_equal(x, y),
        (None, None) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStore, ObjectStore};
    use serde_json::json;
    use std::sync::Arc;

    fn doc(value: Value) -> Document {
        crate::document::into_document(value).unwrap()
    }

    async fn seeded(store: Arc<MemoryStore>) -> Result<Executor> {
        let executor = Executor::new(store);
        executor
            .insert_many(
                "t/db/c/",
                vec![
                    doc(json!({"_id": "1", "first": "Jane", "last": "Doe"})),
                    doc(json!({"_id": "2", "first": "John", "last": "Doe"})),
                ],
            )
            .await?;
        Ok(executor)
    }

    #[tokio::test]
    async fn test_update_many_rewrites_changed_documents() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        let executor = seeded(store.clone()).await?;

        let filter = doc(json!({"first": "Jane"}));
        let update = doc(json!({"$set": {"last": "Goodall"}}));
        let result = executor
            .update_many("t/db/c/", Some(&filter), &update, &UpdateOptions::new())
            .await?;
        assert_eq!(result.matched_count, 1);
        assert_eq!(result.modified_count, 1);
        assert_eq!(result.upserted_count, 0);
        assert!(result.upserted_id.is_none());

        let stored = store.get_one("t/db/c/1").await?.unwrap();
        assert_eq!(stored["last"], json!("Goodall"));
        Ok(())
    }

    #[tokio::test]
    async fn test_large_integer_change_is_rewritten() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        let executor = Executor::new(store.clone());
        executor
            .insert_many(
                "t/db/n/",
                vec![
                    doc(json!({"_id": "u", "n": u64::MAX - 1})),
                    doc(json!({"_id": "i", "n": 9_007_199_254_740_993i64})),
                ],
            )
            .await?;

        let update = doc(json!({"$set": {"n": u64::MAX}}));
        let filter = doc(json!({"_id": "u"}));
        let result = executor
            .update_many("t/db/n/", Some(&filter), &update, &UpdateOptions::new())
            .await?;
        assert_eq!(result.matched_count, 1);
        assert_eq!(result.modified_count, 1);
        assert_eq!(store.get_one("t/db/n/u").await?.unwrap()["n"], json!(u64::MAX));

        let update = doc(json!({"$set": {"n": 9_007_199_254_740_992.0}}));
        let filter = doc(json!({"_id": "i"}));
        let result = executor
            .update_many("t/db/n/", Some(&filter), &update, &UpdateOptions::new())
            .await?;
        assert_eq!(result.modified_count, 1);

        let exact = doc(json!({"n": u64::MAX - 1}));
        let found = executor
            .find_many("t/db/n/", Some(&exact), &FindOptions::new())
            .await?;
        assert!(found.docs.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_partial_rewrite_failure_is_reported() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        let executor = seeded(store.clone()).await?;
        store.deny_prefix("t/db/c/1");

        let update = doc(json!({"$set": {"last": "Smith"}}));
        let result = executor
            .update_many("t/db/c/", None, &update, &UpdateOptions::new())
            .await?;
        assert_eq!(result.matched_count, 2);
        assert_eq!(result.modified_count, 1);

        let errors = result.explain.storage.errors.unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].key, "t/db/c/1");

        assert_eq!(store.get_one("t/db/c/1").await?.unwrap()["last"], json!("Doe"));
        assert_eq!(store.get_one("t/db/c/2").await?.unwrap()["last"], json!("Smith"));
        Ok(())
    }

    #[tokio::test]
    async fn test_noop_update_is_not_rewritten() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        let executor = seeded(store.clone()).await?;
        // Any write under the prefix would now fail.
        store.deny_prefix("t/db/c/");

        let update = doc(json!({"$set": {"last": "Doe"}}));
        let result = executor
            .update_many("t/db/c/", None, &update, &UpdateOptions::new())
            .await?;
        assert_eq!(result.matched_count, 2);
        assert_eq!(result.modified_count, 0);
        assert!(result.explain.storage.errors.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_update_one_limits_matches() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        let executor = seeded(store.clone()).await?;

        let filter = doc(json!({"last": "Doe"}));
        let update = doc(json!({"$set": {"last": "Roe"}}));
        let result = executor
            .update_one("t/db/c/", Some(&filter), &update, &UpdateOptions::new())
            .await?;
        assert_eq!(result.matched_count, 1);
        assert_eq!(result.modified_count, 1);

        let remaining = executor
            .find_many("t/db/c/", Some(&filter), &FindOptions::new())
            .await?;
        assert_eq!(remaining.docs.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_upsert_inserts_update_applied_to_empty_document() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        let executor = seeded(store.clone()).await?;

        let filter = doc(json!({"first": "Joe"}));
        let update = doc(json!({"$set": {"first": "Joe", "last": "Smith"}}));
        let result = executor
            .update_many("t/db/c/", Some(&filter), &update, &UpdateOptions::upsert())
            .await?;
        assert_eq!(result.matched_count, 0);
        assert_eq!(result.upserted_count, 1);
        let id = result.upserted_id.unwrap().id;

        let stored = store.get_one(&format!("t/db/c/{}", id)).await?.unwrap();
        assert_eq!(
            stored,
            doc(json!({"_id": id, "first": "Joe", "last": "Smith"}))
        );
        assert_eq!(store.len(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_no_match_without_upsert() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        let executor = seeded(store.clone()).await?;

        let filter = doc(json!({"first": "Nobody"}));
        let update = doc(json!({"$set": {"x": 1}}));
        let result = executor
            .update_many("t/db/c/", Some(&filter), &update, &UpdateOptions::new())
            .await?;
        assert_eq!(result.matched_count, 0);
        assert_eq!(result.upserted_count, 0);
        assert_eq!(store.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_unsupported_update_operator() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        let executor = seeded(store.clone()).await?;

        let update = doc(json!({"last": "Goodall"}));
        let err = executor
            .update_many("t/db/c/", None, &update, &UpdateOptions::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Unsupported operation: last");
        Ok(())
    }

    #[tokio::test]
    async fn test_update_cannot_change_id() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        let executor = seeded(store.clone()).await?;

        let filter = doc(json!({"_id": "1"}));
        let update = doc(json!({"$set": {"_id": "9"}}));
        let err = executor
            .update_many("t/db/c/", Some(&filter), &update, &UpdateOptions::new())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "InvalidArgument");
        assert!(store.get_one("t/db/c/9").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_replace_one_keeps_id() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        let executor = seeded(store.clone()).await?;

        let filter = doc(json!({"first": "John"}));
        let result = executor
            .replace_one(
                "t/db/c/",
                Some(&filter),
                doc(json!({"first": "Johnny"})),
                &UpdateOptions::new(),
            )
            .await?;
        assert_eq!(result.matched_count, 1);
        assert_eq!(result.modified_count, 1);
        assert_eq!(
            store.get_one("t/db/c/2").await?,
            Some(doc(json!({"_id": "2", "first": "Johnny"})))
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_replace_one_upsert() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        let executor = seeded(store.clone()).await?;

        let filter = doc(json!({"first": "Nobody"}));
        let result = executor
            .replace_one(
                "t/db/c/",
                Some(&filter),
                doc(json!({"first": "Somebody"})),
                &UpdateOptions::upsert(),
            )
            .await?;
        assert_eq!(result.upserted_count, 1);
        let id = result.upserted_id.unwrap().id;
        assert_eq!(
            store.get_one(&format!("t/db/c/{}", id)).await?,
            Some(doc(json!({"_id": id, "first": "Somebody"})))
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_replace_rejects_operators() {
        let executor = Executor::new(Arc::new(MemoryStore::new()));
        let err = executor
            .replace_one(
                "t/db/c/",
                None,
                doc(json!({"$set": {"a": 1}})),
                &UpdateOptions::new(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "InvalidArgument");
    }

    #[test]
    fn test_result_serialization() {
        let result = UpdateResult {
            matched_count: 0,
            modified_count: 0,
            upserted_count: 1,
            upserted_id: Some(UpsertedId { id: "abc".to_string() }),
            explain: Explain::blank(Default::default()),
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["upsertedId"], json!({"_id": "abc"}));
        assert_eq!(value["upsertedCount"], json!(1));
    }
}
