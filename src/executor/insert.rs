use serde::Serialize;
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, instrument, warn};

use super::Executor;
use crate::document::{document_id, Document, ID_FIELD};
use crate::error::Result;
use crate::explain::{Explain, Timing};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertOneResult {
    pub inserted_count: usize,
    /// The stored document, including its assigned `_id`.
    pub ops: Vec<Document>,
    pub inserted_id: String,
    pub explain: Explain,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertManyResult {
    /// Number of documents actually written.
    pub inserted_count: usize,
    pub ops: Vec<Document>,
    /// Ids of every input document, in input order.
    pub inserted_ids: Vec<String>,
    pub explain: Explain,
}

impl Executor {
    /// Returns the document's `_id`, generating one when it is unset.
    fn assign_id(&self, document: &mut Document) -> Result<String> {
        if let Some(id) = document_id(document)? {
            return Ok(id.to_string());
        }
        let id = self.ids.generate();
        document.insert(ID_FIELD.to_string(), Value::String(id.clone()));
        Ok(id)
    }

    /// Writes one document, overwriting any existing document with the same id.
    #[instrument(skip(self, document))]
    pub async fn insert_one(&self, prefix: &str, mut document: Document) -> Result<InsertOneResult> {
        let started = Instant::now();
        let id = self.assign_id(&mut document)?;
        self.storage
            .put_one(&format!("{}{}", prefix, id), &document)
            .await?;

        let explain = Explain::blank(Timing::storage_only(started.elapsed()));
        debug!(id = %id, "Inserted document");
        Ok(InsertOneResult {
            inserted_count: 1,
            ops: vec![document],
            inserted_id: id,
            explain,
        })
    }

    /// Writes many documents as one best-effort batch.
    ///
    /// Ids are assigned to every document before the first write. Keys that fail
    /// to write are listed in `explain.s3.Errors` and left out of `inserted_count`.
    #[instrument(skip(self, documents), fields(count = documents.len()))]
    pub async fn insert_many(
        &self,
        prefix: &str,
        mut documents: Vec<Document>,
    ) -> Result<InsertManyResult> {
        let started = Instant::now();
        let ids = documents
            .iter_mut()
            .map(|document| self.assign_id(document))
            .collect::<Result<Vec<_>>>()?;

        let objects = ids
            .iter()
            .zip(&documents)
            .map(|(id, document)| (format!("{}{}", prefix, id), document.clone()))
            .collect();
        let outcome = self.storage.put_multiple(objects).await?;

        let mut explain = Explain::blank(Timing::storage_only(started.elapsed()));
        if !outcome.failed.is_empty() {
            warn!(
                failed = outcome.failed.len(),
                succeeded = outcome.succeeded.len(),
                "Partial batch insert"
            );
            explain = explain.with_errors(outcome.failed);
        }

        Ok(InsertManyResult {
            inserted_count: outcome.succeeded.len(),
            ops: documents,
            inserted_ids: ids,
            explain,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn doc(value: Value) -> Document {
        crate::document::into_document(value).unwrap()
    }

    #[tokio::test]
    async fn test_insert_one_assigns_id() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        let executor = Executor::new(store.clone());

        let result = executor
            .insert_one("i/db/c/", doc(json!({"hello": "world"})))
            .await?;
        assert_eq!(result.inserted_count, 1);
        assert_eq!(result.inserted_id.len(), 24);
        assert_eq!(result.ops[0]["_id"], json!(result.inserted_id));
        assert_eq!(result.explain.execution_stats.total_docs_examined, 0);
        assert_eq!(result.explain.execution_stats.n_returned, 0);
        assert_eq!(store.keys(), vec![format!("i/db/c/{}", result.inserted_id)]);
        Ok(())
    }

    #[tokio::test]
    async fn test_insert_one_keeps_given_id_and_overwrites() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        let executor = Executor::new(store.clone());

        executor.insert_one("p/", doc(json!({"_id": "1", "v": 1}))).await?;
        let result = executor.insert_one("p/", doc(json!({"_id": "1", "v": 2}))).await?;
        assert_eq!(result.inserted_id, "1");
        assert_eq!(store.len(), 1);
        assert_eq!(store.keys(), vec!["p/1".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn test_insert_rejects_non_string_id() {
        let store = Arc::new(MemoryStore::new());
        let executor = Executor::new(store.clone());
        let err = executor
            .insert_one("p/", doc(json!({"_id": 7})))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "InvalidArgument");
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_insert_many_unique_ids() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        let executor = Executor::new(store.clone());

        let documents = (0..1000).map(|i| doc(json!({"n": i}))).collect();
        let result = executor.insert_many("p/", documents).await?;
        assert_eq!(result.inserted_count, 1000);
        let unique: HashSet<&String> = result.inserted_ids.iter().collect();
        assert_eq!(unique.len(), 1000);
        assert_eq!(store.len(), 1000);
        assert!(result.explain.storage.errors.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_insert_many_reports_partial_failure() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        store.deny_prefix("p/b");
        let executor = Executor::new(store.clone());

        let result = executor
            .insert_many(
                "p/",
                vec![doc(json!({"_id": "a"})), doc(json!({"_id": "b"}))],
            )
            .await?;
        assert_eq!(result.inserted_count, 1);
        assert_eq!(result.inserted_ids, vec!["a", "b"]);
        let errors = result.explain.storage.errors.unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].key, "p/b");
        Ok(())
    }
}
