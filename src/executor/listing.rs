use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Instant;
use tracing::instrument;

use super::Executor;
use crate::document::Document;
use crate::error::Result;
use crate::explain::{Explain, Timing};
use crate::namespace::KEY_DELIMITER;
use crate::storage::ListObjectsOptions;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListOptions {
    /// Return bare names instead of `{"name": ...}` documents.
    pub name_only: bool,
    pub max_keys: Option<usize>,
    pub continuation_token: Option<String>,
}

impl ListOptions {
    pub fn names() -> Self {
        Self {
            name_only: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListResult {
    pub docs: Vec<Value>,
    pub explain: Explain,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DropOptions {
    pub max_keys: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DropResult {
    pub deleted_count: usize,
    /// False when keys remain under the prefix and another drop is needed.
    pub dropped: bool,
    pub explain: Explain,
}

impl Executor {
    /// Lists the collections of the database at `prefix`.
    pub async fn list_collections(
        &self,
        prefix: &str,
        filter: Option<&Document>,
        options: &ListOptions,
    ) -> Result<ListResult> {
        self.list_children(prefix, filter, options).await
    }

    /// Lists the databases of the instance at `prefix`.
    pub async fn list_databases(
        &self,
        prefix: &str,
        filter: Option<&Document>,
        options: &ListOptions,
    ) -> Result<ListResult> {
        self.list_children(prefix, filter, options).await
    }

    /// Deletes everything under `prefix` that fits in one page.
    pub async fn drop_prefix(&self, prefix: &str, options: &DropOptions) -> Result<DropResult> {
        let result = self.delete_all(prefix, options).await?;
        Ok(DropResult {
            deleted_count: result.deleted_count,
            dropped: !result.explain.storage.is_truncated,
            explain: result.explain,
        })
    }

    /// Names of the immediate "folders" under `prefix`, filtered as
    /// `{"name": <name>}` documents.
    #[instrument(skip(self, filter, options))]
    async fn list_children(
        &self,
        prefix: &str,
        filter: Option<&Document>,
        options: &ListOptions,
    ) -> Result<ListResult> {
        let started = Instant::now();
        let predicate = filter
            .map(|filter| self.engine.compile_filter(filter))
            .transpose()?;

        let listing = self
            .storage
            .list(
                prefix,
                &ListObjectsOptions {
                    delimiter: Some(KEY_DELIMITER.to_string()),
                    max_keys: options.max_keys,
                    continuation_token: options.continuation_token.clone(),
                },
            )
            .await?;
        let storage_elapsed = started.elapsed();

        let docs: Vec<Value> = listing
            .common_prefixes
            .iter()
            .map(|common| child_name(prefix, common))
            .filter_map(|name| {
                let mut document = Document::new();
                document.insert("name".to_string(), json!(name));
                if predicate.as_ref().is_some_and(|predicate| !predicate(&document)) {
                    return None;
                }
                Some(if options.name_only {
                    Value::String(name.to_string())
                } else {
                    Value::Object(document)
                })
            })
            .collect();

        let explain = Explain::new(
            &listing.page,
            docs.len(),
            Timing::new(started.elapsed(), storage_elapsed),
        );
        Ok(ListResult { docs, explain })
    }
}

/// `"i/db/users/"` under `"i/db/"` is `"users"`.
fn child_name<'a>(prefix: &str, common: &'a str) -> &'a str {
    let name = common.strip_prefix(prefix).unwrap_or(common);
    name.strip_suffix(KEY_DELIMITER).unwrap_or(name)
}
