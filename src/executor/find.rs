use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, instrument};

use super::{point_lookup_id, Executor};
use crate::document::{Document, ID_FIELD};
use crate::error::Result;
use crate::explain::{Explain, Timing};
use crate::query::{SortDirection, SortKey};
use crate::storage::{PageInfo, ScanOptions, ScanPage, StoredObject};

/// Options for `find`.
///
/// ```rust
/// use lumendb::executor::FindOptions;
/// use lumendb::SortDirection;
///
/// let options = FindOptions::new()
///     .sort_by("first", SortDirection::Ascending)
///     .skip(1)
///     .limit(1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FindOptions {
    pub sort: Vec<SortKey>,
    pub skip: Option<usize>,
    /// `None` and `Some(0)` both mean no limit.
    pub limit: Option<usize>,
    pub projection: Option<Document>,
    pub max_keys: Option<usize>,
    pub continuation_token: Option<String>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sort_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort.push(SortKey {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn projection(mut self, projection: Document) -> Self {
        self.projection = Some(projection);
        self
    }

    pub fn max_keys(mut self, max_keys: usize) -> Self {
        self.max_keys = Some(max_keys);
        self
    }

    pub fn continuation_token(mut self, token: impl Into<String>) -> Self {
        self.continuation_token = Some(token.into());
        self
    }

    pub(crate) fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            max_keys: self.max_keys,
            continuation_token: self.continuation_token.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FindResult {
    pub docs: Vec<Document>,
    pub explain: Explain,
}

impl FindResult {
    /// Keeps the first document only.
    pub fn into_one(self) -> FindOneResult {
        FindOneResult {
            doc: self.docs.into_iter().next(),
            explain: self.explain,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FindOneResult {
    pub doc: Option<Document>,
    pub explain: Explain,
}

impl Executor {
    /// Finds documents under `prefix`.
    ///
    /// A filter of exactly `{"_id": "<id>"}` is a point lookup; anything else
    /// scans one page of keys. Filter, sort, skip, limit and projection are then
    /// applied in that order. Only the scanned page is considered, so callers
    /// page through a collection with `max_keys` and `continuation_token`.
    #[instrument(skip(self, filter, options), fields(filter = ?filter))]
    pub async fn find_many(
        &self,
        prefix: &str,
        filter: Option<&Document>,
        options: &FindOptions,
    ) -> Result<FindResult> {
        let (entries, explain) = self.find_entries(prefix, filter, options).await?;
        Ok(FindResult {
            docs: entries.into_iter().map(|(_, document)| document).collect(),
            explain,
        })
    }

    /// `find_many` with a limit of one.
    pub async fn find_one(
        &self,
        prefix: &str,
        filter: Option<&Document>,
        options: &FindOptions,
    ) -> Result<FindResult> {
        let options = options.clone().limit(1);
        self.find_many(prefix, filter, &options).await
    }

    /// Fetches a single key. Reported as a scan of zero or one keys.
    pub async fn find_by_id(&self, prefix: &str, id: &str, options: &ScanOptions) -> Result<ScanPage> {
        let key = format!("{}{}", prefix, id);
        let contents: Vec<StoredObject> = self
            .storage
            .get_one(&key)
            .await?
            .map(|body| StoredObject {
                key,
                body: Some(body),
            })
            .into_iter()
            .collect();

        Ok(ScanPage {
            page: PageInfo {
                is_truncated: false,
                key_count: contents.len(),
                max_keys: options.max_keys,
                next_continuation_token: None,
            },
            contents,
        })
    }

    /// The find pipeline, keeping each document's storage key.
    pub(crate) async fn find_entries(
        &self,
        prefix: &str,
        filter: Option<&Document>,
        options: &FindOptions,
    ) -> Result<(Vec<(String, Document)>, Explain)> {
        let started = Instant::now();
        let predicate = filter
            .map(|filter| self.engine.compile_filter(filter))
            .transpose()?;

        let scan_options = options.scan_options();
        let scan = match point_lookup_id(filter) {
            Some(id) => self.find_by_id(prefix, id, &scan_options).await?,
            None => self.storage.get_prefix(prefix, &scan_options).await?,
        };
        let storage_elapsed = started.elapsed();

        let mut entries: Vec<(String, Document)> = scan
            .contents
            .into_iter()
            .filter_map(|object| object.body.map(|body| (object.key, body)))
            .collect();

        if let Some(predicate) = &predicate {
            entries.retain(|(_, document)| predicate(document));
        }
        if !options.sort.is_empty() {
            entries.sort_by(|(_, a), (_, b)| self.engine.compare(&options.sort, a, b));
        }
        if let Some(skip) = options.skip {
            entries.drain(..skip.min(entries.len()));
        }
        if let Some(limit) = options.limit.filter(|limit| *limit > 0) {
            entries.truncate(limit);
        }
        if let Some(projection) = &options.projection {
            for (_, document) in entries.iter_mut() {
                let mut projected = self.engine.project(projection, document)?;
                if let Some(id) = document.get(ID_FIELD) {
                    projected.insert(ID_FIELD.to_string(), id.clone());
                }
                *document = projected;
            }
        }

        let explain = Explain::new(
            &scan.page,
            entries.len(),
            Timing::new(started.elapsed(), storage_elapsed),
        );
        debug!(
            prefix,
            examined = scan.page.key_count,
            returned = entries.len(),
            "Find complete"
        );
        Ok((entries, explain))
    }
}
