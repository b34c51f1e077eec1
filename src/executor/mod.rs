//! Collection execution engine
//!
//! Maps document-database operations onto object-store primitives. Every
//! operation works on a key prefix (`instance/db/collection/`), never on a
//! namespace directly; namespace objects validate names before calling in.
//!
//! The pipeline for reads is always the same:
//!
//! 1. Resolve the filter to a point lookup (`{"_id": "<id>"}`) or a prefix scan
//!    bounded by `max_keys` and a continuation token.
//! 2. Filter, sort, skip, limit and project in memory.
//! 3. Wrap the result with an [`Explain`](crate::explain::Explain) record.
//!
//! Writes reuse the read path to locate documents. There are no multi-key
//! transactions: a batch that fails halfway leaves the successful writes in
//! place and reports the failed keys in the explain record.

pub mod delete;
pub mod find;
pub mod insert;
pub mod listing;
pub mod update;

pub use delete::{DeleteOptions, DeleteResult};
pub use find::{FindOneResult, FindOptions, FindResult};
pub use insert::{InsertManyResult, InsertOneResult};
pub use listing::{DropOptions, DropResult, ListOptions, ListResult};
pub use update::{UpdateOptions, UpdateResult, UpsertedId};

use serde_json::Value;
use std::sync::Arc;

use crate::document::{Document, ID_FIELD};
use crate::id::{IdGenerator, ObjectIdGenerator};
use crate::query::{BasicQueryEngine, QueryEngine};
use crate::storage::{ObjectStore, Storage};

/// Executes operations against one object store.
///
/// Cheap to clone; clones share the store, the query engine and the id
/// generator.
#[derive(Clone)]
pub struct Executor {
    storage: Storage,
    engine: Arc<dyn QueryEngine>,
    ids: Arc<dyn IdGenerator>,
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("storage", &self.storage)
            .finish_non_exhaustive()
    }
}

impl Executor {
    /// Executor with the bundled query engine and id generator.
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            storage: Storage::new(store),
            engine: Arc::new(BasicQueryEngine),
            ids: Arc::new(ObjectIdGenerator::new()),
        }
    }

    pub fn with_query_engine(mut self, engine: Arc<dyn QueryEngine>) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn query_engine(&self) -> &dyn QueryEngine {
        self.engine.as_ref()
    }
}

/// Returns the id when `filter` is exactly `{"_id": "<non-empty string>"}`.
///
/// Such filters can be answered with a single-key request instead of a scan.
pub(crate) fn point_lookup_id(filter: Option<&Document>) -> Option<&str> {
    let filter = filter?;
    if filter.len() != 1 {
        return None;
    }
    match filter.get(ID_FIELD)? {
        Value::String(id) if !id.is_empty() => Some(id),
        _ => None,
    }
}
