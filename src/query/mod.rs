//! Query engine
//!
//! The executor never interprets filters, update expressions, sort keys or
//! projections itself. It compiles them through a [`QueryEngine`], so the
//! matching language can be swapped without touching the storage pipeline.
//! [`BasicQueryEngine`] implements the common document-database operators.

pub mod filter;
pub mod projection;
pub mod sort;
pub mod update;
pub mod value;

pub use sort::{SortDirection, SortKey};

use crate::document::Document;
use crate::error::Result;
use std::cmp::Ordering;
use tracing::trace;

/// Compiled filter.
pub type Predicate = Box<dyn Fn(&Document) -> bool + Send + Sync>;

/// Compiled update. Mutates the document in place.
pub type Updater = Box<dyn Fn(&mut Document) -> Result<()> + Send + Sync>;

/// Matching, mutation, ordering and projection of documents.
///
/// `compile_filter` and `compile_update` must reject unknown operators with
/// [`Error::UnsupportedOperation`](crate::error::Error::UnsupportedOperation)
/// at compile time, before any storage I/O happens.
pub trait QueryEngine: Send + Sync {
    fn compile_filter(&self, filter: &Document) -> Result<Predicate>;

    fn compile_update(&self, update: &Document) -> Result<Updater>;

    fn compare(&self, sort: &[SortKey], a: &Document, b: &Document) -> Ordering;

    fn project(&self, projection: &Document, document: &Document) -> Result<Document>;
}

/// Default query engine
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicQueryEngine;

impl QueryEngine for BasicQueryEngine {
    fn compile_filter(&self, filter: &Document) -> Result<Predicate> {
        let condition = filter::compile(filter)?;
        trace!(?condition, "Compiled filter");
        Ok(Box::new(move |document| condition.matches(document)))
    }

    fn compile_update(&self, update: &Document) -> Result<Updater> {
        let ops = update::compile(update)?;
        trace!(?ops, "Compiled update");
        Ok(Box::new(move |document| update::apply(&ops, document)))
    }

    fn compare(&self, sort: &[SortKey], a: &Document, b: &Document) -> Ordering {
        sort::compare_documents(sort, a, b)
    }

    fn project(&self, projection: &Document, document: &Document) -> Result<Document> {
        projection::apply_projection(projection, document)
    }
}
