use std::sync::Arc;
use tracing::instrument;

use super::Database;
use crate::document::Document;
use crate::error::Result;
use crate::executor::{DropOptions, DropResult, Executor, ListOptions, ListResult};
use crate::namespace::Namespace;
use crate::storage::ObjectStore;

/// Top of the namespace hierarchy. Owns the key prefix `<name>/`.
#[derive(Debug, Clone)]
pub struct Instance {
    executor: Executor,
    namespace: Namespace,
}

impl Instance {
    pub fn new(store: Arc<dyn ObjectStore>, name: impl Into<String>) -> Self {
        Self::with_executor(Executor::new(store), name)
    }

    /// Instance backed by a preconfigured executor, e.g. one with a custom
    /// query engine.
    pub fn with_executor(executor: Executor, name: impl Into<String>) -> Self {
        Self {
            executor,
            namespace: Namespace::instance(name),
        }
    }

    pub fn name(&self) -> &str {
        self.namespace.instance_name()
    }

    pub fn prefix(&self) -> String {
        self.namespace.prefix()
    }

    pub fn db(&self, name: impl Into<String>) -> Database {
        Database::new(self.executor.clone(), self.namespace.database(name))
    }

    #[instrument(skip(self, filter, options), fields(instance = %self.namespace))]
    pub async fn list_databases(
        &self,
        filter: Option<&Document>,
        options: &ListOptions,
    ) -> Result<ListResult> {
        self.namespace.validate()?;
        self.executor
            .list_databases(&self.prefix(), filter, options)
            .await
    }

    /// Deletes every document of every database in this instance, one page at a
    /// time. `dropped` is false while keys remain.
    #[instrument(skip(self, options), fields(instance = %self.namespace))]
    pub async fn destroy(&self, options: &DropOptions) -> Result<DropResult> {
        self.namespace.validate()?;
        self.executor.drop_prefix(&self.prefix(), options).await
    }
}
