use tracing::instrument;

use super::Collection;
use crate::document::Document;
use crate::error::Result;
use crate::executor::{DropOptions, DropResult, Executor, ListOptions, ListResult};
use crate::namespace::Namespace;

/// A database handle. Owns the key prefix `<instance>/<db>/`.
#[derive(Debug, Clone)]
pub struct Database {
    executor: Executor,
    namespace: Namespace,
}

impl Database {
    pub(crate) fn new(executor: Executor, namespace: Namespace) -> Self {
        Self {
            executor,
            namespace,
        }
    }

    pub fn name(&self) -> &str {
        self.namespace.database_name().unwrap_or_default()
    }

    pub fn prefix(&self) -> String {
        self.namespace.prefix()
    }

    pub fn collection(&self, name: impl Into<String>) -> Collection {
        Collection::new(self.executor.clone(), self.namespace.collection(name))
    }

    #[instrument(skip(self, options), fields(db = %self.namespace))]
    pub async fn drop_database(&self, options: &DropOptions) -> Result<DropResult> {
        self.namespace.validate()?;
        self.executor.drop_prefix(&self.prefix(), options).await
    }

    #[instrument(skip(self, filter, options), fields(db = %self.namespace))]
    pub async fn list_collections(
        &self,
        filter: Option<&Document>,
        options: &ListOptions,
    ) -> Result<ListResult> {
        self.namespace.validate()?;
        self.executor
            .list_collections(&self.prefix(), filter, options)
            .await
    }
}
