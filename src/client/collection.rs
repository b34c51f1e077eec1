use crate::document::Document;
use crate::error::Result;
use crate::executor::{
    DeleteOptions, DeleteResult, DropOptions, DropResult, Executor, FindOneResult, FindOptions,
    FindResult, InsertManyResult, InsertOneResult, UpdateOptions, UpdateResult,
};
use crate::namespace::Namespace;

/// A collection handle. Owns the key prefix `<instance>/<db>/<collection>/`.
///
/// Every method validates the database and collection names first and fails
/// with `InvalidNamespace` without touching storage when they are malformed.
#[derive(Debug, Clone)]
pub struct Collection {
    executor: Executor,
    namespace: Namespace,
    prefix: String,
}

impl Collection {
    pub(crate) fn new(executor: Executor, namespace: Namespace) -> Self {
        let prefix = namespace.prefix();
        Self {
            executor,
            namespace,
            prefix,
        }
    }

    pub fn name(&self) -> &str {
        self.namespace.collection_name().unwrap_or_default()
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub async fn insert_one(&self, document: Document) -> Result<InsertOneResult> {
        self.namespace.validate()?;
        self.executor.insert_one(&self.prefix, document).await
    }

    pub async fn insert_many(&self, documents: Vec<Document>) -> Result<InsertManyResult> {
        self.namespace.validate()?;
        self.executor.insert_many(&self.prefix, documents).await
    }

    pub async fn find(&self, filter: Option<&Document>, options: &FindOptions) -> Result<FindResult> {
        self.namespace.validate()?;
        self.executor.find_many(&self.prefix, filter, options).await
    }

    pub async fn find_one(
        &self,
        filter: Option<&Document>,
        options: &FindOptions,
    ) -> Result<FindOneResult> {
        self.namespace.validate()?;
        let result = self.executor.find_one(&self.prefix, filter, options).await?;
        Ok(result.into_one())
    }

    pub async fn update_one(
        &self,
        filter: Option<&Document>,
        update: &Document,
        options: &UpdateOptions,
    ) -> Result<UpdateResult> {
        self.namespace.validate()?;
        self.executor
            .update_one(&self.prefix, filter, update, options)
            .await
    }

    pub async fn update_many(
        &self,
        filter: Option<&Document>,
        update: &Document,
        options: &UpdateOptions,
    ) -> Result<UpdateResult> {
        self.namespace.validate()?;
        self.executor
            .update_many(&self.prefix, filter, update, options)
            .await
    }

    pub async fn replace_one(
        &self,
        filter: Option<&Document>,
        replacement: Document,
        options: &UpdateOptions,
    ) -> Result<UpdateResult> {
        self.namespace.validate()?;
        self.executor
            .replace_one(&self.prefix, filter, replacement, options)
            .await
    }

    pub async fn delete_one(
        &self,
        filter: Option<&Document>,
        options: &DeleteOptions,
    ) -> Result<DeleteResult> {
        self.namespace.validate()?;
        self.executor.delete_one(&self.prefix, filter, options).await
    }

    pub async fn delete_many(
        &self,
        filter: Option<&Document>,
        options: &DeleteOptions,
    ) -> Result<DeleteResult> {
        self.namespace.validate()?;
        self.executor.delete_many(&self.prefix, filter, options).await
    }

    /// Drops the collection. Call again while `dropped` is false.
    pub async fn drop(&self, options: &DropOptions) -> Result<DropResult> {
        self.namespace.validate()?;
        self.executor.drop_prefix(&self.prefix, options).await
    }
}
