//! Namespace handles
//!
//! [`Instance`], [`Database`] and [`Collection`] are thin, cloneable handles that
//! compose a key prefix and forward to the [`Executor`](crate::executor::Executor).
//! Creating a handle never fails; names are validated on every operation, before
//! any storage I/O.
//!
//! ```rust,no_run
//! # async fn demo() -> lumendb::error::Result<()> {
//! use lumendb::{open, ConnectOptions, MemoryStore};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let handles = open(Arc::new(MemoryStore::new()), ConnectOptions::new("prod").db("shop").collection("orders"));
//! let orders = handles.collection.expect("collection handle");
//! let doc = lumendb::document::into_document(json!({"item": "book", "qty": 2}))?;
//! orders.insert_one(doc).await?;
//! # Ok(())
//! # }
//! ```

mod collection;
mod database;
mod instance;

pub use collection::Collection;
pub use database::Database;
pub use instance::Instance;

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::storage::ObjectStore;

/// Which handles [`open`] should create.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectOptions {
    pub instance_id: String,
    pub db_name: Option<String>,
    pub collection_name: Option<String>,
}

impl ConnectOptions {
    pub fn new(instance_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            ..Self::default()
        }
    }

    pub fn db(mut self, name: impl Into<String>) -> Self {
        self.db_name = Some(name.into());
        self
    }

    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.collection_name = Some(name.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct Handles {
    pub instance: Instance,
    pub db: Option<Database>,
    /// Only created when a database name is given too.
    pub collection: Option<Collection>,
}

/// Creates the instance handle and, when named, database and collection handles.
pub fn open(store: Arc<dyn ObjectStore>, options: ConnectOptions) -> Handles {
    let instance = Instance::new(store, options.instance_id);
    let db = options.db_name.map(|name| instance.db(name));
    let collection = match (&db, options.collection_name) {
        (Some(db), Some(name)) => Some(db.collection(name)),
        _ => None,
    };
    Handles {
        instance,
        db,
        collection,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn test_open_builds_requested_handles() {
        let store = Arc::new(MemoryStore::new());

        let handles = open(store.clone(), ConnectOptions::new("test"));
        assert_eq!(handles.instance.name(), "test");
        assert!(handles.db.is_none());
        assert!(handles.collection.is_none());

        let handles = open(store.clone(), ConnectOptions::new("test").db("shop").collection("orders"));
        assert_eq!(handles.db.as_ref().map(|db| db.name()), Some("shop"));
        assert_eq!(
            handles.collection.as_ref().map(|c| c.prefix()),
            Some("test/shop/orders/")
        );

        let handles = open(store, ConnectOptions::new("test").collection("orders"));
        assert!(handles.collection.is_none());
    }

    #[test]
    fn test_connect_options_from_json() {
        let options: ConnectOptions = serde_json::from_value(serde_json::json!({
            "instanceId": "test",
            "dbName": "shop"
        }))
        .unwrap();
        assert_eq!(options, ConnectOptions::new("test").db("shop"));
    }
}
