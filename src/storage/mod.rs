//! Storage layer
//!
//! # Architecture
//!
//! LumenDB stores every document as its own object in a flat, prefix-addressable
//! key space:
//!
//! ```text
//! <instance>/<database>/<collection>/<_id>  →  JSON document
//! ```
//!
//! ## Object Store
//!
//! The `ObjectStore` trait is the only thing the collection engines know about
//! storage. It mirrors the primitives a cloud object store offers:
//! - Point get / put / delete
//! - Batch put / delete with per-key outcomes
//! - Paginated prefix scans with continuation tokens
//! - Delimiter listings that return "folder" common prefixes
//! - Prefix deletion
//!
//! There are no transactions and no server-side filtering.
//!
//! ## Implementations
//!
//! - **MemoryStore**: ordered in-memory map, used by tests and ephemeral sessions
//! - **LocalStore**: one JSON file per key under a root directory

pub mod engine;
pub mod local;
pub mod memory;
pub mod page;

pub use engine::{
    BatchOutcome, DeleteOutcome, DeletedObject, ListObjectsOptions, Listing, ObjectError,
    ObjectStore, PageInfo, PrefixDeletion, ScanOptions, ScanPage, Storage, StoredObject,
};
pub use local::LocalStore;
pub use memory::MemoryStore;
pub use page::DEFAULT_MAX_KEYS;
