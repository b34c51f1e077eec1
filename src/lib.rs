// LumenDB - Rust Implementation
// A document database API on top of prefix-addressable object storage

#![warn(rust_2018_idioms)]

pub mod client;
pub mod config;
pub mod document;
pub mod executor;
pub mod explain;
pub mod id;
pub mod namespace;
pub mod query;
pub mod storage;

// Re-exports for convenience
pub use client::{open, Collection, ConnectOptions, Database, Handles, Instance};
pub use document::Document;
pub use executor::Executor;
pub use explain::Explain;
pub use query::{BasicQueryEngine, QueryEngine, SortDirection, SortKey};
pub use storage::{LocalStore, MemoryStore, ObjectStore, Storage};

/// LumenDB error types
pub mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum Error {
        /// Malformed instance, database or collection name. Raised before any I/O.
        #[error("{0}")]
        InvalidNamespace(String),

        /// A filter, sort or update expression uses an operator the query engine
        /// does not recognize.
        #[error("Unsupported operation: {0}")]
        UnsupportedOperation(String),

        #[error("Invalid argument: {0}")]
        InvalidArgument(String),

        #[error("Storage error: {0}")]
        Storage(String),

        #[error("Serialization error: {0}")]
        Serialization(String),

        #[error("Configuration error: {0}")]
        Config(String),

        #[error("Internal error: {0}")]
        Internal(String),
    }

    impl Error {
        /// Stable, machine-readable code for the error kind.
        pub fn code(&self) -> &'static str {
            match self {
                Error::InvalidNamespace(_) => "InvalidNamespace",
                Error::UnsupportedOperation(_) => "UnsupportedOperation",
                Error::InvalidArgument(_) => "InvalidArgument",
                Error::Storage(_) => "StorageError",
                Error::Serialization(_) => "SerializationError",
                Error::Config(_) => "ConfigError",
                Error::Internal(_) => "InternalError",
            }
        }
    }

    impl From<serde_json::Error> for Error {
        fn from(err: serde_json::Error) -> Self {
            Error::Serialization(err.to_string())
        }
    }

    impl From<std::io::Error> for Error {
        fn from(err: std::io::Error) -> Self {
            Error::Storage(err.to_string())
        }
    }

    impl From<config::ConfigError> for Error {
        fn from(err: config::ConfigError) -> Self {
            Error::Config(err.to_string())
        }
    }

    pub type Result<T> = std::result::Result<T, Error>;
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
