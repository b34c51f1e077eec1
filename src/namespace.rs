//! Namespaces and their storage key prefixes.
//!
//! # Overview
//!
//! LumenDB organizes documents in a three-level hierarchy that maps onto a flat
//! object-store key space:
//!
//! ```text
//! Instance            → "<instance>/"
//!   └─→ Database      → "<instance>/<database>/"
//!        └─→ Collection → "<instance>/<database>/<collection>/"
//!             └─→ Document key "<instance>/<database>/<collection>/<_id>"
//! ```
//!
//! Names are validated before any storage I/O so that namespaces partition the
//! key space: no name may contain the `/` separator, so no collection's prefix
//! can be a prefix of another collection's keys.

use std::fmt;

use crate::error::{Error, Result};

/// Separator between key segments.
pub const KEY_DELIMITER: &str = "/";

/// Database names must be shorter than this many characters.
pub const MAX_DATABASE_NAME_LEN: usize = 64;

/// Maximum length of the combined `<database>.<collection>` name.
pub const MAX_NAMESPACE_LEN: usize = 120;

/// Reserved collection-name prefix.
pub const RESERVED_COLLECTION_PREFIX: &str = "system";

const ILLEGAL_CHARACTERS: &[char] = &['\\', '.', '"', '$', '*', '<', '>', ':', '|', '?', '/'];

fn has_illegal_character(name: &str) -> bool {
    name.chars()
        .any(|c| c.is_whitespace() || ILLEGAL_CHARACTERS.contains(&c))
}

/// Validates an instance name.
///
/// Instance names must be non-empty and must not contain the key separator.
pub fn validate_instance_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains(KEY_DELIMITER) {
        return Err(Error::InvalidNamespace(format!(
            "Invalid instance name specified '{}'",
            name
        )));
    }
    Ok(())
}

/// Validates a database name.
///
/// A database name is rejected when it:
/// 1. is empty
/// 2. is 64 characters or longer
/// 3. contains whitespace or any of `\ . " $ * < > : | ? /`
///
/// # Examples
///
/// ```rust
/// use lumendb::namespace::validate_database_name;
///
/// assert!(validate_database_name("inventory").is_ok());
/// assert!(validate_database_name("my.db").is_err());
/// assert!(validate_database_name("").is_err());
/// ```
pub fn validate_database_name(db: &str) -> Result<()> {
    let valid = !db.is_empty()
        && db.chars().count() < MAX_DATABASE_NAME_LEN
        && !has_illegal_character(db);

    if !valid {
        return Err(Error::InvalidNamespace(format!(
            "Invalid database name specified '{}'",
            db
        )));
    }
    Ok(())
}

/// Validates a collection name within a database.
///
/// A collection name is rejected when it:
/// 1. is empty
/// 2. makes `<db>.<collection>` longer than 120 characters
/// 3. does not start with a letter or underscore
/// 4. contains `$`
/// 5. starts with `system`
/// 6. contains whitespace or any of `\ . " $ * < > : | ? /`
///
/// # Examples
///
/// ```rust
/// use lumendb::namespace::validate_collection_name;
///
/// assert!(validate_collection_name("shop", "orders").is_ok());
/// assert!(validate_collection_name("shop", "_drafts").is_ok());
/// assert!(validate_collection_name("shop", "$bad").is_err());
/// assert!(validate_collection_name("shop", "system.users").is_err());
/// assert!(validate_collection_name("shop", "1st").is_err());
/// ```
pub fn validate_collection_name(db: &str, collection: &str) -> Result<()> {
    let starts_well = collection
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');

    let valid = starts_well
        && db.chars().count() + 1 + collection.chars().count() <= MAX_NAMESPACE_LEN
        && !collection.contains('$')
        && !collection.starts_with(RESERVED_COLLECTION_PREFIX)
        && !has_illegal_character(collection);

    if !valid {
        return Err(Error::InvalidNamespace(format!(
            "Invalid collection name specified '{}'",
            collection
        )));
    }
    Ok(())
}

/// A position in the instance → database → collection hierarchy.
///
/// Prefix composition is pure; validation is a separate step so that handles can
/// be created fluently and fail on first use.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    instance: String,
    database: Option<String>,
    collection: Option<String>,
}

impl Namespace {
    /// Namespace of a whole instance.
    pub fn instance(name: impl Into<String>) -> Self {
        Self {
            instance: name.into(),
            database: None,
            collection: None,
        }
    }

    /// Child namespace for a database of this instance.
    pub fn database(&self, name: impl Into<String>) -> Self {
        Self {
            instance: self.instance.clone(),
            database: Some(name.into()),
            collection: None,
        }
    }

    /// Child namespace for a collection of this namespace's database.
    ///
    /// A collection created from an instance-level namespace gets an empty
    /// database name, which fails validation.
    pub fn collection(&self, name: impl Into<String>) -> Self {
        Self {
            instance: self.instance.clone(),
            database: Some(self.database.clone().unwrap_or_default()),
            collection: Some(name.into()),
        }
    }

    pub fn instance_name(&self) -> &str {
        &self.instance
    }

    pub fn database_name(&self) -> Option<&str> {
        self.database.as_deref()
    }

    pub fn collection_name(&self) -> Option<&str> {
        self.collection.as_deref()
    }

    /// The storage key prefix shared by every key in this namespace.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use lumendb::namespace::Namespace;
    ///
    /// let ns = Namespace::instance("prod").database("shop").collection("orders");
    /// assert_eq!(ns.prefix(), "prod/shop/orders/");
    /// ```
    pub fn prefix(&self) -> String {
        let mut prefix = format!("{}{}", self.instance, KEY_DELIMITER);
        if let Some(db) = &self.database {
            prefix.push_str(db);
            prefix.push_str(KEY_DELIMITER);
        }
        if let Some(collection) = &self.collection {
            prefix.push_str(collection);
            prefix.push_str(KEY_DELIMITER);
        }
        prefix
    }

    /// The storage key of a document in this namespace.
    pub fn key(&self, id: &str) -> String {
        format!("{}{}", self.prefix(), id)
    }

    /// Validates every name in the namespace.
    pub fn validate(&self) -> Result<()> {
        validate_instance_name(&self.instance)?;
        if let Some(db) = &self.database {
            validate_database_name(db)?;
            if let Some(collection) = &self.collection {
                validate_collection_name(db, collection)?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.instance)?;
        if let Some(db) = &self.database {
            write!(f, ".{}", db)?;
        }
        if let Some(collection) = &self.collection {
            write!(f, ".{}", collection)?;
        }
        Ok(())
    }
}
