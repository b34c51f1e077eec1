//! Sort specifications.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

use crate::document::Document;
use crate::query::value::{compare_values, get_path};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    fn apply(self, ord: Ordering) -> Ordering {
        match self {
            SortDirection::Ascending => ord,
            SortDirection::Descending => ord.reverse(),
        }
    }
}

/// One sort key. Serializes as a `[field, 1 | -1]` pair, e.g. `[["first", 1]]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "(String, i64)", into = "(String, i64)")]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Descending,
        }
    }
}

impl TryFrom<(String, i64)> for SortKey {
    type Error = String;

    fn try_from((field, direction): (String, i64)) -> Result<Self, Self::Error> {
        match direction {
            1 => Ok(Self::ascending(field)),
            -1 => Ok(Self::descending(field)),
            other => Err(format!(
                "Sort direction for '{}' must be 1 or -1, got {}",
                field, other
            )),
        }
    }
}

impl From<SortKey> for (String, i64) {
    fn from(key: SortKey) -> Self {
        let direction = match key.direction {
            SortDirection::Ascending => 1,
            SortDirection::Descending => -1,
        };
        (key.field, direction)
    }
}

/// Compares two documents key by key. Missing fields sort as `null`.
pub fn compare_documents(sort: &[SortKey], a: &Document, b: &Document) -> Ordering {
    for key in sort {
        let left = get_path(a, &key.field).unwrap_or(&Value::Null);
        let right = get_path(b, &key.field).unwrap_or(&Value::Null);
        let ord = key.direction.apply(compare_values(left, right));
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}
