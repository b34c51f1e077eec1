//! Documents and structural equality.
//!
//! A document is a JSON object with one reserved field, `_id`, which holds the
//! document's string identifier. Documents are stored one per object-store key:
//!
//! ```text
//! <instance>/<database>/<collection>/<_id>
//! ```

use serde_json::{Map, Number, Value};
use std::cmp::Ordering;

use crate::error::{Error, Result};

/// A document: an arbitrarily shaped mapping from field name to value.
pub type Document = Map<String, Value>;

/// Reserved identifier field.
pub const ID_FIELD: &str = "_id";

/// Returns the document's `_id` when it is set.
///
/// Missing, `null` and empty-string ids count as unset. Any other non-string id
/// is rejected, since ids become part of the storage key.
pub fn document_id(document: &Document) -> Result<Option<&str>> {
    match document.get(ID_FIELD) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(id)) if id.is_empty() => Ok(None),
        Some(Value::String(id)) => Ok(Some(id)),
        Some(other) => Err(Error::InvalidArgument(format!(
            "_id must be a string, got {}",
            other
        ))),
    }
}

/// Converts a JSON value into a document.
pub fn into_document(value: Value) -> Result<Document> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(Error::InvalidArgument(format!(
            "Expected a JSON object, got {}",
            other
        ))),
    }
}

/// Deep structural equality over arbitrary JSON values.
///
/// Numbers compare by numeric value, so `1` equals `1.0`. Objects compare
/// key-by-key regardless of key order.
pub fn deep_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y).is_eq(),
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| deep_equal(a, b))
        }
        (Value::Object(x), Value::Object(y)) => documents_equal(x, y),
        _ => a == b,
    }
}

/// Numeric order without rounding integers through `f64`.
///
/// Integers (signed or unsigned) compare exactly; the float path is taken only
/// when at least one side is a float.
pub fn compare_numbers(a: &Number, b: &Number) -> Ordering {
    match (exact_integer(a), exact_integer(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(x), None) => compare_integer_float(x, b.as_f64().unwrap_or(f64::NAN)),
        (None, Some(y)) => compare_integer_float(y, a.as_f64().unwrap_or(f64::NAN)).reverse(),
        (None, None) => {
            let x = a.as_f64().unwrap_or(f64::NAN);
            let y = b.as_f64().unwrap_or(f64::NAN);
            x.total_cmp(&y)
        }
    }
}

fn exact_integer(n: &Number) -> Option<i128> {
    n.as_i64()
        .map(i128::from)
        .or_else(|| n.as_u64().map(i128::from))
}

fn compare_integer_float(int: i128, float: f64) -> Ordering {
    // 2^127, the first float past the i128 range.
    const LIMIT: f64 = 170_141_183_460_469_231_731_687_303_715_884_105_728.0;
    if float.is_nan() || float >= LIMIT {
        return Ordering::Less;
    }
    if float < -LIMIT {
        return Ordering::Greater;
    }
    let whole = float.trunc();
    int.cmp(&(whole as i128))
        .then_with(|| 0.0_f64.partial_cmp(&(float - whole)).unwrap_or(Ordering::Equal))
}

/// Deep structural equality between two documents.
pub fn documents_equal(a: &Document, b: &Document) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .all(|(key, value)| b.get(key).is_some_and(|other| deep_equal(value, other)))
}
