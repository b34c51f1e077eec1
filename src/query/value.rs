//! Path access and ordering over JSON values.

use serde_json::{Map, Value};
use std::cmp::Ordering;

use crate::document::{compare_numbers, Document};
use crate::error::{Error, Result};

/// Resolves a dotted path without descending into arrays of objects.
///
/// Numeric segments index into arrays, so `tags.0` is the first tag.
pub fn get_path<'a>(document: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Resolves a dotted path for matching.
///
/// Unlike [`get_path`], a non-numeric segment applied to an array fans out over
/// the array's elements, so `items.sku` yields the `sku` of every item.
pub fn lookup<'a>(document: &'a Document, path: &str) -> Vec<&'a Value> {
    let segments: Vec<&str> = path.split('.').collect();
    let mut found = Vec::new();
    if let Some(first) = document.get(segments[0]) {
        collect(first, &segments[1..], &mut found);
    }
    found
}

fn collect<'a>(value: &'a Value, rest: &[&str], found: &mut Vec<&'a Value>) {
    let Some((segment, tail)) = rest.split_first() else {
        found.push(value);
        return;
    };
    match value {
        Value::Object(map) => {
            if let Some(next) = map.get(*segment) {
                collect(next, tail, found);
            }
        }
        Value::Array(items) => match segment.parse::<usize>() {
            Ok(index) => {
                if let Some(next) = items.get(index) {
                    collect(next, tail, found);
                }
            }
            Err(_) => {
                for item in items.iter().filter(|item| item.is_object()) {
                    collect(item, rest, found);
                }
            }
        },
        _ => {}
    }
}

/// Sets a dotted path, creating intermediate objects as needed.
pub fn set_path(document: &mut Document, path: &str, value: Value) -> Result<()> {
    let (parents, last) = split_path(path);
    let mut current = document;
    for segment in parents {
        let next = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        current = match next {
            Value::Object(map) => map,
            other => {
                return Err(Error::InvalidArgument(format!(
                    "Cannot create field '{}' in element {{{}: {}}}",
                    last, segment, other
                )))
            }
        };
    }
    current.insert(last.to_string(), value);
    Ok(())
}

/// Removes a dotted path, returning the removed value.
pub fn remove_path(document: &mut Document, path: &str) -> Option<Value> {
    let (parents, last) = split_path(path);
    let mut current = document;
    for segment in parents {
        current = current.get_mut(segment)?.as_object_mut()?;
    }
    current.remove(last)
}

fn split_path(path: &str) -> (Vec<&str>, &str) {
    let mut segments: Vec<&str> = path.split('.').collect();
    let last = segments.pop().unwrap_or_default();
    (segments, last)
}

/// Rank of a value's type in the cross-type ordering.
pub fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Object(_) => 3,
        Value::Array(_) => 4,
        Value::Bool(_) => 5,
    }
}

/// Total order over JSON values: null < numbers < strings < objects < arrays < booleans.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => x
            .iter()
            .zip(y)
            .map(|(a, b)| compare_values(a, b))
            .find(|ord| ord.is_ne())
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        (Value::Object(x), Value::Object(y)) => x
            .iter()
            .zip(y)
            .map(|((ka, va), (kb, vb))| ka.cmp(kb).then_with(|| compare_values(va, vb)))
            .find(|ord| ord.is_ne())
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Truthiness used by `$exists` and projections: `false`, `0` and `null` are false.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        _ => true,
    }
}
