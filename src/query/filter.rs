//! Filter compilation.
//!
//! A filter document compiles into a [`Condition`] tree once; the tree is then
//! evaluated against every candidate document. Supported shapes:
//!
//! ```json
//! { "first": "Jane" }                              // implicit $eq
//! { "age": { "$gte": 18, "$lt": 65 } }             // field operators
//! { "$or": [ { "first": "Jane" }, { "tags": "vip" } ] }
//! { "address.city": { "$in": ["Oslo", "Bergen"] } }
//! ```

use serde_json::Value;
use std::cmp::Ordering;

use crate::document::{deep_equal, Document};
use crate::error::{Error, Result};
use crate::query::value::{compare_values, is_truthy, lookup, type_rank};

/// A compiled filter.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Every child matches. An empty filter compiles to `All(vec![])`.
    All(Vec<Condition>),
    Any(Vec<Condition>),
    NoneOf(Vec<Condition>),
    Field { path: String, ops: Vec<FieldOp> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldOp {
    Eq(Value),
    Ne(Value),
    Compare(Ordering, bool, Value),
    In(Vec<Value>),
    Nin(Vec<Value>),
    Exists(bool),
    Not(Vec<FieldOp>),
}

pub fn compile(filter: &Document) -> Result<Condition> {
    let mut conditions = Vec::with_capacity(filter.len());
    for (key, value) in filter {
        conditions.push(compile_entry(key, value)?);
    }
    Ok(Condition::All(conditions))
}

fn compile_entry(key: &str, value: &Value) -> Result<Condition> {
    match key {
        "$and" => Ok(Condition::All(compile_list(key, value)?)),
        "$or" => Ok(Condition::Any(compile_list(key, value)?)),
        "$nor" => Ok(Condition::NoneOf(compile_list(key, value)?)),
        op if op.starts_with('$') => Err(Error::UnsupportedOperation(op.to_string())),
        path => Ok(Condition::Field {
            path: path.to_string(),
            ops: compile_field(value)?,
        }),
    }
}

fn compile_list(op: &str, value: &Value) -> Result<Vec<Condition>> {
    let items = value
        .as_array()
        .filter(|items| !items.is_empty())
        .ok_or_else(|| Error::InvalidArgument(format!("{} must be a nonempty array", op)))?;
    items
        .iter()
        .map(|item| match item {
            Value::Object(filter) => compile(filter),
            _ => Err(Error::InvalidArgument(format!(
                "{} entries must be objects",
                op
            ))),
        })
        .collect()
}

/// Whether `value` is an operator expression like `{"$gt": 1}`.
///
/// Objects mixing operators with plain fields are rejected.
fn is_operator_object(value: &Value) -> Result<bool> {
    let Value::Object(map) = value else {
        return Ok(false);
    };
    let operators = map.keys().filter(|key| key.starts_with('$')).count();
    if operators > 0 && operators < map.len() {
        return Err(Error::InvalidArgument(format!(
            "Cannot mix operators and fields in {}",
            value
        )));
    }
    Ok(operators > 0)
}

fn compile_field(value: &Value) -> Result<Vec<FieldOp>> {
    let Value::Object(operators) = value else {
        return Ok(vec![FieldOp::Eq(value.clone())]);
    };
    if !is_operator_object(value)? {
        return Ok(vec![FieldOp::Eq(value.clone())]);
    }

    operators
        .iter()
        .map(|(op, operand)| compile_operator(op, operand))
        .collect()
}

fn compile_operator(op: &str, operand: &Value) -> Result<FieldOp> {
    let op = match op {
        "$eq" => FieldOp::Eq(operand.clone()),
        "$ne" => FieldOp::Ne(operand.clone()),
        "$gt" => FieldOp::Compare(Ordering::Greater, false, operand.clone()),
        "$gte" => FieldOp::Compare(Ordering::Greater, true, operand.clone()),
        "$lt" => FieldOp::Compare(Ordering::Less, false, operand.clone()),
        "$lte" => FieldOp::Compare(Ordering::Less, true, operand.clone()),
        "$in" => FieldOp::In(array_operand(op, operand)?),
        "$nin" => FieldOp::Nin(array_operand(op, operand)?),
        "$exists" => FieldOp::Exists(is_truthy(operand)),
        "$not" => {
            if !is_operator_object(operand)? {
                return Err(Error::InvalidArgument(
                    "$not needs an operator expression".to_string(),
                ));
            }
            FieldOp::Not(compile_field(operand)?)
        }
        other => return Err(Error::UnsupportedOperation(other.to_string())),
    };
    Ok(op)
}

fn array_operand(op: &str, operand: &Value) -> Result<Vec<Value>> {
    operand
        .as_array()
        .cloned()
        .ok_or_else(|| Error::InvalidArgument(format!("{} needs an array", op)))
}

impl Condition {
    pub fn matches(&self, document: &Document) -> bool {
        match self {
            Condition::All(children) => children.iter().all(|c| c.matches(document)),
            Condition::Any(children) => children.iter().any(|c| c.matches(document)),
            Condition::NoneOf(children) => !children.iter().any(|c| c.matches(document)),
            Condition::Field { path, ops } => {
                let values = lookup(document, path);
                ops.iter().all(|op| op.matches(&values))
            }
        }
    }
}

impl FieldOp {
    fn matches(&self, values: &[&Value]) -> bool {
        match self {
            FieldOp::Eq(expected) => equals_any(values, expected),
            FieldOp::Ne(expected) => !equals_any(values, expected),
            FieldOp::Compare(direction, inclusive, bound) => values
                .iter()
                .flat_map(|v| candidates(v))
                .any(|v| satisfies(v, *direction, *inclusive, bound)),
            FieldOp::In(options) => options.iter().any(|o| equals_any(values, o)),
            FieldOp::Nin(options) => !options.iter().any(|o| equals_any(values, o)),
            FieldOp::Exists(expected) => !values.is_empty() == *expected,
            FieldOp::Not(ops) => !ops.iter().all(|op| op.matches(values)),
        }
    }
}

/// A value plus, for arrays, each of its elements.
fn candidates<'a>(value: &'a Value) -> Box<dyn Iterator<Item = &'a Value> + 'a> {
    match value {
        Value::Array(items) => Box::new(std::iter::once(value).chain(items.iter())),
        _ => Box::new(std::iter::once(value)),
    }
}

/// Equality with the usual document-database twists: a missing field equals
/// `null`, and an array field equals any of its elements.
fn equals_any(values: &[&Value], expected: &Value) -> bool {
    if values.is_empty() {
        return expected.is_null();
    }
    values
        .iter()
        .flat_map(|v| candidates(v))
        .any(|v| deep_equal(v, expected))
}

/// Range comparisons only hold between values of the same type.
fn satisfies(value: &Value, direction: Ordering, inclusive: bool, bound: &Value) -> bool {
    if type_rank(value) != type_rank(bound) {
        return false;
    }
    let ord = compare_values(value, bound);
    ord == direction || (inclusive && ord == Ordering::Equal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        crate::document::into_document(value).unwrap()
    }

    fn matches(filter: Value, document: Value) -> bool {
        compile(&doc(filter)).unwrap().matches(&doc(document))
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        assert!(matches(json!({}), json!({"a": 1})));
    }

    #[test]
    fn test_implicit_equality() {
        assert!(matches(json!({"first": "Jane"}), json!({"first": "Jane"})));
        assert!(!matches(json!({"first": "Jane"}), json!({"first": "John"})));
        assert!(matches(json!({"n": 1}), json!({"n": 1.0})));
        assert!(matches(
            json!({"address": {"city": "Oslo"}}),
            json!({"address": {"city": "Oslo"}})
        ));
    }

    #[test]
    fn test_missing_field_equals_null() {
        assert!(matches(json!({"x": null}), json!({"a": 1})));
        assert!(!matches(json!({"x": {"$ne": null}}), json!({"a": 1})));
    }

    #[test]
    fn test_array_element_matching() {
        assert!(matches(json!({"tags": "vip"}), json!({"tags": ["new", "vip"]})));
        assert!(matches(json!({"tags": ["new", "vip"]}), json!({"tags": ["new", "vip"]})));
        assert!(matches(json!({"scores": {"$gt": 90}}), json!({"scores": [50, 95]})));
        assert!(matches(
            json!({"items.sku": "b"}),
            json!({"items": [{"sku": "a"}, {"sku": "b"}]})
        ));
    }

    #[test]
    fn test_comparison_operators() {
        let d = json!({"age": 30, "name": "Jane"});
        assert!(matches(json!({"age": {"$gt": 18}}), d.clone()));
        assert!(matches(json!({"age": {"$gte": 30, "$lte": 30}}), d.clone()));
        assert!(!matches(json!({"age": {"$lt": 30}}), d.clone()));
        assert!(!matches(json!({"age": {"$gt": "10"}}), d.clone()));
        assert!(matches(json!({"name": {"$gt": "A"}}), d));
    }

    #[test]
    fn test_in_and_nin() {
        let filter = json!({"first": {"$in": ["Jane", "John"]}});
        assert!(matches(filter.clone(), json!({"first": "Jane"})));
        assert!(!matches(filter, json!({"first": "Joe"})));
        assert!(matches(json!({"first": {"$nin": ["Jane"]}}), json!({"first": "Joe"})));
        assert!(matches(json!({"x": {"$in": [null]}}), json!({})));
    }

    #[test]
    fn test_exists() {
        assert!(matches(json!({"a": {"$exists": true}}), json!({"a": null})));
        assert!(matches(json!({"b": {"$exists": false}}), json!({"a": 1})));
        assert!(!matches(json!({"a": {"$exists": 0}}), json!({"a": 1})));
    }

    #[test]
    fn test_logical_operators() {
        let d = json!({"first": "Jane", "last": "Doe"});
        assert!(matches(
            json!({"$or": [{"first": "John"}, {"last": "Doe"}]}),
            d.clone()
        ));
        assert!(matches(
            json!({"$and": [{"first": "Jane"}, {"last": "Doe"}]}),
            d.clone()
        ));
        assert!(!matches(json!({"$nor": [{"first": "Jane"}]}), d.clone()));
        assert!(matches(json!({"first": {"$not": {"$eq": "John"}}}), d));
    }

    #[test]
    fn test_unknown_operator_is_unsupported() {
        let err = compile(&doc(json!({"a": {"$bad": 1}}))).unwrap_err();
        assert_eq!(err.to_string(), "Unsupported operation: $bad");

        let err = compile(&doc(json!({"$where": "true"}))).unwrap_err();
        assert_eq!(err.code(), "UnsupportedOperation");
    }

    #[test]
    fn test_malformed_operands() {
        assert!(compile(&doc(json!({"a": {"$in": 1}}))).is_err());
        assert!(compile(&doc(json!({"$or": []}))).is_err());
        assert!(compile(&doc(json!({"$or": [1]}))).is_err());
        assert!(compile(&doc(json!({"a": {"$not": 5}}))).is_err());
    }

    #[test]
    fn test_mixed_operator_object_is_rejected() {
        for filter in [
            json!({"a": {"$gt": 1, "b": 2}}),
            json!({"a": {"b": 2, "$gt": 1}}),
            json!({"a": {"$not": {"$eq": 1, "b": 2}}}),
        ] {
            let err = compile(&doc(filter)).unwrap_err();
            assert_eq!(err.code(), "InvalidArgument");
            assert!(err.to_string().contains("Cannot mix operators and fields"));
        }

        assert!(matches(json!({"a": {"b": 2}}), json!({"a": {"b": 2}})));
        assert!(matches(json!({"a": {"$gt": 1, "$lt": 3}}), json!({"a": 2})));
    }
}
