//! Update operator compilation and application.

use serde_json::{Number, Value};
use std::cmp::Ordering;

use crate::document::Document;
use crate::error::{Error, Result};
use crate::query::value::{compare_values, get_path, remove_path, set_path};

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOp {
    Set(String, Value),
    Unset(String),
    Inc(String, Number),
    Mul(String, Number),
    Min(String, Value),
    Max(String, Value),
    Rename(String, String),
    Push(String, Vec<Value>),
}

/// Compiles an update expression such as `{"$set": {"a": 1}, "$inc": {"n": 2}}`.
///
/// Every top-level key must be a known operator; a bare field name is rejected
/// as an unsupported operation.
pub fn compile(update: &Document) -> Result<Vec<UpdateOp>> {
    let mut ops = Vec::new();
    for (operator, fields) in update {
        let Value::Object(fields) = fields else {
            if !is_known(operator) {
                return Err(Error::UnsupportedOperation(operator.clone()));
            }
            return Err(Error::InvalidArgument(format!(
                "Modifier {} needs an object of fields",
                operator
            )));
        };
        for (path, operand) in fields {
            ops.push(compile_op(operator, path, operand)?);
        }
    }
    Ok(ops)
}

fn is_known(operator: &str) -> bool {
    matches!(
        operator,
        "$set" | "$unset" | "$inc" | "$mul" | "$min" | "$max" | "$rename" | "$push"
    )
}

fn compile_op(operator: &str, path: &str, operand: &Value) -> Result<UpdateOp> {
    let path = path.to_string();
    let op = match operator {
        "$set" => UpdateOp::Set(path, operand.clone()),
        "$unset" => UpdateOp::Unset(path),
        "$inc" => UpdateOp::Inc(path, number_operand(operator, operand)?),
        "$mul" => UpdateOp::Mul(path, number_operand(operator, operand)?),
        "$min" => UpdateOp::Min(path, operand.clone()),
        "$max" => UpdateOp::Max(path, operand.clone()),
        "$rename" => {
            let target = operand.as_str().ok_or_else(|| {
                Error::InvalidArgument(format!("$rename target for '{}' must be a string", path))
            })?;
            UpdateOp::Rename(path, target.to_string())
        }
        "$push" => {
            let items = match operand {
                Value::Object(spec) if spec.contains_key("$each") => spec
                    .get("$each")
                    .and_then(Value::as_array)
                    .cloned()
                    .ok_or_else(|| Error::InvalidArgument("$each needs an array".to_string()))?,
                other => vec![other.clone()],
            };
            UpdateOp::Push(path, items)
        }
        other => return Err(Error::UnsupportedOperation(other.to_string())),
    };
    Ok(op)
}

fn number_operand(operator: &str, operand: &Value) -> Result<Number> {
    match operand {
        Value::Number(n) => Ok(n.clone()),
        other => Err(Error::InvalidArgument(format!(
            "{} needs a numeric operand, got {}",
            operator, other
        ))),
    }
}

/// Applies compiled operators to `document`, in order.
pub fn apply(ops: &[UpdateOp], document: &mut Document) -> Result<()> {
    for op in ops {
        match op {
            UpdateOp::Set(path, value) => set_path(document, path, value.clone())?,
            UpdateOp::Unset(path) => {
                remove_path(document, path);
            }
            UpdateOp::Inc(path, by) => {
                let next = match get_path(document, path) {
                    None => Value::Number(by.clone()),
                    Some(current) => arithmetic(path, current, by, i64::checked_add, |a, b| a + b)?,
                };
                set_path(document, path, next)?;
            }
            UpdateOp::Mul(path, by) => {
                let next = match get_path(document, path) {
                    None if by.is_f64() => Value::from(0.0),
                    None => Value::from(0),
                    Some(current) => arithmetic(path, current, by, i64::checked_mul, |a, b| a * b)?,
                };
                set_path(document, path, next)?;
            }
            UpdateOp::Min(path, bound) => replace_if(document, path, bound, Ordering::Less)?,
            UpdateOp::Max(path, bound) => replace_if(document, path, bound, Ordering::Greater)?,
            UpdateOp::Rename(from, to) => {
                if let Some(value) = remove_path(document, from) {
                    set_path(document, to, value)?;
                }
            }
            UpdateOp::Push(path, items) => {
                let mut array = match get_path(document, path) {
                    None => Vec::new(),
                    Some(Value::Array(existing)) => existing.clone(),
                    Some(other) => {
                        return Err(Error::InvalidArgument(format!(
                            "$push target '{}' is not an array: {}",
                            path, other
                        )))
                    }
                };
                array.extend(items.iter().cloned());
                set_path(document, path, Value::Array(array))?;
            }
        }
    }
    Ok(())
}

fn arithmetic(
    path: &str,
    current: &Value,
    operand: &Number,
    integer: fn(i64, i64) -> Option<i64>,
    float: fn(f64, f64) -> f64,
) -> Result<Value> {
    let Value::Number(current) = current else {
        return Err(Error::InvalidArgument(format!(
            "Cannot apply arithmetic to non-numeric field '{}'",
            path
        )));
    };
    if let (Some(a), Some(b)) = (current.as_i64(), operand.as_i64()) {
        if let Some(result) = integer(a, b) {
            return Ok(Value::from(result));
        }
    }
    let a = current.as_f64().unwrap_or(f64::NAN);
    let b = operand.as_f64().unwrap_or(f64::NAN);
    Number::from_f64(float(a, b))
        .map(Value::Number)
        .ok_or_else(|| Error::InvalidArgument(format!("Result for '{}' is not finite", path)))
}

fn replace_if(document: &mut Document, path: &str, bound: &Value, wanted: Ordering) -> Result<()> {
    let replace = match get_path(document, path) {
        None => true,
        Some(current) => compare_values(bound, current) == wanted,
    };
    if replace {
        set_path(document, path, bound.clone())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        crate::document::into_document(value).unwrap()
    }

    fn updated(update: Value, document: Value) -> Result<Document> {
        let ops = compile(&doc(update))?;
        let mut document = doc(document);
        apply(&ops, &mut document)?;
        Ok(document)
    }

    #[test]
    fn test_set_and_unset() -> Result<()> {
        let result = updated(
            json!({"$set": {"last": "Goodall", "address.city": "Oslo"}, "$unset": {"tmp": ""}}),
            json!({"_id": "1", "last": "Doe", "tmp": 1}),
        )?;
        assert_eq!(
            result,
            doc(json!({"_id": "1", "last": "Goodall", "address": {"city": "Oslo"}}))
        );
        Ok(())
    }

    #[test]
    fn test_set_on_empty_document() -> Result<()> {
        let result = updated(json!({"$set": {"first": "Jane"}}), json!({}))?;
        assert_eq!(result, doc(json!({"first": "Jane"})));
        Ok(())
    }

    #[test]
    fn test_inc_and_mul() -> Result<()> {
        let result = updated(
            json!({"$inc": {"n": 2, "missing": 5, "f": 0.5}, "$mul": {"m": 3, "z": 4}}),
            json!({"n": 1, "f": 1, "m": 2}),
        )?;
        assert_eq!(
            result,
            doc(json!({"n": 3, "missing": 5, "f": 1.5, "m": 6, "z": 0}))
        );

        assert!(updated(json!({"$inc": {"s": 1}}), json!({"s": "x"})).is_err());
        assert!(compile(&doc(json!({"$inc": {"n": "1"}}))).is_err());
        Ok(())
    }

    #[test]
    fn test_min_max() -> Result<()> {
        let result = updated(
            json!({"$min": {"low": 1, "new": 7}, "$max": {"high": 10, "keep": 0}}),
            json!({"low": 5, "high": 5, "keep": 3}),
        )?;
        assert_eq!(
            result,
            doc(json!({"low": 1, "high": 10, "keep": 3, "new": 7}))
        );
        Ok(())
    }

    #[test]
    fn test_rename_and_push() -> Result<()> {
        let result = updated(
            json!({"$rename": {"nick": "alias"}, "$push": {"tags": "a", "more": {"$each": [1, 2]}}}),
            json!({"nick": "JJ", "tags": ["z"]}),
        )?;
        assert_eq!(
            result,
            doc(json!({"alias": "JJ", "tags": ["z", "a"], "more": [1, 2]}))
        );
        assert!(updated(json!({"$push": {"s": 1}}), json!({"s": "x"})).is_err());
        Ok(())
    }

    #[test]
    fn test_bare_fields_are_unsupported() {
        let err = compile(&doc(json!({"last": "Goodall"}))).unwrap_err();
        assert_eq!(err.to_string(), "Unsupported operation: last");

        let err = compile(&doc(json!({"$bad": {"a": 1}}))).unwrap_err();
        assert_eq!(err.code(), "UnsupportedOperation");
    }

    #[test]
    fn test_noop_update_leaves_document_equal() -> Result<()> {
        let original = json!({"_id": "1", "last": "Doe"});
        let result = updated(json!({"$set": {"last": "Doe"}}), original.clone())?;
        assert!(crate::document::documents_equal(&result, &doc(original)));
        Ok(())
    }
}
