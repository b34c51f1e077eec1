//! Field projection.
//!
//! A projection is either inclusive (`{"first": 1}`) or exclusive
//! (`{"tmp": 0}`); the two cannot be mixed, except that `_id` may be excluded
//! from an inclusive projection.

use serde_json::Value;

use crate::document::{Document, ID_FIELD};
use crate::error::{Error, Result};
use crate::query::value::{get_path, is_truthy, remove_path, set_path};

pub fn apply_projection(projection: &Document, document: &Document) -> Result<Document> {
    let mut include = Vec::new();
    let mut exclude = Vec::new();
    let mut keep_id = true;

    for (field, flag) in projection {
        let wanted = match flag {
            Value::Bool(_) | Value::Number(_) => is_truthy(flag),
            Value::Object(spec) => {
                let op = spec.keys().next().cloned().unwrap_or_default();
                return Err(Error::UnsupportedOperation(op));
            }
            other => {
                return Err(Error::InvalidArgument(format!(
                    "Projection value for '{}' must be 0 or 1, got {}",
                    field, other
                )))
            }
        };
        if field == ID_FIELD {
            keep_id = wanted;
        } else if wanted {
            include.push(field.as_str());
        } else {
            exclude.push(field.as_str());
        }
    }

    if !include.is_empty() && !exclude.is_empty() {
        return Err(Error::InvalidArgument(
            "Projection cannot mix inclusion and exclusion".to_string(),
        ));
    }

    let mut projected = if include.is_empty() {
        let mut copy = document.clone();
        for path in exclude {
            remove_path(&mut copy, path);
        }
        copy
    } else {
        let mut out = Document::new();
        if let Some(id) = document.get(ID_FIELD) {
            out.insert(ID_FIELD.to_string(), id.clone());
        }
        for path in include {
            if let Some(value) = get_path(document, path) {
                set_path(&mut out, path, value.clone())?;
            }
        }
        out
    };

    if !keep_id {
        projected.remove(ID_FIELD);
    }
    Ok(projected)
}
