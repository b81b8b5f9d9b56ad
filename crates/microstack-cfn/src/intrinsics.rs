//! Intrinsic resolution at resource materialisation time.
//!
//! Recognised forms:
//! - `{"Ref": "<logicalId>"}` resolves to the target's physical id; the
//!   target must already have completed.
//! - `{"Fn::GetAtt": "<logicalId>.Arn"}` or `{"Fn::GetAtt": ["<logicalId>",
//!   "Arn"]}` resolves to a type-specific ARN. Only `Arn` is supported.
//!
//! Any other `Fn::*` form is rejected at template validation, so resolution
//! here only ever sees the two supported shapes.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::error::{StackError, StackResult};
use crate::template::{TYPE_BUCKET, TYPE_LAMBDA_FUNCTION, TYPE_LOG_GROUP};

/// What resolution knows about an already-created sibling resource.
#[derive(Debug, Clone)]
pub struct ResolvedResource {
    /// The resource's physical id.
    pub physical_id: String,
    /// The resource's type string.
    pub resource_type: String,
}

/// Resolve every intrinsic in a property mapping.
///
/// # Errors
///
/// Returns a validation [`StackError`] when a `Ref` target has not
/// completed, a `Fn::GetAtt` requests an attribute other than `Arn`, or the
/// placeholder is malformed.
pub fn resolve_properties(
    properties: &Map<String, Value>,
    completed: &HashMap<String, ResolvedResource>,
) -> StackResult<Map<String, Value>> {
    let mut resolved = Map::with_capacity(properties.len());
    for (key, value) in properties {
        resolved.insert(key.clone(), resolve_value(value, completed)?);
    }
    Ok(resolved)
}

fn resolve_value(
    value: &Value,
    completed: &HashMap<String, ResolvedResource>,
) -> StackResult<Value> {
    match value {
        Value::Object(map) => {
            if map.len() == 1 {
                if let Some(target) = map.get("Ref") {
                    return resolve_ref(target, completed);
                }
                if let Some(target) = map.get("Fn::GetAtt") {
                    return resolve_get_att(target, completed);
                }
            }
            let mut resolved = Map::with_capacity(map.len());
            for (key, nested) in map {
                resolved.insert(key.clone(), resolve_value(nested, completed)?);
            }
            Ok(Value::Object(resolved))
        }
        Value::Array(items) => {
            let resolved: StackResult<Vec<Value>> =
                items.iter().map(|v| resolve_value(v, completed)).collect();
            Ok(Value::Array(resolved?))
        }
        other => Ok(other.clone()),
    }
}

fn resolve_ref(
    target: &Value,
    completed: &HashMap<String, ResolvedResource>,
) -> StackResult<Value> {
    let Value::String(logical_id) = target else {
        return Err(StackError::validation("Ref target must be a string"));
    };
    let resource = completed.get(logical_id).ok_or_else(|| {
        StackError::validation(format!(
            "Ref target {logical_id} has not been created yet"
        ))
    })?;
    Ok(Value::String(resource.physical_id.clone()))
}

fn resolve_get_att(
    target: &Value,
    completed: &HashMap<String, ResolvedResource>,
) -> StackResult<Value> {
    let (logical_id, attribute) = match target {
        Value::String(dotted) => dotted.split_once('.').ok_or_else(|| {
            StackError::validation(format!(
                "Fn::GetAtt must be of the form logicalId.attribute, got '{dotted}'"
            ))
        })?,
        Value::Array(items) => match items.as_slice() {
            [Value::String(id), Value::String(attr)] => (id.as_str(), attr.as_str()),
            _ => {
                return Err(StackError::validation(
                    "Fn::GetAtt must be [logicalId, attribute]",
                ));
            }
        },
        _ => {
            return Err(StackError::validation(
                "Fn::GetAtt must be a string or a two-element list",
            ));
        }
    };

    if attribute != "Arn" {
        return Err(StackError::validation(format!(
            "Fn::GetAtt only supports the Arn attribute, got '{attribute}'"
        )));
    }

    let resource = completed.get(logical_id).ok_or_else(|| {
        StackError::validation(format!(
            "Fn::GetAtt target {logical_id} has not been created yet"
        ))
    })?;

    Ok(Value::String(resource_arn(resource)?))
}

/// Type-specific ARN for a created resource.
fn resource_arn(resource: &ResolvedResource) -> StackResult<String> {
    match resource.resource_type.as_str() {
        TYPE_LAMBDA_FUNCTION => Ok(microstack_core::function_arn(&resource.physical_id)),
        TYPE_LOG_GROUP => Ok(microstack_core::log_group_arn(&resource.physical_id)),
        TYPE_BUCKET => Ok(format!("arn:aws:s3:::{}", resource.physical_id)),
        other => Err(StackError::validation(format!(
            "Fn::GetAtt is not supported for resource type {other}"
        ))),
    }
}
