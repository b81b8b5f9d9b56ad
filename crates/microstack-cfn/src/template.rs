//! Template parsing and validation.
//!
//! A template body is first attempted as JSON, then as YAML. It must be a
//! mapping with a `Resources` mapping; each resource carries a non-empty
//! `Type`, an optional `Properties` mapping, and an optional `DependsOn`
//! (string or list of strings referencing other logical ids). Resource
//! order in the template is preserved; it seeds the topological sort.
//!
//! Per-type property validation runs for the supported types; a resource
//! of an unsupported type passes validation and fails at creation time,
//! which is what puts the stack into `CREATE_FAILED`.

use serde_json::{Map, Value};

use crate::error::{StackError, StackResult};

/// Resource type string for Lambda functions.
pub const TYPE_LAMBDA_FUNCTION: &str = "AWS::Lambda::Function";

/// Resource type string for log groups.
pub const TYPE_LOG_GROUP: &str = "AWS::Logs::LogGroup";

/// Resource type string for buckets.
pub const TYPE_BUCKET: &str = "AWS::S3::Bucket";

/// One parsed resource, in template order.
#[derive(Debug, Clone)]
pub struct ResourceSpec {
    /// Logical id: the key in the `Resources` mapping.
    pub logical_id: String,
    /// The `Type` string, verbatim.
    pub resource_type: String,
    /// The `Properties` mapping; empty when absent.
    pub properties: Map<String, Value>,
    /// Logical ids this resource depends on.
    pub depends_on: Vec<String>,
}

/// A parsed and validated template.
#[derive(Debug, Clone)]
pub struct Template {
    /// Resources in first-appearance order.
    pub resources: Vec<ResourceSpec>,
}

impl Template {
    /// Look up a resource by logical id.
    #[must_use]
    pub fn resource(&self, logical_id: &str) -> Option<&ResourceSpec> {
        self.resources.iter().find(|r| r.logical_id == logical_id)
    }
}

/// Parse and validate a template body.
///
/// # Errors
///
/// Returns a validation [`StackError`] for unparseable bodies, structural
/// violations, bad `DependsOn` references, unsupported intrinsic forms, or
/// per-type property violations.
pub fn parse_template(body: &str) -> StackResult<Template> {
    let root = parse_body(body)?;

    let Value::Object(root) = root else {
        return Err(StackError::validation("Template must be a mapping"));
    };
    let resources_value = root
        .get("Resources")
        .ok_or_else(|| StackError::validation("Template has no Resources section"))?;
    let Value::Object(resources) = resources_value else {
        return Err(StackError::validation("Resources must be a mapping"));
    };
    if resources.is_empty() {
        return Err(StackError::validation("Resources must not be empty"));
    }

    let mut specs = Vec::with_capacity(resources.len());
    for (logical_id, value) in resources {
        specs.push(parse_resource(logical_id, value)?);
    }

    let template = Template { resources: specs };
    validate_template(&template)?;
    Ok(template)
}

/// Try JSON first, then YAML.
fn parse_body(body: &str) -> StackResult<Value> {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        return Ok(value);
    }
    serde_yaml::from_str::<Value>(body)
        .map_err(|e| StackError::validation(format!("Template body is neither JSON nor YAML: {e}")))
}

/// Parse a single resource entry.
fn parse_resource(logical_id: &str, value: &Value) -> StackResult<ResourceSpec> {
    let Value::Object(entry) = value else {
        return Err(StackError::validation(format!(
            "Resource {logical_id} must be a mapping"
        )));
    };

    let resource_type = match entry.get("Type") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        _ => {
            return Err(StackError::validation(format!(
                "Resource {logical_id} has no Type"
            )));
        }
    };

    let properties = match entry.get("Properties") {
        None => Map::new(),
        Some(Value::Object(map)) => map.clone(),
        Some(_) => {
            return Err(StackError::validation(format!(
                "Properties of {logical_id} must be a mapping"
            )));
        }
    };

    let depends_on = match entry.get("DependsOn") {
        None => Vec::new(),
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => {
            let mut deps = Vec::with_capacity(items.len());
            for item in items {
                let Value::String(s) = item else {
                    return Err(StackError::validation(format!(
                        "DependsOn of {logical_id} must be a string or list of strings"
                    )));
                };
                deps.push(s.clone());
            }
            deps
        }
        Some(_) => {
            return Err(StackError::validation(format!(
                "DependsOn of {logical_id} must be a string or list of strings"
            )));
        }
    };

    Ok(ResourceSpec {
        logical_id: logical_id.to_owned(),
        resource_type,
        properties,
        depends_on,
    })
}

/// Template-wide validation: dependency references, intrinsic forms, and
/// per-type properties for the supported types.
fn validate_template(template: &Template) -> StackResult<()> {
    for resource in &template.resources {
        for dep in &resource.depends_on {
            if template.resource(dep).is_none() {
                return Err(StackError::validation(format!(
                    "Resource {} depends on unknown resource {dep}",
                    resource.logical_id
                )));
            }
        }

        validate_intrinsic_forms(&resource.logical_id, &Value::Object(resource.properties.clone()))?;

        match resource.resource_type.as_str() {
            TYPE_LAMBDA_FUNCTION => validate_lambda_properties(resource)?,
            TYPE_LOG_GROUP => validate_log_group_properties(resource)?,
            TYPE_BUCKET => validate_bucket_properties(resource)?,
            // Unsupported types fail at creation time, not here.
            _ => {}
        }
    }
    Ok(())
}

/// Reject any `Fn::*` form other than `Fn::GetAtt` anywhere in a value.
fn validate_intrinsic_forms(logical_id: &str, value: &Value) -> StackResult<()> {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                if key.starts_with("Fn::") && key != "Fn::GetAtt" {
                    return Err(StackError::validation(format!(
                        "Unsupported intrinsic function {key} in resource {logical_id}"
                    )));
                }
                validate_intrinsic_forms(logical_id, nested)?;
            }
            Ok(())
        }
        Value::Array(items) => {
            for item in items {
                validate_intrinsic_forms(logical_id, item)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// `true` for a plain string or a `Ref`/`Fn::GetAtt` placeholder.
fn is_string_or_intrinsic(value: &Value) -> bool {
    match value {
        Value::String(_) => true,
        Value::Object(map) => {
            map.len() == 1 && (map.contains_key("Ref") || map.contains_key("Fn::GetAtt"))
        }
        _ => false,
    }
}

/// Enforce that `key` is present as a non-empty string.
fn require_string(resource: &ResourceSpec, key: &str) -> StackResult<()> {
    match resource.properties.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Ok(()),
        _ => Err(StackError::validation(format!(
            "Property {key} of {} must be a non-empty string",
            resource.logical_id
        ))),
    }
}

/// Enforce that `key`, when present, is numeric.
fn require_numeric_if_present(resource: &ResourceSpec, key: &str) -> StackResult<()> {
    match resource.properties.get(key) {
        None | Some(Value::Number(_)) => Ok(()),
        Some(_) => Err(StackError::validation(format!(
            "Property {key} of {} must be numeric",
            resource.logical_id
        ))),
    }
}

/// Reject properties outside the allow-list.
fn reject_unknown_properties(resource: &ResourceSpec, allowed: &[&str]) -> StackResult<()> {
    for key in resource.properties.keys() {
        if !allowed.contains(&key.as_str()) {
            return Err(StackError::validation(format!(
                "Unsupported property {key} on {} ({})",
                resource.logical_id, resource.resource_type
            )));
        }
    }
    Ok(())
}

fn validate_lambda_properties(resource: &ResourceSpec) -> StackResult<()> {
    reject_unknown_properties(
        resource,
        &[
            "FunctionName",
            "Runtime",
            "Role",
            "Handler",
            "Code",
            "Timeout",
            "Environment",
        ],
    )?;
    require_string(resource, "FunctionName")?;
    require_string(resource, "Runtime")?;
    require_string(resource, "Role")?;
    require_string(resource, "Handler")?;
    require_numeric_if_present(resource, "Timeout")?;

    // Code must be a mapping containing exactly ZipFile.
    match resource.properties.get("Code") {
        Some(Value::Object(code)) if code.len() == 1 => match code.get("ZipFile") {
            Some(Value::String(s)) if !s.is_empty() => {}
            _ => {
                return Err(StackError::validation(format!(
                    "Code.ZipFile of {} must be a non-empty string",
                    resource.logical_id
                )));
            }
        },
        _ => {
            return Err(StackError::validation(format!(
                "Code of {} must be a mapping containing exactly ZipFile",
                resource.logical_id
            )));
        }
    }

    // Environment.Variables, if present, must map strings to strings
    // (intrinsic placeholders resolve to strings at creation time).
    if let Some(environment) = resource.properties.get("Environment") {
        let Value::Object(environment) = environment else {
            return Err(StackError::validation(format!(
                "Environment of {} must be a mapping",
                resource.logical_id
            )));
        };
        if let Some(variables) = environment.get("Variables") {
            let Value::Object(variables) = variables else {
                return Err(StackError::validation(format!(
                    "Environment.Variables of {} must be a mapping",
                    resource.logical_id
                )));
            };
            for (name, value) in variables {
                if !is_string_or_intrinsic(value) {
                    return Err(StackError::validation(format!(
                        "Environment variable {name} of {} must be a string",
                        resource.logical_id
                    )));
                }
            }
        }
    }

    Ok(())
}

fn validate_log_group_properties(resource: &ResourceSpec) -> StackResult<()> {
    reject_unknown_properties(resource, &["LogGroupName", "RetentionInDays"])?;
    require_string(resource, "LogGroupName")?;
    require_numeric_if_present(resource, "RetentionInDays")
}

fn validate_bucket_properties(resource: &ResourceSpec) -> StackResult<()> {
    reject_unknown_properties(resource, &["BucketName"])?;
    require_string(resource, "BucketName")
}

#[cfg(test)]
mod tests {
    use super::*;

    const JSON_TEMPLATE: &str = r#"{
        "Resources": {
            "Logs": {
                "Type": "AWS::Logs::LogGroup",
                "Properties": {"LogGroupName": "/aws/lambda/g", "RetentionInDays": 7}
            },
            "Fn": {
                "Type": "AWS::Lambda::Function",
                "DependsOn": "Logs",
                "Properties": {
                    "FunctionName": "g",
                    "Runtime": "nodejs18.x",
                    "Role": "arn:aws:iam::000000000000:role/r",
                    "Handler": "index.handler",
                    "Code": {"ZipFile": "export async function handler() { return 1; }"}
                }
            }
        }
    }"#;

    #[test]
    fn test_should_parse_json_template_in_order() {
        let template = parse_template(JSON_TEMPLATE).unwrap();
        let ids: Vec<&str> = template
            .resources
            .iter()
            .map(|r| r.logical_id.as_str())
            .collect();
        assert_eq!(ids, vec!["Logs", "Fn"]);
        assert_eq!(template.resources[1].depends_on, vec!["Logs"]);
    }

    #[test]
    fn test_should_parse_yaml_template() {
        let yaml = r#"
Resources:
  Bucket:
    Type: AWS::S3::Bucket
    Properties:
      BucketName: my-bucket
"#;
        let template = parse_template(yaml).unwrap();
        assert_eq!(template.resources.len(), 1);
        assert_eq!(template.resources[0].resource_type, "AWS::S3::Bucket");
    }

    #[test]
    fn test_should_reject_unparseable_body() {
        assert!(parse_template("{not json: [nor yaml").is_err());
    }

    #[test]
    fn test_should_reject_template_without_resources() {
        assert!(parse_template("{}").is_err());
        assert!(parse_template(r#"{"Resources": {}}"#).is_err());
        assert!(parse_template(r#"{"Resources": "nope"}"#).is_err());
    }

    #[test]
    fn test_should_reject_resource_without_type() {
        let body = r#"{"Resources": {"X": {"Properties": {}}}}"#;
        assert!(parse_template(body).is_err());
        let body = r#"{"Resources": {"X": {"Type": ""}}}"#;
        assert!(parse_template(body).is_err());
    }

    #[test]
    fn test_should_accept_depends_on_list() {
        let body = r#"{
            "Resources": {
                "A": {"Type": "AWS::S3::Bucket", "Properties": {"BucketName": "a-bucket"}},
                "B": {"Type": "AWS::S3::Bucket", "Properties": {"BucketName": "b-bucket"}},
                "C": {
                    "Type": "AWS::S3::Bucket",
                    "Properties": {"BucketName": "c-bucket"},
                    "DependsOn": ["A", "B"]
                }
            }
        }"#;
        let template = parse_template(body).unwrap();
        assert_eq!(template.resource("C").unwrap().depends_on, vec!["A", "B"]);
    }

    #[test]
    fn test_should_reject_depends_on_unknown_resource() {
        let body = r#"{
            "Resources": {
                "A": {
                    "Type": "AWS::S3::Bucket",
                    "Properties": {"BucketName": "a-bucket"},
                    "DependsOn": "Ghost"
                }
            }
        }"#;
        assert!(parse_template(body).is_err());
    }

    #[test]
    fn test_should_reject_unknown_property() {
        let body = r#"{
            "Resources": {
                "A": {
                    "Type": "AWS::S3::Bucket",
                    "Properties": {"BucketName": "a-bucket", "Acl": "private"}
                }
            }
        }"#;
        let err = parse_template(body).unwrap_err();
        assert!(err.to_string().contains("Unsupported property"));
    }

    #[test]
    fn test_should_reject_lambda_without_zipfile() {
        let body = r#"{
            "Resources": {
                "Fn": {
                    "Type": "AWS::Lambda::Function",
                    "Properties": {
                        "FunctionName": "f",
                        "Runtime": "nodejs18.x",
                        "Role": "r",
                        "Handler": "index.handler",
                        "Code": {"S3Bucket": "b"}
                    }
                }
            }
        }"#;
        assert!(parse_template(body).is_err());
    }

    #[test]
    fn test_should_reject_non_numeric_timeout() {
        let body = r#"{
            "Resources": {
                "Fn": {
                    "Type": "AWS::Lambda::Function",
                    "Properties": {
                        "FunctionName": "f",
                        "Runtime": "nodejs18.x",
                        "Role": "r",
                        "Handler": "index.handler",
                        "Timeout": "three",
                        "Code": {"ZipFile": "x"}
                    }
                }
            }
        }"#;
        assert!(parse_template(body).is_err());
    }

    #[test]
    fn test_should_reject_unsupported_intrinsic() {
        let body = r#"{
            "Resources": {
                "A": {
                    "Type": "AWS::S3::Bucket",
                    "Properties": {"BucketName": {"Fn::Sub": "x-${AWS::Region}"}}
                }
            }
        }"#;
        let err = parse_template(body).unwrap_err();
        assert!(err.to_string().contains("Fn::Sub"));
    }

    #[test]
    fn test_should_accept_intrinsic_environment_variables() {
        let body = r#"{
            "Resources": {
                "B": {"Type": "AWS::S3::Bucket", "Properties": {"BucketName": "data-bucket"}},
                "Fn": {
                    "Type": "AWS::Lambda::Function",
                    "Properties": {
                        "FunctionName": "f",
                        "Runtime": "nodejs18.x",
                        "Role": "r",
                        "Handler": "index.handler",
                        "Code": {"ZipFile": "x"},
                        "Environment": {"Variables": {"BUCKET": {"Ref": "B"}}}
                    }
                }
            }
        }"#;
        assert!(parse_template(body).is_ok());
    }

    #[test]
    fn test_should_pass_unsupported_type_through_validation() {
        // Unsupported types fail at creation, not validation.
        let body = r#"{
            "Resources": {
                "Q": {"Type": "AWS::SQS::Queue", "Properties": {"QueueName": "q"}}
            }
        }"#;
        let template = parse_template(body).unwrap();
        assert_eq!(template.resources[0].resource_type, "AWS::SQS::Queue");
    }
}
