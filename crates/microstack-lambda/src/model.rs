//! Wire model for the Lambda REST-JSON dialect (2015-03-31 API).
//!
//! Field names follow the AWS API (PascalCase). `LastModified` is ISO-8601.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::registry::FunctionRecord;

/// `Environment` block in requests and responses.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EnvironmentSpec {
    /// Environment variables.
    #[serde(rename = "Variables", default)]
    pub variables: HashMap<String, String>,
}

/// `Code` block in a create request.
#[derive(Debug, Deserialize)]
pub struct CodeSpec {
    /// Base64-encoded ZIP bundle.
    #[serde(rename = "ZipFile")]
    pub zip_file: String,
}

/// `CreateFunction` request body.
#[derive(Debug, Deserialize)]
pub struct CreateFunctionRequest {
    /// Unique function name.
    #[serde(rename = "FunctionName")]
    pub function_name: String,
    /// Runtime tag.
    #[serde(rename = "Runtime")]
    pub runtime: String,
    /// Execution role.
    #[serde(rename = "Role")]
    pub role: String,
    /// Dotted `module.export` handler reference.
    #[serde(rename = "Handler")]
    pub handler: String,
    /// Timeout in seconds.
    #[serde(rename = "Timeout", default)]
    pub timeout: Option<u64>,
    /// Environment block.
    #[serde(rename = "Environment", default)]
    pub environment: Option<EnvironmentSpec>,
    /// Code bundle.
    #[serde(rename = "Code")]
    pub code: CodeSpec,
}

/// `UpdateFunctionCode` request body.
#[derive(Debug, Deserialize)]
pub struct UpdateFunctionCodeRequest {
    /// Base64-encoded ZIP bundle.
    #[serde(rename = "ZipFile")]
    pub zip_file: String,
}

/// `UpdateFunctionConfiguration` request body. Absent fields are retained.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateFunctionConfigurationRequest {
    /// New runtime tag.
    #[serde(rename = "Runtime", default)]
    pub runtime: Option<String>,
    /// New role.
    #[serde(rename = "Role", default)]
    pub role: Option<String>,
    /// New handler reference.
    #[serde(rename = "Handler", default)]
    pub handler: Option<String>,
    /// New timeout.
    #[serde(rename = "Timeout", default)]
    pub timeout: Option<u64>,
    /// New environment block.
    #[serde(rename = "Environment", default)]
    pub environment: Option<EnvironmentSpec>,
}

/// Function configuration as returned by every read/write operation.
#[derive(Debug, Serialize)]
pub struct FunctionConfiguration {
    /// Function name.
    #[serde(rename = "FunctionName")]
    pub function_name: String,
    /// Function ARN.
    #[serde(rename = "FunctionArn")]
    pub function_arn: String,
    /// Runtime tag.
    #[serde(rename = "Runtime")]
    pub runtime: String,
    /// Execution role.
    #[serde(rename = "Role")]
    pub role: String,
    /// Handler reference.
    #[serde(rename = "Handler")]
    pub handler: String,
    /// Timeout in seconds.
    #[serde(rename = "Timeout")]
    pub timeout: u64,
    /// Environment block, omitted when empty.
    #[serde(rename = "Environment", skip_serializing_if = "Option::is_none")]
    pub environment: Option<EnvironmentSpec>,
    /// Base64 SHA-256 of the bundle.
    #[serde(rename = "CodeSha256")]
    pub code_sha256: String,
    /// Bundle size in bytes.
    #[serde(rename = "CodeSize")]
    pub code_size: u64,
    /// Version rendered as a string, matching the AWS wire shape.
    #[serde(rename = "Version")]
    pub version: String,
    /// ISO-8601 last-modified instant.
    #[serde(rename = "LastModified")]
    pub last_modified: String,
}

impl From<&FunctionRecord> for FunctionConfiguration {
    fn from(record: &FunctionRecord) -> Self {
        let environment = if record.environment.is_empty() {
            None
        } else {
            Some(EnvironmentSpec {
                variables: record.environment.clone(),
            })
        };

        Self {
            function_name: record.name.clone(),
            function_arn: microstack_core::function_arn(&record.name),
            runtime: record.runtime.clone(),
            role: record.role.clone(),
            handler: record.handler.clone(),
            timeout: record.timeout_seconds,
            environment,
            code_sha256: record.code_digest.clone(),
            code_size: record.code_bundle.len() as u64,
            version: record.version.to_string(),
            last_modified: record
                .last_modified
                .format("%Y-%m-%dT%H:%M:%S%.3f%z")
                .to_string(),
        }
    }
}

/// `GetFunction` response body.
#[derive(Debug, Serialize)]
pub struct GetFunctionResponse {
    /// The function configuration.
    #[serde(rename = "Configuration")]
    pub configuration: FunctionConfiguration,
}

/// `ListFunctions` response body.
#[derive(Debug, Serialize)]
pub struct ListFunctionsResponse {
    /// All functions, sorted by name.
    #[serde(rename = "Functions")]
    pub functions: Vec<FunctionConfiguration>,
}
