//! Lambda HTTP service (REST-JSON, 2015-03-31 API).
//!
//! Routes:
//!
//! ```text
//! POST   /2015-03-31/functions                         CreateFunction (201)
//! GET    /2015-03-31/functions                         ListFunctions
//! GET    /2015-03-31/functions/{name}                  GetFunction
//! DELETE /2015-03-31/functions/{name}                  DeleteFunction (204)
//! PUT    /2015-03-31/functions/{name}/code             UpdateFunctionCode
//! PUT    /2015-03-31/functions/{name}/configuration    UpdateFunctionConfiguration
//! POST   /2015-03-31/functions/{name}/invocations      Invoke
//! ```
//!
//! Invocation responses carry `X-Amz-Executed-Version: $LATEST` and, on
//! fault, `X-Amz-Function-Error: Unhandled`; handler faults and timeouts are
//! HTTP 200.

use std::collections::HashMap;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use bytes::Bytes;
use http::{Method, Response, StatusCode};
use microstack_core::ServiceError;
use microstack_lambda::model::{
    CreateFunctionRequest, FunctionConfiguration, GetFunctionResponse, ListFunctionsResponse,
    UpdateFunctionCodeRequest, UpdateFunctionConfigurationRequest,
};
use microstack_lambda::{
    ConfigPatch, FunctionRegistry, FunctionRuntime, InvokeResult, NewFunction,
};
use tracing::debug;

use crate::body::HttpBody;
use crate::respond::{
    CONTENT_TYPE_JSON, decode_uri_component, empty_response, json_error, json_response,
};

/// Path prefix owned by the Lambda service.
pub const FUNCTIONS_PREFIX: &str = "/2015-03-31/functions";

/// Whether a request belongs to the Lambda service.
#[must_use]
pub fn is_lambda_request(path: &str) -> bool {
    path == FUNCTIONS_PREFIX || path.starts_with("/2015-03-31/functions/")
}

/// The Lambda HTTP service.
#[derive(Clone)]
pub struct LambdaService {
    registry: Arc<FunctionRegistry>,
    runtime: Arc<FunctionRuntime>,
}

impl std::fmt::Debug for LambdaService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LambdaService").finish_non_exhaustive()
    }
}

/// A parsed function route.
#[derive(Debug, PartialEq, Eq)]
enum Route {
    Collection,
    Function(String),
    Code(String),
    Configuration(String),
    Invocations(String),
}

/// Parse the path below the functions prefix.
fn parse_route(path: &str) -> Option<Route> {
    let rest = path.strip_prefix(FUNCTIONS_PREFIX)?;
    if rest.is_empty() || rest == "/" {
        return Some(Route::Collection);
    }

    let mut segments = rest.strip_prefix('/')?.split('/');
    let name = decode_uri_component(segments.next()?);
    if name.is_empty() {
        return None;
    }

    match (segments.next(), segments.next()) {
        (None, _) => Some(Route::Function(name)),
        (Some("code"), None) => Some(Route::Code(name)),
        (Some("configuration"), None) => Some(Route::Configuration(name)),
        (Some("invocations"), None) => Some(Route::Invocations(name)),
        _ => None,
    }
}

impl LambdaService {
    /// Create a service over the registry and runtime.
    #[must_use]
    pub fn new(registry: Arc<FunctionRegistry>, runtime: Arc<FunctionRuntime>) -> Self {
        Self { registry, runtime }
    }

    /// Handle one Lambda request.
    pub async fn handle(&self, parts: &http::request::Parts, body: &Bytes) -> Response<HttpBody> {
        match self.dispatch(parts, body).await {
            Ok(response) => response,
            Err(err) => json_error(&err, CONTENT_TYPE_JSON),
        }
    }

    async fn dispatch(
        &self,
        parts: &http::request::Parts,
        body: &Bytes,
    ) -> Result<Response<HttpBody>, ServiceError> {
        let route = parse_route(parts.uri.path()).ok_or_else(|| {
            ServiceError::not_found(
                "ResourceNotFoundException",
                format!("Unknown function route: {}", parts.uri.path()),
            )
        })?;

        debug!(method = %parts.method, route = ?route, "dispatching Lambda operation");

        match (&parts.method, route) {
            (&Method::POST, Route::Collection) => self.create_function(body),
            (&Method::GET, Route::Collection) => self.list_functions(),
            (&Method::GET, Route::Function(name)) => self.get_function(&name),
            (&Method::DELETE, Route::Function(name)) => self.delete_function(&name),
            (&Method::PUT, Route::Code(name)) => self.update_code(&name, body),
            (&Method::PUT, Route::Configuration(name)) => self.update_configuration(&name, body),
            (&Method::POST, Route::Invocations(name)) => self.invoke(&name, body).await,
            (method, _) => Err(ServiceError::invalid_argument(
                "InvalidRequestContentException",
                format!("Unsupported method {method} for this resource"),
            )
            .with_status(StatusCode::METHOD_NOT_ALLOWED)),
        }
    }

    fn create_function(&self, body: &Bytes) -> Result<Response<HttpBody>, ServiceError> {
        let request: CreateFunctionRequest = deserialize(body)?;
        let bundle = decode_bundle(&request.code.zip_file)?;

        let record = self
            .registry
            .create(NewFunction {
                name: request.function_name,
                runtime: request.runtime,
                role: request.role,
                handler: request.handler,
                timeout_seconds: request.timeout,
                environment: request
                    .environment
                    .map(|e| e.variables)
                    .unwrap_or_default(),
                bundle,
            })
            .map_err(ServiceError::from)?;

        serialize(StatusCode::CREATED, &FunctionConfiguration::from(&record))
    }

    fn list_functions(&self) -> Result<Response<HttpBody>, ServiceError> {
        let functions = self
            .registry
            .list()
            .iter()
            .map(FunctionConfiguration::from)
            .collect();
        serialize(StatusCode::OK, &ListFunctionsResponse { functions })
    }

    fn get_function(&self, name: &str) -> Result<Response<HttpBody>, ServiceError> {
        let record = self.registry.get(name).map_err(ServiceError::from)?;
        serialize(
            StatusCode::OK,
            &GetFunctionResponse {
                configuration: FunctionConfiguration::from(&record),
            },
        )
    }

    fn delete_function(&self, name: &str) -> Result<Response<HttpBody>, ServiceError> {
        self.registry.delete(name).map_err(ServiceError::from)?;
        Ok(empty_response(StatusCode::NO_CONTENT))
    }

    fn update_code(&self, name: &str, body: &Bytes) -> Result<Response<HttpBody>, ServiceError> {
        let request: UpdateFunctionCodeRequest = deserialize(body)?;
        let bundle = decode_bundle(&request.zip_file)?;
        let record = self
            .registry
            .update_code(name, bundle)
            .map_err(ServiceError::from)?;
        serialize(StatusCode::OK, &FunctionConfiguration::from(&record))
    }

    fn update_configuration(
        &self,
        name: &str,
        body: &Bytes,
    ) -> Result<Response<HttpBody>, ServiceError> {
        let request: UpdateFunctionConfigurationRequest = deserialize(body)?;
        let record = self
            .registry
            .update_config(
                name,
                ConfigPatch {
                    runtime: request.runtime,
                    role: request.role,
                    handler: request.handler,
                    timeout_seconds: request.timeout,
                    environment: request.environment.map(|e| e.variables),
                },
            )
            .map_err(ServiceError::from)?;
        serialize(StatusCode::OK, &FunctionConfiguration::from(&record))
    }

    async fn invoke(&self, name: &str, body: &Bytes) -> Result<Response<HttpBody>, ServiceError> {
        let result = self
            .runtime
            .invoke(name, body)
            .await
            .map_err(ServiceError::from)?;
        Ok(invoke_response(&result))
    }
}

/// Build the invocation response with the executed-version and, on fault,
/// function-error headers.
fn invoke_response(result: &InvokeResult) -> Response<HttpBody> {
    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header("content-type", CONTENT_TYPE_JSON)
        .header("x-amz-executed-version", "$LATEST");

    if let Some(ref function_error) = result.function_error {
        builder = builder.header("x-amz-function-error", function_error.as_str());
    }

    builder
        .body(HttpBody::from_bytes(result.payload.clone()))
        .expect("valid invoke response")
}

/// Decode a base64 code bundle.
fn decode_bundle(zip_file: &str) -> Result<Bytes, ServiceError> {
    BASE64_STANDARD
        .decode(zip_file)
        .map(Bytes::from)
        .map_err(|e| {
            ServiceError::invalid_argument(
                "InvalidParameterValueException",
                format!("Could not decode ZipFile as base64: {e}"),
            )
        })
}

/// Deserialize a JSON request body.
fn deserialize<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, ServiceError> {
    serde_json::from_slice(body).map_err(|e| {
        ServiceError::invalid_argument(
            "InvalidRequestContentException",
            format!("Failed to parse request body: {e}"),
        )
    })
}

/// Serialize a response body.
fn serialize<T: serde::Serialize>(
    status: StatusCode,
    value: &T,
) -> Result<Response<HttpBody>, ServiceError> {
    let json = serde_json::to_vec(value)
        .map_err(|e| ServiceError::internal(format!("Failed to serialize response: {e}")))?;
    Ok(json_response(status, CONTENT_TYPE_JSON, json))
}
