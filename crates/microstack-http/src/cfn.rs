//! CloudFormation HTTP service (Query/XML).
//!
//! Requests are `POST /` with an `application/x-www-form-urlencoded` body
//! carrying `Action`, `StackName`, and `TemplateBody` fields. Responses are
//! `<{Action}Response>` documents in the CloudFormation namespace; errors
//! use the Query `<ErrorResponse>` envelope with `<Type>Sender</Type>`.

use std::sync::Arc;

use bytes::Bytes;
use http::{Response, StatusCode};
use microstack_cfn::{Stack, StackEvent, StackOrchestrator, StackResource};
use microstack_core::ServiceError;
use tracing::debug;
use uuid::Uuid;

use crate::body::HttpBody;
use crate::respond::{CONTENT_TYPE_TEXT_XML, parse_form_body, query_error, query_value};
use crate::xml::{format_timestamp, to_xml, write_optional_text, write_text_element};

/// The CloudFormation XML namespace.
const CFN_NAMESPACE: &str = "http://cloudformation.amazonaws.com/doc/2010-05-15/";

/// Whether a request belongs to the CloudFormation service.
#[must_use]
pub fn is_cfn_request(parts: &http::request::Parts) -> bool {
    parts.method == http::Method::POST
        && parts.uri.path() == "/"
        && parts
            .headers
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"))
}

/// The CloudFormation HTTP service.
#[derive(Debug, Clone)]
pub struct CfnService {
    orchestrator: Arc<StackOrchestrator>,
}

impl CfnService {
    /// Create a service over the orchestrator.
    #[must_use]
    pub fn new(orchestrator: Arc<StackOrchestrator>) -> Self {
        Self { orchestrator }
    }

    /// Handle one CloudFormation request.
    pub async fn handle(&self, _parts: &http::request::Parts, body: &Bytes) -> Response<HttpBody> {
        let request_id = Uuid::new_v4().to_string();
        match self.dispatch(body, &request_id).await {
            Ok(response) => response,
            Err(err) => query_error(&err, &request_id),
        }
    }

    async fn dispatch(
        &self,
        body: &Bytes,
        request_id: &str,
    ) -> Result<Response<HttpBody>, ServiceError> {
        let text = std::str::from_utf8(body).map_err(|_| {
            ServiceError::invalid_argument("ValidationError", "Request body is not valid UTF-8")
                .with_status(StatusCode::BAD_REQUEST)
        })?;
        let params = parse_form_body(text);

        let action = query_value(&params, "Action").ok_or_else(|| {
            ServiceError::invalid_argument("MissingAction", "No Action parameter in request")
                .with_status(StatusCode::BAD_REQUEST)
        })?;

        debug!(action = %action, "dispatching CloudFormation action");

        match action {
            "CreateStack" => {
                let name = require(&params, "StackName")?;
                let template = require(&params, "TemplateBody")?;
                let stack_id = self
                    .orchestrator
                    .create_stack(name, template)
                    .await
                    .map_err(ServiceError::from)?;
                result_response("CreateStack", request_id, |w| {
                    write_text_element(w, "StackId", &stack_id)
                })
            }
            "UpdateStack" => {
                let name = require(&params, "StackName")?;
                let template = require(&params, "TemplateBody")?;
                let stack_id = self
                    .orchestrator
                    .update_stack(name, template)
                    .await
                    .map_err(ServiceError::from)?;
                result_response("UpdateStack", request_id, |w| {
                    write_text_element(w, "StackId", &stack_id)
                })
            }
            "DeleteStack" => {
                let name = require(&params, "StackName")?;
                self.orchestrator
                    .delete_stack(name)
                    .await
                    .map_err(ServiceError::from)?;
                result_response("DeleteStack", request_id, |_| Ok(()))
            }
            "DescribeStacks" => {
                let name = query_value(&params, "StackName");
                let stacks = self
                    .orchestrator
                    .describe_stacks(name)
                    .map_err(ServiceError::from)?;
                result_response("DescribeStacks", request_id, |w| {
                    w.create_element("Stacks").write_inner_content(|w| {
                        for stack in &stacks {
                            write_stack(w, stack)?;
                        }
                        Ok(())
                    })?;
                    Ok(())
                })
            }
            "DescribeStackResources" => {
                let name = require(&params, "StackName")?;
                let resources = self
                    .orchestrator
                    .describe_stack_resources(name)
                    .map_err(ServiceError::from)?;
                result_response("DescribeStackResources", request_id, |w| {
                    w.create_element("StackResources").write_inner_content(|w| {
                        for resource in &resources {
                            write_resource(w, name, resource)?;
                        }
                        Ok(())
                    })?;
                    Ok(())
                })
            }
            "DescribeStackEvents" => {
                let name = require(&params, "StackName")?;
                let events = self
                    .orchestrator
                    .describe_stack_events(name)
                    .map_err(ServiceError::from)?;
                result_response("DescribeStackEvents", request_id, |w| {
                    w.create_element("StackEvents").write_inner_content(|w| {
                        for event in &events {
                            write_event(w, event)?;
                        }
                        Ok(())
                    })?;
                    Ok(())
                })
            }
            other => Err(ServiceError::invalid_argument(
                "InvalidAction",
                format!("Unknown CloudFormation action: {other}"),
            )),
        }
    }
}

/// Fetch a required form field.
fn require<'a>(params: &'a [(String, String)], key: &str) -> Result<&'a str, ServiceError> {
    query_value(params, key).filter(|v| !v.is_empty()).ok_or_else(|| {
        ServiceError::invalid_argument(
            "ValidationError",
            format!("Missing required parameter: {key}"),
        )
    })
}

/// Build a `<{action}Response>` document wrapping `<{action}Result>` and
/// `ResponseMetadata`.
fn result_response<F>(
    action: &str,
    request_id: &str,
    write_result: F,
) -> Result<Response<HttpBody>, ServiceError>
where
    F: FnOnce(&mut quick_xml::Writer<&mut Vec<u8>>) -> std::io::Result<()>,
{
    let xml = to_xml(&format!("{action}Response"), Some(CFN_NAMESPACE), |w| {
        w.create_element(format!("{action}Result").as_str())
            .write_inner_content(write_result)?;
        w.create_element("ResponseMetadata").write_inner_content(|w| {
            write_text_element(w, "RequestId", request_id)
        })?;
        Ok(())
    })
    .map_err(|e| ServiceError::internal(e.to_string()))?;

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header("content-type", CONTENT_TYPE_TEXT_XML)
        .body(HttpBody::from_bytes(xml))
        .expect("valid XML response"))
}

fn write_stack<W: std::io::Write>(
    w: &mut quick_xml::Writer<W>,
    stack: &Stack,
) -> std::io::Result<()> {
    w.create_element("member").write_inner_content(|w| {
        write_text_element(w, "StackId", &stack.stack_id)?;
        write_text_element(w, "StackName", &stack.stack_name)?;
        write_text_element(w, "CreationTime", &format_timestamp(&stack.creation_time))?;
        write_text_element(w, "StackStatus", stack.status.as_str())?;
        write_optional_text(w, "StackStatusReason", stack.status_reason.as_deref())
    })?;
    Ok(())
}

fn write_resource<W: std::io::Write>(
    w: &mut quick_xml::Writer<W>,
    stack_name: &str,
    resource: &StackResource,
) -> std::io::Result<()> {
    w.create_element("member").write_inner_content(|w| {
        write_text_element(w, "StackName", stack_name)?;
        write_text_element(w, "LogicalResourceId", &resource.logical_id)?;
        write_optional_text(w, "PhysicalResourceId", resource.physical_id.as_deref())?;
        write_text_element(w, "ResourceType", &resource.resource_type)?;
        write_text_element(w, "ResourceStatus", resource.status.as_str())?;
        write_optional_text(w, "ResourceStatusReason", resource.status_reason.as_deref())?;
        write_text_element(w, "Timestamp", &format_timestamp(&resource.timestamp))
    })?;
    Ok(())
}

fn write_event<W: std::io::Write>(
    w: &mut quick_xml::Writer<W>,
    event: &StackEvent,
) -> std::io::Result<()> {
    w.create_element("member").write_inner_content(|w| {
        write_text_element(w, "EventId", &event.event_id)?;
        write_text_element(w, "StackId", &event.stack_id)?;
        write_text_element(w, "StackName", &event.stack_name)?;
        write_text_element(w, "LogicalResourceId", &event.logical_id)?;
        write_optional_text(w, "PhysicalResourceId", event.physical_id.as_deref())?;
        write_text_element(w, "ResourceType", &event.resource_type)?;
        write_text_element(w, "ResourceStatus", &event.status)?;
        write_optional_text(w, "ResourceStatusReason", event.reason.as_deref())?;
        write_text_element(w, "Timestamp", &format_timestamp(&event.timestamp))
    })?;
    Ok(())
}
