//! Response construction shared by every dialect: JSON bodies, error
//! envelopes, CORS headers, and request parsing helpers.

use http::{HeaderValue, Response, StatusCode};
use microstack_core::ServiceError;
use percent_encoding::percent_decode_str;

use crate::body::HttpBody;

/// Content type for the Logs JSON 1.1 dialect.
pub const CONTENT_TYPE_AMZ_JSON: &str = "application/x-amz-json-1.1";

/// Content type for the Lambda REST-JSON dialect.
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Content type for S3 REST-XML responses.
pub const CONTENT_TYPE_XML: &str = "application/xml";

/// Content type for CloudFormation Query/XML responses.
pub const CONTENT_TYPE_TEXT_XML: &str = "text/xml";

/// Add the CORS headers every response carries; `OPTIONS` preflights get
/// them with an otherwise empty 204.
pub fn apply_cors<B>(response: &mut Response<B>) {
    let headers = response.headers_mut();
    headers.insert(
        "access-control-allow-origin",
        HeaderValue::from_static("*"),
    );
    headers.insert(
        "access-control-allow-methods",
        HeaderValue::from_static("GET, PUT, POST, DELETE, HEAD, OPTIONS"),
    );
    headers.insert(
        "access-control-allow-headers",
        HeaderValue::from_static("*"),
    );
}

/// The 204 response for an `OPTIONS` preflight.
#[must_use]
pub fn preflight_response() -> Response<HttpBody> {
    let mut response = Response::builder()
        .status(StatusCode::NO_CONTENT)
        .body(HttpBody::empty())
        .expect("static preflight response");
    apply_cors(&mut response);
    response
}

/// Build a JSON success response.
#[must_use]
pub fn json_response(status: StatusCode, content_type: &'static str, json: Vec<u8>) -> Response<HttpBody> {
    Response::builder()
        .status(status)
        .header("content-type", content_type)
        .body(HttpBody::from_bytes(json))
        .expect("valid JSON response")
}

/// Build an empty response with the given status.
#[must_use]
pub fn empty_response(status: StatusCode) -> Response<HttpBody> {
    Response::builder()
        .status(status)
        .body(HttpBody::empty())
        .expect("valid empty response")
}

/// Render a carrier error as a JSON-dialect envelope:
/// `{"__type": code, "message": msg}` plus the `X-Amzn-ErrorType` header.
#[must_use]
pub fn json_error(err: &ServiceError, content_type: &'static str) -> Response<HttpBody> {
    let body = serde_json::to_vec(&serde_json::json!({
        "__type": err.code,
        "message": err.message,
    }))
    .expect("JSON serialization of error cannot fail");

    let mut response = Response::builder()
        .status(err.status)
        .header("content-type", content_type)
        .body(HttpBody::from_bytes(body))
        .expect("valid error response");

    if let Ok(hv) = HeaderValue::from_str(&err.code) {
        response.headers_mut().insert("x-amzn-errortype", hv);
    }
    response
}

/// Render a carrier error as an S3 `<Error>` document.
#[must_use]
pub fn s3_error(err: &ServiceError) -> Response<HttpBody> {
    let body = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <Error><Code>{}</Code><Message>{}</Message></Error>",
        xml_escape(&err.code),
        xml_escape(&err.message),
    );
    Response::builder()
        .status(err.status)
        .header("content-type", CONTENT_TYPE_XML)
        .body(HttpBody::from_bytes(body))
        .expect("valid error response")
}

/// Render a carrier error as a Query `<ErrorResponse>` document.
#[must_use]
pub fn query_error(err: &ServiceError, request_id: &str) -> Response<HttpBody> {
    let body = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <ErrorResponse><Error><Type>Sender</Type><Code>{}</Code><Message>{}</Message></Error>\
         <RequestId>{}</RequestId></ErrorResponse>",
        xml_escape(&err.code),
        xml_escape(&err.message),
        xml_escape(request_id),
    );
    Response::builder()
        .status(err.status)
        .header("content-type", CONTENT_TYPE_TEXT_XML)
        .body(HttpBody::from_bytes(body))
        .expect("valid error response")
}

/// Minimal XML text escaping.
#[must_use]
pub fn xml_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Decode a percent-encoded URI component.
#[must_use]
pub fn decode_uri_component(s: &str) -> String {
    percent_decode_str(s).decode_utf8_lossy().into_owned()
}

/// Parse a query string into key-value pairs.
#[must_use]
pub fn parse_query_params(query: &str) -> Vec<(String, String)> {
    if query.is_empty() {
        return Vec::new();
    }

    query
        .split('&')
        .filter(|s| !s.is_empty())
        .map(|pair| {
            if let Some(pos) = pair.find('=') {
                let key = decode_uri_component(&pair[..pos]);
                let value = decode_uri_component(&pair[pos + 1..]);
                (key, value)
            } else {
                (decode_uri_component(pair), String::new())
            }
        })
        .collect()
}

/// Parse an `application/x-www-form-urlencoded` body. Unlike query strings,
/// `+` encodes a space in form bodies.
#[must_use]
pub fn parse_form_body(body: &str) -> Vec<(String, String)> {
    parse_query_params(&body.replace('+', " "))
}

/// Get the value of a query parameter by name.
#[must_use]
pub fn query_value<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Check whether a query parameter is present.
#[must_use]
pub fn query_has_key(params: &[(String, String)], key: &str) -> bool {
    params.iter().any(|(k, _)| k == key)
}
