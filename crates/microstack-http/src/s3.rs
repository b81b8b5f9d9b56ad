//! S3 HTTP service (REST-XML, path-style buckets).
//!
//! Routing is method + path shaped: `/{bucket}` for bucket operations,
//! `/{bucket}/{key...}` for object operations, `GET /` for `ListBuckets`.
//! `GET /{bucket}` renders a V2 listing (`list-type=2` with `prefix`,
//! `max-keys`, and `continuation-token`).

use std::sync::Arc;

use bytes::Bytes;
use http::{Method, Response, StatusCode};
use microstack_core::ServiceError;
use microstack_s3::{ListV2Page, ObjectStore, StoredObject};
use tracing::debug;

use crate::body::HttpBody;
use crate::respond::{
    CONTENT_TYPE_XML, decode_uri_component, empty_response, parse_query_params, query_value,
    s3_error,
};
use crate::xml::{format_timestamp, to_xml, write_bool_element, write_text_element};

/// The S3 XML namespace.
const S3_NAMESPACE: &str = "http://s3.amazonaws.com/doc/2006-03-01/";

/// The S3 HTTP service.
#[derive(Debug, Clone)]
pub struct S3Service {
    store: Arc<ObjectStore>,
}

impl S3Service {
    /// Create a service over the object store.
    #[must_use]
    pub fn new(store: Arc<ObjectStore>) -> Self {
        Self { store }
    }

    /// Handle one S3 request.
    pub fn handle(&self, parts: &http::request::Parts, body: &Bytes) -> Response<HttpBody> {
        match self.dispatch(parts, body) {
            Ok(response) => response,
            // HEAD responses must not carry a body.
            Err(err) if parts.method == Method::HEAD => empty_response(err.status),
            Err(err) => s3_error(&err),
        }
    }

    fn dispatch(
        &self,
        parts: &http::request::Parts,
        body: &Bytes,
    ) -> Result<Response<HttpBody>, ServiceError> {
        let (bucket, key) = parse_path(parts.uri.path());
        let params = parse_query_params(parts.uri.query().unwrap_or(""));

        debug!(
            method = %parts.method,
            bucket = bucket.as_deref().unwrap_or("-"),
            key = key.as_deref().unwrap_or("-"),
            "dispatching S3 operation"
        );

        match (&parts.method, bucket, key) {
            (&Method::GET, None, None) => self.list_buckets(),
            (&Method::PUT, Some(bucket), None) => self.create_bucket(&bucket),
            (&Method::HEAD, Some(bucket), None) => self.head_bucket(&bucket),
            (&Method::DELETE, Some(bucket), None) => self.delete_bucket(&bucket),
            (&Method::GET, Some(bucket), None) => self.list_objects_v2(&bucket, &params),
            (&Method::PUT, Some(bucket), Some(key)) => {
                self.put_object(&bucket, &key, body, parts)
            }
            (&Method::GET, Some(bucket), Some(key)) => self.get_object(&bucket, &key, true),
            (&Method::HEAD, Some(bucket), Some(key)) => self.get_object(&bucket, &key, false),
            (&Method::DELETE, Some(bucket), Some(key)) => self.delete_object(&bucket, &key),
            (method, _, _) => Err(ServiceError::invalid_argument(
                "MethodNotAllowed",
                format!("The specified method is not allowed: {method}"),
            )
            .with_status(StatusCode::METHOD_NOT_ALLOWED)),
        }
    }

    fn list_buckets(&self) -> Result<Response<HttpBody>, ServiceError> {
        let buckets = self.store.list_buckets();
        let xml = to_xml("ListAllMyBucketsResult", Some(S3_NAMESPACE), |w| {
            w.create_element("Buckets").write_inner_content(|w| {
                for bucket in &buckets {
                    w.create_element("Bucket").write_inner_content(|w| {
                        write_text_element(w, "Name", &bucket.name)?;
                        write_text_element(
                            w,
                            "CreationDate",
                            &format_timestamp(&bucket.creation_time),
                        )
                    })?;
                }
                Ok(())
            })?;
            Ok(())
        })
        .map_err(|e| ServiceError::internal(e.to_string()))?;

        Ok(xml_response(StatusCode::OK, xml))
    }

    fn create_bucket(&self, bucket: &str) -> Result<Response<HttpBody>, ServiceError> {
        self.store.create_bucket(bucket).map_err(ServiceError::from)?;
        let mut response = empty_response(StatusCode::OK);
        if let Ok(hv) = http::HeaderValue::from_str(&format!("/{bucket}")) {
            response.headers_mut().insert("location", hv);
        }
        Ok(response)
    }

    fn head_bucket(&self, bucket: &str) -> Result<Response<HttpBody>, ServiceError> {
        self.store.head_bucket(bucket).map_err(ServiceError::from)?;
        Ok(empty_response(StatusCode::OK))
    }

    fn delete_bucket(&self, bucket: &str) -> Result<Response<HttpBody>, ServiceError> {
        self.store.delete_bucket(bucket).map_err(ServiceError::from)?;
        Ok(empty_response(StatusCode::NO_CONTENT))
    }

    fn list_objects_v2(
        &self,
        bucket: &str,
        params: &[(String, String)],
    ) -> Result<Response<HttpBody>, ServiceError> {
        let prefix = query_value(params, "prefix").unwrap_or("");
        let max_keys = match query_value(params, "max-keys") {
            None => None,
            Some(raw) => Some(raw.parse::<usize>().map_err(|_| {
                ServiceError::invalid_argument(
                    "InvalidArgument",
                    format!("max-keys must be a non-negative integer, got '{raw}'"),
                )
            })?),
        };
        let token = query_value(params, "continuation-token");

        let page = self
            .store
            .list_objects_v2(bucket, prefix, max_keys, token)
            .map_err(ServiceError::from)?;

        let xml = render_listing(bucket, prefix, max_keys, &page)
            .map_err(|e| ServiceError::internal(e.to_string()))?;
        Ok(xml_response(StatusCode::OK, xml))
    }

    fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: &Bytes,
        parts: &http::request::Parts,
    ) -> Result<Response<HttpBody>, ServiceError> {
        let content_type = parts
            .headers
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok());

        let etag = self
            .store
            .put_object(bucket, key, body.clone(), content_type)
            .map_err(ServiceError::from)?;

        let mut response = empty_response(StatusCode::OK);
        if let Ok(hv) = http::HeaderValue::from_str(&etag) {
            response.headers_mut().insert("etag", hv);
        }
        Ok(response)
    }

    fn get_object(
        &self,
        bucket: &str,
        key: &str,
        with_body: bool,
    ) -> Result<Response<HttpBody>, ServiceError> {
        let object = self.store.get_object(bucket, key).map_err(ServiceError::from)?;
        Ok(object_response(&object, with_body))
    }

    fn delete_object(&self, bucket: &str, key: &str) -> Result<Response<HttpBody>, ServiceError> {
        self.store.delete_object(bucket, key).map_err(ServiceError::from)?;
        Ok(empty_response(StatusCode::NO_CONTENT))
    }
}

/// Parse a path-style URI into bucket and key.
fn parse_path(path: &str) -> (Option<String>, Option<String>) {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    if trimmed.is_empty() {
        return (None, None);
    }

    if let Some(pos) = trimmed.find('/') {
        let bucket = decode_uri_component(&trimmed[..pos]);
        let key_raw = &trimmed[pos + 1..];
        let key = if key_raw.is_empty() {
            None
        } else {
            Some(decode_uri_component(key_raw))
        };
        (Some(bucket), key)
    } else {
        (Some(decode_uri_component(trimmed)), None)
    }
}

/// Render a `ListBucketResult` document.
fn render_listing(
    bucket: &str,
    prefix: &str,
    max_keys: Option<usize>,
    page: &ListV2Page,
) -> std::io::Result<Vec<u8>> {
    to_xml("ListBucketResult", Some(S3_NAMESPACE), |w| {
        write_text_element(w, "Name", bucket)?;
        write_text_element(w, "Prefix", prefix)?;
        write_text_element(w, "KeyCount", &page.objects.len().to_string())?;
        write_text_element(w, "MaxKeys", &max_keys.unwrap_or(1000).to_string())?;
        write_bool_element(w, "IsTruncated", page.is_truncated)?;
        if let Some(ref token) = page.next_continuation_token {
            write_text_element(w, "NextContinuationToken", token)?;
        }
        for object in &page.objects {
            w.create_element("Contents").write_inner_content(|w| {
                write_text_element(w, "Key", &object.key)?;
                write_text_element(w, "LastModified", &format_timestamp(&object.last_modified))?;
                write_text_element(w, "ETag", &object.etag)?;
                write_text_element(w, "Size", &object.size.to_string())
            })?;
        }
        Ok(())
    })
}

/// Build a GET/HEAD object response; HEAD omits the body.
fn object_response(object: &StoredObject, with_body: bool) -> Response<HttpBody> {
    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header("content-length", object.body.len());

    if let Ok(hv) = http::HeaderValue::from_str(&object.content_type) {
        builder = builder.header("content-type", hv);
    }
    if let Ok(hv) = http::HeaderValue::from_str(&object.etag) {
        builder = builder.header("etag", hv);
    }
    let last_modified = object
        .last_modified
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string();
    if let Ok(hv) = http::HeaderValue::from_str(&last_modified) {
        builder = builder.header("last-modified", hv);
    }

    let body = if with_body {
        HttpBody::from_bytes(object.body.clone())
    } else {
        HttpBody::empty()
    };
    builder.body(body).expect("valid object response")
}

/// Build an XML response.
fn xml_response(status: StatusCode, xml: Vec<u8>) -> Response<HttpBody> {
    Response::builder()
        .status(status)
        .header("content-type", CONTENT_TYPE_XML)
        .body(HttpBody::from_bytes(xml))
        .expect("valid XML response")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> S3Service {
        S3Service::new(Arc::new(ObjectStore::new()))
    }

    fn request(method: Method, path: &str, body: &[u8]) -> (http::request::Parts, Bytes) {
        let (parts, ()) = http::Request::builder()
            .method(method)
            .uri(path)
            .body(())
            .unwrap()
            .into_parts();
        (parts, Bytes::copy_from_slice(body))
    }

    async fn body_text(response: Response<HttpBody>) -> String {
        use http_body_util::BodyExt;
        let collected = response.into_body().collect().await.unwrap();
        String::from_utf8(collected.to_bytes().to_vec()).unwrap()
    }

    #[test]
    fn test_should_parse_bucket_and_key_paths() {
        assert_eq!(parse_path("/"), (None, None));
        assert_eq!(parse_path("/bucket"), (Some("bucket".to_owned()), None));
        assert_eq!(
            parse_path("/bucket/a/b"),
            (Some("bucket".to_owned()), Some("a/b".to_owned()))
        );
        assert_eq!(
            parse_path("/bucket/my%20key"),
            (Some("bucket".to_owned()), Some("my key".to_owned()))
        );
    }

    #[test]
    fn test_should_create_head_and_delete_bucket() {
        let service = service();
        let (parts, body) = request(Method::PUT, "/demo-bucket", b"");
        assert_eq!(service.handle(&parts, &body).status(), StatusCode::OK);

        let (parts, body) = request(Method::HEAD, "/demo-bucket", b"");
        assert_eq!(service.handle(&parts, &body).status(), StatusCode::OK);

        let (parts, body) = request(Method::DELETE, "/demo-bucket", b"");
        assert_eq!(service.handle(&parts, &body).status(), StatusCode::NO_CONTENT);

        let (parts, body) = request(Method::HEAD, "/demo-bucket", b"");
        assert_eq!(service.handle(&parts, &body).status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_should_render_error_document_for_missing_bucket() {
        let service = service();
        let (parts, body) = request(Method::GET, "/ghost-bucket/key", b"");
        let response = service.handle(&parts, &body);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let text = body_text(response).await;
        assert!(text.contains("<Code>NoSuchBucket</Code>"));
    }

    #[tokio::test]
    async fn test_should_put_and_get_object_round_trip() {
        let service = service();
        let (parts, body) = request(Method::PUT, "/demo-bucket", b"");
        service.handle(&parts, &body);

        let (parts, body) = request(Method::PUT, "/demo-bucket/hello.txt", b"hello");
        let response = service.handle(&parts, &body);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("etag").unwrap(),
            "\"5d41402abc4b2a76b9719d911017c592\""
        );

        let (parts, body) = request(Method::GET, "/demo-bucket/hello.txt", b"");
        let response = service.handle(&parts, &body);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "hello");
    }

    #[tokio::test]
    async fn test_should_paginate_listing_with_tokens() {
        let service = service();
        let (parts, body) = request(Method::PUT, "/demo-bucket", b"");
        service.handle(&parts, &body);
        for key in ["a", "b", "c"] {
            let (parts, body) = request(Method::PUT, &format!("/demo-bucket/{key}"), b"x");
            service.handle(&parts, &body);
        }

        let (parts, body) = request(Method::GET, "/demo-bucket?list-type=2&max-keys=2", b"");
        let text = body_text(service.handle(&parts, &body)).await;
        assert!(text.contains("<Key>a</Key>"));
        assert!(text.contains("<Key>b</Key>"));
        assert!(!text.contains("<Key>c</Key>"));
        assert!(text.contains("<IsTruncated>true</IsTruncated>"));
        assert!(text.contains("<NextContinuationToken>b</NextContinuationToken>"));

        let (parts, body) = request(
            Method::GET,
            "/demo-bucket?list-type=2&max-keys=2&continuation-token=b",
            b"",
        );
        let text = body_text(service.handle(&parts, &body)).await;
        assert!(text.contains("<Key>c</Key>"));
        assert!(text.contains("<IsTruncated>false</IsTruncated>"));
    }

    #[test]
    fn test_should_keep_head_error_bodies_empty() {
        let service = service();
        let (parts, body) = request(Method::HEAD, "/ghost-bucket", b"");
        let response = service.handle(&parts, &body);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(matches!(response.into_body(), HttpBody::Empty));
    }

    #[test]
    fn test_should_reject_non_numeric_max_keys() {
        let service = service();
        let (parts, body) = request(Method::PUT, "/demo-bucket", b"");
        service.handle(&parts, &body);

        let (parts, body) = request(Method::GET, "/demo-bucket?list-type=2&max-keys=lots", b"");
        assert_eq!(service.handle(&parts, &body).status(), StatusCode::BAD_REQUEST);
    }
}
