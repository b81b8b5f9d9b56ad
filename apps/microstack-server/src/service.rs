//! Gateway service: multiplexes the four AWS dialects behind one endpoint.
//!
//! Each service implements [`ServiceRouter`] to declare which requests it
//! handles; the gateway collects the request body, walks the router list in
//! registration order, and dispatches to the first match. S3 is the
//! catch-all and must be registered last. Health checks and CORS preflights
//! are intercepted at the gateway level, and every response leaves with the
//! CORS headers applied.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use microstack_http::HttpBody;
use microstack_http::cfn::{CfnService, is_cfn_request};
use microstack_http::lambda::{LambdaService, is_lambda_request};
use microstack_http::logs::{LogsService, is_logs_request};
use microstack_http::respond::{apply_cors, preflight_response};
use microstack_http::s3::S3Service;
use tracing::error;

/// Path of the gateway health endpoint.
const HEALTH_PATH: &str = "/microstack/health";

/// A routable AWS service registered with the gateway.
pub trait ServiceRouter: Send + Sync {
    /// Service name for logging.
    fn name(&self) -> &'static str;

    /// Returns `true` if this router should handle the given request.
    fn matches(&self, parts: &http::request::Parts) -> bool;

    /// Handle the request.
    fn call<'a>(
        &'a self,
        parts: http::request::Parts,
        body: Bytes,
    ) -> Pin<Box<dyn Future<Output = http::Response<HttpBody>> + Send + 'a>>;
}

/// Routes Logs JSON 1.1 requests (`X-Amz-Target: Logs_...`).
pub struct LogsRouter(pub LogsService);

impl ServiceRouter for LogsRouter {
    fn name(&self) -> &'static str {
        "logs"
    }

    fn matches(&self, parts: &http::request::Parts) -> bool {
        is_logs_request(&parts.headers)
    }

    fn call<'a>(
        &'a self,
        parts: http::request::Parts,
        body: Bytes,
    ) -> Pin<Box<dyn Future<Output = http::Response<HttpBody>> + Send + 'a>> {
        Box::pin(async move { self.0.handle(&parts, &body) })
    }
}

/// Routes CloudFormation Query requests (`POST /` form-urlencoded).
pub struct CfnRouter(pub CfnService);

impl ServiceRouter for CfnRouter {
    fn name(&self) -> &'static str {
        "cloudformation"
    }

    fn matches(&self, parts: &http::request::Parts) -> bool {
        is_cfn_request(parts)
    }

    fn call<'a>(
        &'a self,
        parts: http::request::Parts,
        body: Bytes,
    ) -> Pin<Box<dyn Future<Output = http::Response<HttpBody>> + Send + 'a>> {
        Box::pin(async move { self.0.handle(&parts, &body).await })
    }
}

/// Routes Lambda REST requests (`/2015-03-31/functions...`).
pub struct LambdaRouter(pub LambdaService);

impl ServiceRouter for LambdaRouter {
    fn name(&self) -> &'static str {
        "lambda"
    }

    fn matches(&self, parts: &http::request::Parts) -> bool {
        is_lambda_request(parts.uri.path())
    }

    fn call<'a>(
        &'a self,
        parts: http::request::Parts,
        body: Bytes,
    ) -> Pin<Box<dyn Future<Output = http::Response<HttpBody>> + Send + 'a>> {
        Box::pin(async move { self.0.handle(&parts, &body).await })
    }
}

/// Routes everything else to S3. Register it **last**.
pub struct S3Router(pub S3Service);

impl ServiceRouter for S3Router {
    fn name(&self) -> &'static str {
        "s3"
    }

    fn matches(&self, _parts: &http::request::Parts) -> bool {
        true
    }

    fn call<'a>(
        &'a self,
        parts: http::request::Parts,
        body: Bytes,
    ) -> Pin<Box<dyn Future<Output = http::Response<HttpBody>> + Send + 'a>> {
        Box::pin(async move { self.0.handle(&parts, &body) })
    }
}

/// The gateway: holds the router list and implements the hyper service.
#[derive(Clone)]
pub struct GatewayService {
    routers: Arc<Vec<Box<dyn ServiceRouter>>>,
}

impl GatewayService {
    /// Create a gateway over an ordered router list.
    #[must_use]
    pub fn new(routers: Vec<Box<dyn ServiceRouter>>) -> Self {
        Self {
            routers: Arc::new(routers),
        }
    }

    /// Names of the registered services, in routing order.
    #[must_use]
    pub fn service_names(&self) -> Vec<&'static str> {
        self.routers.iter().map(|r| r.name()).collect()
    }
}

impl hyper::service::Service<http::Request<Incoming>> for GatewayService {
    type Response = http::Response<HttpBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: http::Request<Incoming>) -> Self::Future {
        let routers = Arc::clone(&self.routers);

        Box::pin(async move {
            let (parts, incoming) = req.into_parts();

            if parts.method == http::Method::OPTIONS {
                return Ok(preflight_response());
            }
            if parts.method == http::Method::GET && parts.uri.path() == HEALTH_PATH {
                return Ok(health_response());
            }

            let body = match incoming.collect().await {
                Ok(collected) => collected.to_bytes(),
                Err(e) => {
                    error!(error = %e, "failed to read request body");
                    let mut response = http::Response::builder()
                        .status(http::StatusCode::INTERNAL_SERVER_ERROR)
                        .body(HttpBody::empty())
                        .expect("valid error response");
                    apply_cors(&mut response);
                    return Ok(response);
                }
            };

            let router = routers
                .iter()
                .find(|r| r.matches(&parts))
                .expect("the catch-all S3 router matches every request");

            let mut response = router.call(parts, body).await;
            apply_cors(&mut response);
            Ok(response)
        })
    }
}

/// The gateway health document.
fn health_response() -> http::Response<HttpBody> {
    let mut response = http::Response::builder()
        .status(http::StatusCode::OK)
        .header("content-type", "application/json")
        .body(HttpBody::from_bytes(r#"{"status":"ok"}"#))
        .expect("static health response");
    apply_cors(&mut response);
    response
}
