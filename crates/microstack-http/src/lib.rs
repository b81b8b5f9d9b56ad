//! Per-service HTTP services and wire codecs for MicroStack.
//!
//! One module per dialect: Lambda REST-JSON, CloudWatch Logs JSON 1.1
//! (`X-Amz-Target` routing), S3 REST-XML (path-style), and CloudFormation
//! Query/XML (form-urlencoded actions). The gateway binary collects each
//! request body and hands `(parts, bytes)` to the matching service; every
//! service returns a complete `http::Response<HttpBody>`.

pub mod body;
pub mod cfn;
pub mod lambda;
pub mod logs;
pub mod respond;
pub mod s3;
mod xml;

pub use body::HttpBody;
