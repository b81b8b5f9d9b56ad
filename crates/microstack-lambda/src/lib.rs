//! Lambda function registry and invocation runtime for MicroStack.
//!
//! The registry stores code bundles and configuration with monotonic
//! versioning. The runtime materialises a bundle into a per-invocation
//! scratch directory, runs the handler in a fresh Node.js subprocess,
//! enforces the configured timeout, classifies faults into AWS-shaped
//! payloads, and publishes the `START`/`RESULT|ERROR`/`END` trail through an
//! injected log sink.

mod error;
pub mod model;
mod registry;
mod runtime;
mod sink;

pub use error::{LambdaError, LambdaResult};
pub use registry::{ConfigPatch, FunctionRecord, FunctionRegistry, NewFunction, ACCEPTED_RUNTIME};
pub use runtime::bundle::bundle_from_source;
pub use runtime::{FunctionRuntime, InvokeResult};
pub use sink::{InvocationLogSink, NullSink};
