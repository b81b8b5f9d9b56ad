//! Invocation log sink.
//!
//! The runtime publishes its `START`/`RESULT|ERROR`/`END` trail through this
//! trait so the ledger stays decoupled from the runtime; the binary wires a
//! sink backed by the log store.

/// Receiver for invocation log events.
pub trait InvocationLogSink: Send + Sync {
    /// Publish one log message with an explicit timestamp (epoch millis).
    fn publish(&self, group: &str, stream: &str, message: &str, timestamp: i64);
}

/// Sink that drops everything; useful for tests and ad-hoc invocations.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl InvocationLogSink for NullSink {
    fn publish(&self, _group: &str, _stream: &str, _message: &str, _timestamp: i64) {}
}
