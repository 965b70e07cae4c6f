//! Diagnostics sink for invocation events

use crate::ProcallError;

/// Where a diagnostic came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogContext<'a> {
    /// Invocation operation, e.g. "execute_scalar"
    pub operation: &'static str,
    pub procedure: &'a str,
    /// Target type for generic operations
    pub requested_type: Option<&'static str>,
}

impl<'a> LogContext<'a> {
    pub fn new(operation: &'static str, procedure: &'a str) -> Self {
        Self {
            operation,
            procedure,
            requested_type: None,
        }
    }

    pub fn with_type(mut self, requested_type: &'static str) -> Self {
        self.requested_type = Some(requested_type);
        self
    }
}

/// Receives debug messages and failures from the invocation layer.
///
/// The invoker calls `error` exactly once per failed operation.
pub trait Diagnostics: Send + Sync {
    fn debug(&self, ctx: &LogContext<'_>, message: &str);

    fn error(&self, ctx: &LogContext<'_>, error: &ProcallError);
}

/// Diagnostics emitted as `tracing` events
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn debug(&self, ctx: &LogContext<'_>, message: &str) {
        tracing::debug!(
            operation = ctx.operation,
            procedure = ctx.procedure,
            requested_type = ctx.requested_type.unwrap_or(""),
            "{}",
            message
        );
    }

    fn error(&self, ctx: &LogContext<'_>, error: &ProcallError) {
        tracing::error!(
            operation = ctx.operation,
            procedure = ctx.procedure,
            requested_type = ctx.requested_type.unwrap_or(""),
            kind = error.kind(),
            "{}",
            error
        );
    }
}

/// Diagnostics that drop everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDiagnostics;

impl Diagnostics for NoopDiagnostics {
    fn debug(&self, _ctx: &LogContext<'_>, _message: &str) {}

    fn error(&self, _ctx: &LogContext<'_>, _error: &ProcallError) {}
}
