//! Common test utilities and mocks

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use procall_core::{
    ConnectOptions, Diagnostics, ExecuteMode, LogContext, Parameter, ProcallError, ProcedureCall,
    ProcedureConnection, ProcedureDriver, ProcedureOutcome, Result, RowSet, Value,
};
use procall_invoke::ProcedureInvoker;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// Logical database name the test resolver knows about
pub const DATABASE: &str = "Main";
pub const CONNECTION_STRING: &str = "Server=tcp:mock,1433;Database=main";

/// A call as the mock driver saw it
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub procedure: String,
    pub parameters: Vec<Parameter>,
    pub timeout: Option<Duration>,
    pub mode: ExecuteMode,
}

enum Script {
    Outcome(ProcedureOutcome),
    Fail(String),
}

#[derive(Default)]
struct MockState {
    scripts: Mutex<VecDeque<Script>>,
    connect_error: Mutex<Option<String>>,
    connects: Mutex<Vec<(String, ConnectOptions)>>,
    calls: Mutex<Vec<RecordedCall>>,
    closes: Mutex<usize>,
}

/// Driver that replays scripted outcomes and records what it was asked to do.
///
/// Outcomes are consumed in order; once the script runs out every call
/// succeeds with an empty outcome.
#[derive(Clone, Default)]
pub struct MockDriver {
    state: Arc<MockState>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_outcome(self, outcome: ProcedureOutcome) -> Self {
        self.state.scripts.lock().push_back(Script::Outcome(outcome));
        self
    }

    pub fn with_result_sets(self, sets: Vec<RowSet>) -> Self {
        self.with_outcome(ProcedureOutcome::with_result_sets(sets))
    }

    pub fn with_call_error(self, message: impl Into<String>) -> Self {
        self.state
            .scripts
            .lock()
            .push_back(Script::Fail(message.into()));
        self
    }

    pub fn with_connect_error(self, message: impl Into<String>) -> Self {
        *self.state.connect_error.lock() = Some(message.into());
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.calls.lock().clone()
    }

    pub fn last_call(&self) -> RecordedCall {
        self.calls().pop().expect("no call was made")
    }

    pub fn connects(&self) -> Vec<(String, ConnectOptions)> {
        self.state.connects.lock().clone()
    }

    pub fn connect_count(&self) -> usize {
        self.state.connects.lock().len()
    }

    pub fn close_count(&self) -> usize {
        *self.state.closes.lock()
    }
}

#[async_trait]
impl ProcedureDriver for MockDriver {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn connect(
        &self,
        connection_string: &str,
        options: &ConnectOptions,
    ) -> Result<Box<dyn ProcedureConnection>> {
        self.state
            .connects
            .lock()
            .push((connection_string.to_string(), *options));
        if let Some(message) = self.state.connect_error.lock().clone() {
            return Err(ProcallError::ExecutionFailed(message));
        }
        Ok(Box::new(MockConnection {
            state: self.state.clone(),
        }))
    }
}

struct MockConnection {
    state: Arc<MockState>,
}

#[async_trait]
impl ProcedureConnection for MockConnection {
    async fn call(&mut self, call: &ProcedureCall<'_>) -> Result<ProcedureOutcome> {
        self.state.calls.lock().push(RecordedCall {
            procedure: call.procedure.to_string(),
            parameters: call.parameters.to_vec(),
            timeout: call.timeout,
            mode: call.mode,
        });
        match self.state.scripts.lock().pop_front() {
            Some(Script::Outcome(outcome)) => Ok(outcome),
            Some(Script::Fail(message)) => Err(ProcallError::ExecutionFailed(message)),
            None => Ok(ProcedureOutcome::default()),
        }
    }

    async fn close(self: Box<Self>) -> Result<()> {
        *self.state.closes.lock() += 1;
        Ok(())
    }
}

/// Diagnostics that keep every entry for assertions
#[derive(Clone, Default)]
pub struct RecordingDiagnostics {
    errors: Arc<Mutex<Vec<(String, String)>>>,
    debugs: Arc<Mutex<Vec<(String, String)>>>,
}

impl RecordingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error_count(&self) -> usize {
        self.errors.lock().len()
    }

    /// `(operation, error kind)` pairs in logging order
    pub fn errors(&self) -> Vec<(String, String)> {
        self.errors.lock().clone()
    }

    pub fn debug_count(&self) -> usize {
        self.debugs.lock().len()
    }
}

impl Diagnostics for RecordingDiagnostics {
    fn debug(&self, ctx: &LogContext<'_>, message: &str) {
        self.debugs
            .lock()
            .push((ctx.operation.to_string(), message.to_string()));
    }

    fn error(&self, ctx: &LogContext<'_>, error: &ProcallError) {
        self.errors
            .lock()
            .push((ctx.operation.to_string(), error.kind().to_string()));
    }
}

/// Invoker over `driver` that resolves only `DATABASE`
pub fn invoker(driver: &MockDriver, diagnostics: &RecordingDiagnostics) -> ProcedureInvoker {
    let resolver = |name: &str| {
        if name == DATABASE {
            CONNECTION_STRING.to_string()
        } else {
            String::new()
        }
    };
    ProcedureInvoker::new(driver.clone(), resolver).with_diagnostics(diagnostics.clone())
}

/// Single-column result set of JSON fragments, as `FOR JSON` returns them
pub fn json_rows(fragments: &[&str]) -> RowSet {
    RowSet::from_values(
        &["JSON_F52E2B61-18A1-11d1-B105-00805F49916B"],
        fragments
            .iter()
            .map(|f| vec![Value::String(f.to_string())])
            .collect(),
    )
}
