//! Driver contract for executing stored procedures

use crate::{ParameterBuilder, Result, RowSet, Value};
use async_trait::async_trait;
use std::time::Duration;

/// Options applied when opening a connection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Upper bound for TCP connect plus login; `None` leaves it to the driver
    pub connect_timeout: Option<Duration>,
}

impl ConnectOptions {
    pub fn with_connect_timeout(timeout: Duration) -> Self {
        Self {
            connect_timeout: Some(timeout),
        }
    }
}

/// How the driver should treat the call's results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExecuteMode {
    /// Read every result set
    #[default]
    Reader,
    /// Only rows affected and output values are needed
    NonQuery,
}

/// One stored-procedure call as handed to a driver
#[derive(Debug, Clone, Copy)]
pub struct ProcedureCall<'a> {
    pub procedure: &'a str,
    pub parameters: &'a ParameterBuilder,
    /// Command timeout; `None` means no limit
    pub timeout: Option<Duration>,
    pub mode: ExecuteMode,
}

impl<'a> ProcedureCall<'a> {
    pub fn new(procedure: &'a str, parameters: &'a ParameterBuilder) -> Self {
        Self {
            procedure,
            parameters,
            timeout: None,
            mode: ExecuteMode::Reader,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_mode(mut self, mode: ExecuteMode) -> Self {
        self.mode = mode;
        self
    }
}

/// What a call produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcedureOutcome {
    /// Result sets in the order the procedure produced them
    pub result_sets: Vec<RowSet>,
    pub rows_affected: u64,
    /// Values of output, input-output and return-value parameters by name
    pub output_values: Vec<(String, Value)>,
}

impl ProcedureOutcome {
    pub fn with_result_sets(result_sets: Vec<RowSet>) -> Self {
        Self {
            result_sets,
            ..Default::default()
        }
    }

    pub fn with_rows_affected(rows_affected: u64) -> Self {
        Self {
            rows_affected,
            ..Default::default()
        }
    }

    pub fn output(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.output_values.push((name.into(), value.into()));
        self
    }

    /// Write output values back into the builder they came from.
    ///
    /// Returns how many parameters were updated.
    pub fn apply_outputs(&self, parameters: &mut ParameterBuilder) -> usize {
        self.output_values
            .iter()
            .filter(|(name, value)| parameters.set_output_value(name, value.clone()))
            .count()
    }
}

/// A database driver able to open procedure-capable connections
#[async_trait]
pub trait ProcedureDriver: Send + Sync {
    /// Driver name, e.g. "mssql"
    fn name(&self) -> &'static str;

    /// Open a connection from a driver-specific connection string
    async fn connect(
        &self,
        connection_string: &str,
        options: &ConnectOptions,
    ) -> Result<Box<dyn ProcedureConnection>>;
}

/// An open connection owned by a single invocation
#[async_trait]
pub trait ProcedureConnection: Send {
    /// Execute one stored-procedure call
    async fn call(&mut self, call: &ProcedureCall<'_>) -> Result<ProcedureOutcome>;

    /// Release the connection
    async fn close(self: Box<Self>) -> Result<()>;
}
