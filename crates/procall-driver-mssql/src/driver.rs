//! SQL Server driver implementation

use crate::connection::MssqlConnection;
use async_trait::async_trait;
use procall_core::{ConnectOptions, ProcedureConnection, ProcedureDriver, Result};

/// SQL Server stored-procedure driver
#[derive(Debug, Clone, Copy)]
pub struct MssqlDriver;

impl MssqlDriver {
    pub fn new() -> Self {
        tracing::debug!("SQL Server driver initialized");
        Self
    }
}

impl Default for MssqlDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcedureDriver for MssqlDriver {
    fn name(&self) -> &'static str {
        "mssql"
    }

    #[tracing::instrument(skip(self, connection_string))]
    async fn connect(
        &self,
        connection_string: &str,
        options: &ConnectOptions,
    ) -> Result<Box<dyn ProcedureConnection>> {
        let connection = MssqlConnection::connect(connection_string, options.connect_timeout)
            .await
            .map_err(|e| {
                tracing::debug!(error = %e, "SQL Server connect failed");
                e
            })?;
        Ok(Box::new(connection))
    }
}
