//! Typed stored-procedure invocation
//!
//! `ProcedureInvoker` runs a stored procedure by name against a logical
//! database and shapes the result: first result set, all result sets, rows
//! affected, a scalar, output parameters or `FOR JSON` text decoded into a
//! type. Every operation has an async form and a `_blocking` form.
//!
//! ```ignore
//! let settings = AppSettings::discover()?;
//! let invoker = ProcedureInvoker::sql_server(&settings);
//!
//! let mut params = ParameterBuilder::new();
//! params.add("@CustomerId", 42i64)?;
//! params.add_output("@OrderCount", 0i32)?;
//!
//! let count: i32 = invoker
//!     .execute_with_return_param("dbo.CountOrders", &mut params, "@OrderCount", "Shop", CallOptions::propagate())
//!     .await?;
//! ```

pub mod config;
mod invoker;
pub mod logging;
mod options;
mod resolver;
pub mod runtime;

pub use config::{AppSettings, InvokerSettings, SETTINGS_FILE_NAME};
pub use invoker::{EMPTY_JSON_ARRAY, ProcedureInvoker};
pub use options::{CallOptions, ErrorPolicy};
pub use resolver::{ConnectionResolver, EnvConfigResolver};

pub use procall_core::{
    DataSet, DbType, Diagnostics, Direction, FieldMatching, FromValue, JsonCodec, LogContext,
    Parameter, ParameterBuilder, ProcallError, Result, Row, RowSet, SerdeJsonCodec,
    TracingDiagnostics, Value,
};
pub use procall_driver_mssql::MssqlDriver;
