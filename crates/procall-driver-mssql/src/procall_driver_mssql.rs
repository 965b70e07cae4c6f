//! SQL Server driver for procall
//!
//! Calls stored procedures over TDS using tiberius. Output, input-output and
//! return-value parameters are carried through T-SQL locals, see `batch`.

mod batch;
mod connection;
mod driver;

#[cfg(test)]
mod batch_tests;
#[cfg(test)]
mod connection_tests;
#[cfg(test)]
mod driver_tests;

pub use connection::{MssqlConnection, MssqlError};
pub use driver::MssqlDriver;
