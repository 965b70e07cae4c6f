//! procall core - types and traits shared by the invocation layer and drivers
//!
//! This crate provides the pieces every other procall crate depends on:
//!
//! - `DbType` / `NativeKind` - the two sides of the type mapping
//! - `Value`, `Row`, `RowSet`, `DataSet` - dynamically typed data
//! - `ParameterBuilder` - named, typed, directional call parameters
//! - `FromValue` - the "change type" coercion used for results
//! - `ProcedureDriver` / `ProcedureConnection` - what a driver must provide
//! - `Diagnostics` and `JsonCodec` - injectable logging and JSON capabilities

mod coerce;
mod db_type;
mod diagnostics;
mod driver;
mod error;
pub mod json;
mod parameter;
mod types;

pub use coerce::*;
pub use db_type::*;
pub use diagnostics::*;
pub use driver::*;
pub use error::*;
pub use json::{FieldMatching, JsonCodec, SerdeJsonCodec, decode_json, encode_json};
pub use parameter::*;
pub use types::*;
