//! T-SQL batch for one stored-procedure call
//!
//! tiberius only sends parameterized batches, not RPC calls with output
//! parameters, so output values travel through locals:
//!
//! ```sql
//! DECLARE @__out0 int;
//! DECLARE @__out1 nvarchar(4000) = @P2;
//! DECLARE @__ret int;
//! EXEC @__ret = dbo.SaveOrder @Id = @P1, @Count = @__out0 OUTPUT, @Note = @__out1 OUTPUT;
//! SELECT @__out0 AS [@Count], @__out1 AS [@Note], @__ret AS [@RETURN_VALUE];
//! ```
//!
//! The trailing SELECT is always the last result set of the call.

use crate::connection::MssqlError;
use procall_core::{DbType, Direction, Parameter, ParameterBuilder, VARCHAR_MAX_SIZE};

const NCHAR_MAX_SIZE: i32 = 4000;
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// A generated call batch plus what it binds and returns
#[derive(Debug)]
pub(crate) struct CallBatch<'a> {
    pub sql: String,
    /// Parameters bound as `@P1..@Pn`, in order
    pub inputs: Vec<&'a Parameter>,
    /// Builder names of the values in the trailing SELECT, in column order
    pub outputs: Vec<&'a str>,
}

impl<'a> CallBatch<'a> {
    pub fn build(procedure: &str, parameters: &'a ParameterBuilder) -> Result<Self, MssqlError> {
        validate_procedure_name(procedure)?;

        let mut declarations = Vec::new();
        let mut arguments = Vec::new();
        let mut selects = Vec::new();
        let mut inputs: Vec<&'a Parameter> = Vec::new();
        let mut outputs: Vec<&'a str> = Vec::new();
        let mut has_return = false;
        let mut locals = 0usize;

        for param in parameters {
            let name = parameter_name(&param.name)?;
            match param.direction {
                Direction::Input => {
                    inputs.push(param);
                    arguments.push(format!("{name} = @P{}", inputs.len()));
                }
                Direction::Output | Direction::InputOutput => {
                    let local = format!("@__out{locals}");
                    locals += 1;
                    let sql_type = sql_type_declaration(param)?;
                    if param.direction == Direction::InputOutput {
                        inputs.push(param);
                        declarations.push(format!(
                            "DECLARE {local} {sql_type} = @P{};",
                            inputs.len()
                        ));
                    } else {
                        declarations.push(format!("DECLARE {local} {sql_type};"));
                    }
                    arguments.push(format!("{name} = {local} OUTPUT"));
                    selects.push(format!("{local} AS [{name}]"));
                    outputs.push(param.name.as_str());
                }
                Direction::ReturnValue => {
                    if has_return {
                        return Err(MssqlError::InvalidCall(format!(
                            "more than one return value parameter ({})",
                            param.name
                        )));
                    }
                    has_return = true;
                    declarations.push("DECLARE @__ret int;".to_string());
                    selects.push(format!("@__ret AS [{name}]"));
                    outputs.push(param.name.as_str());
                }
            }
        }

        let mut exec = String::from("EXEC ");
        if has_return {
            exec.push_str("@__ret = ");
        }
        exec.push_str(procedure);
        if !arguments.is_empty() {
            exec.push(' ');
            exec.push_str(&arguments.join(", "));
        }
        exec.push(';');

        let mut lines = declarations;
        lines.push(exec);
        if !selects.is_empty() {
            lines.push(format!("SELECT {};", selects.join(", ")));
        }

        Ok(Self {
            sql: lines.join("\n"),
            inputs,
            outputs,
        })
    }

    pub fn has_outputs(&self) -> bool {
        !self.outputs.is_empty()
    }
}

/// T-SQL type used to declare the local that carries an output value
pub(crate) fn sql_type_declaration(param: &Parameter) -> Result<String, MssqlError> {
    let declared = match param.db_type {
        DbType::BigInt => "bigint".to_string(),
        DbType::Int => "int".to_string(),
        DbType::SmallInt => "smallint".to_string(),
        DbType::TinyInt => "tinyint".to_string(),
        DbType::Bit => "bit".to_string(),
        DbType::Float => "float".to_string(),
        DbType::Real => "real".to_string(),
        DbType::Money => "money".to_string(),
        DbType::SmallMoney => "smallmoney".to_string(),
        DbType::UniqueIdentifier => "uniqueidentifier".to_string(),
        DbType::DateTime => "datetime".to_string(),
        DbType::SmallDateTime => "smalldatetime".to_string(),
        DbType::Date => "date".to_string(),
        DbType::Time => "time".to_string(),
        DbType::DateTime2 => "datetime2".to_string(),
        DbType::DateTimeOffset => "datetimeoffset".to_string(),
        // text, ntext and image locals are not allowed
        DbType::Text => "varchar(max)".to_string(),
        DbType::NText => "nvarchar(max)".to_string(),
        DbType::Image => "varbinary(max)".to_string(),
        DbType::Timestamp => "binary(8)".to_string(),
        DbType::Xml => "xml".to_string(),
        DbType::Variant => "sql_variant".to_string(),
        DbType::Udt | DbType::Structured => {
            return Err(MssqlError::UnsupportedType(format!(
                "{} parameter {} cannot carry an output value",
                param.db_type, param.name
            )));
        }
        db_type if db_type.has_precision() => decimal(param.precision, param.scale),
        db_type if db_type.is_sized() => sized(db_type, param.size),
        db_type => {
            return Err(MssqlError::UnsupportedType(format!(
                "no local declaration for {db_type} parameter {}",
                param.name
            )));
        }
    };
    Ok(declared)
}

/// `base(n)` when the size fits the type, else the variable-length `(max)` form
fn sized(db_type: DbType, size: Option<i32>) -> String {
    let (base, limit, max_form) = match db_type {
        DbType::Char => ("char", VARCHAR_MAX_SIZE, "varchar(max)"),
        DbType::NChar => ("nchar", NCHAR_MAX_SIZE, "nvarchar(max)"),
        DbType::Binary => ("binary", VARCHAR_MAX_SIZE, "varbinary(max)"),
        DbType::VarChar => ("varchar", VARCHAR_MAX_SIZE, "varchar(max)"),
        DbType::NVarChar => ("nvarchar", NCHAR_MAX_SIZE, "nvarchar(max)"),
        _ => ("varbinary", VARCHAR_MAX_SIZE, "varbinary(max)"),
    };
    match size {
        Some(n) if n > 0 && n <= limit => format!("{base}({n})"),
        _ => max_form.to_string(),
    }
}

fn decimal(precision: u8, scale: u8) -> String {
    if precision == 0 {
        return "decimal(38,10)".to_string();
    }
    let precision = precision.min(38);
    format!("decimal({},{})", precision, scale.min(precision))
}

/// Check a possibly qualified procedure name such as `dbo.GetOrders` or
/// `[sales].[Get Orders]`
pub(crate) fn validate_procedure_name(name: &str) -> Result<(), MssqlError> {
    let parts = split_name_parts(name);
    let valid = (1..=4).contains(&parts.len())
        && parts
            .iter()
            .all(|part| is_regular_identifier(part) || is_bracketed_identifier(part));
    if valid {
        Ok(())
    } else {
        Err(MssqlError::InvalidIdentifier(name.to_string()))
    }
}

/// Parameter name with its `@` prefix, added when missing
pub(crate) fn parameter_name(name: &str) -> Result<String, MssqlError> {
    let bare = name.strip_prefix('@').unwrap_or(name);
    if is_regular_identifier(bare) && !bare.starts_with('#') {
        Ok(format!("@{bare}"))
    } else {
        Err(MssqlError::InvalidIdentifier(name.to_string()))
    }
}

fn split_name_parts(name: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    for (idx, c) in name.char_indices() {
        match c {
            '[' => quoted = true,
            ']' => quoted = false,
            '.' if !quoted => {
                parts.push(&name[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(&name[start..]);
    parts
}

fn is_regular_identifier(part: &str) -> bool {
    let mut chars = part.chars();
    let first_ok = matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_' || c == '#');
    first_ok
        && part.chars().count() <= MAX_IDENTIFIER_LENGTH
        && chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '@' | '#' | '$'))
}

fn is_bracketed_identifier(part: &str) -> bool {
    let Some(inner) = part
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
    else {
        return false;
    };
    !inner.is_empty()
        && inner.chars().count() <= MAX_IDENTIFIER_LENGTH
        && !inner.contains(['[', ']'])
        && !inner.chars().any(char::is_control)
}
