//! SQL Server connection implementation using tiberius

use crate::batch::CallBatch;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use futures::TryStreamExt;
use procall_core::{
    ColumnMeta, DbType, ExecuteMode, FromValue, Parameter, ProcallError, ProcedureCall,
    ProcedureConnection, ProcedureOutcome, Result, Row, RowSet, Value, coerce,
};
use rust_decimal::Decimal;
use std::time::{Duration, Instant};
use tiberius::numeric::Numeric;
use tiberius::{Client, ColumnData, Config, FromSql, IntoSql, QueryItem, ToSql};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use uuid::Uuid;

/// SQL Server driver errors
#[derive(Debug, thiserror::Error)]
pub enum MssqlError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    #[error("Command timed out after {0:?}")]
    CommandTimeout(Duration),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Invalid call: {0}")]
    InvalidCall(String),

    #[error("Unsupported type: {0}")]
    UnsupportedType(String),

    #[error("Type conversion error: {0}")]
    TypeConversion(String),

    #[error("Tiberius error: {0}")]
    Tiberius(#[from] tiberius::error::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Value(#[from] ProcallError),
}

impl From<MssqlError> for ProcallError {
    fn from(err: MssqlError) -> Self {
        match err {
            MssqlError::UnsupportedType(msg) => ProcallError::UnsupportedType(msg),
            MssqlError::Value(inner) => inner,
            other => ProcallError::ExecutionFailed(other.to_string()),
        }
    }
}

type TdsClient = Client<Compat<TcpStream>>;

/// SQL Server connection using tiberius
pub struct MssqlConnection {
    client: TdsClient,
    address: String,
}

impl MssqlConnection {
    /// Connect with an ADO.NET style connection string, e.g.
    /// `Server=tcp:localhost,1433;Database=shop;User Id=sa;Password=...;TrustServerCertificate=true`
    #[tracing::instrument(skip(connection_string))]
    pub async fn connect(
        connection_string: &str,
        connect_timeout: Option<Duration>,
    ) -> std::result::Result<Self, MssqlError> {
        let config = Config::from_ado_string(connection_string)?;
        let address = config.get_addr();
        tracing::debug!(address = %address, "connecting to SQL Server");

        let login = open_client(config);
        let client = match connect_timeout {
            Some(limit) => tokio::time::timeout(limit, login)
                .await
                .map_err(|_| MssqlError::ConnectTimeout(limit))??,
            None => login.await?,
        };

        tracing::debug!(address = %address, "connected to SQL Server");
        Ok(Self { client, address })
    }

    /// Run one call, honouring its command timeout
    pub async fn execute_call(
        &mut self,
        call: &ProcedureCall<'_>,
    ) -> std::result::Result<ProcedureOutcome, MssqlError> {
        let batch = CallBatch::build(call.procedure, call.parameters)?;
        let bound = bind_parameters(&batch.inputs)?;
        let start = Instant::now();

        let run = self.run(&batch, &bound, call.mode);
        let outcome = match call.timeout {
            Some(limit) => tokio::time::timeout(limit, run)
                .await
                .map_err(|_| MssqlError::CommandTimeout(limit))??,
            None => run.await?,
        };

        tracing::debug!(
            procedure = call.procedure,
            result_sets = outcome.result_sets.len(),
            rows_affected = outcome.rows_affected,
            outputs = outcome.output_values.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "procedure call completed"
        );
        Ok(outcome)
    }

    async fn run(
        &mut self,
        batch: &CallBatch<'_>,
        bound: &[BoundValue],
        mode: ExecuteMode,
    ) -> std::result::Result<ProcedureOutcome, MssqlError> {
        let params: Vec<&dyn ToSql> = bound.iter().map(|p| p as &dyn ToSql).collect();

        if mode == ExecuteMode::NonQuery && !batch.has_outputs() {
            let result = self.client.execute(batch.sql.as_str(), &params[..]).await?;
            let rows_affected = result.rows_affected().iter().sum::<u64>();
            return Ok(ProcedureOutcome::with_rows_affected(rows_affected));
        }

        let stream = self.client.query(batch.sql.as_str(), &params[..]).await?;
        let mut result_sets = read_result_sets(stream).await?;

        let mut outcome = ProcedureOutcome::default();
        if batch.has_outputs() {
            let values = result_sets
                .pop()
                .and_then(|set| set.rows.into_iter().next())
                .map(|row| row.values)
                .unwrap_or_default();
            outcome.output_values = batch
                .outputs
                .iter()
                .map(|name| name.to_string())
                .zip(values)
                .collect();
        }
        if mode == ExecuteMode::Reader {
            outcome.result_sets = result_sets;
        }
        Ok(outcome)
    }
}

async fn open_client(mut config: Config) -> std::result::Result<TdsClient, MssqlError> {
    let tcp = connect_tcp(&config).await?;
    match Client::connect(config.clone(), tcp.compat_write()).await {
        Ok(client) => Ok(client),
        // Azure SQL gateways hand out a redirect to the real server
        Err(tiberius::error::Error::Routing { host, port }) => {
            tracing::debug!(host = %host, port, "following SQL Server redirect");
            config.host(&host);
            config.port(port);
            let tcp = connect_tcp(&config).await?;
            Client::connect(config, tcp.compat_write())
                .await
                .map_err(|e| MssqlError::ConnectionFailed(e.to_string()))
        }
        Err(e) => Err(MssqlError::ConnectionFailed(e.to_string())),
    }
}

async fn connect_tcp(config: &Config) -> std::result::Result<TcpStream, MssqlError> {
    let tcp = TcpStream::connect(config.get_addr())
        .await
        .map_err(|e| MssqlError::ConnectionFailed(e.to_string()))?;
    tcp.set_nodelay(true)?;
    Ok(tcp)
}

#[async_trait]
impl ProcedureConnection for MssqlConnection {
    async fn call(&mut self, call: &ProcedureCall<'_>) -> Result<ProcedureOutcome> {
        self.execute_call(call).await.map_err(|e| {
            tracing::debug!(procedure = call.procedure, error = %e, "procedure call failed");
            e.into()
        })
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let address = self.address.clone();
        self.client.close().await.map_err(MssqlError::from)?;
        tracing::debug!(address = %address, "SQL Server connection closed");
        Ok(())
    }
}

/// Read every result set of a call, keeping column metadata of empty sets
async fn read_result_sets(
    mut stream: tiberius::QueryStream<'_>,
) -> std::result::Result<Vec<RowSet>, MssqlError> {
    let mut sets: Vec<RowSet> = Vec::new();
    let mut names: Vec<String> = Vec::new();

    while let Some(item) = stream.try_next().await? {
        match item {
            QueryItem::Metadata(meta) => {
                let columns: Vec<ColumnMeta> = meta
                    .columns()
                    .iter()
                    .enumerate()
                    .map(|(idx, col)| tiberius_column_to_meta(col, idx))
                    .collect();
                names = columns.iter().map(|c| c.name.clone()).collect();
                sets.push(RowSet::new(columns, Vec::new()));
            }
            QueryItem::Row(row) => {
                let values = tiberius_row_to_values(row)?;
                if let Some(set) = sets.last_mut() {
                    set.rows.push(Row::new(names.clone(), values));
                }
            }
        }
    }

    Ok(sets)
}

fn tiberius_column_to_meta(col: &tiberius::Column, ordinal: usize) -> ColumnMeta {
    ColumnMeta::new(col.name(), format!("{:?}", col.column_type()), ordinal)
}

fn tiberius_row_to_values(row: tiberius::Row) -> std::result::Result<Vec<Value>, MssqlError> {
    row.into_iter().map(column_data_to_value).collect()
}

/// Convert tiberius column data to a procall value
pub(crate) fn column_data_to_value(
    data: ColumnData<'static>,
) -> std::result::Result<Value, MssqlError> {
    let value = match data {
        ColumnData::Bit(v) => v.map_or(Value::Null, Value::Bool),
        ColumnData::U8(v) => v.map_or(Value::Null, Value::UInt8),
        ColumnData::I16(v) => v.map_or(Value::Null, Value::Int16),
        ColumnData::I32(v) => v.map_or(Value::Null, Value::Int32),
        ColumnData::I64(v) => v.map_or(Value::Null, Value::Int64),
        ColumnData::F32(v) => v.map_or(Value::Null, Value::Float32),
        ColumnData::F64(v) => v.map_or(Value::Null, Value::Float64),
        ColumnData::Guid(v) => v.map_or(Value::Null, Value::Uuid),
        ColumnData::String(v) => v.map_or(Value::Null, |s| Value::String(s.into_owned())),
        ColumnData::Binary(v) => v.map_or(Value::Null, |b| Value::Bytes(b.into_owned())),
        ColumnData::Xml(v) => v.map_or(Value::Null, |x| {
            Value::String(x.into_owned().into_string())
        }),
        ColumnData::Numeric(None) => Value::Null,
        ColumnData::Numeric(Some(n)) => {
            Decimal::try_from_i128_with_scale(n.value(), n.scale() as u32)
                .map(Value::Decimal)
                .map_err(|e| MssqlError::TypeConversion(format!("numeric {n}: {e}")))?
        }
        ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_) => {
            NaiveDateTime::from_sql(&data)?.map_or(Value::Null, Value::DateTime)
        }
        ColumnData::Date(_) => NaiveDate::from_sql(&data)?.map_or(Value::Null, Value::Date),
        ColumnData::Time(_) => NaiveTime::from_sql(&data)?.map_or(Value::Null, Value::Time),
        ColumnData::DateTimeOffset(_) => DateTime::<FixedOffset>::from_sql(&data)?
            .map_or(Value::Null, Value::DateTimeOffset),
    };
    Ok(value)
}

/// A parameter value converted to its wire representation
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct BoundValue(pub(crate) ColumnData<'static>);

impl ToSql for BoundValue {
    fn to_sql(&self) -> ColumnData<'_> {
        self.0.clone()
    }
}

pub(crate) fn bind_parameters(
    params: &[&Parameter],
) -> std::result::Result<Vec<BoundValue>, MssqlError> {
    params.iter().map(|p| bind_parameter(p)).collect()
}

/// Bind a parameter according to its declared type.
///
/// The value is coerced to the Rust type of the declared `DbType`, so an
/// `Int64` value bound as `int` is range-checked and a NULL becomes a typed
/// NULL.
pub(crate) fn bind_parameter(param: &Parameter) -> std::result::Result<BoundValue, MssqlError> {
    let data = match param.db_type {
        DbType::BigInt => typed::<i64>(param)?,
        DbType::Int => typed::<i32>(param)?,
        DbType::SmallInt => typed::<i16>(param)?,
        DbType::TinyInt => typed::<u8>(param)?,
        DbType::Bit => typed::<bool>(param)?,
        DbType::Float => typed::<f64>(param)?,
        DbType::Real => typed::<f32>(param)?,
        DbType::Decimal | DbType::Money | DbType::SmallMoney => {
            let value: Option<Decimal> = coerce(&param.value)?;
            value.map(decimal_to_numeric).into_sql()
        }
        DbType::Char
        | DbType::NChar
        | DbType::VarChar
        | DbType::NVarChar
        | DbType::Text
        | DbType::NText
        | DbType::Xml => typed::<String>(param)?,
        DbType::Binary | DbType::VarBinary | DbType::Image | DbType::Timestamp => {
            typed::<Vec<u8>>(param)?
        }
        DbType::UniqueIdentifier => typed::<Uuid>(param)?,
        DbType::DateTime | DbType::SmallDateTime | DbType::DateTime2 => {
            typed::<NaiveDateTime>(param)?
        }
        DbType::Date => typed::<NaiveDate>(param)?,
        DbType::Time => typed::<NaiveTime>(param)?,
        DbType::DateTimeOffset => typed::<DateTime<FixedOffset>>(param)?,
        DbType::Variant => return bind_variant(param),
        DbType::Udt | DbType::Structured => {
            return Err(MssqlError::UnsupportedType(format!(
                "{} parameter {} cannot be bound",
                param.db_type, param.name
            )));
        }
    };
    Ok(BoundValue(data))
}

fn typed<T>(param: &Parameter) -> std::result::Result<ColumnData<'static>, MssqlError>
where
    T: FromValue,
    Option<T>: IntoSql<'static>,
{
    let value: Option<T> = coerce(&param.value)?;
    Ok(value.into_sql())
}

/// sql_variant values are sent with the wire type of the wrapped value
fn bind_variant(param: &Parameter) -> std::result::Result<BoundValue, MssqlError> {
    let mut inner = &param.value;
    while let Value::Variant(wrapped) = inner {
        inner = wrapped;
    }
    let db_type = match inner {
        Value::Null => return Ok(BoundValue(ColumnData::I32(None))),
        Value::Int8(_) => DbType::SmallInt,
        Value::Date(_) => DbType::Date,
        Value::Time(_) => DbType::Time,
        Value::Json(_) => DbType::NVarChar,
        other => procall_core::native_to_db_type(other.native_kind()?),
    };
    if db_type == DbType::Variant {
        return Err(MssqlError::UnsupportedType(format!(
            "variant parameter {} has no concrete value",
            param.name
        )));
    }
    let concrete = Parameter {
        db_type,
        value: inner.clone(),
        ..param.clone()
    };
    bind_parameter(&concrete)
}

fn decimal_to_numeric(value: Decimal) -> Numeric {
    Numeric::new_with_scale(value.mantissa(), value.scale() as u8)
}

impl std::fmt::Debug for MssqlConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MssqlConnection")
            .field("address", &self.address)
            .finish()
    }
}
