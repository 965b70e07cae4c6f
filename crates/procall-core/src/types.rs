//! Core data types for procall

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A database value that can represent any SQL Server type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Database NULL
    Null,
    /// Boolean
    Bool(bool),
    /// 8-bit signed integer
    Int8(i8),
    /// 8-bit unsigned integer
    UInt8(u8),
    /// 16-bit signed integer
    Int16(i16),
    /// 32-bit signed integer
    Int32(i32),
    /// 64-bit signed integer
    Int64(i64),
    /// 32-bit floating point
    Float32(f32),
    /// 64-bit floating point
    Float64(f64),
    /// Decimal/Numeric/Money
    Decimal(Decimal),
    /// UTF-8 string
    String(String),
    /// Binary data
    Bytes(Vec<u8>),
    /// UUID (uniqueidentifier)
    Uuid(Uuid),
    /// Date without time
    Date(NaiveDate),
    /// Time of day
    Time(NaiveTime),
    /// DateTime without offset
    DateTime(NaiveDateTime),
    /// DateTime with a fixed UTC offset
    DateTimeOffset(DateTime<FixedOffset>),
    /// JSON value
    Json(serde_json::Value),
    /// Opaque value sent as sql_variant
    Variant(Box<Value>),
    /// Table-valued (structured) value
    Table(RowSet),
}

impl Value {
    /// Check if the value is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Try to get as a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Lower-case name of the variant, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int8(_) => "i8",
            Value::UInt8(_) => "u8",
            Value::Int16(_) => "i16",
            Value::Int32(_) => "i32",
            Value::Int64(_) => "i64",
            Value::Float32(_) => "f32",
            Value::Float64(_) => "f64",
            Value::Decimal(_) => "decimal",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Uuid(_) => "uuid",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::DateTime(_) => "datetime",
            Value::DateTimeOffset(_) => "datetimeoffset",
            Value::Json(_) => "json",
            Value::Variant(_) => "variant",
            Value::Table(_) => "table",
        }
    }

    /// Type name plus a shortened rendering of the value
    pub fn describe(&self) -> String {
        const MAX: usize = 40;
        let text = self.to_string();
        if text.chars().count() > MAX {
            let short: String = text.chars().take(MAX).collect();
            format!("{} '{}...'", self.type_name(), short)
        } else {
            format!("{} '{}'", self.type_name(), text)
        }
    }

    /// Text form used when a value is read as a string column.
    ///
    /// NULL becomes the empty string rather than `NULL`.
    pub fn to_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Variant(inner) => inner.to_text(),
            other => other.to_string(),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int8(v) => write!(f, "{}", v),
            Value::UInt8(v) => write!(f, "{}", v),
            Value::Int16(v) => write!(f, "{}", v),
            Value::Int32(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::Float32(v) => write!(f, "{}", v),
            Value::Float64(v) => write!(f, "{}", v),
            Value::Decimal(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "{}", v),
            Value::Bytes(v) => write!(f, "<{} bytes>", v.len()),
            Value::Uuid(v) => write!(f, "{}", v),
            Value::Date(v) => write!(f, "{}", v),
            Value::Time(v) => write!(f, "{}", v),
            Value::DateTime(v) => write!(f, "{}", v),
            Value::DateTimeOffset(v) => write!(f, "{}", v.to_rfc3339()),
            Value::Json(v) => write!(f, "{}", v),
            Value::Variant(v) => write!(f, "{}", v),
            Value::Table(t) => write!(f, "[{} rows]", t.row_count()),
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

value_from! {
    bool => Bool,
    i8 => Int8,
    u8 => UInt8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    f32 => Float32,
    f64 => Float64,
    Decimal => Decimal,
    String => String,
    Vec<u8> => Bytes,
    Uuid => Uuid,
    NaiveDate => Date,
    NaiveTime => Time,
    NaiveDateTime => DateTime,
    DateTime<FixedOffset> => DateTimeOffset,
    serde_json::Value => Json,
    RowSet => Table,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::DateTimeOffset(v.fixed_offset())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// A row from a result set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    /// Column values
    pub values: Vec<Value>,
    /// Column names
    columns: Vec<String>,
}

impl Row {
    /// Create a new row
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        Self { values, columns }
    }

    /// Get a value by column index
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Get a value by column name
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == name)
            .and_then(|idx| self.values.get(idx))
    }
}

/// Column metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ColumnMeta {
    /// Column name
    #[serde(default)]
    pub name: String,
    /// Data type as reported by the driver
    #[serde(default)]
    pub data_type: String,
    /// Whether the column can be NULL
    #[serde(default)]
    pub nullable: bool,
    /// Column ordinal position (0-based)
    #[serde(default)]
    pub ordinal: usize,
}

impl ColumnMeta {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, ordinal: usize) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            ordinal,
        }
    }
}

/// One result set: column metadata plus rows
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RowSet {
    /// Column metadata
    pub columns: Vec<ColumnMeta>,
    /// Result rows
    pub rows: Vec<Row>,
}

impl RowSet {
    /// Create an empty row set with no columns
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(columns: Vec<ColumnMeta>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    /// Build a row set from column names and raw row values
    pub fn from_values(columns: &[&str], rows: Vec<Vec<Value>>) -> Self {
        let names: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        let metas = names
            .iter()
            .enumerate()
            .map(|(idx, name)| ColumnMeta::new(name.clone(), "", idx))
            .collect();
        let rows = rows
            .into_iter()
            .map(|values| Row::new(names.clone(), values))
            .collect();
        Self::new(metas, rows)
    }

    /// Check if the row set has rows
    pub fn has_rows(&self) -> bool {
        !self.rows.is_empty()
    }

    /// Get the number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Column names in ordinal order
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// First column of the first row, if any
    pub fn first_value(&self) -> Option<&Value> {
        self.rows.first().and_then(|row| row.get(0))
    }
}

/// All result sets produced by one call
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DataSet {
    pub tables: Vec<RowSet>,
}

impl DataSet {
    pub fn new(tables: Vec<RowSet>) -> Self {
        Self { tables }
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
