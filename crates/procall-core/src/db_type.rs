//! Mapping between native value kinds and SQL Server column types
//!
//! Both directions are total over their domain. `DbType` is closed, so the
//! reverse mapping is an exhaustive match; the forward mapping is total over
//! `NativeKind`, and anything outside that set (a `Value::Json`, a NULL, a
//! type name nobody knows) surfaces as `ProcallError::UnsupportedType`.

use crate::{ProcallError, Result, RowSet, Value};
use chrono::{DateTime, FixedOffset, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};
use uuid::Uuid;

/// Size given to text parameters whose type is inferred from a value.
///
/// Inference never picks the 8000 ceiling or MAX, whatever the string length.
pub const NVARCHAR_DEFAULT_SIZE: i32 = 4000;

/// Largest explicit width for varchar/varbinary before MAX.
pub const VARCHAR_MAX_SIZE: i32 = 8000;

/// Size value meaning `(max)`.
pub const SIZE_MAX: i32 = -1;

/// SQL Server column types
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum DbType {
    BigInt,
    Binary,
    Bit,
    Char,
    DateTime,
    Decimal,
    Float,
    Image,
    Int,
    Money,
    NChar,
    NText,
    NVarChar,
    Real,
    UniqueIdentifier,
    SmallDateTime,
    SmallInt,
    SmallMoney,
    Text,
    Timestamp,
    TinyInt,
    VarBinary,
    VarChar,
    #[strum(to_string = "sql_variant", serialize = "variant")]
    Variant,
    Xml,
    Udt,
    Structured,
    Date,
    Time,
    DateTime2,
    DateTimeOffset,
}

impl DbType {
    /// Parse a type name such as `nvarchar` or `DateTime2`.
    pub fn parse(name: &str) -> Result<Self> {
        name.trim()
            .parse::<Self>()
            .map_err(|_| ProcallError::UnsupportedType(format!("unknown database type '{name}'")))
    }

    /// Whether a size is meaningful for this type
    pub fn is_sized(self) -> bool {
        matches!(
            self,
            DbType::Char
                | DbType::NChar
                | DbType::VarChar
                | DbType::NVarChar
                | DbType::Binary
                | DbType::VarBinary
        )
    }

    /// Whether precision and scale are meaningful for this type
    pub fn has_precision(self) -> bool {
        matches!(self, DbType::Decimal)
    }
}

/// Native value kinds the parameter builder can infer a `DbType` from
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum NativeKind {
    Int64,
    Bytes,
    Bool,
    String,
    DateTime,
    Decimal,
    Float64,
    Int32,
    Float32,
    Uuid,
    Int16,
    #[strum(to_string = "uint8")]
    UInt8,
    Variant,
    Table,
    DateTimeOffset,
}

impl NativeKind {
    pub fn parse(name: &str) -> Result<Self> {
        name.trim()
            .parse::<Self>()
            .map_err(|_| ProcallError::UnsupportedType(format!("unknown native kind '{name}'")))
    }

    /// Whether the host type has a separate nullable form
    fn is_value_type(self) -> bool {
        !matches!(
            self,
            NativeKind::Bytes | NativeKind::String | NativeKind::Variant | NativeKind::Table
        )
    }
}

/// A native kind plus whether it is the nullable form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeType {
    pub kind: NativeKind,
    pub nullable: bool,
}

impl NativeType {
    fn of(kind: NativeKind) -> Self {
        Self {
            kind,
            nullable: kind.is_value_type(),
        }
    }
}

/// Map a native kind to the database type used when binding it
pub fn native_to_db_type(kind: NativeKind) -> DbType {
    match kind {
        NativeKind::Int64 => DbType::BigInt,
        NativeKind::Bytes => DbType::VarBinary,
        NativeKind::Bool => DbType::Bit,
        NativeKind::String => DbType::NVarChar,
        NativeKind::DateTime => DbType::DateTime,
        NativeKind::Decimal => DbType::Decimal,
        NativeKind::Float64 => DbType::Float,
        NativeKind::Int32 => DbType::Int,
        NativeKind::Float32 => DbType::Real,
        NativeKind::Uuid => DbType::UniqueIdentifier,
        NativeKind::Int16 => DbType::SmallInt,
        NativeKind::UInt8 => DbType::TinyInt,
        NativeKind::Variant => DbType::Variant,
        NativeKind::Table => DbType::Structured,
        NativeKind::DateTimeOffset => DbType::DateTimeOffset,
    }
}

/// Map a database type to the native type its values are read as
pub fn db_type_to_native_type(db_type: DbType) -> NativeType {
    let kind = match db_type {
        DbType::BigInt => NativeKind::Int64,
        DbType::Binary | DbType::Image | DbType::Timestamp | DbType::VarBinary => NativeKind::Bytes,
        DbType::Bit => NativeKind::Bool,
        DbType::Char
        | DbType::NChar
        | DbType::NText
        | DbType::NVarChar
        | DbType::Text
        | DbType::VarChar
        | DbType::Xml => NativeKind::String,
        DbType::DateTime
        | DbType::SmallDateTime
        | DbType::Date
        | DbType::Time
        | DbType::DateTime2 => NativeKind::DateTime,
        DbType::Decimal | DbType::Money | DbType::SmallMoney => NativeKind::Decimal,
        DbType::Float => NativeKind::Float64,
        DbType::Int => NativeKind::Int32,
        DbType::Real => NativeKind::Float32,
        DbType::UniqueIdentifier => NativeKind::Uuid,
        DbType::SmallInt => NativeKind::Int16,
        DbType::TinyInt => NativeKind::UInt8,
        DbType::Variant | DbType::Udt => NativeKind::Variant,
        DbType::Structured => NativeKind::Table,
        DbType::DateTimeOffset => NativeKind::DateTimeOffset,
    };
    NativeType::of(kind)
}

/// Rust types with a fixed native kind.
///
/// Lets the mapping be checked at compile time: `db_type_of::<Option<i32>>()`
/// is `DbType::Int`, and types outside the supported set do not compile.
pub trait NativeValue {
    const KIND: NativeKind;
}

macro_rules! native_value {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(impl NativeValue for $ty {
            const KIND: NativeKind = NativeKind::$kind;
        })*
    };
}

native_value! {
    i64 => Int64,
    Vec<u8> => Bytes,
    bool => Bool,
    String => String,
    NaiveDateTime => DateTime,
    Decimal => Decimal,
    f64 => Float64,
    i32 => Int32,
    f32 => Float32,
    Uuid => Uuid,
    i16 => Int16,
    u8 => UInt8,
    Value => Variant,
    RowSet => Table,
    DateTime<FixedOffset> => DateTimeOffset,
}

impl<T: NativeValue> NativeValue for Option<T> {
    const KIND: NativeKind = T::KIND;
}

pub fn db_type_of<T: NativeValue>() -> DbType {
    native_to_db_type(T::KIND)
}

impl Value {
    /// The native kind of a concrete value, used for type inference
    pub fn native_kind(&self) -> Result<NativeKind> {
        match self {
            Value::Int64(_) => Ok(NativeKind::Int64),
            Value::Bytes(_) => Ok(NativeKind::Bytes),
            Value::Bool(_) => Ok(NativeKind::Bool),
            Value::String(_) => Ok(NativeKind::String),
            Value::DateTime(_) => Ok(NativeKind::DateTime),
            Value::Decimal(_) => Ok(NativeKind::Decimal),
            Value::Float64(_) => Ok(NativeKind::Float64),
            Value::Int32(_) => Ok(NativeKind::Int32),
            Value::Float32(_) => Ok(NativeKind::Float32),
            Value::Uuid(_) => Ok(NativeKind::Uuid),
            Value::Int16(_) => Ok(NativeKind::Int16),
            Value::UInt8(_) => Ok(NativeKind::UInt8),
            Value::Variant(_) => Ok(NativeKind::Variant),
            Value::Table(_) => Ok(NativeKind::Table),
            Value::DateTimeOffset(_) => Ok(NativeKind::DateTimeOffset),
            Value::Null => Err(ProcallError::UnsupportedType(
                "cannot infer a database type from NULL".into(),
            )),
            Value::Int8(_) | Value::Date(_) | Value::Time(_) | Value::Json(_) => Err(
                ProcallError::UnsupportedType(format!(
                    "no database type mapping for {} values",
                    self.type_name()
                )),
            ),
        }
    }
}
