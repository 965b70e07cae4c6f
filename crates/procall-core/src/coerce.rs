//! Value coercion ("change type")
//!
//! `FromValue` converts a dynamically typed `Value` into a concrete Rust
//! type. It is used for scalar results, output parameters and typed
//! parameter lookups. Conversions are lossless or range-checked: an `i64`
//! that does not fit an `i32` is an error, not a wrap.

use crate::{ProcallError, Result, Value};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use uuid::Uuid;

/// Conversion from a `Value` into a concrete type
pub trait FromValue: Sized {
    /// Name of the target type, reported in `CoercionFailed`
    const TYPE_NAME: &'static str;

    fn from_value(value: &Value) -> Result<Self>;
}

/// Coerce a value, unwrapping `Variant` first
pub fn coerce<T: FromValue>(value: &Value) -> Result<T> {
    T::from_value(unwrap_variant(value))
}

/// Coerce a value, falling back to `T::default()` on any failure
pub fn coerce_or_default<T: FromValue + Default>(value: &Value) -> T {
    coerce(value).unwrap_or_default()
}

fn unwrap_variant(value: &Value) -> &Value {
    match value {
        Value::Variant(inner) => unwrap_variant(inner),
        other => other,
    }
}

/// Integral view of a value, used by every integer target
fn to_i128(value: &Value, to: &'static str) -> Result<i128> {
    let fail = || ProcallError::coercion(value, to);
    match value {
        Value::Bool(b) => Ok(*b as i128),
        Value::Int8(v) => Ok(*v as i128),
        Value::UInt8(v) => Ok(*v as i128),
        Value::Int16(v) => Ok(*v as i128),
        Value::Int32(v) => Ok(*v as i128),
        Value::Int64(v) => Ok(*v as i128),
        Value::Float32(v) => float_to_i128(*v as f64).ok_or_else(fail),
        Value::Float64(v) => float_to_i128(*v).ok_or_else(fail),
        Value::Decimal(d) => d
            .round_dp_with_strategy(0, rust_decimal::RoundingStrategy::MidpointNearestEven)
            .to_i128()
            .ok_or_else(fail),
        Value::String(s) => s.trim().parse::<i128>().map_err(|_| fail()),
        _ => Err(fail()),
    }
}

fn float_to_i128(v: f64) -> Option<i128> {
    if !v.is_finite() {
        return None;
    }
    let rounded = v.round_ties_even();
    if rounded < i128::MIN as f64 || rounded > i128::MAX as f64 {
        return None;
    }
    Some(rounded as i128)
}

fn to_f64(value: &Value, to: &'static str) -> Result<f64> {
    let fail = || ProcallError::coercion(value, to);
    match value {
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::Int8(v) => Ok(*v as f64),
        Value::UInt8(v) => Ok(*v as f64),
        Value::Int16(v) => Ok(*v as f64),
        Value::Int32(v) => Ok(*v as f64),
        Value::Int64(v) => Ok(*v as f64),
        Value::Float32(v) => Ok(*v as f64),
        Value::Float64(v) => Ok(*v),
        Value::Decimal(d) => d.to_f64().ok_or_else(fail),
        Value::String(s) => s.trim().parse::<f64>().map_err(|_| fail()),
        _ => Err(fail()),
    }
}

macro_rules! integer_from_value {
    ($($ty:ty),*) => {
        $(
            impl FromValue for $ty {
                const TYPE_NAME: &'static str = stringify!($ty);

                fn from_value(value: &Value) -> Result<Self> {
                    let wide = to_i128(value, Self::TYPE_NAME)?;
                    <$ty>::try_from(wide).map_err(|_| ProcallError::coercion(value, Self::TYPE_NAME))
                }
            }
        )*
    };
}

integer_from_value!(i8, u8, i16, u16, i32, u32, i64, u64);

impl FromValue for f64 {
    const TYPE_NAME: &'static str = "f64";

    fn from_value(value: &Value) -> Result<Self> {
        to_f64(value, Self::TYPE_NAME)
    }
}

impl FromValue for f32 {
    const TYPE_NAME: &'static str = "f32";

    fn from_value(value: &Value) -> Result<Self> {
        if let Value::Float32(v) = value {
            return Ok(*v);
        }
        let wide = to_f64(value, Self::TYPE_NAME)?;
        if wide.is_finite() && wide.abs() > f32::MAX as f64 {
            return Err(ProcallError::coercion(value, Self::TYPE_NAME));
        }
        Ok(wide as f32)
    }
}

impl FromValue for Decimal {
    const TYPE_NAME: &'static str = "decimal";

    fn from_value(value: &Value) -> Result<Self> {
        let fail = || ProcallError::coercion(value, Self::TYPE_NAME);
        match value {
            Value::Decimal(d) => Ok(*d),
            Value::Bool(b) => Ok(Decimal::from(*b as u8)),
            Value::Int8(v) => Ok(Decimal::from(*v)),
            Value::UInt8(v) => Ok(Decimal::from(*v)),
            Value::Int16(v) => Ok(Decimal::from(*v)),
            Value::Int32(v) => Ok(Decimal::from(*v)),
            Value::Int64(v) => Ok(Decimal::from(*v)),
            Value::Float32(v) => Decimal::from_f32(*v).ok_or_else(fail),
            Value::Float64(v) => Decimal::from_f64(*v).ok_or_else(fail),
            Value::String(s) => s.trim().parse::<Decimal>().map_err(|_| fail()),
            _ => Err(fail()),
        }
    }
}

impl FromValue for bool {
    const TYPE_NAME: &'static str = "bool";

    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                _ => Err(ProcallError::coercion(value, Self::TYPE_NAME)),
            },
            Value::Int8(_)
            | Value::UInt8(_)
            | Value::Int16(_)
            | Value::Int32(_)
            | Value::Int64(_)
            | Value::Float32(_)
            | Value::Float64(_)
            | Value::Decimal(_) => Ok(to_f64(value, Self::TYPE_NAME)? != 0.0),
            _ => Err(ProcallError::coercion(value, Self::TYPE_NAME)),
        }
    }
}

impl FromValue for String {
    const TYPE_NAME: &'static str = "string";

    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::String(s) => Ok(s.clone()),
            Value::Null | Value::Bytes(_) | Value::Table(_) => {
                Err(ProcallError::coercion(value, Self::TYPE_NAME))
            }
            other => Ok(other.to_string()),
        }
    }
}

impl FromValue for Vec<u8> {
    const TYPE_NAME: &'static str = "bytes";

    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Bytes(b) => Ok(b.clone()),
            _ => Err(ProcallError::coercion(value, Self::TYPE_NAME)),
        }
    }
}

impl FromValue for Uuid {
    const TYPE_NAME: &'static str = "uuid";

    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Uuid(u) => Ok(*u),
            Value::String(s) => {
                Uuid::parse_str(s.trim()).map_err(|_| ProcallError::coercion(value, Self::TYPE_NAME))
            }
            _ => Err(ProcallError::coercion(value, Self::TYPE_NAME)),
        }
    }
}

impl FromValue for NaiveDateTime {
    const TYPE_NAME: &'static str = "datetime";

    fn from_value(value: &Value) -> Result<Self> {
        let fail = || ProcallError::coercion(value, Self::TYPE_NAME);
        match value {
            Value::DateTime(dt) => Ok(*dt),
            Value::Date(d) => Ok(d.and_time(NaiveTime::MIN)),
            Value::DateTimeOffset(dt) => Ok(dt.naive_local()),
            Value::String(s) => {
                let s = s.trim();
                NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
                    .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
                    .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d").map(|d| d.and_time(NaiveTime::MIN)))
                    .map_err(|_| fail())
            }
            _ => Err(fail()),
        }
    }
}

impl FromValue for NaiveDate {
    const TYPE_NAME: &'static str = "date";

    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Date(d) => Ok(*d),
            Value::String(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map_err(|_| ProcallError::coercion(value, Self::TYPE_NAME)),
            Value::DateTime(_) | Value::DateTimeOffset(_) => {
                NaiveDateTime::from_value(value).map(|dt| dt.date())
            }
            _ => Err(ProcallError::coercion(value, Self::TYPE_NAME)),
        }
    }
}

impl FromValue for NaiveTime {
    const TYPE_NAME: &'static str = "time";

    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Time(t) => Ok(*t),
            Value::String(s) => NaiveTime::parse_from_str(s.trim(), "%H:%M:%S%.f")
                .map_err(|_| ProcallError::coercion(value, Self::TYPE_NAME)),
            Value::DateTime(dt) => Ok(dt.time()),
            _ => Err(ProcallError::coercion(value, Self::TYPE_NAME)),
        }
    }
}

impl FromValue for DateTime<FixedOffset> {
    const TYPE_NAME: &'static str = "datetimeoffset";

    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::DateTimeOffset(dt) => Ok(*dt),
            // A datetime without offset is read as UTC.
            Value::DateTime(dt) => Ok(dt.and_utc().fixed_offset()),
            Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
                .map_err(|_| ProcallError::coercion(value, Self::TYPE_NAME)),
            _ => Err(ProcallError::coercion(value, Self::TYPE_NAME)),
        }
    }
}

impl FromValue for serde_json::Value {
    const TYPE_NAME: &'static str = "json";

    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Json(j) => Ok(j.clone()),
            Value::String(s) => serde_json::from_str(s)
                .map_err(|_| ProcallError::coercion(value, Self::TYPE_NAME)),
            _ => Err(ProcallError::coercion(value, Self::TYPE_NAME)),
        }
    }
}

impl FromValue for Value {
    const TYPE_NAME: &'static str = "value";

    fn from_value(value: &Value) -> Result<Self> {
        Ok(value.clone())
    }
}

/// NULL becomes `None`; anything else must convert to `T`.
impl<T: FromValue> FromValue for Option<T> {
    const TYPE_NAME: &'static str = T::TYPE_NAME;

    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}
