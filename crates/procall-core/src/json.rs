//! JSON text encoding and decoding
//!
//! Procedures that return `FOR JSON` text are decoded through a `JsonCodec`.
//! The serde_json codec can match object keys against the target type's
//! field names ignoring ASCII case, so `{"customerid": 1}` fills a field
//! serialized as `CustomerId`.

use crate::{ProcallError, Result};
use serde::de::value::{MapDeserializer, SeqDeserializer};
use serde::de::{DeserializeOwned, Deserializer, IntoDeserializer, Visitor};
use serde::Serialize;
use serde_json::{Map as JsonMap, Value as JsonValue};

/// How object keys are matched to struct fields when decoding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FieldMatching {
    CaseSensitive,
    #[default]
    CaseInsensitive,
}

/// Converts between JSON text and JSON trees
pub trait JsonCodec: Send + Sync {
    fn encode(&self, value: &JsonValue) -> Result<String>;

    fn parse(&self, text: &str) -> Result<JsonValue>;

    fn field_matching(&self) -> FieldMatching;
}

/// `JsonCodec` backed by serde_json
#[derive(Debug, Clone, Copy, Default)]
pub struct SerdeJsonCodec {
    matching: FieldMatching,
}

impl SerdeJsonCodec {
    pub fn case_sensitive() -> Self {
        Self {
            matching: FieldMatching::CaseSensitive,
        }
    }

    pub fn case_insensitive() -> Self {
        Self {
            matching: FieldMatching::CaseInsensitive,
        }
    }
}

impl JsonCodec for SerdeJsonCodec {
    fn encode(&self, value: &JsonValue) -> Result<String> {
        serde_json::to_string(value).map_err(|e| ProcallError::DecodeFailed(e.to_string()))
    }

    fn parse(&self, text: &str) -> Result<JsonValue> {
        serde_json::from_str(text).map_err(|e| ProcallError::DecodeFailed(e.to_string()))
    }

    fn field_matching(&self) -> FieldMatching {
        self.matching
    }
}

/// Decode JSON text into `T` using the codec's field matching
pub fn decode_json<T: DeserializeOwned>(codec: &dyn JsonCodec, text: &str) -> Result<T> {
    let value = codec.parse(text)?;
    let decoded = match codec.field_matching() {
        FieldMatching::CaseSensitive => serde_json::from_value(value),
        FieldMatching::CaseInsensitive => T::deserialize(FoldingDeserializer(value)),
    };
    decoded.map_err(|e| ProcallError::DecodeFailed(e.to_string()))
}

/// Encode `value` as JSON text
pub fn encode_json<T: Serialize + ?Sized>(codec: &dyn JsonCodec, value: &T) -> Result<String> {
    let tree =
        serde_json::to_value(value).map_err(|e| ProcallError::DecodeFailed(e.to_string()))?;
    codec.encode(&tree)
}

/// Rename keys that equal a field name ignoring ASCII case.
///
/// A key that already matches a field exactly is left alone and wins over
/// any differently cased duplicate.
fn fold_keys(map: &mut JsonMap<String, JsonValue>, fields: &'static [&'static str]) {
    let renames: Vec<(String, &'static str)> = map
        .keys()
        .filter(|key| !fields.contains(&key.as_str()))
        .filter_map(|key| {
            fields
                .iter()
                .find(|field| field.eq_ignore_ascii_case(key))
                .map(|field| (key.clone(), *field))
        })
        .collect();
    for (key, field) in renames {
        if map.contains_key(field) {
            continue;
        }
        if let Some(v) = map.remove(&key) {
            map.insert(field.to_string(), v);
        }
    }
}

/// Deserializer over a JSON tree that folds object keys onto the field
/// names of every struct it is asked for, at any depth
struct FoldingDeserializer(JsonValue);

type JsonResult<T> = std::result::Result<T, serde_json::Error>;

impl<'de> IntoDeserializer<'de, serde_json::Error> for FoldingDeserializer {
    type Deserializer = Self;

    fn into_deserializer(self) -> Self {
        self
    }
}

fn visit_array<'de, V: Visitor<'de>>(items: Vec<JsonValue>, visitor: V) -> JsonResult<V::Value> {
    let mut access: SeqDeserializer<_, serde_json::Error> =
        SeqDeserializer::new(items.into_iter().map(FoldingDeserializer));
    let value = visitor.visit_seq(&mut access)?;
    access.end()?;
    Ok(value)
}

fn visit_object<'de, V: Visitor<'de>>(
    map: JsonMap<String, JsonValue>,
    visitor: V,
) -> JsonResult<V::Value> {
    let mut access: MapDeserializer<'_, _, serde_json::Error> =
        MapDeserializer::new(map.into_iter().map(|(k, v)| (k, FoldingDeserializer(v))));
    let value = visitor.visit_map(&mut access)?;
    access.end()?;
    Ok(value)
}

macro_rules! forward_to_json_value {
    ($($method:ident)*) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> JsonResult<V::Value> {
                self.0.$method(visitor)
            }
        )*
    };
}

impl<'de> Deserializer<'de> for FoldingDeserializer {
    type Error = serde_json::Error;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> JsonResult<V::Value> {
        match self.0 {
            JsonValue::Array(items) => visit_array(items, visitor),
            JsonValue::Object(map) => visit_object(map, visitor),
            other => other.deserialize_any(visitor),
        }
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> JsonResult<V::Value> {
        match self.0 {
            JsonValue::Null => visitor.visit_none(),
            other => visitor.visit_some(FoldingDeserializer(other)),
        }
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> JsonResult<V::Value> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> JsonResult<V::Value> {
        match self.0 {
            JsonValue::Array(items) => visit_array(items, visitor),
            other => other.deserialize_seq(visitor),
        }
    }

    fn deserialize_tuple<V: Visitor<'de>>(self, _len: usize, visitor: V) -> JsonResult<V::Value> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> JsonResult<V::Value> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> JsonResult<V::Value> {
        match self.0 {
            JsonValue::Object(map) => visit_object(map, visitor),
            other => other.deserialize_map(visitor),
        }
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> JsonResult<V::Value> {
        match self.0 {
            JsonValue::Object(mut map) => {
                fold_keys(&mut map, fields);
                visit_object(map, visitor)
            }
            JsonValue::Array(items) => visit_array(items, visitor),
            other => other.deserialize_struct(name, fields, visitor),
        }
    }

    // Enum payloads are matched exactly.
    fn deserialize_enum<V: Visitor<'de>>(
        self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> JsonResult<V::Value> {
        self.0.deserialize_enum(name, variants, visitor)
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        visitor: V,
    ) -> JsonResult<V::Value> {
        self.0.deserialize_unit_struct(name, visitor)
    }

    forward_to_json_value! {
        deserialize_bool deserialize_i8 deserialize_i16 deserialize_i32 deserialize_i64
        deserialize_i128 deserialize_u8 deserialize_u16 deserialize_u32 deserialize_u64
        deserialize_u128 deserialize_f32 deserialize_f64 deserialize_char deserialize_str
        deserialize_string deserialize_bytes deserialize_byte_buf deserialize_unit
        deserialize_identifier deserialize_ignored_any
    }
}
