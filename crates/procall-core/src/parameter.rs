//! Stored-procedure call parameters
//!
//! A `ParameterBuilder` collects the named, typed, directional arguments for
//! one call. Output values are written back into the same builder after the
//! call, so a builder belongs to exactly one invocation at a time.

use crate::{
    DbType, FromValue, NVARCHAR_DEFAULT_SIZE, ProcallError, Result, Value, coerce,
    coerce_or_default, native_to_db_type,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Direction of a call parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    Input,
    Output,
    InputOutput,
    /// The procedure's integer `RETURN` value
    ReturnValue,
}

impl Direction {
    /// Whether the server sends a value back for this parameter
    pub fn receives_value(self) -> bool {
        !matches!(self, Direction::Input)
    }

    /// Whether the caller's value is sent to the server
    pub fn sends_value(self) -> bool {
        matches!(self, Direction::Input | Direction::InputOutput)
    }
}

/// A single named call parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// Name as declared by the procedure, e.g. `@CustomerId`
    pub name: String,
    pub db_type: DbType,
    /// Maximum size for sized types; `None` uses the type default, `-1` is MAX
    pub size: Option<i32>,
    pub precision: u8,
    pub scale: u8,
    pub direction: Direction,
    /// Current value; `Value::Null` is the database NULL
    pub value: Value,
}

impl Parameter {
    pub fn new(name: impl Into<String>, db_type: DbType, direction: Direction) -> Self {
        Self {
            name: name.into(),
            db_type,
            size: None,
            precision: 0,
            scale: 0,
            direction,
            value: Value::Null,
        }
    }

    /// Build a parameter whose type is inferred from `value`.
    ///
    /// Text always gets `nvarchar(4000)`, whatever its length.
    pub fn inferred(name: impl Into<String>, value: Value, direction: Direction) -> Result<Self> {
        let db_type = native_to_db_type(value.native_kind()?);
        let mut parameter = Self::new(name, db_type, direction);
        if db_type == DbType::NVarChar {
            parameter.size = Some(NVARCHAR_DEFAULT_SIZE);
        }
        parameter.value = value;
        Ok(parameter)
    }

    pub fn is_null(&self) -> bool {
        self.value.is_null()
    }
}

/// Collection of parameters for one stored-procedure call.
///
/// Names are unique and case-sensitive; iteration follows insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterBuilder {
    params: IndexMap<String, Parameter>,
}

impl ParameterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of parameters in the collection
    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Parameters in insertion order, ready for binding
    pub fn iter(&self) -> impl Iterator<Item = &Parameter> + '_ {
        self.params.values()
    }

    pub fn to_vec(&self) -> Vec<Parameter> {
        self.params.values().cloned().collect()
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.params.get(name)
    }

    /// Add a parameter with every attribute given explicitly.
    ///
    /// A `size` of 0 leaves the size unset. A `None` value is stored as
    /// the database NULL.
    #[allow(clippy::too_many_arguments)]
    pub fn add_typed(
        &mut self,
        name: &str,
        db_type: DbType,
        size: i32,
        precision: u8,
        scale: u8,
        direction: Direction,
        value: Option<Value>,
    ) -> Result<()> {
        let mut parameter = Parameter::new(name, db_type, direction);
        if size != 0 {
            parameter.size = Some(size);
        }
        parameter.precision = precision;
        parameter.scale = scale;
        parameter.value = value.unwrap_or(Value::Null);
        self.insert(parameter)
    }

    /// Add a parameter whose type is inferred from the value.
    ///
    /// A NULL value cannot be inferred and fails with `UnsupportedType`;
    /// use `add_typed` to send a typed NULL.
    pub fn add_value(
        &mut self,
        name: &str,
        value: impl Into<Value>,
        direction: Direction,
    ) -> Result<()> {
        let value = value.into();
        let parameter = Parameter::inferred(name, value, direction).map_err(|err| match err {
            ProcallError::UnsupportedType(reason) => {
                ProcallError::UnsupportedType(format!("parameter {name}: {reason}"))
            }
            other => other,
        })?;
        self.insert(parameter)
    }

    /// Add an input parameter, inferring its type
    pub fn add(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        self.add_value(name, value, Direction::Input)
    }

    /// Add an output parameter. `seed` only decides the type.
    pub fn add_output(&mut self, name: &str, seed: impl Into<Value>) -> Result<()> {
        self.add_value(name, seed, Direction::Output)
    }

    pub fn add_input_output(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        self.add_value(name, value, Direction::InputOutput)
    }

    fn insert(&mut self, parameter: Parameter) -> Result<()> {
        if self.params.contains_key(&parameter.name) {
            return Err(ProcallError::DuplicateParameter(parameter.name));
        }
        self.params.insert(parameter.name.clone(), parameter);
        Ok(())
    }

    /// Raw value by name. `None` when the parameter is missing or NULL.
    pub fn get_value(&self, name: &str) -> Option<&Value> {
        self.params
            .get(name)
            .map(|p| &p.value)
            .filter(|v| !v.is_null())
    }

    /// Value by name coerced to `T`.
    ///
    /// A missing parameter, a NULL or a failed conversion all give
    /// `T::default()`, so `0` can mean "no value" as well as zero. Prefer
    /// `try_get_value_typed` when the difference matters.
    pub fn get_value_typed<T: FromValue + Default>(&self, name: &str) -> T {
        self.get_value(name).map(coerce_or_default).unwrap_or_default()
    }

    /// Value by name coerced to `T`, reporting conversion failures.
    ///
    /// Returns `Ok(None)` for a missing or NULL parameter.
    pub fn try_get_value_typed<T: FromValue>(&self, name: &str) -> Result<Option<T>> {
        self.get_value(name).map(coerce).transpose()
    }

    /// Whether a parameter with this exact name exists
    pub fn contains(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    /// Store a value returned by the server.
    ///
    /// Only parameters that receive values (output, input-output, return
    /// value) are updated; returns whether the value was applied.
    pub fn set_output_value(&mut self, name: &str, value: Value) -> bool {
        match self.params.get_mut(name) {
            Some(parameter) if parameter.direction.receives_value() => {
                parameter.value = value;
                true
            }
            _ => false,
        }
    }
}

impl<'a> IntoIterator for &'a ParameterBuilder {
    type Item = &'a Parameter;
    type IntoIter = indexmap::map::Values<'a, String, Parameter>;

    fn into_iter(self) -> Self::IntoIter {
        self.params.values()
    }
}
