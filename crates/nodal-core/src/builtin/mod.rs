//! # Builtin Type System
//!
//! A small concrete [`TypeSystem`] used by the CLI, the tests and the
//! benchmarks: integers, floats, booleans and text, plus a `Shader` socket
//! type that carries no evaluable data.
//!
//! ## Conversions
//!
//! | From \ To | Int     | Float | Bool   | Text |
//! |-----------|---------|-------|--------|------|
//! | Int       | -       | yes   | `!= 0` | yes  |
//! | Float     | truncate| -     | `!= 0` | yes  |
//! | Bool      | 0 / 1   | 0 / 1 | -      | yes  |
//! | Text      | no      | no    | no     | -    |
//!
//! Text never converts implicitly; such links deliver the target's default.

mod nodes;

pub use nodes::{builtin_registry, register_builtin_nodes};

use crate::value::TypeSystem;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared socket types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Int,
    Float,
    Bool,
    Text,
    /// Carries no data the evaluator can move; sockets of this type stay unused.
    Shader,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::Text => "text",
            Self::Shader => "shader",
        };
        f.write_str(name)
    }
}

/// A builtin value.
///
/// Serialized untagged, so `3`, `2.5`, `true` and `"x"` read and write as
/// the matching variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    #[must_use]
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Int(_) => DataType::Int,
            Self::Float(_) => DataType::Float,
            Self::Bool(_) => DataType::Bool,
            Self::Text(_) => DataType::Text,
        }
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

/// The builtin [`TypeSystem`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuiltinTypes;

impl TypeSystem for BuiltinTypes {
    type Value = Value;
    type DataType = DataType;

    fn type_of(&self, value: &Value) -> DataType {
        value.data_type()
    }

    fn is_supported(&self, data_type: &DataType) -> bool {
        *data_type != DataType::Shader
    }

    fn default_value(&self, data_type: &DataType) -> Value {
        match data_type {
            DataType::Int => Value::Int(0),
            DataType::Float => Value::Float(0.0),
            DataType::Bool | DataType::Shader => Value::Bool(false),
            DataType::Text => Value::Text(String::new()),
        }
    }

    fn is_convertible(&self, from: &DataType, to: &DataType) -> bool {
        use DataType::{Bool, Float, Int, Text};
        matches!(
            (from, to),
            (Int | Float | Bool, Int | Float | Bool | Text)
        ) && from != to
    }

    fn convert(&self, value: &Value, to: &DataType) -> Option<Value> {
        let converted = match (value, to) {
            (Value::Int(v), DataType::Float) => Value::Float(*v as f64),
            (Value::Int(v), DataType::Bool) => Value::Bool(*v != 0),
            (Value::Float(v), DataType::Int) => Value::Int(*v as i64),
            (Value::Float(v), DataType::Bool) => Value::Bool(*v != 0.0),
            (Value::Bool(v), DataType::Int) => Value::Int(i64::from(*v)),
            (Value::Bool(v), DataType::Float) => Value::Float(if *v { 1.0 } else { 0.0 }),
            (Value::Int(_) | Value::Float(_) | Value::Bool(_), DataType::Text) => {
                Value::Text(value.to_string())
            }
            _ => return None,
        };
        Some(converted)
    }
}
