// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Operator configuration values.

use std::fmt;

/// A typed configuration value attached to an operator (stride, padding,
/// an expression string, ...).
///
/// Serialised externally tagged in snake case, e.g. `{"int_array": [1, 1]}`.
///
/// # Examples
/// ```
/// use model_ir::Parameter;
/// let p: Parameter = serde_json::from_str(r#"{"int_array": [3, 3]}"#).unwrap();
/// assert_eq!(p.as_int_array(), Some(&[3, 3][..]));
/// assert_eq!(p.as_int(), None);
/// ```
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parameter {
    Unknown,
    Bool(bool),
    Int(i32),
    Float(f32),
    String(String),
    IntArray(Vec<i32>),
    FloatArray(Vec<f32>),
    StringArray(Vec<String>),
}

/// The kind of a [`Parameter`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterKind {
    Unknown,
    Bool,
    Int,
    Float,
    String,
    IntArray,
    FloatArray,
    StringArray,
}

impl Parameter {
    pub fn kind(&self) -> ParameterKind {
        match self {
            Parameter::Unknown => ParameterKind::Unknown,
            Parameter::Bool(_) => ParameterKind::Bool,
            Parameter::Int(_) => ParameterKind::Int,
            Parameter::Float(_) => ParameterKind::Float,
            Parameter::String(_) => ParameterKind::String,
            Parameter::IntArray(_) => ParameterKind::IntArray,
            Parameter::FloatArray(_) => ParameterKind::FloatArray,
            Parameter::StringArray(_) => ParameterKind::StringArray,
        }
    }

    /// Wire tag, 0 (unknown) through 7 (string array).
    pub fn tag(&self) -> i32 {
        self.kind().tag()
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Parameter::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Parameter::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            Parameter::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Parameter::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_int_array(&self) -> Option<&[i32]> {
        match self {
            Parameter::IntArray(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_float_array(&self) -> Option<&[f32]> {
        match self {
            Parameter::FloatArray(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_string_array(&self) -> Option<&[String]> {
        match self {
            Parameter::StringArray(v) => Some(v),
            _ => None,
        }
    }
}

impl ParameterKind {
    pub fn tag(self) -> i32 {
        match self {
            ParameterKind::Unknown => 0,
            ParameterKind::Bool => 1,
            ParameterKind::Int => 2,
            ParameterKind::Float => 3,
            ParameterKind::String => 4,
            ParameterKind::IntArray => 5,
            ParameterKind::FloatArray => 6,
            ParameterKind::StringArray => 7,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ParameterKind::Unknown => "unknown",
            ParameterKind::Bool => "bool",
            ParameterKind::Int => "int",
            ParameterKind::Float => "float",
            ParameterKind::String => "string",
            ParameterKind::IntArray => "int_array",
            ParameterKind::FloatArray => "float_array",
            ParameterKind::StringArray => "string_array",
        }
    }
}

impl fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Parameter::Unknown => write!(f, "?"),
            Parameter::Bool(v) => write!(f, "{v}"),
            Parameter::Int(v) => write!(f, "{v}"),
            Parameter::Float(v) => write!(f, "{v}"),
            Parameter::String(v) => write!(f, "{v:?}"),
            Parameter::IntArray(v) => write!(f, "{v:?}"),
            Parameter::FloatArray(v) => write!(f, "{v:?}"),
            Parameter::StringArray(v) => write!(f, "{v:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_are_stable() {
        let params = [
            Parameter::Unknown,
            Parameter::Bool(true),
            Parameter::Int(1),
            Parameter::Float(1.0),
            Parameter::String("zeros".into()),
            Parameter::IntArray(vec![1]),
            Parameter::FloatArray(vec![1.0]),
            Parameter::StringArray(vec!["a".into()]),
        ];
        for (i, p) in params.iter().enumerate() {
            assert_eq!(p.tag(), i as i32);
        }
    }

    #[test]
    fn test_accessors_reject_other_kinds() {
        let p = Parameter::Int(3);
        assert_eq!(p.as_int(), Some(3));
        assert_eq!(p.as_bool(), None);
        assert_eq!(p.as_int_array(), None);
        assert_eq!(Parameter::String("x".into()).as_str(), Some("x"));
    }

    #[test]
    fn test_serde_snake_case() {
        let json = serde_json::to_string(&Parameter::IntArray(vec![1, 2])).unwrap();
        assert_eq!(json, r#"{"int_array":[1,2]}"#);
        let back: Parameter = serde_json::from_str(r#"{"string":"zeros"}"#).unwrap();
        assert_eq!(back, Parameter::String("zeros".into()));
        let unknown: Parameter = serde_json::from_str(r#""unknown""#).unwrap();
        assert_eq!(unknown.kind(), ParameterKind::Unknown);
    }

    #[test]
    fn test_display() {
        assert_eq!(Parameter::IntArray(vec![3, 3]).to_string(), "[3, 3]");
        assert_eq!(ParameterKind::FloatArray.to_string(), "float_array");
    }
}
