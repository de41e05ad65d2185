// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Element data types declared by exported graphs.

/// Enumerates the element types an IR operand or attribute may declare.
///
/// Only [`DataType::Float32`] can be executed. `Unknown` is a placeholder
/// for operands whose type was not recorded by the exporter; the other
/// tags are recognised so they can be rejected with a precise error.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub enum DataType {
    #[default]
    Unknown,
    /// 32-bit IEEE 754 floating point.
    Float32,
    /// 64-bit IEEE 754 floating point.
    Float64,
    /// 16-bit IEEE 754 floating point.
    Float16,
    /// 8-bit signed integer.
    Int8,
}

impl DataType {
    /// Maps a wire tag (0 = unknown, 1 = f32, 2 = f64, 3 = f16, 4 = i8).
    pub fn from_tag(tag: i32) -> Option<Self> {
        match tag {
            0 => Some(DataType::Unknown),
            1 => Some(DataType::Float32),
            2 => Some(DataType::Float64),
            3 => Some(DataType::Float16),
            4 => Some(DataType::Int8),
            _ => None,
        }
    }

    /// Returns the wire tag for this data type.
    pub fn tag(self) -> i32 {
        match self {
            DataType::Unknown => 0,
            DataType::Float32 => 1,
            DataType::Float64 => 2,
            DataType::Float16 => 3,
            DataType::Int8 => 4,
        }
    }

    /// Returns the size of a single element in bytes, `0` for `Unknown`.
    pub fn size_bytes(self) -> usize {
        match self {
            DataType::Unknown => 0,
            DataType::Float32 => 4,
            DataType::Float64 => 8,
            DataType::Float16 => 2,
            DataType::Int8 => 1,
        }
    }

    /// Returns a human-readable label for this data type.
    pub fn as_str(self) -> &'static str {
        match self {
            DataType::Unknown => "unknown",
            DataType::Float32 => "f32",
            DataType::Float64 => "f64",
            DataType::Float16 => "f16",
            DataType::Int8 => "i8",
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_round_trip() {
        for tag in 0..5 {
            let dtype = DataType::from_tag(tag).unwrap();
            assert_eq!(dtype.tag(), tag);
        }
        assert!(DataType::from_tag(5).is_none());
        assert!(DataType::from_tag(-1).is_none());
    }

    #[test]
    fn test_sizes() {
        assert_eq!(DataType::Float32.size_bytes(), 4);
        assert_eq!(DataType::Int8.size_bytes(), 1);
        assert_eq!(DataType::default(), DataType::Unknown);
    }
}
