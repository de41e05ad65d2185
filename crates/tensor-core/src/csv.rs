// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Loading single-channel tensors from delimited text files.

use std::path::Path;

use crate::{Tensor, TensorError};

/// Reads a delimited numeric table into a `(1, rows, cols)` tensor.
///
/// Reading stops at the first empty line. The column count is the widest
/// line; short lines leave their trailing cells at `0.0`, as does any field
/// that fails to parse.
pub struct CsvLoader;

impl CsvLoader {
    /// Loads `path` using `delimiter` as the field separator.
    ///
    /// # Errors
    /// Returns [`TensorError::Csv`] if the path is empty or the file cannot be read.
    pub fn load(path: impl AsRef<Path>, delimiter: char) -> Result<Tensor, TensorError> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(TensorError::Csv {
                path: String::new(),
                detail: "path is empty".into(),
            });
        }
        let text = std::fs::read_to_string(path).map_err(|e| TensorError::Csv {
            path: path.display().to_string(),
            detail: e.to_string(),
        })?;
        Self::parse(&text, delimiter)
    }

    /// Parses CSV text that is already in memory.
    pub fn parse(text: &str, delimiter: char) -> Result<Tensor, TensorError> {
        let lines: Vec<&str> = text
            .lines()
            .map(|l| l.trim_end_matches('\r'))
            .take_while(|l| !l.is_empty())
            .collect();
        let rows = lines.len();
        let cols = lines
            .iter()
            .map(|l| l.split(delimiter).count())
            .max()
            .unwrap_or(0);

        let mut tensor = Tensor::new(1, rows, cols);
        for (row, line) in lines.iter().enumerate() {
            for (col, token) in line.split(delimiter).enumerate() {
                match token.trim().parse::<f32>() {
                    Ok(value) => *tensor.at_mut(0, row, col) = value,
                    Err(e) => {
                        tracing::debug!(row, col, token, error = %e, "unparsable csv field");
                    }
                }
            }
        }
        Ok(tensor)
    }
}
