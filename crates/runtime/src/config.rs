// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Runtime configuration loaded from TOML files or constructed programmatically.
//!
//! # TOML Format
//! ```toml
//! param_path = "./models/demo/model.json"
//! weight_path = "./models/demo/model.safetensors"
//! input_name = "pnnx_input_0"
//! output_name = "pnnx_output_0"
//! enable_profiling = true
//! debug = false
//! ```

use std::path::{Path, PathBuf};

use crate::RuntimeError;

/// Configuration for building and running a graph.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RuntimeConfig {
    /// Path to the graph manifest (`model.json`).
    pub param_path: PathBuf,
    /// Path to the weight file (`model.safetensors`).
    pub weight_path: PathBuf,
    /// Name of the input node fed by `forward`.
    #[serde(default = "default_input_name")]
    pub input_name: String,
    /// Name of the node whose tensors `forward` returns.
    #[serde(default = "default_output_name")]
    pub output_name: String,
    /// Whether to record per-node timings.
    #[serde(default = "default_true")]
    pub enable_profiling: bool,
    /// Whether to trace every node's shapes during forward.
    #[serde(default)]
    pub debug: bool,
}

fn default_input_name() -> String {
    "pnnx_input_0".to_string()
}

fn default_output_name() -> String {
    "pnnx_output_0".to_string()
}

fn default_true() -> bool {
    true
}

impl RuntimeConfig {
    /// Creates a configuration with default node names.
    pub fn new(param_path: impl Into<PathBuf>, weight_path: impl Into<PathBuf>) -> Self {
        Self {
            param_path: param_path.into(),
            weight_path: weight_path.into(),
            ..Self::default()
        }
    }

    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, RuntimeError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RuntimeError::ConfigError(format!("cannot read config '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, RuntimeError> {
        toml::from_str(toml_str)
            .map_err(|e| RuntimeError::ConfigError(format!("TOML parse error: {e}")))
    }

    /// Serialises configuration to TOML.
    pub fn to_toml(&self) -> Result<String, RuntimeError> {
        toml::to_string_pretty(self)
            .map_err(|e| RuntimeError::ConfigError(format!("TOML serialise error: {e}")))
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            param_path: PathBuf::from("./models/demo/model.json"),
            weight_path: PathBuf::from("./models/demo/model.safetensors"),
            input_name: default_input_name(),
            output_name: default_output_name(),
            enable_profiling: true,
            debug: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let c = RuntimeConfig::default();
        assert_eq!(c.input_name, "pnnx_input_0");
        assert_eq!(c.output_name, "pnnx_output_0");
        assert!(c.enable_profiling);
        assert!(!c.debug);
    }

    #[test]
    fn test_toml_roundtrip() {
        let c = RuntimeConfig::new("a/model.json", "a/model.safetensors");
        let toml_str = c.to_toml().unwrap();
        let back = RuntimeConfig::from_toml(&toml_str).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let toml_str = r#"
            param_path = "./m/model.json"
            weight_path = "./m/model.safetensors"
        "#;
        let c = RuntimeConfig::from_toml(toml_str).unwrap();
        assert_eq!(c.param_path, PathBuf::from("./m/model.json"));
        assert_eq!(c.input_name, "pnnx_input_0");
        assert!(c.enable_profiling);
    }

    #[test]
    fn test_toml_overrides() {
        let toml_str = r#"
            param_path = "p.json"
            weight_path = "w.safetensors"
            input_name = "in"
            output_name = "out"
            enable_profiling = false
            debug = true
        "#;
        let c = RuntimeConfig::from_toml(toml_str).unwrap();
        assert_eq!(c.input_name, "in");
        assert_eq!(c.output_name, "out");
        assert!(!c.enable_profiling);
        assert!(c.debug);
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            RuntimeConfig::from_toml("param_path = 3"),
            Err(RuntimeError::ConfigError(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let dir = std::env::temp_dir().join("graph_rt_config_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("runtime.toml");
        std::fs::write(&path, RuntimeConfig::default().to_toml().unwrap()).unwrap();
        let c = RuntimeConfig::from_file(&path).unwrap();
        assert_eq!(c, RuntimeConfig::default());
        std::fs::remove_dir_all(&dir).ok();

        assert!(RuntimeConfig::from_file(&dir.join("missing.toml")).is_err());
    }
}
