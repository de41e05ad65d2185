// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Subcommand implementations and shared CLI plumbing.

pub mod demo;
pub mod inspect;
pub mod layers;
pub mod run;

use std::path::{Path, PathBuf};

use anyhow::Context;
use runtime::RuntimeConfig;
use tracing_subscriber::EnvFilter;

/// Installs the fmt subscriber. `RUST_LOG` wins over the `-v` count.
pub fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Merges the optional TOML file with the path flags.
///
/// Flags given on the command line replace the paths from the file.
pub fn resolve_config(
    config: Option<&Path>,
    param: Option<PathBuf>,
    weights: Option<PathBuf>,
) -> anyhow::Result<RuntimeConfig> {
    let mut resolved = match config {
        Some(path) => RuntimeConfig::from_file(path)
            .with_context(|| format!("loading config '{}'", path.display()))?,
        None => RuntimeConfig::default(),
    };
    if let Some(param) = param {
        resolved.param_path = param;
    }
    if let Some(weights) = weights {
        resolved.weight_path = weights;
    }
    tracing::debug!(?resolved, "resolved configuration");
    Ok(resolved)
}

/// Truncates a string to `max_len` with ellipsis if needed.
pub(crate) fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{head}...")
    }
}
