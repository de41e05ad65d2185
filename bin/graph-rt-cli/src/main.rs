// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # graph-rt
//!
//! Command-line interface for the graph-rt CNN inference runtime.
//!
//! ## Usage
//! ```bash
//! # Write a random-weight demo model and run it
//! graph-rt demo --out ./models/demo
//!
//! # Run a model on a CSV input
//! graph-rt run --param ./models/demo/model.json --weights ./models/demo/model.safetensors \
//!     --input-csv ./input.csv
//!
//! # Print the operators and execution order
//! graph-rt inspect --param ./models/demo/model.json --weights ./models/demo/model.safetensors
//!
//! # List the registered layer types
//! graph-rt layers
//! ```

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "graph-rt",
    about = "CNN inference runtime for exported operator graphs",
    version,
    author
)]
struct Cli {
    /// Path to a TOML configuration file (overrides CLI arguments).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging (repeat for more: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a model and run one forward pass.
    Run {
        /// Path to the graph manifest (model.json).
        #[arg(short, long)]
        param: Option<PathBuf>,

        /// Path to the weight file (model.safetensors).
        #[arg(short, long)]
        weights: Option<PathBuf>,

        /// Comma-separated input values, one channel of rows × cols.
        #[arg(long, conflicts_with = "fill")]
        input_csv: Option<PathBuf>,

        /// Constant value for every input element.
        #[arg(long)]
        fill: Option<f32>,

        /// Name of the input node.
        #[arg(long)]
        input_name: Option<String>,

        /// Name of the node whose tensors are printed.
        #[arg(long)]
        output_name: Option<String>,

        /// Trace every node's shapes during forward.
        #[arg(long)]
        debug: bool,
    },

    /// Print the operators and the topological order of a model.
    Inspect {
        /// Path to the graph manifest (model.json).
        #[arg(short, long)]
        param: Option<PathBuf>,

        /// Path to the weight file (model.safetensors).
        #[arg(short, long)]
        weights: Option<PathBuf>,
    },

    /// List the registered layer types.
    Layers,

    /// Write a random-weight CNN and run it.
    Demo {
        /// Output directory for model.json and model.safetensors.
        #[arg(short, long, default_value = "./models/demo")]
        out: PathBuf,

        /// Seed for the weights and the input.
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing/logging based on verbosity.
    commands::init_tracing(cli.verbose);

    match cli.command {
        Commands::Run {
            param,
            weights,
            input_csv,
            fill,
            input_name,
            output_name,
            debug,
        } => {
            let mut config = commands::resolve_config(cli.config.as_deref(), param, weights)?;
            if let Some(name) = input_name {
                config.input_name = name;
            }
            if let Some(name) = output_name {
                config.output_name = name;
            }
            config.debug |= debug;
            let input = match (input_csv, fill) {
                (Some(path), _) => commands::run::Input::Csv(path),
                (None, value) => commands::run::Input::Fill(value.unwrap_or(1.0)),
            };
            commands::run::execute(&config, input)
        }
        Commands::Inspect { param, weights } => {
            let config = commands::resolve_config(cli.config.as_deref(), param, weights)?;
            commands::inspect::execute(&config)
        }
        Commands::Layers => commands::layers::execute(),
        Commands::Demo { out, seed } => commands::demo::execute(&out, seed),
    }
}
