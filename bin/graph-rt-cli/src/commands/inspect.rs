// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `graph-rt inspect` command: display the operators of a model and the
//! order the scheduler runs them in.

use std::sync::Arc;

use anyhow::Context;
use runtime::{RuntimeConfig, RuntimeGraph};

use super::truncate;

pub fn execute(config: &RuntimeConfig) -> anyhow::Result<()> {
    println!("╔══════════════════════════════════════════════════════╗");
    println!("║             graph-rt · Model Inspector              ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();

    let mut graph = RuntimeGraph::from_config(config, Arc::new(layers::register_all()));
    graph
        .build(&config.input_name, &config.output_name)
        .with_context(|| {
            format!(
                "failed to build model from '{}' and '{}'",
                config.param_path.display(),
                config.weight_path.display()
            )
        })?;

    println!("  Manifest: {}", config.param_path.display());
    println!("  Weights:  {}", config.weight_path.display());
    println!("  Nodes:    {}", graph.operators().len());
    println!();

    // ── Operators ──────────────────────────────────────────────
    println!(
        "  {:<24} {:<22} {:<16} {:>8} {:>6}",
        "Name", "Type", "Output shape", "Params", "Succ.",
    );
    println!("  {}", "-".repeat(80));
    for op in graph.operators() {
        let shape = op
            .output_operand
            .as_ref()
            .map(|o| format!("{:?}", o.shape))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<24} {:<22} {:<16} {:>8} {:>6}",
            truncate(&op.name, 24),
            truncate(&op.op_type, 22),
            truncate(&shape, 16),
            op.params.len(),
            op.output_operators.len(),
        );
    }
    println!();

    // ── Execution order ────────────────────────────────────────
    println!("  Execution order:");
    for (i, name) in graph.topo_order().iter().enumerate() {
        println!("   {i:>3}. {name}");
    }
    println!();
    Ok(())
}
