// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `graph-rt run` command: build a model and run one forward pass.
//!
//! Walks the graph lifecycle:
//! ```text
//! RuntimeGraph<NeedInit> → init → <NeedBuild> → build → <Completed> → forward
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};
use runtime::{RuntimeConfig, RuntimeGraph};
use tensor_core::{CsvLoader, Tensor};

/// Where the input batch comes from.
#[derive(Debug, Clone)]
pub enum Input {
    /// One comma-separated channel, repeated over the batch.
    Csv(PathBuf),
    /// Every element set to the value.
    Fill(f32),
    /// Standard-normal values from a seeded generator.
    Random(u64),
}

pub fn execute(config: &RuntimeConfig, input: Input) -> anyhow::Result<()> {
    println!("╔══════════════════════════════════════════════════════╗");
    println!("║             graph-rt · Inference Runner             ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();

    println!("  Config:");
    println!("   Manifest: {}", config.param_path.display());
    println!("   Weights:  {}", config.weight_path.display());
    println!("   Input:    {}", config.input_name);
    println!("   Output:   {}", config.output_name);
    println!();

    // Step 1: NeedInit → NeedBuild → Completed.
    println!("  [1/2] Building graph...");
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
    println!("        {} nodes scheduled.", graph.topo_order().len());
    println!();

    // Step 2: forward.
    let batch = input_batch(&graph, &config.input_name, &input)?;
    println!("  [2/2] Running forward on a batch of {}...", batch.len());
    let outputs = graph.forward(&batch, config.debug)?;
    println!();

    print_outputs(&outputs);
    if let Some(metrics) = graph.last_metrics() {
        println!("  Metrics:");
        println!("   {}", metrics.summary());
        println!();
    }
    Ok(())
}

/// Builds one tensor per batch element, shaped like the input node's operand.
fn input_batch(
    graph: &RuntimeGraph,
    input_name: &str,
    input: &Input,
) -> anyhow::Result<Vec<Arc<Tensor>>> {
    let operand = graph
        .node(input_name)
        .and_then(|n| n.output_operand.as_ref())
        .with_context(|| format!("input node '{input_name}' has no output operand"))?;
    let (batch, [c, h, w]) = runtime::plane_dims(&operand.name, &operand.shape)?;
    tracing::debug!(batch, channels = c, rows = h, cols = w, "input planes");

    match input {
        Input::Csv(path) => {
            let tensor = CsvLoader::load(path, ',')
                .with_context(|| format!("reading input '{}'", path.display()))?;
            if tensor.dims() != [c, h, w] {
                bail!(
                    "input '{}' is {:?} but the model expects {:?}",
                    path.display(),
                    tensor.dims(),
                    [c, h, w]
                );
            }
            let tensor = Arc::new(tensor);
            Ok((0..batch).map(|_| Arc::clone(&tensor)).collect())
        }
        Input::Fill(value) => Ok((0..batch)
            .map(|_| {
                let mut t = Tensor::new(c, h, w);
                t.fill(*value);
                Arc::new(t)
            })
            .collect()),
        Input::Random(seed) => {
            let mut rng = StdRng::seed_from_u64(*seed);
            (0..batch)
                .map(|_| {
                    let values: Vec<f32> = (0..c * h * w)
                        .map(|_| StandardNormal.sample(&mut rng))
                        .collect();
                    Tensor::from_values(c, h, w, &values, true)
                        .map(Arc::new)
                        .map_err(anyhow::Error::from)
                })
                .collect()
        }
    }
}

fn print_outputs(outputs: &[Arc<Tensor>]) {
    println!("  Results:");
    for (i, tensor) in outputs.iter().enumerate() {
        let values = tensor.values(true);
        let shown: Vec<String> = values.iter().take(10).map(|v| format!("{v:.4}")).collect();
        println!(
            "   [{i}] shape {} ({} values): [{}]{}",
            tensor.raw_shape(),
            values.len(),
            shown.join(", "),
            if values.len() > 10 { " ..." } else { "" },
        );
    }
    println!();
}
