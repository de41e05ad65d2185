// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `graph-rt demo` command: write a small random-weight CNN and run it.
//!
//! The model is
//! `conv(3x3) → relu → maxpool(2x2) → adaptive avgpool(2x2) → flatten → linear → softmax`
//! on a `1x3x8x8` input, saved as `model.json` + `model.safetensors`.

use std::path::Path;

use anyhow::Context;
use model_ir::graph::Validated;
use model_ir::{Attribute, IrGraph, IrGraphBuilder, ModelWriter, Parameter};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use runtime::RuntimeConfig;

use super::run::{self, Input};

const IN_CHANNELS: usize = 3;
const CONV_CHANNELS: usize = 4;
const CLASSES: usize = 10;

pub fn execute(out: &Path, seed: u64) -> anyhow::Result<()> {
    std::fs::create_dir_all(out)
        .with_context(|| format!("creating output directory '{}'", out.display()))?;

    let graph = build_demo(seed)?;
    println!("  Model: {}", graph.summary());

    let param_path = out.join("model.json");
    let weight_path = out.join("model.safetensors");
    ModelWriter::save(&graph, &param_path, &weight_path)
        .with_context(|| format!("writing demo model to '{}'", out.display()))?;
    tracing::info!(
        param = %param_path.display(),
        weights = %weight_path.display(),
        "demo model written"
    );
    println!("  Written to {}", out.display());
    println!();

    let config = RuntimeConfig::new(param_path, weight_path);
    run::execute(&config, Input::Random(seed))
}

fn ints(values: &[i32]) -> Parameter {
    Parameter::IntArray(values.to_vec())
}

/// Draws `len` weights from `N(0, 0.1)`.
fn weights(rng: &mut StdRng, len: usize) -> anyhow::Result<Vec<f32>> {
    let normal = Normal::new(0.0f32, 0.1).context("invalid weight distribution")?;
    Ok((0..len).map(|_| normal.sample(rng)).collect())
}

fn build_demo(seed: u64) -> anyhow::Result<IrGraph<Validated>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let conv_weight = weights(&mut rng, CONV_CHANNELS * IN_CHANNELS * 9)?;
    let conv_bias = weights(&mut rng, CONV_CHANNELS)?;
    let fc_weight = weights(&mut rng, CLASSES * CONV_CHANNELS * 4)?;
    let fc_bias = weights(&mut rng, CLASSES)?;

    let mut b = IrGraphBuilder::new("demo-cnn");
    b.input("pnnx_input_0", "0", &[1, IN_CHANNELS, 8, 8]);

    b.operator("conv1", "nn.Conv2d", &["0"], "1", &[1, CONV_CHANNELS, 8, 8])
        .with_param("in_channels", Parameter::Int(IN_CHANNELS as i32))
        .with_param("out_channels", Parameter::Int(CONV_CHANNELS as i32))
        .with_param("kernel_size", ints(&[3, 3]))
        .with_param("stride", ints(&[1, 1]))
        .with_param("padding", ints(&[1, 1]))
        .with_param("dilation", ints(&[1, 1]))
        .with_param("groups", Parameter::Int(1))
        .with_param("padding_mode", Parameter::String("zeros".into()))
        .with_param("bias", Parameter::Bool(true))
        .with_attribute(
            "weight",
            Attribute::from_f32(vec![CONV_CHANNELS, IN_CHANNELS, 3, 3], &conv_weight),
        )
        .with_attribute("bias", Attribute::from_f32(vec![CONV_CHANNELS], &conv_bias));

    b.operator("relu1", "nn.ReLU", &["1"], "2", &[1, CONV_CHANNELS, 8, 8]);

    b.operator("pool1", "nn.MaxPool2d", &["2"], "3", &[1, CONV_CHANNELS, 4, 4])
        .with_param("kernel_size", ints(&[2, 2]))
        .with_param("stride", ints(&[2, 2]))
        .with_param("padding", ints(&[0, 0]));

    b.operator("gap", "nn.AdaptiveAvgPool2d", &["3"], "4", &[1, CONV_CHANNELS, 2, 2])
        .with_param("output_size", ints(&[2, 2]));

    b.operator("flatten", "torch.flatten", &["4"], "5", &[1, CONV_CHANNELS * 4])
        .with_param("start_dim", Parameter::Int(1))
        .with_param("end_dim", Parameter::Int(-1));

    b.operator("fc", "nn.Linear", &["5"], "6", &[1, CLASSES])
        .with_param("bias", Parameter::Bool(true))
        .with_attribute(
            "weight",
            Attribute::from_f32(vec![CLASSES, CONV_CHANNELS * 4], &fc_weight),
        )
        .with_attribute("bias", Attribute::from_f32(vec![CLASSES], &fc_bias));

    b.operator("softmax", "F.softmax", &["6"], "7", &[1, CLASSES])
        .with_param("dim", Parameter::Int(-1));

    b.output("pnnx_output_0", &["7"]);
    Ok(b.build()?)
}
