// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Benchmarks for a full graph forward pass.

use std::path::Path;
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use model_ir::graph::Validated;
use model_ir::{Attribute, IrGraph, IrGraphBuilder, IrLoader, ModelError, Parameter};
use runtime::RuntimeGraph;
use tensor_core::Tensor;

struct InMemory;

impl IrLoader for InMemory {
    fn load_graph(&self, _: &Path, _: &Path) -> Result<IrGraph<Validated>, ModelError> {
        small_cnn()
    }
}

fn ints(values: &[i32]) -> Parameter {
    Parameter::IntArray(values.to_vec())
}

fn conv3x3(b: &mut IrGraphBuilder, name: &str, input: &str, output: &str, cin: usize, hw: usize) {
    let weights: Vec<f32> = (0..8 * cin * 9)
        .map(|i| ((i % 5) as f32 - 2.0) * 0.05)
        .collect();
    b.operator(name, "nn.Conv2d", &[input], output, &[1, 8, hw, hw])
        .with_param("in_channels", Parameter::Int(cin as i32))
        .with_param("out_channels", Parameter::Int(8))
        .with_param("kernel_size", ints(&[3, 3]))
        .with_param("stride", ints(&[1, 1]))
        .with_param("padding", ints(&[1, 1]))
        .with_param("dilation", ints(&[1, 1]))
        .with_param("groups", Parameter::Int(1))
        .with_param("padding_mode", Parameter::String("zeros".into()))
        .with_param("bias", Parameter::Bool(true))
        .with_attribute("weight", Attribute::from_f32(vec![8, cin, 3, 3], &weights))
        .with_attribute("bias", Attribute::from_f32(vec![8], &[0.01; 8]));
}

/// conv → relu → maxpool → conv → relu → gap → flatten → linear → softmax.
fn small_cnn() -> Result<IrGraph<Validated>, ModelError> {
    let mut b = IrGraphBuilder::new("bench-cnn");
    b.input("pnnx_input_0", "0", &[1, 3, 32, 32]);

    conv3x3(&mut b, "conv1", "0", "1", 3, 32);
    b.operator("relu1", "nn.ReLU", &["1"], "2", &[1, 8, 32, 32]);
    b.operator("pool1", "nn.MaxPool2d", &["2"], "3", &[1, 8, 16, 16])
        .with_param("kernel_size", ints(&[2, 2]))
        .with_param("stride", ints(&[2, 2]))
        .with_param("padding", ints(&[0, 0]));
    conv3x3(&mut b, "conv2", "3", "4", 8, 16);
    b.operator("relu2", "nn.ReLU", &["4"], "5", &[1, 8, 16, 16]);
    b.operator("gap", "nn.AdaptiveAvgPool2d", &["5"], "6", &[1, 8, 1, 1])
        .with_param("output_size", ints(&[1, 1]));
    b.operator("flatten", "torch.flatten", &["6"], "7", &[1, 8])
        .with_param("start_dim", Parameter::Int(1))
        .with_param("end_dim", Parameter::Int(-1));
    let fc: Vec<f32> = (0..10 * 8).map(|i| (i % 3) as f32 * 0.1).collect();
    b.operator("fc", "nn.Linear", &["7"], "8", &[1, 10])
        .with_param("bias", Parameter::Bool(false))
        .with_attribute("weight", Attribute::from_f32(vec![10, 8], &fc));
    b.operator("softmax", "F.softmax", &["8"], "9", &[1, 10])
        .with_param("dim", Parameter::Int(-1));
    b.output("pnnx_output_0", &["9"]);
    b.build()
}

fn bench_forward(c: &mut Criterion) {
    let registry = Arc::new(layers::register_all());
    let mut graph =
        RuntimeGraph::new("bench.json", "bench.safetensors", registry).with_loader(InMemory);
    graph.set_profiling(false);
    graph
        .build("pnnx_input_0", "pnnx_output_0")
        .expect("benchmark graph builds");

    let mut input = Tensor::new(3, 32, 32);
    input.rand();
    let inputs = [Arc::new(input)];

    c.bench_function("forward_small_cnn_3x32x32", |bench| {
        bench.iter(|| graph.forward(black_box(&inputs), false))
    });
}

criterion_group!(benches, bench_forward);
criterion_main!(benches);
