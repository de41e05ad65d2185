// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The runtime graph: initialisation from IR, build, and forward execution.
//!
//! ```text
//! NeedInit
//!     │  .init()       load IR, one node per operator
//!     ▼
//! NeedBuild
//!     │  .build()      wire successors, bind layers, allocate operands,
//!     ▼                compute the topological order
//! Completed
//!     │  .forward()    repeatable
//!     ▼
//!   outputs
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use layers::{BoundLayer, InferError, LayerRegistry, NodeHandle, OperatorView, SharedTensor};
use model_ir::graph::Validated;
use model_ir::{IrGraph, IrLoader, IrOperand, ModelLoader};
use tensor_core::{DataType, Tensor};

use crate::operator::{NodeKind, RuntimeOperand, RuntimeOperator};
use crate::{scheduler, ForwardMetrics, RuntimeConfig, RuntimeError};

/// Lifecycle of a [`RuntimeGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphState {
    NeedInit,
    NeedBuild,
    Completed,
}

impl fmt::Display for GraphState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GraphState::NeedInit => "NeedInit",
            GraphState::NeedBuild => "NeedBuild",
            GraphState::Completed => "Completed",
        };
        f.write_str(s)
    }
}

/// An executable graph built from an exported model.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use runtime::RuntimeGraph;
/// use tensor_core::Tensor;
///
/// let registry = Arc::new(layers::register_all());
/// let mut graph = RuntimeGraph::new(
///     "./models/demo/model.json",
///     "./models/demo/model.safetensors",
///     registry,
/// );
/// graph.build("pnnx_input_0", "pnnx_output_0").unwrap();
///
/// let input = Arc::new(Tensor::new(3, 32, 32));
/// let outputs = graph.forward(&[input], false).unwrap();
/// println!("{:?}", outputs[0].dims());
/// ```
pub struct RuntimeGraph {
    param_path: PathBuf,
    weight_path: PathBuf,
    registry: Arc<LayerRegistry>,
    loader: Box<dyn IrLoader>,
    state: GraphState,
    operators: Vec<RuntimeOperator>,
    topo: Vec<usize>,
    input_name: String,
    output_name: String,
    enable_profiling: bool,
    last_metrics: Option<ForwardMetrics>,
    ir: Option<IrGraph<Validated>>,
}

impl fmt::Debug for RuntimeGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeGraph")
            .field("param_path", &self.param_path)
            .field("weight_path", &self.weight_path)
            .field("state", &self.state)
            .field("nodes", &self.operators.len())
            .field("input_name", &self.input_name)
            .field("output_name", &self.output_name)
            .finish()
    }
}

impl RuntimeGraph {
    /// Creates a graph reading a JSON manifest and SafeTensors weights.
    pub fn new(
        param_path: impl Into<PathBuf>,
        weight_path: impl Into<PathBuf>,
        registry: Arc<LayerRegistry>,
    ) -> Self {
        Self {
            param_path: param_path.into(),
            weight_path: weight_path.into(),
            registry,
            loader: Box::new(ModelLoader),
            state: GraphState::NeedInit,
            operators: Vec::new(),
            topo: Vec::new(),
            input_name: String::new(),
            output_name: String::new(),
            enable_profiling: true,
            last_metrics: None,
            ir: None,
        }
    }

    /// Creates a graph from a [`RuntimeConfig`].
    pub fn from_config(config: &RuntimeConfig, registry: Arc<LayerRegistry>) -> Self {
        let mut graph = Self::new(
            config.param_path.clone(),
            config.weight_path.clone(),
            registry,
        );
        graph.input_name = config.input_name.clone();
        graph.output_name = config.output_name.clone();
        graph.enable_profiling = config.enable_profiling;
        graph
    }

    /// Replaces the IR source.
    pub fn with_loader(mut self, loader: impl IrLoader + 'static) -> Self {
        self.loader = Box::new(loader);
        self
    }

    pub fn set_profiling(&mut self, enabled: bool) {
        self.enable_profiling = enabled;
    }

    pub fn param_path(&self) -> &Path {
        &self.param_path
    }

    pub fn weight_path(&self) -> &Path {
        &self.weight_path
    }

    pub fn state(&self) -> GraphState {
        self.state
    }

    pub fn operators(&self) -> &[RuntimeOperator] {
        &self.operators
    }

    /// Looks up a node by name.
    pub fn node(&self, name: &str) -> Option<&RuntimeOperator> {
        self.operators.iter().find(|o| o.name == name)
    }

    pub fn node_mut(&mut self, name: &str) -> Option<&mut RuntimeOperator> {
        self.operators.iter_mut().find(|o| o.name == name)
    }

    /// Node names in scheduled order. Empty before `build`.
    pub fn topo_order(&self) -> Vec<&str> {
        self.topo
            .iter()
            .map(|&i| self.operators[i].name.as_str())
            .collect()
    }

    pub fn input_name(&self) -> &str {
        &self.input_name
    }

    pub fn output_name(&self) -> &str {
        &self.output_name
    }

    /// Metrics of the last profiled forward pass.
    pub fn last_metrics(&self) -> Option<&ForwardMetrics> {
        self.last_metrics.as_ref()
    }

    /// Loads the IR and creates one node per operator.
    ///
    /// Returns `false` with the reason logged when either path is empty,
    /// the model cannot be loaded, it has no operators, or it declares an
    /// unsupported data type.
    pub fn init(&mut self) -> bool {
        if self.param_path.as_os_str().is_empty() || self.weight_path.as_os_str().is_empty() {
            tracing::error!("the weight path or param path is empty");
            return false;
        }

        let mut ir = match self.loader.load_graph(&self.param_path, &self.weight_path) {
            Ok(ir) => ir,
            Err(e) => {
                tracing::error!(
                    "cannot load '{}' / '{}': {e}",
                    self.param_path.display(),
                    self.weight_path.display()
                );
                return false;
            }
        };
        if ir.operators.is_empty() {
            tracing::error!("graph '{}' defines no operators", ir.name);
            return false;
        }

        match convert_operators(&mut ir) {
            Ok(operators) => self.operators = operators,
            Err(e) => {
                tracing::error!("cannot initialise graph '{}': {e}", ir.name);
                return false;
            }
        }
        tracing::info!("{}", ir.summary());

        self.topo.clear();
        self.ir = Some(ir);
        self.state = GraphState::NeedBuild;
        true
    }

    /// Binds layers, allocates operand storage and computes the execution
    /// order. A no-op once the graph is `Completed`.
    pub fn build(&mut self, input_name: &str, output_name: &str) -> Result<(), RuntimeError> {
        if self.state == GraphState::Completed {
            tracing::info!("graph has been built already");
            return Ok(());
        }
        if self.state == GraphState::NeedInit && !self.init() {
            return Err(RuntimeError::InitFailed(format!(
                "cannot initialise from '{}' and '{}'",
                self.param_path.display(),
                self.weight_path.display()
            )));
        }
        if self.state != GraphState::NeedBuild {
            return Err(RuntimeError::InvalidState {
                expected: GraphState::NeedBuild,
                actual: self.state,
            });
        }
        if self.operators.is_empty() {
            return Err(RuntimeError::InitFailed("graph has no operators".into()));
        }

        self.wire_successors();
        self.create_layers()?;
        self.init_operands()?;
        self.topo = scheduler::topological_order(&self.operators)?;

        if self.node(input_name).is_none() {
            tracing::warn!("no node named '{input_name}' to feed");
        }
        self.input_name = input_name.to_string();
        self.output_name = output_name.to_string();
        self.state = GraphState::Completed;
        self.ir = None;
        tracing::info!(
            "graph built: {} nodes, {} layers",
            self.operators.len(),
            self.operators.iter().filter(|o| o.layer.is_some()).count()
        );
        Ok(())
    }

    fn wire_successors(&mut self) {
        let index: HashMap<String, usize> = self
            .operators
            .iter()
            .enumerate()
            .map(|(i, op)| (op.name.clone(), i))
            .collect();
        for op in &mut self.operators {
            op.output_operators.clear();
            for name in &op.output_names {
                if let Some(&i) = index.get(name) {
                    op.output_operators.insert(name.clone(), i);
                }
            }
        }
    }

    fn create_layers(&mut self) -> Result<(), RuntimeError> {
        for (index, op) in self.operators.iter_mut().enumerate() {
            if op.kind() != NodeKind::Compute || op.layer.is_some() {
                continue;
            }
            let inputs = op.input_operands.len();
            let mut view = OperatorView::new(&op.name, &op.op_type, &op.params, &mut op.attributes)
                .with_inputs(inputs);
            let layer = self.registry.create_layer(&mut view)?;
            op.layer = Some(BoundLayer::new(NodeHandle::new(index), layer));
        }
        Ok(())
    }

    fn init_operands(&mut self) -> Result<(), RuntimeError> {
        let ir = self
            .ir
            .as_ref()
            .ok_or_else(|| RuntimeError::InitFailed("IR graph already released".into()))?;
        for op in &mut self.operators {
            for operand in &mut op.input_operands {
                init_input_slots(operand)?;
            }
            if op.kind() == NodeKind::Output {
                continue;
            }
            let Some(name) = op.outputs.first() else {
                continue;
            };
            let declared = ir.operand(name).ok_or_else(|| {
                let node = &op.name;
                RuntimeError::InitFailed(format!("output operand '{name}' of '{node}' is missing"))
            })?;
            init_output_slots(op, declared)?;
        }
        Ok(())
    }

    /// Runs the graph on a batch and returns the tensors of the output node.
    ///
    /// Every Input node feeds `inputs` to its successors. With `debug` the
    /// shapes of every node are traced at `debug!` level.
    pub fn forward(
        &mut self,
        inputs: &[SharedTensor],
        debug: bool,
    ) -> Result<Vec<SharedTensor>, RuntimeError> {
        if self.state != GraphState::Completed {
            return Err(RuntimeError::InvalidState {
                expected: GraphState::Completed,
                actual: self.state,
            });
        }

        let start = Instant::now();
        let mut metrics = self
            .enable_profiling
            .then(|| ForwardMetrics::new(inputs.len()));
        let mut visited = vec![false; self.operators.len()];
        let order = self.topo.clone();

        for index in order {
            match self.operators[index].kind() {
                NodeKind::Input => {
                    let slots: Vec<Option<SharedTensor>> =
                        inputs.iter().cloned().map(Some).collect();
                    if let Some(out) = self.operators[index].output_operand.as_mut() {
                        out.data = slots.clone();
                    }
                    self.propagate(index, &slots)?;
                }
                NodeKind::Output => {}
                NodeKind::Compute => {
                    let (elapsed, elements) = self.run_layer(index)?;
                    let slots = self.operators[index].result_slots().to_vec();
                    self.propagate(index, &slots)?;
                    if let Some(m) = metrics.as_mut() {
                        let op = &self.operators[index];
                        m.record_layer(&op.name, &op.op_type, elapsed, elements);
                    }
                }
            }
            visited[index] = true;
            if debug {
                trace_node(&self.operators[index]);
            }
        }

        if let Some(missing) = visited.iter().position(|&v| !v) {
            return Err(RuntimeError::NodeNotVisited(self.operators[missing].name.clone()));
        }

        let outputs = self.collect_outputs()?;
        if let Some(mut m) = metrics {
            m.finalise(start.elapsed());
            tracing::info!("{}", m.summary());
            self.last_metrics = Some(m);
        }
        Ok(outputs)
    }

    fn run_layer(&mut self, index: usize) -> Result<(Duration, usize), RuntimeError> {
        let nodes = self.operators.len();
        let op = &mut self.operators[index];
        let bound = op
            .layer
            .as_mut()
            .ok_or_else(|| RuntimeError::Topology(format!("'{}' has no bound layer", op.name)))?;
        if bound.node.index() != index {
            return Err(RuntimeError::InvalidHandle {
                handle: bound.node.index(),
                nodes,
            });
        }

        let layer_name = bound.layer.name();
        let mut inputs = Vec::new();
        for operand in &op.input_operands {
            for slot in &operand.data {
                let tensor = slot.as_ref().ok_or_else(|| RuntimeError::Infer {
                    node: op.name.clone(),
                    source: InferError::InputEmpty { layer: layer_name },
                })?;
                inputs.push(Arc::clone(tensor));
            }
        }

        let outputs = match op.output_operand.as_mut() {
            Some(out) => &mut out.data,
            None => {
                return Err(RuntimeError::Infer {
                    node: op.name.clone(),
                    source: InferError::OutputEmpty { layer: layer_name },
                })
            }
        };

        let start = Instant::now();
        bound
            .layer
            .forward(&inputs, outputs)
            .map_err(|source| RuntimeError::Infer {
                node: op.name.clone(),
                source,
            })?;
        let elapsed = start.elapsed();
        let elements = outputs.iter().flatten().map(|t| t.size()).sum();
        Ok((elapsed, elements))
    }

    /// Copies `slots` into every successor operand produced by node `index`.
    fn propagate(
        &mut self,
        index: usize,
        slots: &[Option<SharedTensor>],
    ) -> Result<(), RuntimeError> {
        let producer = self.operators[index].name.clone();
        let successors: Vec<usize> = self.operators[index]
            .output_operators
            .values()
            .copied()
            .collect();
        for next in successors {
            let node = &mut self.operators[next];
            for operand in node.input_operands.iter_mut().filter(|o| o.name == producer) {
                if operand.data.len() != slots.len() {
                    return Err(RuntimeError::BatchMismatch {
                        node: node.name.clone(),
                        expected: operand.data.len(),
                        actual: slots.len(),
                    });
                }
                operand.data = slots.to_vec();
            }
        }
        Ok(())
    }

    fn collect_outputs(&self) -> Result<Vec<SharedTensor>, RuntimeError> {
        let node = self
            .node(&self.output_name)
            .ok_or_else(|| RuntimeError::MissingNode(self.output_name.clone()))?;
        node.result_slots()
            .iter()
            .map(|slot| {
                slot.clone().ok_or_else(|| RuntimeError::Infer {
                    node: node.name.clone(),
                    source: InferError::OutputEmpty { layer: "Output" },
                })
            })
            .collect()
    }

    /// Multi-line description of the nodes in scheduled order.
    pub fn summary(&self) -> String {
        let mut s = format!(
            "RuntimeGraph: {} nodes, state {}\n",
            self.operators.len(),
            self.state
        );
        if self.topo.is_empty() {
            for op in &self.operators {
                s.push_str(&format!("  {op}\n"));
            }
        } else {
            for &i in &self.topo {
                s.push_str(&format!("  {}\n", self.operators[i]));
            }
        }
        s
    }
}

fn convert_operators(ir: &mut IrGraph<Validated>) -> Result<Vec<RuntimeOperator>, RuntimeError> {
    let operands: HashMap<&str, &IrOperand> =
        ir.operands.iter().map(|o| (o.name.as_str(), o)).collect();
    let mut nodes = Vec::with_capacity(ir.operators.len());

    for op in ir.operators.iter_mut() {
        let mut node = RuntimeOperator::new(op.name.as_str(), op.op_type.as_str());

        for input in &op.inputs {
            let operand = operands.get(input.as_str()).ok_or_else(|| {
                let node = &op.name;
                RuntimeError::InitFailed(format!("input operand '{input}' of '{node}' is missing"))
            })?;
            let dtype = operand_dtype(operand)?;
            node.input_operands.push(RuntimeOperand::new(
                operand.producer.as_str(),
                operand.shape.clone(),
                dtype,
            ));
        }

        for output in &op.outputs {
            if let Some(operand) = operands.get(output.as_str()) {
                node.output_names.extend(operand.consumers.iter().cloned());
            }
        }
        node.outputs = op.outputs.clone();

        for (name, attr) in &op.attributes {
            if attr.dtype != DataType::Float32 {
                return Err(RuntimeError::UnsupportedDataType {
                    name: format!("{}.{name}", op.name),
                    tag: attr.dtype.tag(),
                });
            }
        }
        node.attributes = std::mem::take(&mut op.attributes);
        node.params = op.params.clone();
        nodes.push(node);
    }
    Ok(nodes)
}

fn operand_dtype(operand: &IrOperand) -> Result<DataType, RuntimeError> {
    match operand.dtype {
        0 => Ok(DataType::Unknown),
        1 => Ok(DataType::Float32),
        tag => Err(RuntimeError::UnsupportedDataType {
            name: operand.name.clone(),
            tag,
        }),
    }
}

/// Splits a declared shape into batch size and per-item `[c, h, w]`.
/// Splits a declared operand shape into the batch size and the
/// `(channels, rows, cols)` of each batch item.
///
/// `[batch, c, h, w]`, `[batch, h, w]` and `[batch, w]` are accepted; other
/// ranks are [`RuntimeError::InvalidShape`].
pub fn plane_dims(operand: &str, shape: &[usize]) -> Result<(usize, [usize; 3]), RuntimeError> {
    match *shape {
        [batch, c, h, w] => Ok((batch, [c, h, w])),
        [batch, h, w] => Ok((batch, [1, h, w])),
        [batch, w] => Ok((batch, [1, 1, w])),
        _ => Err(RuntimeError::InvalidShape {
            operand: operand.to_string(),
            shape: shape.to_vec(),
        }),
    }
}

fn alloc_slots(batch: usize, [c, h, w]: [usize; 3]) -> Vec<Option<SharedTensor>> {
    (0..batch)
        .map(|_| Some(Arc::new(Tensor::new(c, h, w))))
        .collect()
}

fn init_input_slots(operand: &mut RuntimeOperand) -> Result<(), RuntimeError> {
    let (batch, dims) = plane_dims(&operand.name, &operand.shape)?;
    if operand.data.is_empty() {
        operand.data = alloc_slots(batch, dims);
        return Ok(());
    }
    if operand.data.len() != batch {
        return Err(RuntimeError::BatchMismatch {
            node: operand.name.clone(),
            expected: batch,
            actual: operand.data.len(),
        });
    }
    for slot in &operand.data {
        match slot {
            Some(t) if t.dims() == dims => {}
            _ => {
                return Err(RuntimeError::InvalidShape {
                    operand: operand.name.clone(),
                    shape: operand.shape.clone(),
                })
            }
        }
    }
    Ok(())
}

fn init_output_slots(op: &mut RuntimeOperator, declared: &IrOperand) -> Result<(), RuntimeError> {
    let dtype = operand_dtype(declared)?;
    let (batch, dims) = plane_dims(&declared.name, &declared.shape)?;

    let name = op.name.as_str();
    let out = op
        .output_operand
        .get_or_insert_with(|| RuntimeOperand::new(name, declared.shape.clone(), dtype));
    if out.data.len() != batch {
        out.data = alloc_slots(batch, dims);
        return Ok(());
    }
    for slot in &mut out.data {
        match slot {
            Some(t) if t.dims() != dims => {
                tracing::warn!(
                    "reshaping output of '{}' from {:?} to {dims:?}",
                    out.name,
                    t.dims()
                );
                let tensor = Arc::make_mut(t);
                if tensor.reshape(&dims, false).is_err() {
                    *tensor = Tensor::new(dims[0], dims[1], dims[2]);
                }
            }
            Some(_) => {}
            None => *slot = Some(Arc::new(Tensor::new(dims[0], dims[1], dims[2]))),
        }
    }
    Ok(())
}

fn trace_node(op: &RuntimeOperator) {
    let inputs: Vec<[usize; 3]> = op
        .input_operands
        .iter()
        .flat_map(|o| o.data.iter().flatten().map(|t| t.dims()))
        .collect();
    let outputs: Vec<[usize; 3]> = op.result_slots().iter().flatten().map(|t| t.dims()).collect();
    tracing::debug!(node = %op.name, op_type = %op.op_type, ?inputs, ?outputs, "forward");
}

#[cfg(test)]
mod tests {
    use super::*;
    use model_ir::{Attribute, IrGraphBuilder, ModelError, Parameter};

    struct BuiltLoader(fn() -> Result<IrGraph<Validated>, ModelError>);

    impl IrLoader for BuiltLoader {
        fn load_graph(&self, _: &Path, _: &Path) -> Result<IrGraph<Validated>, ModelError> {
            (self.0)()
        }
    }

    fn relu_chain() -> Result<IrGraph<Validated>, ModelError> {
        let mut b = IrGraphBuilder::new("relu-chain");
        b.input("in", "0", &[2, 1, 2, 2]);
        b.operator("relu", "nn.ReLU", &["0"], "1", &[2, 1, 2, 2]);
        b.output("out", &["1"]);
        b.build()
    }

    fn graph_with(build: fn() -> Result<IrGraph<Validated>, ModelError>) -> RuntimeGraph {
        RuntimeGraph::new("model.json", "model.safetensors", Arc::new(layers::register_all()))
            .with_loader(BuiltLoader(build))
    }

    fn filled(value: f32) -> SharedTensor {
        let mut t = Tensor::new(1, 2, 2);
        t.fill(value);
        Arc::new(t)
    }

    #[test]
    fn test_state_transitions() {
        let mut graph = graph_with(relu_chain);
        assert_eq!(graph.state(), GraphState::NeedInit);
        assert!(graph.init());
        assert_eq!(graph.state(), GraphState::NeedBuild);
        assert_eq!(graph.operators().len(), 3);
        assert!(graph.topo_order().is_empty());

        graph.build("in", "out").unwrap();
        assert_eq!(graph.state(), GraphState::Completed);
        assert_eq!(graph.topo_order(), vec!["in", "relu", "out"]);
        assert_eq!(graph.input_name(), "in");
        assert_eq!(graph.output_name(), "out");

        graph.build("other", "names").unwrap();
        assert_eq!(graph.output_name(), "out");
    }

    #[test]
    fn test_build_wires_and_allocates() {
        let mut graph = graph_with(relu_chain);
        graph.build("in", "out").unwrap();

        let input = graph.node("in").unwrap();
        assert_eq!(input.output_operators.get("relu"), Some(&1));
        assert!(input.layer.is_none());

        let relu = graph.node("relu").unwrap();
        assert!(relu.layer.is_some());
        let operand = relu.input_operand("in").unwrap();
        assert_eq!(operand.dtype, DataType::Float32);
        assert_eq!(operand.data.len(), 2);
        assert!(operand.is_filled());
        let out = relu.output_operand.as_ref().unwrap();
        assert_eq!(out.data[0].as_ref().unwrap().dims(), [1, 2, 2]);

        assert!(graph.node("out").unwrap().output_operand.is_none());
    }

    #[test]
    fn test_forward_relu() {
        let mut graph = graph_with(relu_chain);
        graph.build("in", "out").unwrap();

        let outputs = graph.forward(&[filled(-1.0), filled(3.0)], false).unwrap();
        assert_eq!(outputs.len(), 2);
        assert!(outputs[0].data().iter().all(|&v| v == 0.0));
        assert!(outputs[1].data().iter().all(|&v| v == 3.0));

        let metrics = graph.last_metrics().unwrap();
        assert_eq!(metrics.batch_size, 2);
        assert_eq!(metrics.layer_metrics.len(), 1);
        assert_eq!(metrics.layer_metrics[0].node_name, "relu");
        assert_eq!(metrics.layer_metrics[0].output_elements, 8);
    }

    #[test]
    fn test_forward_requires_build() {
        let mut graph = graph_with(relu_chain);
        assert!(matches!(
            graph.forward(&[filled(1.0)], false),
            Err(RuntimeError::InvalidState {
                expected: GraphState::Completed,
                actual: GraphState::NeedInit
            })
        ));
    }

    #[test]
    fn test_forward_batch_mismatch() {
        let mut graph = graph_with(relu_chain);
        graph.build("in", "out").unwrap();
        assert!(matches!(
            graph.forward(&[filled(1.0)], false),
            Err(RuntimeError::BatchMismatch { expected: 2, actual: 1, .. })
        ));
    }

    #[test]
    fn test_missing_output_node() {
        let mut graph = graph_with(relu_chain);
        graph.build("in", "nowhere").unwrap();
        assert!(matches!(
            graph.forward(&[filled(1.0), filled(1.0)], true),
            Err(RuntimeError::MissingNode(ref n)) if n == "nowhere"
        ));
    }

    #[test]
    fn test_output_of_inner_node() {
        let mut graph = graph_with(relu_chain);
        graph.set_profiling(false);
        graph.build("in", "relu").unwrap();
        let outputs = graph.forward(&[filled(-2.0), filled(2.0)], false).unwrap();
        assert_eq!(outputs[1].at(0, 1, 1), 2.0);
        assert!(graph.last_metrics().is_none());
    }

    #[test]
    fn test_invalid_handle() {
        let mut graph = graph_with(relu_chain);
        graph.build("in", "out").unwrap();
        graph.node_mut("relu").unwrap().layer.as_mut().unwrap().node = NodeHandle::new(7);
        assert!(matches!(
            graph.forward(&[filled(1.0), filled(1.0)], false),
            Err(RuntimeError::InvalidHandle { handle: 7, nodes: 3 })
        ));
    }

    #[test]
    fn test_init_failures() {
        let mut graph = RuntimeGraph::new("", "w.safetensors", Arc::new(layers::register_all()));
        assert!(!graph.init());
        assert_eq!(graph.state(), GraphState::NeedInit);
        assert!(matches!(graph.build("in", "out"), Err(RuntimeError::InitFailed(_))));

        let mut missing = RuntimeGraph::new(
            "/nonexistent/model.json",
            "/nonexistent/model.safetensors",
            Arc::new(layers::register_all()),
        );
        assert!(!missing.init());
    }

    #[test]
    fn test_unsupported_dtypes() {
        fn f64_operand() -> Result<IrGraph<Validated>, ModelError> {
            let mut g = relu_chain()?;
            g.operands[0].dtype = 2;
            Ok(g)
        }
        fn f16_attribute() -> Result<IrGraph<Validated>, ModelError> {
            let mut g = relu_chain()?;
            g.operators[1]
                .with_attribute("weight", Attribute::new(DataType::Float16, vec![1], vec![0, 0]));
            Ok(g)
        }
        assert!(!graph_with(f64_operand).init());
        assert!(!graph_with(f16_attribute).init());
    }

    #[test]
    fn test_unknown_layer_type_fails_build() {
        fn gelu() -> Result<IrGraph<Validated>, ModelError> {
            let mut b = IrGraphBuilder::new("gelu");
            b.input("in", "0", &[1, 4]);
            b.operator("act", "nn.GELU", &["0"], "1", &[1, 4]);
            b.output("out", &["1"]);
            b.build()
        }
        let mut graph = graph_with(gelu);
        assert!(matches!(
            graph.build("in", "out"),
            Err(RuntimeError::Registry(layers::RegistryError::UnknownType { .. }))
        ));
        assert_eq!(graph.state(), GraphState::NeedBuild);
    }

    #[test]
    fn test_invalid_declared_shape() {
        fn rank5() -> Result<IrGraph<Validated>, ModelError> {
            let mut b = IrGraphBuilder::new("rank5");
            b.input("in", "0", &[1, 1, 1, 2, 2]);
            b.operator("relu", "nn.ReLU", &["0"], "1", &[1, 1, 1, 2, 2]);
            b.output("out", &["1"]);
            b.build()
        }
        let mut graph = graph_with(rank5);
        assert!(matches!(
            graph.build("in", "out"),
            Err(RuntimeError::InvalidShape { ref shape, .. }) if shape.len() == 5
        ));
    }

    #[test]
    fn test_layer_failure_maps_to_infer() {
        fn bad_softmax() -> Result<IrGraph<Validated>, ModelError> {
            let mut b = IrGraphBuilder::new("softmax");
            b.input("in", "0", &[1, 4]);
            b.operator("sm", "nn.Softmax", &["0"], "1", &[1, 4])
                .with_param("dim", Parameter::Int(2));
            b.output("out", &["1"]);
            b.build()
        }
        let mut graph = graph_with(bad_softmax);
        graph.build("in", "out").unwrap();
        let input = Arc::new(Tensor::new(1, 1, 4));
        match graph.forward(&[input], false) {
            Err(RuntimeError::Infer { node, source }) => {
                assert_eq!(node, "sm");
                assert!(matches!(source, InferError::DimensionParameter { .. }));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_plane_dims() {
        assert_eq!(plane_dims("x", &[2, 3, 4, 5]).unwrap(), (2, [3, 4, 5]));
        assert_eq!(plane_dims("x", &[2, 4, 5]).unwrap(), (2, [1, 4, 5]));
        assert_eq!(plane_dims("x", &[2, 5]).unwrap(), (2, [1, 1, 5]));
        assert!(plane_dims("x", &[5]).is_err());
    }

    #[test]
    fn test_output_slots_reshaped_on_drift() {
        let mut op = RuntimeOperator::new("conv", "nn.Conv2d");
        let mut out = RuntimeOperand::new("conv", vec![1, 4, 4], DataType::Float32);
        out.data = vec![Some(Arc::new(Tensor::new(4, 2, 2))), None];
        op.output_operand = Some(out);
        let declared = IrOperand {
            name: "1".into(),
            producer: "conv".into(),
            consumers: vec![],
            shape: vec![2, 4, 4],
            dtype: 1,
        };
        init_output_slots(&mut op, &declared).unwrap();
        let data = &op.output_operand.as_ref().unwrap().data;
        assert_eq!(data[0].as_ref().unwrap().dims(), [1, 4, 4]);
        assert_eq!(data[1].as_ref().unwrap().dims(), [1, 4, 4]);
    }

    #[test]
    fn test_input_slots_allocated_when_empty() {
        let mut operand = RuntimeOperand::new("0", vec![2, 3, 4, 5], DataType::Float32);
        init_input_slots(&mut operand).unwrap();
        assert_eq!(operand.data.len(), 2);
        assert!(operand.data.iter().all(|t| t.as_ref().unwrap().dims() == [3, 4, 5]));
    }

    #[test]
    fn test_input_slots_reject_wrong_batch() {
        let mut operand = RuntimeOperand::new("0", vec![2, 1, 4, 4], DataType::Float32);
        operand.data = vec![Some(Arc::new(Tensor::new(1, 4, 4)))];
        assert!(matches!(
            init_input_slots(&mut operand),
            Err(RuntimeError::BatchMismatch { expected: 2, actual: 1, .. })
        ));
    }

    #[test]
    fn test_input_slots_reject_drifted_dims() {
        let mut operand = RuntimeOperand::new("0", vec![2, 1, 4, 4], DataType::Float32);
        operand.data = vec![
            Some(Arc::new(Tensor::new(1, 4, 4))),
            Some(Arc::new(Tensor::new(1, 2, 8))),
        ];
        assert!(matches!(
            init_input_slots(&mut operand),
            Err(RuntimeError::InvalidShape { .. })
        ));

        operand.data[1] = None;
        assert!(matches!(
            init_input_slots(&mut operand),
            Err(RuntimeError::InvalidShape { .. })
        ));
    }
}
