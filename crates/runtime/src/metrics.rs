// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Forward-pass profiling metrics.
//!
//! [`ForwardMetrics`] collects per-node compute time and the wall-clock
//! time of a complete forward pass.

use std::time::Duration;

/// Metrics for a single node's execution.
#[derive(Debug, Clone, serde::Serialize)]
pub struct LayerMetrics {
    /// Node name.
    pub node_name: String,
    /// Layer kind, e.g. `"Convolution"`.
    pub layer_type: String,
    /// Time spent in the layer's forward.
    pub compute_duration: Duration,
    /// Elements written to the node's output operand.
    pub output_elements: usize,
}

/// Aggregate metrics for a forward pass.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ForwardMetrics {
    /// Total wall-clock time for the pass.
    pub total_duration: Duration,
    /// Sum of the layers' compute time.
    pub total_compute_duration: Duration,
    /// Batch size of the pass.
    pub batch_size: usize,
    pub layer_metrics: Vec<LayerMetrics>,
}

impl ForwardMetrics {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size,
            ..Self::default()
        }
    }

    /// Records metrics for a single node.
    pub fn record_layer(
        &mut self,
        name: &str,
        layer_type: &str,
        compute: Duration,
        output_elements: usize,
    ) {
        self.total_compute_duration += compute;
        self.layer_metrics.push(LayerMetrics {
            node_name: name.to_string(),
            layer_type: layer_type.to_string(),
            compute_duration: compute,
            output_elements,
        });
    }

    /// Finalises metrics with the total wall-clock time.
    pub fn finalise(&mut self, total: Duration) {
        self.total_duration = total;
    }

    /// The node with the largest compute time.
    pub fn slowest_layer(&self) -> Option<&LayerMetrics> {
        self.layer_metrics.iter().max_by_key(|m| m.compute_duration)
    }

    /// Returns a human-readable summary suitable for CLI output.
    pub fn summary(&self) -> String {
        let total_ms = self.total_duration.as_secs_f64() * 1000.0;
        let compute_ms = self.total_compute_duration.as_secs_f64() * 1000.0;
        let compute_pct = if total_ms > 0.0 {
            compute_ms / total_ms * 100.0
        } else {
            0.0
        };
        let slowest = self
            .slowest_layer()
            .map(|m| {
                format!(
                    ", slowest '{}' ({:.2}ms)",
                    m.node_name,
                    m.compute_duration.as_secs_f64() * 1000.0
                )
            })
            .unwrap_or_default();

        format!(
            "Forward: {total_ms:.2}ms total, {} layers, batch {}, \
             {compute_ms:.2}ms compute ({compute_pct:.0}%){slowest}",
            self.layer_metrics.len(),
            self.batch_size,
        )
    }
}
