// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Topological ordering of runtime nodes.
//!
//! The order is a reversed DFS post-order seeded at every Input node in
//! name order. Successors are visited in name order, so independent
//! siblings keep a stable relative order within a build.

use crate::operator::{NodeKind, RuntimeOperator};
use crate::RuntimeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Active,
    Done,
}

/// Computes the execution order as indices into `operators`.
///
/// # Errors
/// [`RuntimeError::Topology`] when a cycle is reachable from an input or
/// the order does not cover every node exactly once.
pub fn topological_order(operators: &[RuntimeOperator]) -> Result<Vec<usize>, RuntimeError> {
    let mut seeds: Vec<usize> = operators
        .iter()
        .enumerate()
        .filter(|(_, op)| op.kind() == NodeKind::Input)
        .map(|(i, _)| i)
        .collect();
    seeds.sort_by(|&a, &b| operators[a].name.cmp(&operators[b].name));

    let mut marks = vec![Mark::Unvisited; operators.len()];
    let mut post = Vec::with_capacity(operators.len());
    let mut stack: Vec<(usize, usize)> = Vec::new();

    for seed in seeds {
        if marks[seed] != Mark::Unvisited {
            continue;
        }
        marks[seed] = Mark::Active;
        stack.push((seed, 0));

        while let Some(top) = stack.last_mut() {
            let (node, cursor) = *top;
            match operators[node].output_operators.values().nth(cursor) {
                Some(&next) => {
                    top.1 += 1;
                    if next >= operators.len() {
                        return Err(RuntimeError::Topology(format!(
                            "'{}' links to missing node #{next}",
                            operators[node].name
                        )));
                    }
                    match marks[next] {
                        Mark::Unvisited => {
                            marks[next] = Mark::Active;
                            stack.push((next, 0));
                        }
                        Mark::Active => {
                            return Err(RuntimeError::Topology(format!(
                                "cycle through '{}' and '{}'",
                                operators[node].name, operators[next].name
                            )));
                        }
                        Mark::Done => {}
                    }
                }
                None => {
                    marks[node] = Mark::Done;
                    post.push(node);
                    stack.pop();
                }
            }
        }
    }

    post.reverse();
    check_permutation(operators, &post)?;
    Ok(post)
}

/// Checks that `order` lists every node exactly once.
pub fn check_permutation(
    operators: &[RuntimeOperator],
    order: &[usize],
) -> Result<(), RuntimeError> {
    let mut seen = vec![false; operators.len()];
    for &index in order {
        match seen.get_mut(index) {
            Some(flag) if !*flag => *flag = true,
            Some(_) => {
                return Err(RuntimeError::Topology(format!(
                    "'{}' scheduled twice",
                    operators[index].name
                )))
            }
            None => {
                return Err(RuntimeError::Topology(format!(
                    "scheduled index #{index} out of range"
                )))
            }
        }
    }
    if let Some(missing) = seen.iter().position(|&s| !s) {
        return Err(RuntimeError::Topology(format!(
            "'{}' is not reachable from any input ({} of {} nodes scheduled)",
            operators[missing].name,
            order.len(),
            operators.len()
        )));
    }
    Ok(())
}
