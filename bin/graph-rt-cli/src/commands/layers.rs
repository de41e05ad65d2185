// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `graph-rt layers` command: list the operator types the registry can build.

pub fn execute() -> anyhow::Result<()> {
    let registry = layers::register_all();

    println!("  Registered layer types ({}):", registry.len());
    for op_type in registry.registered_types() {
        println!("   {op_type}");
    }
    println!();
    Ok(())
}
