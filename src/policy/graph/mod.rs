// SPDX-License-Identifier: MIT

//! Policy decision graphs
//!
//! This module provides the graph model, the DOT-subset parser, the compiler
//! that turns graph text into an executable `CompiledGraph`, and the
//! evaluator that walks it.

mod compiler;
pub mod dot;
mod evaluator;
pub mod types;
mod validator;

pub use compiler::{GraphCompiler, ANNOTATION_ATTRS, CONDITION_ATTRS};
pub use evaluator::{evaluate, Evaluation, ENTRY_STATE};
pub use types::{CompiledGraph, State, Transition};
pub use validator::{find_cycle, validate_graph};
