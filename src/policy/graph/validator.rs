// SPDX-License-Identifier: MIT

//! Structural validation of compiled policy graphs

use super::types::CompiledGraph;
use crate::error::CompileError;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

/// Reject graphs whose registered transitions contain a cycle
///
/// The evaluator has no step budget, so this must hold before a graph is
/// ever evaluated.
pub fn validate_graph(graph: &CompiledGraph) -> Result<(), CompileError> {
    match find_cycle(graph) {
        Some(state) => Err(CompileError::CyclicGraph { state }),
        None => Ok(()),
    }
}

/// Three-color depth-first search over the transition relation.
///
/// Returns the first state found on a cycle. The walk keeps its own stack so
/// arbitrarily long chains cannot overflow the thread stack; roots are
/// visited in declaration order so the reported state is deterministic.
pub fn find_cycle(graph: &CompiledGraph) -> Option<String> {
    let mut marks: HashMap<&str, Mark> = HashMap::new();

    for root in graph.sources() {
        if marks.contains_key(root) {
            continue;
        }

        // (state, index of the next transition to explore)
        let mut stack: Vec<(&str, usize)> = vec![(root, 0)];
        marks.insert(root, Mark::InProgress);

        while let Some(top) = stack.len().checked_sub(1) {
            let (state, next) = stack[top];

            match graph.transitions(state).get(next) {
                Some(transition) => {
                    stack[top].1 += 1;
                    let to = transition.to.as_str();
                    match marks.get(to) {
                        None => {
                            marks.insert(to, Mark::InProgress);
                            stack.push((to, 0));
                        }
                        Some(Mark::InProgress) => return Some(to.to_string()),
                        Some(Mark::Done) => {}
                    }
                }
                None => {
                    marks.insert(state, Mark::Done);
                    stack.pop();
                }
            }
        }
    }

    None
}
