// SPDX-License-Identifier: MIT

//! Policy graph compiler
//!
//! Turns DOT text into a `CompiledGraph`: parses the text, maps attributes
//! onto states and transitions, compiles every transition condition and
//! rejects cyclic graphs.

use super::dot::{self, Attributes};
use super::types::{CompiledGraph, State, Transition};
use super::validator::validate_graph;
use crate::error::CompileError;
use crate::policy::condition::{ConditionCompiler, ExprCompiler};
use crate::policy::record::TypeEnv;
use std::sync::Arc;

/// Attributes holding a state's annotation. `result` is the policy
/// vocabulary, `comment` the DOT-native spelling.
pub const ANNOTATION_ATTRS: &[&str] = &["result", "comment"];

/// Attributes holding a transition's condition. `cond` is the policy
/// vocabulary, `label` the DOT-native spelling.
pub const CONDITION_ATTRS: &[&str] = &["cond", "label"];

/// Compiles policy graph text
#[derive(Clone)]
pub struct GraphCompiler {
    conditions: Arc<dyn ConditionCompiler>,
}

impl GraphCompiler {
    /// Create a compiler using the given condition language
    pub fn new(conditions: Arc<dyn ConditionCompiler>) -> Self {
        Self { conditions }
    }

    /// Compile graph text against a variable-type environment
    pub fn compile(&self, source: &str, env: &TypeEnv) -> Result<CompiledGraph, CompileError> {
        let parsed = dot::parse(source)?;
        let mut graph = CompiledGraph::new();

        for node in &parsed.nodes {
            graph.add_state(State {
                id: node.id.clone(),
                annotation: annotation(&node.attrs).to_string(),
            });
        }

        for edge in &parsed.edges {
            let text = condition(&edge.attrs);
            if text.is_empty() {
                log::debug!(
                    "Ignoring unconditioned transition {} -> {}",
                    edge.from,
                    edge.to
                );
                continue;
            }

            let predicate = self.conditions.compile(text, env).map_err(|cause| {
                log::warn!("Failed to compile condition '{}': {}", text, cause);
                CompileError::InvalidCondition {
                    from: edge.from.clone(),
                    to: edge.to.clone(),
                    text: text.to_string(),
                    cause,
                }
            })?;

            graph.add_transition(Transition {
                from: edge.from.clone(),
                to: edge.to.clone(),
                condition: text.to_string(),
                predicate,
            });
        }

        if let Err(e) = validate_graph(&graph) {
            log::warn!("Invalid policy graph: {}", e);
            return Err(e);
        }

        log::debug!(
            "Compiled policy graph: {} states, {} transitions",
            graph.state_count(),
            graph.transition_count()
        );
        Ok(graph)
    }
}

impl Default for GraphCompiler {
    fn default() -> Self {
        Self::new(Arc::new(ExprCompiler))
    }
}

fn annotation(attrs: &Attributes) -> &str {
    attrs.get_any(ANNOTATION_ATTRS).unwrap_or("")
}

fn condition(attrs: &Attributes) -> &str {
    attrs.get_any(CONDITION_ATTRS).unwrap_or("")
}
