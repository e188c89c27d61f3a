// SPDX-License-Identifier: MIT

//! Policy graph type definitions
//!
//! A `CompiledGraph` is built once per distinct graph text and never changes
//! afterwards, so it can be shared across threads behind an `Arc`.

use crate::policy::condition::Predicate;
use std::collections::HashMap;
use std::sync::Arc;

/// A named state of the decision graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct State {
    /// Unique identifier within the graph
    pub id: String,
    /// Decision payload; empty means none
    pub annotation: String,
}

/// A guarded edge between two states
#[derive(Debug, Clone)]
pub struct Transition {
    pub from: String,
    pub to: String,
    /// Condition text as written in the graph
    pub condition: String,
    pub predicate: Arc<dyn Predicate>,
}

/// An executable policy graph
#[derive(Debug, Default)]
pub struct CompiledGraph {
    states: HashMap<String, State>,
    /// State ids in declaration order
    order: Vec<String>,
    /// Outgoing transitions per source state, in declaration order
    adjacency: HashMap<String, Vec<Transition>>,
}

impl CompiledGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a state; a repeated id replaces the earlier annotation
    pub fn add_state(&mut self, state: State) {
        if !self.states.contains_key(&state.id) {
            self.order.push(state.id.clone());
        }
        self.states.insert(state.id.clone(), state);
    }

    /// Register a transition after any already registered for its source
    pub fn add_transition(&mut self, transition: Transition) {
        self.adjacency
            .entry(transition.from.clone())
            .or_default()
            .push(transition);
    }

    pub fn state(&self, id: &str) -> Option<&State> {
        self.states.get(id)
    }

    /// Annotation of a state; undeclared states have none
    pub fn annotation(&self, id: &str) -> &str {
        self.states
            .get(id)
            .map(|s| s.annotation.as_str())
            .unwrap_or("")
    }

    /// Ordered outgoing transitions of a state
    pub fn transitions(&self, id: &str) -> &[Transition] {
        self.adjacency.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Source state ids that have at least one transition, in declaration
    /// order of the states (sources never declared as states come last,
    /// sorted)
    pub fn sources(&self) -> Vec<&str> {
        let mut sources: Vec<&str> = self
            .order
            .iter()
            .filter(|id| self.adjacency.contains_key(*id))
            .map(String::as_str)
            .collect();

        let mut undeclared: Vec<&str> = self
            .adjacency
            .keys()
            .filter(|id| !self.states.contains_key(*id))
            .map(String::as_str)
            .collect();
        undeclared.sort_unstable();
        sources.extend(undeclared);
        sources
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn transition_count(&self) -> usize {
        self.adjacency.values().map(Vec::len).sum()
    }
}
