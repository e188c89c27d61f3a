// SPDX-License-Identifier: MIT

//! Inference service
//!
//! Composes the request flow: look up the compiled graph for the request's
//! text (compiling and caching it on a miss), walk it from `start` and merge
//! the terminal annotation over the input.

use crate::error::{CompileError, PolicyError};
use crate::policy::cache::PolicyCache;
use crate::policy::decoder;
use crate::policy::graph::{CompiledGraph, Evaluation, GraphCompiler};
use crate::policy::record::{Record, TypeEnv, TypeSchema};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

/// Body of an inference request
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct InferRequest {
    /// Policy graph in DOT text
    pub policy_dot: String,
    /// Record the policy is evaluated against
    #[serde(default)]
    pub input: Record,
    /// Declared field types; when absent the input record's own value types
    /// are used to compile the conditions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<TypeSchema>,
}

impl InferRequest {
    pub fn new(policy_dot: impl Into<String>, input: Record) -> Self {
        Self {
            policy_dot: policy_dot.into(),
            input,
            schema: None,
        }
    }

    pub fn with_schema(mut self, schema: TypeSchema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Build a request from a policy file, JSON input text and an optional
    /// YAML (or JSON) schema file
    pub fn from_files(
        policy: &Path,
        input: &str,
        schema: Option<&Path>,
    ) -> Result<Self, PolicyError> {
        let policy_dot = std::fs::read_to_string(policy)?;

        let input = match serde_json::from_str::<Value>(input)? {
            Value::Object(record) => record,
            other => {
                return Err(PolicyError::config(format!(
                    "input must be a JSON object, got {}",
                    other
                )))
            }
        };

        let mut request = Self::new(policy_dot, input);
        if let Some(path) = schema {
            let text = std::fs::read_to_string(path)?;
            request.schema = Some(serde_yaml::from_str(&text)?);
        }
        Ok(request)
    }
}

/// Body of a successful inference response
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct InferResponse {
    pub output: Record,
}

/// Full outcome of one inference, including how the decision was reached
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub evaluation: Evaluation,
    pub output: Record,
}

#[derive(Clone)]
pub struct InferService {
    cache: Arc<PolicyCache>,
    compiler: GraphCompiler,
}

impl std::fmt::Debug for InferService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferService").finish_non_exhaustive()
    }
}

impl InferService {
    pub fn new(cache: Arc<PolicyCache>) -> Self {
        Self::with_compiler(cache, GraphCompiler::default())
    }

    /// Create a service with its own cache of `capacity` graphs
    pub fn with_capacity(capacity: usize) -> Result<Self, PolicyError> {
        Ok(Self::new(Arc::new(PolicyCache::new(capacity)?)))
    }

    /// Create a service using a custom graph compiler
    pub fn with_compiler(cache: Arc<PolicyCache>, compiler: GraphCompiler) -> Self {
        Self { cache, compiler }
    }

    pub fn cache(&self) -> &PolicyCache {
        &self.cache
    }

    /// Fetch the compiled graph for `source`, compiling it on a cache miss.
    ///
    /// Failed compilations are never cached.
    pub fn compiled(&self, source: &str, env: &TypeEnv) -> Result<Arc<CompiledGraph>, CompileError> {
        if let Some(graph) = self.cache.get(source) {
            log::debug!("Policy cache hit");
            return Ok(graph);
        }

        log::info!("Policy cache miss, compiling {} bytes of graph text", source.len());
        let graph = Arc::new(self.compiler.compile(source, env)?);
        self.cache.put(source, graph.clone());
        Ok(graph)
    }

    /// Evaluate a request and keep the traversal details
    pub fn decide(&self, request: &InferRequest) -> Result<Decision, PolicyError> {
        let env = match &request.schema {
            Some(schema) => TypeEnv::from_schema(schema),
            None => TypeEnv::from_record(&request.input),
        };

        let graph = self.compiled(&request.policy_dot, &env)?;
        let evaluation = graph.evaluate(&request.input)?;
        let output = decoder::decode(&evaluation.annotation, &request.input);

        log::debug!(
            "Decision '{}' via {}",
            evaluation.final_state,
            evaluation.path.join(" -> ")
        );

        Ok(Decision { evaluation, output })
    }

    /// Evaluate a request, returning only the merged output record
    pub fn infer(&self, request: &InferRequest) -> Result<InferResponse, PolicyError> {
        self.decide(request)
            .map(|decision| InferResponse { output: decision.output })
    }
}
