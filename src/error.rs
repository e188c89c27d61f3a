// SPDX-License-Identifier: MIT

//! Typed error handling for the policy engine
//!
//! Each layer has its own error enum; `PolicyError` is the top-level type
//! surfaced by the service and rendered by the transport layer.

use axum::http::StatusCode;
use thiserror::Error;

/// Top-level error type for policy-engine
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The policy graph could not be compiled
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// The policy graph compiled but evaluation did not reach a decision
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    /// Cache construction errors
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Configuration errors (CLI input that is valid JSON but not a record)
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl PolicyError {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Short machine-readable name of the failure
    pub fn kind(&self) -> &'static str {
        match self {
            PolicyError::Compile(CompileError::Syntax { .. }) => "syntax",
            PolicyError::Compile(CompileError::InvalidCondition { .. }) => "invalid_condition",
            PolicyError::Compile(CompileError::CyclicGraph { .. }) => "cyclic_graph",
            PolicyError::Evaluation(EvaluationError::Stuck { .. }) => "stuck",
            PolicyError::Cache(_) => "cache",
            PolicyError::Config(_) => "config",
            PolicyError::Io(_) => "io",
            PolicyError::Json(_) => "invalid_json",
            PolicyError::Yaml(_) => "invalid_yaml",
        }
    }

    /// HTTP status reported for this failure
    pub fn status_code(&self) -> StatusCode {
        match self {
            PolicyError::Compile(_) | PolicyError::Json(_) | PolicyError::Yaml(_) => {
                StatusCode::BAD_REQUEST
            }
            PolicyError::Evaluation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            PolicyError::Cache(_) | PolicyError::Config(_) | PolicyError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Errors raised while turning graph text into a `CompiledGraph`
#[derive(Debug, Error)]
pub enum CompileError {
    /// Malformed graph text
    #[error("parse error at line {line}, column {column}: {message}")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },

    /// A transition's condition failed to compile
    #[error("failed to compile condition '{text}' on {from} -> {to}: {cause}")]
    InvalidCondition {
        from: String,
        to: String,
        text: String,
        #[source]
        cause: ConditionError,
    },

    /// The conditioned transitions form a cycle
    #[error("invalid policy graph: an infinite loop (cycle) was detected through state '{state}'")]
    CyclicGraph { state: String },
}

impl CompileError {
    pub fn syntax(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            line,
            column,
            message: message.into(),
        }
    }
}

/// Errors raised while walking a compiled graph
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EvaluationError {
    /// Traversal reached a non-terminal state where no transition matched
    #[error("stuck in graph at state '{state}': no conditions matched")]
    Stuck { state: String },
}

/// Condition compilation and execution errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConditionError {
    /// The condition text is not a valid expression
    #[error("syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    /// The condition references a name the type environment does not know
    #[error("unknown name '{name}'")]
    UnknownName { name: String },

    /// Operand types are incompatible with the operator
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// The record does not carry a field the condition reads
    #[error("field '{name}' is missing from the input")]
    MissingField { name: String },

    /// Division or remainder by zero
    #[error("division by zero")]
    DivisionByZero,

    /// Arithmetic overflowed to infinity or produced NaN
    #[error("arithmetic result is not a finite number")]
    NonFinite,
}

impl ConditionError {
    pub fn syntax(offset: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            offset,
            message: message.into(),
        }
    }

    pub fn type_mismatch(message: impl Into<String>) -> Self {
        Self::TypeMismatch(message.into())
    }
}

/// Compiled-artifact cache errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("cache capacity must be greater than zero")]
    ZeroCapacity,
}
