// SPDX-License-Identifier: MIT

//! Condition evaluation for policy transitions
//!
//! This module provides parsing, type checking and evaluation of the boolean
//! conditions attached to graph edges. Conditions are expressions like:
//! - `age >= 18`
//! - `country in ['BR', 'AR'] && not risk_flag`
//! - `current_debt / annual_revenue < 0.5`
//!
//! The graph compiler only sees the `ConditionCompiler` and `Predicate`
//! traits, so the language can be swapped without touching it.

mod ast;
mod checker;
mod evaluator;
mod lexer;
mod parser;

pub use ast::{ArithOp, CompareOp, Expression, Literal};
pub use checker::check;
pub use evaluator::evaluate;
pub use parser::parse;

use crate::error::ConditionError;
use crate::policy::record::{Record, TypeEnv};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// An executable condition
pub trait Predicate: Send + Sync + fmt::Debug {
    /// Run the condition against a record. Only `Value::Bool(true)` counts
    /// as a match.
    fn run(&self, record: &Record) -> Result<Value, ConditionError>;
}

/// Compiles condition text into a `Predicate`
pub trait ConditionCompiler: Send + Sync {
    fn compile(&self, source: &str, env: &TypeEnv) -> Result<Arc<dyn Predicate>, ConditionError>;
}

/// The built-in condition language
#[derive(Debug, Clone, Copy, Default)]
pub struct ExprCompiler;

impl ConditionCompiler for ExprCompiler {
    fn compile(&self, source: &str, env: &TypeEnv) -> Result<Arc<dyn Predicate>, ConditionError> {
        let expr = parse(source)?;
        check(&expr, env)?;
        Ok(Arc::new(CompiledCondition { expr }))
    }
}

/// A parsed and type-checked expression
#[derive(Debug, Clone)]
pub struct CompiledCondition {
    expr: Expression,
}

impl Predicate for CompiledCondition {
    fn run(&self, record: &Record) -> Result<Value, ConditionError> {
        evaluate(&self.expr, record)
    }
}
