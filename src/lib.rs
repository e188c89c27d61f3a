// SPDX-License-Identifier: MIT

//! Policy decision graph engine
//!
//! Compiles decision graphs written in DOT, where transitions carry boolean
//! conditions and terminal states carry `key=value` annotations, and
//! evaluates them against JSON records.

pub mod error;
pub mod policy;
pub mod server;
pub mod service;
