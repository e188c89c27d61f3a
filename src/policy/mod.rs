// SPDX-License-Identifier: MIT

pub mod cache;
pub mod condition;
pub mod decoder;
pub mod graph;
pub mod record;
