// SPDX-License-Identifier: MIT

//! Input records and the type information conditions are compiled against

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// A flat record of field name to value.
///
/// Used both for the evaluation context handed to the engine and for the
/// output record it produces. Keys iterate in sorted order.
pub type Record = Map<String, Value>;

/// Supported field types
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    List,
    /// Type not known until runtime (null, nested objects, or declared `any`)
    Any,
}

impl FieldType {
    /// Infer the type of a concrete value
    pub fn of(value: &Value) -> Self {
        match value {
            Value::String(_) => FieldType::String,
            Value::Number(_) => FieldType::Number,
            Value::Bool(_) => FieldType::Boolean,
            Value::Array(_) => FieldType::List,
            Value::Null | Value::Object(_) => FieldType::Any,
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldType::String => write!(f, "string"),
            FieldType::Number => write!(f, "number"),
            FieldType::Boolean => write!(f, "boolean"),
            FieldType::List => write!(f, "list"),
            FieldType::Any => write!(f, "any"),
        }
    }
}

/// Declared field types for the records a policy will be evaluated against
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct TypeSchema {
    /// Field definitions
    #[serde(flatten)]
    pub fields: HashMap<String, FieldDef>,
}

/// Definition of a single field
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct FieldDef {
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

/// Variable-type environment handed to the condition compiler
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypeEnv {
    fields: HashMap<String, FieldType>,
}

impl TypeEnv {
    /// Derive the environment from the shape of a concrete record
    pub fn from_record(record: &Record) -> Self {
        let fields = record
            .iter()
            .map(|(name, value)| (name.clone(), FieldType::of(value)))
            .collect();
        Self { fields }
    }

    /// Build the environment from a declared schema
    pub fn from_schema(schema: &TypeSchema) -> Self {
        let fields = schema
            .fields
            .iter()
            .map(|(name, def)| (name.clone(), def.field_type))
            .collect();
        Self { fields }
    }

    pub fn insert(&mut self, name: impl Into<String>, field_type: FieldType) {
        self.fields.insert(name.into(), field_type);
    }

    /// Type of a field, or `None` if the field is not part of the environment
    pub fn get(&self, name: &str) -> Option<FieldType> {
        self.fields.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
