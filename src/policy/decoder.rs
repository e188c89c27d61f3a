// SPDX-License-Identifier: MIT

//! Decoding of terminal-state annotations into output records
//!
//! An annotation is a comma-separated list of `key=value` pairs, e.g.
//! `approved=false, tier=prime`. `true` and `false` become booleans; every
//! other value stays a string, numbers included.

use crate::policy::record::Record;
use serde_json::Value;

/// Merge a decoded annotation over a copy of `input`
///
/// Annotation keys override input fields of the same name; segments without
/// an `=` are ignored.
pub fn decode(annotation: &str, input: &Record) -> Record {
    let mut output = input.clone();

    if annotation.is_empty() {
        return output;
    }

    for segment in annotation.split(',') {
        if let Some((key, value)) = segment.trim().split_once('=') {
            output.insert(key.trim().to_string(), decode_value(value.trim()));
        }
    }

    output
}

fn decode_value(value: &str) -> Value {
    match value {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        other => Value::String(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_empty_annotation_copies_input() {
        let input = record(json!({"age": 20, "name": "ana"}));
        assert_eq!(decode("", &input), input);
    }

    #[test]
    fn test_booleans_and_strings() {
        let input = record(json!({"age": 20}));
        let output = decode("approved=true, tier=prime, flagged=false", &input);

        assert_eq!(
            Value::Object(output),
            json!({"age": 20, "approved": true, "tier": "prime", "flagged": false})
        );
    }

    #[test]
    fn test_numbers_stay_strings() {
        let output = decode("limit=3, rate=0.5", &Record::new());
        assert_eq!(output["limit"], json!("3"));
        assert_eq!(output["rate"], json!("0.5"));
    }

    #[test]
    fn test_annotation_overrides_input() {
        let input = record(json!({"approved": true, "income": 49999}));
        let output = decode("approved=false", &input);

        assert_eq!(output["approved"], json!(false));
        assert_eq!(output["income"], json!(49999));
    }

    #[test]
    fn test_segments_without_equals_are_discarded() {
        let input = record(json!({"age": 17}));
        let output = decode("error: stuck, approved=false, garbage", &input);
        assert_eq!(
            Value::Object(output),
            json!({"age": 17, "approved": false})
        );
    }

    #[test]
    fn test_split_on_first_equals_and_trim() {
        let output = decode("  expr = a=b  ,note=  spaced out ", &Record::new());
        assert_eq!(output["expr"], json!("a=b"));
        assert_eq!(output["note"], json!("spaced out"));
    }

    #[test]
    fn test_boolean_literals_are_exact() {
        let output = decode("a=True, b=FALSE, c=true", &Record::new());
        assert_eq!(output["a"], json!("True"));
        assert_eq!(output["b"], json!("FALSE"));
        assert_eq!(output["c"], json!(true));
    }

    #[test]
    fn test_input_untouched() {
        let input = record(json!({"approved": true}));
        let _ = decode("approved=false", &input);
        assert_eq!(input["approved"], json!(true));
    }
}
