//! Policy graph evaluator

use super::types::CompiledGraph;
use crate::error::EvaluationError;
use crate::policy::record::Record;
use serde_json::Value;

/// Conventional entry state of every policy graph
pub const ENTRY_STATE: &str = "start";

/// Outcome of walking a graph to a terminal state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub final_state: String,
    /// Annotation of the terminal state, possibly empty
    pub annotation: String,
    /// Every visited state, starting with the entry state
    pub path: Vec<String>,
}

/// Walk `graph` from `entry` until a state without outgoing transitions.
///
/// At each state the transitions are tried in declaration order and the first
/// one whose predicate returns `true` is taken. Predicates that fail to run
/// are skipped; non-boolean results count as no match. A state where nothing
/// matches yields `EvaluationError::Stuck`.
pub fn evaluate(
    graph: &CompiledGraph,
    entry: &str,
    record: &Record,
) -> Result<Evaluation, EvaluationError> {
    let mut current = entry;
    let mut path = vec![entry.to_string()];

    loop {
        let transitions = graph.transitions(current);
        if transitions.is_empty() {
            break;
        }

        let mut next = None;
        for transition in transitions {
            match transition.predicate.run(record) {
                Ok(Value::Bool(true)) => {
                    next = Some(transition.to.as_str());
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    log::warn!(
                        "Eval error on {} -> {} ('{}'): {}",
                        transition.from,
                        transition.to,
                        transition.condition,
                        e
                    );
                }
            }
        }

        match next {
            Some(to) => {
                current = to;
                path.push(to.to_string());
            }
            None => {
                log::debug!("Stuck at state '{}', path: {:?}", current, path);
                return Err(EvaluationError::Stuck {
                    state: current.to_string(),
                });
            }
        }
    }

    log::debug!("Reached terminal state '{}' via {:?}", current, path);

    Ok(Evaluation {
        final_state: current.to_string(),
        annotation: graph.annotation(current).to_string(),
        path,
    })
}

impl CompiledGraph {
    /// Evaluate from the conventional `start` state
    pub fn evaluate(&self, record: &Record) -> Result<Evaluation, EvaluationError> {
        evaluate(self, ENTRY_STATE, record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::graph::GraphCompiler;
    use crate::policy::record::TypeEnv;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn compile(source: &str, sample: &Record) -> CompiledGraph {
        GraphCompiler::default()
            .compile(source, &TypeEnv::from_record(sample))
            .unwrap()
    }

    const INCOME_POLICY: &str = r#"digraph {
        start -> check_income [cond="age >= 18"]
        start -> rejected [cond="age < 18"]
        check_income -> approved [cond="income >= 50000"]
        check_income -> rejected [cond="income < 50000"]
        approved [result="tier=prime"]
        rejected [result="approved=false"]
    }"#;

    #[test]
    fn test_two_hop_decision() {
        let input = record(json!({"age": 20, "income": 50000}));
        let graph = compile(INCOME_POLICY, &input);

        let result = evaluate(&graph, "start", &input).unwrap();
        assert_eq!(result.final_state, "approved");
        assert_eq!(result.annotation, "tier=prime");
        assert_eq!(result.path, vec!["start", "check_income", "approved"]);

        let input = record(json!({"age": 20, "income": 49999}));
        let result = graph.evaluate(&input).unwrap();
        assert_eq!(result.final_state, "rejected");
        assert_eq!(result.annotation, "approved=false");

        let input = record(json!({"age": 17, "income": 50000}));
        let result = graph.evaluate(&input).unwrap();
        assert_eq!(result.path, vec!["start", "rejected"]);
    }

    #[test]
    fn test_first_match_wins() {
        let input = record(json!({"age": 30}));
        let graph = compile(
            r#"digraph {
                start -> first [cond="age > 18"]
                start -> second [cond="age > 21"]
                first [result="which=first"]
                second [result="which=second"]
            }"#,
            &input,
        );

        let result = graph.evaluate(&input).unwrap();
        assert_eq!(result.final_state, "first");
        assert_eq!(result.annotation, "which=first");
    }

    #[test]
    fn test_stuck_when_nothing_matches() {
        let input = record(json!({"age": 20, "income": 100}));
        let graph = compile(
            r#"digraph {
                start -> check [cond="age >= 18"]
                check -> rich [cond="income > 1000000"]
                rich [result="tier=gold"]
            }"#,
            &input,
        );

        assert_eq!(
            graph.evaluate(&input),
            Err(EvaluationError::Stuck {
                state: "check".to_string()
            })
        );
    }

    #[test]
    fn test_failing_predicate_is_skipped() {
        let sample = record(json!({"age": 20, "score": 700}));
        let graph = compile(
            r#"digraph {
                start -> by_score [cond="score > 600"]
                start -> by_age [cond="age > 18"]
                by_score [result="route=score"]
                by_age [result="route=age"]
            }"#,
            &sample,
        );

        // `score` is absent, so the first transition errors and is skipped
        let input = record(json!({"age": 20}));
        let result = graph.evaluate(&input).unwrap();
        assert_eq!(result.final_state, "by_age");
    }

    #[test]
    fn test_all_predicates_failing_is_stuck() {
        let sample = record(json!({"age": 20}));
        let graph = compile(r#"digraph { start -> ok [cond="age > 18"] }"#, &sample);

        let input = record(json!({"name": "x"}));
        assert!(matches!(
            graph.evaluate(&input),
            Err(EvaluationError::Stuck { .. })
        ));
    }

    #[test]
    fn test_non_boolean_result_is_no_match() {
        let input = record(json!({"age": 20}));
        let graph = compile(
            r#"digraph {
                start -> numeric [cond="age + 1"]
                start -> ok [cond="true"]
                ok [result="approved=true"]
            }"#,
            &input,
        );
        assert_eq!(graph.evaluate(&input).unwrap().final_state, "ok");
    }

    #[test]
    fn test_missing_entry_state_is_terminal() {
        let input = record(json!({"age": 20}));
        let graph = compile(r#"digraph { a -> b [cond="age > 1"] }"#, &input);

        let result = graph.evaluate(&input).unwrap();
        assert_eq!(result.final_state, "start");
        assert_eq!(result.annotation, "");
        assert_eq!(result.path, vec!["start"]);
    }

    #[test]
    fn test_terminal_without_annotation() {
        let input = record(json!({"age": 20}));
        let graph = compile(r#"digraph { start -> done [cond="age > 1"] }"#, &input);

        let result = graph.evaluate(&input).unwrap();
        assert_eq!(result.final_state, "done");
        assert_eq!(result.annotation, "");
    }

    #[test]
    fn test_dead_edges_are_not_fallbacks() {
        let input = record(json!({"age": 10}));
        let graph = compile(
            r#"digraph {
                start -> adult [cond="age >= 18"]
                start -> fallback
                fallback [result="approved=false"]
            }"#,
            &input,
        );
        assert_eq!(
            graph.evaluate(&input),
            Err(EvaluationError::Stuck {
                state: "start".to_string()
            })
        );
    }

    #[test]
    fn test_deterministic() {
        let input = record(json!({"age": 20, "income": 50000}));
        let graph = compile(INCOME_POLICY, &input);

        let first = graph.evaluate(&input).unwrap();
        for _ in 0..50 {
            assert_eq!(graph.evaluate(&input).unwrap(), first);
        }
    }

    #[test]
    fn test_input_is_not_mutated() {
        let input = record(json!({"age": 20, "income": 50000}));
        let before = input.clone();
        let graph = compile(INCOME_POLICY, &input);
        graph.evaluate(&input).unwrap();
        assert_eq!(input, before);
    }
}
