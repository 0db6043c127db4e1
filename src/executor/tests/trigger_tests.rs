//! Trigger collection semantics

use super::helpers::execute;
use crate::error::EvalError;
use crate::triggers::TriggerAction;
use crate::values::Val;
use serde_json::json;

#[test]
fn test_triggers_collected_in_emission_order() {
    let result = execute(
        "trigger(\"first\"); trigger(\"second\", {n: 2}); trigger(\"third\", [3]); \"done\"",
    )
    .unwrap();

    assert_eq!(result.value, Val::Str("done".to_string()));
    assert_eq!(
        result.triggers,
        vec![
            TriggerAction::new("first", json!(null)),
            TriggerAction::new("second", json!({"n": 2})),
            TriggerAction::new("third", json!([3])),
        ]
    );
}

#[test]
fn test_trigger_evaluates_to_null() {
    let result = execute("trigger(\"ping\")").unwrap();
    assert_eq!(result.value, Val::Null);
    assert_eq!(result.triggers.len(), 1);
}

#[test]
fn test_payload_captured_at_emission_time() {
    let result = execute("let x = 1; trigger(\"snap\", x); x = 2; x").unwrap();
    assert_eq!(result.value, Val::Num(2.0));
    assert_eq!(result.triggers, vec![TriggerAction::new("snap", json!(1))]);
}

#[test]
fn test_failed_evaluation_discards_partial_triggers() {
    // Two triggers emitted, then a failure: all-or-nothing means the caller
    // sees an error and no trigger list at all
    let err = execute("trigger(\"a\"); trigger(\"b\"); boom()").expect_err("expected failure");
    assert_eq!(err, EvalError::runtime("boom is not defined"));
}

#[test]
fn test_trigger_requires_string_kind() {
    let err = execute("trigger(42)").expect_err("expected failure");
    assert!(matches!(err, EvalError::Runtime { .. }));
    let err = execute("trigger()").expect_err("expected failure");
    assert!(matches!(err, EvalError::Runtime { .. }));
}

#[test]
fn test_trigger_intrinsic_cannot_be_shadowed() {
    let result = execute("let trigger = 5; trigger(\"still-works\")").unwrap();
    assert_eq!(result.triggers, vec![TriggerAction::new("still-works", json!(null))]);
}
