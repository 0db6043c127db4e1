//! Cross-call isolation
//!
//! The same long-lived executor serves many calls; nothing a script does to
//! its scope may be observable by a later call.

use crate::error::EvalError;
use crate::executor::{Executor, SandboxExecutor};
use crate::values::{ScriptGlobals, Val};
use maplit::hashmap;

#[test]
fn test_context_mutation_does_not_leak_into_next_call() {
    let mut executor = SandboxExecutor::new();
    let ctx = hashmap! {
        "count".to_string() => Val::Num(1.0),
    };

    let first = executor
        .execute("count = count + 100; count", &ctx, None)
        .unwrap();
    assert_eq!(first.value, Val::Num(101.0));

    // Same executor, same context object: the mutation must not persist
    let second = executor.execute("count", &ctx, None).unwrap();
    assert_eq!(second.value, Val::Num(1.0));
}

#[test]
fn test_locals_do_not_leak_into_next_call() {
    let mut executor = SandboxExecutor::new();
    executor
        .execute("let scratch = 42; scratch", &ScriptGlobals::new(), None)
        .unwrap();

    let err = executor
        .execute("scratch", &ScriptGlobals::new(), None)
        .expect_err("expected lookup failure");
    assert_eq!(err, EvalError::runtime("scratch is not defined"));
}

#[test]
fn test_library_mutation_shadows_per_call_only() {
    let mut executor = SandboxExecutor::new();
    executor.register_library(
        "cfg",
        Val::Obj(hashmap! {
            "mode".to_string() => Val::Str("strict".to_string()),
        }),
    );

    let first = executor
        .execute("cfg.mode = \"loose\"; cfg.mode", &ScriptGlobals::new(), None)
        .unwrap();
    assert_eq!(first.value, Val::Str("loose".to_string()));

    // The persistent binding is untouched
    let second = executor
        .execute("cfg.mode", &ScriptGlobals::new(), None)
        .unwrap();
    assert_eq!(second.value, Val::Str("strict".to_string()));
}

#[test]
fn test_rebinding_a_library_name_is_per_call() {
    let mut executor = SandboxExecutor::new();
    executor.register_library("answer", Val::Num(42.0));

    let first = executor
        .execute("answer = 0; answer", &ScriptGlobals::new(), None)
        .unwrap();
    assert_eq!(first.value, Val::Num(0.0));

    let second = executor.execute("answer", &ScriptGlobals::new(), None).unwrap();
    assert_eq!(second.value, Val::Num(42.0));
}

#[test]
fn test_result_matches_evaluation_in_isolation() {
    // s2 evaluated after an unrelated s1 must equal s2 evaluated alone
    let s2 = "let doubled = n * 2; doubled";
    let ctx2 = hashmap! { "n".to_string() => Val::Num(7.0) };

    let alone = SandboxExecutor::new().execute(s2, &ctx2, None).unwrap();

    let mut executor = SandboxExecutor::new();
    let ctx1 = hashmap! { "n".to_string() => Val::Num(1000.0) };
    executor.execute("n = n + 1; let doubled = -1", &ctx1, None).unwrap();
    let after = executor.execute(s2, &ctx2, None).unwrap();

    assert_eq!(alone.value, after.value);
    assert_eq!(after.value, Val::Num(14.0));
}

#[test]
fn test_failed_call_leaves_persistent_scope_intact() {
    let mut executor = SandboxExecutor::new();
    executor.register_library("answer", Val::Num(42.0));

    executor
        .execute("answer = 0; boom()", &ScriptGlobals::new(), None)
        .expect_err("expected failure");

    let result = executor.execute("answer", &ScriptGlobals::new(), None).unwrap();
    assert_eq!(result.value, Val::Num(42.0));
}
