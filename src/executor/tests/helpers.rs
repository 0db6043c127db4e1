//! Test helpers for executor tests

use crate::error::EvalError;
use crate::executor::{Evaluation, Executor, SandboxExecutor};
use crate::values::{ScriptGlobals, Val};

/// Evaluate a script on a fresh sandbox with an empty context
pub fn execute(src: &str) -> Result<Evaluation, EvalError> {
    SandboxExecutor::new().execute(src, &ScriptGlobals::new(), None)
}

/// Evaluate a script on a fresh sandbox against the given context
pub fn execute_with(src: &str, context: ScriptGlobals) -> Result<Evaluation, EvalError> {
    SandboxExecutor::new().execute(src, &context, None)
}

/// Evaluate and unwrap the value, panicking on failure
pub fn eval_value(src: &str) -> Val {
    execute(src).expect("evaluation failed").value
}
