//! Script executors
//!
//! An `Executor` is a long-lived sandbox able to run binding scripts and to
//! manage the library bindings in its persistent scope. The key correctness
//! property lives at this seam: libraries survive across calls, while each
//! call composes a fresh scope (see `scope`) that is discarded on return, so
//! no evaluation can observe state leaked by a previous one.

pub mod eval;
pub mod sandbox;
pub mod scope;

#[cfg(test)]
mod tests;

// Re-export commonly used items
pub use sandbox::SandboxExecutor;

use crate::error::EvalError;
use crate::triggers::TriggerAction;
use crate::values::{ScriptGlobals, Val};
use serde::{Deserialize, Serialize};

/// Result of one successful evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Value of the script's final expression
    pub value: Val,
    /// Deferred actions the script requested, in emission order
    pub triggers: Vec<TriggerAction>,
}

/// Closed enumeration of constructible backend kinds
///
/// `Sandbox` is the default metered backend for untrusted bindings.
/// `Unbounded` runs the same interpreter without a step budget, for trusted
/// host-authored expressions. Construction sites match exhaustively, so adding
/// a kind is a compile-guided change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecutorKind {
    Sandbox,
    Unbounded,
}

/// A sandboxed script execution capability
///
/// Implementations must guarantee that `execute` composes a fresh per-call
/// scope over the persistent library scope, and that a failed call leaves the
/// persistent scope exactly as it was.
pub trait Executor: Send {
    /// Evaluate `src` against `context`, returning the final value and any
    /// triggers the script emitted
    fn execute(
        &mut self,
        src: &str,
        context: &ScriptGlobals,
        callback_data: Option<&Val>,
    ) -> Result<Evaluation, EvalError>;

    /// Bind `value` under `accessor` in the persistent library scope,
    /// replacing any existing binding
    fn register_library(&mut self, accessor: &str, value: Val);

    /// Remove the binding at `accessor`; no-op if absent
    fn unregister_library(&mut self, accessor: &str);
}
