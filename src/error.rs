//! Error taxonomy for script evaluation and manager coordination
//!
//! No recovery or retry happens anywhere in this crate: every failure is
//! surfaced verbatim to the caller, with enough detail to show the author
//! of the faulty binding expression.

use crate::executor::ExecutorKind;
use thiserror::Error;

/// Failure of a single evaluation call
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// Script is not syntactically valid; evaluation never started
    #[error("parse error at line {line}, column {column}: {message}")]
    Parse {
        message: String,
        line: usize,
        column: usize,
    },

    /// Script threw during evaluation; any triggers collected so far are discarded
    #[error("runtime error: {message}")]
    Runtime { message: String },

    /// Script exceeded its step budget
    #[error("script exceeded its step budget of {budget}")]
    TimedOut { budget: u64 },
}

impl EvalError {
    /// Shorthand for a runtime failure with a formatted message
    pub fn runtime(message: impl Into<String>) -> Self {
        EvalError::Runtime {
            message: message.into(),
        }
    }
}

/// Failure of a manager-level operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ManagerError {
    /// `switch_executor` named a kind with no constructed backend
    #[error("no executor constructed for kind {kind:?}")]
    UnknownExecutorKind { kind: ExecutorKind },
}
