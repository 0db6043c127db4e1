//! The tree-walking sandbox backend
//!
//! Owns the persistent library scope and a step budget. Everything else about
//! a call (context globals, locals, trigger buffer, fuel) lives in a per-call
//! `Interp` and dies with it.

use super::eval::Interp;
use super::{Evaluation, Executor};
use crate::config::EngineSettings;
use crate::error::EvalError;
use crate::parser::{self, ParseError};
use crate::values::{ScriptGlobals, Val};
use std::collections::HashMap;
use tracing::trace;

pub struct SandboxExecutor {
    libraries: HashMap<String, Val>,
    step_budget: u64,
}

impl SandboxExecutor {
    /// Metered sandbox with the default step budget
    pub fn new() -> Self {
        Self::with_settings(&EngineSettings::default())
    }

    pub fn with_settings(settings: &EngineSettings) -> Self {
        SandboxExecutor {
            libraries: HashMap::new(),
            step_budget: settings.step_budget,
        }
    }

    /// Same interpreter with no step budget, for trusted expressions
    pub fn unbounded() -> Self {
        SandboxExecutor {
            libraries: HashMap::new(),
            step_budget: u64::MAX,
        }
    }
}

impl Default for SandboxExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor for SandboxExecutor {
    fn execute(
        &mut self,
        src: &str,
        context: &ScriptGlobals,
        callback_data: Option<&Val>,
    ) -> Result<Evaluation, EvalError> {
        let program = parser::parse(src)?;
        trace!(statements = program.body.len(), "executing binding script");
        Interp::new(&self.libraries, context, callback_data, self.step_budget).run(&program)
    }

    fn register_library(&mut self, accessor: &str, value: Val) {
        self.libraries.insert(accessor.to_string(), value);
    }

    fn unregister_library(&mut self, accessor: &str) {
        self.libraries.remove(accessor);
    }
}

impl From<ParseError> for EvalError {
    fn from(err: ParseError) -> Self {
        EvalError::Parse {
            message: err.message,
            line: err.line,
            column: err.column,
        }
    }
}
